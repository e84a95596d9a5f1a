use log::debug;
use smallvec::{smallvec, SmallVec};

use crate::{
    elements::{BindableTexture, Color, Texture},
    modules::GraphicsContext,
};

use super::{blur::BlurSource, DEPTH_FORMAT, HDR_COLOR_FORMAT};

/// An offscreen target that can not be rendered into. Fatal at setup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TargetConfigError {
    #[error("render target {target} has zero size ({width}x{height})")]
    ZeroSize {
        target: &'static str,
        width: u32,
        height: u32,
    },
    #[error("render target {target} binds color slot {slot} twice")]
    DuplicateSlot { target: &'static str, slot: u32 },
    #[error("render target {target} has no attachment in color slot {slot}")]
    MissingAttachment { target: &'static str, slot: u32 },
    #[error("color slot {slot} of render target {target} is {actual:?}, the target is {expected:?}")]
    SizeMismatch {
        target: &'static str,
        slot: u32,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("depth attachment of render target {target} is {actual:?}, the target is {expected:?}")]
    DepthSizeMismatch {
        target: &'static str,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("{format:?} can not be used as {role} attachment of render target {target}")]
    NotRenderable {
        target: &'static str,
        role: &'static str,
        format: wgpu::TextureFormat,
    },
    #[error("gpu rejected render target {target}: {message}")]
    Validation {
        target: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorAttachmentDesc {
    pub slot: u32,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthAttachmentDesc {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

/// Everything that gets attached to a render target, declared before any gpu memory is allocated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLayout {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub color: SmallVec<[ColorAttachmentDesc; 2]>,
    pub depth: Option<DepthAttachmentDesc>,
    /// Color slots a render pass on this target writes to simultaneously.
    pub draw_slots: SmallVec<[u32; 2]>,
}

impl TargetLayout {
    /// Two float color attachments, sharp radiance in slot 0 and the bright pass in slot 1, both drawn
    /// into at once, plus a depth attachment.
    pub fn hdr(width: u32, height: u32) -> Self {
        let color = |slot| ColorAttachmentDesc {
            slot,
            width,
            height,
            format: HDR_COLOR_FORMAT,
        };
        TargetLayout {
            label: "Hdr Target",
            width,
            height,
            color: smallvec![color(0), color(1)],
            depth: Some(DepthAttachmentDesc {
                width,
                height,
                format: DEPTH_FORMAT,
            }),
            draw_slots: smallvec![0, 1],
        }
    }

    /// A single float color attachment without depth.
    pub fn ping_pong(label: &'static str, width: u32, height: u32) -> Self {
        TargetLayout {
            label,
            width,
            height,
            color: smallvec![ColorAttachmentDesc {
                slot: 0,
                width,
                height,
                format: HDR_COLOR_FORMAT,
            }],
            depth: None,
            draw_slots: smallvec![0],
        }
    }
}

/// Checks that every declared attachment is present, renderable and as big as the target.
/// Color slots have to cover `0..n` without gaps.
pub fn check_completeness(layout: &TargetLayout) -> Result<(), TargetConfigError> {
    let target = layout.label;
    let expected = (layout.width, layout.height);
    if layout.width == 0 || layout.height == 0 {
        return Err(TargetConfigError::ZeroSize {
            target,
            width: layout.width,
            height: layout.height,
        });
    }

    let mut seen: SmallVec<[u32; 4]> = SmallVec::new();
    for attachment in layout.color.iter() {
        if seen.contains(&attachment.slot) {
            return Err(TargetConfigError::DuplicateSlot {
                target,
                slot: attachment.slot,
            });
        }
        seen.push(attachment.slot);

        if attachment.format.is_depth_stencil_format() {
            return Err(TargetConfigError::NotRenderable {
                target,
                role: "color",
                format: attachment.format,
            });
        }
        let actual = (attachment.width, attachment.height);
        if actual != expected {
            return Err(TargetConfigError::SizeMismatch {
                target,
                slot: attachment.slot,
                expected,
                actual,
            });
        }
    }

    for slot in 0..layout.color.len() as u32 {
        if !seen.contains(&slot) {
            return Err(TargetConfigError::MissingAttachment { target, slot });
        }
    }

    if let Some(depth) = &layout.depth {
        if !depth.format.is_depth_stencil_format() {
            return Err(TargetConfigError::NotRenderable {
                target,
                role: "depth",
                format: depth.format,
            });
        }
        let actual = (depth.width, depth.height);
        if actual != expected {
            return Err(TargetConfigError::DepthSizeMismatch {
                target,
                expected,
                actual,
            });
        }
    }

    if layout.draw_slots.is_empty() {
        return Err(TargetConfigError::MissingAttachment { target, slot: 0 });
    }
    for &slot in layout.draw_slots.iter() {
        if !seen.contains(&slot) {
            return Err(TargetConfigError::MissingAttachment { target, slot });
        }
    }

    Ok(())
}

/// A set of textures rendered into together. Color attachments are stored in slot order.
#[derive(Debug)]
pub struct RenderTarget {
    layout: TargetLayout,
    colors: SmallVec<[BindableTexture; 2]>,
    depth: Option<Texture>,
}

impl RenderTarget {
    /// Validates the layout, then allocates all attachments inside a validation scope.
    pub fn create(ctx: &GraphicsContext, layout: TargetLayout) -> Result<Self, TargetConfigError> {
        check_completeness(&layout)?;

        let mut color = layout.color.clone();
        color.sort_by_key(|c| c.slot);

        let ((colors, depth), error) = ctx.with_validation_scope(|device| {
            let colors: SmallVec<[BindableTexture; 2]> = color
                .iter()
                .map(|c| {
                    let label = format!("{} color {}", layout.label, c.slot);
                    let texture =
                        Texture::create_render_texture(device, c.width, c.height, c.format, label);
                    BindableTexture::new(device, texture)
                })
                .collect();
            let depth = layout.depth.map(|d| {
                let label = format!("{} depth", layout.label);
                Texture::create_depth_texture(device, d.width, d.height, d.format, label)
            });
            (colors, depth)
        });

        if let Some(error) = error {
            return Err(TargetConfigError::Validation {
                target: layout.label,
                message: error.to_string(),
            });
        }

        debug!(
            "Created render target {} ({}x{}, {} color attachments, depth: {})",
            layout.label,
            layout.width,
            layout.height,
            colors.len(),
            depth.is_some()
        );

        Ok(RenderTarget {
            layout,
            colors,
            depth,
        })
    }

    pub fn label(&self) -> &'static str {
        self.layout.label
    }

    pub fn width(&self) -> u32 {
        self.layout.width
    }

    pub fn height(&self) -> u32 {
        self.layout.height
    }

    pub fn color(&self, slot: usize) -> Option<&BindableTexture> {
        self.colors.get(slot)
    }

    /// Starts a render pass writing all draw slots, clearing color and depth.
    pub fn begin_pass<'e>(
        &'e self,
        encoder: &'e mut wgpu::CommandEncoder,
        clear_color: Color,
    ) -> wgpu::RenderPass<'e> {
        let max_slot = self.layout.draw_slots.iter().copied().max().unwrap_or(0) as usize;
        let color_attachments: SmallVec<[Option<wgpu::RenderPassColorAttachment<'e>>; 2]> = (0
            ..=max_slot)
            .map(|slot| {
                if !self.layout.draw_slots.contains(&(slot as u32)) {
                    return None;
                }
                self.colors.get(slot).map(|c| wgpu::RenderPassColorAttachment {
                    view: c.view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear_color.into()),
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();

        let depth_stencil_attachment =
            self.depth
                .as_ref()
                .map(|depth| wgpu::RenderPassDepthStencilAttachment {
                    view: &depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                });

        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(self.layout.label),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            occlusion_query_set: None,
            timestamp_writes: None,
        })
    }
}

pub fn create_hdr_target(
    ctx: &GraphicsContext,
    width: u32,
    height: u32,
) -> Result<RenderTarget, TargetConfigError> {
    RenderTarget::create(ctx, TargetLayout::hdr(width, height))
}

pub fn create_ping_pong_target(
    ctx: &GraphicsContext,
    label: &'static str,
    width: u32,
    height: u32,
) -> Result<RenderTarget, TargetConfigError> {
    RenderTarget::create(ctx, TargetLayout::ping_pong(label, width, height))
}

/// Which of the two blur targets is meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingPongIndex {
    A,
    B,
}

impl PingPongIndex {
    /// Horizontal passes write into B, vertical passes into A.
    pub fn for_direction(horizontal: bool) -> Self {
        if horizontal {
            PingPongIndex::B
        } else {
            PingPongIndex::A
        }
    }

    pub fn index(self) -> usize {
        match self {
            PingPongIndex::A => 0,
            PingPongIndex::B => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            PingPongIndex::A => PingPongIndex::B,
            PingPongIndex::B => PingPongIndex::A,
        }
    }
}

/// All offscreen targets of a frame, sized to the output resolution once at startup.
#[derive(Debug)]
pub struct RenderTargets {
    hdr: RenderTarget,
    ping_pong: [RenderTarget; 2],
}

impl RenderTargets {
    pub fn create(
        ctx: &GraphicsContext,
        width: u32,
        height: u32,
    ) -> Result<Self, TargetConfigError> {
        let hdr = create_hdr_target(ctx, width, height)?;
        let blur_a = create_ping_pong_target(ctx, "Blur Target A", width, height)?;
        let blur_b = create_ping_pong_target(ctx, "Blur Target B", width, height)?;
        Ok(RenderTargets {
            hdr,
            ping_pong: [blur_a, blur_b],
        })
    }

    pub fn hdr(&self) -> &RenderTarget {
        &self.hdr
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.hdr.width() as f32 / self.hdr.height() as f32
    }

    // The slot accessors below rely on `check_completeness` having accepted the layouts.

    pub fn sharp_color(&self) -> &BindableTexture {
        &self.hdr.colors[0]
    }

    pub fn bright_color(&self) -> &BindableTexture {
        &self.hdr.colors[1]
    }

    pub fn blur_a(&self) -> &BindableTexture {
        &self.ping_pong[0].colors[0]
    }

    pub fn blur_b(&self) -> &BindableTexture {
        &self.ping_pong[1].colors[0]
    }

    pub fn ping_pong(&self, index: PingPongIndex) -> &RenderTarget {
        &self.ping_pong[index.index()]
    }

    pub fn blur_source(&self, source: BlurSource) -> &BindableTexture {
        match source {
            BlurSource::BrightPass => self.bright_color(),
            BlurSource::PingPong(PingPongIndex::A) => self.blur_a(),
            BlurSource::PingPong(PingPongIndex::B) => self.blur_b(),
        }
    }
}

#[cfg(test)]
mod tests {
    use smallvec::smallvec;

    use super::{check_completeness, PingPongIndex, TargetConfigError, TargetLayout};
    use crate::modules::renderer::{DEPTH_FORMAT, HDR_COLOR_FORMAT};

    #[test]
    fn default_layouts_are_complete() {
        assert_eq!(check_completeness(&TargetLayout::hdr(1200, 900)), Ok(()));
        assert_eq!(
            check_completeness(&TargetLayout::ping_pong("blur", 1200, 900)),
            Ok(())
        );
    }

    #[test]
    fn zero_size_is_rejected() {
        let err = check_completeness(&TargetLayout::hdr(0, 900)).unwrap_err();
        assert!(matches!(err, TargetConfigError::ZeroSize { width: 0, .. }));
    }

    #[test]
    fn duplicate_slot_is_rejected() {
        let mut layout = TargetLayout::hdr(64, 64);
        layout.color[1].slot = 0;
        let err = check_completeness(&layout).unwrap_err();
        assert_eq!(
            err,
            TargetConfigError::DuplicateSlot {
                target: "Hdr Target",
                slot: 0
            }
        );
    }

    #[test]
    fn draw_slot_without_attachment_is_rejected() {
        let mut layout = TargetLayout::ping_pong("blur", 64, 64);
        layout.draw_slots = smallvec![0, 1];
        let err = check_completeness(&layout).unwrap_err();
        assert_eq!(
            err,
            TargetConfigError::MissingAttachment {
                target: "blur",
                slot: 1
            }
        );

        layout.draw_slots.clear();
        assert!(check_completeness(&layout).is_err());
    }

    #[test]
    fn gap_in_color_slots_is_rejected() {
        let mut layout = TargetLayout::hdr(64, 64);
        layout.color[1].slot = 2;
        layout.draw_slots = smallvec![0];
        let err = check_completeness(&layout).unwrap_err();
        assert!(matches!(
            err,
            TargetConfigError::MissingAttachment { slot: 1, .. }
        ));
    }

    #[test]
    fn attachment_sizes_must_match_target() {
        let mut layout = TargetLayout::hdr(64, 64);
        layout.color[1].width = 32;
        let err = check_completeness(&layout).unwrap_err();
        assert_eq!(
            err,
            TargetConfigError::SizeMismatch {
                target: "Hdr Target",
                slot: 1,
                expected: (64, 64),
                actual: (32, 64)
            }
        );

        let mut layout = TargetLayout::hdr(64, 64);
        if let Some(depth) = layout.depth.as_mut() {
            depth.height = 63;
        }
        let err = check_completeness(&layout).unwrap_err();
        assert!(matches!(err, TargetConfigError::DepthSizeMismatch { .. }));
    }

    #[test]
    fn formats_must_fit_their_role() {
        let mut layout = TargetLayout::hdr(64, 64);
        layout.color[0].format = DEPTH_FORMAT;
        let err = check_completeness(&layout).unwrap_err();
        assert!(matches!(
            err,
            TargetConfigError::NotRenderable { role: "color", .. }
        ));

        let mut layout = TargetLayout::hdr(64, 64);
        if let Some(depth) = layout.depth.as_mut() {
            depth.format = HDR_COLOR_FORMAT;
        }
        let err = check_completeness(&layout).unwrap_err();
        assert!(matches!(
            err,
            TargetConfigError::NotRenderable { role: "depth", .. }
        ));
    }

    #[test]
    fn ping_pong_index_follows_direction() {
        assert_eq!(PingPongIndex::for_direction(true), PingPongIndex::B);
        assert_eq!(PingPongIndex::for_direction(false), PingPongIndex::A);
        assert_eq!(PingPongIndex::B.index(), 1);
        assert_eq!(PingPongIndex::A.other(), PingPongIndex::B);
    }
}
