use std::borrow::Cow;

use glam::Vec3;

use crate::elements::{texture::rgba_bind_group_layout, Color};

use super::{screen_primitive_state, ScreenVertexShader};

/// What the composite pass reads from the frame's toggle state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeSettings {
    pub hdr_enabled: bool,
    pub bloom_enabled: bool,
    pub exposure: f32,
}

/// Push constant block of the composite shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct CompositeParams {
    hdr: u32,
    bloom: u32,
    exposure: f32,
    _pad: u32,
}

impl From<CompositeSettings> for CompositeParams {
    fn from(settings: CompositeSettings) -> Self {
        CompositeParams {
            hdr: settings.hdr_enabled as u32,
            bloom: settings.bloom_enabled as u32,
            exposure: settings.exposure,
            _pad: 0,
        }
    }
}

/// The two pipelines of the composite pass. `Plain` has no bloom binding, so the blur output is never
/// sampled when bloom is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeVariant {
    Plain,
    Bloom,
}

impl CompositeVariant {
    pub fn for_settings(settings: &CompositeSettings) -> Self {
        if settings.bloom_enabled {
            CompositeVariant::Bloom
        } else {
            CompositeVariant::Plain
        }
    }
}

/// Cpu version of the composite shader for a single texel. `bloom` is only read by the bloom variant.
pub fn composite_texel(
    variant: CompositeVariant,
    hdr_color: Vec3,
    bloom: Vec3,
    hdr_enabled: bool,
    exposure: f32,
) -> Vec3 {
    let color = match variant {
        CompositeVariant::Plain => hdr_color,
        CompositeVariant::Bloom => hdr_color + bloom,
    };
    tonemap(color, hdr_enabled, exposure)
}

fn tonemap(color: Vec3, hdr_enabled: bool, exposure: f32) -> Vec3 {
    if hdr_enabled {
        Vec3::ONE - Vec3::from_array((-color * exposure).to_array().map(f32::exp))
    } else {
        color.clamp(Vec3::ZERO, Vec3::ONE)
    }
}

/// Tonemaps the sharp hdr image, optionally with the blurred bright pass added, into the surface.
pub struct CompositePass {
    plain_pipeline: wgpu::RenderPipeline,
    bloom_pipeline: wgpu::RenderPipeline,
}

impl CompositePass {
    pub fn new(
        device: &wgpu::Device,
        screen_vertex_shader: &ScreenVertexShader,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let fragment_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Composite Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!("composite.wgsl"))),
        });

        let push_constant_ranges = &[wgpu::PushConstantRange {
            stages: wgpu::ShaderStages::FRAGMENT,
            range: 0..std::mem::size_of::<CompositeParams>() as u32,
        }];

        let create_pipeline = |label: &str,
                               entry_point: &str,
                               bind_group_layouts: &[&wgpu::BindGroupLayout]|
         -> wgpu::RenderPipeline {
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts,
                push_constant_ranges,
            });
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                vertex: screen_vertex_shader.vertex_state(),
                fragment: Some(wgpu::FragmentState {
                    module: &fragment_shader,
                    entry_point,
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface_format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: screen_primitive_state(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        };

        let rgba = rgba_bind_group_layout(device);
        let plain_pipeline = create_pipeline("Composite", "fs_plain", &[rgba]);
        let bloom_pipeline = create_pipeline("Composite with bloom", "fs_bloom", &[rgba, rgba]);

        CompositePass {
            plain_pipeline,
            bloom_pipeline,
        }
    }

    /// `bloom` has to be `Some` exactly when bloom is enabled in `settings`.
    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        surface_view: &wgpu::TextureView,
        clear_color: Color,
        sharp: &wgpu::BindGroup,
        bloom: Option<&wgpu::BindGroup>,
        settings: CompositeSettings,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Composite"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: surface_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_color.into()),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        match bloom {
            Some(bloom) => {
                pass.set_pipeline(&self.bloom_pipeline);
                pass.set_bind_group(0, sharp, &[]);
                pass.set_bind_group(1, bloom, &[]);
            }
            None => {
                pass.set_pipeline(&self.plain_pipeline);
                pass.set_bind_group(0, sharp, &[]);
            }
        }
        let params = CompositeParams::from(settings);
        pass.set_push_constants(wgpu::ShaderStages::FRAGMENT, 0, bytemuck::bytes_of(&params));
        pass.draw(0..3, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use glam::{vec3, Vec3};

    use super::{composite_texel, CompositeParams, CompositeSettings, CompositeVariant};

    fn texels() -> Vec<Vec3> {
        vec![
            Vec3::ZERO,
            vec3(0.1, 0.2, 0.3),
            vec3(1.0, 1.0, 1.0),
            vec3(4.5, 0.02, 12.0),
        ]
    }

    #[test]
    fn disabled_bloom_matches_a_frame_without_blur() {
        // whatever the blur stage left behind must not change the result
        for hdr_enabled in [true, false] {
            for color in texels() {
                let without_blur =
                    composite_texel(CompositeVariant::Plain, color, Vec3::ZERO, hdr_enabled, 1.3);
                let with_garbage = composite_texel(
                    CompositeVariant::Plain,
                    color,
                    vec3(9.0, f32::MAX, 3.0),
                    hdr_enabled,
                    1.3,
                );
                assert_eq!(without_blur, with_garbage);
            }
        }
    }

    #[test]
    fn bloom_variant_follows_toggle() {
        let mut settings = CompositeSettings {
            hdr_enabled: true,
            bloom_enabled: false,
            exposure: 1.0,
        };
        assert_eq!(
            CompositeVariant::for_settings(&settings),
            CompositeVariant::Plain
        );
        settings.bloom_enabled = true;
        assert_eq!(
            CompositeVariant::for_settings(&settings),
            CompositeVariant::Bloom
        );
    }

    #[test]
    fn bloom_is_added_before_tonemapping() {
        let color = vec3(0.5, 0.5, 0.5);
        let bloom = vec3(0.25, 0.0, 1.0);
        let out = composite_texel(CompositeVariant::Bloom, color, bloom, true, 1.0);
        let sum = color + bloom;
        let expected = Vec3::ONE - Vec3::new((-sum.x).exp(), (-sum.y).exp(), (-sum.z).exp());
        assert!(out.abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn exposure_is_monotonic() {
        for color in texels() {
            let mut previous = composite_texel(CompositeVariant::Plain, color, Vec3::ZERO, true, 0.0);
            assert_eq!(previous, Vec3::ZERO);
            for step in 1..50 {
                let exposure = step as f32 * 0.1;
                let out = composite_texel(CompositeVariant::Plain, color, Vec3::ZERO, true, exposure);
                assert!(out.cmpge(previous).all());
                assert!(out.cmple(Vec3::ONE).all());
                previous = out;
            }
        }
    }

    #[test]
    fn without_hdr_radiance_is_clamped() {
        let out = composite_texel(
            CompositeVariant::Plain,
            vec3(-1.0, 0.5, 7.0),
            Vec3::ZERO,
            false,
            3.0,
        );
        assert_eq!(out, vec3(0.0, 0.5, 1.0));
    }

    #[test]
    fn push_constants_fit_the_device_limit() {
        assert_eq!(std::mem::size_of::<CompositeParams>(), 16);
    }
}
