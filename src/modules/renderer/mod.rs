use std::path::Path;

use log::info;

use crate::elements::Color;

use super::{Camera, GraphicsContext};

pub mod render_target;
pub use render_target::{
    check_completeness, PingPongIndex, RenderTarget, RenderTargets, TargetConfigError,
    TargetLayout,
};

pub mod blur;
pub use blur::{BlurSchedule, BlurSource, BlurStage, BlurStep};

pub mod scene;
pub use scene::{Attenuation, IslandInstance, Lighting, PointLight, ScenePass};

pub mod skybox;
pub use skybox::Skybox;

pub mod composite;
pub use composite::{composite_texel, CompositePass, CompositeSettings, CompositeVariant};

pub mod model;
pub use model::{Model, ModelVertex};

pub const HDR_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

pub struct Attribute {
    pub format: wgpu::VertexFormat,
}
impl Attribute {
    pub const fn new(format: wgpu::VertexFormat) -> Self {
        Self { format }
    }
}

pub trait VertexT: 'static + Sized {
    const ATTRIBUTES: &'static [Attribute];

    /// We pass in `empty_vec`, because Rust does not have super let lifetimes yet... sigh...
    fn vertex_buffer_layout(
        empty_vec: &mut Vec<wgpu::VertexAttribute>,
    ) -> wgpu::VertexBufferLayout<'_> {
        assert!(empty_vec.is_empty());
        let mut offset: u64 = 0;
        for (shader_location, a) in Self::ATTRIBUTES.iter().enumerate() {
            empty_vec.push(wgpu::VertexAttribute {
                format: a.format,
                offset,
                shader_location: shader_location as u32,
            });
            offset += a.format.size();
        }

        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: empty_vec,
        }
    }
}

/// Shader for a single triangle that covers the entire screen.
#[derive(Debug)]
pub struct ScreenVertexShader(wgpu::ShaderModule);

impl ScreenVertexShader {
    pub fn new(device: &wgpu::Device) -> Self {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Screen Vertex Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("screen.vert.wgsl").into()),
        });
        ScreenVertexShader(module)
    }

    pub fn vertex_state(&self) -> wgpu::VertexState<'_> {
        wgpu::VertexState {
            module: &self.0,
            entry_point: "vs_main",
            buffers: &[],
        }
    }
}

/// Primitive state of all full screen passes.
pub(crate) fn screen_primitive_state() -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        strip_index_format: None,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: Some(wgpu::Face::Back),
        polygon_mode: wgpu::PolygonMode::Fill,
        unclipped_depth: false,
        conservative: false,
    }
}

/// Owns every pass of a frame and the offscreen targets chaining them together.
pub struct Renderer {
    targets: RenderTargets,
    scene: ScenePass,
    blur: BlurStage,
    composite: CompositePass,
}

impl Renderer {
    /// Fails if any offscreen target is incomplete. Missing assets only degrade the picture.
    pub fn new(
        ctx: &GraphicsContext,
        resources_dir: &Path,
        blur_iterations: u32,
    ) -> anyhow::Result<Self> {
        let size = ctx.size();
        let targets = RenderTargets::create(ctx, size.width, size.height)?;
        let screen_vertex_shader = ScreenVertexShader::new(&ctx.device);

        let scene = ScenePass::new(&ctx.device, &ctx.queue, resources_dir);
        let blur = BlurStage::new(&ctx.device, &screen_vertex_shader, blur_iterations);
        let composite = CompositePass::new(&ctx.device, &screen_vertex_shader, ctx.surface_format);
        info!(
            "Renderer ready: {}x{} targets, {} blur iterations",
            size.width, size.height, blur_iterations
        );

        Ok(Renderer {
            targets,
            scene,
            blur,
            composite,
        })
    }

    pub fn targets(&self) -> &RenderTargets {
        &self.targets
    }

    pub fn blur_iterations(&self) -> u32 {
        self.blur.iterations()
    }

    /// Uploads the per frame uniforms. Has to run before [`Renderer::render`] is recorded.
    pub fn prepare(
        &mut self,
        queue: &wgpu::Queue,
        camera: &Camera,
        time: f32,
        attenuation: Attenuation,
    ) {
        let aspect = self.targets.aspect_ratio();
        self.scene.prepare(queue, camera, aspect, time, attenuation);
    }

    /// Records scene, blur and composite in this order, each reading what the previous one wrote.
    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        surface_view: &wgpu::TextureView,
        clear_color: Color,
        settings: CompositeSettings,
    ) {
        self.scene.render(encoder, self.targets.hdr(), clear_color);
        let blurred = self.blur.apply(encoder, &self.targets);
        let bloom = match CompositeVariant::for_settings(&settings) {
            CompositeVariant::Bloom => Some(&self.targets.blur_source(blurred).bind_group),
            CompositeVariant::Plain => None,
        };
        self.composite.render(
            encoder,
            surface_view,
            clear_color,
            &self.targets.sharp_color().bind_group,
            bloom,
            settings,
        );
    }
}
