use std::time::Instant;

use egui::ClippedPrimitive;
use winit::event::WindowEvent;

use self::platform::{Platform, PlatformDescriptor};

use super::GraphicsContext;

pub mod platform;

/// ## How to use the functions exposed by Egui:
///
/// ### Outside of a frame (window event):
/// - `receive_window_event`: whenever some event is issued by winit:
/// e.g. keyboard input, cursor movement, etc...
///
/// ### In a Frame (redraw requested)
/// - `begin_frame`: call at the start of a new frame. Sets the total time.
/// - ...
/// - ... other code can add windows to self.context()
/// - ...
/// - `prepare`: frees the textures of the last frame, closes the frame and updates buffers and textures on the gpu => creates and caches paint jobs
/// - `render`: draws the paint jobs in a render pass on top of what is already in the target
///
pub struct Egui {
    platform: Platform,
    renderer: egui_wgpu::Renderer,
    paint_jobs: Vec<ClippedPrimitive>,
    textures_delta: egui::TexturesDelta,
    start_time: Instant,
}

impl Egui {
    pub fn new(ctx: &GraphicsContext) -> Self {
        let platform = Platform::new(PlatformDescriptor {
            physical_size: ctx.size,
            pixels_per_point: ctx.window().scale_factor() as f32,
            style: Default::default(),
        });

        let renderer = egui_wgpu::Renderer::new(&ctx.device, ctx.surface_format, None, 1);
        Egui {
            platform,
            renderer,
            textures_delta: Default::default(),
            paint_jobs: Vec::new(),
            start_time: Instant::now(),
        }
    }

    pub fn context(&self) -> egui::Context {
        self.platform.context()
    }

    pub fn receive_window_event(&mut self, event: &WindowEvent) {
        self.platform.handle_event(event);
    }

    pub fn begin_frame(&mut self) {
        let total_elapsed_seconds = self.start_time.elapsed().as_secs_f64();
        self.platform.begin_frame(total_elapsed_seconds);
    }

    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
    ) {
        let output = self.platform.end_frame();
        self.paint_jobs.clear();
        for id in self.textures_delta.free.drain(..) {
            self.renderer.free_texture(&id)
        }
        self.textures_delta = output.textures_delta;
        for (id, image_delta) in self.textures_delta.set.iter() {
            self.renderer
                .update_texture(device, queue, *id, image_delta);
        }

        self.paint_jobs = self
            .platform
            .context()
            .tessellate(output.shapes, output.pixels_per_point);

        let screen_descriptor = self.platform.screen_descriptor();
        // no paint callbacks are used, so there are no extra command buffers to submit
        self.renderer
            .update_buffers(device, queue, encoder, &self.paint_jobs, &screen_descriptor);
    }

    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let color_attachment = wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Load,
                store: wgpu::StoreOp::Store,
            },
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Egui Renderpass"),
            color_attachments: &[Some(color_attachment)],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        let screen_descriptor = self.platform.screen_descriptor();
        self.renderer
            .render(&mut render_pass, &self.paint_jobs, &screen_descriptor);
    }
}
