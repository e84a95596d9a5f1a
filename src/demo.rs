use std::{path::PathBuf, sync::Arc};

use glam::{Vec2, Vec3};
use log::{error, info, warn};
use winit::{
    event::{DeviceEvent, WindowEvent},
    window::{CursorGrabMode, Window},
};

use crate::{
    app::{App, UpdateFlow},
    elements::Color,
    modules::{
        renderer::{Attenuation, CompositeSettings},
        Camera, CameraMovement, Egui, FrameClock, FrameInput, GraphicsContext,
        GraphicsContextConfig, Input, KeyLatch, Renderer, Settings,
    },
};

/// Exposure change per frame while Q or E is held.
pub const EXPOSURE_STEP: f32 = 0.005;

#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub resources_dir: PathBuf,
    pub settings_file: PathBuf,
    pub blur_iterations: u32,
    /// Camera movement per frame is `camera_speed_scale * delta_time * movement_speed`.
    pub camera_speed_scale: f32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        DemoConfig {
            resources_dir: PathBuf::from("resources"),
            settings_file: PathBuf::from("resources/program_state.txt"),
            blur_iterations: 10,
            camera_speed_scale: 4.0,
        }
    }
}

/// The toggles and the exposure read by the post processing passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomState {
    pub hdr_enabled: bool,
    pub bloom_enabled: bool,
    pub exposure: f32,
    pub blur_iterations: u32,
    hdr_latch: KeyLatch,
    bloom_latch: KeyLatch,
}

impl Default for BloomState {
    fn default() -> Self {
        Self::new(10)
    }
}

impl BloomState {
    pub fn new(blur_iterations: u32) -> Self {
        BloomState {
            hdr_enabled: true,
            bloom_enabled: false,
            exposure: 1.0,
            blur_iterations,
            hdr_latch: KeyLatch::default(),
            bloom_latch: KeyLatch::default(),
        }
    }

    /// Space and B toggle once per press, Q and E change the exposure every frame they are held.
    pub fn apply_input(&mut self, input: &FrameInput) {
        if self.hdr_latch.update(input.hdr_key) {
            self.hdr_enabled = !self.hdr_enabled;
            info!("HDR: {}", on_off(self.hdr_enabled));
        }
        if self.bloom_latch.update(input.bloom_key) {
            self.bloom_enabled = !self.bloom_enabled;
            info!("Bloom: {}", on_off(self.bloom_enabled));
        }
        self.adjust_exposure(input.exposure_down, input.exposure_up);
    }

    /// Decreasing wins if both are held. Exposure never drops below zero and has no upper bound.
    pub fn adjust_exposure(&mut self, down: bool, up: bool) {
        if down {
            self.exposure = (self.exposure - EXPOSURE_STEP).max(0.0);
        } else if up {
            self.exposure += EXPOSURE_STEP;
        }
    }

    /// Values typed into the debug ui go through here, so they obey the same lower bound as Q.
    pub fn set_exposure(&mut self, exposure: f32) {
        self.exposure = exposure.max(0.0);
    }

    pub fn composite_settings(&self) -> CompositeSettings {
        CompositeSettings {
            hdr_enabled: self.hdr_enabled,
            bloom_enabled: self.bloom_enabled,
            exposure: self.exposure,
        }
    }
}

fn attenuation_drag<'a>(value: &'a mut f32, name: &str) -> egui::DragValue<'a> {
    egui::DragValue::new(value)
        .speed(0.05)
        .clamp_range(0.0..=1.0)
        .prefix(format!("{name}: "))
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

/// Three floating islands under a skybox. Drives scene, blur and composite once per frame.
pub struct IslandDemo {
    config: DemoConfig,
    renderer: Renderer,
    egui: Egui,
    input: Input,
    clock: FrameClock,
    camera: Camera,
    settings: Settings,
    bloom: BloomState,
    attenuation: Attenuation,
    camera_mouse_update: bool,
    ctx: GraphicsContext,
}

impl IslandDemo {
    pub fn new(window: Arc<Window>, config: DemoConfig) -> anyhow::Result<Self> {
        let ctx = GraphicsContext::new(GraphicsContextConfig::default(), window)?;

        let settings = Settings::load_or_default(&config.settings_file);
        let mut camera = Camera::new(settings.camera_position);
        camera.set_front(settings.camera_front);

        let renderer = Renderer::new(&ctx, &config.resources_dir, config.blur_iterations)?;
        let egui = Egui::new(&ctx);

        let demo = IslandDemo {
            renderer,
            egui,
            input: Input::new(),
            clock: FrameClock::new(),
            camera,
            bloom: BloomState::new(config.blur_iterations),
            attenuation: Attenuation::default(),
            camera_mouse_update: !settings.ui_enabled,
            settings,
            config,
            ctx,
        };
        demo.apply_cursor_mode();
        Ok(demo)
    }

    /// With the debug ui the cursor is free, without it the cursor is hidden and grabbed for mouse look.
    fn apply_cursor_mode(&self) {
        let window = self.ctx.window();
        if self.settings.ui_enabled {
            if let Err(err) = window.set_cursor_grab(CursorGrabMode::None) {
                warn!("Could not release cursor: {err}");
            }
            window.set_cursor_visible(true);
        } else {
            let grabbed = window
                .set_cursor_grab(CursorGrabMode::Confined)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked));
            if let Err(err) = grabbed {
                warn!("Could not grab cursor: {err}");
            }
            window.set_cursor_visible(false);
        }
    }

    fn toggle_ui(&mut self) {
        self.settings.ui_enabled = !self.settings.ui_enabled;
        self.camera_mouse_update = !self.settings.ui_enabled;
        self.apply_cursor_mode();
        info!("Debug ui: {}", on_off(self.settings.ui_enabled));
    }

    fn move_camera(&mut self, frame: &FrameInput, delta_time: f32) {
        let step = self.config.camera_speed_scale * delta_time;
        let movements = [
            (frame.forward, CameraMovement::Forward),
            (frame.backward, CameraMovement::Backward),
            (frame.left, CameraMovement::Left),
            (frame.right, CameraMovement::Right),
        ];
        for (pressed, movement) in movements {
            if pressed {
                self.camera.process_keyboard(movement, step);
            }
        }

        if self.camera_mouse_update && frame.mouse_delta != Vec2::ZERO {
            self.camera
                .process_mouse_movement(frame.mouse_delta.x, frame.mouse_delta.y);
        }
        if frame.scroll != 0.0 {
            self.camera.process_mouse_scroll(frame.scroll);
        }
    }

    fn render(&mut self) -> UpdateFlow {
        let time = self.clock.current_time() as f32;
        self.renderer
            .prepare(&self.ctx.queue, &self.camera, time, self.attenuation);

        let (surface_texture, view) = match self.ctx.new_surface_texture_and_view() {
            Ok(surface) => surface,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.ctx.reconfigure_surface();
                return UpdateFlow::Continue;
            }
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("Surface timed out, skipping frame");
                return UpdateFlow::Continue;
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return UpdateFlow::Exit("gpu is out of memory".into());
            }
        };

        let mut encoder = self.ctx.new_encoder();
        let clear_color = Color::from(self.settings.clear_color);
        self.renderer.render(
            &mut encoder,
            &view,
            clear_color,
            self.bloom.composite_settings(),
        );

        if self.settings.ui_enabled {
            self.egui.begin_frame();
            self.debug_ui();
            self.egui
                .prepare(&self.ctx.device, &self.ctx.queue, &mut encoder);
            self.egui.render(&mut encoder, &view);
        }

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        UpdateFlow::Continue
    }

    fn debug_ui(&mut self) {
        let ctx = self.egui.context();
        let IslandDemo {
            renderer,
            clock,
            camera,
            settings,
            bloom,
            attenuation,
            camera_mouse_update,
            ..
        } = self;

        egui::Window::new("Settings").show(&ctx, |ui| {
            ui.label(format!("Frame time: {:.2} ms", clock.avg_delta_ms()));
            ui.horizontal(|ui| {
                let mut rgb = settings.clear_color.to_array();
                if ui.color_edit_button_rgb(&mut rgb).changed() {
                    settings.clear_color = Vec3::from_array(rgb);
                }
                ui.label("Background color");
            });

            ui.separator();
            ui.add(attenuation_drag(&mut attenuation.constant, "constant"));
            ui.add(attenuation_drag(&mut attenuation.linear, "linear"));
            ui.add(attenuation_drag(&mut attenuation.quadratic, "quadratic"));

            ui.separator();
            ui.checkbox(&mut bloom.hdr_enabled, "HDR (Space)");
            ui.checkbox(&mut bloom.bloom_enabled, "Bloom (B)");
            let mut exposure = bloom.exposure;
            let slider = egui::Slider::new(&mut exposure, 0.0..=5.0)
                .clamp_to_range(false)
                .text("Exposure (Q/E)");
            if ui.add(slider).changed() {
                bloom.set_exposure(exposure);
            }
            ui.label(format!("Blur iterations: {}", renderer.blur_iterations()));
        });

        egui::Window::new("Camera info").show(&ctx, |ui| {
            let p = camera.position;
            ui.label(format!("Position: ({:.2}, {:.2}, {:.2})", p.x, p.y, p.z));
            ui.label(format!("(Yaw, Pitch): ({:.2}, {:.2})", camera.yaw, camera.pitch));
            let f = camera.front();
            ui.label(format!("Front: ({:.2}, {:.2}, {:.2})", f.x, f.y, f.z));
            ui.checkbox(camera_mouse_update, "Camera mouse update");
        });
    }
}

impl App for IslandDemo {
    fn receive_window_event(&mut self, event: &WindowEvent) {
        self.input.receive_window_event(event);
        if self.settings.ui_enabled {
            self.egui.receive_window_event(event);
        }
    }

    fn receive_device_event(&mut self, event: &DeviceEvent) {
        self.input.receive_device_event(event);
    }

    fn update(&mut self) -> UpdateFlow {
        self.clock.update();
        let delta_time = self.clock.delta_secs();

        let frame = self.input.poll();
        if frame.close {
            return UpdateFlow::Exit("window closed".into());
        }

        self.move_camera(&frame, delta_time);
        if frame.toggle_ui {
            self.toggle_ui();
        }
        self.bloom.apply_input(&frame);

        let flow = self.render();
        self.input.end_frame();
        flow
    }

    fn exit(&mut self) {
        self.settings.camera_position = self.camera.position;
        self.settings.camera_front = self.camera.front();
        let path = &self.config.settings_file;
        match self.settings.save(path) {
            Ok(()) => info!("Saved settings to {}", path.display()),
            Err(err) => error!("{err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BloomState, EXPOSURE_STEP};
    use crate::modules::FrameInput;

    fn held(hdr_key: bool, bloom_key: bool) -> FrameInput {
        FrameInput {
            hdr_key,
            bloom_key,
            ..Default::default()
        }
    }

    #[test]
    fn starts_with_hdr_on_and_bloom_off() {
        let state = BloomState::default();
        assert!(state.hdr_enabled);
        assert!(!state.bloom_enabled);
        assert_eq!(state.exposure, 1.0);
        assert_eq!(state.blur_iterations, 10);
    }

    #[test]
    fn held_toggle_fires_once() {
        let mut state = BloomState::default();
        for _ in 0..60 {
            state.apply_input(&held(true, true));
        }
        assert!(!state.hdr_enabled);
        assert!(state.bloom_enabled);

        state.apply_input(&held(false, false));
        state.apply_input(&held(true, false));
        assert!(state.hdr_enabled);
        assert!(state.bloom_enabled);
    }

    #[test]
    fn exposure_never_negative() {
        let mut state = BloomState::default();
        for _ in 0..300 {
            state.apply_input(&FrameInput {
                exposure_down: true,
                ..Default::default()
            });
            assert!(state.exposure >= 0.0);
        }
        assert_eq!(state.exposure, 0.0);
    }

    #[test]
    fn exposure_has_no_upper_clamp() {
        let mut state = BloomState::default();
        for _ in 0..100 {
            state.adjust_exposure(false, true);
        }
        assert!((state.exposure - (1.0 + 100.0 * EXPOSURE_STEP)).abs() < 1e-4);
        for _ in 0..1000 {
            state.adjust_exposure(false, true);
        }
        assert!(state.exposure > 6.0);
    }

    #[test]
    fn decrease_wins_over_increase() {
        let mut state = BloomState::default();
        state.adjust_exposure(true, true);
        assert!((state.exposure - 0.995).abs() < 1e-6);
    }

    #[test]
    fn composite_settings_mirror_state() {
        let mut state = BloomState::default();
        state.bloom_enabled = true;
        state.exposure = 2.5;
        let settings = state.composite_settings();
        assert!(settings.hdr_enabled && settings.bloom_enabled);
        assert_eq!(settings.exposure, 2.5);
    }

    #[test]
    fn typed_exposure_is_clamped_below_only() {
        let mut state = BloomState::default();
        state.set_exposure(-3.0);
        assert_eq!(state.exposure, 0.0);
        state.set_exposure(12.0);
        assert_eq!(state.exposure, 12.0);
    }
}
