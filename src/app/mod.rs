use std::sync::Arc;

use log::info;
use winit::{
    dpi::PhysicalSize,
    event::{DeviceEvent, Event, WindowEvent},
    event_loop::EventLoop,
    window::{Window, WindowBuilder},
};

pub enum UpdateFlow {
    Exit(String),
    Continue,
}

/// Something that is driven by the [`WinitRunner`]: window and device events are handed over as they
/// arrive, `update` is called once per redraw.
pub trait App {
    fn receive_window_event(&mut self, event: &WindowEvent);

    fn receive_device_event(&mut self, _event: &DeviceEvent) {}

    fn update(&mut self) -> UpdateFlow;

    /// Called once after the last frame, before the event loop returns.
    fn exit(&mut self) {}
}

pub struct WinitConfig {
    pub window_name: &'static str,
    pub width: u32,
    pub height: u32,
}

impl Default for WinitConfig {
    fn default() -> Self {
        Self {
            window_name: "Island Bloom",
            width: 1200,
            height: 900,
        }
    }
}

pub struct WinitRunner {
    event_loop: EventLoop<()>,
    window: Arc<Window>,
}

impl WinitRunner {
    pub fn window(&self) -> Arc<Window> {
        self.window.clone()
    }

    pub fn new(config: WinitConfig) -> anyhow::Result<Self> {
        let event_loop = EventLoop::new()?;

        // the offscreen targets are sized once, so the window is not resizable.
        let size = PhysicalSize::new(config.width, config.height);
        let window = WindowBuilder::new()
            .with_visible(true)
            .with_title(config.window_name)
            .with_inner_size(size)
            .with_resizable(false)
            .build(&event_loop)?;
        let window = Arc::new(window);

        Ok(Self { event_loop, window })
    }

    pub fn run(self, app: &mut dyn App) -> anyhow::Result<()> {
        let window = self.window.clone();
        window.request_redraw();
        self.event_loop.run(move |event, window_target| match &event {
            Event::WindowEvent { window_id, event } => {
                if *window_id != window.id() {
                    return;
                }

                app.receive_window_event(event);

                if matches!(event, WindowEvent::RedrawRequested) {
                    //  this is called every frame:
                    match app.update() {
                        UpdateFlow::Exit(reason) => {
                            info!("Exit: {reason}");
                            window_target.exit();
                        }
                        UpdateFlow::Continue => window.request_redraw(),
                    }
                }
            }
            Event::DeviceEvent { event, .. } => app.receive_device_event(event),
            Event::LoopExiting => app.exit(),
            _ => {}
        })?;
        Ok(())
    }
}
