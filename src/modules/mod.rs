pub mod renderer;
pub use renderer::{Renderer, ScreenVertexShader};

pub mod graphics_context;
pub use graphics_context::{GraphicsContext, GraphicsContextConfig, GraphicsContextError};

pub mod input;
pub use input::{FrameInput, Input, KeyLatch};

pub mod time;
pub use time::FrameClock;

pub mod camera;
pub use camera::{Camera, CameraMovement};

pub mod settings;
pub use settings::{Settings, SettingsError};

pub mod egui;
pub use egui::Egui;
