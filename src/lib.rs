pub mod app;
pub mod demo;
pub mod elements;
pub mod modules;

pub use app::{App, UpdateFlow, WinitConfig, WinitRunner};
pub use demo::{BloomState, DemoConfig, IslandDemo};
