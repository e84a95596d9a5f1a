pub mod color;
pub use color::Color;

pub mod texture;
pub use texture::{BindableTexture, CubeFaces, CubeTexture, Texture};

pub mod buffer;
pub use buffer::{IndexBuffer, ToRaw, UniformBuffer, VertexBuffer};
