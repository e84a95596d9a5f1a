use std::sync::Arc;

use log::info;
use wgpu::SurfaceTexture;
use winit::{dpi::PhysicalSize, window::Window};

/// Fatal errors while bringing up the window surface and the gpu device.
#[derive(Debug, thiserror::Error)]
pub enum GraphicsContextError {
    #[error("failed to create surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible gpu adapter found")]
    NoAdapter,
    #[error("failed to request gpu device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
    #[error("surface supports no srgb color format (offered: {0:?})")]
    NoSurfaceFormat(Vec<wgpu::TextureFormat>),
}

#[derive(Debug)]
pub struct GraphicsContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub surface: wgpu::Surface,
    pub surface_format: wgpu::TextureFormat,
    pub surface_config: wgpu::SurfaceConfiguration,
    pub size: PhysicalSize<u32>,
    // dropped after the surface that points into it.
    window: Arc<Window>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsContextConfig {
    pub features: wgpu::Features,
    pub present_mode: wgpu::PresentMode,
    pub max_push_constant_size: u32,
}

impl Default for GraphicsContextConfig {
    fn default() -> Self {
        Self {
            features: wgpu::Features::PUSH_CONSTANTS,
            present_mode: wgpu::PresentMode::AutoVsync,
            max_push_constant_size: 16,
        }
    }
}

impl GraphicsContext {
    pub const SURFACE_COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8UnormSrgb;

    pub fn new(
        config: GraphicsContextConfig,
        window: Arc<Window>,
    ) -> Result<Self, GraphicsContextError> {
        pollster::block_on(initialize_graphics_context(config, window))
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn new_encoder(&self) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Encoder"),
            })
    }

    pub fn new_surface_texture_and_view(
        &self,
    ) -> Result<(SurfaceTexture, wgpu::TextureView), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&Default::default());
        Ok((output, view))
    }

    /// Used after the surface got lost or outdated.
    pub fn reconfigure_surface(&self) {
        self.surface.configure(&self.device, &self.surface_config);
    }

    /// Runs `f` inside a validation error scope and returns the first validation error raised by it.
    pub fn with_validation_scope<T>(
        &self,
        f: impl FnOnce(&wgpu::Device) -> T,
    ) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let result = f(&self.device);
        let error = pollster::block_on(self.device.pop_error_scope());
        (result, error)
    }
}

/// Prefers the format the rest of the renderer is written against, falls back to any srgb format.
fn select_surface_format(
    formats: &[wgpu::TextureFormat],
) -> Result<wgpu::TextureFormat, GraphicsContextError> {
    if formats.contains(&GraphicsContext::SURFACE_COLOR_FORMAT) {
        return Ok(GraphicsContext::SURFACE_COLOR_FORMAT);
    }
    formats
        .iter()
        .copied()
        .find(|f| f.is_srgb())
        .ok_or_else(|| GraphicsContextError::NoSurfaceFormat(formats.to_vec()))
}

pub async fn initialize_graphics_context(
    config: GraphicsContextConfig,
    window: Arc<Window>,
) -> Result<GraphicsContext, GraphicsContextError> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    // Safety: the window is kept alive inside the GraphicsContext, next to the surface.
    let surface = unsafe { instance.create_surface(window.as_ref()) }?;
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        })
        .await
        .ok_or(GraphicsContextError::NoAdapter)?;

    let info = adapter.get_info();
    info!(
        "Selected GPU: {} ({:?}, {:?})",
        info.name, info.backend, info.device_type
    );

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Island Bloom Device"),
                features: config.features,
                limits: wgpu::Limits {
                    max_push_constant_size: config.max_push_constant_size,
                    ..Default::default()
                },
            },
            None,
        )
        .await?;

    let surface_caps = surface.get_capabilities(&adapter);
    let surface_format = select_surface_format(&surface_caps.formats)?;
    info!("Surface format: {surface_format:?}");

    let size = window.inner_size();
    let surface_config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format: surface_format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: config.present_mode,
        alpha_mode: surface_caps.alpha_modes[0],
        view_formats: vec![],
    };
    surface.configure(&device, &surface_config);

    Ok(GraphicsContext {
        instance,
        adapter,
        device: Arc::new(device),
        queue: Arc::new(queue),
        surface,
        surface_format,
        surface_config,
        size,
        window,
    })
}

#[cfg(test)]
mod tests {
    use super::{select_surface_format, GraphicsContext};

    #[test]
    fn prefers_bgra_srgb() {
        let formats = [
            wgpu::TextureFormat::Rgba8UnormSrgb,
            wgpu::TextureFormat::Bgra8UnormSrgb,
        ];
        assert_eq!(
            select_surface_format(&formats).unwrap(),
            GraphicsContext::SURFACE_COLOR_FORMAT
        );
    }

    #[test]
    fn falls_back_to_other_srgb_format() {
        let formats = [
            wgpu::TextureFormat::Bgra8Unorm,
            wgpu::TextureFormat::Rgba8UnormSrgb,
        ];
        assert_eq!(
            select_surface_format(&formats).unwrap(),
            wgpu::TextureFormat::Rgba8UnormSrgb
        );
    }

    #[test]
    fn no_srgb_format_is_an_error() {
        let formats = [wgpu::TextureFormat::Bgra8Unorm];
        assert!(select_surface_format(&formats).is_err());
    }
}
