use std::{
    borrow::Cow,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use image::RgbaImage;
use log::{debug, warn};
use wgpu::{BindGroupDescriptor, BindGroupLayout};

#[derive(Debug)]
pub struct BindableTexture {
    pub texture: Texture,
    pub bind_group: wgpu::BindGroup,
}

/// cached bind group layout for rgba images
pub fn rgba_bind_group_layout(device: &wgpu::Device) -> &'static BindGroupLayout {
    static _RGBA_BIND_GROUP_LAYOUT: OnceLock<BindGroupLayout> = OnceLock::new();
    _RGBA_BIND_GROUP_LAYOUT.get_or_init(|| {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Rgba BindGroupLayout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        })
    })
}

/// cached bind group layout for cube maps (same shape as the rgba one, cube view dimension)
pub fn cube_bind_group_layout(device: &wgpu::Device) -> &'static BindGroupLayout {
    static _CUBE_BIND_GROUP_LAYOUT: OnceLock<BindGroupLayout> = OnceLock::new();
    _CUBE_BIND_GROUP_LAYOUT.get_or_init(|| {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Cube BindGroupLayout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        })
    })
}

impl BindableTexture {
    /// always uses `rgba_bind_group_layout` to get the default bind group layout without multisampling
    pub fn new(device: &wgpu::Device, texture: Texture) -> Self {
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: texture.label(),
            layout: rgba_bind_group_layout(device),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                },
            ],
        });

        BindableTexture {
            texture,
            bind_group,
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.texture.view
    }
}

#[derive(Debug)]
pub struct Texture {
    pub label: Option<Cow<'static, str>>,
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub size: wgpu::Extent3d,
}

/// How the bytes of an image are interpreted when sampled. Colors are stored gamma encoded, data
/// like specular intensities is linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Srgb,
    Linear,
}

impl ColorSpace {
    pub fn format(self) -> wgpu::TextureFormat {
        match self {
            ColorSpace::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            ColorSpace::Linear => wgpu::TextureFormat::Rgba8Unorm,
        }
    }
}

impl Texture {
    pub fn label(&self) -> Option<&str> {
        self.label.as_ref().map(|e| e.as_ref())
    }

    pub fn create_white_px_texture(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let mut white_px = RgbaImage::new(1, 1);
        white_px.get_pixel_mut(0, 0).0 = [255, 255, 255, 255];
        Self::from_image(device, queue, &white_px, ColorSpace::Srgb).labeled("White Pixel")
    }

    /// Loads an image file into a texture. The image is flipped vertically, because uv coordinates
    /// of the models we load have their origin in the bottom left.
    pub fn from_path(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: &Path,
        color_space: ColorSpace,
    ) -> Result<Self, image::ImageError> {
        let rgba = image::open(path)?.flipv().to_rgba8();
        let texture = Self::from_image(device, queue, &rgba, color_space)
            .labeled(path.display().to_string());
        debug!(
            "Loaded texture {} ({}x{})",
            path.display(),
            rgba.width(),
            rgba.height()
        );
        Ok(texture)
    }

    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: &RgbaImage,
        color_space: ColorSpace,
    ) -> Self {
        let dimensions = rgba.dimensions();

        let format = color_space.format();
        let usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        let size = wgpu::Extent3d {
            width: rgba.width(),
            height: rgba.height(),
            depth_or_array_layers: 1,
        };
        let texture = Self::create_2d_texture(
            device,
            size.width,
            size.height,
            format,
            usage,
            wgpu::FilterMode::Linear,
        );

        queue.write_texture(
            wgpu::ImageCopyTexture {
                aspect: wgpu::TextureAspect::All,
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * dimensions.0),
                rows_per_image: Some(dimensions.1),
            },
            size,
        );

        texture
    }

    /// A texture that can be rendered into and sampled afterwards. Linear filtering, clamped to the edge,
    /// so blur kernels do not pick up texels from the opposite border.
    pub fn create_render_texture(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        label: impl Into<Cow<'static, str>>,
    ) -> Self {
        let usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        Self::create_2d_texture(
            device,
            width,
            height,
            format,
            usage,
            wgpu::FilterMode::Linear,
        )
        .labeled(label)
    }

    /// Render attachment only, never sampled.
    pub fn create_depth_texture(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        label: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::create_2d_texture(
            device,
            width,
            height,
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
            wgpu::FilterMode::Nearest,
        )
        .labeled(label)
    }

    fn labeled(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn create_2d_texture(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
        filter: wgpu::FilterMode,
    ) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: None,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            size,
            label: None,
        }
    }
}

/// The six decoded faces of a cube map, in layer order +X, -X, +Y, -Y, +Z, -Z.
/// A face that could not be decoded (or did not match the size of the first decodable face) is `None`.
#[derive(Debug)]
pub struct CubeFaces {
    pub face_size: u32,
    pub faces: [Option<RgbaImage>; 6],
}

impl CubeFaces {
    pub fn decode(paths: &[PathBuf; 6], flip_vertically: bool) -> Self {
        let mut face_size: Option<u32> = None;
        let faces = std::array::from_fn(|i| {
            let path = &paths[i];
            let image = match image::open(path) {
                Ok(image) => image,
                Err(err) => {
                    warn!("Cubemap texture failed to load at path: {} ({err})", path.display());
                    return None;
                }
            };
            let image = if flip_vertically { image.flipv() } else { image };
            let rgba = image.to_rgba8();
            if rgba.width() != rgba.height() {
                warn!(
                    "Cubemap face {} is not square ({}x{}), skipping it",
                    path.display(),
                    rgba.width(),
                    rgba.height()
                );
                return None;
            }
            let size = *face_size.get_or_insert(rgba.width());
            if rgba.width() != size {
                warn!(
                    "Cubemap face {} has size {} but the first face has size {size}, skipping it",
                    path.display(),
                    rgba.width()
                );
                return None;
            }
            Some(rgba)
        });

        CubeFaces {
            face_size: face_size.unwrap_or(1),
            faces,
        }
    }

    pub fn decoded_count(&self) -> usize {
        self.faces.iter().filter(|f| f.is_some()).count()
    }
}

#[derive(Debug)]
pub struct CubeTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub bind_group: wgpu::BindGroup,
}

impl CubeTexture {
    /// Faces that failed to decode stay zero initialized.
    pub fn from_faces(device: &wgpu::Device, queue: &wgpu::Queue, faces: &CubeFaces) -> Self {
        let size = wgpu::Extent3d {
            width: faces.face_size,
            height: faces.face_size,
            depth_or_array_layers: 6,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Skybox Cubemap"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (layer, face) in faces.faces.iter().enumerate() {
            let Some(face) = face else {
                continue;
            };
            queue.write_texture(
                wgpu::ImageCopyTexture {
                    aspect: wgpu::TextureAspect::All,
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: layer as u32,
                    },
                },
                face,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * faces.face_size),
                    rows_per_image: Some(faces.face_size),
                },
                wgpu::Extent3d {
                    width: faces.face_size,
                    height: faces.face_size,
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Skybox Cubemap View"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("Skybox Cubemap BindGroup"),
            layout: cube_bind_group_layout(device),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        CubeTexture {
            texture,
            view,
            sampler,
            bind_group,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use image::RgbaImage;

    use super::{ColorSpace, CubeFaces};

    fn temp_face(name: &str, size: u32) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "island-bloom-{}-{name}.png",
            std::process::id()
        ));
        RgbaImage::new(size, size).save(&path).unwrap();
        path
    }

    #[test]
    fn missing_faces_are_skipped() {
        let good = temp_face("good", 4);
        let missing = PathBuf::from("does/not/exist.jpg");
        let paths = [
            good.clone(),
            missing.clone(),
            good.clone(),
            missing.clone(),
            good.clone(),
            missing,
        ];
        let faces = CubeFaces::decode(&paths, true);
        assert_eq!(faces.face_size, 4);
        assert_eq!(faces.decoded_count(), 3);
        assert!(faces.faces[1].is_none());
        assert!(faces.faces[4].is_some());
        let _ = std::fs::remove_file(good);
    }

    #[test]
    fn mismatched_face_size_is_skipped() {
        let big = temp_face("big", 8);
        let small = temp_face("small", 2);
        let paths = [
            big.clone(),
            small.clone(),
            big.clone(),
            big.clone(),
            big.clone(),
            big.clone(),
        ];
        let faces = CubeFaces::decode(&paths, false);
        assert_eq!(faces.face_size, 8);
        assert_eq!(faces.decoded_count(), 5);
        assert!(faces.faces[1].is_none());
        let _ = std::fs::remove_file(big);
        let _ = std::fs::remove_file(small);
    }

    #[test]
    fn no_decodable_face_gives_one_texel_cube() {
        let paths: [PathBuf; 6] = std::array::from_fn(|i| PathBuf::from(format!("nope/{i}.jpg")));
        let faces = CubeFaces::decode(&paths, true);
        assert_eq!(faces.face_size, 1);
        assert_eq!(faces.decoded_count(), 0);
    }

    #[test]
    fn linear_images_are_not_gamma_decoded() {
        assert_eq!(ColorSpace::Linear.format(), wgpu::TextureFormat::Rgba8Unorm);
        assert!(ColorSpace::Srgb.format().is_srgb());
        assert!(!ColorSpace::Linear.format().is_srgb());
    }
}
