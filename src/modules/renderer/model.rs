use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use log::{error, info, warn};
use wgpu::BindGroupLayout;

use crate::elements::{texture::ColorSpace, IndexBuffer, Texture, VertexBuffer};

use super::{Attribute, VertexT};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
}

impl VertexT for ModelVertex {
    const ATTRIBUTES: &'static [Attribute] = &[
        Attribute::new(wgpu::VertexFormat::Float32x3),
        Attribute::new(wgpu::VertexFormat::Float32x3),
        Attribute::new(wgpu::VertexFormat::Float32x2),
    ];
}

/// cached bind group layout for a diffuse and a specular map
pub fn material_bind_group_layout(device: &wgpu::Device) -> &'static BindGroupLayout {
    static _MATERIAL_BIND_GROUP_LAYOUT: OnceLock<BindGroupLayout> = OnceLock::new();
    _MATERIAL_BIND_GROUP_LAYOUT.get_or_init(|| {
        let texture = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let sampler = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material BindGroupLayout"),
            entries: &[texture(0), sampler(1), texture(2), sampler(3)],
        })
    })
}

pub struct Material {
    pub name: String,
    pub diffuse: Texture,
    pub specular: Texture,
    bind_group: wgpu::BindGroup,
}

impl Material {
    pub fn new(device: &wgpu::Device, name: String, diffuse: Texture, specular: Texture) -> Self {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&name),
            layout: material_bind_group_layout(device),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&diffuse.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&diffuse.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&specular.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&specular.sampler),
                },
            ],
        });
        Material {
            name,
            diffuse,
            specular,
            bind_group,
        }
    }

    fn untextured(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Material::new(
            device,
            "Untextured".into(),
            Texture::create_white_px_texture(device, queue),
            Texture::create_white_px_texture(device, queue),
        )
    }
}

pub struct Mesh {
    pub name: String,
    vertices: VertexBuffer<ModelVertex>,
    indices: IndexBuffer,
    material: usize,
}

/// Meshes loaded from a Wavefront OBJ file, each drawn with the diffuse and specular map of its
/// material. Images are flipped on load, so OBJ texture coordinates are used unchanged.
pub struct Model {
    meshes: Vec<Mesh>,
    /// The last material is the white fallback for meshes without one.
    materials: Vec<Material>,
}

impl Model {
    /// Never fails: a missing or broken OBJ gives a model without meshes, missing textures are
    /// replaced by a white texel.
    pub fn load(device: &wgpu::Device, queue: &wgpu::Queue, path: &Path) -> Self {
        let options = tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        };
        let (models, materials) = match tobj::load_obj(path, &options) {
            Ok(loaded) => loaded,
            Err(err) => {
                error!("Failed to load model {}: {err}", path.display());
                return Model::empty(device, queue);
            }
        };
        let materials = materials.unwrap_or_else(|err| {
            warn!("Failed to load materials of {}: {err}", path.display());
            Vec::new()
        });

        let directory = path.parent().unwrap_or(Path::new("."));
        let mut loaded_materials: Vec<Material> = materials
            .iter()
            .map(|m| {
                let diffuse = load_material_texture(
                    device,
                    queue,
                    directory,
                    m.diffuse_texture.as_deref(),
                    MaterialMap::Diffuse,
                );
                let specular = load_material_texture(
                    device,
                    queue,
                    directory,
                    m.specular_texture.as_deref(),
                    MaterialMap::Specular,
                );
                Material::new(device, m.name.clone(), diffuse, specular)
            })
            .collect();
        let fallback = loaded_materials.len();
        loaded_materials.push(Material::untextured(device, queue));

        let meshes: Vec<Mesh> = models
            .iter()
            .map(|m| Mesh {
                name: m.name.clone(),
                vertices: VertexBuffer::new(build_vertices(&m.mesh), device),
                indices: IndexBuffer::new(m.mesh.indices.clone(), device),
                material: m.mesh.material_id.filter(|&id| id < fallback).unwrap_or(fallback),
            })
            .collect();

        info!(
            "Loaded model {} ({} meshes, {} materials)",
            path.display(),
            meshes.len(),
            fallback
        );
        Model {
            meshes,
            materials: loaded_materials,
        }
    }

    pub fn empty(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Model {
            meshes: Vec::new(),
            materials: vec![Material::untextured(device, queue)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    /// Binds the material of each mesh at `material_group` and issues one indexed draw per mesh.
    pub fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>, material_group: u32) {
        for mesh in self.meshes.iter() {
            if mesh.indices.is_empty() {
                continue;
            }
            let material = &self.materials[mesh.material];
            pass.set_bind_group(material_group, &material.bind_group, &[]);
            pass.set_vertex_buffer(0, mesh.vertices.buffer().slice(..));
            pass.set_index_buffer(mesh.indices.buffer().slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.indices.len(), 0, 0..1);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MaterialMap {
    Diffuse,
    Specular,
}

impl MaterialMap {
    /// Diffuse maps hold colors, specular maps hold intensities.
    fn color_space(self) -> ColorSpace {
        match self {
            MaterialMap::Diffuse => ColorSpace::Srgb,
            MaterialMap::Specular => ColorSpace::Linear,
        }
    }
}

fn load_material_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    directory: &Path,
    file_name: Option<&str>,
    map: MaterialMap,
) -> Texture {
    let Some(file_name) = file_name else {
        return Texture::create_white_px_texture(device, queue);
    };
    let path: PathBuf = directory.join(file_name);
    match Texture::from_path(device, queue, &path, map.color_space()) {
        Ok(texture) => texture,
        Err(err) => {
            warn!("Texture failed to load at path: {} ({err})", path.display());
            Texture::create_white_px_texture(device, queue)
        }
    }
}

/// Interleaves the attribute arrays of a single indexed mesh. Missing normals or texture
/// coordinates are zero.
fn build_vertices(mesh: &tobj::Mesh) -> Vec<ModelVertex> {
    let vertex_count = mesh.positions.len() / 3;
    (0..vertex_count)
        .map(|i| {
            let position = [
                mesh.positions[3 * i],
                mesh.positions[3 * i + 1],
                mesh.positions[3 * i + 2],
            ];
            let normal = match mesh.normals.get(3 * i..3 * i + 3) {
                Some(n) => [n[0], n[1], n[2]],
                None => [0.0; 3],
            };
            let tex_coords = match mesh.texcoords.get(2 * i..2 * i + 2) {
                Some(t) => [t[0], t[1]],
                None => [0.0; 2],
            };
            ModelVertex {
                position,
                normal,
                tex_coords,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{build_vertices, MaterialMap, ModelVertex};
    use crate::elements::texture::ColorSpace;

    #[test]
    fn interleaves_attributes() {
        let mesh = tobj::Mesh {
            positions: vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            normals: vec![0.0, 1.0, 0.0, 1.0, 0.0, 0.0],
            texcoords: vec![0.25, 0.75, 1.0, 0.0],
            indices: vec![0, 1, 0],
            ..Default::default()
        };
        let vertices = build_vertices(&mesh);
        assert_eq!(
            vertices,
            vec![
                ModelVertex {
                    position: [0.0, 1.0, 2.0],
                    normal: [0.0, 1.0, 0.0],
                    tex_coords: [0.25, 0.75],
                },
                ModelVertex {
                    position: [3.0, 4.0, 5.0],
                    normal: [1.0, 0.0, 0.0],
                    tex_coords: [1.0, 0.0],
                },
            ]
        );
    }

    #[test]
    fn missing_attributes_are_zero() {
        let mesh = tobj::Mesh {
            positions: vec![1.0, 2.0, 3.0],
            indices: vec![0],
            ..Default::default()
        };
        let vertices = build_vertices(&mesh);
        assert_eq!(vertices.len(), 1);
        assert_eq!(vertices[0].normal, [0.0; 3]);
        assert_eq!(vertices[0].tex_coords, [0.0; 2]);
    }

    #[test]
    fn vertex_layout_matches_struct() {
        use crate::modules::renderer::VertexT;
        let mut attributes = vec![];
        let layout = ModelVertex::vertex_buffer_layout(&mut attributes);
        assert_eq!(layout.array_stride, 32);
        assert_eq!(layout.attributes[2].offset, 24);
        assert_eq!(layout.attributes[2].shader_location, 2);
    }

    #[test]
    fn specular_maps_are_sampled_as_linear_data() {
        assert_eq!(MaterialMap::Specular.color_space(), ColorSpace::Linear);
        assert_eq!(MaterialMap::Diffuse.color_space(), ColorSpace::Srgb);
    }
}
