use std::{borrow::Cow, path::Path};

use bytemuck::Zeroable;
use glam::{Mat3, Mat4};
use log::warn;

use crate::elements::{
    buffer::uniform_bind_group_layout, texture::cube_bind_group_layout, CubeFaces, CubeTexture,
    UniformBuffer, VertexBuffer,
};

use super::{Attribute, VertexT, DEPTH_FORMAT, HDR_COLOR_FORMAT};

/// Face images in layer order +X, -X, +Y, -Y, +Z, -Z.
pub const FACE_FILES: [&str; 6] = [
    "front.jpg",
    "back.jpg",
    "top.jpg",
    "bottom.jpg",
    "left.jpg",
    "right.jpg",
];

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct SkyboxVertex {
    position: [f32; 3],
}

impl VertexT for SkyboxVertex {
    const ATTRIBUTES: &'static [Attribute] =
        &[Attribute::new(wgpu::VertexFormat::Float32x3)];
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct SkyboxUniforms {
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
}

/// Removes the translation, so the sky stays centered on the camera.
pub fn rotation_only(view: Mat4) -> Mat4 {
    Mat4::from_mat3(Mat3::from_mat4(view))
}

/// A cube map drawn around the camera after the scene geometry. Depth is forced to the far plane
/// and compared with `LessEqual`, so the sky only shows where nothing else was drawn.
pub struct Skybox {
    pipeline: wgpu::RenderPipeline,
    vertices: VertexBuffer<SkyboxVertex>,
    uniforms: UniformBuffer<SkyboxUniforms>,
    cube_texture: CubeTexture,
}

impl Skybox {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, faces_dir: &Path) -> Self {
        let paths = FACE_FILES.map(|file| faces_dir.join(file));
        let faces = CubeFaces::decode(&paths, true);
        if faces.decoded_count() < 6 {
            warn!(
                "Skybox in {} has only {} of 6 faces",
                faces_dir.display(),
                faces.decoded_count()
            );
        }
        let cube_texture = CubeTexture::from_faces(device, queue, &faces);

        let uniform_layout =
            uniform_bind_group_layout(device, "Skybox Uniforms", wgpu::ShaderStages::VERTEX);
        let uniforms = UniformBuffer::new(SkyboxUniforms::zeroed(), device, &uniform_layout)
            .named("Skybox Uniforms");

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Skybox Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout, cube_bind_group_layout(device)],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Skybox Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!("skybox.wgsl"))),
        });

        let mut empty = vec![];
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Skybox Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[SkyboxVertex::vertex_buffer_layout(&mut empty)],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[
                    Some(HDR_COLOR_FORMAT.into()),
                    Some(HDR_COLOR_FORMAT.into()),
                ],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let vertices = VertexBuffer::new(cube_vertices(), device);

        Skybox {
            pipeline,
            vertices,
            uniforms,
            cube_texture,
        }
    }

    pub fn prepare(&mut self, queue: &wgpu::Queue, view: Mat4, projection: Mat4) {
        let uniforms = SkyboxUniforms {
            view: rotation_only(view).to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
        };
        self.uniforms.update_and_prepare(uniforms, queue);
    }

    /// Expects a pass on the hdr target that already contains the scene's depth.
    pub fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, self.uniforms.bind_group(), &[]);
        pass.set_bind_group(1, &self.cube_texture.bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertices.buffer().slice(..));
        pass.draw(0..self.vertices.len(), 0..1);
    }
}

/// 36 vertices, two triangles per face of the unit cube.
fn cube_vertices() -> Vec<SkyboxVertex> {
    #[rustfmt::skip]
    const POSITIONS: [[f32; 3]; 36] = [
        [-1.0,  1.0, -1.0], [-1.0, -1.0, -1.0], [ 1.0, -1.0, -1.0],
        [ 1.0, -1.0, -1.0], [ 1.0,  1.0, -1.0], [-1.0,  1.0, -1.0],

        [-1.0, -1.0,  1.0], [-1.0, -1.0, -1.0], [-1.0,  1.0, -1.0],
        [-1.0,  1.0, -1.0], [-1.0,  1.0,  1.0], [-1.0, -1.0,  1.0],

        [ 1.0, -1.0, -1.0], [ 1.0, -1.0,  1.0], [ 1.0,  1.0,  1.0],
        [ 1.0,  1.0,  1.0], [ 1.0,  1.0, -1.0], [ 1.0, -1.0, -1.0],

        [-1.0, -1.0,  1.0], [-1.0,  1.0,  1.0], [ 1.0,  1.0,  1.0],
        [ 1.0,  1.0,  1.0], [ 1.0, -1.0,  1.0], [-1.0, -1.0,  1.0],

        [-1.0,  1.0, -1.0], [ 1.0,  1.0, -1.0], [ 1.0,  1.0,  1.0],
        [ 1.0,  1.0,  1.0], [-1.0,  1.0,  1.0], [-1.0,  1.0, -1.0],

        [-1.0, -1.0, -1.0], [-1.0, -1.0,  1.0], [ 1.0, -1.0, -1.0],
        [ 1.0, -1.0, -1.0], [-1.0, -1.0,  1.0], [ 1.0, -1.0,  1.0],
    ];
    POSITIONS
        .iter()
        .map(|&position| SkyboxVertex { position })
        .collect()
}

#[cfg(test)]
mod tests {
    use glam::{vec3, Mat4, Vec3, Vec4};

    use super::{cube_vertices, rotation_only};

    #[test]
    fn rotation_only_drops_translation() {
        let view = Mat4::look_at_rh(vec3(10.0, -4.0, 7.0), vec3(11.0, -4.0, 6.0), Vec3::Y);
        let sky_view = rotation_only(view);
        assert_eq!(sky_view.w_axis, Vec4::W);
        assert!(sky_view
            .transform_vector3(Vec3::X)
            .abs_diff_eq(view.transform_vector3(Vec3::X), 1e-6));
    }

    #[test]
    fn cube_has_six_faces() {
        let vertices = cube_vertices();
        assert_eq!(vertices.len(), 36);
        assert!(vertices
            .iter()
            .all(|v| v.position.iter().all(|c| c.abs() == 1.0)));
    }
}
