use std::{borrow::Cow, path::Path};

use glam::{vec3, Mat4, Vec3};

use crate::{
    elements::{buffer::uniform_bind_group_layout, Color, ToRaw, UniformBuffer},
    modules::Camera,
};

use super::{
    model::material_bind_group_layout, Model, ModelVertex, RenderTarget, Skybox, VertexT,
    DEPTH_FORMAT, HDR_COLOR_FORMAT,
};

pub const NEAR: f32 = 0.1;
pub const FAR: f32 = 100.0;
pub const SHININESS: f32 = 32.0;
pub const POINT_LIGHT_COUNT: usize = 4;

/// Coefficients of `1 / (constant + linear * d + quadratic * d^2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for Attenuation {
    fn default() -> Self {
        Attenuation {
            constant: 1.0,
            linear: 0.02,
            quadratic: 0.032,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirLight {
    pub direction: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub attenuation: Attenuation,
}

/// The fixed light set of the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lighting {
    pub dir_light: DirLight,
    pub point_lights: [PointLight; POINT_LIGHT_COUNT],
    pub shininess: f32,
}

impl Lighting {
    /// Light 1 bobs up and down with `time`, everything else is constant.
    pub fn at_time(time: f32, attenuation: Attenuation) -> Self {
        let point_light = |position: Vec3, ambient: f32, diffuse: Vec3, specular: f32| PointLight {
            position,
            ambient: Vec3::splat(ambient),
            diffuse,
            specular: Vec3::splat(specular),
            attenuation,
        };
        Lighting {
            dir_light: DirLight {
                direction: vec3(-6.6, -25.0, -6.6),
                ambient: Vec3::splat(0.06),
                diffuse: vec3(0.6, 0.2, 0.2),
                specular: Vec3::splat(0.1),
            },
            point_lights: [
                point_light(vec3(0.0, 25.0, -40.0), 0.02, Vec3::splat(0.02), 0.22),
                point_light(
                    vec3(30.0, 30.0 + 2.0 * (2.0 * time).sin(), -1.0),
                    0.003,
                    vec3(1.55, 1.55, 1.56),
                    1.12,
                ),
                point_light(vec3(-40.0, 25.0, -20.0), 0.04, Vec3::splat(0.2), 0.22),
                point_light(vec3(0.0, 25.0, -40.0), 0.04, Vec3::splat(0.2), 0.22),
            ],
            shininess: SHININESS,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DirLightRaw {
    direction: [f32; 4],
    ambient: [f32; 4],
    diffuse: [f32; 4],
    specular: [f32; 4],
}

impl ToRaw for DirLight {
    type Raw = DirLightRaw;

    fn to_raw(&self) -> Self::Raw {
        DirLightRaw {
            direction: self.direction.extend(0.0).to_array(),
            ambient: self.ambient.extend(0.0).to_array(),
            diffuse: self.diffuse.extend(0.0).to_array(),
            specular: self.specular.extend(0.0).to_array(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointLightRaw {
    position: [f32; 4],
    ambient: [f32; 4],
    diffuse: [f32; 4],
    specular: [f32; 4],
    /// constant, linear, quadratic, unused
    attenuation: [f32; 4],
}

impl ToRaw for PointLight {
    type Raw = PointLightRaw;

    fn to_raw(&self) -> Self::Raw {
        let a = self.attenuation;
        PointLightRaw {
            position: self.position.extend(1.0).to_array(),
            ambient: self.ambient.extend(0.0).to_array(),
            diffuse: self.diffuse.extend(0.0).to_array(),
            specular: self.specular.extend(0.0).to_array(),
            attenuation: [a.constant, a.linear, a.quadratic, 0.0],
        }
    }
}

/// Everything the scene shader reads once per frame. vec3s are padded to vec4 for the uniform
/// layout, the view position carries the shininess in w.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SceneUniforms {
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
    view_position: [f32; 4],
    dir_light: DirLightRaw,
    point_lights: [PointLightRaw; POINT_LIGHT_COUNT],
}

impl SceneUniforms {
    pub fn new(view: Mat4, projection: Mat4, view_position: Vec3, lighting: &Lighting) -> Self {
        SceneUniforms {
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            view_position: view_position.extend(lighting.shininess).to_array(),
            dir_light: lighting.dir_light.to_raw(),
            point_lights: lighting.point_lights.map(|p| p.to_raw()),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniforms {
    model: [[f32; 4]; 4],
}

/// One placement of the island model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IslandInstance {
    pub position: Vec3,
    pub scale: f32,
    /// Rotation around +Y, in degrees.
    pub rotation: f32,
    pub bob_amplitude: f32,
}

pub const ISLANDS: [IslandInstance; 3] = [
    IslandInstance::new(vec3(0.0, 17.0, -40.0), -55.0),
    IslandInstance::new(vec3(20.0, 17.0, 0.0), -130.0),
    IslandInstance::new(vec3(-40.0, 17.0, -20.0), 20.0),
];

impl IslandInstance {
    pub const fn new(position: Vec3, rotation: f32) -> Self {
        IslandInstance {
            position,
            scale: 0.02,
            rotation,
            bob_amplitude: 2.0,
        }
    }

    /// translate * scale * rotate, with the translation bobbing by `amplitude * sin(time)`.
    pub fn model_matrix(&self, time: f32) -> Mat4 {
        let position = self.position + Vec3::Y * (self.bob_amplitude * time.sin());
        Mat4::from_translation(position)
            * Mat4::from_scale(Vec3::splat(self.scale))
            * Mat4::from_axis_angle(Vec3::Y, self.rotation.to_radians())
    }
}

pub fn projection_matrix(zoom_degrees: f32, aspect: f32) -> Mat4 {
    Mat4::perspective_rh(zoom_degrees.to_radians(), aspect, NEAR, FAR)
}

/// Draws the islands and the sky into both color slots of the hdr target.
/// Slot 0 gets the lit color, slot 1 only what is brighter than the bloom threshold.
pub struct ScenePass {
    pipeline: wgpu::RenderPipeline,
    scene_uniforms: UniformBuffer<SceneUniforms>,
    /// one buffer per island, all written before the pass is recorded
    island_uniforms: Vec<(IslandInstance, UniformBuffer<ModelUniforms>)>,
    model: Model,
    skybox: Skybox,
}

impl ScenePass {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, resources_dir: &Path) -> Self {
        let model = Model::load(
            device,
            queue,
            &resources_dir.join("objects/island/untitled.obj"),
        );
        let skybox = Skybox::new(device, queue, &resources_dir.join("textures/skybox"));

        let scene_layout = uniform_bind_group_layout(
            device,
            "Scene Uniforms",
            wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        );
        let model_layout =
            uniform_bind_group_layout(device, "Model Uniforms", wgpu::ShaderStages::VERTEX);

        let lighting = Lighting::at_time(0.0, Attenuation::default());
        let scene_uniforms = UniformBuffer::new(
            SceneUniforms::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ZERO, &lighting),
            device,
            &scene_layout,
        )
        .named("Scene Uniforms");
        let island_uniforms = ISLANDS
            .iter()
            .map(|island| {
                let uniforms = ModelUniforms {
                    model: island.model_matrix(0.0).to_cols_array_2d(),
                };
                let buffer = UniformBuffer::new(uniforms, device, &model_layout).named("Island");
                (*island, buffer)
            })
            .collect();

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[
                &scene_layout,
                &model_layout,
                material_bind_group_layout(device),
            ],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!("scene.wgsl"))),
        });

        let mut empty = vec![];
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Scene Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[ModelVertex::vertex_buffer_layout(&mut empty)],
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
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        ScenePass {
            pipeline,
            scene_uniforms,
            island_uniforms,
            model,
            skybox,
        }
    }

    pub fn prepare(
        &mut self,
        queue: &wgpu::Queue,
        camera: &Camera,
        aspect: f32,
        time: f32,
        attenuation: Attenuation,
    ) {
        let view = camera.view_matrix();
        let projection = projection_matrix(camera.zoom, aspect);
        let lighting = Lighting::at_time(time, attenuation);
        self.scene_uniforms.update_and_prepare(
            SceneUniforms::new(view, projection, camera.position, &lighting),
            queue,
        );
        for (island, buffer) in self.island_uniforms.iter_mut() {
            let uniforms = ModelUniforms {
                model: island.model_matrix(time).to_cols_array_2d(),
            };
            buffer.update_and_prepare(uniforms, queue);
        }
        self.skybox.prepare(queue, view, projection);
    }

    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, target: &RenderTarget, clear_color: Color) {
        let mut pass = target.begin_pass(encoder, clear_color);

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, self.scene_uniforms.bind_group(), &[]);
        for (_, buffer) in self.island_uniforms.iter() {
            pass.set_bind_group(1, buffer.bind_group(), &[]);
            self.model.draw(&mut pass, 2);
        }

        // last, so it is only visible where no island was drawn
        self.skybox.draw(&mut pass);
    }
}

#[cfg(test)]
mod tests {
    use glam::{vec3, Mat4, Vec3, Vec4};

    use super::{
        projection_matrix, Attenuation, IslandInstance, Lighting, PointLightRaw, SceneUniforms,
        ISLANDS,
    };

    #[test]
    fn model_matrix_is_translate_scale_rotate() {
        let island = IslandInstance::new(vec3(20.0, 17.0, 0.0), -130.0);
        let (sin, cos) = (-130f32).to_radians().sin_cos();
        let s = 0.02;
        // columns of T * S * R_y, written out by hand
        let expected = Mat4::from_cols(
            Vec4::new(s * cos, 0.0, -s * sin, 0.0),
            Vec4::new(0.0, s, 0.0, 0.0),
            Vec4::new(s * sin, 0.0, s * cos, 0.0),
            Vec4::new(20.0, 17.0, 0.0, 1.0),
        );
        assert!(island.model_matrix(0.0).abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn islands_bob_with_time() {
        let island = ISLANDS[0];
        let t = std::f32::consts::FRAC_PI_2;
        let translation = island.model_matrix(t).w_axis;
        assert!(translation.abs_diff_eq(Vec4::new(0.0, 19.0, -40.0, 1.0), 1e-5));
    }

    #[test]
    fn only_the_second_light_moves() {
        let a = Lighting::at_time(0.0, Attenuation::default());
        let b = Lighting::at_time(0.7, Attenuation::default());
        assert_eq!(a.point_lights[0], b.point_lights[0]);
        assert_ne!(a.point_lights[1].position, b.point_lights[1].position);
        assert_eq!(a.point_lights[1].position, vec3(30.0, 30.0, -1.0));
    }

    #[test]
    fn uniform_layout_is_vec4_aligned() {
        assert_eq!(std::mem::size_of::<PointLightRaw>(), 80);
        assert_eq!(std::mem::size_of::<SceneUniforms>() % 16, 0);
        let lighting = Lighting::at_time(0.0, Attenuation::default());
        let uniforms = SceneUniforms::new(Mat4::IDENTITY, Mat4::IDENTITY, Vec3::ONE, &lighting);
        assert_eq!(uniforms.view_position, [1.0, 1.0, 1.0, 32.0]);
        assert_eq!(uniforms.point_lights[3].attenuation, [1.0, 0.02, 0.032, 0.0]);
    }

    #[test]
    fn projection_uses_zoom_as_fov() {
        let p = projection_matrix(45.0, 1200.0 / 900.0);
        let expected = Mat4::perspective_rh(45f32.to_radians(), 4.0 / 3.0, 0.1, 100.0);
        assert!(p.abs_diff_eq(expected, 1e-6));
    }
}
