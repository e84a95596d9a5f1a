use std::borrow::Cow;

use crate::elements::{texture::rgba_bind_group_layout, Color};

use super::{
    render_target::{PingPongIndex, RenderTargets},
    screen_primitive_state, ScreenVertexShader, HDR_COLOR_FORMAT,
};

/// Where a blur pass samples from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlurSource {
    /// Slot 1 of the hdr target, written by the scene pass.
    BrightPass,
    PingPong(PingPongIndex),
}

/// One full screen blur pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlurStep {
    pub write: PingPongIndex,
    pub read: BlurSource,
    pub horizontal: bool,
}

/// The sequence of passes of the separable blur. The first pass samples the bright pass,
/// every later pass samples what the pass before it wrote. Directions alternate, starting horizontal.
///
/// An odd number of iterations ends on a horizontal pass, so the result is blurred more along x.
#[derive(Debug, Clone)]
pub struct BlurSchedule {
    remaining: u32,
    horizontal: bool,
    first_iteration: bool,
}

impl BlurSchedule {
    pub fn new(iterations: u32) -> Self {
        BlurSchedule {
            remaining: iterations,
            horizontal: true,
            first_iteration: true,
        }
    }

    /// The texture holding the blurred image once all passes ran. Without any pass that is the bright
    /// pass itself.
    pub fn output(iterations: u32) -> BlurSource {
        BlurSchedule::new(iterations)
            .last()
            .map(|step| BlurSource::PingPong(step.write))
            .unwrap_or(BlurSource::BrightPass)
    }
}

impl Iterator for BlurSchedule {
    type Item = BlurStep;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let write = PingPongIndex::for_direction(self.horizontal);
        let read = if self.first_iteration {
            BlurSource::BrightPass
        } else {
            BlurSource::PingPong(PingPongIndex::for_direction(!self.horizontal))
        };
        let step = BlurStep {
            write,
            read,
            horizontal: self.horizontal,
        };

        self.horizontal = !self.horizontal;
        self.first_iteration = false;
        Some(step)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining as usize;
        (remaining, Some(remaining))
    }
}

/// Gaussian blur of the bright pass, ping ponging between the two blur targets.
/// The direction is passed to the fragment shader as a push constant.
pub struct BlurStage {
    pipeline: wgpu::RenderPipeline,
    iterations: u32,
}

impl BlurStage {
    pub fn new(
        device: &wgpu::Device,
        screen_vertex_shader: &ScreenVertexShader,
        iterations: u32,
    ) -> Self {
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Blur Pipeline Layout"),
            bind_group_layouts: &[rgba_bind_group_layout(device)],
            push_constant_ranges: &[wgpu::PushConstantRange {
                stages: wgpu::ShaderStages::FRAGMENT,
                range: 0..4,
            }],
        });

        let fragment_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Blur Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!("blur.wgsl"))),
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Blur Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: screen_vertex_shader.vertex_state(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment_shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: HDR_COLOR_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: screen_primitive_state(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        BlurStage {
            pipeline,
            iterations,
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Records all blur passes and returns where the result ended up.
    pub fn apply(&self, encoder: &mut wgpu::CommandEncoder, targets: &RenderTargets) -> BlurSource {
        for step in BlurSchedule::new(self.iterations) {
            let input = targets.blur_source(step.read);
            let mut pass = targets
                .ping_pong(step.write)
                .begin_pass(encoder, Color::BLACK);
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &input.bind_group, &[]);
            pass.set_push_constants(
                wgpu::ShaderStages::FRAGMENT,
                0,
                bytemuck::bytes_of(&(step.horizontal as u32)),
            );
            pass.draw(0..3, 0..1);
        }
        BlurSchedule::output(self.iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::{BlurSchedule, BlurSource, BlurStep};
    use crate::modules::renderer::PingPongIndex::{self, A, B};

    #[test]
    fn first_pass_reads_bright_pass() {
        let first = BlurSchedule::new(10).next().unwrap();
        assert_eq!(
            first,
            BlurStep {
                write: B,
                read: BlurSource::BrightPass,
                horizontal: true
            }
        );
    }

    #[test]
    fn later_passes_read_the_previous_write() {
        let steps: Vec<BlurStep> = BlurSchedule::new(10).collect();
        assert_eq!(steps.len(), 10);
        for pair in steps.windows(2) {
            assert_eq!(pair[1].read, BlurSource::PingPong(pair[0].write));
            assert_ne!(pair[1].write, pair[0].write);
            assert_ne!(pair[1].horizontal, pair[0].horizontal);
        }
    }

    #[test]
    fn ten_iterations_end_in_a() {
        // simulate the flag the way the frame loop flips it
        let mut horizontal = true;
        for _ in 0..10 {
            horizontal = !horizontal;
        }
        let expected = PingPongIndex::for_direction(!horizontal);
        assert_eq!(expected, A);
        assert_eq!(BlurSchedule::output(10), BlurSource::PingPong(expected));
    }

    #[test]
    fn odd_iterations_end_on_horizontal_pass() {
        let last = BlurSchedule::new(3).last().unwrap();
        assert!(last.horizontal);
        assert_eq!(BlurSchedule::output(3), BlurSource::PingPong(B));
        assert_eq!(BlurSchedule::output(1), BlurSource::PingPong(B));
    }

    #[test]
    fn zero_iterations_leave_the_bright_pass() {
        assert_eq!(BlurSchedule::new(0).count(), 0);
        assert_eq!(BlurSchedule::output(0), BlurSource::BrightPass);
    }
}
