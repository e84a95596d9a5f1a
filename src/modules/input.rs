use glam::{vec2, Vec2};
use smallvec::SmallVec;
use winit::{
    event::{DeviceEvent, ElementState, KeyEvent, MouseScrollDelta, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

/// Collects window and device events between two frames. At the top of a frame the state is turned
/// into a [`FrameInput`] with [`Input::poll`], and [`Input::end_frame`] clears the per-frame parts.
#[derive(Debug, Default)]
pub struct Input {
    keys: KeyState,
    close_requested: bool,
    mouse_motion: Vec2,
    scroll: f32,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receive_window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let KeyEvent {
                    physical_key: PhysicalKey::Code(key),
                    state,
                    ..
                } = event
                {
                    self.keys.receive_element_state(*key, *state)
                }
            }
            WindowEvent::MouseWheel { delta, .. } => match delta {
                MouseScrollDelta::LineDelta(_right, down) => {
                    self.scroll += down;
                }
                MouseScrollDelta::PixelDelta(pos) => {
                    // roughly one line per 20 px
                    self.scroll += pos.y as f32 / 20.0;
                }
            },
            _ => {}
        }
    }

    /// Raw mouse motion keeps arriving while the cursor is grabbed, cursor positions do not.
    pub fn receive_device_event(&mut self, event: &DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            self.mouse_motion += vec2(*dx as f32, *dy as f32);
        }
    }

    /// Reads the current device state into one batch for this frame.
    pub fn poll(&self) -> FrameInput {
        let keys = &self.keys;
        FrameInput {
            forward: keys.is_pressed(KeyCode::KeyW),
            backward: keys.is_pressed(KeyCode::KeyS),
            left: keys.is_pressed(KeyCode::KeyA),
            right: keys.is_pressed(KeyCode::KeyD),
            hdr_key: keys.is_down_this_frame(KeyCode::Space),
            bloom_key: keys.is_down_this_frame(KeyCode::KeyB),
            exposure_down: keys.is_pressed(KeyCode::KeyQ),
            exposure_up: keys.is_pressed(KeyCode::KeyE),
            toggle_ui: keys.just_pressed(KeyCode::F1),
            close: self.close_requested || keys.is_pressed(KeyCode::Escape),
            // screen y grows downwards, pitch grows upwards.
            mouse_delta: vec2(self.mouse_motion.x, -self.mouse_motion.y),
            scroll: self.scroll,
        }
    }

    pub fn end_frame(&mut self) {
        self.keys.clear_at_end_of_frame();
        self.close_requested = false;
        self.mouse_motion = Vec2::ZERO;
        self.scroll = 0.0;
    }
}

/// Everything the frame driver reads from the input devices, sampled once per frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameInput {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub hdr_key: bool,
    pub bloom_key: bool,
    pub exposure_down: bool,
    pub exposure_up: bool,
    pub toggle_ui: bool,
    pub close: bool,
    pub mouse_delta: Vec2,
    pub scroll: f32,
}

/// Turns a held key into a single trigger. Fires on the first frame the key is seen down and not again
/// until the key was seen released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyLatch {
    latched: bool,
}

impl KeyLatch {
    /// Returns true if the action bound to the key should fire this frame.
    pub fn update(&mut self, pressed: bool) -> bool {
        if !pressed {
            self.latched = false;
            return false;
        }
        if self.latched {
            return false;
        }
        self.latched = true;
        true
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeyState {
    just_pressed: SmallVec<[KeyCode; 4]>,
    pressed: SmallVec<[KeyCode; 4]>,
    just_released: SmallVec<[KeyCode; 4]>,
}

impl KeyState {
    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.pressed.contains(&key)
    }

    pub fn just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed.contains(&key)
    }

    /// Held now, or pressed and already released again since the last frame.
    pub fn is_down_this_frame(&self, key: KeyCode) -> bool {
        self.is_pressed(key) || self.just_pressed(key)
    }

    pub fn just_released(&self, key: KeyCode) -> bool {
        self.just_released.contains(&key)
    }

    pub fn clear_at_end_of_frame(&mut self) {
        self.just_pressed.clear();
        self.just_released.clear();
    }

    pub fn receive_element_state(&mut self, value: KeyCode, element_state: ElementState) {
        let pressed_already = self.pressed.contains(&value);
        match element_state {
            ElementState::Released => {
                if pressed_already {
                    self.pressed.retain(|e| *e != value);
                }
                self.just_released.push(value);
            }
            ElementState::Pressed => {
                // key repeat sends more pressed events for a held key.
                if !pressed_already {
                    self.just_pressed.push(value);
                    self.pressed.push(value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use winit::{event::ElementState, keyboard::KeyCode};

    use super::{Input, KeyLatch, KeyState};

    #[test]
    fn latch_fires_once_per_press() {
        let mut latch = KeyLatch::default();
        let fired: usize = (0..30).map(|_| latch.update(true) as usize).sum();
        assert_eq!(fired, 1);
        assert!(!latch.update(false));
        assert!(latch.update(true));
    }

    #[test]
    fn latch_resets_on_release() {
        let mut latch = KeyLatch::default();
        assert!(latch.update(true));
        assert!(latch.is_latched());
        latch.update(false);
        assert!(!latch.is_latched());
    }

    #[test]
    fn key_repeat_does_not_duplicate_presses() {
        let mut keys = KeyState::default();
        keys.receive_element_state(KeyCode::KeyB, ElementState::Pressed);
        keys.clear_at_end_of_frame();
        keys.receive_element_state(KeyCode::KeyB, ElementState::Pressed);
        assert!(keys.is_pressed(KeyCode::KeyB));
        assert!(!keys.just_pressed(KeyCode::KeyB));
        keys.receive_element_state(KeyCode::KeyB, ElementState::Released);
        assert!(!keys.is_pressed(KeyCode::KeyB));
        assert!(keys.just_released(KeyCode::KeyB));
    }

    #[test]
    fn poll_maps_keys_to_frame_input() {
        let mut input = Input::new();
        let keys = [KeyCode::KeyW, KeyCode::Space, KeyCode::KeyQ, KeyCode::F1];
        for key in keys {
            input
                .keys
                .receive_element_state(key, ElementState::Pressed);
        }
        let frame = input.poll();
        assert!(frame.forward && frame.hdr_key && frame.exposure_down && frame.toggle_ui);
        assert!(!frame.bloom_key && !frame.close);

        input.end_frame();
        let frame = input.poll();
        // F1 is only reported on the frame it went down
        assert!(!frame.toggle_ui);
        assert!(frame.hdr_key);
    }

    #[test]
    fn escape_closes() {
        let mut input = Input::new();
        input
            .keys
            .receive_element_state(KeyCode::Escape, ElementState::Pressed);
        assert!(input.poll().close);
    }

    /// Runs `frames` frames through poll and the latch, returning how often the latch fired.
    fn toggles(input: &mut Input, latch: &mut KeyLatch, frames: usize) -> usize {
        let mut fired = 0;
        for _ in 0..frames {
            if latch.update(input.poll().hdr_key) {
                fired += 1;
            }
            input.end_frame();
        }
        fired
    }

    #[test]
    fn tap_within_one_frame_toggles_once() {
        let mut input = Input::new();
        let mut latch = KeyLatch::default();
        input
            .keys
            .receive_element_state(KeyCode::Space, ElementState::Pressed);
        input
            .keys
            .receive_element_state(KeyCode::Space, ElementState::Released);
        assert_eq!(toggles(&mut input, &mut latch, 3), 1);
    }

    #[test]
    fn key_held_across_frames_toggles_once() {
        let mut input = Input::new();
        let mut latch = KeyLatch::default();
        input
            .keys
            .receive_element_state(KeyCode::Space, ElementState::Pressed);
        assert_eq!(toggles(&mut input, &mut latch, 10), 1);
        input
            .keys
            .receive_element_state(KeyCode::Space, ElementState::Released);
        assert_eq!(toggles(&mut input, &mut latch, 2), 0);

        input
            .keys
            .receive_element_state(KeyCode::Space, ElementState::Pressed);
        assert_eq!(toggles(&mut input, &mut latch, 2), 1);
    }
}
