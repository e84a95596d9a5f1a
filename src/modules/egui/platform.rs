//! Bridges winit window events into egui's raw input.
//! Loosely follows https://github.com/hasenbanck/egui_winit_platform/blob/master/src/lib.rs

use egui::{
    emath::{pos2, vec2},
    Context, Key, Pos2,
};
use egui_wgpu::renderer::ScreenDescriptor;
use winit::{
    dpi::PhysicalSize,
    event::WindowEvent::{self, *},
    keyboard::{KeyCode, ModifiersState, PhysicalKey},
};

/// Configures the creation of the `Platform`.
#[derive(Debug, Default)]
pub struct PlatformDescriptor {
    /// Width and Height of the window in physical pixel.
    pub physical_size: PhysicalSize<u32>,
    /// Window scale factor.
    pub pixels_per_point: f32,
    /// Egui style configuration.
    pub style: egui::Style,
}

/// Provides the integration between egui and winit.
pub struct Platform {
    physical_size: PhysicalSize<u32>,
    pixels_per_point: f32,
    context: Context,
    raw_input: egui::RawInput,
    modifier_state: ModifiersState,
    pointer_pos: Option<egui::Pos2>,
}

fn screen_rect(physical_size: PhysicalSize<u32>, pixels_per_point: f32) -> egui::Rect {
    egui::Rect::from_min_size(
        Pos2::default(),
        vec2(physical_size.width as f32, physical_size.height as f32) / pixels_per_point,
    )
}

impl Platform {
    pub fn new(descriptor: PlatformDescriptor) -> Self {
        let context = Context::default();
        context.set_style(descriptor.style);
        context.set_pixels_per_point(descriptor.pixels_per_point);
        let raw_input = egui::RawInput {
            screen_rect: Some(screen_rect(
                descriptor.physical_size,
                descriptor.pixels_per_point,
            )),
            ..Default::default()
        };

        Self {
            pixels_per_point: descriptor.pixels_per_point,
            physical_size: descriptor.physical_size,
            context,
            raw_input,
            modifier_state: ModifiersState::empty(),
            pointer_pos: Some(Pos2::default()),
        }
    }

    pub fn screen_descriptor(&self) -> ScreenDescriptor {
        ScreenDescriptor {
            size_in_pixels: [self.physical_size.width, self.physical_size.height],
            pixels_per_point: self.pixels_per_point,
        }
    }

    /// Handles the given winit event and updates the egui context. Should be called before starting a new frame with `begin_frame()`.
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            // winit reports minimizing as a resize to zero
            Resized(PhysicalSize {
                width: 0,
                height: 0,
            }) => {}
            Resized(physical_size) => {
                self.physical_size = *physical_size;
                self.raw_input.screen_rect =
                    Some(screen_rect(self.physical_size, self.pixels_per_point));
            }
            ScaleFactorChanged { scale_factor, .. } => {
                self.pixels_per_point = *scale_factor as f32;
                self.context.set_pixels_per_point(self.pixels_per_point);
                self.raw_input.screen_rect =
                    Some(screen_rect(self.physical_size, self.pixels_per_point));
            }
            MouseInput { state, button, .. } => {
                let button = match button {
                    winit::event::MouseButton::Left => egui::PointerButton::Primary,
                    winit::event::MouseButton::Right => egui::PointerButton::Secondary,
                    winit::event::MouseButton::Middle => egui::PointerButton::Middle,
                    winit::event::MouseButton::Back => egui::PointerButton::Extra1,
                    winit::event::MouseButton::Forward => egui::PointerButton::Extra2,
                    winit::event::MouseButton::Other(_) => return,
                };
                // push event only if the cursor is inside the window
                if let Some(pointer_pos) = self.pointer_pos {
                    self.raw_input.events.push(egui::Event::PointerButton {
                        pos: pointer_pos,
                        button,
                        pressed: *state == winit::event::ElementState::Pressed,
                        modifiers: winit_to_egui_modifiers(self.modifier_state),
                    });
                }
            }
            MouseWheel { delta, .. } => {
                let mut delta = match delta {
                    winit::event::MouseScrollDelta::LineDelta(x, y) => {
                        let line_height = 8.0;
                        vec2(*x, *y) * line_height
                    }
                    winit::event::MouseScrollDelta::PixelDelta(delta) => {
                        vec2(delta.x as f32, delta.y as f32)
                    }
                };
                if cfg!(target_os = "macos") {
                    // See https://github.com/rust-windowing/winit/issues/1695 for more info.
                    delta.x *= -1.0;
                }
                self.raw_input.events.push(egui::Event::Scroll(delta));
            }
            CursorMoved { position, .. } => {
                let pointer_pos = pos2(
                    position.x as f32 / self.pixels_per_point,
                    position.y as f32 / self.pixels_per_point,
                );
                self.pointer_pos = Some(pointer_pos);
                self.raw_input
                    .events
                    .push(egui::Event::PointerMoved(pointer_pos));
            }
            CursorLeft { .. } => {
                self.pointer_pos = None;
                self.raw_input.events.push(egui::Event::PointerGone);
            }
            ModifiersChanged(input) => {
                self.modifier_state = input.state();
                self.raw_input.modifiers = winit_to_egui_modifiers(input.state());
            }
            KeyboardInput { event, .. } => {
                let pressed = event.state.is_pressed();
                let PhysicalKey::Code(keycode) = event.physical_key else {
                    return;
                };
                if let Some(key) = winit_to_egui_key_code(keycode) {
                    if pressed {
                        if let Some(c) = key_code_to_char(keycode, self.modifier_state.shift_key())
                        {
                            self.raw_input.events.push(egui::Event::Text(c.to_string()));
                        }
                    }

                    self.raw_input.events.push(egui::Event::Key {
                        key,
                        physical_key: None,
                        pressed,
                        repeat: event.repeat,
                        modifiers: winit_to_egui_modifiers(self.modifier_state),
                    });
                }
            }
            _ => {}
        }
    }

    /// Starts a new frame, after this the context can be used to add windows.
    pub fn begin_frame(&mut self, total_elapsed_seconds: f64) {
        self.raw_input.time = Some(total_elapsed_seconds);
        self.context.begin_frame(self.raw_input.take());
    }

    /// Ends the frame. Returns what has happened as `Output` and gives you the draw instructions.
    pub fn end_frame(&mut self) -> egui::FullOutput {
        self.context.end_frame()
    }

    /// Returns the internal egui context.
    pub fn context(&self) -> Context {
        self.context.clone()
    }
}

/// Only digits, letters and space produce text; the debug ui only has numeric fields.
fn key_code_to_char(key: KeyCode, shift_pressed: bool) -> Option<char> {
    use KeyCode::*;
    let c = match key {
        Space => ' ',
        Digit0 => '0',
        Digit1 => '1',
        Digit2 => '2',
        Digit3 => '3',
        Digit4 => '4',
        Digit5 => '5',
        Digit6 => '6',
        Digit7 => '7',
        Digit8 => '8',
        Digit9 => '9',
        Minus | NumpadSubtract => '-',
        Period | NumpadDecimal => '.',
        Numpad0 => '0',
        Numpad1 => '1',
        Numpad2 => '2',
        Numpad3 => '3',
        Numpad4 => '4',
        Numpad5 => '5',
        Numpad6 => '6',
        Numpad7 => '7',
        Numpad8 => '8',
        Numpad9 => '9',
        KeyE => 'E',
        _ => {
            return None;
        }
    };

    Some(if !shift_pressed {
        c.to_ascii_lowercase()
    } else {
        c
    })
}

/// Translates winit to egui keycodes, for the keys that text fields react to.
#[inline]
fn winit_to_egui_key_code(key: KeyCode) -> Option<egui::Key> {
    use KeyCode::*;
    Some(match key {
        Escape => Key::Escape,
        Home => Key::Home,
        Delete => Key::Delete,
        End => Key::End,
        ArrowLeft => Key::ArrowLeft,
        ArrowUp => Key::ArrowUp,
        ArrowRight => Key::ArrowRight,
        ArrowDown => Key::ArrowDown,
        Backspace => Key::Backspace,
        Enter | NumpadEnter => Key::Enter,
        Tab => Key::Tab,
        Space => Key::Space,
        Digit0 | Numpad0 => Key::Num0,
        Digit1 | Numpad1 => Key::Num1,
        Digit2 | Numpad2 => Key::Num2,
        Digit3 | Numpad3 => Key::Num3,
        Digit4 | Numpad4 => Key::Num4,
        Digit5 | Numpad5 => Key::Num5,
        Digit6 | Numpad6 => Key::Num6,
        Digit7 | Numpad7 => Key::Num7,
        Digit8 | Numpad8 => Key::Num8,
        Digit9 | Numpad9 => Key::Num9,
        Minus | NumpadSubtract => Key::Minus,
        KeyA => Key::A,
        KeyC => Key::C,
        KeyE => Key::E,
        KeyV => Key::V,
        KeyX => Key::X,
        KeyZ => Key::Z,
        _ => {
            return None;
        }
    })
}

/// Translates winit to egui modifier keys.
#[inline]
fn winit_to_egui_modifiers(modifiers: ModifiersState) -> egui::Modifiers {
    egui::Modifiers {
        alt: modifiers.alt_key(),
        ctrl: modifiers.control_key(),
        shift: modifiers.shift_key(),
        mac_cmd: false,
        command: modifiers.control_key(),
    }
}

#[cfg(test)]
mod tests {
    use winit::keyboard::KeyCode;

    use super::{key_code_to_char, winit_to_egui_key_code};

    #[test]
    fn numeric_keys_produce_text() {
        assert_eq!(key_code_to_char(KeyCode::Digit7, false), Some('7'));
        assert_eq!(key_code_to_char(KeyCode::NumpadDecimal, false), Some('.'));
        assert_eq!(key_code_to_char(KeyCode::KeyE, false), Some('e'));
        assert_eq!(key_code_to_char(KeyCode::KeyQ, false), None);
    }

    #[test]
    fn editing_keys_are_translated() {
        assert_eq!(
            winit_to_egui_key_code(KeyCode::Backspace),
            Some(egui::Key::Backspace)
        );
        assert_eq!(winit_to_egui_key_code(KeyCode::F1), None);
    }
}
