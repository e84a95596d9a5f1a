use glam::{vec3, Mat4, Vec3};

pub const YAW: f32 = -90.0;
pub const PITCH: f32 = 0.0;
pub const SPEED: f32 = 2.5;
pub const SENSITIVITY: f32 = 0.1;
pub const ZOOM: f32 = 45.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMovement {
    Forward,
    Backward,
    Left,
    Right,
}

/// Fly camera with euler angles in degrees. `zoom` is the vertical field of view, also in degrees.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    front: Vec3,
    up: Vec3,
    right: Vec3,
    world_up: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub movement_speed: f32,
    pub mouse_sensitivity: f32,
    pub zoom: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Camera::new(vec3(0.0, 0.0, 3.0))
    }
}

impl Camera {
    pub fn new(position: Vec3) -> Self {
        let mut camera = Camera {
            position,
            front: vec3(0.0, 0.0, -1.0),
            up: Vec3::Y,
            right: Vec3::X,
            world_up: Vec3::Y,
            yaw: YAW,
            pitch: PITCH,
            movement_speed: SPEED,
            mouse_sensitivity: SENSITIVITY,
            zoom: ZOOM,
        };
        camera.update_camera_vectors();
        camera
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    /// Points the camera along `front`. Yaw and pitch are derived from it, so later mouse movement
    /// continues from this orientation. A zero vector is ignored.
    pub fn set_front(&mut self, front: Vec3) {
        let Some(front) = front.try_normalize() else {
            return;
        };
        self.pitch = front.y.clamp(-1.0, 1.0).asin().to_degrees().clamp(-89.0, 89.0);
        self.yaw = front.z.atan2(front.x).to_degrees();
        self.update_camera_vectors();
    }

    pub fn process_keyboard(&mut self, direction: CameraMovement, delta_time: f32) {
        let velocity = self.movement_speed * delta_time;
        match direction {
            CameraMovement::Forward => self.position += self.front * velocity,
            CameraMovement::Backward => self.position -= self.front * velocity,
            CameraMovement::Left => self.position -= self.right * velocity,
            CameraMovement::Right => self.position += self.right * velocity,
        }
    }

    pub fn process_mouse_movement(&mut self, x_offset: f32, y_offset: f32) {
        self.yaw += x_offset * self.mouse_sensitivity;
        self.pitch += y_offset * self.mouse_sensitivity;
        // past 90 degrees the view flips
        self.pitch = self.pitch.clamp(-89.0, 89.0);
        self.update_camera_vectors();
    }

    pub fn process_mouse_scroll(&mut self, y_offset: f32) {
        self.zoom = (self.zoom - y_offset).clamp(1.0, ZOOM);
    }

    fn update_camera_vectors(&mut self) {
        let (sin_yaw, cos_yaw) = self.yaw.to_radians().sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.to_radians().sin_cos();
        self.front = vec3(cos_yaw * cos_pitch, sin_pitch, sin_yaw * cos_pitch).normalize();
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}

#[cfg(test)]
mod tests {
    use glam::{vec3, Vec3};

    use super::{Camera, CameraMovement};

    #[test]
    fn default_camera_looks_down_negative_z() {
        let camera = Camera::default();
        assert!(camera.front().abs_diff_eq(vec3(0.0, 0.0, -1.0), 1e-6));
        assert!(camera.right().abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn keyboard_moves_along_front_and_right() {
        let mut camera = Camera::new(Vec3::ZERO);
        camera.process_keyboard(CameraMovement::Forward, 2.0);
        assert!(camera.position.abs_diff_eq(vec3(0.0, 0.0, -5.0), 1e-5));
        camera.process_keyboard(CameraMovement::Right, 1.0);
        assert!(camera.position.abs_diff_eq(vec3(2.5, 0.0, -5.0), 1e-5));
    }

    #[test]
    fn pitch_is_constrained() {
        let mut camera = Camera::default();
        camera.process_mouse_movement(0.0, 10_000.0);
        assert_eq!(camera.pitch, 89.0);
        camera.process_mouse_movement(0.0, -100_000.0);
        assert_eq!(camera.pitch, -89.0);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut camera = Camera::default();
        camera.process_mouse_scroll(100.0);
        assert_eq!(camera.zoom, 1.0);
        camera.process_mouse_scroll(-100.0);
        assert_eq!(camera.zoom, 45.0);
    }

    #[test]
    fn set_front_restores_orientation() {
        let mut camera = Camera::default();
        let front = vec3(1.0, 0.5, -0.3).normalize();
        camera.set_front(front);
        assert!(camera.front().abs_diff_eq(front, 1e-5));
        camera.process_mouse_movement(0.0, 0.0);
        assert!(camera.front().abs_diff_eq(front, 1e-5));
    }
}
