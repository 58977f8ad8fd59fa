use super::Viewport;
use crate::config::CameraConfig;
use glam::{Mat4, Vec3};

/// Perspective camera looking at `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub fov_y_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub eye: Vec3,
    pub target: Vec3,
}

impl Camera {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            fov_y_deg: config.fov_y_deg,
            aspect: 1.0,
            near: config.near,
            far: config.far,
            eye: Vec3::new(0.0, 0.0, config.distance),
            target: Vec3::ZERO,
        }
    }

    pub fn set_aspect(&mut self, viewport: Viewport) {
        self.aspect = viewport.aspect();
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_deg.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, Vec3::Y)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

const ROTATE_SPEED: f32 = 0.005;
const ZOOM_SPEED: f32 = 0.1;
const MIN_DISTANCE: f32 = 0.1;
const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;
const REST_EPSILON: f32 = 1e-5;

/// Orbit controls with damping: input adds velocity, `update` integrates
/// and decays it once per tick.
#[derive(Debug, Clone, Copy)]
pub struct OrbitController {
    pub target: Vec3,
    pub distance: f32,
    pub yaw: f32,
    pub pitch: f32,
    damping: f32,
    yaw_velocity: f32,
    pitch_velocity: f32,
    zoom_velocity: f32,
}

impl OrbitController {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            target: Vec3::ZERO,
            distance: config.distance.max(MIN_DISTANCE),
            yaw: 0.0,
            pitch: 0.0,
            damping: config.damping.clamp(0.0, 1.0),
            yaw_velocity: 0.0,
            pitch_velocity: 0.0,
            zoom_velocity: 0.0,
        }
    }

    /// Pointer drag in pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw_velocity -= dx * ROTATE_SPEED;
        self.pitch_velocity += dy * ROTATE_SPEED;
    }

    /// Wheel steps; positive moves closer.
    pub fn zoom(&mut self, steps: f32) {
        self.zoom_velocity -= steps * ZOOM_SPEED * self.distance;
    }

    pub fn is_moving(&self) -> bool {
        self.yaw_velocity.abs() > REST_EPSILON
            || self.pitch_velocity.abs() > REST_EPSILON
            || self.zoom_velocity.abs() > REST_EPSILON
    }

    /// Integrates one tick. Returns whether the camera moved.
    pub fn update(&mut self) -> bool {
        if !self.is_moving() {
            self.yaw_velocity = 0.0;
            self.pitch_velocity = 0.0;
            self.zoom_velocity = 0.0;
            return false;
        }
        let step = if self.damping > 0.0 { self.damping } else { 1.0 };
        self.yaw += self.yaw_velocity * step;
        self.pitch = (self.pitch + self.pitch_velocity * step).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.distance = (self.distance + self.zoom_velocity * step).max(MIN_DISTANCE);
        wrap_angle(&mut self.yaw);

        let decay = 1.0 - step;
        self.yaw_velocity *= decay;
        self.pitch_velocity *= decay;
        self.zoom_velocity *= decay;
        true
    }

    pub fn apply(&self, camera: &mut Camera) {
        camera.target = self.target;
        camera.eye = self.target + orbit_offset(self.yaw, self.pitch) * self.distance;
    }
}

fn orbit_offset(yaw: f32, pitch: f32) -> Vec3 {
    let cos_pitch = pitch.cos();
    Vec3::new(yaw.sin() * cos_pitch, pitch.sin(), yaw.cos() * cos_pitch)
}

fn wrap_angle(angle: &mut f32) {
    const TWO_PI: f32 = std::f32::consts::PI * 2.0;
    if angle.is_finite() {
        *angle = (*angle + std::f32::consts::PI).rem_euclid(TWO_PI) - std::f32::consts::PI;
    }
}

#[cfg(test)]
mod tests {
    use super::{Camera, OrbitController};
    use crate::config::CameraConfig;
    use crate::render::Viewport;
    use glam::Vec3;

    #[test]
    fn default_camera_sits_on_positive_z() {
        let config = CameraConfig::default();
        let mut camera = Camera::new(&config);
        OrbitController::new(&config).apply(&mut camera);
        assert!((camera.eye - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-6);
    }

    #[test]
    fn aspect_follows_viewport() {
        let mut camera = Camera::new(&CameraConfig::default());
        camera.set_aspect(Viewport::new(800, 600));
        assert!((camera.aspect - 4.0 / 3.0).abs() < 1e-6);
        assert!(camera.view_projection().is_finite());
    }

    #[test]
    fn damping_brings_orbit_to_rest() {
        let mut orbit = OrbitController::new(&CameraConfig::default());
        orbit.rotate(120.0, -40.0);
        orbit.zoom(1.0);
        let mut ticks = 0;
        while orbit.update() {
            ticks += 1;
            assert!(ticks < 10_000, "orbit never settled");
        }
        assert!(!orbit.is_moving());
        assert!(orbit.yaw.is_finite() && orbit.pitch.is_finite());
        assert!(orbit.distance < 5.0);
    }

    #[test]
    fn pitch_is_clamped_short_of_the_poles() {
        let mut orbit = OrbitController::new(&CameraConfig::default());
        orbit.rotate(0.0, 100_000.0);
        while orbit.update() {}
        assert!(orbit.pitch < std::f32::consts::FRAC_PI_2);
    }
}
