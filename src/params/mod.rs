//! User-editable view parameters.
//!
//! `ParameterStore` is the single owner of the rotation, speed and playback
//! flag. Setters only clamp or wrap; everything else reads the store as-is.

pub mod share;

pub const ROTATION_PERIOD_DEG: f64 = 360.0;
pub const SPEED_MIN: f64 = 0.0;
pub const SPEED_MAX: f64 = 0.1;
pub const DEFAULT_SPEED: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterState {
    pub rotation_degrees: f64,
    pub speed: f64,
    pub is_playing: bool,
}

impl Default for ParameterState {
    fn default() -> Self {
        Self {
            rotation_degrees: 0.0,
            speed: DEFAULT_SPEED,
            is_playing: true,
        }
    }
}

/// Fields decoded from a share link; `None` leaves the store untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PartialParameters {
    pub rotation_degrees: Option<f64>,
    pub speed: Option<f64>,
    pub is_playing: Option<bool>,
}

impl PartialParameters {
    pub fn is_empty(&self) -> bool {
        self.rotation_degrees.is_none() && self.speed.is_none() && self.is_playing.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    state: ParameterState,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ParameterState {
        self.state
    }

    pub fn rotation_degrees(&self) -> f64 {
        self.state.rotation_degrees
    }

    /// Wraps into `[0, 360)`. Non-finite values are ignored.
    pub fn set_rotation_degrees(&mut self, degrees: f64) {
        if !degrees.is_finite() {
            log::debug!("Ignoring non-finite rotation {}", degrees);
            return;
        }
        let wrapped = degrees.rem_euclid(ROTATION_PERIOD_DEG);
        // rem_euclid can round up to exactly the period for tiny negative
        // inputs, and keeps the sign of -0.0
        self.state.rotation_degrees = if wrapped >= ROTATION_PERIOD_DEG || wrapped == 0.0 {
            0.0
        } else {
            wrapped
        };
    }

    pub fn speed(&self) -> f64 {
        self.state.speed
    }

    /// Clamps into `[0, 0.1]`. Non-finite values are ignored.
    pub fn set_speed(&mut self, speed: f64) {
        if !speed.is_finite() {
            log::debug!("Ignoring non-finite speed {}", speed);
            return;
        }
        self.state.speed = speed.clamp(SPEED_MIN, SPEED_MAX);
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.state.is_playing = playing;
    }

    pub fn apply(&mut self, partial: PartialParameters) {
        if let Some(rotation) = partial.rotation_degrees {
            self.set_rotation_degrees(rotation);
        }
        if let Some(speed) = partial.speed {
            self.set_speed(speed);
        }
        if let Some(playing) = partial.is_playing {
            self.set_playing(playing);
        }
    }
}
