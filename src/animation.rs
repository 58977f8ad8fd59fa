use crate::params::ParameterStore;
use crate::render::{FrameStats, RenderPipeline};
use crate::scene::{NodeId, SceneGraph};
use glam::Quat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn of(params: &ParameterStore) -> Self {
        if params.is_playing() {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub state: PlaybackState,
    /// Rotation written to the model this tick.
    pub rotation_degrees: f64,
    pub advanced: bool,
    /// None when the frame failed.
    pub frame: Option<FrameStats>,
}

/// Per-frame update and draw. Playback state lives in the parameter store;
/// the scheduler only keeps what it needs to avoid log spam.
#[derive(Debug, Default)]
pub struct AnimationScheduler {
    ticks: u64,
    last_error: Option<String>,
}

impl AnimationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn play(&self, params: &mut ParameterStore) {
        if !params.is_playing() {
            log::info!("Animation playing");
        }
        params.set_playing(true);
    }

    pub fn pause(&self, params: &mut ParameterStore) {
        if params.is_playing() {
            log::info!("Animation paused");
        }
        params.set_playing(false);
    }

    /// Advances rotation by `speed` degrees when playing and a model is
    /// present, writes it to the model root, then renders. Render failures
    /// are logged (once per distinct message) and never stop the loop.
    pub fn tick(
        &mut self,
        params: &mut ParameterStore,
        scene: &mut SceneGraph,
        model: Option<NodeId>,
        pipeline: &mut RenderPipeline,
    ) -> TickReport {
        self.ticks += 1;
        let state = PlaybackState::of(params);
        let advanced = state == PlaybackState::Playing && model.is_some();
        if advanced {
            params.set_rotation_degrees(params.rotation_degrees() + params.speed());
        }
        let rotation_degrees = params.rotation_degrees();
        if let Some(node) = model.and_then(|id| scene.node_mut(id)) {
            node.transform.rotation = Quat::from_rotation_y((rotation_degrees as f32).to_radians());
        }

        let frame = match pipeline.render_frame(scene) {
            Ok(stats) => {
                if self.last_error.take().is_some() {
                    log::info!("Rendering recovered at frame {}", stats.frame);
                }
                Some(stats)
            }
            Err(err) => {
                let message = err.to_string();
                if self.last_error.as_deref() != Some(message.as_str()) {
                    log::error!("Frame failed: {}", message);
                    self.last_error = Some(message);
                }
                None
            }
        };

        TickReport {
            state,
            rotation_degrees,
            advanced,
            frame,
        }
    }
}
