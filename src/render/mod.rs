mod camera;
mod headless;

pub use camera::{Camera, OrbitController};
pub use headless::{FrameLog, HeadlessBackend, PassRecord};

use crate::config::BloomConfig;
use crate::scene::SceneGraph;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("pass `{pass}` failed: {reason}")]
    PassFailed { pass: &'static str, reason: String },
    #[error("pass `{pass}` requires the output of a previous pass")]
    MissingInput { pass: &'static str },
    #[error("present failed: {0}")]
    Present(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Zero-sized windows (minimized) are clamped to 1x1.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// Bloom parameters; fixed when the pipeline is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomSettings {
    pub threshold: f32,
    pub strength: f32,
    pub radius: f32,
}

impl From<BloomConfig> for BloomSettings {
    fn from(config: BloomConfig) -> Self {
        Self {
            threshold: config.threshold,
            strength: config.strength,
            radius: config.radius,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PassKind {
    /// Draws the scene graph from the camera.
    Scene,
    /// Extracts bright regions of its input, blurs them and composites back.
    Bloom(BloomSettings),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderPass {
    pub name: &'static str,
    pub kind: PassKind,
    pub size: Viewport,
}

impl RenderPass {
    fn needs_input(&self) -> bool {
        matches!(self.kind, PassKind::Bloom(_))
    }
}

/// Output of a pass, consumed by the next pass or presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTarget {
    pub pass: &'static str,
    pub width: u32,
    pub height: u32,
    pub frame: u64,
}

pub struct FrameView<'a> {
    pub scene: &'a SceneGraph,
    pub camera: &'a Camera,
    pub frame: u64,
}

/// Tessellated control-panel output, painted over the final pass.
pub struct OverlayFrame {
    pub primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
    pub screen_size_px: [u32; 2],
}

/// GPU side of the pipeline. Implementations draw; the pipeline decides
/// order, sizes and what feeds what.
pub trait RenderBackend {
    fn resize(&mut self, viewport: Viewport);

    /// Returning false skips the frame (e.g. swap chain not ready).
    fn begin_frame(&mut self) -> bool {
        true
    }

    fn execute_pass(
        &mut self,
        pass: &RenderPass,
        view: &FrameView<'_>,
        input: Option<&FrameTarget>,
    ) -> Result<FrameTarget, RenderError>;

    fn paint_overlay(
        &mut self,
        _overlay: &OverlayFrame,
        _target: &FrameTarget,
    ) -> Result<(), RenderError> {
        Ok(())
    }

    fn present(&mut self, target: FrameTarget) -> Result<(), RenderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    pub passes: usize,
    pub viewport: Viewport,
}

pub struct RenderPipeline {
    backend: Box<dyn RenderBackend>,
    camera: Camera,
    passes: Vec<RenderPass>,
    viewport: Viewport,
    overlay: Option<OverlayFrame>,
    frame: u64,
}

impl RenderPipeline {
    /// Scene pass first, bloom second.
    pub fn new(
        mut backend: Box<dyn RenderBackend>,
        mut camera: Camera,
        bloom: BloomSettings,
        viewport: Viewport,
    ) -> Self {
        camera.set_aspect(viewport);
        backend.resize(viewport);
        let passes = vec![
            RenderPass {
                name: "scene",
                kind: PassKind::Scene,
                size: viewport,
            },
            RenderPass {
                name: "bloom",
                kind: PassKind::Bloom(bloom),
                size: viewport,
            },
        ];
        log::info!(
            "Render pipeline {}x{}: scene -> bloom (threshold {}, strength {}, radius {})",
            viewport.width,
            viewport.height,
            bloom.threshold,
            bloom.strength,
            bloom.radius
        );
        Self {
            backend,
            camera,
            passes,
            viewport,
            overlay: None,
            frame: 0,
        }
    }

    #[cfg(test)]
    pub fn passes(&self) -> &[RenderPass] {
        &self.passes
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[cfg(test)]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Camera aspect first, then every pass, then the backend targets.
    /// Completes before the next `render_frame`.
    pub fn resize(&mut self, width: u32, height: u32) {
        let viewport = Viewport::new(width, height);
        self.camera.set_aspect(viewport);
        for pass in &mut self.passes {
            pass.size = viewport;
        }
        self.backend.resize(viewport);
        self.viewport = viewport;
        log::debug!("Render pipeline resized to {}x{}", viewport.width, viewport.height);
    }

    /// Overlay for the next frame; replaced if a newer one arrives first.
    pub fn set_overlay(&mut self, overlay: OverlayFrame) {
        self.overlay = Some(overlay);
    }

    pub fn render_frame(&mut self, scene: &SceneGraph) -> Result<FrameStats, RenderError> {
        self.frame += 1;
        let overlay = self.overlay.take();
        if !self.backend.begin_frame() {
            return Ok(FrameStats {
                frame: self.frame,
                passes: 0,
                viewport: self.viewport,
            });
        }

        let view = FrameView {
            scene,
            camera: &self.camera,
            frame: self.frame,
        };
        let mut previous: Option<FrameTarget> = None;
        for pass in &self.passes {
            debug_assert_eq!(pass.size, self.viewport, "pass `{}` has a stale size", pass.name);
            if pass.needs_input() && previous.is_none() {
                return Err(RenderError::MissingInput { pass: pass.name });
            }
            let output = self.backend.execute_pass(pass, &view, previous.as_ref())?;
            previous = Some(output);
        }

        let Some(target) = previous else {
            return Ok(FrameStats {
                frame: self.frame,
                passes: 0,
                viewport: self.viewport,
            });
        };
        if let Some(overlay) = &overlay {
            self.backend.paint_overlay(overlay, &target)?;
        }
        self.backend.present(target)?;

        Ok(FrameStats {
            frame: self.frame,
            passes: self.passes.len(),
            viewport: self.viewport,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BloomConfig, CameraConfig};

    fn pipeline(width: u32, height: u32) -> (RenderPipeline, HeadlessBackend) {
        let backend = HeadlessBackend::new();
        let pipeline = RenderPipeline::new(
            Box::new(backend.clone()),
            Camera::new(&CameraConfig::default()),
            BloomConfig::default().into(),
            Viewport::new(width, height),
        );
        (pipeline, backend)
    }

    #[test]
    fn passes_run_in_chain_order_and_feed_forward() {
        let (mut pipeline, backend) = pipeline(1280, 720);
        let scene = SceneGraph::new();
        let stats = pipeline.render_frame(&scene).unwrap();
        assert_eq!(stats.passes, 2);

        let log = backend.log();
        let frame = &log.last_frame;
        assert_eq!(frame.len(), 2);
        assert_eq!(frame[0].pass, "scene");
        assert_eq!(frame[0].input, None);
        assert_eq!(frame[1].pass, "bloom");
        assert_eq!(frame[1].input, Some("scene"));
        assert_eq!(log.presented, 1);
    }

    #[test]
    fn resize_reaches_every_pass_before_next_frame() {
        let (mut pipeline, backend) = pipeline(1280, 720);
        let scene = SceneGraph::new();
        pipeline.render_frame(&scene).unwrap();
        pipeline.resize(800, 600);
        pipeline.render_frame(&scene).unwrap();

        let log = backend.log();
        assert!(log
            .last_frame
            .iter()
            .all(|record| (record.width, record.height) == (800, 600)));
        assert_eq!(log.viewport, Some(Viewport::new(800, 600)));
        assert!((pipeline.camera().aspect - 800.0 / 600.0).abs() < 1e-6);
    }

    #[test]
    fn zero_sized_resize_is_clamped() {
        let (mut pipeline, _backend) = pipeline(1280, 720);
        pipeline.resize(0, 0);
        assert_eq!(pipeline.viewport(), Viewport::new(1, 1));
        assert!(pipeline.passes().iter().all(|pass| pass.size == Viewport::new(1, 1)));
        assert!(pipeline.camera().aspect.is_finite());
    }

    #[test]
    fn bloom_settings_are_fixed_at_construction() {
        let (mut pipeline, backend) = pipeline(640, 480);
        let expected = BloomSettings {
            threshold: 0.05,
            strength: 0.5,
            radius: 0.5,
        };
        assert_eq!(pipeline.passes()[1].kind, PassKind::Bloom(expected));
        pipeline.render_frame(&SceneGraph::new()).unwrap();
        assert_eq!(backend.log().bloom, Some((0.05, 0.5, 0.5)));
    }

    #[test]
    fn failing_pass_surfaces_error_and_next_frame_still_renders() {
        let (mut pipeline, backend) = pipeline(640, 480);
        let scene = SceneGraph::new();
        backend.fail_next_pass("bloom");
        assert!(matches!(
            pipeline.render_frame(&scene),
            Err(RenderError::PassFailed { pass: "bloom", .. })
        ));
        assert!(pipeline.render_frame(&scene).is_ok());
        assert_eq!(backend.log().presented, 1);
    }
}
