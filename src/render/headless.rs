//! Backend that executes passes without a GPU and records what it was asked
//! to do. Used by the windowed host when no GPU renderer is attached, and by
//! the tests.
//!
//! The scene pass walks the graph the way an uploading backend would: camera
//! matrices, world transforms of every model node, lights, environment and
//! the texture digests bound to each standard surface.

use super::{
    FrameTarget, FrameView, OverlayFrame, PassKind, RenderBackend, RenderError, RenderPass,
    Viewport,
};
use crate::material::TextureChannel;
use crate::scene::{Light, SceneGraph};
use glam::Mat4;
use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassRecord {
    pub pass: &'static str,
    pub width: u32,
    pub height: u32,
    pub input: Option<&'static str>,
    pub frame: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceRecord {
    pub material: String,
    /// Hex SHA-256 of each bound map.
    pub maps: BTreeMap<TextureChannel, String>,
    pub needs_update: bool,
}

/// What the scene pass consumed from the graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneRecord {
    pub view_projection: Mat4,
    pub roots: usize,
    pub models: usize,
    pub meshes: usize,
    /// World matrix per model node, pre-order.
    pub model_nodes: Vec<(String, Mat4)>,
    pub lights: Vec<Light>,
    pub background: Option<(u32, u32)>,
    pub environment_is_background: bool,
    pub surfaces: Vec<SurfaceRecord>,
    pub texel_bytes: usize,
}

#[derive(Debug, Default)]
pub struct FrameLog {
    pub viewport: Option<Viewport>,
    /// Passes of the last presented frame.
    pub last_frame: Vec<PassRecord>,
    pub scene: SceneRecord,
    pub bloom: Option<(f32, f32, f32)>,
    pub presented: u64,
    pub overlays_painted: u64,
    pub overlay_primitives: usize,
    current: Vec<PassRecord>,
    fail_pass: Option<&'static str>,
}

impl FrameLog {
    pub fn summary(&self) -> String {
        let (width, height) = self
            .viewport
            .map_or((0, 0), |viewport| (viewport.width, viewport.height));
        let passes: Vec<&str> = self.last_frame.iter().map(|record| record.pass).collect();
        format!(
            "{} frames presented at {}x{} [{}], bloom {:?}, {} overlays ({} primitives last)",
            self.presented,
            width,
            height,
            passes.join(" -> "),
            self.bloom,
            self.overlays_painted,
            self.overlay_primitives
        )
    }
}

/// Clones share one log.
#[derive(Debug, Clone, Default)]
pub struct HeadlessBackend {
    log: Rc<RefCell<FrameLog>>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> Ref<'_, FrameLog> {
        self.log.borrow()
    }

    /// Makes the next execution of `pass` fail once.
    #[cfg(test)]
    pub fn fail_next_pass(&self, pass: &'static str) {
        self.log.borrow_mut().fail_pass = Some(pass);
    }
}

fn record_scene(scene: &SceneGraph, view_projection: Mat4) -> SceneRecord {
    let mut record = SceneRecord {
        view_projection,
        roots: scene.roots().len(),
        models: scene.model_count(),
        meshes: scene.mesh_count(),
        lights: scene.lights().to_vec(),
        ..SceneRecord::default()
    };

    if let Some(background) = scene.background() {
        let map = background.map();
        record.background = Some((map.width, map.height));
        record.texel_bytes += map.rgba.len() * std::mem::size_of::<f32>();
        record.environment_is_background = scene
            .environment()
            .is_some_and(|environment| environment.same_as(background));
    }

    for &root in scene.models() {
        for id in scene.descendants(root) {
            if let (Some(node), Some(world)) = (scene.node(id), scene.world_matrix(id)) {
                record.model_nodes.push((node.name.clone(), world));
            }
        }
        scene.visit_surfaces(root, |surface| {
            let Some(material) = surface.material.as_standard() else {
                return;
            };
            let slots = [
                (TextureChannel::Albedo, &material.map),
                (TextureChannel::Metalness, &material.metalness_map),
                (TextureChannel::Roughness, &material.roughness_map),
                (TextureChannel::Normal, &material.normal_map),
                (TextureChannel::Height, &material.displacement_map),
                (TextureChannel::Emissive, &material.emissive_map),
            ];
            let mut maps = BTreeMap::new();
            for (channel, slot) in slots {
                if let Some(handle) = slot {
                    let texture = handle.texture();
                    record.texel_bytes += texture.rgba.len();
                    maps.insert(channel, texture.digest_hex());
                }
            }
            record.surfaces.push(SurfaceRecord {
                material: material.name.clone(),
                maps,
                needs_update: material.needs_update,
            });
        });
    }
    record
}

impl RenderBackend for HeadlessBackend {
    fn resize(&mut self, viewport: Viewport) {
        self.log.borrow_mut().viewport = Some(viewport);
    }

    fn begin_frame(&mut self) -> bool {
        self.log.borrow_mut().current.clear();
        true
    }

    fn execute_pass(
        &mut self,
        pass: &RenderPass,
        view: &FrameView<'_>,
        input: Option<&FrameTarget>,
    ) -> Result<FrameTarget, RenderError> {
        let mut log = self.log.borrow_mut();
        if log.fail_pass == Some(pass.name) {
            log.fail_pass = None;
            return Err(RenderError::PassFailed {
                pass: pass.name,
                reason: "injected failure".to_string(),
            });
        }
        match pass.kind {
            PassKind::Scene => {
                let record = record_scene(view.scene, view.camera.view_projection());
                if record.models != log.scene.models || record.surfaces != log.scene.surfaces {
                    log::debug!(
                        "Scene pass: {} models, {} meshes, {} surfaces, {} texel bytes",
                        record.models,
                        record.meshes,
                        record.surfaces.len(),
                        record.texel_bytes
                    );
                }
                log.scene = record;
            }
            PassKind::Bloom(settings) => {
                log.bloom = Some((settings.threshold, settings.strength, settings.radius));
            }
        }
        log.current.push(PassRecord {
            pass: pass.name,
            width: pass.size.width,
            height: pass.size.height,
            input: input.map(|target| target.pass),
            frame: view.frame,
        });
        log::trace!(
            "frame {} pass {} {}x{}",
            view.frame,
            pass.name,
            pass.size.width,
            pass.size.height
        );
        Ok(FrameTarget {
            pass: pass.name,
            width: pass.size.width,
            height: pass.size.height,
            frame: view.frame,
        })
    }

    fn paint_overlay(
        &mut self,
        overlay: &OverlayFrame,
        _target: &FrameTarget,
    ) -> Result<(), RenderError> {
        let mut log = self.log.borrow_mut();
        log.overlays_painted += 1;
        log.overlay_primitives = overlay.primitives.len();
        Ok(())
    }

    fn present(&mut self, _target: FrameTarget) -> Result<(), RenderError> {
        let mut log = self.log.borrow_mut();
        log.last_frame = std::mem::take(&mut log.current);
        log.presented += 1;
        Ok(())
    }
}
