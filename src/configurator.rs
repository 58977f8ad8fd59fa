//! One viewing session: the parameter store, asset loading, materials,
//! lighting and the render loop wired together.

use crate::animation::{AnimationScheduler, TickReport};
use crate::assets::{AssetEvent, AssetLoader, AssetSource};
use crate::config::{Config, ConfigError};
use crate::material::{MaterialPipeline, TextureChannel, TextureSet};
use crate::params::share::{self, ClipboardSink, DecodeError, ShareOutcome};
use crate::params::ParameterStore;
use crate::render::{Camera, OrbitController, RenderBackend, RenderPipeline, Viewport};
use crate::scene::{Light, LightId, LightKind, NodeId, SceneGraph};
use glam::Vec3;
use std::sync::Arc;
use url::Url;

pub struct Configurator {
    config: Config,
    params: ParameterStore,
    loader: AssetLoader,
    scene: SceneGraph,
    materials: MaterialPipeline,
    pipeline: RenderPipeline,
    scheduler: AnimationScheduler,
    orbit: OrbitController,
    ambient: LightId,
    directional: LightId,
    location: Url,
    clipboard: Box<dyn ClipboardSink>,
    last_share: Option<ShareOutcome>,
}

impl Configurator {
    pub fn new(
        config: Config,
        backend: Box<dyn RenderBackend>,
        source: Arc<dyn AssetSource>,
        clipboard: Box<dyn ClipboardSink>,
    ) -> Result<Self, ConfigError> {
        let location = config.share_location()?;

        let mut scene = SceneGraph::new();
        let lights = config.lights;
        let ambient = scene.add_light(Light {
            kind: LightKind::Ambient,
            color: lights.ambient_color,
            intensity: lights.ambient_intensity,
        });
        let directional = scene.add_light(Light {
            kind: LightKind::Directional {
                position: Vec3::from(lights.directional_position),
                cast_shadow: lights.directional_cast_shadow,
            },
            color: lights.directional_color,
            intensity: lights.directional_intensity,
        });

        let mut camera = Camera::new(&config.camera);
        let orbit = OrbitController::new(&config.camera);
        orbit.apply(&mut camera);
        let viewport = Viewport::new(config.window.width, config.window.height);
        let pipeline = RenderPipeline::new(backend, camera, config.bloom.into(), viewport);

        Ok(Self {
            params: ParameterStore::new(),
            loader: AssetLoader::new(source, config.placement),
            scene,
            materials: MaterialPipeline::new(config.material),
            pipeline,
            scheduler: AnimationScheduler::new(),
            orbit,
            ambient,
            directional,
            location,
            clipboard,
            last_share: None,
            config,
        })
    }

    /// Applies the startup query (if any) and requests every asset.
    /// Returns the query fields that were rejected.
    pub fn start(&mut self, query: Option<&str>) -> Vec<DecodeError> {
        let rejected = match query {
            Some(query) => {
                let decoded = share::decode(query);
                for err in &decoded.rejected {
                    log::warn!("Ignoring {}", err);
                }
                if !decoded.params.is_empty() {
                    log::info!("Restoring shared state from link: {}", query);
                }
                self.params.apply(decoded.params);
                self.location.set_query(Some(query.trim_start_matches('?')));
                decoded.rejected
            }
            None => Vec::new(),
        };

        let assets = &self.config.assets;
        self.loader.load_environment(assets.environment_path());
        self.loader.load_model(assets.model_path());
        self.loader.load_textures(assets.texture_paths());
        rejected
    }

    /// Drains finished loads. The material pass runs once per poll if the
    /// model or the texture set arrived.
    pub fn poll_assets(&mut self) -> Vec<AssetEvent> {
        let events = self.loader.poll(&mut self.scene);
        let reapply = events.iter().any(|event| {
            matches!(
                event,
                AssetEvent::ModelInserted(_) | AssetEvent::TexturesSettled(_)
            )
        });
        if reapply {
            self.reapply_materials();
        }
        if !events.is_empty() && self.loader.is_settled() {
            log::info!("All requested assets settled");
        }
        events
    }

    pub fn tick(&mut self) -> TickReport {
        if self.orbit.update() {
            self.orbit.apply(self.pipeline.camera_mut());
        }
        let model = self.model_root();
        self.scheduler
            .tick(&mut self.params, &mut self.scene, model, &mut self.pipeline)
    }

    pub fn ticks(&self) -> u64 {
        self.scheduler.ticks()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.pipeline.resize(width, height);
    }

    pub fn play(&mut self) {
        self.scheduler.play(&mut self.params);
    }

    pub fn pause(&mut self) {
        self.scheduler.pause(&mut self.params);
    }

    pub fn share(&mut self) -> ShareOutcome {
        let outcome = share::share(
            &self.params.state(),
            &mut self.location,
            self.clipboard.as_mut(),
        );
        self.last_share = Some(outcome.clone());
        outcome
    }

    pub fn reapply_materials(&mut self) -> usize {
        let textures = self.current_textures();
        let model = self.model_root();
        self.materials.apply(&mut self.scene, model, &textures)
    }

    pub fn reapply_channel(&mut self, channel: TextureChannel) -> usize {
        if let Some(err) = self.loader.texture_error(channel) {
            log::warn!("{} map unavailable ({}); clearing slot", channel, err);
        }
        let textures = self.current_textures();
        let model = self.model_root();
        self.materials
            .apply_channel(&mut self.scene, model, channel, &textures)
    }

    pub fn set_emissive_rgb(&mut self, rgb: [f32; 3]) {
        self.materials
            .set_emissive_rgb(rgb.map(|channel| sanitize(channel).min(1.0)));
        self.reapply_materials();
    }

    pub fn set_emissive_intensity(&mut self, intensity: f32) {
        self.materials.set_emissive_intensity(sanitize(intensity));
        self.reapply_materials();
    }

    pub fn set_displacement_scale(&mut self, scale: f32) {
        self.materials.set_displacement_scale(sanitize(scale));
        self.reapply_materials();
    }

    pub fn ambient_intensity(&self) -> f32 {
        self.light_intensity(self.ambient)
    }

    pub fn set_ambient_intensity(&mut self, intensity: f32) {
        self.set_light_intensity(self.ambient, intensity);
    }

    pub fn directional_intensity(&self) -> f32 {
        self.light_intensity(self.directional)
    }

    pub fn set_directional_intensity(&mut self, intensity: f32) {
        self.set_light_intensity(self.directional, intensity);
    }

    fn light_intensity(&self, id: LightId) -> f32 {
        self.scene.light(id).map_or(0.0, |light| light.intensity)
    }

    fn set_light_intensity(&mut self, id: LightId, intensity: f32) {
        if let Some(light) = self.scene.light_mut(id) {
            light.intensity = sanitize(intensity);
        }
    }

    /// Textures settled so far; empty until the set is frozen.
    fn current_textures(&self) -> TextureSet {
        self.loader.texture_set().cloned().unwrap_or_default()
    }

    pub fn model_root(&self) -> Option<NodeId> {
        self.loader.model().map(|asset| asset.root)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn params(&self) -> &ParameterStore {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ParameterStore {
        &mut self.params
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn loader(&self) -> &AssetLoader {
        &self.loader
    }

    pub fn materials(&self) -> &MaterialPipeline {
        &self.materials
    }

    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut RenderPipeline {
        &mut self.pipeline
    }

    pub fn orbit_mut(&mut self) -> &mut OrbitController {
        &mut self.orbit
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    pub fn last_share(&self) -> Option<&ShareOutcome> {
        self.last_share.as_ref()
    }
}

fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::StubSource;
    use crate::params::share::ClipboardError;
    use crate::render::HeadlessBackend;
    use glam::Mat4;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;
    use std::time::{Duration, Instant};

    #[derive(Clone, Default)]
    struct RecordingClipboard(Rc<RefCell<Vec<String>>>);

    impl ClipboardSink for RecordingClipboard {
        fn write_text(&mut self, text: &str) -> Result<(), ClipboardError> {
            self.0.borrow_mut().push(text.to_string());
            Ok(())
        }
    }

    fn session(config: Config) -> (Configurator, HeadlessBackend, RecordingClipboard) {
        let backend = HeadlessBackend::new();
        let clipboard = RecordingClipboard::default();
        let configurator = Configurator::new(
            config,
            Box::new(backend.clone()),
            Arc::new(StubSource),
            Box::new(clipboard.clone()),
        )
        .unwrap();
        (configurator, backend, clipboard)
    }

    fn settle(configurator: &mut Configurator) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !configurator.loader().is_settled() && Instant::now() < deadline {
            configurator.poll_assets();
            std::thread::sleep(Duration::from_millis(1));
        }
        configurator.poll_assets();
    }

    #[test]
    fn shared_link_restores_paused_state() {
        let (mut configurator, _backend, _clipboard) = session(Config::default());
        let rejected = configurator.start(Some("?rotation=90&speed=0.02&isAnimating=0"));
        assert!(rejected.is_empty());
        settle(&mut configurator);
        assert!(configurator.model_root().is_some());

        configurator.tick();
        assert_eq!(configurator.params().rotation_degrees(), 90.0);

        configurator.play();
        configurator.tick();
        assert!((configurator.params().rotation_degrees() - 90.02).abs() < 1e-9);
    }

    #[test]
    fn malformed_fields_are_skipped_and_reported() {
        let (mut configurator, _backend, _clipboard) = session(Config::default());
        let rejected = configurator.start(Some("rotation=abc&speed=0.05"));
        assert_eq!(rejected.len(), 1);
        assert_eq!(configurator.params().rotation_degrees(), 0.0);
        assert_eq!(configurator.params().speed(), 0.05);
    }

    #[test]
    fn materials_follow_model_and_textures() {
        let (mut configurator, _backend, _clipboard) = session(Config::default());
        configurator.start(None);
        settle(&mut configurator);

        let root = configurator.model_root().unwrap();
        let mut standard = 0;
        configurator.scene().visit_surfaces(root, |surface| {
            if let Some(material) = surface.material.as_standard() {
                assert!(material.map.is_some());
                assert!(material.emissive_map.is_some());
                assert_eq!(material.displacement_scale, 0.05);
                standard += 1;
            }
        });
        assert_eq!(standard, 2);
    }

    #[test]
    fn scene_pass_consumes_camera_transforms_lights_and_textures() {
        let (mut configurator, backend, _clipboard) = session(Config::default());
        configurator.start(Some("rotation=0&isAnimating=0"));
        settle(&mut configurator);
        configurator.tick();

        let log = backend.log();
        let scene = &log.scene;
        assert_eq!(scene.view_projection, configurator.pipeline().camera().view_projection());
        assert!(scene.view_projection.is_finite());
        assert_ne!(scene.view_projection, Mat4::IDENTITY);

        assert_eq!(scene.models, 1);
        assert_eq!(scene.meshes, 2);
        let names: Vec<&str> = scene.model_nodes.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["stub", "body", "panel"]);
        let (scale, _rotation, translation) =
            scene.model_nodes[0].1.to_scale_rotation_translation();
        assert!(scale.abs_diff_eq(Vec3::splat(0.02), 1e-6));
        assert!(translation.abs_diff_eq(Vec3::new(0.0, -1.0, 0.0), 1e-6));

        assert_eq!(scene.lights.len(), 2);
        assert_eq!(scene.lights[0].kind, LightKind::Ambient);
        assert_eq!(scene.background, Some((4, 2)));
        assert!(scene.environment_is_background);

        assert_eq!(scene.surfaces.len(), 2);
        for surface in &scene.surfaces {
            assert!(surface.needs_update);
            assert_eq!(
                surface.maps.keys().copied().collect::<Vec<_>>(),
                TextureChannel::ALL.to_vec()
            );
            let digests: std::collections::BTreeSet<&String> = surface.maps.values().collect();
            assert_eq!(digests.len(), 6);
        }
        let albedo = &scene.surfaces[0].maps[&TextureChannel::Albedo];
        assert_eq!(albedo, &"00".repeat(32));
        // 2 surfaces x 6 one-texel maps, plus a 4x2 float environment
        assert_eq!(scene.texel_bytes, 2 * 6 * 4 + 4 * 2 * 4 * 4);
    }

    #[test]
    fn failed_model_leaves_frames_rendering() {
        let mut config = Config::default();
        config.assets.model = PathBuf::from("missing.glb");
        let (mut configurator, backend, _clipboard) = session(config);
        configurator.start(None);
        settle(&mut configurator);

        assert!(configurator.loader().model_state().error().is_some());
        for _ in 0..3 {
            assert!(configurator.tick().frame.is_some());
        }
        let log = backend.log();
        assert_eq!(log.presented, 3);
        assert_eq!(log.scene.models, 0);
        assert!(log.scene.model_nodes.is_empty());
        assert!(log.scene.surfaces.is_empty());
        // lights and environment still reach the backend
        assert_eq!(log.scene.lights.len(), 2);
        assert_eq!(log.scene.background, Some((4, 2)));
        assert_eq!(configurator.scene().node_count(), 0);
    }

    #[test]
    fn share_writes_location_and_clipboard() {
        let (mut configurator, _backend, clipboard) = session(Config::default());
        configurator.params_mut().set_rotation_degrees(45.0);
        configurator.pause();

        let outcome = configurator.share();
        assert!(matches!(outcome, ShareOutcome::Copied { .. }));
        assert_eq!(
            configurator.location().query(),
            Some("rotation=45&speed=0.01&isAnimating=0")
        );
        assert_eq!(
            *clipboard.0.borrow(),
            vec!["showroom://scene?rotation=45&speed=0.01&isAnimating=0".to_string()]
        );
        assert!(configurator.last_share().is_some());
    }

    #[test]
    fn light_and_material_edits_apply_immediately() {
        let (mut configurator, _backend, _clipboard) = session(Config::default());
        configurator.start(None);
        settle(&mut configurator);

        configurator.set_ambient_intensity(1.5);
        configurator.set_directional_intensity(f32::NAN);
        assert_eq!(configurator.ambient_intensity(), 1.5);
        assert_eq!(configurator.directional_intensity(), 0.0);

        configurator.set_emissive_intensity(6.0);
        let root = configurator.model_root().unwrap();
        configurator.scene().visit_surfaces(root, |surface| {
            if let Some(material) = surface.material.as_standard() {
                assert_eq!(material.emissive_intensity, 6.0);
            }
        });
    }

    #[test]
    fn resize_reaches_camera_and_passes() {
        let (mut configurator, backend, _clipboard) = session(Config::default());
        configurator.resize(640, 480);
        configurator.tick();
        assert!((configurator.pipeline().camera().aspect - 640.0 / 480.0).abs() < 1e-6);
        assert!(backend
            .log()
            .last_frame
            .iter()
            .all(|record| (record.width, record.height) == (640, 480)));
    }
}
