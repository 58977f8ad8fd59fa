//! Asynchronous asset loading.
//!
//! Requests return immediately; `AssetLoader::poll` applies whatever finished
//! since the last frame. Every request ends in `Resolved` or `Failed`, and a
//! failure leaves the scene renderable (it just lacks that asset).

pub mod source;
mod worker;

pub use source::{AssetSource, FileSource};

use crate::config::PlacementConfig;
use crate::material::{TextureChannel, TextureHandle, TextureSet};
use crate::scene::{EnvironmentHandle, NodeId, NodeSpec, SceneGraph};
use glam::Vec3;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use worker::{WorkerCommand, WorkerHandle, WorkerResult};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("failed to decode image {path}: {reason}")]
    Image { path: String, reason: String },
    #[error("failed to decode model {path}: {reason}")]
    Model { path: String, reason: String },
    #[error("model {path} contains no scene")]
    EmptyModel { path: String },
    #[error("asset worker stopped before {path} resolved")]
    WorkerGone { path: String },
}

#[derive(Debug, Clone)]
pub enum LoadState<T> {
    Idle,
    Pending,
    Resolved(T),
    Failed(LoadError),
}

impl<T> LoadState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, LoadState::Pending)
    }

    pub fn resolved(&self) -> Option<&T> {
        match self {
            LoadState::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&LoadError> {
        match self {
            LoadState::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LoadState::Idle => "idle",
            LoadState::Pending => "loading",
            LoadState::Resolved(_) => "ready",
            LoadState::Failed(_) => "failed",
        }
    }
}

/// Model inserted into the scene graph. The graph owns the nodes; this is
/// only the root id used for rotation updates and material passes.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedAsset {
    pub name: String,
    pub root: NodeId,
}

#[derive(Debug, Clone)]
pub enum AssetEvent {
    EnvironmentInstalled,
    EnvironmentFailed(LoadError),
    ModelInserted(LoadedAsset),
    ModelFailed(LoadError),
    TexturesSettled(TextureSet),
}

#[derive(Default)]
struct TextureCollector {
    requested: BTreeMap<TextureChannel, PathBuf>,
    loaded: BTreeMap<TextureChannel, TextureHandle>,
    failed: BTreeMap<TextureChannel, LoadError>,
    set: Option<TextureSet>,
}

impl TextureCollector {
    fn outstanding(&self) -> impl Iterator<Item = (&TextureChannel, &PathBuf)> {
        self.requested.iter().filter(|(channel, _)| {
            !self.loaded.contains_key(channel) && !self.failed.contains_key(channel)
        })
    }

    fn try_settle(&mut self) -> Option<TextureSet> {
        if self.set.is_some() || self.outstanding().next().is_some() {
            return None;
        }
        let set: TextureSet = self
            .loaded
            .iter()
            .map(|(channel, handle)| (*channel, handle.clone()))
            .collect();
        let names: Vec<String> = set.channels().map(|channel| channel.to_string()).collect();
        log::info!(
            "Texture set ready: {} of {} channels [{}]",
            set.len(),
            self.requested.len(),
            names.join(", ")
        );
        self.set = Some(set.clone());
        Some(set)
    }
}

pub struct AssetLoader {
    worker: WorkerHandle,
    placement: PlacementConfig,
    environment: LoadState<EnvironmentHandle>,
    model: LoadState<LoadedAsset>,
    model_path: Option<PathBuf>,
    environment_path: Option<PathBuf>,
    textures: TextureCollector,
}

impl AssetLoader {
    pub fn new(source: Arc<dyn AssetSource>, placement: PlacementConfig) -> Self {
        Self {
            worker: WorkerHandle::spawn(source),
            placement,
            environment: LoadState::Idle,
            model: LoadState::Idle,
            model_path: None,
            environment_path: None,
            textures: TextureCollector::default(),
        }
    }

    pub fn load_environment(&mut self, path: PathBuf) {
        if !matches!(self.environment, LoadState::Idle) {
            log::warn!("Environment already requested; ignoring {}", path.display());
            return;
        }
        log::info!("Loading environment {}", path.display());
        self.environment_path = Some(path.clone());
        self.environment = LoadState::Pending;
        if !self.worker.send(WorkerCommand::LoadEnvironment { path: path.clone() }) {
            self.environment = LoadState::Failed(worker_gone(&path));
        }
    }

    pub fn load_model(&mut self, path: PathBuf) {
        if !matches!(self.model, LoadState::Idle) {
            log::warn!("Model already requested; ignoring {}", path.display());
            return;
        }
        log::info!("Loading model {}", path.display());
        self.model_path = Some(path.clone());
        self.model = LoadState::Pending;
        if !self.worker.send(WorkerCommand::LoadModel { path: path.clone() }) {
            self.model = LoadState::Failed(worker_gone(&path));
        }
    }

    /// Requests every channel once. An empty request settles immediately
    /// with an empty set.
    pub fn load_textures(&mut self, paths: BTreeMap<TextureChannel, PathBuf>) {
        if !self.textures.requested.is_empty() || self.textures.set.is_some() {
            log::warn!("Textures already requested; ignoring new request");
            return;
        }
        for (channel, path) in paths {
            self.textures.requested.insert(channel, path.clone());
            if !self.worker.send(WorkerCommand::LoadTexture {
                channel,
                path: path.clone(),
            }) {
                self.textures.failed.insert(channel, worker_gone(&path));
            }
        }
        self.textures.try_settle();
    }

    pub fn environment(&self) -> &LoadState<EnvironmentHandle> {
        &self.environment
    }

    pub fn model_state(&self) -> &LoadState<LoadedAsset> {
        &self.model
    }

    pub fn model(&self) -> Option<&LoadedAsset> {
        self.model.resolved()
    }

    /// Frozen texture set, once every requested channel settled.
    pub fn texture_set(&self) -> Option<&TextureSet> {
        self.textures.set.as_ref()
    }

    pub fn texture_error(&self, channel: TextureChannel) -> Option<&LoadError> {
        self.textures.failed.get(&channel)
    }

    /// True when nothing is in flight.
    pub fn is_settled(&self) -> bool {
        !self.environment.is_pending()
            && !self.model.is_pending()
            && self.textures.outstanding().next().is_none()
    }

    /// Applies finished work to `scene` without blocking.
    pub fn poll(&mut self, scene: &mut SceneGraph) -> Vec<AssetEvent> {
        let mut events = Vec::new();
        loop {
            match self.worker.try_recv() {
                Ok(Some(result)) => self.handle_result(result, scene, &mut events),
                Ok(None) => break,
                Err(_) => {
                    self.fail_outstanding(&mut events);
                    break;
                }
            }
        }
        events
    }

    fn handle_result(
        &mut self,
        result: WorkerResult,
        scene: &mut SceneGraph,
        events: &mut Vec<AssetEvent>,
    ) {
        match result {
            WorkerResult::Environment { path, result } => match result {
                Ok(map) => {
                    log::info!(
                        "Environment {} ready ({}x{})",
                        path.display(),
                        map.width,
                        map.height
                    );
                    let handle = EnvironmentHandle::new(map);
                    scene.set_environment(handle.clone());
                    self.environment = LoadState::Resolved(handle);
                    events.push(AssetEvent::EnvironmentInstalled);
                }
                Err(err) => {
                    log::error!("{}; continuing without environment lighting", err);
                    self.environment = LoadState::Failed(err.clone());
                    events.push(AssetEvent::EnvironmentFailed(err));
                }
            },
            WorkerResult::Model { path, result } => match result {
                Ok(spec) => {
                    let spec = prepare_model(spec, &self.placement);
                    let name = spec.name.clone();
                    let node_count = spec.node_count();
                    let root = scene.insert_model(spec);
                    log::info!(
                        "Model {} inserted ({} nodes)",
                        path.display(),
                        node_count
                    );
                    let asset = LoadedAsset { name, root };
                    self.model = LoadState::Resolved(asset.clone());
                    events.push(AssetEvent::ModelInserted(asset));
                }
                Err(err) => {
                    log::error!("{}; continuing without a model", err);
                    self.model = LoadState::Failed(err.clone());
                    events.push(AssetEvent::ModelFailed(err));
                }
            },
            WorkerResult::Texture {
                channel,
                path,
                result,
            } => {
                match result {
                    Ok(texture) => {
                        log::debug!(
                            "Texture {} ready from {} ({}x{})",
                            channel,
                            path.display(),
                            texture.width,
                            texture.height
                        );
                        self.textures
                            .loaded
                            .insert(channel, TextureHandle::new(texture));
                    }
                    Err(err) => {
                        log::error!("{} texture unavailable: {}", channel, err);
                        self.textures.failed.insert(channel, err);
                    }
                }
                if let Some(set) = self.textures.try_settle() {
                    events.push(AssetEvent::TexturesSettled(set));
                }
            }
        }
    }

    fn fail_outstanding(&mut self, events: &mut Vec<AssetEvent>) {
        if self.environment.is_pending() {
            let err = worker_gone_opt(self.environment_path.as_ref());
            log::error!("{}", err);
            self.environment = LoadState::Failed(err.clone());
            events.push(AssetEvent::EnvironmentFailed(err));
        }
        if self.model.is_pending() {
            let err = worker_gone_opt(self.model_path.as_ref());
            log::error!("{}", err);
            self.model = LoadState::Failed(err.clone());
            events.push(AssetEvent::ModelFailed(err));
        }
        let outstanding: Vec<(TextureChannel, PathBuf)> = self
            .textures
            .outstanding()
            .map(|(channel, path)| (*channel, path.clone()))
            .collect();
        for (channel, path) in outstanding {
            self.textures.failed.insert(channel, worker_gone(&path));
        }
        if let Some(set) = self.textures.try_settle() {
            events.push(AssetEvent::TexturesSettled(set));
        }
    }
}

/// Shadows on every mesh, then the authored-units scale and offset on the
/// root. Runs before insertion so the graph never sees a half-prepared model.
pub fn prepare_model(mut spec: NodeSpec, placement: &PlacementConfig) -> NodeSpec {
    spec.visit_meshes_mut(&mut |mesh| {
        mesh.cast_shadow = true;
        mesh.receive_shadow = true;
    });
    spec.transform.scale = Vec3::splat(placement.scale);
    spec.transform.translation = Vec3::from(placement.position);
    spec
}

fn worker_gone(path: &std::path::Path) -> LoadError {
    LoadError::WorkerGone {
        path: path.display().to_string(),
    }
}

fn worker_gone_opt(path: Option<&PathBuf>) -> LoadError {
    LoadError::WorkerGone {
        path: path
            .map(|path| path.display().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::material::{Material, StandardMaterial, Texture};
    use crate::scene::{EnvironmentMap, EnvironmentMapping, Surface};
    use std::path::Path;
    use std::time::{Duration, Instant};

    /// In-memory source: paths containing "missing" fail to load.
    pub(crate) struct StubSource;

    impl AssetSource for StubSource {
        fn load_environment(&self, path: &Path) -> Result<EnvironmentMap, LoadError> {
            check(path)?;
            Ok(EnvironmentMap {
                width: 4,
                height: 2,
                mapping: EnvironmentMapping::EquirectangularReflection,
                rgba: vec![1.0; 4 * 2 * 4],
            })
        }

        fn load_model(&self, path: &Path) -> Result<NodeSpec, LoadError> {
            check(path)?;
            let mut root = NodeSpec::group("stub");
            let mut body = NodeSpec::mesh(
                "body",
                vec![Surface::new(Material::Standard(StandardMaterial::new("paint")))],
            );
            body.children.push(NodeSpec::mesh(
                "panel",
                vec![Surface::new(Material::Standard(StandardMaterial::new("cells")))],
            ));
            root.children.push(body);
            Ok(root)
        }

        fn load_texture(&self, channel: TextureChannel, path: &Path) -> Result<Texture, LoadError> {
            check(path)?;
            Ok(Texture::new(channel, 1, 1, vec![255; 4], [channel as u8; 32]))
        }
    }

    fn check(path: &Path) -> Result<(), LoadError> {
        if path.to_string_lossy().contains("missing") {
            return Err(LoadError::Read {
                path: path.display().to_string(),
                reason: "not found".to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn poll_until_settled(
        loader: &mut AssetLoader,
        scene: &mut SceneGraph,
    ) -> Vec<AssetEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        loop {
            events.extend(loader.poll(scene));
            if loader.is_settled() || Instant::now() > deadline {
                return events;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn loader() -> AssetLoader {
        AssetLoader::new(Arc::new(StubSource), PlacementConfig::default())
    }

    #[test]
    fn requests_do_not_block_and_start_pending() {
        let mut loader = loader();
        loader.load_model(PathBuf::from("solar_skid.glb"));
        loader.load_environment(PathBuf::from("quarry.hdr"));
        // Nothing is applied until the frame loop polls.
        assert!(loader.model_state().is_pending());
        assert!(loader.environment().is_pending());
        assert!(!loader.is_settled());
    }

    #[test]
    fn model_is_prepared_before_insertion() {
        let mut loader = loader();
        let mut scene = SceneGraph::new();
        loader.load_model(PathBuf::from("solar_skid.glb"));
        let events = poll_until_settled(&mut loader, &mut scene);

        assert!(events
            .iter()
            .any(|event| matches!(event, AssetEvent::ModelInserted(_))));
        let asset = loader.model().unwrap().clone();
        assert_eq!(scene.model_count(), 1);
        let root = scene.node(asset.root).unwrap();
        assert_eq!(root.transform.scale, Vec3::splat(0.02));
        assert_eq!(root.transform.translation, Vec3::new(0.0, -1.0, 0.0));
        for id in scene.descendants(asset.root) {
            if let Some(mesh) = &scene.node(id).unwrap().mesh {
                assert!(mesh.cast_shadow && mesh.receive_shadow);
            }
        }
    }

    #[test]
    fn failed_model_inserts_nothing() {
        let mut loader = loader();
        let mut scene = SceneGraph::new();
        loader.load_model(PathBuf::from("missing.glb"));
        let events = poll_until_settled(&mut loader, &mut scene);

        assert!(events
            .iter()
            .any(|event| matches!(event, AssetEvent::ModelFailed(LoadError::Read { .. }))));
        assert_eq!(scene.model_count(), 0);
        assert_eq!(scene.node_count(), 0);
        assert!(loader.model_state().error().is_some());
    }

    #[test]
    fn environment_installs_as_background_and_reflection() {
        let mut loader = loader();
        let mut scene = SceneGraph::new();
        loader.load_environment(PathBuf::from("quarry.hdr"));
        poll_until_settled(&mut loader, &mut scene);

        let handle = loader.environment().resolved().unwrap();
        assert!(scene.background().unwrap().same_as(handle));
        assert!(scene.environment().unwrap().same_as(handle));
    }

    #[test]
    fn failed_environment_leaves_scene_without_lighting() {
        let mut loader = loader();
        let mut scene = SceneGraph::new();
        loader.load_environment(PathBuf::from("missing.hdr"));
        poll_until_settled(&mut loader, &mut scene);
        assert!(loader.environment().error().is_some());
        assert!(scene.environment().is_none());
        assert!(scene.background().is_none());
    }

    #[test]
    fn textures_settle_once_with_failed_channels_absent() {
        let mut loader = loader();
        let mut scene = SceneGraph::new();
        let paths = TextureChannel::ALL
            .into_iter()
            .map(|channel| {
                let file = if channel == TextureChannel::Height {
                    "missing_height.jpg".to_string()
                } else {
                    format!("{}.jpg", channel)
                };
                (channel, PathBuf::from(file))
            })
            .collect();
        loader.load_textures(paths);
        let events = poll_until_settled(&mut loader, &mut scene);

        let settled: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                AssetEvent::TexturesSettled(set) => Some(set.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].len(), 5);
        assert!(settled[0].get(TextureChannel::Height).is_none());
        assert!(loader.texture_error(TextureChannel::Height).is_some());
        assert_eq!(loader.texture_set(), Some(&settled[0]));
    }

    #[test]
    fn empty_texture_request_settles_immediately() {
        let mut loader = loader();
        loader.load_textures(BTreeMap::new());
        assert_eq!(loader.texture_set().map(TextureSet::len), Some(0));
    }

    #[test]
    fn second_model_request_is_ignored() {
        let mut loader = loader();
        let mut scene = SceneGraph::new();
        loader.load_model(PathBuf::from("solar_skid.glb"));
        loader.load_model(PathBuf::from("other.glb"));
        poll_until_settled(&mut loader, &mut scene);
        assert_eq!(scene.model_count(), 1);
    }
}
