//! Layered surface materials and the pipeline that assigns texture channels
//! onto every standard-shaded surface of the loaded model.

use crate::config::MaterialConfig;
use crate::scene::{NodeId, SceneGraph};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TextureChannel {
    Albedo,
    Metalness,
    Roughness,
    Normal,
    Height,
    Emissive,
}

impl TextureChannel {
    pub const ALL: [TextureChannel; 6] = [
        TextureChannel::Albedo,
        TextureChannel::Metalness,
        TextureChannel::Roughness,
        TextureChannel::Normal,
        TextureChannel::Height,
        TextureChannel::Emissive,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TextureChannel::Albedo => "albedo",
            TextureChannel::Metalness => "metalness",
            TextureChannel::Roughness => "roughness",
            TextureChannel::Normal => "normal",
            TextureChannel::Height => "height",
            TextureChannel::Emissive => "emissive",
        }
    }
}

impl fmt::Display for TextureChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
}

/// Decoded texture image. Immutable once created.
pub struct Texture {
    pub channel: TextureChannel,
    pub width: u32,
    pub height: u32,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub flip_y: bool,
    /// SHA-256 of the encoded source bytes.
    pub digest: [u8; 32],
    pub rgba: Vec<u8>,
}

impl Texture {
    /// Channel textures tile and keep glTF's top-left UV origin.
    pub fn new(channel: TextureChannel, width: u32, height: u32, rgba: Vec<u8>, digest: [u8; 32]) -> Self {
        Self {
            channel,
            width,
            height,
            wrap_s: WrapMode::Repeat,
            wrap_t: WrapMode::Repeat,
            flip_y: false,
            digest,
            rgba,
        }
    }

    pub fn digest_hex(&self) -> String {
        self.digest.iter().map(|byte| format!("{:02x}", byte)).collect()
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("channel", &self.channel)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("wrap_s", &self.wrap_s)
            .field("wrap_t", &self.wrap_t)
            .field("flip_y", &self.flip_y)
            .field("digest", &self.digest_hex())
            .finish_non_exhaustive()
    }
}

/// Shared reference to a texture; equal only to handles of the same texture.
#[derive(Debug, Clone)]
pub struct TextureHandle(Arc<Texture>);

impl TextureHandle {
    pub fn new(texture: Texture) -> Self {
        Self(Arc::new(texture))
    }

    pub fn texture(&self) -> &Texture {
        &self.0
    }
}

impl PartialEq for TextureHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Texture per channel. Built once when every requested channel settled;
/// channels that failed to load are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextureSet {
    maps: BTreeMap<TextureChannel, TextureHandle>,
}

impl TextureSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, channel: TextureChannel) -> Option<&TextureHandle> {
        self.maps.get(&channel)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn channels(&self) -> impl Iterator<Item = TextureChannel> + '_ {
        self.maps.keys().copied()
    }
}

impl FromIterator<(TextureChannel, TextureHandle)> for TextureSet {
    fn from_iter<I: IntoIterator<Item = (TextureChannel, TextureHandle)>>(iter: I) -> Self {
        Self {
            maps: iter.into_iter().collect(),
        }
    }
}

/// Metallic/roughness surface parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardMaterial {
    pub name: String,
    pub base_color: [f32; 4],
    pub metalness: f32,
    pub roughness: f32,
    pub map: Option<TextureHandle>,
    pub metalness_map: Option<TextureHandle>,
    pub roughness_map: Option<TextureHandle>,
    pub normal_map: Option<TextureHandle>,
    pub displacement_map: Option<TextureHandle>,
    pub displacement_scale: f32,
    pub emissive: [f32; 3],
    pub emissive_map: Option<TextureHandle>,
    pub emissive_intensity: f32,
    /// Set when parameters changed and the backend must rebuild the surface.
    pub needs_update: bool,
}

impl StandardMaterial {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            metalness: 1.0,
            roughness: 1.0,
            map: None,
            metalness_map: None,
            roughness_map: None,
            normal_map: None,
            displacement_map: None,
            displacement_scale: 1.0,
            emissive: [0.0, 0.0, 0.0],
            emissive_map: None,
            emissive_intensity: 1.0,
            needs_update: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    Standard(StandardMaterial),
    /// Unlit surfaces; left untouched by the pipeline.
    Basic { name: String, color: [f32; 4] },
}

impl Material {
    pub fn name(&self) -> &str {
        match self {
            Material::Standard(material) => &material.name,
            Material::Basic { name, .. } => name,
        }
    }

    pub fn as_standard(&self) -> Option<&StandardMaterial> {
        match self {
            Material::Standard(material) => Some(material),
            Material::Basic { .. } => None,
        }
    }
}

pub struct MaterialPipeline {
    constants: MaterialConfig,
}

impl MaterialPipeline {
    pub fn new(constants: MaterialConfig) -> Self {
        Self { constants }
    }

    pub fn constants(&self) -> MaterialConfig {
        self.constants
    }

    pub fn set_displacement_scale(&mut self, scale: f32) {
        self.constants.displacement_scale = scale;
    }

    pub fn set_emissive_rgb(&mut self, rgb: [f32; 3]) {
        self.constants.emissive_rgb = rgb;
    }

    pub fn set_emissive_intensity(&mut self, intensity: f32) {
        self.constants.emissive_intensity = intensity;
    }

    /// Assigns `textures` and the constants to every standard surface under
    /// `model`. Returns the number of surfaces touched; zero when the model
    /// has not resolved yet.
    pub fn apply(
        &self,
        scene: &mut SceneGraph,
        model: Option<NodeId>,
        textures: &TextureSet,
    ) -> usize {
        let Some(root) = model else {
            return 0;
        };
        let constants = self.constants;
        let mut touched = 0;
        scene.visit_surfaces_mut(root, |surface| {
            let Material::Standard(material) = &mut surface.material else {
                return;
            };
            material.map = textures.get(TextureChannel::Albedo).cloned();
            material.metalness_map = textures.get(TextureChannel::Metalness).cloned();
            material.roughness_map = textures.get(TextureChannel::Roughness).cloned();
            material.normal_map = textures.get(TextureChannel::Normal).cloned();
            material.displacement_map = textures.get(TextureChannel::Height).cloned();
            material.displacement_scale = constants.displacement_scale;
            material.emissive = constants.emissive_rgb;
            material.emissive_map = textures.get(TextureChannel::Emissive).cloned();
            material.emissive_intensity = constants.emissive_intensity;
            material.needs_update = true;
            touched += 1;
        });
        log::debug!(
            "Material pass: {} surfaces, {} texture channels",
            touched,
            textures.len()
        );
        touched
    }

    /// Re-assigns a single channel's slot, leaving the others alone.
    pub fn apply_channel(
        &self,
        scene: &mut SceneGraph,
        model: Option<NodeId>,
        channel: TextureChannel,
        textures: &TextureSet,
    ) -> usize {
        let Some(root) = model else {
            return 0;
        };
        let handle = textures.get(channel).cloned();
        let mut touched = 0;
        scene.visit_surfaces_mut(root, |surface| {
            let Material::Standard(material) = &mut surface.material else {
                return;
            };
            let slot = match channel {
                TextureChannel::Albedo => &mut material.map,
                TextureChannel::Metalness => &mut material.metalness_map,
                TextureChannel::Roughness => &mut material.roughness_map,
                TextureChannel::Normal => &mut material.normal_map,
                TextureChannel::Height => &mut material.displacement_map,
                TextureChannel::Emissive => &mut material.emissive_map,
            };
            *slot = handle.clone();
            material.needs_update = true;
            touched += 1;
        });
        log::debug!("Re-applied {} map to {} surfaces", channel, touched);
        touched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{NodeSpec, SceneGraph, Surface};

    fn texture(channel: TextureChannel) -> TextureHandle {
        TextureHandle::new(Texture::new(channel, 2, 2, vec![255; 16], [channel as u8; 32]))
    }

    fn full_set() -> TextureSet {
        TextureChannel::ALL
            .into_iter()
            .map(|channel| (channel, texture(channel)))
            .collect()
    }

    fn model_spec() -> NodeSpec {
        let mut root = NodeSpec::group("model");
        let mut body = NodeSpec::mesh(
            "body",
            vec![
                Surface::new(Material::Standard(StandardMaterial::new("paint"))),
                Surface::new(Material::Basic {
                    name: "decal".to_string(),
                    color: [1.0; 4],
                }),
            ],
        );
        body.children
            .push(NodeSpec::mesh("panel", vec![Surface::new(Material::Standard(
                StandardMaterial::new("cells"),
            ))]));
        root.children.push(body);
        root
    }

    fn surfaces(scene: &SceneGraph, root: NodeId) -> Vec<Material> {
        let mut out = Vec::new();
        scene.visit_surfaces(root, |surface| out.push(surface.material.clone()));
        out
    }

    #[test]
    fn apply_assigns_every_channel_and_constant() {
        let mut scene = SceneGraph::new();
        let root = scene.insert_model(model_spec());
        let textures = full_set();
        let pipeline = MaterialPipeline::new(MaterialConfig::default());

        let touched = pipeline.apply(&mut scene, Some(root), &textures);
        assert_eq!(touched, 2);

        for material in surfaces(&scene, root) {
            let Some(standard) = material.as_standard() else {
                assert_eq!(material.name(), "decal");
                continue;
            };
            assert_eq!(standard.map.as_ref(), textures.get(TextureChannel::Albedo));
            assert_eq!(
                standard.displacement_map.as_ref(),
                textures.get(TextureChannel::Height)
            );
            assert_eq!(
                standard.emissive_map.as_ref(),
                textures.get(TextureChannel::Emissive)
            );
            assert_eq!(standard.displacement_scale, 0.05);
            assert_eq!(standard.emissive_intensity, 2.0);
            assert_eq!(standard.emissive, [1.0, 170.0 / 255.0, 0.0]);
            assert!(standard.needs_update);
        }
    }

    #[test]
    fn apply_is_idempotent() {
        let mut scene = SceneGraph::new();
        let root = scene.insert_model(model_spec());
        let textures = full_set();
        let pipeline = MaterialPipeline::new(MaterialConfig::default());

        pipeline.apply(&mut scene, Some(root), &textures);
        let once = surfaces(&scene, root);
        pipeline.apply(&mut scene, Some(root), &textures);
        assert_eq!(surfaces(&scene, root), once);
    }

    #[test]
    fn apply_without_model_is_a_noop() {
        let mut scene = SceneGraph::new();
        let pipeline = MaterialPipeline::new(MaterialConfig::default());
        assert_eq!(pipeline.apply(&mut scene, None, &full_set()), 0);
    }

    #[test]
    fn missing_channels_leave_maps_empty() {
        let mut scene = SceneGraph::new();
        let root = scene.insert_model(model_spec());
        let textures: TextureSet = [(TextureChannel::Normal, texture(TextureChannel::Normal))]
            .into_iter()
            .collect();
        let pipeline = MaterialPipeline::new(MaterialConfig::default());
        pipeline.apply(&mut scene, Some(root), &textures);

        let materials = surfaces(&scene, root);
        let standard = materials[0].as_standard().unwrap();
        assert!(standard.map.is_none());
        assert!(standard.normal_map.is_some());
    }

    #[test]
    fn edited_constants_take_effect_on_reapply() {
        let mut scene = SceneGraph::new();
        let root = scene.insert_model(model_spec());
        let mut pipeline = MaterialPipeline::new(MaterialConfig::default());
        pipeline.apply(&mut scene, Some(root), &TextureSet::empty());
        pipeline.set_emissive_intensity(4.0);
        pipeline.set_displacement_scale(0.2);
        pipeline.apply(&mut scene, Some(root), &TextureSet::empty());

        let materials = surfaces(&scene, root);
        let standard = materials[0].as_standard().unwrap();
        assert_eq!(standard.emissive_intensity, 4.0);
        assert_eq!(standard.displacement_scale, 0.2);
    }

    #[test]
    fn single_channel_reapply_touches_only_its_slot() {
        let mut scene = SceneGraph::new();
        let root = scene.insert_model(model_spec());
        let pipeline = MaterialPipeline::new(MaterialConfig::default());
        let textures = full_set();

        let touched =
            pipeline.apply_channel(&mut scene, Some(root), TextureChannel::Roughness, &textures);
        assert_eq!(touched, 2);

        let materials = surfaces(&scene, root);
        let standard = materials[0].as_standard().unwrap();
        assert_eq!(
            standard.roughness_map.as_ref(),
            textures.get(TextureChannel::Roughness)
        );
        assert!(standard.map.is_none());
        assert_eq!(standard.displacement_scale, 1.0);
        assert!(standard.needs_update);
    }
}
