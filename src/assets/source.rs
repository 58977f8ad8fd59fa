//! Decoding seam for asset bytes. `FileSource` reads from disk and hands the
//! bytes to `image` (environment, textures) and `gltf` (model).

use super::LoadError;
use crate::material::{Material, StandardMaterial, Texture, TextureChannel};
use crate::scene::{EnvironmentMap, EnvironmentMapping, NodeSpec, Surface, Transform};
use glam::{Quat, Vec3};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Produces decoded assets. Called on the asset worker thread.
pub trait AssetSource: Send + Sync + 'static {
    fn load_environment(&self, path: &Path) -> Result<EnvironmentMap, LoadError>;
    fn load_model(&self, path: &Path) -> Result<NodeSpec, LoadError>;
    fn load_texture(&self, channel: TextureChannel, path: &Path) -> Result<Texture, LoadError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FileSource;

impl AssetSource for FileSource {
    fn load_environment(&self, path: &Path) -> Result<EnvironmentMap, LoadError> {
        let bytes = read_bytes(path)?;
        let image = image::load_from_memory(&bytes).map_err(|err| LoadError::Image {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        let rgba = image.to_rgba32f();
        Ok(EnvironmentMap {
            width: rgba.width(),
            height: rgba.height(),
            mapping: EnvironmentMapping::EquirectangularReflection,
            rgba: rgba.into_raw(),
        })
    }

    fn load_model(&self, path: &Path) -> Result<NodeSpec, LoadError> {
        let (document, _buffers, _images) = gltf::import(path).map_err(|err| match err {
            gltf::Error::Io(source) => LoadError::Read {
                path: path.display().to_string(),
                reason: source.to_string(),
            },
            other => LoadError::Model {
                path: path.display().to_string(),
                reason: other.to_string(),
            },
        })?;
        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .ok_or_else(|| LoadError::EmptyModel {
                path: path.display().to_string(),
            })?;

        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("model");
        let mut root = NodeSpec::group(name);
        root.children = scene.nodes().map(convert_node).collect();
        Ok(root)
    }

    fn load_texture(&self, channel: TextureChannel, path: &Path) -> Result<Texture, LoadError> {
        let bytes = read_bytes(path)?;
        let digest: [u8; 32] = Sha256::digest(&bytes).into();
        let image = image::load_from_memory(&bytes).map_err(|err| LoadError::Image {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Texture::new(channel, width, height, rgba.into_raw(), digest))
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|source| LoadError::Read {
        path: path.display().to_string(),
        reason: source.to_string(),
    })
}

fn convert_node(node: gltf::Node<'_>) -> NodeSpec {
    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node{}", node.index()));
    let mut spec = match node.mesh() {
        Some(mesh) => NodeSpec::mesh(
            name,
            mesh.primitives()
                .map(|primitive| Surface::new(convert_material(&primitive.material())))
                .collect(),
        ),
        None => NodeSpec::group(name),
    };
    let (translation, rotation, scale) = node.transform().decomposed();
    spec.transform = Transform {
        translation: Vec3::from(translation),
        rotation: Quat::from_array(rotation),
        scale: Vec3::from(scale),
    };
    spec.children = node.children().map(convert_node).collect();
    spec
}

fn convert_material(material: &gltf::Material<'_>) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let mut standard = StandardMaterial::new(material.name().unwrap_or("default"));
    standard.base_color = pbr.base_color_factor();
    standard.metalness = pbr.metallic_factor();
    standard.roughness = pbr.roughness_factor();
    standard.emissive = material.emissive_factor();
    Material::Standard(standard)
}
