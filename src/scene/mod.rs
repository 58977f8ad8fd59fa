//! Scene graph handed to the render backend: node arena, lights and the
//! environment used as background and reflection source.

use crate::material::Material;
use glam::{Mat4, Quat, Vec3};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightId(usize);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub material: Material,
}

impl Surface {
    pub fn new(material: Material) -> Self {
        Self { material }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub surfaces: Vec<Surface>,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<Mesh>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Detached node tree, prepared completely before it enters the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<Mesh>,
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            mesh: None,
            children: Vec::new(),
        }
    }

    pub fn mesh(name: impl Into<String>, surfaces: Vec<Surface>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            mesh: Some(Mesh {
                surfaces,
                cast_shadow: false,
                receive_shadow: false,
            }),
            children: Vec::new(),
        }
    }

    pub fn visit_meshes_mut(&mut self, f: &mut impl FnMut(&mut Mesh)) {
        if let Some(mesh) = &mut self.mesh {
            f(mesh);
        }
        for child in &mut self.children {
            child.visit_meshes_mut(f);
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(NodeSpec::node_count).sum::<usize>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentMapping {
    EquirectangularReflection,
}

/// Decoded environment map (linear RGBA, f32).
pub struct EnvironmentMap {
    pub width: u32,
    pub height: u32,
    pub mapping: EnvironmentMapping,
    pub rgba: Vec<f32>,
}

impl std::fmt::Debug for EnvironmentMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentMap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("mapping", &self.mapping)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct EnvironmentHandle(Arc<EnvironmentMap>);

impl EnvironmentHandle {
    pub fn new(map: EnvironmentMap) -> Self {
        Self(Arc::new(map))
    }

    pub fn map(&self) -> &EnvironmentMap {
        &self.0
    }

    pub fn same_as(&self, other: &EnvironmentHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Ambient,
    Directional { position: Vec3, cast_shadow: bool },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: [f32; 3],
    pub intensity: f32,
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    models: Vec<NodeId>,
    lights: Vec<Light>,
    background: Option<EnvironmentHandle>,
    environment: Option<EnvironmentHandle>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a whole prepared tree as a model root in one step.
    pub fn insert_model(&mut self, spec: NodeSpec) -> NodeId {
        let root = self.insert_node(spec, None);
        self.roots.push(root);
        self.models.push(root);
        root
    }

    fn insert_node(&mut self, spec: NodeSpec, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: spec.name,
            transform: spec.transform,
            mesh: spec.mesh,
            parent,
            children: Vec::new(),
        });
        for child in spec.children {
            let child_id = self.insert_node(child, Some(id));
            self.nodes[id.0].children.push(child_id);
        }
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn models(&self) -> &[NodeId] {
        &self.models
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn add_light(&mut self, light: Light) -> LightId {
        self.lights.push(light);
        LightId(self.lights.len() - 1)
    }

    pub fn light(&self, id: LightId) -> Option<&Light> {
        self.lights.get(id.0)
    }

    pub fn light_mut(&mut self, id: LightId) -> Option<&mut Light> {
        self.lights.get_mut(id.0)
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Installs `handle` as both the background and the reflection source.
    pub fn set_environment(&mut self, handle: EnvironmentHandle) {
        self.background = Some(handle.clone());
        self.environment = Some(handle);
    }

    pub fn background(&self) -> Option<&EnvironmentHandle> {
        self.background.as_ref()
    }

    pub fn environment(&self) -> Option<&EnvironmentHandle> {
        self.environment.as_ref()
    }

    /// Pre-order walk of `root` and its descendants.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id.0) else {
                continue;
            };
            order.push(id);
            stack.extend(node.children().iter().rev().copied());
        }
        order
    }

    pub fn visit_surfaces(&self, root: NodeId, mut f: impl FnMut(&Surface)) {
        for id in self.descendants(root) {
            if let Some(mesh) = &self.nodes[id.0].mesh {
                mesh.surfaces.iter().for_each(&mut f);
            }
        }
    }

    pub fn visit_surfaces_mut(&mut self, root: NodeId, mut f: impl FnMut(&mut Surface)) {
        for id in self.descendants(root) {
            if let Some(mesh) = &mut self.nodes[id.0].mesh {
                mesh.surfaces.iter_mut().for_each(&mut f);
            }
        }
    }

    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let mut node = self.nodes.get(id.0)?;
        let mut matrix = node.transform.matrix();
        while let Some(parent) = node.parent() {
            node = self.nodes.get(parent.0)?;
            matrix = node.transform.matrix() * matrix;
        }
        Some(matrix)
    }

    pub fn mesh_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.mesh.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::StandardMaterial;

    fn surface(name: &str) -> Surface {
        Surface::new(Material::Standard(StandardMaterial::new(name)))
    }

    #[test]
    fn insert_model_keeps_tree_shape() {
        let mut spec = NodeSpec::group("root");
        let mut arm = NodeSpec::mesh("arm", vec![surface("a")]);
        arm.children.push(NodeSpec::mesh("hand", vec![surface("b")]));
        spec.children.push(arm);
        spec.children.push(NodeSpec::group("empty"));

        let mut scene = SceneGraph::new();
        let root = scene.insert_model(spec);
        assert_eq!(scene.node_count(), 4);
        assert_eq!(scene.model_count(), 1);
        assert_eq!(scene.mesh_count(), 2);

        let names: Vec<_> = scene
            .descendants(root)
            .into_iter()
            .map(|id| scene.node(id).unwrap().name.clone())
            .collect();
        assert_eq!(names, ["root", "arm", "hand", "empty"]);
    }

    #[test]
    fn world_matrix_composes_parent_transforms() {
        let mut spec = NodeSpec::group("root");
        spec.transform.scale = Vec3::splat(0.5);
        spec.transform.translation = Vec3::new(0.0, -1.0, 0.0);
        let mut child = NodeSpec::group("child");
        child.transform.translation = Vec3::new(2.0, 0.0, 0.0);
        spec.children.push(child);

        let mut scene = SceneGraph::new();
        let root = scene.insert_model(spec);
        let child_id = scene.node(root).unwrap().children()[0];
        let world = scene.world_matrix(child_id).unwrap();
        let origin = world.transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(1.0, -1.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn environment_installs_background_and_reflection() {
        let mut scene = SceneGraph::new();
        let handle = EnvironmentHandle::new(EnvironmentMap {
            width: 2,
            height: 1,
            mapping: EnvironmentMapping::EquirectangularReflection,
            rgba: vec![0.0; 8],
        });
        scene.set_environment(handle.clone());
        assert!(scene.background().unwrap().same_as(&handle));
        assert!(scene.environment().unwrap().same_as(&handle));
    }
}
