//! Scene graph consumed by the bloom compositor.
//!
//! Entities own their transform, their current material reference and their
//! layer tag. The order in which entities were added to the scene is the
//! traversal order, and each entity appears in it at most once.

use std::collections::HashMap;

use glam::{EulerRot, Mat4, Vec3};

use crate::layers::Layers;
use crate::material::{Color, MaterialRef};

/// Unique identifier for scene entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

/// Types of meshes available for instantiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshType {
    Cube,
    Plane,
    Sphere,
}

/// Transform component for scene entities.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3, // Euler angles in radians
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }

    /// Model matrix: translation * rotation (XYZ) * scale.
    pub fn matrix(&self) -> Mat4 {
        let translation = Mat4::from_translation(self.position);
        let rotation = Mat4::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        );
        let scale = Mat4::from_scale(self.scale);
        translation * rotation * scale
    }
}

/// A polyline with optional per-point colors.
#[derive(Debug, Clone, Default)]
pub struct LineStrip {
    pub points: Vec<Vec3>,
    /// Either empty or the same length as `points`.
    pub colors: Vec<Color>,
}

impl LineStrip {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a point with the given color.
    pub fn push(&mut self, point: Vec3, color: Color) {
        if self.colors.len() != self.points.len() {
            self.colors.resize(self.points.len(), Color::WHITE);
        }
        self.points.push(point);
        self.colors.push(color);
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.colors.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Color of the point at `index`, white when no colors were given.
    pub fn color_at(&self, index: usize) -> Color {
        self.colors.get(index).copied().unwrap_or(Color::WHITE)
    }
}

/// What an entity draws.
#[derive(Debug, Clone)]
pub enum ObjectKind {
    Mesh(MeshType),
    Line(LineStrip),
}

/// A renderable scene entity.
#[derive(Debug, Clone)]
pub struct RenderObject {
    pub kind: ObjectKind,
    pub transform: Transform,
    /// Current material. `None` means the object draws nothing.
    pub material: Option<MaterialRef>,
    pub layers: Layers,
    pub visible: bool,
}

impl RenderObject {
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            transform: Transform::default(),
            material: None,
            layers: Layers::default(),
            visible: true,
        }
    }

    pub fn with_material(mut self, material: MaterialRef) -> Self {
        self.material = Some(material);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_layer(mut self, layer: u8) -> Self {
        self.layers.enable(layer);
        self
    }

    /// Whether a renderer should emit anything for this object.
    pub fn is_drawable(&self) -> bool {
        self.visible
            && self
                .material
                .as_ref()
                .map(|m| m.is_drawn())
                .unwrap_or(false)
    }
}

/// The scene graph.
#[derive(Debug)]
pub struct SceneGraph {
    entities: HashMap<EntityId, RenderObject>,
    /// Entities that have been added to the scene (will be rendered).
    scene_entities: Vec<EntityId>,
    next_id: u64,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            scene_entities: Vec::new(),
            next_id: 1,
        }
    }

    fn new_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Store an object and return its ID.
    /// The object is NOT added to the scene automatically.
    pub fn create(&mut self, object: RenderObject) -> EntityId {
        let id = self.new_id();
        self.entities.insert(id, object);
        id
    }

    /// Create a mesh with no material. Not added to the scene.
    pub fn create_mesh(&mut self, mesh_type: MeshType) -> EntityId {
        self.create(RenderObject::new(ObjectKind::Mesh(mesh_type)))
    }

    /// Create an object and add it to the scene in one step.
    pub fn spawn(&mut self, object: RenderObject) -> EntityId {
        let id = self.create(object);
        self.add_to_scene(id);
        id
    }

    /// Add an entity to the scene (make it renderable).
    /// Returns true if the entity was added, false if already in scene or doesn't exist.
    pub fn add_to_scene(&mut self, id: EntityId) -> bool {
        if !self.entities.contains_key(&id) {
            return false;
        }
        if self.scene_entities.contains(&id) {
            return false;
        }
        self.scene_entities.push(id);
        true
    }

    /// Remove an entity from the scene (stop rendering it).
    /// The entity still exists and can be re-added.
    pub fn remove_from_scene(&mut self, id: EntityId) -> bool {
        if let Some(pos) = self.scene_entities.iter().position(|&e| e == id) {
            self.scene_entities.remove(pos);
            true
        } else {
            false
        }
    }

    /// Destroy an entity completely (removes from scene and deletes).
    pub fn destroy(&mut self, id: EntityId) -> bool {
        self.remove_from_scene(id);
        self.entities.remove(&id).is_some()
    }

    pub fn get(&self, id: EntityId) -> Option<&RenderObject> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut RenderObject> {
        self.entities.get_mut(&id)
    }

    /// Current material of an entity, if it exists and has one.
    pub fn material(&self, id: EntityId) -> Option<&MaterialRef> {
        self.entities.get(&id).and_then(|o| o.material.as_ref())
    }

    /// Replace an entity's material, returning the previous one.
    /// Returns `None` if the entity doesn't exist or had no material.
    pub fn set_material(&mut self, id: EntityId, material: Option<MaterialRef>) -> Option<MaterialRef> {
        let object = self.entities.get_mut(&id)?;
        std::mem::replace(&mut object.material, material)
    }

    /// Every entity in the scene, in insertion order, each exactly once.
    pub fn renderables(&self) -> impl Iterator<Item = (EntityId, &RenderObject)> {
        self.scene_entities
            .iter()
            .filter_map(|&id| self.entities.get(&id).map(|o| (id, o)))
    }

    /// Visit every entity in the scene mutably, in insertion order, each exactly once.
    pub fn traverse_mut(&mut self, mut visit: impl FnMut(EntityId, &mut RenderObject)) {
        for id in &self.scene_entities {
            if let Some(object) = self.entities.get_mut(id) {
                visit(*id, object);
            }
        }
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.scene_entities.clear();
    }

    pub fn exists(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn is_in_scene(&self, id: EntityId) -> bool {
        self.scene_entities.contains(&id)
    }

    /// Number of entities in the scene.
    pub fn len(&self) -> usize {
        self.scene_entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scene_entities.is_empty()
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}
