//! Mask/restore bookkeeping for selective bloom.
//!
//! Before the glow render every object outside the glow set has its material
//! swapped for a shared placeholder, and the original reference is parked in
//! a saved-state table keyed by entity identity. After the glow render the
//! table is drained back onto the objects. The table is empty at the start
//! and at the end of every frame.
//!
//! ```text
//!   Unmasked --mask()--> Masked --restore()--> Unmasked
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::layers::GlowClassifier;
use crate::material::{Material, MaterialRef};
use crate::scene_graph::{EntityId, SceneGraph};

/// How non-glowing objects are hidden from the glow pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskMode {
    /// Draw them opaque black. They keep occluding glowing objects behind them.
    #[default]
    Darken,
    /// Don't draw them at all.
    Hide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskState {
    Unmasked,
    Masked,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MaskError {
    #[error("scene is already masked; restore() must run before the next mask()")]
    AlreadyMasked,
}

/// Counts from one `mask()` traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaskSummary {
    /// Objects whose material was swapped for the placeholder.
    pub masked: usize,
    /// Objects left untouched because they glow.
    pub glowing: usize,
    /// Objects skipped because they carry no material.
    pub without_material: usize,
}

/// Counts from one `restore()` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub restored: usize,
    /// Entries dropped because their object was destroyed while masked.
    pub orphaned: usize,
}

/// Owns the placeholder material and the saved-state table.
pub struct MaskController {
    mode: MaskMode,
    placeholder: MaterialRef,
    saved: HashMap<EntityId, MaterialRef>,
    state: MaskState,
}

impl MaskController {
    pub fn new(mode: MaskMode) -> Self {
        Self {
            mode,
            placeholder: Self::placeholder_for(mode),
            saved: HashMap::new(),
            state: MaskState::Unmasked,
        }
    }

    fn placeholder_for(mode: MaskMode) -> MaterialRef {
        match mode {
            MaskMode::Darken => Material::black().into_ref(),
            MaskMode::Hide => Material::hidden().into_ref(),
        }
    }

    pub fn mode(&self) -> MaskMode {
        self.mode
    }

    /// Switch placeholder style. Only takes effect between frames.
    pub fn set_mode(&mut self, mode: MaskMode) -> Result<(), MaskError> {
        if self.state == MaskState::Masked {
            return Err(MaskError::AlreadyMasked);
        }
        if mode != self.mode {
            self.mode = mode;
            self.placeholder = Self::placeholder_for(mode);
        }
        Ok(())
    }

    /// The material assigned to masked objects.
    pub fn placeholder(&self) -> &MaterialRef {
        &self.placeholder
    }

    pub fn state(&self) -> MaskState {
        self.state
    }

    /// Number of entries currently parked in the saved-state table.
    pub fn saved_len(&self) -> usize {
        self.saved.len()
    }

    /// Whether the given entity currently has a parked material.
    pub fn is_saved(&self, id: EntityId) -> bool {
        self.saved.contains_key(&id)
    }

    /// Swap the placeholder onto every renderable the classifier rejects.
    pub fn mask<C>(&mut self, scene: &mut SceneGraph, classifier: &C) -> Result<MaskSummary, MaskError>
    where
        C: GlowClassifier + ?Sized,
    {
        if self.state == MaskState::Masked {
            return Err(MaskError::AlreadyMasked);
        }

        // Anything left here belongs to a previous frame.
        if !self.saved.is_empty() {
            log::debug!("Dropping {} stale saved-state entries", self.saved.len());
            self.saved.clear();
        }

        let placeholder = &self.placeholder;
        let saved = &mut self.saved;
        let mut summary = MaskSummary::default();

        scene.traverse_mut(|id, object| {
            if classifier.is_glowing(id, object) {
                summary.glowing += 1;
                return;
            }

            let Some(current) = object.material.as_ref() else {
                summary.without_material += 1;
                return;
            };

            if Arc::ptr_eq(current, placeholder) {
                return;
            }

            if let Entry::Vacant(slot) = saved.entry(id) {
                slot.insert(Arc::clone(current));
                object.material = Some(Arc::clone(placeholder));
                summary.masked += 1;
            }
        });

        self.state = MaskState::Masked;
        log::debug!(
            "Masked {} objects ({} glowing, {} without material)",
            summary.masked,
            summary.glowing,
            summary.without_material
        );
        Ok(summary)
    }

    /// Put every parked material back. A no-op when unmasked.
    pub fn restore(&mut self, scene: &mut SceneGraph) -> RestoreSummary {
        let mut summary = RestoreSummary::default();

        for (id, material) in self.saved.drain() {
            match scene.get_mut(id) {
                Some(object) => {
                    object.material = Some(material);
                    summary.restored += 1;
                }
                None => {
                    log::debug!("Entity {:?} was destroyed while masked; dropping its saved material", id);
                    summary.orphaned += 1;
                }
            }
        }

        self.state = MaskState::Unmasked;
        summary
    }

    /// Mask the scene and return a guard that restores it when finished or dropped.
    ///
    /// While the guard lives the scene is only reachable read-only, so nothing
    /// but rendering can happen in the masked state.
    pub fn masked<'a, C>(
        &'a mut self,
        scene: &'a mut SceneGraph,
        classifier: &C,
    ) -> Result<MaskedScene<'a>, MaskError>
    where
        C: GlowClassifier + ?Sized,
    {
        let summary = self.mask(scene, classifier)?;
        Ok(MaskedScene {
            controller: self,
            scene,
            summary,
            restored: false,
        })
    }
}

impl Default for MaskController {
    fn default() -> Self {
        Self::new(MaskMode::default())
    }
}

/// A scene in the masked state.
pub struct MaskedScene<'a> {
    controller: &'a mut MaskController,
    scene: &'a mut SceneGraph,
    summary: MaskSummary,
    restored: bool,
}

impl MaskedScene<'_> {
    pub fn summary(&self) -> MaskSummary {
        self.summary
    }

    /// Restore materials and leave the masked state.
    pub fn finish(mut self) -> RestoreSummary {
        self.restored = true;
        self.controller.restore(self.scene)
    }
}

impl Deref for MaskedScene<'_> {
    type Target = SceneGraph;

    fn deref(&self) -> &SceneGraph {
        &*self.scene
    }
}

impl Drop for MaskedScene<'_> {
    fn drop(&mut self) {
        if !self.restored {
            let summary = self.controller.restore(self.scene);
            log::debug!("Restored {} materials on early exit from masked state", summary.restored);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{LayerClassifier, BLOOM_LAYER};
    use crate::material::Color;
    use crate::scene_graph::{MeshType, ObjectKind, RenderObject};

    fn mesh_with(color: u32) -> RenderObject {
        RenderObject::new(ObjectKind::Mesh(MeshType::Sphere))
            .with_material(Material::builder("m").color(Color::from_hex(color)).build().into_ref())
    }

    fn three_object_scene() -> (SceneGraph, Vec<EntityId>) {
        let mut scene = SceneGraph::new();
        let a = scene.spawn(mesh_with(0xff0000));
        let b = scene.spawn(mesh_with(0x00ff00).with_layer(BLOOM_LAYER));
        let c = scene.spawn(mesh_with(0x0000ff));
        (scene, vec![a, b, c])
    }

    #[test]
    fn test_mask_swaps_only_non_glowing() {
        let (mut scene, ids) = three_object_scene();
        let mut controller = MaskController::default();

        let summary = controller.mask(&mut scene, &LayerClassifier::default()).unwrap();
        assert_eq!(summary.masked, 2);
        assert_eq!(summary.glowing, 1);
        assert_eq!(controller.saved_len(), 2);
        assert_eq!(controller.state(), MaskState::Masked);

        let placeholder = controller.placeholder().clone();
        assert!(Arc::ptr_eq(scene.material(ids[0]).unwrap(), &placeholder));
        assert!(!Arc::ptr_eq(scene.material(ids[1]).unwrap(), &placeholder));
        assert!(Arc::ptr_eq(scene.material(ids[2]).unwrap(), &placeholder));
    }

    #[test]
    fn test_restore_is_lossless() {
        let (mut scene, ids) = three_object_scene();
        let before: Vec<MaterialRef> = ids.iter().map(|&id| scene.material(id).unwrap().clone()).collect();
        let mut controller = MaskController::default();

        controller.mask(&mut scene, &LayerClassifier::default()).unwrap();
        let summary = controller.restore(&mut scene);

        assert_eq!(summary.restored, 2);
        assert_eq!(controller.saved_len(), 0);
        assert_eq!(controller.state(), MaskState::Unmasked);
        for (id, original) in ids.iter().zip(&before) {
            assert!(Arc::ptr_eq(scene.material(*id).unwrap(), original));
        }
    }

    #[test]
    fn test_double_mask_is_rejected() {
        let (mut scene, _) = three_object_scene();
        let mut controller = MaskController::default();
        controller.mask(&mut scene, &LayerClassifier::default()).unwrap();

        let err = controller.mask(&mut scene, &LayerClassifier::default()).unwrap_err();
        assert_eq!(err, MaskError::AlreadyMasked);
        // The table still holds the real originals, not placeholders.
        controller.restore(&mut scene);
        assert!(scene.renderables().all(|(_, o)| o.material.as_ref().unwrap().name == "m"));
    }

    #[test]
    fn test_missing_material_is_skipped() {
        let mut scene = SceneGraph::new();
        scene.spawn(RenderObject::new(ObjectKind::Mesh(MeshType::Cube)));
        let mut controller = MaskController::default();

        let summary = controller.mask(&mut scene, &LayerClassifier::default()).unwrap();
        assert_eq!(summary.without_material, 1);
        assert_eq!(summary.masked, 0);
        assert_eq!(controller.saved_len(), 0);
    }

    #[test]
    fn test_destroyed_while_masked_is_orphaned() {
        let (mut scene, ids) = three_object_scene();
        let mut controller = MaskController::default();
        controller.mask(&mut scene, &LayerClassifier::default()).unwrap();

        scene.destroy(ids[0]);
        let summary = controller.restore(&mut scene);
        assert_eq!(summary.restored, 1);
        assert_eq!(summary.orphaned, 1);
        assert_eq!(controller.saved_len(), 0);
    }

    #[test]
    fn test_restore_when_unmasked_is_noop() {
        let (mut scene, _) = three_object_scene();
        let mut controller = MaskController::default();
        assert_eq!(controller.restore(&mut scene), RestoreSummary::default());
    }

    #[test]
    fn test_guard_restores_on_drop() {
        let (mut scene, ids) = three_object_scene();
        let original = scene.material(ids[0]).unwrap().clone();
        let mut controller = MaskController::default();

        {
            let masked = controller.masked(&mut scene, &LayerClassifier::default()).unwrap();
            assert_eq!(masked.summary().masked, 2);
            assert_eq!(masked.material(ids[0]).unwrap().name, "placeholder_black");
        }

        assert_eq!(controller.state(), MaskState::Unmasked);
        assert!(Arc::ptr_eq(scene.material(ids[0]).unwrap(), &original));
    }

    #[test]
    fn test_guard_finish_reports_restore() {
        let (mut scene, _) = three_object_scene();
        let mut controller = MaskController::default();
        let masked = controller.masked(&mut scene, &LayerClassifier::default()).unwrap();
        let summary = masked.finish();
        assert_eq!(summary.restored, 2);
        assert_eq!(controller.saved_len(), 0);
    }

    #[test]
    fn test_hide_mode_placeholder_draws_nothing() {
        let (mut scene, ids) = three_object_scene();
        let mut controller = MaskController::new(MaskMode::Hide);
        controller.mask(&mut scene, &LayerClassifier::default()).unwrap();
        assert!(!scene.get(ids[0]).unwrap().is_drawable());
        assert!(scene.get(ids[1]).unwrap().is_drawable());
        controller.restore(&mut scene);
    }

    #[test]
    fn test_set_mode_refused_while_masked() {
        let (mut scene, _) = three_object_scene();
        let mut controller = MaskController::default();
        controller.mask(&mut scene, &LayerClassifier::default()).unwrap();
        assert!(controller.set_mode(MaskMode::Hide).is_err());
        controller.restore(&mut scene);
        assert!(controller.set_mode(MaskMode::Hide).is_ok());
        assert_eq!(controller.placeholder().name, "placeholder_hidden");
    }

    #[test]
    fn test_repeated_frames_keep_table_empty_between() {
        let (mut scene, _) = three_object_scene();
        let mut controller = MaskController::default();
        for _ in 0..5 {
            assert_eq!(controller.saved_len(), 0);
            controller.mask(&mut scene, &LayerClassifier::default()).unwrap();
            controller.restore(&mut scene);
            assert_eq!(controller.saved_len(), 0);
        }
    }
}
