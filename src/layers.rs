//! Layer tags and glow classification.
//!
//! Every renderable carries a [`Layers`] bitset. Deciding whether an object
//! belongs to the glow set is a single mask test against that bitset, so
//! objects added to the scene at any time are classified without any extra
//! registration.

use crate::scene_graph::{EntityId, RenderObject};

/// Number of addressable layers.
pub const LAYER_COUNT: u8 = 32;

/// Default layer every object starts on.
pub const DEFAULT_LAYER: u8 = 0;

/// Layer used to mark objects that should glow.
pub const BLOOM_LAYER: u8 = 1;

/// A 32-bit layer membership mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layers {
    mask: u32,
}

impl Layers {
    /// Membership in no layer at all.
    pub const NONE: Layers = Layers { mask: 0 };

    /// Membership in a single layer.
    pub fn only(layer: u8) -> Self {
        Self { mask: Self::bit(layer) }
    }

    /// Construct from a raw bit mask.
    pub fn from_mask(mask: u32) -> Self {
        Self { mask }
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    fn bit(layer: u8) -> u32 {
        if layer >= LAYER_COUNT {
            log::warn!("Layer {} out of range, using layer {}", layer, LAYER_COUNT - 1);
        }
        1u32 << layer.min(LAYER_COUNT - 1)
    }

    /// Replace membership with exactly one layer.
    pub fn set(&mut self, layer: u8) {
        self.mask = Self::bit(layer);
    }

    pub fn enable(&mut self, layer: u8) {
        self.mask |= Self::bit(layer);
    }

    pub fn disable(&mut self, layer: u8) {
        self.mask &= !Self::bit(layer);
    }

    pub fn toggle(&mut self, layer: u8) {
        self.mask ^= Self::bit(layer);
    }

    pub fn is_enabled(&self, layer: u8) -> bool {
        self.mask & Self::bit(layer) != 0
    }

    /// True if the two masks share at least one layer.
    pub fn test(&self, other: &Layers) -> bool {
        self.mask & other.mask != 0
    }
}

impl Default for Layers {
    fn default() -> Self {
        Self::only(DEFAULT_LAYER)
    }
}

/// Decides whether an object belongs to the glow set for the current frame.
///
/// Implementations must be pure with respect to the object: they read the
/// tag, never write it.
pub trait GlowClassifier {
    fn is_glowing(&self, id: EntityId, object: &RenderObject) -> bool;
}

/// Classifies objects by testing their layers against a glow mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerClassifier {
    glow_layers: Layers,
}

impl LayerClassifier {
    pub fn new(glow_layers: Layers) -> Self {
        Self { glow_layers }
    }

    pub fn glow_layers(&self) -> Layers {
        self.glow_layers
    }
}

impl Default for LayerClassifier {
    fn default() -> Self {
        Self::new(Layers::only(BLOOM_LAYER))
    }
}

impl GlowClassifier for LayerClassifier {
    fn is_glowing(&self, _id: EntityId, object: &RenderObject) -> bool {
        object.layers.test(&self.glow_layers)
    }
}

impl<F> GlowClassifier for F
where
    F: Fn(EntityId, &RenderObject) -> bool,
{
    fn is_glowing(&self, id: EntityId, object: &RenderObject) -> bool {
        self(id, object)
    }
}
