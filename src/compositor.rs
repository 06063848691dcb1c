//! Dual-target selective bloom compositor.
//!
//! Each frame:
//! 1. mask non-glowing objects
//! 2. render the masked scene into the glow target and blur it
//! 3. restore materials
//! 4. render the untouched scene into the base target
//! 5. blend `base + strength * glow` into the output target
//!
//! Each configured glow group repeats steps 1 to 3 with its own layer and
//! target, and is added onto the output after step 5.
//!
//! Materials are always restored before the base render.

use image::RgbaImage;

use crate::backend::{BackendError, CompositeParams, GlowParams, RenderBackend, TargetUsage};
use crate::camera::Camera;
use crate::config::{BloomConfig, GlowGroup};
use crate::layers::{GlowClassifier, LayerClassifier, Layers};
use crate::mask::{MaskController, MaskError, MaskSummary, RestoreSummary};
use crate::scene_graph::SceneGraph;

#[derive(Debug, thiserror::Error)]
pub enum CompositorError {
    #[error(transparent)]
    Mask(#[from] MaskError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("{target} target is {actual:?} but the viewport is {expected:?}")]
    TargetSizeMismatch {
        target: &'static str,
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

/// Mask and restore counts for one glow group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupStats {
    pub name: String,
    pub mask: MaskSummary,
    pub restore: RestoreSummary,
}

/// What happened during one `render_frame()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    pub size: (u32, u32),
    pub mask: MaskSummary,
    pub restore: RestoreSummary,
    pub groups: Vec<GroupStats>,
}

impl FrameStats {
    /// Objects destroyed while masked, over every pass of the frame.
    pub fn orphaned(&self) -> usize {
        self.restore.orphaned + self.groups.iter().map(|g| g.restore.orphaned).sum::<usize>()
    }
}

struct GroupPass<T> {
    group: GlowGroup,
    classifier: LayerClassifier,
    target: T,
}

impl<T> GroupPass<T> {
    fn glow_params(&self, downsample: u32) -> GlowParams {
        GlowParams {
            threshold: self.group.threshold,
            radius: self.group.radius,
            downsample,
        }
    }
}

pub struct DualCompositor<B: RenderBackend, C: GlowClassifier = LayerClassifier> {
    backend: B,
    classifier: C,
    mask: MaskController,
    config: BloomConfig,
    width: u32,
    height: u32,
    glow_target: B::Target,
    base_target: B::Target,
    output_target: B::Target,
    groups: Vec<GroupPass<B::Target>>,
    /// Bumped every time the targets are reallocated.
    generation: u64,
    frame_index: u64,
}

impl<B: RenderBackend> DualCompositor<B, LayerClassifier> {
    /// Compositor that treats objects on the bloom layer as glowing.
    pub fn new(backend: B, width: u32, height: u32, config: BloomConfig) -> Result<Self, CompositorError> {
        Self::with_classifier(backend, LayerClassifier::default(), width, height, config)
    }
}

impl<B: RenderBackend, C: GlowClassifier> DualCompositor<B, C> {
    pub fn with_classifier(
        mut backend: B,
        classifier: C,
        width: u32,
        height: u32,
        config: BloomConfig,
    ) -> Result<Self, CompositorError> {
        let config = config.sanitize();
        let (width, height) = clamp_size(width, height);

        backend.resize_effects(width, height, config.downsample)?;
        let (glow_target, base_target, output_target) = allocate_targets(&mut backend, width, height)?;
        let groups = allocate_groups(&mut backend, &config.groups, width, height)?;
        log::info!("Compositor created at {}x{}", width, height);

        Ok(Self {
            backend,
            classifier,
            mask: MaskController::new(config.mask_mode),
            config,
            width,
            height,
            glow_target,
            base_target,
            output_target,
            groups,
            generation: 0,
            frame_index: 0,
        })
    }

    /// Render one frame into the output target.
    pub fn render_frame(&mut self, scene: &mut SceneGraph, camera: &Camera) -> Result<FrameStats, CompositorError> {
        let size = (self.width, self.height);
        check_target(&self.backend, "glow", &self.glow_target, size)?;
        check_target(&self.backend, "base", &self.base_target, size)?;
        check_target(&self.backend, "output", &self.output_target, size)?;
        for pass in &self.groups {
            check_target(&self.backend, "group", &pass.target, size)?;
        }

        let glow_params = GlowParams {
            threshold: self.config.threshold,
            radius: self.config.radius,
            downsample: self.config.downsample,
        };
        let (base_weight, glow_weight) = self.config.output_mode.weights(self.config.strength);
        let composite_params = CompositeParams {
            base_weight,
            glow_weight,
            exposure: self.config.exposure,
            clamp: self.config.clamp_output,
        };

        // Dropping the guard on an early return restores materials.
        let masked = self.mask.masked(scene, &self.classifier)?;
        let mask_summary = masked.summary();
        self.backend
            .render_scene(&masked, camera, &mut self.glow_target, self.config.glow_clear_color)?;
        self.backend.apply_glow(&mut self.glow_target, &glow_params)?;
        let restore_summary = masked.finish();

        let mut group_stats = Vec::with_capacity(self.groups.len());
        for pass in &mut self.groups {
            let params = pass.glow_params(self.config.downsample);
            let masked = self.mask.masked(scene, &pass.classifier)?;
            let mask = masked.summary();
            self.backend
                .render_scene(&masked, camera, &mut pass.target, self.config.glow_clear_color)?;
            self.backend.apply_glow(&mut pass.target, &params)?;
            group_stats.push(GroupStats {
                name: pass.group.name.clone(),
                mask,
                restore: masked.finish(),
            });
        }

        self.backend
            .render_scene(scene, camera, &mut self.base_target, self.config.base_clear_color)?;
        self.backend.composite(
            &self.base_target,
            &self.glow_target,
            &mut self.output_target,
            &composite_params,
        )?;
        for pass in &self.groups {
            let (_, weight) = self.config.output_mode.weights(pass.group.strength);
            self.backend.add_glow(
                &pass.target,
                &mut self.output_target,
                weight * self.config.exposure,
                self.config.clamp_output,
            )?;
        }

        let stats = FrameStats {
            frame: self.frame_index,
            size,
            mask: mask_summary,
            restore: restore_summary,
            groups: group_stats,
        };
        self.frame_index += 1;
        log::trace!("Frame {} done: {:?}", stats.frame, stats);
        Ok(stats)
    }

    /// Resize all targets. Returns false when the size didn't change.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<bool, CompositorError> {
        let (width, height) = clamp_size(width, height);
        if (width, height) == (self.width, self.height) {
            return Ok(false);
        }

        let (glow, base, output) = allocate_targets(&mut self.backend, width, height)?;
        let groups = allocate_groups(&mut self.backend, &self.config.groups, width, height)?;
        self.backend.resize_effects(width, height, self.config.downsample)?;

        self.glow_target = glow;
        self.base_target = base;
        self.output_target = output;
        self.groups = groups;
        self.width = width;
        self.height = height;
        self.generation += 1;
        log::info!("Compositor resized to {}x{}", width, height);
        Ok(true)
    }

    /// Replace the tuning. Takes effect on the next frame.
    ///
    /// On error the previous config, mask mode and group targets stay in place.
    pub fn set_config(&mut self, config: BloomConfig) -> Result<(), CompositorError> {
        let config = config.sanitize();
        let groups = if config.groups != self.config.groups {
            Some(allocate_groups(&mut self.backend, &config.groups, self.width, self.height)?)
        } else {
            None
        };
        if config.downsample != self.config.downsample {
            self.backend.resize_effects(self.width, self.height, config.downsample)?;
        }
        self.mask.set_mode(config.mask_mode)?;
        if let Some(groups) = groups {
            self.groups = groups;
        }
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &BloomConfig {
        &self.config
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frame_index
    }

    pub fn mask_controller(&self) -> &MaskController {
        &self.mask
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn glow_target(&self) -> &B::Target {
        &self.glow_target
    }

    pub fn base_target(&self) -> &B::Target {
        &self.base_target
    }

    pub fn output(&self) -> &B::Target {
        &self.output_target
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Blurred glow of the `index`th configured group.
    pub fn group_target(&self, index: usize) -> Option<&B::Target> {
        self.groups.get(index).map(|pass| &pass.target)
    }

    /// Read the last composited frame back.
    pub fn snapshot_output(&mut self) -> Result<RgbaImage, CompositorError> {
        Ok(self.backend.snapshot(&self.output_target)?)
    }
}

fn clamp_size(width: u32, height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        log::warn!("Viewport {}x{} clamped to at least 1x1", width, height);
    }
    (width.max(1), height.max(1))
}

fn allocate_targets<B: RenderBackend>(
    backend: &mut B,
    width: u32,
    height: u32,
) -> Result<(B::Target, B::Target, B::Target), BackendError> {
    let glow = backend.create_target("Glow Target", width, height, TargetUsage::Offscreen)?;
    let base = backend.create_target("Base Target", width, height, TargetUsage::Offscreen)?;
    let output = backend.create_target("Output Target", width, height, TargetUsage::Output)?;
    Ok((glow, base, output))
}

fn allocate_groups<B: RenderBackend>(
    backend: &mut B,
    groups: &[GlowGroup],
    width: u32,
    height: u32,
) -> Result<Vec<GroupPass<B::Target>>, BackendError> {
    groups
        .iter()
        .map(|group| -> Result<GroupPass<B::Target>, BackendError> {
            let label = format!("Glow Group Target '{}'", group.name);
            Ok(GroupPass {
                group: group.clone(),
                classifier: LayerClassifier::new(Layers::only(group.layer)),
                target: backend.create_target(&label, width, height, TargetUsage::Offscreen)?,
            })
        })
        .collect()
}

fn check_target<B: RenderBackend>(
    backend: &B,
    name: &'static str,
    target: &B::Target,
    expected: (u32, u32),
) -> Result<(), CompositorError> {
    let actual = backend.target_size(target);
    if actual != expected {
        return Err(CompositorError::TargetSizeMismatch {
            target: name,
            expected,
            actual,
        });
    }
    Ok(())
}
