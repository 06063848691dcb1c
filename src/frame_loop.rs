//! Fixed-timestep frame driver.
//!
//! Each tick runs to completion; a stop request only prevents the next one
//! from being scheduled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default frames per second.
pub const DEFAULT_FPS: f32 = 60.0;

/// Cloneable flag that asks a running loop to stop after the current frame.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Timing of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    pub index: u64,
    /// Seconds since the loop started, at the start of this frame.
    pub time: f32,
    pub dt: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSummary {
    pub frames: u64,
    pub stopped_early: bool,
    /// Simulated seconds covered by the rendered frames.
    pub duration: f32,
}

pub struct AnimationLoop {
    dt: f32,
    max_frames: Option<u64>,
    stop: StopHandle,
}

impl AnimationLoop {
    pub fn new(fps: f32) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            log::warn!("Invalid fps {}, using {}", fps, DEFAULT_FPS);
            DEFAULT_FPS
        };
        Self {
            dt: 1.0 / fps,
            max_frames: None,
            stop: StopHandle::new(),
        }
    }

    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.max_frames = Some(frames);
        self
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Call `on_frame` once per tick until the frame limit is reached, a stop
    /// is requested, or `on_frame` fails.
    pub fn run<E>(&mut self, mut on_frame: impl FnMut(FrameTick) -> Result<(), E>) -> Result<LoopSummary, E> {
        let mut index = 0u64;
        loop {
            if self.max_frames.is_some_and(|max| index >= max) {
                break;
            }
            if self.stop.is_stopped() {
                log::info!("Frame loop stopped after {} frames", index);
                return Ok(LoopSummary {
                    frames: index,
                    stopped_early: true,
                    duration: index as f32 * self.dt,
                });
            }

            on_frame(FrameTick {
                index,
                time: index as f32 * self.dt,
                dt: self.dt,
            })?;
            index += 1;
        }

        Ok(LoopSummary {
            frames: index,
            stopped_early: false,
            duration: index as f32 * self.dt,
        })
    }
}
