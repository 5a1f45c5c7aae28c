//! Per-tick interpolation of the displayed frame toward the scroll target.
//!
//! State machine:
//!
//! ```text
//! Idle ──target moves──▶ Animating ──|delta| <= epsilon──▶ Converged
//!                            ▲                                 │
//!                            └────────target moves─────────────┘
//! any ──cancel()──▶ Cancelled (terminal, ticks are no-ops)
//! ```

use log::debug;

use crate::cache::FrameCache;
use crate::sequence::FrameIndex;

/// Smoothed playback position.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationState {
    /// Smoothed position, continuous.
    pub current: f64,
    /// Authoritative desired position, continuous.
    pub target: f64,
    /// Last frame actually drawn.
    pub last_rendered: Option<FrameIndex>,
}

impl Default for AnimationState {
    fn default() -> Self {
        Self {
            current: 1.0,
            target: 1.0,
            last_rendered: None,
        }
    }
}

impl AnimationState {
    /// Frame to look up for the current position.
    pub fn display_frame(&self) -> FrameIndex {
        self.current.round().max(0.0) as FrameIndex
    }

    /// Jump straight to the target, skipping the smoothing.
    pub fn snap_to_target(&mut self) {
        self.current = self.target;
    }
}

/// All mutable engine state, owned by whoever mounts the player and lent to
/// the scheduler, the interpolation loop and the renderer.
#[derive(Default)]
pub struct SequenceState {
    pub animation: AnimationState,
    pub cache: FrameCache,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Idle,
    Animating,
    Converged,
    Cancelled,
}

pub struct InterpolationLoop {
    damping: f64,
    epsilon: f64,
    phase: LoopPhase,
}

impl InterpolationLoop {
    /// `damping` is the fraction of the remaining distance covered per tick,
    /// in `(0, 1)`; `epsilon` the distance below which the loop is converged.
    pub fn new(damping: f64, epsilon: f64) -> Self {
        Self {
            damping,
            epsilon,
            phase: LoopPhase::Idle,
        }
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    pub fn is_cancelled(&self) -> bool {
        self.phase == LoopPhase::Cancelled
    }

    /// Advance one tick. Returns the frame to render, or `None` when the
    /// loop is converged (or cancelled) and nothing should be drawn.
    pub fn tick(&mut self, state: &mut AnimationState) -> Option<FrameIndex> {
        if self.is_cancelled() {
            return None;
        }
        let delta = state.target - state.current;
        if delta.abs() <= self.epsilon {
            if self.phase == LoopPhase::Animating {
                debug!("interpolation: converged at {:.3}", state.current);
                self.phase = LoopPhase::Converged;
            }
            return None;
        }
        self.phase = LoopPhase::Animating;
        state.current += delta * self.damping;
        Some(state.display_frame())
    }

    /// Stop the loop for good. Safe to call more than once.
    pub fn cancel(&mut self) {
        if self.phase != LoopPhase::Cancelled {
            debug!("interpolation: cancelled");
            self.phase = LoopPhase::Cancelled;
        }
    }
}
