use thiserror::Error;

use crate::sequence::FrameIndex;

/// Internal degradations of the frame engine.
///
/// None of these abort the animation loop: a failed frame stays absent from
/// the cache, and a missing render target turns a draw into a no-op.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame {index}: load failed after {attempts} attempt(s): {reason}")]
    ResourceLoad {
        index: FrameIndex,
        attempts: u32,
        reason: String,
    },

    #[error("render target is not attached")]
    MissingRenderTarget,
}

impl FrameError {
    /// Frame the error refers to, if any.
    pub fn index(&self) -> Option<FrameIndex> {
        match self {
            FrameError::ResourceLoad { index, .. } => Some(*index),
            FrameError::MissingRenderTarget => None,
        }
    }
}
