//! Interactive choice collaborator.
//!
//! Ambiguity is never auto-resolved; when the engine cannot decide it asks for
//! exactly one human decision through this trait. The CLI backs it with a
//! numbered stdin menu; tests use a scripted responder so every interactive
//! flow is replayable.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the choice collaborator.
#[derive(Debug, Error)]
pub enum ChoiceError {
    /// The input stream ended; no human is available to answer.
    #[error("Choice input closed")]
    Closed,

    #[error("Failed to read choice: {0}")]
    Io(#[from] std::io::Error),
}

/// A blocking, single-decision prompt.
#[async_trait]
pub trait Chooser: Send + Sync {
    /// Present `options` under `prompt` and return the index of the selection.
    ///
    /// Blocks until an answer arrives; there is no default and no timeout.
    async fn choose_one(&self, prompt: &str, options: &[String]) -> Result<usize, ChoiceError>;
}
