use std::any::Any;
use std::io;
use thiserror::Error;

/// Error type for parallel operations.
#[derive(Error, Debug)]
pub enum ParError {
    /// IO error, e.g. the OS refused to spawn a thread.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error.
    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A thread count of zero was requested.
    #[error("Invalid thread count {0}: at least one thread is required")]
    InvalidThreadCount(usize),

    /// Maximum or minimum was requested over an empty sequence.
    #[error("Empty input has no extreme value")]
    EmptyInput,

    /// The caller was cancelled while waiting for results.
    ///
    /// `suppressed` holds every further interruption or fault observed
    /// while cleaning up after the cancellation.
    #[error("Operation cancelled ({} suppressed)", .suppressed.len())]
    Cancelled {
        /// Descriptions of the suppressed events.
        suppressed: Vec<String>,
    },

    /// The pool has been closed and accepts no more work.
    #[error("Thread pool is closed")]
    PoolClosed,

    /// A task panicked while computing its slot.
    #[error("Task {index} panicked: {message}")]
    TaskPanicked {
        /// Slot index of the failed task.
        index: usize,
        /// Panic payload rendered as text.
        message: String,
    },

    /// Error with a string message.
    #[error("{0}")]
    StringError(String),
}

impl ParError {
    /// A cancellation without suppressed events.
    pub(crate) fn cancelled() -> Self {
        ParError::Cancelled {
            suppressed: Vec::new(),
        }
    }
}

/// Result type alias for parallel operations.
pub type Result<T> = std::result::Result<T, ParError>;

/// Renders a panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
