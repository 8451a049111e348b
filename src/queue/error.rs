//! Error types for queue operations.
//!
//! Transfer failures, validation rejections and cancellations are not
//! errors here: they are file outcomes reported through the observer.

use thiserror::Error;

/// Errors returned by the upload queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue driver has shut down.
    #[error("upload queue is closed")]
    Closed,
}
