//! Uploader Core Library
//!
//! Queued multipart file uploads: files are admitted into a shared queue,
//! started under a parallelism limit, transferred as `multipart/form-data`
//! requests with progress reporting, and tracked through a small status
//! state machine until they are uploaded, failed, canceled or removed.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`upload`] - File records, transfer options and the transfer executor
//! - [`queue`] - The upload queue, its scheduler and observer notifications
//! - [`area`] - Upload areas that validate selections and feed the queue
//! - [`capability`] - Environment capability flags

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod area;
pub mod capability;
pub mod queue;
pub mod upload;

// Re-export commonly used types
pub use area::{AreaError, AreaOptions, FilePolicy, Rejection, UploadArea, Uploader};
pub use capability::Capabilities;
pub use queue::{
    FileHandle, NoopObserver, QueueConfig, QueueError, QueueEvent, QueueObserver, UploadQueue,
};
pub use upload::{
    HttpTransport, TransferError, TransferEvent, TransferExecutor, TransferOptions, Transport,
    UploadFile, UploadId, UploadStatus,
};
