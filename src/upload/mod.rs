//! File model and HTTP transfer execution.
//!
//! This module owns everything about a single file and a single transfer;
//! it has no knowledge of the queue.
//!
//! # Features
//!
//! - [`UploadFile`] records with identity, status and transfer metadata
//! - Multipart uploads over `reqwest`, payload streamed from memory or disk
//! - Progress reported as body bytes are consumed
//! - Cooperative cancellation with exactly one terminal event per attempt
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use uploader_core::Capabilities;
//! use uploader_core::upload::{
//!     HttpTransport, TransferEvent, TransferExecutor, TransferOptions, UploadFile,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = TransferOptions::builder("https://example.com/upload")
//!     .header("Authorization", "Bearer token")
//!     .param("folder", "reports")
//!     .build()?;
//! let executor = TransferExecutor::new(options, Arc::new(HttpTransport::new()?), Capabilities::detect());
//!
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//! let file = UploadFile::from_path("report.pdf").await?;
//! let _handle = executor.transfer(&file, Arc::new(tx));
//! while let Some(event) = rx.recv().await {
//!     if let TransferEvent::Finished(outcome) = event {
//!         println!("{}: {}", outcome.status, outcome.response_text);
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod constants;
mod error;
mod executor;
mod file;
mod options;
mod progress;
mod transport;

pub use error::TransferError;
pub use executor::{
    TransferEvent, TransferExecutor, TransferHandle, TransferListener, TransferOutcome,
    resolve_response_text,
};
pub use file::{FileHook, FileHooks, Payload, UploadFile, UploadId, UploadStatus};
pub use options::{Localizer, TransferOptions, TransferOptionsBuilder, UrlSource};
pub use progress::{ProgressReporter, ProgressStream, percent_of};
pub use transport::{HttpTransport, Transport, TransferRequest, TransportResponse, merge_headers};
