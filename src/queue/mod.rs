//! Upload queue: admission, scheduling and the file state machine.
//!
//! The queue is an actor. [`UploadQueue::new`] spawns a driver task that
//! exclusively owns the ordered file collection; [`UploadQueue`] is a cheap
//! cloneable handle. Each operation resolves once the driver has applied it,
//! including the re-evaluation pass it triggers.
//!
//! # Overview
//!
//! - [`UploadQueue`] - Handle for queue operations
//! - [`FileHandle`] - Per-file `start`/`cancel`/`remove` capabilities
//! - [`QueueConfig`] - Parallelism, batch window, auto-start, auto-remove
//! - [`QueueObserver`] - Notification callbacks
//! - [`QueueError`] - Operation error types
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use uploader_core::Capabilities;
//! use uploader_core::queue::{NoopObserver, QueueConfig, UploadQueue};
//! use uploader_core::upload::{HttpTransport, TransferExecutor, TransferOptions, UploadFile};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let capabilities = Capabilities::detect();
//! let executor = Arc::new(TransferExecutor::new(
//!     TransferOptions::builder("https://example.com/upload").build()?,
//!     Arc::new(HttpTransport::new()?),
//!     capabilities,
//! ));
//! let config = QueueConfig::builder()
//!     .max_parallel_uploads(2)
//!     .auto_start(true)
//!     .build();
//! let queue = UploadQueue::with_executor(config, NoopObserver, capabilities, executor);
//!
//! let handles = queue
//!     .add_files(vec![UploadFile::from_path("report.pdf").await?])
//!     .await?;
//! handles[0].cancel().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod driver;
mod error;
mod observer;
pub mod schedule;

pub use config::{QueueConfig, QueueConfigBuilder};
pub use error::QueueError;
pub use observer::{NoopObserver, QueueEvent, QueueObserver};

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::instrument;

use crate::capability::Capabilities;
use crate::upload::{TransferExecutor, UploadFile, UploadId, UploadStatus};
use driver::{Command, QueueDriver};

/// Handle to an upload queue.
///
/// Clones share the same queue. The driver stops when every handle has
/// been dropped or [`shutdown`](Self::shutdown) is called.
#[derive(Debug, Clone)]
pub struct UploadQueue {
    commands: mpsc::UnboundedSender<Command>,
    config: QueueConfig,
}

impl UploadQueue {
    /// Creates a queue without a default executor.
    ///
    /// Files must carry their own installed executor to be started.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    #[must_use]
    pub fn new(
        config: QueueConfig,
        observer: impl QueueObserver,
        capabilities: Capabilities,
    ) -> Self {
        Self::spawn(config, Arc::new(observer), capabilities, None)
    }

    /// Creates a queue that starts files without their own executor on
    /// `executor`.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    #[must_use]
    pub fn with_executor(
        config: QueueConfig,
        observer: impl QueueObserver,
        capabilities: Capabilities,
        executor: Arc<TransferExecutor>,
    ) -> Self {
        Self::spawn(config, Arc::new(observer), capabilities, Some(executor))
    }

    fn spawn(
        config: QueueConfig,
        observer: Arc<dyn QueueObserver>,
        capabilities: Capabilities,
        executor: Option<Arc<TransferExecutor>>,
    ) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let driver = QueueDriver::new(
            config,
            capabilities,
            observer,
            executor,
            commands.downgrade(),
        );
        tokio::spawn(driver.run(receiver));
        Self { commands, config }
    }

    #[must_use]
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, QueueError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| QueueError::Closed)?;
        response.await.map_err(|_| QueueError::Closed)
    }

    /// Admits files in order, then runs one re-evaluation pass.
    ///
    /// Files whose identity is already queued are skipped. A file already
    /// marked `failed` keeps that status and is reported through the error
    /// path; every other file becomes `queued`. Returns handles for the
    /// admitted files.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the driver has stopped.
    #[instrument(skip(self, files), fields(count = files.len()))]
    pub async fn add_files(&self, files: Vec<UploadFile>) -> Result<Vec<FileHandle>, QueueError> {
        let ids = self
            .request(|reply| Command::AddFiles { files, reply })
            .await?;
        Ok(ids.into_iter().map(|id| self.handle(id)).collect())
    }

    /// Removes a file, canceling it first if it is uploading.
    ///
    /// Returns false for an unknown id. Unless `suppress_cascade`, a
    /// re-evaluation pass follows.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the driver has stopped.
    #[instrument(skip(self), fields(file_id = %id))]
    pub async fn remove_file(&self, id: UploadId, suppress_cascade: bool) -> Result<bool, QueueError> {
        self.request(|reply| Command::RemoveFile {
            id,
            suppress_cascade,
            reply,
        })
        .await
    }

    /// Removes every file whose status is not in `exclude`.
    ///
    /// Queued and uploading files are kept unless `cancel_in_progress` is
    /// set. Fires one queue-changed notification; returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the driver has stopped.
    #[instrument(skip(self))]
    pub async fn clear_files(
        &self,
        exclude: &[UploadStatus],
        cancel_in_progress: bool,
    ) -> Result<usize, QueueError> {
        let exclude = exclude.to_vec();
        self.request(|reply| Command::ClearFiles {
            exclude,
            cancel_in_progress,
            reply,
        })
        .await
    }

    /// Starts a queued file regardless of the scheduling policy.
    ///
    /// Returns false when the file is unknown or not `queued`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the driver has stopped.
    #[instrument(skip(self), fields(file_id = %id))]
    pub async fn start_file(&self, id: UploadId) -> Result<bool, QueueError> {
        self.request(|reply| Command::StartFile { id, reply }).await
    }

    /// Cancels a queued or uploading file.
    ///
    /// Returns false when the file is unknown or in any other status.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the driver has stopped.
    #[instrument(skip(self), fields(file_id = %id))]
    pub async fn cancel_file(&self, id: UploadId) -> Result<bool, QueueError> {
        self.request(|reply| Command::CancelFile { id, reply }).await
    }

    /// Snapshot of the queue in admission order.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the driver has stopped.
    pub async fn files(&self) -> Result<Vec<UploadFile>, QueueError> {
        self.request(|reply| Command::Files { reply }).await
    }

    /// Snapshot of one file, `None` if it is not in the queue.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the driver has stopped.
    pub async fn file(&self, id: UploadId) -> Result<Option<UploadFile>, QueueError> {
        self.request(|reply| Command::File { id, reply }).await
    }

    /// Returns a handle bound to `id`. Unknown ids yield a handle whose
    /// operations are no-ops.
    #[must_use]
    pub fn handle(&self, id: UploadId) -> FileHandle {
        FileHandle {
            id,
            queue: self.clone(),
        }
    }

    /// Runs a re-evaluation pass after an external change.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the driver has stopped.
    pub async fn notify_state_changed(&self) -> Result<(), QueueError> {
        self.request(|reply| Command::StateChanged { reply }).await
    }

    /// Cancels in-flight transfers and the batch timer, then stops the driver.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the driver had already stopped.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<(), QueueError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}

/// The `start`, `cancel` and `remove` capabilities of one queued file.
///
/// Once the file has been removed every operation is a no-op returning
/// `false`.
#[derive(Debug, Clone)]
pub struct FileHandle {
    id: UploadId,
    queue: UploadQueue,
}

impl FileHandle {
    #[must_use]
    pub fn id(&self) -> UploadId {
        self.id
    }

    /// See [`UploadQueue::start_file`].
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the driver has stopped.
    pub async fn start(&self) -> Result<bool, QueueError> {
        self.queue.start_file(self.id).await
    }

    /// See [`UploadQueue::cancel_file`].
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the driver has stopped.
    pub async fn cancel(&self) -> Result<bool, QueueError> {
        self.queue.cancel_file(self.id).await
    }

    /// Removes the file with a cascading re-evaluation pass.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the driver has stopped.
    pub async fn remove(&self) -> Result<bool, QueueError> {
        self.queue.remove_file(self.id, false).await
    }

    /// Current snapshot of the file, `None` once removed.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Closed`] if the driver has stopped.
    pub async fn snapshot(&self) -> Result<Option<UploadFile>, QueueError> {
        self.queue.file(self.id).await
    }
}
