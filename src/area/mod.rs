//! Upload areas: turn file selections into admitted queue entries.
//!
//! An [`UploadArea`] is the intake side of the pipeline. It remembers a
//! selection, validates each file against its [`FilePolicy`], assigns fresh
//! identities, installs its own [`TransferExecutor`] on accepted files and
//! hands the whole selection to the shared queue in one admission.
//! [`Uploader`] owns the queue and the registered areas.

pub mod manager;
pub mod validation;

pub use manager::Uploader;
pub use validation::{FilePolicy, Rejection};

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::capability::Capabilities;
use crate::queue::{FileHandle, QueueError, UploadQueue};
use crate::upload::{
    FileHook, TransferError, TransferExecutor, TransferOptions, Transport, UploadFile, UploadStatus,
};

/// Errors returned by upload areas and the uploader facade.
#[derive(Debug, Error)]
pub enum AreaError {
    /// The area was destroyed or unregistered.
    #[error("upload area has been destroyed")]
    Destroyed,

    /// The underlying queue rejected the operation.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The transport could not be created.
    #[error(transparent)]
    Transfer(#[from] TransferError),
}

/// Options for one upload area.
#[derive(Clone)]
pub struct AreaOptions {
    transfer: TransferOptions,
    policy: FilePolicy,
    manual_start: bool,
    on_file_selected: Option<FileHook>,
    on_file_added: Option<FileHook>,
    on_file_error: Option<FileHook>,
    on_file_canceled: Option<FileHook>,
}

impl AreaOptions {
    /// Options with the default policy: 1024 MB limit, any extension,
    /// selections queued immediately.
    #[must_use]
    pub fn new(transfer: TransferOptions) -> Self {
        Self {
            transfer,
            policy: FilePolicy::default(),
            manual_start: false,
            on_file_selected: None,
            on_file_added: None,
            on_file_error: None,
            on_file_canceled: None,
        }
    }

    /// Sets the size limit in megabytes (0 keeps the default).
    #[must_use]
    pub fn max_file_size_mb(mut self, value: u64) -> Self {
        self.policy = FilePolicy::new(value, self.policy.accept(), self.policy.validate_extension());
        self
    }

    /// Sets the accept pattern: `*`, `*.*`, a MIME pattern, or a comma
    /// separated extension list such as `.pdf,.png`.
    #[must_use]
    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.policy = FilePolicy::new(
            self.policy.max_file_size_mb(),
            accept,
            self.policy.validate_extension(),
        );
        self
    }

    /// Enables checking file extensions against the accept list.
    #[must_use]
    pub fn validate_extension(mut self, enabled: bool) -> Self {
        self.policy = FilePolicy::new(self.policy.max_file_size_mb(), self.policy.accept(), enabled);
        self
    }

    /// Keeps selections until [`UploadArea::start`] is called.
    #[must_use]
    pub fn manual_start(mut self, enabled: bool) -> Self {
        self.manual_start = enabled;
        self
    }

    #[must_use]
    pub fn on_file_selected(mut self, hook: impl Fn(&UploadFile) + Send + Sync + 'static) -> Self {
        self.on_file_selected = Some(Arc::new(hook));
        self
    }

    /// Called for every accepted file once the selection is admitted.
    #[must_use]
    pub fn on_file_added(mut self, hook: impl Fn(&UploadFile) + Send + Sync + 'static) -> Self {
        self.on_file_added = Some(Arc::new(hook));
        self
    }

    /// Attached to every file as its error hook.
    #[must_use]
    pub fn on_file_error(mut self, hook: impl Fn(&UploadFile) + Send + Sync + 'static) -> Self {
        self.on_file_error = Some(Arc::new(hook));
        self
    }

    /// Attached to every file as its cancel hook.
    #[must_use]
    pub fn on_file_canceled(mut self, hook: impl Fn(&UploadFile) + Send + Sync + 'static) -> Self {
        self.on_file_canceled = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn transfer(&self) -> &TransferOptions {
        &self.transfer
    }

    #[must_use]
    pub fn policy(&self) -> &FilePolicy {
        &self.policy
    }

    #[must_use]
    pub fn is_manual_start(&self) -> bool {
        self.manual_start
    }
}

impl fmt::Debug for AreaOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AreaOptions")
            .field("transfer", &self.transfer)
            .field("policy", &self.policy)
            .field("manual_start", &self.manual_start)
            .finish_non_exhaustive()
    }
}

/// Intake for one source of file selections.
pub struct UploadArea {
    options: AreaOptions,
    executor: Arc<TransferExecutor>,
    queue: UploadQueue,
    selection: Mutex<Option<Vec<UploadFile>>>,
    destroyed: AtomicBool,
}

impl UploadArea {
    /// Creates an area feeding `queue`, transferring over `transport`.
    #[must_use]
    pub fn new(
        options: AreaOptions,
        queue: UploadQueue,
        transport: Arc<dyn Transport>,
        capabilities: Capabilities,
    ) -> Self {
        let executor = Arc::new(TransferExecutor::new(
            options.transfer.clone(),
            transport,
            capabilities,
        ));
        Self {
            options,
            executor,
            queue,
            selection: Mutex::new(None),
            destroyed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn options(&self) -> &AreaOptions {
        &self.options
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Number of files in the remembered selection.
    #[must_use]
    pub fn selection_len(&self) -> usize {
        self.lock_selection().as_ref().map_or(0, Vec::len)
    }

    fn lock_selection(&self) -> std::sync::MutexGuard<'_, Option<Vec<UploadFile>>> {
        self.selection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_active(&self) -> Result<(), AreaError> {
        if self.is_destroyed() {
            return Err(AreaError::Destroyed);
        }
        Ok(())
    }

    /// Remembers a selection and, unless manual start is enabled, admits it.
    ///
    /// Returns handles for the files that were admitted (rejected files
    /// included, as they are admitted with status `failed`).
    ///
    /// # Errors
    ///
    /// Returns [`AreaError::Destroyed`] after [`destroy`](Self::destroy), or
    /// [`AreaError::Queue`] if the queue has stopped.
    #[instrument(skip(self, files), fields(count = files.len()))]
    pub async fn select_files(&self, files: Vec<UploadFile>) -> Result<Vec<FileHandle>, AreaError> {
        self.ensure_active()?;
        if let Some(hook) = &self.options.on_file_selected {
            for file in &files {
                hook(file);
            }
        }

        if self.options.manual_start {
            debug!(count = files.len(), "selection held for manual start");
            *self.lock_selection() = Some(files);
            return Ok(Vec::new());
        }

        *self.lock_selection() = Some(files.clone());
        self.put_files_to_queue(files).await
    }

    /// Builds files from disk paths, then selects them.
    ///
    /// A path that cannot be read becomes a rejected file carrying the IO
    /// error, so it is reported through the error path like any other
    /// rejection.
    ///
    /// # Errors
    ///
    /// See [`select_files`](Self::select_files).
    pub async fn select_paths(&self, paths: &[PathBuf]) -> Result<Vec<FileHandle>, AreaError> {
        self.ensure_active()?;
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            match UploadFile::from_path(path).await {
                Ok(file) => files.push(file),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot read selected file");
                    let mut file = UploadFile::from_bytes(path.display().to_string(), Vec::new());
                    file.reject(format!("Cannot read {}: {e}", path.display()));
                    files.push(file);
                }
            }
        }
        self.select_files(files).await
    }

    /// Admits a selection held for manual start. Without a held selection,
    /// or without manual start, this is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`AreaError::Destroyed`] after [`destroy`](Self::destroy), or
    /// [`AreaError::Queue`] if the queue has stopped.
    pub async fn start(&self, auto_clear: bool) -> Result<Vec<FileHandle>, AreaError> {
        self.ensure_active()?;
        if !self.options.manual_start {
            return Ok(Vec::new());
        }
        let Some(files) = self.lock_selection().clone() else {
            return Ok(Vec::new());
        };
        let handles = self.put_files_to_queue(files).await?;
        if auto_clear {
            self.clear();
        }
        Ok(handles)
    }

    /// Forgets the remembered selection.
    pub fn clear(&self) {
        *self.lock_selection() = None;
    }

    /// Clears the selection and detaches the area; later selections fail.
    pub fn destroy(&self) {
        self.clear();
        self.destroyed.store(true, Ordering::SeqCst);
        debug!("upload area destroyed");
    }

    async fn put_files_to_queue(&self, files: Vec<UploadFile>) -> Result<Vec<FileHandle>, AreaError> {
        let mut prepared = Vec::with_capacity(files.len());
        let mut accepted = Vec::new();

        for mut file in files {
            file.renew_id();
            // Files rejected by the caller keep their reason.
            let pre_rejected = file.status() == UploadStatus::Failed;
            if !pre_rejected {
                file.reset_transfer_state();
            }
            let url = self.executor.resolve_url(&file);
            file.set_url(url);
            if let Some(hook) = &self.options.on_file_error {
                let hook = Arc::clone(hook);
                file = file.on_error(move |f| hook(f));
            }
            if let Some(hook) = &self.options.on_file_canceled {
                let hook = Arc::clone(hook);
                file = file.on_cancel(move |f| hook(f));
            }

            if !pre_rejected {
                match self.options.policy.check(file.name(), file.size()) {
                    Ok(()) => {
                        file.install_executor(Arc::clone(&self.executor));
                        accepted.push(file.clone());
                    }
                    Err(rejection) => {
                        let message = self.rejection_message(rejection);
                        debug!(file = %file.name(), ?rejection, "file rejected");
                        file.reject(message);
                    }
                }
            }
            prepared.push(file);
        }

        let handles = self.queue.add_files(prepared).await?;
        info!(
            admitted = handles.len(),
            accepted = accepted.len(),
            "selection queued"
        );

        if let Some(hook) = &self.options.on_file_added {
            for file in accepted
                .iter()
                .filter(|file| handles.iter().any(|h| h.id() == file.id()))
            {
                hook(file);
            }
        }
        Ok(handles)
    }

    fn rejection_message(&self, rejection: Rejection) -> String {
        let policy = &self.options.policy;
        let transfer = &self.options.transfer;
        if transfer.has_localizer() {
            transfer.localize(FilePolicy::template(rejection), &policy.message_params())
        } else {
            policy.default_message(rejection)
        }
    }
}

impl fmt::Debug for UploadArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadArea")
            .field("options", &self.options)
            .field("selection", &self.selection_len())
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}
