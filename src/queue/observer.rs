//! Queue notifications.
//!
//! Every callback defaults to a no-op, so observers implement only what
//! they need. Callbacks run on the queue driver task and must not block;
//! long work belongs on a spawned task (which may call back into the queue).

use tokio::sync::mpsc;

use crate::upload::UploadFile;

/// Receives queue and transfer notifications.
///
/// Files are passed as snapshots of the queue's record at the time of the
/// notification.
#[allow(unused_variables)]
pub trait QueueObserver: Send + Sync + 'static {
    /// A file entered the queue.
    fn on_file_added(&self, file: &UploadFile) {}

    /// A file left the queue; its status is `removed`.
    fn on_file_removed(&self, file: &UploadFile) {}

    /// No file is `queued` or `uploading` any more.
    fn on_all_finished(&self) {}

    /// The collection changed; `files` is the full ordered queue.
    fn on_queue_changed(&self, files: &[UploadFile]) {}

    fn on_progress(&self, file: &UploadFile) {}

    /// An in-flight transfer was canceled.
    fn on_cancelled(&self, file: &UploadFile) {}

    /// A transfer attempt ended (uploaded, failed or canceled).
    fn on_finished(&self, file: &UploadFile) {}

    fn on_uploaded(&self, file: &UploadFile) {}

    /// A transfer failed or a rejected file was admitted.
    fn on_error(&self, file: &UploadFile) {}

    fn on_upload_started(&self, file: &UploadFile) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl QueueObserver for NoopObserver {}

/// A queue notification as a value.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    FileAdded(UploadFile),
    FileRemoved(UploadFile),
    AllFinished,
    QueueChanged(Vec<UploadFile>),
    Progress(UploadFile),
    Cancelled(UploadFile),
    Finished(UploadFile),
    Uploaded(UploadFile),
    Error(UploadFile),
    UploadStarted(UploadFile),
}

impl QueueEvent {
    /// Short event name for logs and summaries.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::FileAdded(_) => "file_added",
            Self::FileRemoved(_) => "file_removed",
            Self::AllFinished => "all_finished",
            Self::QueueChanged(_) => "queue_changed",
            Self::Progress(_) => "progress",
            Self::Cancelled(_) => "cancelled",
            Self::Finished(_) => "finished",
            Self::Uploaded(_) => "uploaded",
            Self::Error(_) => "error",
            Self::UploadStarted(_) => "upload_started",
        }
    }

    /// The file the event is about, if any.
    #[must_use]
    pub fn file(&self) -> Option<&UploadFile> {
        match self {
            Self::FileAdded(file)
            | Self::FileRemoved(file)
            | Self::Progress(file)
            | Self::Cancelled(file)
            | Self::Finished(file)
            | Self::Uploaded(file)
            | Self::Error(file)
            | Self::UploadStarted(file) => Some(file),
            Self::AllFinished | Self::QueueChanged(_) => None,
        }
    }
}

impl<T: QueueObserver> QueueObserver for std::sync::Arc<T> {
    fn on_file_added(&self, file: &UploadFile) {
        (**self).on_file_added(file);
    }

    fn on_file_removed(&self, file: &UploadFile) {
        (**self).on_file_removed(file);
    }

    fn on_all_finished(&self) {
        (**self).on_all_finished();
    }

    fn on_queue_changed(&self, files: &[UploadFile]) {
        (**self).on_queue_changed(files);
    }

    fn on_progress(&self, file: &UploadFile) {
        (**self).on_progress(file);
    }

    fn on_cancelled(&self, file: &UploadFile) {
        (**self).on_cancelled(file);
    }

    fn on_finished(&self, file: &UploadFile) {
        (**self).on_finished(file);
    }

    fn on_uploaded(&self, file: &UploadFile) {
        (**self).on_uploaded(file);
    }

    fn on_error(&self, file: &UploadFile) {
        (**self).on_error(file);
    }

    fn on_upload_started(&self, file: &UploadFile) {
        (**self).on_upload_started(file);
    }
}

/// Forwards every notification into a channel. A closed receiver is ignored.
impl QueueObserver for mpsc::UnboundedSender<QueueEvent> {
    fn on_file_added(&self, file: &UploadFile) {
        let _ = self.send(QueueEvent::FileAdded(file.clone()));
    }

    fn on_file_removed(&self, file: &UploadFile) {
        let _ = self.send(QueueEvent::FileRemoved(file.clone()));
    }

    fn on_all_finished(&self) {
        let _ = self.send(QueueEvent::AllFinished);
    }

    fn on_queue_changed(&self, files: &[UploadFile]) {
        let _ = self.send(QueueEvent::QueueChanged(files.to_vec()));
    }

    fn on_progress(&self, file: &UploadFile) {
        let _ = self.send(QueueEvent::Progress(file.clone()));
    }

    fn on_cancelled(&self, file: &UploadFile) {
        let _ = self.send(QueueEvent::Cancelled(file.clone()));
    }

    fn on_finished(&self, file: &UploadFile) {
        let _ = self.send(QueueEvent::Finished(file.clone()));
    }

    fn on_uploaded(&self, file: &UploadFile) {
        let _ = self.send(QueueEvent::Uploaded(file.clone()));
    }

    fn on_error(&self, file: &UploadFile) {
        let _ = self.send(QueueEvent::Error(file.clone()));
    }

    fn on_upload_started(&self, file: &UploadFile) {
        let _ = self.send(QueueEvent::UploadStarted(file.clone()));
    }
}
