//! Upload file records, identities and status definitions.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::executor::TransferExecutor;

/// Unique identity of an upload, stable for the file's lifetime in a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UploadId(Uuid);

impl UploadId {
    /// Generates a fresh random identity.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// Admitted and waiting for a transfer slot.
    Queued,
    /// Transfer in flight.
    Uploading,
    /// Server answered with HTTP 200.
    Uploaded,
    /// Rejected before admission, or the transfer failed.
    Failed,
    /// Canceled while queued or in flight.
    Canceled,
    /// Detached from the queue. Absorbing.
    Removed,
}

impl UploadStatus {
    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Uploading => "uploading",
            Self::Uploaded => "uploaded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Removed => "removed",
        }
    }

    /// Returns true when no further transfer-related transition can occur.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Uploaded | Self::Failed | Self::Canceled | Self::Removed
        )
    }

    /// Returns true for files that keep the queue from settling.
    #[must_use]
    pub fn is_unfinished(&self) -> bool {
        matches!(self, Self::Queued | Self::Uploading)
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UploadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "uploading" => Ok(Self::Uploading),
            "uploaded" => Ok(Self::Uploaded),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            "removed" => Ok(Self::Removed),
            _ => Err(format!("invalid upload status: {s}")),
        }
    }
}

/// Raw payload of an upload.
#[derive(Debug, Clone)]
pub enum Payload {
    /// In-memory content.
    Bytes(Bytes),
    /// File on disk, streamed when the transfer starts.
    Path(PathBuf),
}

/// Caller-supplied reaction to a file event.
pub type FileHook = Arc<dyn Fn(&UploadFile) + Send + Sync>;

/// Per-file reaction hooks, invoked in registration order.
#[derive(Clone, Default)]
pub struct FileHooks {
    on_error: Vec<FileHook>,
    on_cancel: Vec<FileHook>,
}

impl FileHooks {
    pub(crate) fn fire_error(&self, file: &UploadFile) {
        for hook in &self.on_error {
            hook(file);
        }
    }

    pub(crate) fn fire_cancel(&self, file: &UploadFile) {
        for hook in &self.on_cancel {
            hook(file);
        }
    }
}

impl fmt::Debug for FileHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHooks")
            .field("on_error", &self.on_error.len())
            .field("on_cancel", &self.on_cancel.len())
            .finish()
    }
}

/// One file plus its transfer metadata.
///
/// Values handed out by the queue are snapshots; the queue keeps the
/// authoritative record and is the only place its status changes.
#[derive(Clone)]
pub struct UploadFile {
    id: UploadId,
    name: String,
    size: u64,
    payload: Payload,
    url: String,
    status: UploadStatus,
    response_code: u16,
    response_text: String,
    progress: u8,
    sent_bytes: u64,
    hooks: FileHooks,
    executor: Option<Arc<TransferExecutor>>,
}

impl UploadFile {
    fn new(name: String, size: u64, payload: Payload) -> Self {
        Self {
            id: UploadId::new(),
            name,
            size,
            payload,
            url: String::new(),
            status: UploadStatus::Queued,
            response_code: 0,
            response_text: String::new(),
            progress: 0,
            sent_bytes: 0,
            hooks: FileHooks::default(),
            executor: None,
        }
    }

    /// Creates a file from in-memory content.
    #[must_use]
    pub fn from_bytes(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        let size = content.len() as u64;
        Self::new(name.into(), size, Payload::Bytes(content))
    }

    /// Creates a file backed by a path on disk.
    ///
    /// # Errors
    ///
    /// Returns the IO error when the path's metadata cannot be read or the
    /// path is not a regular file.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(
            name,
            metadata.len(),
            Payload::Path(path.to_path_buf()),
        ))
    }

    /// Sets the target URL, overriding the executor's URL source.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Appends a hook invoked when this file fails.
    #[must_use]
    pub fn on_error(mut self, hook: impl Fn(&UploadFile) + Send + Sync + 'static) -> Self {
        self.hooks.on_error.push(Arc::new(hook));
        self
    }

    /// Appends a hook invoked when this file's transfer is canceled.
    #[must_use]
    pub fn on_cancel(mut self, hook: impl Fn(&UploadFile) + Send + Sync + 'static) -> Self {
        self.hooks.on_cancel.push(Arc::new(hook));
        self
    }

    /// Marks the file as rejected before admission.
    ///
    /// A rejected file is admitted with status `failed` and reported through
    /// the error path; it never occupies a transfer slot.
    pub fn reject(&mut self, reason: impl Into<String>) {
        self.status = UploadStatus::Failed;
        self.response_text = reason.into();
    }

    /// Replaces the identity with a freshly generated one.
    pub fn renew_id(&mut self) {
        self.id = UploadId::new();
    }

    #[must_use]
    pub fn id(&self) -> UploadId {
        self.id
    }

    /// Original file name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Resolved target URL; empty until resolved.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn status(&self) -> UploadStatus {
        self.status
    }

    /// HTTP status of the last response, 0 when none was received.
    #[must_use]
    pub fn response_code(&self) -> u16 {
        self.response_code
    }

    #[must_use]
    pub fn response_text(&self) -> &str {
        &self.response_text
    }

    /// Transfer progress in percent (0-100).
    #[must_use]
    pub fn progress(&self) -> u8 {
        self.progress
    }

    #[must_use]
    pub fn sent_bytes(&self) -> u64 {
        self.sent_bytes
    }

    /// Returns true when a transfer executor is installed on this file.
    #[must_use]
    pub fn has_executor(&self) -> bool {
        self.executor.is_some()
    }

    pub(crate) fn hooks(&self) -> &FileHooks {
        &self.hooks
    }

    pub(crate) fn executor(&self) -> Option<&Arc<TransferExecutor>> {
        self.executor.as_ref()
    }

    pub(crate) fn install_executor(&mut self, executor: Arc<TransferExecutor>) {
        self.executor = Some(executor);
    }

    pub(crate) fn set_url(&mut self, url: String) {
        self.url = url;
    }

    pub(crate) fn set_status(&mut self, status: UploadStatus) {
        self.status = status;
    }

    pub(crate) fn set_progress(&mut self, progress: u8, sent_bytes: u64) {
        self.progress = progress.min(100);
        self.sent_bytes = sent_bytes;
    }

    pub(crate) fn set_response(&mut self, code: u16, text: String) {
        self.response_code = code;
        self.response_text = text;
    }

    /// Clears transfer state left over from an earlier life of this record.
    pub(crate) fn reset_transfer_state(&mut self) {
        self.status = UploadStatus::Queued;
        self.response_code = 0;
        self.response_text.clear();
        self.progress = 0;
        self.sent_bytes = 0;
    }
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("size", &self.size)
            .field("url", &self.url)
            .field("status", &self.status)
            .field("response_code", &self.response_code)
            .field("progress", &self.progress)
            .field("hooks", &self.hooks)
            .field("has_executor", &self.executor.is_some())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UploadFile {{ id: {}, name: {}, status: {} }}",
            self.id, self.name, self.status
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ==================== UploadStatus Tests ====================

    #[test]
    fn test_upload_status_display_matches_as_str() {
        for status in [
            UploadStatus::Queued,
            UploadStatus::Uploading,
            UploadStatus::Uploaded,
            UploadStatus::Failed,
            UploadStatus::Canceled,
            UploadStatus::Removed,
        ] {
            assert_eq!(status.to_string(), status.as_str());
            assert_eq!(status.as_str().parse::<UploadStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_upload_status_from_str_rejects_unknown() {
        let err = "paused".parse::<UploadStatus>().unwrap_err();
        assert!(err.contains("paused"));
    }

    #[test]
    fn test_upload_status_terminal_and_unfinished_partition() {
        assert!(UploadStatus::Queued.is_unfinished());
        assert!(UploadStatus::Uploading.is_unfinished());
        assert!(!UploadStatus::Queued.is_terminal());
        assert!(!UploadStatus::Uploading.is_terminal());

        for status in [
            UploadStatus::Uploaded,
            UploadStatus::Failed,
            UploadStatus::Canceled,
            UploadStatus::Removed,
        ] {
            assert!(status.is_terminal(), "{status} should be terminal");
            assert!(!status.is_unfinished(), "{status} should be finished");
        }
    }

    #[test]
    fn test_upload_status_serde_snake_case() {
        let json = serde_json::to_string(&UploadStatus::Uploading).unwrap();
        assert_eq!(json, "\"uploading\"");
    }

    #[test]
    fn test_upload_id_serializes_as_uuid_string() {
        let id = UploadId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));

        let parsed: UploadId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    // ==================== UploadFile Tests ====================

    #[test]
    fn test_from_bytes_sets_size_and_defaults() {
        let file = UploadFile::from_bytes("a.txt", &b"hello"[..]);
        assert_eq!(file.name(), "a.txt");
        assert_eq!(file.size(), 5);
        assert_eq!(file.status(), UploadStatus::Queued);
        assert_eq!(file.progress(), 0);
        assert_eq!(file.response_code(), 0);
        assert!(file.url().is_empty());
        assert!(!file.has_executor());
    }

    #[test]
    fn test_ids_are_unique_and_renewable() {
        let mut file = UploadFile::from_bytes("a.txt", &b"x"[..]);
        let other = UploadFile::from_bytes("a.txt", &b"x"[..]);
        assert_ne!(file.id(), other.id());

        let before = file.id();
        file.renew_id();
        assert_ne!(before, file.id());
    }

    #[test]
    fn test_reject_marks_failed_with_reason() {
        let mut file = UploadFile::from_bytes("a.txt", &b""[..]);
        file.reject("too small");
        assert_eq!(file.status(), UploadStatus::Failed);
        assert_eq!(file.response_text(), "too small");
    }

    #[test]
    fn test_hooks_fire_in_registration_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let first = Arc::clone(&order);
        let second = Arc::clone(&order);
        let file = UploadFile::from_bytes("a.txt", &b"x"[..])
            .on_error(move |_| first.lock().unwrap().push(1))
            .on_error(move |_| second.lock().unwrap().push(2));

        file.hooks().fire_error(&file);
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_cancel_hooks_are_separate_from_error_hooks() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let file =
            UploadFile::from_bytes("a.txt", &b"x"[..]).on_cancel(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        file.hooks().fire_error(&file);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        file.hooks().fire_cancel(&file);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reset_transfer_state_clears_response() {
        let mut file = UploadFile::from_bytes("a.txt", &b"x"[..]);
        file.set_status(UploadStatus::Uploaded);
        file.set_progress(100, 1);
        file.set_response(200, "ok".to_string());

        file.reset_transfer_state();
        assert_eq!(file.status(), UploadStatus::Queued);
        assert_eq!(file.progress(), 0);
        assert_eq!(file.sent_bytes(), 0);
        assert_eq!(file.response_code(), 0);
        assert!(file.response_text().is_empty());
    }

    #[tokio::test]
    async fn test_from_path_reads_metadata() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();

        let file = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(file.name(), "report.pdf");
        assert_eq!(file.size(), 8);
        assert!(matches!(file.payload(), Payload::Path(p) if p == &path));
    }

    #[tokio::test]
    async fn test_from_path_rejects_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = UploadFile::from_path(dir.path()).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }
}
