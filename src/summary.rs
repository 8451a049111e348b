//! End-of-run summary, printed as text or JSON.

use std::fmt::Write as _;

use serde::Serialize;
use uploader_core::{UploadFile, UploadStatus};

/// Outcome of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct FileReport {
    pub name: String,
    pub size: u64,
    pub status: UploadStatus,
    pub response_code: u16,
    pub response_text: String,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub(crate) struct RunSummary {
    pub files: Vec<FileReport>,
    pub uploaded: usize,
    pub failed: usize,
    pub canceled: usize,
}

impl RunSummary {
    pub(crate) fn from_files(files: &[UploadFile]) -> Self {
        let mut summary = Self::default();
        for file in files {
            match file.status() {
                UploadStatus::Uploaded => summary.uploaded += 1,
                UploadStatus::Failed => summary.failed += 1,
                UploadStatus::Canceled => summary.canceled += 1,
                UploadStatus::Queued | UploadStatus::Uploading | UploadStatus::Removed => {}
            }
            summary.files.push(FileReport {
                name: file.name().to_string(),
                size: file.size(),
                status: file.status(),
                response_code: file.response_code(),
                response_text: file.response_text().to_string(),
            });
        }
        summary
    }

    /// True when any file did not upload.
    pub(crate) fn has_failures(&self) -> bool {
        self.failed > 0 || self.canceled > 0
    }

    pub(crate) fn render_text(&self) -> String {
        let mut out = String::new();
        for file in &self.files {
            let _ = match file.status {
                UploadStatus::Uploaded => writeln!(out, "  ok      {}", file.name),
                status => writeln!(
                    out,
                    "  {:<7} {} ({})",
                    status.as_str(),
                    file.name,
                    describe_failure(file)
                ),
            };
        }
        let _ = write!(
            out,
            "{} uploaded, {} failed, {} canceled",
            self.uploaded, self.failed, self.canceled
        );
        out
    }
}

fn describe_failure(file: &FileReport) -> String {
    if file.response_code == 0 {
        file.response_text.clone()
    } else {
        format!("HTTP {}: {}", file.response_code, file.response_text)
    }
}
