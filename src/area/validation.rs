//! File acceptance policy for upload areas.
//!
//! A policy answers pass/fail for a file name and size; a failure carries
//! the kind of rejection so the area can build a (localized) message.

use std::collections::HashMap;

/// Default maximum file size in megabytes.
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 1024;

/// Default accept pattern (everything).
pub const DEFAULT_ACCEPT: &str = "*.*";

/// Message template for size rejections, with a `{ maxFileSize }` placeholder.
pub const SIZE_REJECTION_TEMPLATE: &str = "The selected file exceeds the allowed size of { maxFileSize } MB or its size is 0 MB. Please choose another file.";

/// Message template for extension rejections, with an `{ accept }` placeholder.
pub const EXTENSION_REJECTION_TEMPLATE: &str =
    "File format is not allowed. Only { accept } files are allowed.";

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Why a file was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Empty, or larger than the size limit.
    Size,
    /// Extension missing or not in the accept list.
    Extension,
}

/// Size and extension policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePolicy {
    max_file_size_mb: u64,
    accept: String,
    validate_extension: bool,
}

impl Default for FilePolicy {
    fn default() -> Self {
        Self {
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
            accept: DEFAULT_ACCEPT.to_string(),
            validate_extension: false,
        }
    }
}

impl FilePolicy {
    /// Creates a policy. An empty `accept` falls back to [`DEFAULT_ACCEPT`]
    /// and a zero size limit to [`DEFAULT_MAX_FILE_SIZE_MB`].
    #[must_use]
    pub fn new(max_file_size_mb: u64, accept: impl Into<String>, validate_extension: bool) -> Self {
        let accept = accept.into();
        Self {
            max_file_size_mb: if max_file_size_mb == 0 {
                DEFAULT_MAX_FILE_SIZE_MB
            } else {
                max_file_size_mb
            },
            accept: if accept.trim().is_empty() {
                DEFAULT_ACCEPT.to_string()
            } else {
                accept
            },
            validate_extension,
        }
    }

    #[must_use]
    pub fn max_file_size_mb(&self) -> u64 {
        self.max_file_size_mb
    }

    #[must_use]
    pub fn accept(&self) -> &str {
        &self.accept
    }

    #[must_use]
    pub fn validate_extension(&self) -> bool {
        self.validate_extension
    }

    /// Maximum accepted size in bytes.
    #[must_use]
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(BYTES_PER_MB)
    }

    /// Checks a file against the policy; size is checked first.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] kind when the file is not acceptable.
    pub fn check(&self, name: &str, size: u64) -> Result<(), Rejection> {
        if size == 0 || size > self.max_file_size_bytes() {
            return Err(Rejection::Size);
        }
        if self.applies_extension_list() && !self.extension_listed(name) {
            return Err(Rejection::Extension);
        }
        Ok(())
    }

    /// The accept value is an extension list only when it is not a
    /// wildcard and not a MIME pattern.
    fn applies_extension_list(&self) -> bool {
        let accept = self.accept.trim();
        self.validate_extension && accept != "*" && accept != "*.*" && !accept.contains('/')
    }

    fn extension_listed(&self, name: &str) -> bool {
        let Some(dot) = name.rfind('.') else {
            return false;
        };
        let extension = &name[dot..];
        self.accept
            .split(',')
            .any(|entry| entry.trim().eq_ignore_ascii_case(extension))
    }

    /// Parameters handed to a localizer alongside a rejection template.
    #[must_use]
    pub fn message_params(&self) -> HashMap<String, String> {
        HashMap::from([
            ("maxFileSize".to_string(), self.max_file_size_mb.to_string()),
            ("accept".to_string(), self.accept.clone()),
        ])
    }

    /// The message template for a rejection.
    #[must_use]
    pub fn template(rejection: Rejection) -> &'static str {
        match rejection {
            Rejection::Size => SIZE_REJECTION_TEMPLATE,
            Rejection::Extension => EXTENSION_REJECTION_TEMPLATE,
        }
    }

    /// The message for a rejection with the policy values filled in.
    #[must_use]
    pub fn default_message(&self, rejection: Rejection) -> String {
        match rejection {
            Rejection::Size => format!(
                "The selected file exceeds the allowed size of {} MB or its size is 0 MB. Please choose another file.",
                self.max_file_size_mb
            ),
            Rejection::Extension => format!(
                "File format is not allowed. Only {} files are allowed.",
                self.accept
            ),
        }
    }
}
