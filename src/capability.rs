//! Runtime capability detection.
//!
//! Capabilities are resolved once at startup and handed to the queue and the
//! upload areas explicitly, instead of being probed at arbitrary points.

/// Environment capabilities consumed by the upload pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Whether payloads can be streamed from native file handles.
    ///
    /// When false, files are never started automatically and explicit
    /// transfers fail immediately.
    pub file_api: bool,
}

impl Capabilities {
    /// Detects the capabilities of the current target.
    #[must_use]
    pub fn detect() -> Self {
        Self {
            file_api: cfg!(not(target_family = "wasm")),
        }
    }

    /// Capabilities of an environment without native file access.
    #[must_use]
    pub fn without_file_api() -> Self {
        Self { file_api: false }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::detect()
    }
}
