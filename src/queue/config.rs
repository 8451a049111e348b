//! Queue configuration.

use std::time::Duration;

use crate::capability::Capabilities;

/// Immutable queue configuration.
///
/// Every field has a default; build one with [`QueueConfig::builder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueConfig {
    max_parallel_uploads: usize,
    parallel_batch_offset: Duration,
    auto_start: bool,
    auto_remove: bool,
}

impl QueueConfig {
    /// Starts building a configuration from the defaults: unlimited
    /// parallelism, no batch window, manual start, no auto-removal.
    #[must_use]
    pub fn builder() -> QueueConfigBuilder {
        QueueConfigBuilder::default()
    }

    /// Cap on files in `uploading` state; 0 means unlimited.
    #[must_use]
    pub fn max_parallel_uploads(&self) -> usize {
        self.max_parallel_uploads
    }

    /// Length of a batch window; zero disables windows.
    #[must_use]
    pub fn parallel_batch_offset(&self) -> Duration {
        self.parallel_batch_offset
    }

    #[must_use]
    pub fn auto_start(&self) -> bool {
        self.auto_start
    }

    #[must_use]
    pub fn auto_remove(&self) -> bool {
        self.auto_remove
    }

    /// Auto-start only applies where native file access is available.
    #[must_use]
    pub fn effective_auto_start(&self, capabilities: Capabilities) -> bool {
        self.auto_start && capabilities.file_api
    }

    /// Returns true when starts are throttled by batch windows.
    #[must_use]
    pub fn uses_batch_window(&self) -> bool {
        self.max_parallel_uploads > 0 && !self.parallel_batch_offset.is_zero()
    }
}

/// Builder for [`QueueConfig`].
#[derive(Debug, Clone, Default)]
pub struct QueueConfigBuilder {
    max_parallel_uploads: usize,
    parallel_batch_offset_ms: u64,
    auto_start: bool,
    auto_remove: bool,
}

impl QueueConfigBuilder {
    /// Caps concurrent transfers (0 = unlimited).
    #[must_use]
    pub fn max_parallel_uploads(mut self, value: usize) -> Self {
        self.max_parallel_uploads = value;
        self
    }

    /// Sets the batch window length in milliseconds (0 = disabled).
    #[must_use]
    pub fn parallel_batch_offset_ms(mut self, value: u64) -> Self {
        self.parallel_batch_offset_ms = value;
        self
    }

    #[must_use]
    pub fn auto_start(mut self, enabled: bool) -> Self {
        self.auto_start = enabled;
        self
    }

    #[must_use]
    pub fn auto_remove(mut self, enabled: bool) -> Self {
        self.auto_remove = enabled;
        self
    }

    /// Builds the configuration.
    ///
    /// Every combination is valid: a batch offset without a parallel limit
    /// is kept but never opens a window.
    #[must_use]
    pub fn build(self) -> QueueConfig {
        QueueConfig {
            max_parallel_uploads: self.max_parallel_uploads,
            parallel_batch_offset: Duration::from_millis(self.parallel_batch_offset_ms),
            auto_start: self.auto_start,
            auto_remove: self.auto_remove,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QueueConfig::builder().build();
        assert_eq!(config, QueueConfig::default());
        assert_eq!(config.max_parallel_uploads(), 0);
        assert!(config.parallel_batch_offset().is_zero());
        assert!(!config.auto_start());
        assert!(!config.auto_remove());
        assert!(!config.uses_batch_window());
    }

    #[test]
    fn test_builder_sets_fields() {
        let config = QueueConfig::builder()
            .max_parallel_uploads(4)
            .parallel_batch_offset_ms(250)
            .auto_start(true)
            .auto_remove(true)
            .build();
        assert_eq!(config.max_parallel_uploads(), 4);
        assert_eq!(config.parallel_batch_offset(), Duration::from_millis(250));
        assert!(config.auto_start());
        assert!(config.auto_remove());
        assert!(config.uses_batch_window());
    }

    #[test]
    fn test_large_values_are_accepted() {
        let config = QueueConfig::builder()
            .max_parallel_uploads(150)
            .parallel_batch_offset_ms(120_000)
            .build();
        assert_eq!(config.max_parallel_uploads(), 150);
        assert_eq!(config.parallel_batch_offset(), Duration::from_secs(120));
        assert!(config.uses_batch_window());
    }

    #[test]
    fn test_batch_offset_without_limit_is_inert() {
        let config = QueueConfig::builder().parallel_batch_offset_ms(500).build();
        assert_eq!(config.parallel_batch_offset(), Duration::from_millis(500));
        assert!(!config.uses_batch_window());
    }

    #[test]
    fn test_effective_auto_start_requires_file_api() {
        let config = QueueConfig::builder().auto_start(true).build();
        assert!(config.effective_auto_start(Capabilities { file_api: true }));
        assert!(!config.effective_auto_start(Capabilities::without_file_api()));
    }
}
