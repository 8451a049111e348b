//! Uploader facade: one queue, any number of upload areas.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::{AreaError, AreaOptions, UploadArea};
use crate::capability::Capabilities;
use crate::queue::{QueueConfig, QueueObserver, UploadQueue};
use crate::upload::{HttpTransport, Transport};

/// Owns the shared queue and routes area registration.
#[derive(Debug)]
pub struct Uploader {
    queue: UploadQueue,
    transport: Arc<dyn Transport>,
    capabilities: Capabilities,
    areas: Mutex<Vec<Arc<UploadArea>>>,
}

impl Uploader {
    /// Creates an uploader with an [`HttpTransport`] shared by all areas.
    ///
    /// # Errors
    ///
    /// Returns [`AreaError::Transfer`] if the HTTP client cannot be built.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(
        config: QueueConfig,
        observer: impl QueueObserver,
        capabilities: Capabilities,
    ) -> Result<Self, AreaError> {
        let transport = Arc::new(HttpTransport::new()?);
        Ok(Self::with_transport(config, observer, capabilities, transport))
    }

    /// Creates an uploader over a caller-supplied transport.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    #[must_use]
    pub fn with_transport(
        config: QueueConfig,
        observer: impl QueueObserver,
        capabilities: Capabilities,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            queue: UploadQueue::new(config, observer, capabilities),
            transport,
            capabilities,
            areas: Mutex::new(Vec::new()),
        }
    }

    fn lock_areas(&self) -> MutexGuard<'_, Vec<Arc<UploadArea>>> {
        self.areas.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates an area feeding this uploader's queue.
    pub fn register_area(&self, options: AreaOptions) -> Arc<UploadArea> {
        let area = Arc::new(UploadArea::new(
            options,
            self.queue.clone(),
            Arc::clone(&self.transport),
            self.capabilities,
        ));
        let mut areas = self.lock_areas();
        areas.push(Arc::clone(&area));
        debug!(areas = areas.len(), "upload area registered");
        area
    }

    /// Destroys and detaches `area`. Returns false for an unknown area.
    pub fn unregister_area(&self, area: &Arc<UploadArea>) -> bool {
        let mut areas = self.lock_areas();
        let Some(index) = areas.iter().position(|a| Arc::ptr_eq(a, area)) else {
            return false;
        };
        areas.remove(index).destroy();
        debug!(areas = areas.len(), "upload area unregistered");
        true
    }

    #[must_use]
    pub fn queue(&self) -> &UploadQueue {
        &self.queue
    }

    /// Currently registered areas, in registration order.
    #[must_use]
    pub fn areas(&self) -> Vec<Arc<UploadArea>> {
        self.lock_areas().clone()
    }

    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}
