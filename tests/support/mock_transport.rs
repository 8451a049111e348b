//! In-process transport that holds each request until the test releases it.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::{Notify, oneshot};
use uploader_core::upload::{
    ProgressReporter, TransferError, TransferRequest, Transport, TransportResponse,
};

#[derive(Debug, Default)]
struct MockState {
    requests: Vec<TransferRequest>,
    pending: HashMap<String, oneshot::Sender<u16>>,
}

/// Scripted [`Transport`].
///
/// With an automatic status every request completes immediately; otherwise
/// each request waits for [`release`](Self::release) by file name.
#[derive(Debug, Default)]
pub struct MockTransport {
    auto_status: Option<u16>,
    state: Mutex<MockState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    changed: Notify,
}

struct InFlight<'a>(&'a MockTransport);

impl<'a> InFlight<'a> {
    fn enter(transport: &'a MockTransport) -> Self {
        let now = transport.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        transport.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(transport)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.0.changed.notify_waiters();
    }
}

impl MockTransport {
    /// Requests block until released.
    pub fn holding() -> Self {
        Self::default()
    }

    /// Requests complete immediately with `status`.
    pub fn responding(status: u16) -> Self {
        Self {
            auto_status: Some(status),
            ..Self::default()
        }
    }

    /// Completes the pending request for `file_name`. Returns false when
    /// no such request is waiting.
    pub fn release(&self, file_name: &str, status: u16) -> bool {
        let sender = self.lock().pending.remove(file_name);
        sender.is_some_and(|sender| sender.send(status).is_ok())
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn requested_names(&self) -> Vec<String> {
        self.lock()
            .requests
            .iter()
            .map(|request| request.file_name.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<TransferRequest> {
        self.lock().requests.clone()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent requests observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Waits until at least `count` requests have been received.
    pub async fn wait_for_requests(&self, count: usize) {
        self.wait_until(|transport| transport.request_count() >= count)
            .await;
    }

    /// Waits until no request is in flight.
    pub async fn wait_idle(&self) {
        self.wait_until(|transport| transport.in_flight() == 0).await;
    }

    async fn wait_until(&self, done: impl Fn(&Self) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let changed = self.changed.notified();
                if done(self) {
                    return;
                }
                changed.await;
            }
        })
        .await
        .expect("timed out waiting for mock transport");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        request: TransferRequest,
        progress: ProgressReporter,
    ) -> Result<TransportResponse, TransferError> {
        let _in_flight = InFlight::enter(self);
        let name = request.file_name.clone();
        let size = request.size;
        let receiver = {
            let mut state = self.lock();
            state.requests.push(request);
            if self.auto_status.is_none() {
                let (sender, receiver) = oneshot::channel();
                state.pending.insert(name.clone(), sender);
                Some(receiver)
            } else {
                None
            }
        };
        self.changed.notify_waiters();
        progress.report(size / 2, Some(size));

        let status = match receiver {
            Some(receiver) => receiver.await.unwrap_or(500),
            None => self.auto_status.unwrap_or(200),
        };
        progress.report(size, Some(size));

        Ok(TransportResponse {
            status,
            status_text: StatusCode::from_u16(status)
                .ok()
                .and_then(|code| code.canonical_reason())
                .unwrap_or_default()
                .to_string(),
            body: if status == 200 {
                format!("stored {name}")
            } else {
                String::new()
            },
        })
    }
}
