//! Transfer executor: one HTTP transaction per file.
//!
//! The executor knows nothing about the queue. It resolves the request for a
//! file, runs it on its own task, and reports lifecycle events to a
//! [`TransferListener`]:
//!
//! ```text
//! Started -> Progress* -> Finished(uploaded | failed | canceled)
//! ```
//!
//! Exactly one `Finished` event is emitted per attempt. Once the attempt is
//! canceled, any later success or error of the aborted request is dropped.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, instrument, warn};

use super::constants::{FILE_API_UNAVAILABLE_TEXT, INVALID_RESPONSE_TEXT, SUCCESS_STATUS};
use super::file::{UploadFile, UploadStatus};
use super::options::TransferOptions;
use super::progress::ProgressReporter;
use super::transport::{Transport, TransferRequest, TransportResponse, merge_headers};
use crate::capability::Capabilities;

/// Terminal result of one transfer attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// `Uploaded`, `Failed` or `Canceled`.
    pub status: UploadStatus,
    /// HTTP status, 0 when no response was received.
    pub response_code: u16,
    /// Response text after fallback resolution and localization.
    pub response_text: String,
}

impl TransferOutcome {
    /// Outcome of a canceled attempt.
    #[must_use]
    pub fn canceled() -> Self {
        Self {
            status: UploadStatus::Canceled,
            response_code: 0,
            response_text: String::new(),
        }
    }
}

/// Lifecycle notification for one transfer attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    /// The request is about to be sent.
    Started,
    /// Body bytes handed to the transport.
    Progress {
        /// Percentage, 0-100.
        percent: u8,
        /// Bytes sent so far.
        sent_bytes: u64,
    },
    /// The attempt reached its terminal state.
    Finished(TransferOutcome),
}

/// Receives transfer events. Called from the transfer task.
pub trait TransferListener: Send + Sync + 'static {
    fn notify(&self, event: TransferEvent);
}

impl TransferListener for mpsc::UnboundedSender<TransferEvent> {
    fn notify(&self, event: TransferEvent) {
        // Receiver gone means nobody is interested any more.
        let _ = self.send(event);
    }
}

/// Handle to one in-flight transfer attempt.
#[derive(Debug)]
pub struct TransferHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TransferHandle {
    /// Aborts the attempt.
    ///
    /// Returns `true` for the first effective call; later calls are no-ops.
    pub fn cancel(&self) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.token.cancel();
        true
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Waits for the transfer task to exit.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "transfer task panicked");
        }
    }
}

/// Performs file transfers with one set of options over a shared transport.
#[derive(Debug)]
pub struct TransferExecutor {
    options: Arc<TransferOptions>,
    transport: Arc<dyn Transport>,
    capabilities: Capabilities,
}

impl TransferExecutor {
    /// Creates an executor.
    #[must_use]
    pub fn new(
        options: TransferOptions,
        transport: Arc<dyn Transport>,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            options: Arc::new(options),
            transport,
            capabilities,
        }
    }

    #[must_use]
    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// Resolves the target URL for a file from the configured URL source.
    #[must_use]
    pub fn resolve_url(&self, file: &UploadFile) -> String {
        self.options.url().resolve(file)
    }

    /// Starts transferring `file` on a new task.
    ///
    /// Must be called from within a Tokio runtime. The file's own URL is used
    /// when set, otherwise it is resolved from the options.
    #[instrument(level = "debug", skip(self, file, listener), fields(file_id = %file.id(), file = %file.name()))]
    pub fn transfer(&self, file: &UploadFile, listener: Arc<dyn TransferListener>) -> TransferHandle {
        let token = CancellationToken::new();

        if !self.capabilities.file_api {
            warn!("file API unavailable, failing transfer");
            listener.notify(TransferEvent::Finished(TransferOutcome {
                status: UploadStatus::Failed,
                response_code: 0,
                response_text: self.options.localize(FILE_API_UNAVAILABLE_TEXT, &HashMap::new()),
            }));
            return TransferHandle { token, task: None };
        }

        let url = if file.url().is_empty() {
            self.resolve_url(file)
        } else {
            file.url().to_string()
        };
        let request = TransferRequest {
            url,
            method: self.options.method().clone(),
            with_credentials: self.options.with_credentials(),
            headers: merge_headers(self.options.headers()),
            params: self.options.params().to_vec(),
            file_name: file.name().to_string(),
            size: file.size(),
            payload: file.payload().clone(),
        };
        debug!(url = %request.url, method = %request.method, "transfer prepared");

        let transport = Arc::clone(&self.transport);
        let options = Arc::clone(&self.options);
        let task_token = token.clone();
        let size = file.size();
        let span = tracing::debug_span!("transfer", file_id = %file.id());

        let task = tokio::spawn(
            async move {
                listener.notify(TransferEvent::Started);
                let progress = ProgressReporter::new(Arc::clone(&listener));

                let result = tokio::select! {
                    biased;
                    () = task_token.cancelled() => None,
                    result = transport.send(request, progress.clone()) => Some(result),
                };

                let outcome = match result {
                    None => TransferOutcome::canceled(),
                    Some(Ok(response)) => {
                        progress.complete(size);
                        outcome_from_response(&options, &response)
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "transfer failed without response");
                        TransferOutcome {
                            status: UploadStatus::Failed,
                            response_code: 0,
                            response_text: resolve_response_text(&options, None),
                        }
                    }
                };

                // A cancel that raced the response still wins.
                let outcome = if task_token.is_cancelled() {
                    TransferOutcome::canceled()
                } else {
                    outcome
                };

                info!(
                    status = %outcome.status,
                    response_code = outcome.response_code,
                    "transfer finished"
                );
                listener.notify(TransferEvent::Finished(outcome));
            }
            .instrument(span),
        );

        TransferHandle {
            token,
            task: Some(task),
        }
    }
}

fn outcome_from_response(options: &TransferOptions, response: &TransportResponse) -> TransferOutcome {
    let status = if response.status == SUCCESS_STATUS {
        UploadStatus::Uploaded
    } else {
        UploadStatus::Failed
    };
    TransferOutcome {
        status,
        response_code: response.status,
        response_text: resolve_response_text(options, Some(response)),
    }
}

/// Picks the response text: body, then status text, then the numeric status,
/// then a fixed marker; the result passes through the localizer.
#[must_use]
pub fn resolve_response_text(options: &TransferOptions, response: Option<&TransportResponse>) -> String {
    let raw = response
        .and_then(|r| {
            [r.body.as_str(), r.status_text.as_str()]
                .into_iter()
                .find(|text| !text.is_empty())
                .map(str::to_string)
                .or_else(|| (r.status != 0).then(|| r.status.to_string()))
        })
        .unwrap_or_else(|| INVALID_RESPONSE_TEXT.to_string());
    options.localize(&raw, &HashMap::new())
}
