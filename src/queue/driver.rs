//! Queue driver task.
//!
//! The driver exclusively owns the ordered file collection. Public
//! operations, transfer events and batch-window timers all arrive as
//! [`Command`]s on one channel and run to completion one at a time, so
//! every mutation and re-evaluation pass is atomic with respect to the
//! others.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use super::config::QueueConfig;
use super::observer::QueueObserver;
use super::schedule::{BatchWindow, plan_starts, window_budget};
use crate::capability::Capabilities;
use crate::upload::constants::NO_EXECUTOR_TEXT;
use crate::upload::{
    TransferEvent, TransferExecutor, TransferHandle, TransferListener, TransferOutcome,
    UploadFile, UploadId, UploadStatus,
};

/// Messages processed by the driver.
pub(crate) enum Command {
    AddFiles {
        files: Vec<UploadFile>,
        reply: oneshot::Sender<Vec<UploadId>>,
    },
    RemoveFile {
        id: UploadId,
        suppress_cascade: bool,
        reply: oneshot::Sender<bool>,
    },
    ClearFiles {
        exclude: Vec<UploadStatus>,
        cancel_in_progress: bool,
        reply: oneshot::Sender<usize>,
    },
    StartFile {
        id: UploadId,
        reply: oneshot::Sender<bool>,
    },
    CancelFile {
        id: UploadId,
        reply: oneshot::Sender<bool>,
    },
    Files {
        reply: oneshot::Sender<Vec<UploadFile>>,
    },
    File {
        id: UploadId,
        reply: oneshot::Sender<Option<UploadFile>>,
    },
    StateChanged {
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
    Transfer {
        id: UploadId,
        attempt: u64,
        event: TransferEvent,
    },
    WindowElapsed {
        generation: u64,
    },
}

struct ActiveTransfer {
    attempt: u64,
    handle: TransferHandle,
}

/// Routes one attempt's transfer events back to the driver.
struct AttemptListener {
    id: UploadId,
    attempt: u64,
    commands: mpsc::WeakUnboundedSender<Command>,
}

impl TransferListener for AttemptListener {
    fn notify(&self, event: TransferEvent) {
        if let Some(commands) = self.commands.upgrade() {
            let _ = commands.send(Command::Transfer {
                id: self.id,
                attempt: self.attempt,
                event,
            });
        }
    }
}

pub(crate) struct QueueDriver {
    config: QueueConfig,
    auto_start: bool,
    observer: Arc<dyn QueueObserver>,
    executor: Option<Arc<TransferExecutor>>,
    files: Vec<UploadFile>,
    transfers: HashMap<UploadId, ActiveTransfer>,
    window: Option<BatchWindow>,
    settled: bool,
    next_attempt: u64,
    commands: mpsc::WeakUnboundedSender<Command>,
}

impl QueueDriver {
    pub(crate) fn new(
        config: QueueConfig,
        capabilities: Capabilities,
        observer: Arc<dyn QueueObserver>,
        executor: Option<Arc<TransferExecutor>>,
        commands: mpsc::WeakUnboundedSender<Command>,
    ) -> Self {
        let window = config.uses_batch_window().then(|| {
            BatchWindow::new(
                config.parallel_batch_offset(),
                window_budget(config.max_parallel_uploads()),
            )
        });
        Self {
            config,
            auto_start: config.effective_auto_start(capabilities),
            observer,
            executor,
            files: Vec::new(),
            transfers: HashMap::new(),
            window,
            settled: false,
            next_attempt: 0,
            commands,
        }
    }

    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        debug!(
            max_parallel = self.config.max_parallel_uploads(),
            batch_offset_ms = self.config.parallel_batch_offset().as_millis(),
            auto_start = self.auto_start,
            auto_remove = self.config.auto_remove(),
            "queue driver started"
        );
        while let Some(command) = commands.recv().await {
            if !self.handle(command) {
                break;
            }
        }
        self.shutdown();
        debug!("queue driver stopped");
    }

    /// Processes one command. Returns false when the driver should stop.
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::AddFiles { files, reply } => {
                let _ = reply.send(self.add_files(files));
            }
            Command::RemoveFile {
                id,
                suppress_cascade,
                reply,
            } => {
                let _ = reply.send(self.remove_file(id, suppress_cascade));
            }
            Command::ClearFiles {
                exclude,
                cancel_in_progress,
                reply,
            } => {
                let _ = reply.send(self.clear_files(exclude, cancel_in_progress));
            }
            Command::StartFile { id, reply } => {
                let started = self.start_file(id);
                if started {
                    self.reevaluate();
                }
                let _ = reply.send(started);
            }
            Command::CancelFile { id, reply } => {
                let canceled = self.cancel_file(id);
                if canceled {
                    self.reevaluate();
                }
                let _ = reply.send(canceled);
            }
            Command::Files { reply } => {
                let _ = reply.send(self.files.clone());
            }
            Command::File { id, reply } => {
                let file = self.position(id).map(|index| self.files[index].clone());
                let _ = reply.send(file);
            }
            Command::StateChanged { reply } => {
                self.reevaluate();
                let _ = reply.send(());
            }
            Command::Shutdown { reply } => {
                self.shutdown();
                let _ = reply.send(());
                return false;
            }
            Command::Transfer { id, attempt, event } => self.on_transfer_event(id, attempt, event),
            Command::WindowElapsed { generation } => {
                let closed = self
                    .window
                    .as_mut()
                    .is_some_and(|window| window.close(generation));
                if closed {
                    self.reevaluate();
                }
            }
        }
        true
    }

    fn position(&self, id: UploadId) -> Option<usize> {
        self.files.iter().position(|file| file.id() == id)
    }

    fn add_files(&mut self, files: Vec<UploadFile>) -> Vec<UploadId> {
        let mut admitted = Vec::with_capacity(files.len());
        for mut file in files {
            let id = file.id();
            if self.position(id).is_some() {
                debug!(file_id = %id, "skipping duplicate admission");
                continue;
            }

            let rejected = file.status() == UploadStatus::Failed;
            if !rejected {
                file.reset_transfer_state();
            }
            self.files.push(file);
            admitted.push(id);

            let file = &self.files[self.files.len() - 1];
            self.observer.on_file_added(file);
            if rejected {
                debug!(file_id = %id, reason = %file.response_text(), "admitted rejected file");
                file.hooks().fire_error(file);
                self.observer.on_error(file);
            }
        }
        debug!(admitted = admitted.len(), total = self.files.len(), "files admitted");
        self.reevaluate();
        admitted
    }

    fn remove_file(&mut self, id: UploadId, suppress_cascade: bool) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        if self.files[index].status() == UploadStatus::Uploading {
            self.cancel_file(id);
        }

        let mut file = self.files.remove(index);
        file.set_status(UploadStatus::Removed);
        debug!(file_id = %id, "file removed");
        self.observer.on_file_removed(&file);

        if !suppress_cascade {
            self.reevaluate();
        }
        true
    }

    fn clear_files(&mut self, mut exclude: Vec<UploadStatus>, cancel_in_progress: bool) -> usize {
        if !cancel_in_progress {
            exclude.extend([UploadStatus::Queued, UploadStatus::Uploading]);
        }
        let doomed: Vec<UploadId> = self
            .files
            .iter()
            .filter(|file| !exclude.contains(&file.status()))
            .map(UploadFile::id)
            .collect();
        for id in &doomed {
            self.remove_file(*id, true);
        }
        debug!(removed = doomed.len(), remaining = self.files.len(), "queue cleared");
        self.observer.on_queue_changed(&self.files);
        doomed.len()
    }

    /// Moves a queued file to `uploading` and invokes its executor.
    fn start_file(&mut self, id: UploadId) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        if self.files[index].status() != UploadStatus::Queued {
            debug!(file_id = %id, status = %self.files[index].status(), "start ignored");
            return false;
        }

        let executor = self.files[index]
            .executor()
            .cloned()
            .or_else(|| self.executor.clone());
        let file = &mut self.files[index];
        file.set_status(UploadStatus::Uploading);
        file.set_progress(0, 0);

        let Some(executor) = executor else {
            warn!(file_id = %id, "no transfer executor for file");
            file.set_status(UploadStatus::Failed);
            file.set_response(0, NO_EXECUTOR_TEXT.to_string());
            let file = &self.files[index];
            file.hooks().fire_error(file);
            self.observer.on_error(file);
            self.observer.on_finished(file);
            return true;
        };

        self.next_attempt += 1;
        let attempt = self.next_attempt;
        let listener = Arc::new(AttemptListener {
            id,
            attempt,
            commands: self.commands.clone(),
        });
        let handle = executor.transfer(&self.files[index], listener);
        self.transfers.insert(id, ActiveTransfer { attempt, handle });
        info!(file_id = %id, file = %self.files[index].name(), attempt, "upload started");
        true
    }

    fn cancel_file(&mut self, id: UploadId) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };
        match self.files[index].status() {
            UploadStatus::Queued => {
                self.files[index].set_status(UploadStatus::Canceled);
                debug!(file_id = %id, "queued file canceled");
                true
            }
            UploadStatus::Uploading => {
                if let Some(active) = self.transfers.remove(&id) {
                    active.handle.cancel();
                }
                self.files[index].set_status(UploadStatus::Canceled);
                info!(file_id = %id, "upload canceled");

                let file = &self.files[index];
                file.hooks().fire_cancel(file);
                self.observer.on_cancelled(file);
                self.observer.on_finished(file);
                true
            }
            _ => false,
        }
    }

    fn on_transfer_event(&mut self, id: UploadId, attempt: u64, event: TransferEvent) {
        let current = self
            .transfers
            .get(&id)
            .is_some_and(|active| active.attempt == attempt);
        let index = match self.position(id) {
            Some(index) if current && self.files[index].status() == UploadStatus::Uploading => index,
            _ => {
                trace!(file_id = %id, attempt, "dropping stale transfer event");
                return;
            }
        };

        match event {
            TransferEvent::Started => {
                self.observer.on_upload_started(&self.files[index]);
                self.reevaluate();
            }
            TransferEvent::Progress {
                percent,
                sent_bytes,
            } => {
                self.files[index].set_progress(percent, sent_bytes);
                self.observer.on_progress(&self.files[index]);
            }
            TransferEvent::Finished(outcome) => {
                self.transfers.remove(&id);
                self.finish(index, outcome);
                self.reevaluate();
            }
        }
    }

    fn finish(&mut self, index: usize, outcome: TransferOutcome) {
        let file = &mut self.files[index];
        file.set_response(outcome.response_code, outcome.response_text);
        file.set_status(outcome.status);
        info!(
            file_id = %file.id(),
            status = %outcome.status,
            response_code = outcome.response_code,
            "upload finished"
        );

        let file = &self.files[index];
        match outcome.status {
            UploadStatus::Uploaded => self.observer.on_uploaded(file),
            UploadStatus::Canceled => {
                file.hooks().fire_cancel(file);
                self.observer.on_cancelled(file);
            }
            _ => {
                file.hooks().fire_error(file);
                self.observer.on_error(file);
            }
        }
        self.observer.on_finished(file);
    }

    /// Global re-evaluation pass.
    fn reevaluate(&mut self) {
        if self.config.auto_remove() {
            let finished: Vec<UploadId> = self
                .files
                .iter()
                .filter(|file| {
                    matches!(file.status(), UploadStatus::Uploaded | UploadStatus::Canceled)
                })
                .map(UploadFile::id)
                .collect();
            for id in finished {
                self.remove_file(id, true);
            }
        }

        if self.auto_start {
            for id in self.eligible() {
                self.start_file(id);
            }
        }

        self.observer.on_queue_changed(&self.files);

        let unfinished = self.files.iter().any(|file| file.status().is_unfinished());
        if unfinished {
            self.settled = false;
        } else if !self.settled {
            self.settled = true;
            info!(files = self.files.len(), "all uploads finished");
            self.observer.on_all_finished();
        }
    }

    /// Queued files allowed to start now, oldest first.
    fn eligible(&mut self) -> Vec<UploadId> {
        let queued: Vec<UploadId> = self
            .files
            .iter()
            .filter(|file| file.status() == UploadStatus::Queued)
            .map(UploadFile::id)
            .collect();
        let uploading = self
            .files
            .iter()
            .filter(|file| file.status() == UploadStatus::Uploading)
            .count();

        let commands = self.commands.clone();
        let count = plan_starts(
            queued.len(),
            uploading,
            self.config.max_parallel_uploads(),
            self.window.as_mut(),
            move |generation| {
                if let Some(commands) = commands.upgrade() {
                    let _ = commands.send(Command::WindowElapsed { generation });
                }
            },
        );
        trace!(queued = queued.len(), uploading, count, "scheduling pass");
        queued.into_iter().take(count).collect()
    }

    fn shutdown(&mut self) {
        if let Some(window) = self.window.as_mut() {
            window.abort();
        }
        for (id, active) in self.transfers.drain() {
            debug!(file_id = %id, "canceling transfer on shutdown");
            active.handle.cancel();
        }
    }
}
