//! Progress bars for upload runs, driven by queue events.

use std::collections::HashMap;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uploader_core::{QueueEvent, UploadFile, UploadId, UploadStatus};

/// Spawns the progress consumer.
///
/// The task drains `events` until the queue reports that every file has
/// finished, or the queue stops, and resolves to the last known state of
/// each admitted file in admission order. Bars are drawn only when
/// `show_bars` is true; events are logged either way.
pub(crate) fn spawn_progress_ui(
    show_bars: bool,
    events: mpsc::UnboundedReceiver<QueueEvent>,
) -> JoinHandle<Vec<UploadFile>> {
    let target = if show_bars {
        ProgressDrawTarget::stderr()
    } else {
        ProgressDrawTarget::hidden()
    };
    tokio::spawn(track_events(MultiProgress::with_draw_target(target), events))
}

async fn track_events(
    multi: MultiProgress,
    mut events: mpsc::UnboundedReceiver<QueueEvent>,
) -> Vec<UploadFile> {
    let mut bars: HashMap<UploadId, ProgressBar> = HashMap::new();
    let mut files: Vec<UploadFile> = Vec::new();

    while let Some(event) = events.recv().await {
        if let Some(file) = event.file() {
            record(&mut files, file);
        }
        match event {
            QueueEvent::UploadStarted(file) => {
                let bar = bars
                    .entry(file.id())
                    .or_insert_with(|| multi.add(new_bar(&file)));
                bar.reset();
                bar.enable_steady_tick(Duration::from_millis(120));
                debug!(file = %file.name(), url = %file.url(), "upload started");
            }
            QueueEvent::Progress(file) => {
                if let Some(bar) = bars.get(&file.id()) {
                    bar.set_position(file.sent_bytes());
                }
            }
            QueueEvent::Finished(file) => {
                if let Some(bar) = bars.get(&file.id()) {
                    if file.status() == UploadStatus::Uploaded {
                        bar.set_position(file.size());
                    }
                    bar.finish_with_message(finish_message(&file));
                }
                log_finished(&file);
            }
            QueueEvent::Error(file) if file.response_code() == 0 && !bars.contains_key(&file.id()) => {
                warn!(file = %file.name(), reason = %file.response_text(), "file rejected");
            }
            QueueEvent::AllFinished => {
                debug!("all uploads finished");
                break;
            }
            _ => {}
        }
    }

    if let Err(e) = multi.clear() {
        debug!(error = %e, "failed to clear progress bars");
    }
    files
}

/// Keeps the latest snapshot per file. Removal keeps the last outcome.
fn record(files: &mut Vec<UploadFile>, file: &UploadFile) {
    match files.iter_mut().find(|known| known.id() == file.id()) {
        Some(_) if file.status() == UploadStatus::Removed => {}
        Some(known) => *known = file.clone(),
        None => files.push(file.clone()),
    }
}

fn new_bar(file: &UploadFile) -> ProgressBar {
    let bar = ProgressBar::new(file.size());
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner} {wide_msg} [{bar:30}] {bytes}/{total_bytes} {percent:>3}%",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> "),
    );
    bar.set_message(file.name().to_string());
    bar
}

fn finish_message(file: &UploadFile) -> String {
    match file.status() {
        UploadStatus::Uploaded => format!("{} uploaded", file.name()),
        status => format!("{} {status}: {}", file.name(), file.response_text()),
    }
}

fn log_finished(file: &UploadFile) {
    match file.status() {
        UploadStatus::Uploaded => info!(
            file = %file.name(),
            code = file.response_code(),
            "upload complete"
        ),
        UploadStatus::Canceled => info!(file = %file.name(), "upload canceled"),
        _ => warn!(
            file = %file.name(),
            code = file.response_code(),
            reason = %file.response_text(),
            "upload failed"
        ),
    }
}
