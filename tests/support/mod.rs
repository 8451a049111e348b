//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod mock_transport;
pub mod socket_guard;

use std::time::Duration;

use tokio::sync::mpsc;
use uploader_core::QueueEvent;

/// Waits for the next event named `name`, skipping others.
///
/// Panics after five seconds.
pub async fn wait_for_event(
    events: &mut mpsc::UnboundedReceiver<QueueEvent>,
    name: &str,
) -> QueueEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("queue stopped");
            if event.name() == name {
                return event;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {name}"))
}

/// Names of every event up to and including the next `name`.
///
/// Panics after five seconds.
pub async fn collect_until(
    events: &mut mpsc::UnboundedReceiver<QueueEvent>,
    name: &str,
) -> Vec<&'static str> {
    let mut names = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("queue stopped");
            names.push(event.name());
            if event.name() == name {
                break;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {name}"));
    names
}

/// Names of every event received so far, without waiting.
pub fn drain_names(events: &mut mpsc::UnboundedReceiver<QueueEvent>) -> Vec<&'static str> {
    let mut names = Vec::new();
    while let Ok(event) = events.try_recv() {
        names.push(event.name());
    }
    names
}

/// Number of events named `name` in `names`.
pub fn count(names: &[&str], name: &str) -> usize {
    names.iter().filter(|n| **n == name).count()
}
