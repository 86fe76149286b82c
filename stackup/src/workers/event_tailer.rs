//! Background tailer of stack events

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use stack_models::StackEvent;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cloud::StackApi;
use crate::errors::DeployError;

/// Event tailer options
#[derive(Debug, Clone)]
pub struct Options {
    /// Polling interval
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

/// Receives stack events, oldest first, and polling errors
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Result<&StackEvent, &DeployError>);
}

impl<F> EventSink for F
where
    F: Fn(Result<&StackEvent, &DeployError>) + Send + Sync,
{
    fn emit(&self, event: Result<&StackEvent, &DeployError>) {
        self(event)
    }
}

/// Sink that writes events to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: Result<&StackEvent, &DeployError>) {
        match event {
            Ok(event) => match &event.status_reason {
                Some(reason) => info!(
                    "{}: {} ({})",
                    event.logical_resource_id, event.resource_status, reason
                ),
                None => info!("{}: {}", event.logical_resource_id, event.resource_status),
            },
            Err(e) => warn!("Unable to fetch stack events: {}", e),
        }
    }
}

/// Handle to a running tailer
pub struct EventTailer {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl EventTailer {
    /// Start polling the events of `stack_id` on a background task
    pub fn spawn(
        stacks: Arc<dyn StackApi>,
        stack_id: String,
        sink: Arc<dyn EventSink>,
        options: Options,
        cancel: CancellationToken,
    ) -> Self {
        let handle = tokio::spawn(run(stacks, stack_id, sink, options, cancel.clone()));
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Cancel the tailer and wait for its task to finish
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!("Event tailer task failed: {}", e);
            }
        }
    }
}

impl Drop for EventTailer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    stacks: Arc<dyn StackApi>,
    stack_id: String,
    sink: Arc<dyn EventSink>,
    options: Options,
    cancel: CancellationToken,
) {
    debug!("Tailing events of {}", stack_id);
    let mut seen = SeenEvents::default();

    loop {
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            fetched = stacks.describe_stack_events(&stack_id) => fetched,
        };

        match fetched {
            Ok(batch) => {
                for event in seen.select(&batch) {
                    if cancel.is_cancelled() {
                        break;
                    }
                    sink.emit(Ok(&event));
                }
            }
            Err(e) => {
                if !cancel.is_cancelled() {
                    sink.emit(Err(&e));
                }
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(options.interval) => {}
        }
    }

    debug!("Stopped tailing events of {}", stack_id);
}

/// Events already handed to a sink.
///
/// Only the newest timestamp emitted so far and the ids emitted at that
/// timestamp are kept; anything older is never emitted again.
#[derive(Debug, Default)]
pub struct SeenEvents {
    latest: Option<DateTime<Utc>>,
    ids_at_latest: HashSet<String>,
}

impl SeenEvents {
    /// Pick the events to emit from a newest-first batch, oldest first, and
    /// record them as emitted.
    ///
    /// Before anything has been emitted only the newest event of the batch is
    /// picked. After that an event is picked when it is not older than the
    /// latest emitted one and its id has not been emitted, so a stale batch
    /// yields nothing.
    pub fn select(&mut self, batch: &[StackEvent]) -> Vec<StackEvent> {
        let mut fresh: Vec<StackEvent> = match self.latest {
            None => batch.first().cloned().into_iter().collect(),
            Some(latest) => batch
                .iter()
                .rev()
                .filter(|e| e.timestamp >= latest && !self.ids_at_latest.contains(&e.event_id))
                .cloned()
                .collect(),
        };
        fresh.sort_by_key(|e| e.timestamp);

        for event in &fresh {
            if self.latest != Some(event.timestamp) {
                self.latest = Some(event.timestamp);
                self.ids_at_latest.clear();
            }
            self.ids_at_latest.insert(event.event_id.clone());
        }
        fresh
    }
}
