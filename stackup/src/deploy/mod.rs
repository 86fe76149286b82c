//! Stack deployment engine

pub mod bucket;
pub mod changeset;
pub mod creator;
pub mod deletion;
pub mod outputs;
pub mod packager;
pub mod prober;
pub mod template;
pub mod workflows;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cloud::aws::WaitPolicy;
use crate::cloud::registry::RegionClients;
use crate::cloud::status::StackWait;
use crate::cloud::{ObjectStore, StackApi};
use crate::deploy::template::{NestedTemplates, TemplateUrlPattern};
use crate::errors::DeployError;
use crate::workers::event_tailer::{self, EventSink, EventTailer, LogSink};

/// Engine polling and timeout options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Interval between stack event polls
    pub event_poll_interval: Duration,

    /// Interval between changeset status polls
    pub changeset_poll_interval: Duration,

    /// Maximum time to wait for a changeset to become ready
    pub changeset_timeout: Duration,

    /// Interval between stack status polls while waiting for completion
    pub stack_poll_interval: Duration,

    /// Maximum number of stack status polls
    pub stack_wait_max_attempts: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            event_poll_interval: Duration::from_secs(5),
            changeset_poll_interval: Duration::from_secs(5),
            changeset_timeout: Duration::from_secs(20 * 60),
            stack_poll_interval: Duration::from_secs(30),
            stack_wait_max_attempts: 120,
        }
    }
}

impl EngineOptions {
    /// Wait policy for the remote client's stack waiters
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            interval: self.stack_poll_interval,
            max_attempts: self.stack_wait_max_attempts,
        }
    }

    fn tailer_options(&self) -> event_tailer::Options {
        event_tailer::Options {
            interval: self.event_poll_interval,
        }
    }
}

/// Packages, deploys, creates and deletes stacks in one region.
///
/// All primary operations run to completion on the caller's task and start at
/// most one background task, the event tailer, which is always stopped before
/// the operation returns. Cancelling the engine's token aborts any in-flight
/// operation with [`DeployError::Cancelled`].
pub struct StackEngine {
    stacks: Arc<dyn StackApi>,
    store: Arc<dyn ObjectStore>,
    region: String,
    options: EngineOptions,
    sink: Arc<dyn EventSink>,
    templates: Arc<dyn NestedTemplates>,
    cancel: CancellationToken,
}

impl StackEngine {
    pub fn new(clients: RegionClients, options: EngineOptions) -> Self {
        Self::from_parts(clients.stacks, clients.store, clients.region, options)
    }

    pub fn from_parts(
        stacks: Arc<dyn StackApi>,
        store: Arc<dyn ObjectStore>,
        region: impl Into<String>,
        options: EngineOptions,
    ) -> Self {
        Self {
            stacks,
            store,
            region: region.into(),
            options,
            sink: Arc::new(LogSink),
            templates: Arc::new(TemplateUrlPattern),
            cancel: CancellationToken::new(),
        }
    }

    /// Send stack events to `sink` instead of the log
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the nested template scanner
    pub fn with_templates(mut self, templates: Arc<dyn NestedTemplates>) -> Self {
        self.templates = templates;
        self
    }

    /// Abort operations when `cancel` is cancelled
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Start tailing the events of a stack into `sink`
    pub fn log_events(&self, stack_id: &str, sink: Arc<dyn EventSink>) -> EventTailer {
        EventTailer::spawn(
            self.stacks.clone(),
            stack_id.to_string(),
            sink,
            self.options.tailer_options(),
            self.cancel.child_token(),
        )
    }

    fn ensure_not_cancelled(&self, operation: &str) -> Result<(), DeployError> {
        if self.cancel.is_cancelled() {
            return Err(DeployError::Cancelled(operation.to_string()));
        }
        Ok(())
    }

    /// Run `fut` unless the engine is cancelled first
    async fn until_cancelled<T, F>(&self, operation: &str, fut: F) -> Result<T, DeployError>
    where
        F: Future<Output = Result<T, DeployError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DeployError::Cancelled(operation.to_string())),
            result = fut => result,
        }
    }

    /// Tail the stack's events while waiting for `wait`, stopping the tailer on every path
    async fn wait_with_events(&self, stack_id: &str, wait: StackWait) -> Result<(), DeployError> {
        let tailer = self.log_events(stack_id, self.sink.clone());

        debug!("Waiting for {} on {}", wait.name(), stack_id);
        let result = self
            .until_cancelled(wait.name(), self.stacks.wait_until(stack_id, wait))
            .await;

        tailer.stop().await;
        result
    }
}
