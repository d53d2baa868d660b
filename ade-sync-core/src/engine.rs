//! The fetch → reconcile → execute pipeline.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::SyncSettings;
use crate::destination::Destination;
use crate::error::{CoreResult, SyncError};
use crate::event::SyncTag;
use crate::execute::{Executor, RetryPolicy, SyncResult};
use crate::reconcile::{ReconcilePlan, Reconciler};
use crate::source::Source;
use crate::time_window::TimeWindow;

pub const DEFAULT_WORKERS: usize = 4;

/// Runs synchronization passes for one sync tag.
///
/// The engine holds no state between runs: each run lists what the
/// destination currently holds under the tag and diffs it against a fresh
/// source snapshot.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    tag: SyncTag,
    policy: RetryPolicy,
    workers: usize,
    cancel: CancellationToken,
}

impl Default for SyncEngine {
    fn default() -> Self {
        SyncEngine::new(SyncTag::default())
    }
}

impl SyncEngine {
    pub fn new(tag: SyncTag) -> Self {
        SyncEngine {
            tag,
            policy: RetryPolicy::default(),
            workers: DEFAULT_WORKERS,
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_settings(settings: &SyncSettings) -> Self {
        SyncEngine::new(settings.tag.clone())
            .with_retry_policy(settings.retry)
            .with_workers(settings.workers)
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Use `cancel` to stop runs instead of the engine's own token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels runs of this engine when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn tag(&self) -> &SyncTag {
        &self.tag
    }

    /// Fetch both sides and compute the operations a run would apply,
    /// without mutating anything.
    pub async fn plan(
        &self,
        source: &dyn Source,
        destination: &dyn Destination,
        window: &TimeWindow,
    ) -> CoreResult<ReconcilePlan> {
        debug!(source = source.name(), %window, "Fetching source events");
        let fetched = self.until_cancelled(source.fetch_events(window)).await?;

        let total = fetched.len();
        let snapshot: Vec<_> = fetched
            .into_iter()
            .filter(|e| window.overlaps(e.start_time(), e.end_time()))
            .collect();
        if snapshot.len() < total {
            debug!(
                dropped = total - snapshot.len(),
                "Dropped source events outside the sync window"
            );
        }

        debug!(destination = destination.name(), tag = %self.tag, "Listing managed events");
        let managed = self
            .until_cancelled(destination.list_managed_events(&self.tag, window))
            .await?;

        info!(
            source_events = snapshot.len(),
            managed_events = managed.len(),
            "Fetched both sides"
        );

        Reconciler::new(self.tag.clone()).reconcile(&snapshot, &managed)
    }

    /// Run one full synchronization pass.
    ///
    /// Errors while fetching either side abort the run before any mutation.
    /// Errors while applying operations are reported per entry in the
    /// returned [`SyncResult`].
    pub async fn run(
        &self,
        source: &dyn Source,
        destination: Arc<dyn Destination>,
        window: &TimeWindow,
    ) -> CoreResult<SyncResult> {
        let plan = self.plan(source, destination.as_ref(), window).await?;

        if self.cancel.is_cancelled() {
            return Err(SyncError::RunCancelled);
        }

        info!(
            operations = plan.operations.len(),
            unchanged = plan.unchanged,
            "Applying plan"
        );

        let executor = Executor::new(destination, self.policy, self.workers, self.cancel.clone());
        let entries = executor.execute(&plan.operations).await;
        let result = SyncResult::new(entries, plan.anomalies, plan.unchanged);

        info!(summary = %result.summary, "Sync finished");
        Ok(result)
    }

    async fn until_cancelled<T>(
        &self,
        fut: impl Future<Output = CoreResult<T>>,
    ) -> CoreResult<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SyncError::RunCancelled),
            result = fut => result,
        }
    }
}

/// Run one synchronization pass with default settings and the default tag.
pub async fn run_sync(
    source: &dyn Source,
    destination: Arc<dyn Destination>,
    window: &TimeWindow,
) -> CoreResult<SyncResult> {
    SyncEngine::default().run(source, destination, window).await
}
