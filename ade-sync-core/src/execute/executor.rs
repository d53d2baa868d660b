use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::destination::Destination;
use crate::error::{CoreResult, SyncError};
use crate::event::CanonicalEvent;
use crate::execute::report::{EntryFailure, EntryReport, Outcome, SkipReason};
use crate::execute::retry::RetryPolicy;
use crate::reconcile::OperationEntry;

type Accumulator = Arc<Mutex<Vec<EntryReport>>>;

/// Applies plan entries to a destination with bounded concurrency.
#[derive(Clone)]
pub struct Executor {
    destination: Arc<dyn Destination>,
    policy: RetryPolicy,
    workers: usize,
    cancel: CancellationToken,
}

impl Executor {
    pub fn new(
        destination: Arc<dyn Destination>,
        policy: RetryPolicy,
        workers: usize,
        cancel: CancellationToken,
    ) -> Self {
        Executor {
            destination,
            policy,
            workers: workers.max(1),
            cancel,
        }
    }

    /// Apply `operations` and return one report per entry, in plan order.
    ///
    /// Operations must be laid out as produced by the reconciler: every
    /// create and update before the first delete. No delete is dispatched
    /// until all creates and updates, retries included, have finished.
    pub async fn execute(&self, operations: &[OperationEntry]) -> Vec<EntryReport> {
        let accumulator: Accumulator = Arc::new(Mutex::new(Vec::with_capacity(operations.len())));
        let split = operations
            .iter()
            .position(OperationEntry::is_delete)
            .unwrap_or(operations.len());
        let (upserts, deletes) = operations.split_at(split);

        self.run_phase("upsert", 0, upserts, &accumulator).await;
        self.run_phase("delete", split, deletes, &accumulator).await;

        let mut reports = std::mem::take(&mut *accumulator.lock());

        let reported: HashSet<usize> = reports.iter().map(|r| r.index).collect();
        for (index, operation) in operations.iter().enumerate() {
            if !reported.contains(&index) {
                reports.push(EntryReport::internal(
                    index,
                    operation.clone(),
                    "worker task ended without a report".into(),
                ));
            }
        }

        reports.sort_by_key(|r| r.index);
        reports
    }

    /// Dispatch one phase and wait for every task of it to finish.
    async fn run_phase(
        &self,
        phase: &'static str,
        offset: usize,
        operations: &[OperationEntry],
        accumulator: &Accumulator,
    ) {
        if operations.is_empty() {
            return;
        }
        debug!(phase, entries = operations.len(), workers = self.workers, "Starting phase");

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for (i, operation) in operations.iter().enumerate() {
            let index = offset + i;

            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                accumulator
                    .lock()
                    .push(EntryReport::skipped(index, operation.clone()));
                continue;
            };

            let worker = self.clone();
            let operation = operation.clone();
            let accumulator = Arc::clone(accumulator);
            tasks.spawn(async move {
                let report = worker.apply(index, operation).await;
                accumulator.lock().push(report);
                drop(permit);
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                error!(phase, error = %err, "Sync worker task failed");
            }
        }
    }

    async fn apply(&self, index: usize, operation: OperationEntry) -> EntryReport {
        let mut retries = 0;
        let mut reclassified = false;

        let outcome = match &operation {
            OperationEntry::Create { event } => {
                match self.attempt(Call::Create(event), &mut retries).await {
                    Ok(id) => applied(id),
                    Err(halt) => halt.into_outcome(),
                }
            }
            OperationEntry::Update {
                destination_id,
                event,
            } => match self
                .attempt(Call::Update(destination_id, event), &mut retries)
                .await
            {
                Ok(_) => applied(Some(destination_id.clone())),
                Err(Halt::Failed(SyncError::NotFound)) => {
                    info!(
                        destination_id = %destination_id,
                        external_id = %event.external_id(),
                        "Event vanished from destination, recreating it"
                    );
                    reclassified = true;
                    let mut create_retries = 0;
                    let created = self.attempt(Call::Create(event), &mut create_retries).await;
                    retries += create_retries;
                    match created {
                        Ok(id) => applied(id),
                        Err(Halt::Cancelled) => skipped(),
                        Err(Halt::Failed(err) | Halt::Exhausted(err)) => Outcome::Failed {
                            failure: EntryFailure::Stale(err.to_string()),
                        },
                    }
                }
                Err(halt) => halt.into_outcome(),
            },
            OperationEntry::Delete { destination_id } => {
                match self.attempt(Call::Delete(destination_id), &mut retries).await {
                    Ok(_) => applied(None),
                    Err(Halt::Failed(SyncError::NotFound)) => {
                        debug!(destination_id = %destination_id, "Event already gone");
                        applied(None)
                    }
                    Err(halt) => halt.into_outcome(),
                }
            }
        };

        match &outcome {
            Outcome::Applied { .. } => debug!(index, retries, "Applied {}", operation),
            Outcome::Skipped { .. } => debug!(index, "Skipped {}", operation),
            Outcome::Failed { failure } => {
                warn!(index, retries, error = %failure, "Failed {}", operation)
            }
        }

        EntryReport {
            index,
            operation,
            outcome,
            retries,
            reclassified,
        }
    }

    /// Run `call`, retrying transient errors per the policy. `retries` counts
    /// the retries spent and bounds them at `max_retries`.
    async fn attempt(&self, call: Call<'_>, retries: &mut u32) -> Result<Option<String>, Halt> {
        loop {
            let err = match self.invoke(call).await {
                Ok(id) => return Ok(id),
                Err(err) => err,
            };

            if !err.is_transient() {
                return Err(Halt::Failed(err));
            }
            if *retries >= self.policy.max_retries {
                return Err(Halt::Exhausted(err));
            }

            *retries += 1;
            let delay = self.policy.delay_for(&err, *retries);
            warn!(
                destination = self.destination.name(),
                retry = *retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient destination error, backing off"
            );

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(Halt::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn invoke(&self, call: Call<'_>) -> CoreResult<Option<String>> {
        match call {
            Call::Create(event) => self.destination.create(event).await.map(Some),
            Call::Update(id, event) => self.destination.update(id, event).await.map(|_| None),
            Call::Delete(id) => self.destination.delete(id).await.map(|_| None),
        }
    }
}

#[derive(Clone, Copy)]
enum Call<'a> {
    Create(&'a CanonicalEvent),
    Update(&'a str, &'a CanonicalEvent),
    Delete(&'a str),
}

/// Why the retry loop stopped without success.
enum Halt {
    Failed(SyncError),
    Exhausted(SyncError),
    Cancelled,
}

impl Halt {
    fn into_outcome(self) -> Outcome {
        match self {
            Halt::Failed(err) => Outcome::Failed {
                failure: EntryFailure::from_error(err),
            },
            Halt::Exhausted(err) => Outcome::Failed {
                failure: EntryFailure::exhausted(err),
            },
            Halt::Cancelled => skipped(),
        }
    }
}

fn applied(destination_id: Option<String>) -> Outcome {
    Outcome::Applied { destination_id }
}

fn skipped() -> Outcome {
    Outcome::Skipped {
        reason: SkipReason::Cancelled,
    }
}
