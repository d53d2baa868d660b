use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{CoreResult, SyncError};
use crate::event::{CanonicalEvent, DestinationEvent, SyncTag};
use crate::reconcile::OperationEntry;

/// Destination state that should not exist but was healed instead of failing
/// the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// Several managed events carry the same external id. The most recently
    /// modified one is kept and the others are scheduled for deletion.
    DuplicateExternalId {
        external_id: String,
        kept: String,
        discarded: Vec<String>,
    },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::DuplicateExternalId {
                external_id,
                kept,
                discarded,
            } => write!(
                f,
                "external id '{}' is stored {} times (keeping #{}, deleting {})",
                external_id,
                discarded.len() + 1,
                kept,
                discarded
                    .iter()
                    .map(|id| format!("#{id}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

impl From<&Anomaly> for SyncError {
    fn from(anomaly: &Anomaly) -> Self {
        SyncError::InconsistentState(anomaly.to_string())
    }
}

/// Output of [`Reconciler::reconcile`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcilePlan {
    /// Creates and updates in source order, followed by deletes in
    /// destination order.
    pub operations: Vec<OperationEntry>,
    pub anomalies: Vec<Anomaly>,
    /// Source events already present and content-equal at the destination.
    pub unchanged: usize,
    /// Destination events dropped because they do not carry the engine tag.
    pub ignored_unmanaged: usize,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Number of leading operations that belong to the create/update phase.
    pub fn upsert_count(&self) -> usize {
        self.operations.iter().take_while(|op| !op.is_delete()).count()
    }
}

/// Computes the operations that bring the managed destination events in line
/// with a source snapshot.
///
/// The source always wins: a destination event whose content differs from
/// its source counterpart is overwritten, whatever its modification time.
#[derive(Debug, Clone)]
pub struct Reconciler {
    tag: SyncTag,
}

impl Reconciler {
    pub fn new(tag: SyncTag) -> Self {
        Reconciler { tag }
    }

    pub fn tag(&self) -> &SyncTag {
        &self.tag
    }

    pub fn reconcile(
        &self,
        source: &[CanonicalEvent],
        destination: &[DestinationEvent],
    ) -> CoreResult<ReconcilePlan> {
        let source_ids = unique_source_ids(source)?;

        let managed: Vec<&DestinationEvent> = destination
            .iter()
            .filter(|d| d.event.is_managed_by(&self.tag))
            .collect();
        let ignored_unmanaged = destination.len() - managed.len();
        if ignored_unmanaged > 0 {
            debug!(
                count = ignored_unmanaged,
                tag = %self.tag,
                "Ignoring destination events without the sync tag"
            );
        }

        let index = DestinationIndex::build(&managed);
        for anomaly in &index.anomalies {
            warn!(error = %SyncError::from(anomaly), "Healing inconsistent destination state");
        }

        let mut operations = Vec::new();
        let mut unchanged = 0;

        for event in source {
            match index.kept.get(event.external_id()) {
                None => operations.push(OperationEntry::Create {
                    event: self.tagged(event),
                }),
                Some(&pos) => {
                    let existing = managed[pos];
                    if existing.event.content_eq(event) {
                        unchanged += 1;
                    } else {
                        operations.push(OperationEntry::Update {
                            destination_id: existing.destination_id.clone(),
                            event: self.tagged(event),
                        });
                    }
                }
            }
        }

        // Deletes go last so a slot is never left empty while its
        // replacement is still pending.
        for (pos, existing) in managed.iter().enumerate() {
            let surplus = index.surplus.contains(&pos);
            if surplus || !source_ids.contains(existing.external_id()) {
                operations.push(OperationEntry::Delete {
                    destination_id: existing.destination_id.clone(),
                });
            }
        }

        debug!(
            operations = operations.len(),
            unchanged,
            anomalies = index.anomalies.len(),
            "Reconciled source against destination"
        );

        Ok(ReconcilePlan {
            operations,
            anomalies: index.anomalies,
            unchanged,
            ignored_unmanaged,
        })
    }

    fn tagged(&self, event: &CanonicalEvent) -> CanonicalEvent {
        event.clone().with_sync_tag(self.tag.clone())
    }
}

fn unique_source_ids(source: &[CanonicalEvent]) -> CoreResult<HashSet<&str>> {
    let mut ids = HashSet::with_capacity(source.len());
    for event in source {
        if !ids.insert(event.external_id()) {
            return Err(SyncError::SourceFormat(format!(
                "duplicate external id '{}' in source snapshot",
                event.external_id()
            )));
        }
    }
    Ok(ids)
}

/// Managed destination events indexed by external id, with duplicates
/// resolved.
struct DestinationIndex<'a> {
    /// external id → position (in the managed list) of the surviving event
    kept: HashMap<&'a str, usize>,
    /// positions of the duplicates to delete
    surplus: HashSet<usize>,
    anomalies: Vec<Anomaly>,
}

impl<'a> DestinationIndex<'a> {
    fn build(managed: &[&'a DestinationEvent]) -> Self {
        let mut kept: HashMap<&'a str, usize> = HashMap::with_capacity(managed.len());
        let mut surplus = HashSet::new();
        let mut duplicated: Vec<&'a str> = Vec::new();

        for (pos, candidate) in managed.iter().enumerate() {
            let id = candidate.external_id();
            match kept.get(id).copied() {
                None => {
                    kept.insert(id, pos);
                }
                Some(current) => {
                    if !duplicated.contains(&id) {
                        duplicated.push(id);
                    }
                    // Latest modification wins; ties keep the first listed.
                    if candidate.event.last_modified() > managed[current].event.last_modified() {
                        surplus.insert(current);
                        kept.insert(id, pos);
                    } else {
                        surplus.insert(pos);
                    }
                }
            }
        }

        let anomalies = duplicated
            .into_iter()
            .map(|id| {
                let keeper = kept[id];
                let discarded = managed
                    .iter()
                    .enumerate()
                    .filter(|(pos, d)| d.external_id() == id && *pos != keeper)
                    .map(|(_, d)| d.destination_id.clone())
                    .collect();
                Anomaly::DuplicateExternalId {
                    external_id: id.to_string(),
                    kept: managed[keeper].destination_id.clone(),
                    discarded,
                }
            })
            .collect();

        DestinationIndex {
            kept,
            surplus,
            anomalies,
        }
    }
}
