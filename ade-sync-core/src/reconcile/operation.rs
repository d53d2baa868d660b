use std::fmt;

use serde::Serialize;

use crate::event::CanonicalEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Create => write!(f, "+"),
            OperationKind::Update => write!(f, "~"),
            OperationKind::Delete => write!(f, "-"),
        }
    }
}

/// One mutation to apply at the destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OperationEntry {
    Create {
        event: CanonicalEvent,
    },
    Update {
        destination_id: String,
        event: CanonicalEvent,
    },
    Delete {
        destination_id: String,
    },
}

impl OperationEntry {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationEntry::Create { .. } => OperationKind::Create,
            OperationEntry::Update { .. } => OperationKind::Update,
            OperationEntry::Delete { .. } => OperationKind::Delete,
        }
    }

    /// Source event carried by a create or update.
    pub fn event(&self) -> Option<&CanonicalEvent> {
        match self {
            OperationEntry::Create { event } | OperationEntry::Update { event, .. } => Some(event),
            OperationEntry::Delete { .. } => None,
        }
    }

    pub fn destination_id(&self) -> Option<&str> {
        match self {
            OperationEntry::Create { .. } => None,
            OperationEntry::Update { destination_id, .. }
            | OperationEntry::Delete { destination_id } => Some(destination_id),
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, OperationEntry::Delete { .. })
    }
}

impl fmt::Display for OperationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationEntry::Create { event } => write!(f, "{} {}", self.kind(), event),
            OperationEntry::Update {
                destination_id,
                event,
            } => write!(f, "{} {} (#{})", self.kind(), event, destination_id),
            OperationEntry::Delete { destination_id } => {
                write!(f, "{} #{}", self.kind(), destination_id)
            }
        }
    }
}
