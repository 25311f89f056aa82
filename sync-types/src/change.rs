//! Change records delivered to observers after a syncer transaction.

use serde::{Deserialize, Serialize};

use crate::MetaHandle;

/// What happened to an entry over the course of one write transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeAction {
    /// The entry became visible.
    Add,
    /// A visible field (name, folder flag, url, favicon or position) changed.
    Update,
    /// The entry was tombstoned.
    Delete,
}

/// One entry of an ordered change list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Handle of the changed entry.
    pub id: MetaHandle,
    /// Kind of change.
    pub action: ChangeAction,
    /// Whether parentage or sibling order changed. Always true for adds and
    /// false for deletes.
    pub position_changed: bool,
}

impl ChangeRecord {
    /// An add record.
    pub fn added(id: MetaHandle) -> Self {
        Self {
            id,
            action: ChangeAction::Add,
            position_changed: true,
        }
    }

    /// An update record.
    pub fn updated(id: MetaHandle, position_changed: bool) -> Self {
        Self {
            id,
            action: ChangeAction::Update,
            position_changed,
        }
    }

    /// A delete record.
    pub fn deleted(id: MetaHandle) -> Self {
        Self {
            id,
            action: ChangeAction::Delete,
            position_changed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_position_flag() {
        let h = MetaHandle::new(4);
        assert!(ChangeRecord::added(h).position_changed);
        assert!(!ChangeRecord::deleted(h).position_changed);
        assert!(ChangeRecord::updated(h, true).position_changed);
        assert_eq!(ChangeRecord::updated(h, false).action, ChangeAction::Update);
    }

    #[test]
    fn record_serializes_to_json() {
        let json = serde_json::to_value(ChangeRecord::deleted(MetaHandle::new(9))).unwrap();
        assert_eq!(json["id"], 9);
        assert_eq!(json["action"], "Delete");
    }
}
