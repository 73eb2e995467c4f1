//! Epic struct and the task-derived state rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{Category, EpicState, TaskStatus};

/// An aggregate of tasks identified by a stable short key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Epic {
    pub key: String,
    pub title: String,
    pub category: Category,
    pub state: EpicState,
    /// When set, `state` was set by an operator and derivation is skipped.
    #[serde(default)]
    pub state_manual: bool,
    pub created_at: DateTime<Utc>,
}

impl Epic {
    pub fn new(key: impl Into<String>, title: impl Into<String>, category: Category) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            category,
            state: EpicState::Open,
            state_manual: false,
            created_at: Utc::now(),
        }
    }
}

/// Derives an epic's state from its child task statuses.
///
/// done iff every child is done or wontdo; active if any child is active;
/// open otherwise. An epic with no tasks is open.
pub fn derive_state(children: &[TaskStatus]) -> EpicState {
    if !children.is_empty()
        && children.iter().all(|s| s.satisfies_dependency())
    {
        return EpicState::Done;
    }
    if children.iter().any(|s| *s == TaskStatus::Active) {
        return EpicState::Active;
    }
    EpicState::Open
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_epic_is_open() {
        assert_eq!(derive_state(&[]), EpicState::Open);
    }

    #[test]
    fn all_terminal_positive_is_done() {
        assert_eq!(
            derive_state(&[TaskStatus::Done, TaskStatus::Wontdo]),
            EpicState::Done
        );
    }

    #[test]
    fn any_active_child_makes_active() {
        assert_eq!(
            derive_state(&[TaskStatus::Done, TaskStatus::Active, TaskStatus::Open]),
            EpicState::Active
        );
    }

    #[test]
    fn failed_child_keeps_epic_open() {
        assert_eq!(
            derive_state(&[TaskStatus::Done, TaskStatus::Failed]),
            EpicState::Open
        );
    }
}
