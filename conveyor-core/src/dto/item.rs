//! Work item DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::item::{ItemStatus, WorkItem};
use crate::domain::result::ItemResult;

/// Filter for listing work items
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListItemsQuery {
    pub status: Option<ItemStatus>,
    pub capability: Option<String>,
    pub limit: Option<i64>,
}

/// Fields written by a status transition
///
/// `None` leaves the stored value untouched. `clear_owner` empties the owner
/// and takes precedence over `owner`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub status: ItemStatus,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub clear_owner: bool,
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: Option<ItemResult>,
}

impl ItemUpdate {
    /// `pending -> processing` on behalf of `owner`
    pub fn claim(owner: impl Into<String>) -> Self {
        Self {
            status: ItemStatus::Processing,
            owner: Some(owner.into()),
            clear_owner: false,
            claimed_at: Some(Utc::now()),
            completed_at: None,
            result: None,
        }
    }

    /// `processing -> completed | failed`, status derived from the result
    ///
    /// Releases the owner; a failure record keeps its own copy.
    pub fn finish(result: ItemResult) -> Self {
        Self {
            status: result.terminal_status(),
            owner: None,
            clear_owner: true,
            claimed_at: None,
            completed_at: Some(Utc::now()),
            result: Some(result),
        }
    }

    /// Writes the update onto `item`, keeping stored values for `None` fields
    pub fn apply(&self, item: &mut WorkItem) {
        item.status = self.status;
        if self.clear_owner {
            item.owner = None;
        } else if let Some(owner) = &self.owner {
            item.owner = Some(owner.clone());
        }
        if let Some(claimed_at) = self.claimed_at {
            item.claimed_at = Some(claimed_at);
        }
        if let Some(completed_at) = self.completed_at {
            item.completed_at = Some(completed_at);
        }
        if let Some(result) = &self.result {
            item.result = Some(result.clone());
        }
    }
}

/// Compare-and-set request: apply `update` only if the item is in `expected_status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub expected_status: ItemStatus,
    pub update: ItemUpdate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TransitionResponse {
    pub applied: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::batch::BatchType;
    use crate::domain::result::{ExecutionResult, FailureRecord};
    use serde_json::{Map, json};
    use uuid::Uuid;

    #[test]
    fn test_claim_update_sets_owner() {
        let update = ItemUpdate::claim("worker-1");
        assert_eq!(update.status, ItemStatus::Processing);
        assert_eq!(update.owner.as_deref(), Some("worker-1"));
        assert!(!update.clear_owner);
        assert!(update.claimed_at.is_some());
        assert!(update.result.is_none());
    }

    #[test]
    fn test_finish_update_derives_status() {
        let ok = ItemUpdate::finish(ItemResult::from_results(vec![ExecutionResult::success(
            "a",
            Map::new(),
        )]));
        assert_eq!(ok.status, ItemStatus::Completed);
        assert!(ok.completed_at.is_some());

        let crashed = ItemUpdate::finish(ItemResult::from_failure(FailureRecord::worker_crash(
            "boom", None,
        )));
        assert_eq!(crashed.status, ItemStatus::Failed);
        assert!(crashed.clear_owner);
    }

    #[test]
    fn test_update_without_clear_owner_flag_deserializes() {
        let update: ItemUpdate = serde_json::from_value(json!({"status": "processing"})).unwrap();
        assert!(!update.clear_owner);
        assert_eq!(update.owner, None);
    }

    #[test]
    fn test_apply_releases_owner_on_finish() {
        let mut item = WorkItem::pending(
            Uuid::new_v4(),
            0,
            BatchType::INDIVIDUAL_USERS,
            Uuid::new_v4(),
            "analysis",
            json!({"id": "u1"}),
        );

        ItemUpdate::claim("worker-1").apply(&mut item);
        assert_eq!(item.status, ItemStatus::Processing);
        let claimed_at = item.claimed_at;

        ItemUpdate::finish(ItemResult::from_results(vec![ExecutionResult::success(
            "u1",
            Map::new(),
        )]))
        .apply(&mut item);

        assert_eq!(item.status, ItemStatus::Completed);
        assert_eq!(item.owner, None);
        assert_eq!(item.claimed_at, claimed_at);
        assert!(item.completed_at.is_some());
        assert!(item.result.is_some());
    }
}
