//! Claim coordinator
//!
//! Grants a single worker exclusive ownership of a pending item. The final
//! word is the store's compare-and-set: the read only filters out items that
//! are obviously taken.

use anyhow::Result;
use conveyor_core::domain::item::ItemStatus;
use conveyor_core::dto::item::ItemUpdate;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::repository::WorkItemRepository;

#[derive(Clone)]
pub struct ClaimCoordinator {
    items: Arc<dyn WorkItemRepository>,
}

impl ClaimCoordinator {
    pub fn new(items: Arc<dyn WorkItemRepository>) -> Self {
        Self { items }
    }

    /// Moves `item_id` from `pending` to `processing` for `owner`
    ///
    /// Returns `false` when the item is not pending or another worker won
    /// the race. Losing a claim is not an error.
    pub async fn claim(&self, item_id: Uuid, owner: &str) -> Result<bool> {
        let item = self.items.get(item_id).await?;
        if item.status != ItemStatus::Pending {
            debug!("Item {} is {}, not claimable", item_id, item.status);
            return Ok(false);
        }

        let won = self
            .items
            .compare_and_set(item_id, ItemStatus::Pending, ItemUpdate::claim(owner))
            .await?;

        if won {
            debug!("Claimed item {} as {}", item_id, owner);
        } else {
            debug!("Lost claim race for item {}", item_id);
        }

        Ok(won)
    }
}
