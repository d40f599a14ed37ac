//! Lease Service
//!
//! Opt-in reconciliation of items left `processing` by workers that died.
//! Stale items are failed with a `WORKER_CRASH` record, never re-queued.

use chrono::{DateTime, Utc};
use conveyor_core::domain::item::ItemStatus;
use conveyor_core::domain::result::{FailureRecord, ItemResult};
use conveyor_core::dto::item::ItemUpdate;
use sqlx::PgPool;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::repository::item_repository;

/// Fail every processing item claimed more than `lease` ago
///
/// Returns the number of items reclaimed. Items finished by their worker in
/// the meantime are skipped by the compare-and-set.
pub async fn reclaim_stale(pool: &PgPool, lease: Duration) -> Result<usize, sqlx::Error> {
    let stale = item_repository::find_stale_processing(pool, cutoff(Utc::now(), lease)).await?;
    let mut reclaimed = 0;

    for item in stale {
        let failure = FailureRecord::worker_crash(
            format!("lease of {}s expired", lease.as_secs()),
            item.owner.clone(),
        );
        let update = ItemUpdate::finish(ItemResult::from_failure(failure));

        if item_repository::compare_and_set(pool, item.id, ItemStatus::Processing, &update).await? {
            tracing::warn!(
                "Reclaimed item {} from {} (claimed at {:?})",
                item.id,
                item.owner.as_deref().unwrap_or("unknown worker"),
                item.claimed_at
            );
            reclaimed += 1;
        }
    }

    Ok(reclaimed)
}

/// Run [`reclaim_stale`] periodically in the background
pub fn spawn_reaper(pool: PgPool, lease: Duration) -> JoinHandle<()> {
    let period = (lease / 4).max(Duration::from_secs(1));

    tokio::spawn(async move {
        tracing::info!(
            "Lease reaper started (lease {}s, checking every {}s)",
            lease.as_secs(),
            period.as_secs()
        );

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match reclaim_stale(&pool, lease).await {
                Ok(0) => {}
                Ok(count) => tracing::info!("Lease reaper failed {} stale item(s)", count),
                Err(e) => tracing::error!("Lease reaper error: {}", e),
            }
        }
    })
}

fn cutoff(now: DateTime<Utc>, lease: Duration) -> DateTime<Utc> {
    let lease = chrono::Duration::from_std(lease).unwrap_or(chrono::Duration::MAX);
    now.checked_sub_signed(lease).unwrap_or(DateTime::<Utc>::MIN_UTC)
}
