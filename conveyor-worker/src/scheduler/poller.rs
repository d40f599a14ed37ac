//! Work item poller
//!
//! Lists pending items for this worker's capability, claims them, and runs
//! each claimed item in its own task bounded by `max_concurrent_items`.
//! Every claimed item ends `completed` or `failed`: results are written back
//! with a compare-and-set from `processing`, and a processor error or an
//! aborted task is recorded as a failure.

use anyhow::{Context, Result, anyhow};
use conveyor_core::domain::item::{ItemStatus, WorkItem};
use conveyor_core::domain::result::{FailureRecord, ItemResult};
use conveyor_core::dto::item::ItemUpdate;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{self, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::repository::WorkItemRepository;
use crate::scheduler::backoff::PollBackoff;
use crate::scheduler::claim::ClaimCoordinator;
use crate::service::ProcessorRegistry;

pub struct ItemPoller {
    config: Config,
    items: Arc<dyn WorkItemRepository>,
    processors: Arc<ProcessorRegistry>,
    claims: ClaimCoordinator,
    semaphore: Arc<Semaphore>,
    /// Claimed items whose task has not written back yet
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

impl ItemPoller {
    pub fn new(
        config: Config,
        items: Arc<dyn WorkItemRepository>,
        processors: Arc<ProcessorRegistry>,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_items));
        Self {
            claims: ClaimCoordinator::new(Arc::clone(&items)),
            config,
            items,
            processors,
            semaphore,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Polls until `shutdown` resolves, then drains in-flight items
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        if self.processors.resolve(&self.config.capability).is_none() {
            return Err(anyhow!(
                "no processor registered for capability '{}'",
                self.config.capability
            ));
        }

        info!(
            "Starting item poller for '{}' (interval {:?}..{:?}, {} concurrent)",
            self.config.capability,
            self.config.poll_min_interval,
            self.config.poll_max_interval,
            self.config.max_concurrent_items
        );

        tokio::pin!(shutdown);

        let mut tasks = JoinSet::new();
        let mut backoff = PollBackoff::new(
            self.config.poll_min_interval,
            self.config.poll_max_interval,
            self.config.poll_backoff_factor,
        );

        loop {
            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = joined {
                    warn!("Item task panicked: {}", e);
                }
            }

            let delay = match self.poll_once(&mut tasks).await {
                Ok(0) => backoff.next_delay(),
                Ok(found) => {
                    debug!("Found {} pending item(s)", found);
                    backoff.reset()
                }
                Err(e) => {
                    error!("Error during poll cycle: {:#}", e);
                    backoff.next_delay()
                }
            };

            tokio::select! {
                _ = &mut shutdown => break,
                _ = time::sleep(delay) => {}
            }
        }

        info!("Shutdown requested, no longer polling");
        self.drain(tasks).await;
        info!("Item poller stopped");
        Ok(())
    }

    /// Performs a single poll cycle, returning how many pending items were seen
    async fn poll_once(&self, tasks: &mut JoinSet<()>) -> Result<usize> {
        let candidates = self
            .items
            .list_by_status(
                ItemStatus::Pending,
                &self.config.capability,
                self.config.poll_batch_size,
            )
            .await
            .context("Failed to fetch pending items")?;

        if candidates.is_empty() {
            debug!("No pending items");
            return Ok(0);
        }

        let found = candidates.len();
        let mut claimed = 0;

        for mut item in candidates {
            // Skip the rest of the cycle at capacity; they stay pending
            let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() else {
                debug!("At capacity, leaving remaining items for the next cycle");
                break;
            };

            match self.claims.claim(item.id, &self.config.worker_id).await {
                Ok(true) => {
                    item.status = ItemStatus::Processing;
                    item.owner = Some(self.config.worker_id.clone());
                    self.spawn_item_task(item, permit, tasks).await;
                    claimed += 1;
                }
                Ok(false) => {}
                Err(e) => warn!("Failed to claim item {}: {:#}", item.id, e),
            }
        }

        if claimed > 0 {
            info!("Claimed {} of {} pending item(s)", claimed, found);
        }

        Ok(found)
    }

    async fn spawn_item_task(
        &self,
        item: WorkItem,
        permit: OwnedSemaphorePermit,
        tasks: &mut JoinSet<()>,
    ) {
        let items = Arc::clone(&self.items);
        let processors = Arc::clone(&self.processors);
        let in_flight = Arc::clone(&self.in_flight);
        let owner = self.config.worker_id.clone();

        in_flight.lock().await.insert(item.id);

        tasks.spawn(async move {
            let _permit = permit;
            let item_id = item.id;

            if let Err(e) = Self::process_item(item, &owner, items.as_ref(), &processors).await {
                error!("Failed to finish item {}: {:#}", item_id, e);
            }

            in_flight.lock().await.remove(&item_id);
        });
    }

    /// Runs the capability's processor and writes the outcome back
    async fn process_item(
        item: WorkItem,
        owner: &str,
        items: &dyn WorkItemRepository,
        processors: &ProcessorRegistry,
    ) -> Result<()> {
        let outcome = match processors.resolve(&item.capability) {
            Some(processor) => AssertUnwindSafe(processor.process(&item))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(anyhow!("processor panicked: {}", panic_message(&*panic)))
                }),
            None => Err(anyhow!(
                "no processor registered for capability '{}'",
                item.capability
            )),
        };

        match outcome {
            Ok(result) => {
                let failed = result.results.iter().filter(|r| r.is_error()).count();
                let update = ItemUpdate::finish(result);
                info!(
                    "Item {} finished as {} ({} element error(s))",
                    item.id, update.status, failed
                );
                write_back(items, item.id, update).await
            }
            Err(e) => {
                warn!("Processing of item {} failed: {:#}", item.id, e);
                mark_failed(items, item.id, owner, format!("{:#}", e)).await
            }
        }
    }

    /// Waits for in-flight items, then fails whatever is left
    async fn drain(&self, mut tasks: JoinSet<()>) {
        if !tasks.is_empty() {
            info!(
                "Waiting up to {:?} for {} in-flight item(s)",
                self.config.shutdown_grace,
                tasks.len()
            );

            let finished = time::timeout(self.config.shutdown_grace, async {
                while let Some(joined) = tasks.join_next().await {
                    if let Err(e) = joined {
                        warn!("Item task panicked: {}", e);
                    }
                }
            })
            .await;

            if finished.is_err() {
                warn!("Grace period elapsed, aborting {} item task(s)", tasks.len());
                tasks.abort_all();
                while tasks.join_next().await.is_some() {}
            }
        }

        let stranded: Vec<Uuid> = self.in_flight.lock().await.drain().collect();
        for item_id in stranded {
            let message = "worker shut down before the item finished".to_string();
            if let Err(e) = mark_failed(
                self.items.as_ref(),
                item_id,
                &self.config.worker_id,
                message,
            )
            .await
            {
                error!("Failed to release item {}: {:#}", item_id, e);
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Compare-and-set from `processing`; a lost write-back is dropped
async fn write_back(items: &dyn WorkItemRepository, item_id: Uuid, update: ItemUpdate) -> Result<()> {
    let applied = items
        .compare_and_set(item_id, ItemStatus::Processing, update)
        .await?;

    if !applied {
        warn!(
            "Dropped write-back for item {}: no longer processing",
            item_id
        );
    }

    Ok(())
}

/// Re-reads the item and fails it with a record naming `owner`
async fn mark_failed(
    items: &dyn WorkItemRepository,
    item_id: Uuid,
    owner: &str,
    message: String,
) -> Result<()> {
    let current = items.get(item_id).await?;
    if current.status != ItemStatus::Processing {
        debug!(
            "Item {} is already {}, not marking failed",
            item_id, current.status
        );
        return Ok(());
    }

    let failure = FailureRecord::worker_crash(message, Some(owner.to_string()));
    write_back(items, item_id, ItemUpdate::finish(ItemResult::from_failure(failure))).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::{InMemoryItemRepository, InMemoryTemplateRepository};
    use crate::service::{PipelineProcessor, Processor};
    use async_trait::async_trait;
    use conveyor_core::domain::batch::{BatchType, build_work_items};
    use conveyor_core::domain::result::{ErrorKind, ExecutionResult, collect_results};
    use conveyor_core::domain::template::{PipelineTemplate, ProcessingStep};
    use conveyor_engine::{
        EngineConfig, PipelineEngine, ServiceClient, ServiceRegistry, ServiceResponse,
        TransportError,
    };
    use serde_json::{Map, Value as JsonValue, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    const CAPABILITY: &str = "analysis";

    fn config() -> Config {
        let mut config = Config::new("worker-1".to_string(), "http://localhost:8080".to_string());
        config.capability = CAPABILITY.to_string();
        config.poll_min_interval = Duration::from_millis(100);
        config.poll_max_interval = Duration::from_millis(800);
        config.shutdown_grace = Duration::from_secs(1);
        config
    }

    fn users(count: usize) -> Vec<JsonValue> {
        (1..=count).map(|n| json!({"id": format!("u{}", n)})).collect()
    }

    fn individual(capability: &str, count: usize) -> Vec<WorkItem> {
        build_work_items(
            Uuid::new_v4(),
            BatchType::INDIVIDUAL_USERS,
            Uuid::new_v4(),
            capability,
            users(count),
        )
        .unwrap()
    }

    /// Echoes every element back as a success, optionally after a delay
    struct Echo {
        delay: Duration,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Echo {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Processor for Echo {
        async fn process(&self, item: &WorkItem) -> Result<ItemResult> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            time::sleep(self.delay).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            Ok(ItemResult::from_results(
                item.elements()
                    .into_iter()
                    .map(|e| ExecutionResult::success(e.id, e.payload))
                    .collect(),
            ))
        }
    }

    struct Crashing;

    #[async_trait]
    impl Processor for Crashing {
        async fn process(&self, _item: &WorkItem) -> Result<ItemResult> {
            Err(anyhow!("template service unavailable"))
        }
    }

    struct Panicking;

    #[async_trait]
    impl Processor for Panicking {
        async fn process(&self, _item: &WorkItem) -> Result<ItemResult> {
            panic!("engine bug")
        }
    }

    /// Moves the item to failed behind the worker's back
    struct Interfering {
        items: Arc<InMemoryItemRepository>,
    }

    #[async_trait]
    impl Processor for Interfering {
        async fn process(&self, item: &WorkItem) -> Result<ItemResult> {
            let failure = FailureRecord::worker_crash("reclaimed", None);
            self.items
                .compare_and_set(
                    item.id,
                    ItemStatus::Processing,
                    ItemUpdate::finish(ItemResult::from_failure(failure)),
                )
                .await?;
            Ok(ItemResult::from_results(vec![ExecutionResult::success(
                "late",
                Map::new(),
            )]))
        }
    }

    struct Scoring;

    #[async_trait]
    impl ServiceClient for Scoring {
        async fn invoke(
            &self,
            _base_address: &str,
            operation: &str,
            body: &JsonValue,
        ) -> std::result::Result<ServiceResponse, TransportError> {
            match (operation, body.get("id")) {
                ("write", Some(id)) if id == "u3" => {
                    Ok(ServiceResponse::new(422, json!({"error": "no consent"})))
                }
                ("score", _) => Ok(ServiceResponse::ok(json!({"score": 3}))),
                _ => Ok(ServiceResponse::ok(json!({"written": true}))),
            }
        }
    }

    fn registry_with(processor: Arc<dyn Processor>) -> Arc<ProcessorRegistry> {
        Arc::new(ProcessorRegistry::new().with_processor(CAPABILITY, processor))
    }

    /// Runs the poller until `done` holds for the store, then shuts it down
    async fn run_until(
        poller: ItemPoller,
        repo: &InMemoryItemRepository,
        done: impl Fn(&[WorkItem]) -> bool,
    ) {
        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            poller
                .run(async {
                    let _ = stopped.await;
                })
                .await
        });

        for _ in 0..200 {
            if done(&repo.all()) {
                break;
            }
            time::sleep(Duration::from_millis(50)).await;
        }

        let _ = stop.send(());
        handle.await.unwrap().unwrap();
    }

    fn all_terminal(items: &[WorkItem]) -> bool {
        items.iter().all(|i| i.status.is_terminal())
    }

    #[tokio::test(start_paused = true)]
    async fn test_claims_and_completes_matching_items_only() {
        let mut items = individual(CAPABILITY, 3);
        let other = individual("generation", 1);
        items.extend(other.clone());

        let repo = Arc::new(InMemoryItemRepository::with_items(items));
        let poller = ItemPoller::new(config(), repo.clone(), registry_with(Echo::new(Duration::ZERO)));

        run_until(poller, &repo, |items| {
            items
                .iter()
                .filter(|i| i.capability == CAPABILITY)
                .all(|i| i.status == ItemStatus::Completed)
        })
        .await;

        for item in repo.all() {
            if item.capability == CAPABILITY {
                assert_eq!(item.status, ItemStatus::Completed);
                assert_eq!(item.owner, None);
                assert!(item.claimed_at.is_some());
                assert!(item.completed_at.is_some());
                assert_eq!(item.result.unwrap().results.len(), 1);
            } else {
                assert_eq!(item.status, ItemStatus::Pending);
                assert_eq!(item.owner, None);
            }
        }
        assert_eq!(repo.snapshot(other[0].id).status, ItemStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_processor_error_marks_item_failed() {
        let items = individual(CAPABILITY, 1);
        let id = items[0].id;
        let repo = Arc::new(InMemoryItemRepository::with_items(items));
        let poller = ItemPoller::new(config(), repo.clone(), registry_with(Arc::new(Crashing)));

        run_until(poller, &repo, all_terminal).await;

        let item = repo.snapshot(id);
        assert_eq!(item.status, ItemStatus::Failed);
        let failure = item.result.unwrap().failure.unwrap();
        assert_eq!(failure.kind, ErrorKind::WorkerCrash);
        assert_eq!(failure.owner.as_deref(), Some("worker-1"));
        assert!(failure.message.contains("template service unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_processor_panic_marks_item_failed() {
        let items = individual(CAPABILITY, 2);
        let repo = Arc::new(InMemoryItemRepository::with_items(items));
        let poller = ItemPoller::new(config(), repo.clone(), registry_with(Arc::new(Panicking)));

        run_until(poller, &repo, all_terminal).await;

        for item in repo.all() {
            assert_eq!(item.status, ItemStatus::Failed);
            assert_eq!(item.owner, None);
            let failure = item.result.unwrap().failure.unwrap();
            assert_eq!(failure.kind, ErrorKind::WorkerCrash);
            assert_eq!(failure.owner.as_deref(), Some("worker-1"));
            assert!(failure.message.contains("engine bug"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_items_are_bounded() {
        let repo = Arc::new(InMemoryItemRepository::with_items(individual(CAPABILITY, 7)));
        let echo = Echo::new(Duration::from_millis(300));

        let mut config = config();
        config.max_concurrent_items = 2;
        let poller = ItemPoller::new(config, repo.clone(), registry_with(echo.clone()));

        run_until(poller, &repo, all_terminal).await;

        assert!(repo.all().iter().all(|i| i.status == ItemStatus::Completed));
        assert_eq!(echo.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_fails_items_still_running_after_grace() {
        let items = individual(CAPABILITY, 1);
        let id = items[0].id;
        let repo = Arc::new(InMemoryItemRepository::with_items(items));
        let poller = ItemPoller::new(
            config(),
            repo.clone(),
            registry_with(Echo::new(Duration::from_secs(3600))),
        );

        run_until(poller, &repo, |items| {
            items.iter().all(|i| i.status == ItemStatus::Processing)
        })
        .await;

        let item = repo.snapshot(id);
        assert_eq!(item.status, ItemStatus::Failed);
        let failure = item.result.unwrap().failure.unwrap();
        assert!(failure.message.contains("shut down"));
        assert_eq!(failure.owner.as_deref(), Some("worker-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_lets_items_finish_within_grace() {
        let items = individual(CAPABILITY, 1);
        let id = items[0].id;
        let repo = Arc::new(InMemoryItemRepository::with_items(items));
        let poller = ItemPoller::new(
            config(),
            repo.clone(),
            registry_with(Echo::new(Duration::from_millis(500))),
        );

        run_until(poller, &repo, |items| {
            items.iter().all(|i| i.status == ItemStatus::Processing)
        })
        .await;

        assert_eq!(repo.snapshot(id).status, ItemStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_write_back_is_dropped() {
        let items = individual(CAPABILITY, 1);
        let id = items[0].id;
        let repo = Arc::new(InMemoryItemRepository::with_items(items));
        let processor = Arc::new(Interfering { items: repo.clone() });
        let poller = ItemPoller::new(config(), repo.clone(), registry_with(processor));

        run_until(poller, &repo, all_terminal).await;

        let result = repo.snapshot(id).result.unwrap();
        assert!(result.results.is_empty());
        assert_eq!(result.failure.unwrap().message, "reclaimed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_requires_processor_for_capability() {
        let repo = Arc::new(InMemoryItemRepository::default());
        let poller = ItemPoller::new(config(), repo, Arc::new(ProcessorRegistry::new()));
        assert!(poller.run(std::future::pending()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_of_five_users_with_one_failing_step() {
        let template = PipelineTemplate {
            id: Uuid::new_v4(),
            name: "user-outreach".to_string(),
            version: 1,
            steps: vec![
                ProcessingStep::new("analysis", "score"),
                ProcessingStep::new("generation", "write"),
            ],
            created_at: chrono::Utc::now(),
        };
        let items = build_work_items(
            Uuid::new_v4(),
            BatchType::BATCH_USERS,
            template.id,
            CAPABILITY,
            users(5),
        )
        .unwrap();
        assert_eq!(items.len(), 1);

        let services = ServiceRegistry::new()
            .with_service("analysis", "http://analysis.local")
            .and_then(|r| r.with_service("generation", "http://generation.local"))
            .unwrap();
        let engine = Arc::new(PipelineEngine::new(
            Arc::new(services),
            Arc::new(Scoring),
            EngineConfig::default(),
        ));
        let templates = Arc::new(InMemoryTemplateRepository::with_template(template));
        let processor = Arc::new(PipelineProcessor::new(templates, engine));

        let repo = Arc::new(InMemoryItemRepository::with_items(items));
        let poller = ItemPoller::new(config(), repo.clone(), registry_with(processor));

        run_until(poller, &repo, all_terminal).await;

        let stored = repo.all();
        // Mixed outcomes still complete the item
        assert_eq!(stored[0].status, ItemStatus::Completed);

        let results = collect_results(&stored);
        assert_eq!(results.len(), 5);
        assert_eq!(results.iter().filter(|r| r.is_success()).count(), 4);
        assert_eq!(results[2].item_id, "u3");
        assert_eq!(
            results[2].error.as_ref().map(|e| e.kind),
            Some(ErrorKind::ProcessingError)
        );
    }
}
