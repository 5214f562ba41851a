//! Bulk load primitives built from [`LoadTask`].

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use super::load_task::LoadTask;
use crate::abort::AbortSignal;
use crate::coordinator::{LoadCoordinator, LoadOptions};
use crate::resource::{ResourceHandle, ResourceKind};

/// One entry of a bulk load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadItem {
    pub kind: ResourceKind,
    pub options: LoadOptions,
}

impl LoadItem {
    pub fn new(kind: ResourceKind, options: impl Into<LoadOptions>) -> Self {
        Self {
            kind,
            options: options.into(),
        }
    }

    fn task(self) -> LoadTask {
        LoadTask::new(self.kind, self.options)
    }
}

/// Reported after every finished item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadProgress {
    pub finished: usize,
    pub total: usize,
    pub locator: String,
    pub success: bool,
}

/// Per-item results, aligned with the input order.
pub type LoadResults = Vec<Option<ResourceHandle>>;

/// Handle of a background bulk load.
///
/// Dropping the handle does not stop the load.
pub struct LoadHandle {
    signal: AbortSignal,
    join: JoinHandle<bool>,
}

impl LoadHandle {
    /// Stop scheduling new items and suppress completion. Items already in
    /// flight run to the end of their fetch.
    pub fn abort(&self) -> bool {
        self.signal.abort()
    }

    pub fn is_aborted(&self) -> bool {
        self.signal.is_aborted()
    }

    /// Signal shared with every task the driver spawns.
    pub fn abort_signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Wait for the driver to stop. Returns `true` if the load completed
    /// without being aborted.
    pub async fn wait(self) -> bool {
        match self.join.await {
            Ok(completed) => completed,
            Err(e) => {
                warn!("Load driver failed: {}", e);
                false
            }
        }
    }
}

/// Runs bulk loads against a shared coordinator.
#[derive(Clone)]
pub struct LoadOrchestrator {
    coordinator: Arc<LoadCoordinator>,
}

impl LoadOrchestrator {
    /// Create an orchestrator over an existing coordinator.
    pub fn new(coordinator: Arc<LoadCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<LoadCoordinator> {
        &self.coordinator
    }

    /// Load items one after another, reporting progress in item order.
    ///
    /// A failed item does not stop the rest. Not cancellable.
    pub async fn load_many(
        &self,
        items: Vec<LoadItem>,
        mut on_progress: impl FnMut(&LoadProgress),
    ) -> LoadResults {
        let total = items.len();
        let mut results = Vec::with_capacity(total);

        for (index, item) in items.into_iter().enumerate() {
            let locator = item.options.locator.clone();
            let resource = item.task().load(&self.coordinator).await.into_resource();
            on_progress(&LoadProgress {
                finished: index + 1,
                total,
                locator,
                success: resource.is_some(),
            });
            results.push(resource);
        }

        results
    }

    /// Load every item concurrently and wait for all of them. No ordering,
    /// no progress, not cancellable.
    pub async fn load_batch(&self, items: Vec<LoadItem>) -> LoadResults {
        let coordinator = &self.coordinator;
        join_all(
            items
                .into_iter()
                .map(|item| async move { item.task().load(coordinator).await.into_resource() }),
        )
        .await
    }

    /// Load items one at a time in the background.
    ///
    /// Aborting stops before the next item, suppresses the in-flight item's
    /// progress report, and `on_complete` never fires.
    pub fn load_sequence(
        &self,
        items: Vec<LoadItem>,
        mut on_progress: impl FnMut(&LoadProgress) + Send + 'static,
        on_complete: impl FnOnce(LoadResults) + Send + 'static,
    ) -> LoadHandle {
        let signal = AbortSignal::new();
        let driver_signal = signal.clone();
        let coordinator = self.coordinator.clone();

        let join = tokio::spawn(async move {
            let total = items.len();
            let mut results = Vec::with_capacity(total);

            for (index, item) in items.into_iter().enumerate() {
                if driver_signal.is_aborted() {
                    debug!("Sequence aborted before item {}/{}", index + 1, total);
                    return false;
                }

                let locator = item.options.locator.clone();
                let outcome = item
                    .task()
                    .with_parent(driver_signal.clone())
                    .load(&coordinator)
                    .await;
                if outcome.is_aborted() {
                    debug!("Sequence aborted during item {}/{}", index + 1, total);
                    return false;
                }

                let resource = outcome.into_resource();
                on_progress(&LoadProgress {
                    finished: index + 1,
                    total,
                    locator,
                    success: resource.is_some(),
                });
                results.push(resource);
            }

            if driver_signal.is_aborted() {
                return false;
            }
            info!("Sequence of {} item(s) complete", total);
            on_complete(results);
            true
        });

        LoadHandle { signal, join }
    }

    /// Load items concurrently in the background.
    ///
    /// `concurrency == 0` starts everything at once. Otherwise at most
    /// `concurrency` items are in flight and every finished item starts the
    /// next pending one. Progress arrives in completion order. Aborting stops
    /// scheduling, detaches in-flight items and suppresses `on_complete`.
    pub fn load_parallel(
        &self,
        items: Vec<LoadItem>,
        mut on_progress: impl FnMut(&LoadProgress) + Send + 'static,
        on_complete: impl FnOnce(LoadResults) + Send + 'static,
        concurrency: usize,
    ) -> LoadHandle {
        let signal = AbortSignal::new();
        let driver_signal = signal.clone();
        let coordinator = self.coordinator.clone();

        let join = tokio::spawn(async move {
            let total = items.len();
            let limit = if concurrency == 0 { total } else { concurrency };
            let mut results: LoadResults = vec![None; total];
            let mut pending = items.into_iter().enumerate();
            let mut in_flight = JoinSet::new();
            let mut finished = 0;

            loop {
                while in_flight.len() < limit && !driver_signal.is_aborted() {
                    let Some((index, item)) = pending.next() else {
                        break;
                    };
                    let locator = item.options.locator.clone();
                    let task = item.task().with_parent(driver_signal.clone());
                    let coordinator = coordinator.clone();
                    in_flight.spawn(async move {
                        let outcome = task.load(&coordinator).await;
                        (index, locator, outcome)
                    });
                }

                if in_flight.is_empty() {
                    break;
                }

                tokio::select! {
                    _ = driver_signal.aborted() => {
                        debug!(
                            "Parallel load aborted with {} item(s) in flight",
                            in_flight.len()
                        );
                        in_flight.detach_all();
                        return false;
                    }
                    joined = in_flight.join_next() => {
                        let Some(joined) = joined else { break };
                        finished += 1;
                        match joined {
                            Ok((index, locator, outcome)) => {
                                if outcome.is_aborted() {
                                    continue;
                                }
                                let resource = outcome.into_resource();
                                on_progress(&LoadProgress {
                                    finished,
                                    total,
                                    locator,
                                    success: resource.is_some(),
                                });
                                results[index] = resource;
                            }
                            Err(e) => warn!("Load task failed to run: {}", e),
                        }
                    }
                }
            }

            if driver_signal.is_aborted() {
                return false;
            }
            info!("Parallel load of {} item(s) complete", total);
            on_complete(results);
            true
        });

        LoadHandle { signal, join }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixture;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    fn textures(names: &[&str]) -> Vec<LoadItem> {
        names
            .iter()
            .map(|name| LoadItem::new(ResourceKind::Texture, format!("l:{name}")))
            .collect()
    }

    fn recorder() -> (Arc<Mutex<Vec<LoadProgress>>>, impl FnMut(&LoadProgress) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |p: &LoadProgress| sink.lock().unwrap().push(p.clone()))
    }

    #[tokio::test]
    async fn test_load_many_reports_in_order_and_tolerates_failure() {
        let fx = fixture();
        fx.local.fail("b");
        let orchestrator = LoadOrchestrator::new(fx.coordinator.clone());
        let mut seen = Vec::new();

        let results = orchestrator
            .load_many(textures(&["a", "b", "c"]), |p| seen.push(p.clone()))
            .await;

        assert_eq!(results.iter().map(Option::is_some).collect::<Vec<_>>(), vec![true, false, true]);
        assert_eq!(seen.iter().map(|p| p.finished).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(seen[1].locator, "l:b");
        assert!(!seen[1].success);
        assert!(seen.iter().all(|p| p.total == 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_batch_is_concurrent() {
        let fx = fixture();
        for name in ["a", "b", "c"] {
            fx.local.delay(name, 50);
        }
        let orchestrator = LoadOrchestrator::new(fx.coordinator.clone());

        let results = orchestrator.load_batch(textures(&["a", "b", "c"])).await;

        assert!(results.iter().all(Option::is_some));
        assert_eq!(fx.local.max_in_flight(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequence_order_despite_reversed_latency() {
        let fx = fixture();
        fx.local.delay("a", 30);
        fx.local.delay("b", 20);
        fx.local.delay("c", 10);
        let orchestrator = LoadOrchestrator::new(fx.coordinator.clone());
        let (seen, on_progress) = recorder();
        let completed = Arc::new(Mutex::new(None));
        let sink = completed.clone();

        let handle = orchestrator.load_sequence(textures(&["a", "b", "c"]), on_progress, move |r| {
            *sink.lock().unwrap() = Some(r.len())
        });
        assert!(handle.wait().await);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.iter().map(|p| p.finished).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(
            seen.iter().map(|p| p.locator.as_str()).collect::<Vec<_>>(),
            vec!["l:a", "l:b", "l:c"]
        );
        assert_eq!(*completed.lock().unwrap(), Some(3));
        assert_eq!(fx.local.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_sequence_abort_between_items() {
        let fx = fixture();
        let orchestrator = LoadOrchestrator::new(fx.coordinator.clone());
        let slot: Arc<Mutex<Option<AbortSignal>>> = Arc::default();
        let abort_slot = slot.clone();
        let completed = Arc::new(AtomicBool::new(false));
        let flag = completed.clone();

        let handle = orchestrator.load_sequence(
            textures(&["a", "b", "c"]),
            move |p| {
                if p.finished == 1 {
                    abort_slot.lock().unwrap().as_ref().unwrap().abort();
                }
            },
            move |_| flag.store(true, Ordering::SeqCst),
        );
        // The driver cannot run before this test task yields.
        *slot.lock().unwrap() = Some(handle.abort_signal());

        assert!(!handle.wait().await);
        assert!(!completed.load(Ordering::SeqCst));
        assert_eq!(fx.local.calls(), vec!["a".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequence_abort_in_flight() {
        let fx = fixture();
        fx.local.delay("a", 100);
        let orchestrator = LoadOrchestrator::new(fx.coordinator.clone());
        let (seen, on_progress) = recorder();

        let handle = orchestrator.load_sequence(textures(&["a", "b"]), on_progress, |_| {
            panic!("completion must not fire after abort")
        });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(handle.abort());
        assert!(handle.is_aborted());

        assert!(!handle.wait().await);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(fx.local.calls(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_sequence_completes() {
        let fx = fixture();
        let orchestrator = LoadOrchestrator::new(fx.coordinator.clone());
        let completed = Arc::new(AtomicBool::new(false));
        let flag = completed.clone();

        let handle = orchestrator.load_sequence(Vec::new(), |_| {}, move |r| {
            assert!(r.is_empty());
            flag.store(true, Ordering::SeqCst);
        });
        assert!(handle.wait().await);
        assert!(completed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_respects_concurrency() {
        let fx = fixture();
        let names = ["a", "b", "c", "d", "e", "f", "g"];
        for (i, name) in names.iter().enumerate() {
            fx.local.delay(name, 10 + (i as u64 * 7) % 30);
        }
        let orchestrator = LoadOrchestrator::new(fx.coordinator.clone());
        let (seen, on_progress) = recorder();
        let results = Arc::new(Mutex::new(None));
        let sink = results.clone();

        let handle = orchestrator.load_parallel(
            textures(&names),
            on_progress,
            move |r| *sink.lock().unwrap() = Some(r),
            2,
        );
        assert!(handle.wait().await);

        assert_eq!(fx.local.max_in_flight(), 2);
        assert_eq!(fx.local.calls().len(), names.len());
        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.iter().map(|p| p.finished).collect::<Vec<_>>(),
            (1..=names.len()).collect::<Vec<_>>()
        );
        let results = results.lock().unwrap().take().unwrap();
        assert_eq!(results.len(), names.len());
        assert!(results.iter().all(Option::is_some));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_unbounded_starts_everything() {
        let fx = fixture();
        for name in ["a", "b", "c", "d"] {
            fx.local.delay(name, 20);
        }
        let orchestrator = LoadOrchestrator::new(fx.coordinator.clone());

        let handle = orchestrator.load_parallel(textures(&["a", "b", "c", "d"]), |_| {}, |_| {}, 0);
        assert!(handle.wait().await);
        assert_eq!(fx.local.max_in_flight(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_results_are_index_aligned() {
        let fx = fixture();
        fx.local.delay("slow", 50);
        fx.local.fail("bad");
        let orchestrator = LoadOrchestrator::new(fx.coordinator.clone());
        let results = Arc::new(Mutex::new(None));
        let sink = results.clone();

        let handle = orchestrator.load_parallel(
            textures(&["slow", "bad", "fast"]),
            |_| {},
            move |r| *sink.lock().unwrap() = Some(r),
            0,
        );
        assert!(handle.wait().await);

        let results = results.lock().unwrap().take().unwrap();
        assert_eq!(
            results.iter().map(Option::is_some).collect::<Vec<_>>(),
            vec![true, false, true]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_abort_stops_scheduling() {
        let fx = fixture();
        for name in ["a", "b", "c", "d"] {
            fx.local.delay(name, 100);
        }
        let orchestrator = LoadOrchestrator::new(fx.coordinator.clone());
        let completed = Arc::new(AtomicBool::new(false));
        let flag = completed.clone();

        let handle = orchestrator.load_parallel(
            textures(&["a", "b", "c", "d"]),
            |_| {},
            move |_| flag.store(true, Ordering::SeqCst),
            2,
        );
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        handle.abort();
        assert!(!handle.wait().await);

        // Let the detached fetches land.
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert!(!completed.load(Ordering::SeqCst));
        let mut calls = fx.local.calls();
        calls.sort();
        assert_eq!(calls, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(fx.cache.len(), 2);
    }
}
