//! A single cancellable load.

use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::abort::AbortSignal;
use crate::coordinator::{LoadCoordinator, LoadOptions};
use crate::error::AssetError;
use crate::resource::{ResourceHandle, ResourceKind};

/// Lifecycle of a [`LoadTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Loading,
    Completed,
    Aborted,
}

/// Why a task did not produce a resource.
#[derive(Debug)]
pub enum LoadFailure {
    Error(AssetError),
    Aborted,
}

impl fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadFailure::Error(e) => write!(f, "{}", e),
            LoadFailure::Aborted => write!(f, "aborted"),
        }
    }
}

/// Result of [`LoadTask::load`].
#[derive(Clone)]
pub enum TaskOutcome {
    Loaded(ResourceHandle),
    Failed,
    Aborted,
}

impl TaskOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, TaskOutcome::Loaded(_))
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, TaskOutcome::Aborted)
    }

    /// The loaded resource, `None` for failed or aborted tasks.
    pub fn into_resource(self) -> Option<ResourceHandle> {
        match self {
            TaskOutcome::Loaded(resource) => Some(resource),
            _ => None,
        }
    }
}

impl fmt::Debug for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Loaded(resource) => write!(f, "Loaded({})", resource.kind()),
            TaskOutcome::Failed => write!(f, "Failed"),
            TaskOutcome::Aborted => write!(f, "Aborted"),
        }
    }
}

/// Abort handle of a task, usable while the task itself is being awaited.
#[derive(Debug, Clone)]
pub struct TaskControl {
    state: Arc<Mutex<TaskState>>,
    signal: AbortSignal,
    parent: Option<AbortSignal>,
}

impl TaskControl {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TaskState::Idle)),
            signal: AbortSignal::new(),
            parent: None,
        }
    }

    /// Current lifecycle state of the task.
    pub fn state(&self) -> TaskState {
        *self.state.lock().expect("task state lock poisoned")
    }

    /// Abort the task. No-op once it completed.
    ///
    /// An in-flight fetch keeps running and may still populate the cache;
    /// only the task's own result handling is suppressed.
    pub fn abort(&self) -> bool {
        let mut state = self.state.lock().expect("task state lock poisoned");
        match *state {
            TaskState::Completed | TaskState::Aborted => false,
            TaskState::Idle | TaskState::Loading => {
                *state = TaskState::Aborted;
                self.signal.abort();
                true
            }
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.state() == TaskState::Aborted || self.abort_requested()
    }

    fn abort_requested(&self) -> bool {
        self.signal.is_aborted() || self.parent.as_ref().is_some_and(AbortSignal::is_aborted)
    }

    /// Move to `next` unless an abort got there first. Returns the state
    /// actually reached.
    fn advance(&self, next: TaskState) -> TaskState {
        let mut state = self.state.lock().expect("task state lock poisoned");
        if *state == TaskState::Aborted || self.abort_requested() {
            *state = TaskState::Aborted;
        } else {
            *state = next;
        }
        *state
    }
}

type CompleteCallback = Box<dyn FnOnce(Option<&ResourceHandle>) + Send>;
type SuccessCallback = Box<dyn FnOnce(&ResourceHandle) + Send>;
type FailCallback = Box<dyn FnOnce(&LoadFailure) + Send>;

/// One load wrapped with callbacks and abort support.
///
/// `on_complete` always fires first, then exactly one of `on_success` or
/// `on_fail`. An aborted task never fires `on_success`: it reports
/// [`LoadFailure::Aborted`] instead, even if the fetch itself succeeded.
pub struct LoadTask {
    kind: ResourceKind,
    options: LoadOptions,
    control: TaskControl,
    on_complete: Option<CompleteCallback>,
    on_success: Option<SuccessCallback>,
    on_fail: Option<FailCallback>,
}

impl LoadTask {
    /// A pending task; nothing is fetched until it is run.
    pub fn new(kind: ResourceKind, options: impl Into<LoadOptions>) -> Self {
        Self {
            kind,
            options: options.into(),
            control: TaskControl::new(),
            on_complete: None,
            on_success: None,
            on_fail: None,
        }
    }

    /// Also treat the task as aborted once `signal` fires.
    pub fn with_parent(mut self, signal: AbortSignal) -> Self {
        self.control.parent = Some(signal);
        self
    }

    /// Called once the task settles, with the resource if it loaded.
    pub fn on_complete(mut self, f: impl FnOnce(Option<&ResourceHandle>) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Called after `on_complete` when the resource loaded.
    pub fn on_success(mut self, f: impl FnOnce(&ResourceHandle) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    /// Called after `on_complete` when the load failed or was aborted.
    pub fn on_fail(mut self, f: impl FnOnce(&LoadFailure) + Send + 'static) -> Self {
        self.on_fail = Some(Box::new(f));
        self
    }

    /// Kind of resource this task produces.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Locator and TTL the task was created with.
    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// A cloneable handle for aborting the task from elsewhere.
    pub fn control(&self) -> TaskControl {
        self.control.clone()
    }

    /// Shorthand for `control().state()`.
    pub fn state(&self) -> TaskState {
        self.control.state()
    }

    /// Run the task to completion. A task can only run once.
    pub async fn load(mut self, coordinator: &LoadCoordinator) -> TaskOutcome {
        if self.control.advance(TaskState::Loading) == TaskState::Aborted {
            debug!("Task for {} aborted before start", self.options.locator);
            self.finish(None, Err(LoadFailure::Aborted));
            return TaskOutcome::Aborted;
        }

        let result = coordinator
            .try_load(self.kind, self.options.clone())
            .await
            .map_err(LoadFailure::Error);

        if self.control.advance(TaskState::Completed) == TaskState::Aborted {
            debug!("Task for {} aborted in flight", self.options.locator);
            let resource = result.ok();
            self.finish(resource.as_ref(), Err(LoadFailure::Aborted));
            return TaskOutcome::Aborted;
        }

        match result {
            Ok(resource) => {
                self.finish(Some(&resource), Ok(&resource));
                TaskOutcome::Loaded(resource)
            }
            Err(failure) => {
                self.finish(None, Err(failure));
                TaskOutcome::Failed
            }
        }
    }

    fn finish(
        &mut self,
        produced: Option<&ResourceHandle>,
        result: std::result::Result<&ResourceHandle, LoadFailure>,
    ) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(produced);
        }
        match result {
            Ok(resource) => {
                if let Some(on_success) = self.on_success.take() {
                    on_success(resource);
                }
            }
            Err(failure) => {
                if let LoadFailure::Error(e) = &failure {
                    debug!("Task for {} failed: {}", self.options.locator, e);
                }
                if let Some(on_fail) = self.on_fail.take() {
                    on_fail(&failure);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixture;
    use std::sync::atomic::{AtomicBool, Ordering};

    type Log = Arc<Mutex<Vec<String>>>;

    fn logged(kind: ResourceKind, locator: &str, log: &Log) -> LoadTask {
        let (c, s, f) = (log.clone(), log.clone(), log.clone());
        LoadTask::new(kind, locator)
            .on_complete(move |r| c.lock().unwrap().push(format!("complete:{}", r.is_some())))
            .on_success(move |_| s.lock().unwrap().push("success".into()))
            .on_fail(move |e| f.lock().unwrap().push(format!("fail:{}", e)))
    }

    #[tokio::test]
    async fn test_success_callbacks() {
        let fx = fixture();
        let log: Log = Arc::default();

        let task = logged(ResourceKind::Texture, "l:hero", &log);
        let control = task.control();
        let outcome = task.load(&fx.coordinator).await;

        assert!(outcome.is_loaded());
        assert_eq!(control.state(), TaskState::Completed);
        assert_eq!(*log.lock().unwrap(), vec!["complete:true", "success"]);
        assert!(!control.abort());
    }

    #[tokio::test]
    async fn test_failure_callbacks() {
        let fx = fixture();
        fx.local.fail("missing");
        let log: Log = Arc::default();

        let outcome = logged(ResourceKind::Texture, "l:missing", &log)
            .load(&fx.coordinator)
            .await;

        assert!(matches!(outcome, TaskOutcome::Failed));
        let log = log.lock().unwrap();
        assert_eq!(log[0], "complete:false");
        assert!(log[1].starts_with("fail:Resource not found"));
    }

    #[tokio::test]
    async fn test_abort_before_start_skips_coordinator() {
        let fx = fixture();
        let log: Log = Arc::default();

        let task = logged(ResourceKind::Texture, "l:hero", &log);
        assert!(task.control().abort());
        let outcome = task.load(&fx.coordinator).await;

        assert!(outcome.is_aborted());
        assert!(fx.local.calls().is_empty());
        assert_eq!(*log.lock().unwrap(), vec!["complete:false", "fail:aborted"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_in_flight_suppresses_success() {
        let fx = fixture();
        fx.local.delay("hero", 100);
        let succeeded = Arc::new(AtomicBool::new(false));
        let flag = succeeded.clone();

        let task = LoadTask::new(ResourceKind::Texture, "l:hero")
            .on_success(move |_| flag.store(true, Ordering::SeqCst));
        let control = task.control();

        let coordinator = fx.coordinator.clone();
        let running = tokio::spawn(async move { task.load(&coordinator).await });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(control.state(), TaskState::Loading);
        assert!(control.abort());

        let outcome = running.await.unwrap();
        assert!(outcome.is_aborted());
        assert!(!succeeded.load(Ordering::SeqCst));
        // The fetch was not preempted.
        assert_eq!(fx.cache.len(), 1);
    }

    #[tokio::test]
    async fn test_parent_signal_aborts() {
        let fx = fixture();
        let parent = AbortSignal::new();
        let task = LoadTask::new(ResourceKind::Text, "l:intro").with_parent(parent.clone());
        let control = task.control();

        parent.abort();
        assert!(control.is_aborted());
        assert!(task.load(&fx.coordinator).await.is_aborted());
        assert_eq!(control.state(), TaskState::Aborted);
    }
}
