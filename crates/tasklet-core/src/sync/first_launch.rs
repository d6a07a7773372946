//! First-launch import orchestration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use thiserror::Error;
use tokio::task::AbortHandle;

use super::{
    FetchError, FlagCommit, ImportMode, LaunchFlag, RemoteTodoList, SyncOptions, SyncPhase,
    TodoSource,
};
use crate::models::Task;
use crate::services::TaskService;

/// UI collaborator notified about import progress.
///
/// Loader calls are always paired, and an error is only shown after the
/// loader has been hidden.
pub trait Presenter: Send + Sync {
    fn show_loader(&self);
    fn hide_loader(&self);
    fn show_error(&self, retry: RetryAction);
}

/// Handed to [`Presenter::show_error`]; re-issues the fetch when invoked.
///
/// Only a weak reference is kept, so a presenter holding on to the action
/// does not keep its orchestrator alive.
pub struct RetryAction {
    sync: Weak<FirstLaunchSync>,
}

impl RetryAction {
    /// Run another attempt; the launch flag is neither read nor written again.
    ///
    /// Returns [`SyncPhase::Failed`] when the orchestrator is gone.
    pub async fn retry(self) -> SyncPhase {
        match self.sync.upgrade() {
            Some(sync) => sync.retry().await,
            None => {
                tracing::debug!("Ignoring retry for a dropped first-launch sync");
                SyncPhase::Failed
            }
        }
    }
}

impl std::fmt::Debug for RetryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryAction")
            .field("phase", &self.sync.upgrade().map(|sync| sync.phase()))
            .finish()
    }
}

#[derive(Debug, Error)]
enum AttemptError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("import failed: {0}")]
    Import(#[from] crate::Error),
    #[error("worker task failed: {0}")]
    Worker(String),
}

/// Runs the one-time remote import.
pub struct FirstLaunchSync {
    service: TaskService,
    source: Arc<dyn TodoSource>,
    presenter: Arc<dyn Presenter>,
    flag: Arc<dyn LaunchFlag>,
    options: SyncOptions,
    checked: AtomicBool,
    phase: Mutex<SyncPhase>,
    in_flight: Mutex<Option<AbortHandle>>,
}

impl FirstLaunchSync {
    pub fn new(
        service: TaskService,
        source: Arc<dyn TodoSource>,
        presenter: Arc<dyn Presenter>,
        flag: Arc<dyn LaunchFlag>,
    ) -> Self {
        Self {
            service,
            source,
            presenter,
            flag,
            options: SyncOptions::default(),
            checked: AtomicBool::new(false),
            phase: Mutex::new(SyncPhase::NotStarted),
            in_flight: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Current phase
    pub fn phase(&self) -> SyncPhase {
        *lock(&self.phase)
    }

    fn set_phase(&self, phase: SyncPhase) {
        *lock(&self.phase) = phase;
    }

    /// Import the remote list if this installation never did.
    ///
    /// Only the first successful call per instance does anything; later calls
    /// return the current phase. A flag read or write error is returned and
    /// leaves the instance ready for another call. With
    /// [`FlagCommit::BeforeFetch`] the flag is written before the fetch starts,
    /// so an interrupted import is never retried on a later launch.
    pub async fn check_first_launch(self: &Arc<Self>) -> crate::Result<SyncPhase> {
        if self.checked.swap(true, Ordering::SeqCst) {
            return Ok(self.phase());
        }

        match self.claim_launch().await {
            Ok(true) => {
                tracing::info!("First launch: importing remote tasks");
                Ok(self.attempt().await)
            }
            Ok(false) => {
                tracing::debug!("Launch flag already set, skipping remote import");
                self.set_phase(SyncPhase::Skipped);
                Ok(SyncPhase::Skipped)
            }
            Err(error) => {
                tracing::warn!("Could not access launch flag: {}", error);
                self.checked.store(false, Ordering::SeqCst);
                Err(error)
            }
        }
    }

    /// Whether this launch should import, writing the flag early when configured.
    async fn claim_launch(&self) -> crate::Result<bool> {
        if self.flag.is_set().await? {
            return Ok(false);
        }
        if self.options.flag_commit == FlagCommit::BeforeFetch {
            self.flag.mark_set().await?;
        }
        Ok(true)
    }

    /// Re-run a failed attempt within this session.
    async fn retry(self: &Arc<Self>) -> SyncPhase {
        {
            let mut phase = lock(&self.phase);
            if *phase != SyncPhase::Failed {
                tracing::debug!("Ignoring retry while import is {:?}", *phase);
                return *phase;
            }
            *phase = SyncPhase::Loading;
        }

        tracing::info!("Retrying remote task import");
        self.attempt().await
    }

    /// Abort the in-flight fetch, if any.
    ///
    /// Nothing calls this on teardown; an abandoned fetch runs to completion.
    pub fn cancel_fetch(&self) -> bool {
        lock(&self.in_flight).take().is_some_and(|handle| {
            handle.abort();
            true
        })
    }

    async fn attempt(self: &Arc<Self>) -> SyncPhase {
        self.set_phase(SyncPhase::Loading);
        self.presenter.show_loader();

        let outcome = match self.fetch().await {
            Ok(list) => self.import(list).await,
            Err(error) => Err(error),
        };

        if outcome.is_ok() && self.options.flag_commit == FlagCommit::OnSuccess {
            if let Err(error) = self.flag.mark_set().await {
                tracing::warn!("Failed to persist launch flag: {}", error);
            }
        }

        self.presenter.hide_loader();

        match outcome {
            Ok(imported) => {
                tracing::info!("Imported {} remote task(s)", imported);
                self.set_phase(SyncPhase::Succeeded);
            }
            Err(AttemptError::Fetch(FetchError::Cancelled)) => {
                tracing::info!("Remote task fetch cancelled");
                self.set_phase(SyncPhase::Failed);
            }
            Err(error) => {
                tracing::warn!("Remote task import failed: {}", error);
                self.set_phase(SyncPhase::Failed);
                self.presenter.show_error(RetryAction {
                    sync: Arc::downgrade(self),
                });
            }
        }

        self.phase()
    }

    async fn fetch(&self) -> Result<RemoteTodoList, AttemptError> {
        let source = Arc::clone(&self.source);
        let request = tokio::spawn(async move { source.fetch().await });
        *lock(&self.in_flight) = Some(request.abort_handle());

        let result = request.await;
        lock(&self.in_flight).take();

        match result {
            Ok(fetched) => Ok(fetched?),
            Err(error) if error.is_cancelled() => Err(FetchError::Cancelled.into()),
            Err(error) => Err(AttemptError::Worker(format!("fetch task failed: {error}"))),
        }
    }

    async fn import(&self, list: RemoteTodoList) -> Result<usize, AttemptError> {
        tracing::debug!("Fetched {} remote todo(s)", list.todos.len());

        let tasks = tokio::task::spawn_blocking(move || to_tasks(list))
            .await
            .map_err(|error| AttemptError::Worker(error.to_string()))?;

        let imported = match self.options.import_mode {
            ImportMode::Atomic => self.service.import_tasks(&tasks).await?,
            ImportMode::PerRecord => {
                let mut imported = 0;
                for task in &tasks {
                    match self.service.add_task(task).await {
                        Ok(()) => imported += 1,
                        Err(error) => {
                            tracing::warn!("Skipping remote task {}: {}", task.id, error);
                        }
                    }
                }
                imported
            }
        };

        if let Err(error) = self.service.log_all().await {
            tracing::debug!("Could not dump tasks after import: {}", error);
        }
        Ok(imported)
    }
}

fn to_tasks(list: RemoteTodoList) -> Vec<Task> {
    let now = chrono::Utc::now().timestamp_millis();
    list.todos
        .into_iter()
        .map(|todo| todo.into_task(now))
        .collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{MemoryLaunchFlag, RemoteTodo, SettingsLaunchFlag};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        ShowLoader,
        HideLoader,
        ShowError,
    }

    #[derive(Default)]
    struct RecordingPresenter {
        calls: Mutex<Vec<Call>>,
        retry: Mutex<Option<RetryAction>>,
    }

    impl RecordingPresenter {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn take_retry(&self) -> RetryAction {
            self.retry.lock().unwrap().take().unwrap()
        }
    }

    impl Presenter for RecordingPresenter {
        fn show_loader(&self) {
            self.calls.lock().unwrap().push(Call::ShowLoader);
        }

        fn hide_loader(&self) {
            self.calls.lock().unwrap().push(Call::HideLoader);
        }

        fn show_error(&self, retry: RetryAction) {
            self.calls.lock().unwrap().push(Call::ShowError);
            *self.retry.lock().unwrap() = Some(retry);
        }
    }

    /// Source answering from a queue; an empty queue means success with no todos.
    #[derive(Default)]
    struct ScriptedSource {
        outcomes: Mutex<VecDeque<FetchResult>>,
        calls: AtomicUsize,
    }

    type FetchResult = Result<RemoteTodoList, FetchError>;

    impl ScriptedSource {
        fn new(outcomes: impl IntoIterator<Item = FetchResult>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into_iter().collect()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TodoSource for ScriptedSource {
        async fn fetch(&self) -> FetchResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(todo_list(&[])))
        }
    }

    struct HangingSource;

    #[async_trait]
    impl TodoSource for HangingSource {
        async fn fetch(&self) -> FetchResult {
            std::future::pending().await
        }
    }

    struct PanickingSource;

    #[async_trait]
    impl TodoSource for PanickingSource {
        async fn fetch(&self) -> FetchResult {
            panic!("source blew up")
        }
    }

    /// Flag whose first read fails, as with a locked database
    #[derive(Default)]
    struct FlakyFlag {
        inner: MemoryLaunchFlag,
        failed_once: AtomicBool,
    }

    #[async_trait]
    impl LaunchFlag for FlakyFlag {
        async fn is_set(&self) -> crate::Result<bool> {
            if self.failed_once.swap(true, Ordering::SeqCst) {
                self.inner.is_set().await
            } else {
                Err(crate::Error::InvalidInput("settings unavailable".to_string()))
            }
        }

        async fn mark_set(&self) -> crate::Result<()> {
            self.inner.mark_set().await
        }
    }

    /// Flag that counts reads and writes
    #[derive(Default)]
    struct CountingFlag {
        inner: MemoryLaunchFlag,
        reads: AtomicUsize,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl LaunchFlag for CountingFlag {
        async fn is_set(&self) -> crate::Result<bool> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.is_set().await
        }

        async fn mark_set(&self) -> crate::Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.mark_set().await
        }
    }

    fn todo_list(titles: &[&str]) -> RemoteTodoList {
        let todos = titles
            .iter()
            .zip(1..)
            .map(|(title, id)| RemoteTodo {
                id,
                todo: (*title).to_string(),
                completed: id % 2 == 0,
                user_id: 1,
            })
            .collect::<Vec<_>>();
        RemoteTodoList {
            total: i64::try_from(todos.len()).unwrap(),
            skip: 0,
            limit: 30,
            todos,
        }
    }

    fn network_error() -> FetchError {
        FetchError::Status("HTTP 503".to_string())
    }

    struct Harness {
        service: TaskService,
        source: Arc<ScriptedSource>,
        presenter: Arc<RecordingPresenter>,
        flag: Arc<CountingFlag>,
        sync: Arc<FirstLaunchSync>,
    }

    fn harness(outcomes: Vec<FetchResult>, options: SyncOptions) -> Harness {
        let service = TaskService::open_in_memory().unwrap();
        let source = Arc::new(ScriptedSource::new(outcomes));
        let presenter = Arc::new(RecordingPresenter::default());
        let flag = Arc::new(CountingFlag::default());
        let sync = Arc::new(
            FirstLaunchSync::new(
                service.clone(),
                source.clone(),
                presenter.clone(),
                flag.clone(),
            )
            .with_options(options),
        );
        Harness {
            service,
            source,
            presenter,
            flag,
            sync,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn first_launch_imports_remote_tasks() {
        let h = harness(
            vec![Ok(todo_list(&["Walk dog", "Buy milk", "Call mom"]))],
            SyncOptions::default(),
        );

        let phase = h.sync.check_first_launch().await.unwrap();

        assert_eq!(phase, SyncPhase::Succeeded);
        let tasks = h.service.list_tasks().await.unwrap();
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[1].name, "Buy milk");
        assert!(tasks[1].completed);
        assert_eq!(tasks[1].description, "");
        assert!(h.flag.is_set().await.unwrap());
        assert_eq!(h.presenter.calls(), vec![Call::ShowLoader, Call::HideLoader]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_fetch_shows_error_and_imports_nothing() {
        let h = harness(vec![Err(network_error())], SyncOptions::default());

        let phase = h.sync.check_first_launch().await.unwrap();

        assert_eq!(phase, SyncPhase::Failed);
        assert!(h.service.list_tasks().await.unwrap().is_empty());
        assert_eq!(
            h.presenter.calls(),
            vec![Call::ShowLoader, Call::HideLoader, Call::ShowError]
        );
        // The flag is claimed before the outcome is known
        assert!(h.flag.is_set().await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn already_launched_does_nothing() {
        let h = harness(vec![], SyncOptions::default());
        h.flag.inner.mark_set().await.unwrap();
        let mut updates = h.service.subscribe();

        let phase = h.sync.check_first_launch().await.unwrap();

        assert_eq!(phase, SyncPhase::Skipped);
        assert!(h.presenter.calls().is_empty());
        assert_eq!(h.source.calls(), 0);
        assert_eq!(h.flag.writes.load(Ordering::SeqCst), 0);
        assert!(updates.try_recv().is_err());
        assert!(h.service.list_tasks().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn retry_refetches_without_touching_flag() {
        let h = harness(
            vec![Err(network_error()), Ok(todo_list(&["a", "b"]))],
            SyncOptions::default(),
        );

        assert_eq!(h.sync.check_first_launch().await.unwrap(), SyncPhase::Failed);
        let phase = h.presenter.take_retry().retry().await;

        assert_eq!(phase, SyncPhase::Succeeded);
        assert_eq!(h.sync.phase(), SyncPhase::Succeeded);
        assert_eq!(h.source.calls(), 2);
        assert_eq!(h.flag.reads.load(Ordering::SeqCst), 1);
        assert_eq!(h.flag.writes.load(Ordering::SeqCst), 1);
        assert_eq!(h.service.list_tasks().await.unwrap().len(), 2);
        assert_eq!(
            h.presenter.calls(),
            vec![
                Call::ShowLoader,
                Call::HideLoader,
                Call::ShowError,
                Call::ShowLoader,
                Call::HideLoader,
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stale_retry_is_ignored() {
        let h = harness(
            vec![Err(network_error()), Ok(todo_list(&["a"]))],
            SyncOptions::default(),
        );
        h.sync.check_first_launch().await.unwrap();
        let first = h.presenter.take_retry();
        let second = RetryAction {
            sync: Arc::downgrade(&h.sync),
        };

        assert_eq!(first.retry().await, SyncPhase::Succeeded);
        assert_eq!(second.retry().await, SyncPhase::Succeeded);
        assert_eq!(h.source.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn second_check_in_same_session_is_a_no_op() {
        let h = harness(vec![Ok(todo_list(&["a"]))], SyncOptions::default());

        h.sync.check_first_launch().await.unwrap();
        let phase = h.sync.check_first_launch().await.unwrap();

        assert_eq!(phase, SyncPhase::Succeeded);
        assert_eq!(h.source.calls(), 1);
        assert_eq!(h.flag.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn per_record_import_skips_bad_records() {
        let mut list = todo_list(&["ok", "   ", "also ok", "zero id", "negative id"]);
        list.todos[3].id = 0;
        list.todos[4].id = -5;
        let h = harness(vec![Ok(list)], SyncOptions::default());

        let phase = h.sync.check_first_launch().await.unwrap();

        assert_eq!(phase, SyncPhase::Succeeded);
        let names = h
            .service
            .list_tasks()
            .await
            .unwrap()
            .into_iter()
            .map(|task| task.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["ok", "also ok"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn atomic_import_rolls_back_on_bad_record() {
        let h = harness(
            vec![Ok(todo_list(&["ok", "   ", "also ok"]))],
            SyncOptions {
                import_mode: ImportMode::Atomic,
                ..SyncOptions::default()
            },
        );

        let phase = h.sync.check_first_launch().await.unwrap();

        assert_eq!(phase, SyncPhase::Failed);
        assert!(h.service.list_tasks().await.unwrap().is_empty());
        assert_eq!(
            h.presenter.calls(),
            vec![Call::ShowLoader, Call::HideLoader, Call::ShowError]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn on_success_policy_leaves_flag_unset_after_failure() {
        let h = harness(
            vec![Err(network_error()), Ok(todo_list(&["a"]))],
            SyncOptions {
                flag_commit: FlagCommit::OnSuccess,
                ..SyncOptions::default()
            },
        );

        h.sync.check_first_launch().await.unwrap();
        assert!(!h.flag.inner.is_set().await.unwrap());

        h.presenter.take_retry().retry().await;
        assert!(h.flag.inner.is_set().await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn flag_persists_in_task_database() {
        let service = TaskService::open_in_memory().unwrap();
        let presenter = Arc::new(RecordingPresenter::default());
        let flag = Arc::new(SettingsLaunchFlag::new(service.clone()));

        let first = Arc::new(FirstLaunchSync::new(
            service.clone(),
            Arc::new(ScriptedSource::new([Err(network_error())])),
            presenter.clone(),
            flag.clone(),
        ));
        assert_eq!(first.check_first_launch().await.unwrap(), SyncPhase::Failed);

        // A new session never retries, even though nothing was imported
        let second = Arc::new(FirstLaunchSync::new(
            service.clone(),
            Arc::new(ScriptedSource::new([Ok(todo_list(&["a"]))])),
            presenter.clone(),
            flag,
        ));
        assert_eq!(second.check_first_launch().await.unwrap(), SyncPhase::Skipped);
        assert!(service.list_tasks().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn atomic_import_rejects_non_positive_ids() {
        let mut list = todo_list(&["ok", "zero id"]);
        list.todos[1].id = 0;
        let h = harness(
            vec![Ok(list)],
            SyncOptions {
                import_mode: ImportMode::Atomic,
                ..SyncOptions::default()
            },
        );

        assert_eq!(h.sync.check_first_launch().await.unwrap(), SyncPhase::Failed);
        assert!(h.service.list_tasks().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn flag_error_allows_another_check() {
        let service = TaskService::open_in_memory().unwrap();
        let presenter = Arc::new(RecordingPresenter::default());
        let sync = Arc::new(FirstLaunchSync::new(
            service.clone(),
            Arc::new(ScriptedSource::new([Ok(todo_list(&["a"]))])),
            presenter.clone(),
            Arc::new(FlakyFlag::default()),
        ));

        assert!(sync.check_first_launch().await.is_err());
        assert_eq!(sync.phase(), SyncPhase::NotStarted);
        assert!(presenter.calls().is_empty());

        assert_eq!(sync.check_first_launch().await.unwrap(), SyncPhase::Succeeded);
        assert_eq!(service.list_tasks().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn panicking_source_fails_with_retry() {
        let presenter = Arc::new(RecordingPresenter::default());
        let sync = Arc::new(FirstLaunchSync::new(
            TaskService::open_in_memory().unwrap(),
            Arc::new(PanickingSource),
            presenter.clone(),
            Arc::new(MemoryLaunchFlag::new(false)),
        ));

        assert_eq!(sync.check_first_launch().await.unwrap(), SyncPhase::Failed);
        assert_eq!(
            presenter.calls(),
            vec![Call::ShowLoader, Call::HideLoader, Call::ShowError]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn held_retry_does_not_keep_sync_alive() {
        let presenter = Arc::new(RecordingPresenter::default());
        let sync = Arc::new(FirstLaunchSync::new(
            TaskService::open_in_memory().unwrap(),
            Arc::new(ScriptedSource::new([Err(network_error())])),
            presenter.clone(),
            Arc::new(MemoryLaunchFlag::new(false)),
        ));
        assert_eq!(sync.check_first_launch().await.unwrap(), SyncPhase::Failed);

        let weak = Arc::downgrade(&sync);
        drop(sync);
        assert!(weak.upgrade().is_none());

        assert_eq!(presenter.take_retry().retry().await, SyncPhase::Failed);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancelled_fetch_fails_without_error_prompt() {
        let service = TaskService::open_in_memory().unwrap();
        let presenter = Arc::new(RecordingPresenter::default());
        let sync = Arc::new(FirstLaunchSync::new(
            service,
            Arc::new(HangingSource),
            presenter.clone(),
            Arc::new(MemoryLaunchFlag::new(false)),
        ));

        let running = tokio::spawn({
            let sync = Arc::clone(&sync);
            async move { sync.check_first_launch().await }
        });

        while !sync.cancel_fetch() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(running.await.unwrap().unwrap(), SyncPhase::Failed);
        assert_eq!(presenter.calls(), vec![Call::ShowLoader, Call::HideLoader]);
        assert!(!sync.cancel_fetch());
    }
}
