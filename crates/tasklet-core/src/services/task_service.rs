//! Shared task store service used by every client.
//!
//! `TaskService` is the single writer of the task database. Each mutation
//! runs under one lock together with the before/after id snapshots it is
//! diffed from, so the resulting [`StoreUpdate`] is published before any other
//! caller can read the new state.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};

use crate::changes::{diff_snapshots, ChangeAggregator, StoreUpdate};
use crate::db::{
    Database, SettingsRepository, SqliteSettingsRepository, SqliteTaskRepository, TaskRepository,
};
use crate::models::{Task, TaskId};
use crate::Result;

/// Buffered diffs per subscriber before it starts lagging
const UPDATE_CHANNEL_CAPACITY: usize = 256;

struct Store {
    db: Database,
    changes: ChangeAggregator<StoreUpdate>,
}

/// Thread-safe service for task storage and change notification.
#[derive(Clone)]
pub struct TaskService {
    store: Arc<Mutex<Store>>,
    updates: broadcast::Sender<Arc<StoreUpdate>>,
    db_path: Option<PathBuf>,
}

impl TaskService {
    /// Open a task service backed by the database at `db_path`.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let db = Database::open(&db_path)?;
        tracing::info!("Using task database at {}", db_path.display());
        Ok(Self::from_database(db, Some(db_path)))
    }

    /// Open an in-memory task service (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_database(Database::open_in_memory()?, None))
    }

    fn from_database(db: Database, db_path: Option<PathBuf>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let sender = updates.clone();
        let changes = ChangeAggregator::new("TaskService", move |update: StoreUpdate| {
            // No subscribers is not an error
            let _ = sender.send(Arc::new(update));
        });

        Self {
            store: Arc::new(Mutex::new(Store { db, changes })),
            updates,
            db_path,
        }
    }

    /// Path of the backing database file, if any.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Receive one diff per mutation, in the order mutations were applied.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<StoreUpdate>> {
        self.updates.subscribe()
    }

    /// Run a write and publish the diff it caused.
    ///
    /// `write` returns its value plus the ids whose content it changed. Nothing
    /// is published when it fails.
    async fn mutate<T>(
        &self,
        write: impl FnOnce(&SqliteTaskRepository<'_>) -> Result<(T, HashSet<TaskId>)>,
    ) -> Result<T> {
        let mut store = self.store.lock().await;
        let Store { db, changes } = &mut *store;
        let repo = SqliteTaskRepository::new(db.connection());

        let before = repo.ordered_ids()?;
        let (value, touched) = write(&repo)?;
        let after = repo.ordered_ids()?;

        changes.emit_batch(diff_snapshots(&before, &after, &touched));
        Ok(value)
    }

    async fn read<T>(&self, read: impl FnOnce(&SqliteTaskRepository<'_>) -> Result<T>) -> Result<T> {
        let store = self.store.lock().await;
        read(&SqliteTaskRepository::new(store.db.connection()))
    }

    /// All readable tasks in ascending id order.
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.read(|repo| repo.list()).await
    }

    /// Fetch a task by id.
    pub async fn get_task(&self, id: TaskId) -> Result<Option<Task>> {
        self.read(|repo| repo.get(id)).await
    }

    /// Next assignable id.
    ///
    /// Pairing this with [`add_task`](Self::add_task) races against other
    /// writers; [`create_task`](Self::create_task) does both atomically.
    pub async fn next_id(&self) -> Result<TaskId> {
        self.read(|repo| repo.next_id()).await
    }

    /// Exact, case-sensitive name lookup.
    pub async fn exists_by_name(&self, name: &str) -> Result<bool> {
        self.read(|repo| repo.exists_by_name(name)).await
    }

    /// Search tasks by name or description.
    pub async fn search_tasks(&self, query: &str) -> Result<Vec<Task>> {
        self.read(|repo| repo.search(query)).await
    }

    /// Insert a fully specified task.
    pub async fn add_task(&self, task: &Task) -> Result<()> {
        self.mutate(|repo| repo.insert(task).map(|()| ((), HashSet::new())))
            .await
    }

    /// Allocate the next id and insert a new open task under it.
    pub async fn create_task(&self, name: &str, description: &str) -> Result<Task> {
        self.mutate(|repo| {
            let task = Task::new(repo.next_id()?, name, description);
            repo.insert(&task)?;
            Ok((task, HashSet::new()))
        })
        .await
    }

    /// Insert a batch of tasks atomically, publishing a single diff.
    pub async fn import_tasks(&self, tasks: &[Task]) -> Result<usize> {
        self.mutate(|repo| {
            repo.insert_many(tasks)?;
            Ok((tasks.len(), HashSet::new()))
        })
        .await
    }

    /// Replace every field of an existing task.
    pub async fn update_task(&self, task: &Task) -> Result<()> {
        self.mutate(|repo| {
            repo.update(task)?;
            Ok(((), HashSet::from([task.id])))
        })
        .await
    }

    /// Delete a task.
    pub async fn delete_task(&self, id: TaskId) -> Result<()> {
        self.mutate(|repo| repo.delete(id).map(|()| ((), HashSet::new())))
            .await
    }

    /// Flip a task's completion flag, returning the new value.
    pub async fn toggle_status(&self, id: TaskId) -> Result<bool> {
        self.mutate(|repo| {
            let completed = repo.toggle_status(id)?;
            Ok((completed, HashSet::from([id])))
        })
        .await
    }

    /// Read a boolean setting stored next to the tasks.
    pub async fn load_flag(&self, key: &str) -> Result<bool> {
        let store = self.store.lock().await;
        SqliteSettingsRepository::new(store.db.connection()).get_bool(key)
    }

    /// Persist a boolean setting stored next to the tasks.
    pub async fn store_flag(&self, key: &str, value: bool) -> Result<()> {
        let store = self.store.lock().await;
        SqliteSettingsRepository::new(store.db.connection()).set_bool(key, value)
    }

    /// Dump every stored task at debug level.
    pub async fn log_all(&self) -> Result<()> {
        let tasks = self.list_tasks().await?;
        tracing::debug!("{} task(s) in store", tasks.len());
        for task in &tasks {
            tracing::debug!(
                "Id: {}, name: {:?}, completed: {}",
                task.id,
                task.name,
                task.completed
            );
        }
        Ok(())
    }
}
