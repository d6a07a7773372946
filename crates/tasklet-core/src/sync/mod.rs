//! One-time import of the remote task list on first launch.
//!
//! [`FirstLaunchSync`] reads a persisted [`LaunchFlag`], fetches the remote
//! list through a [`TodoSource`], converts it into [`Task`](crate::Task)s and
//! inserts them through the [`TaskService`](crate::TaskService), reporting
//! progress to a [`Presenter`].

mod first_launch;
mod launch_flag;
mod remote;

use serde::{Deserialize, Serialize};

pub use first_launch::{FirstLaunchSync, Presenter, RetryAction};
pub use launch_flag::{LaunchFlag, MemoryLaunchFlag, SettingsLaunchFlag, LAUNCH_FLAG_KEY};
pub use remote::{
    parse_todo_list, FetchError, FetchResult, HttpTodoSource, RemoteTodo, RemoteTodoList,
    TodoSource, DEFAULT_TODOS_URL,
};

/// Progress of the first-launch import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// `check_first_launch` has not run yet
    NotStarted,
    /// The flag was already set; nothing was done
    Skipped,
    /// A fetch/import attempt is in progress
    Loading,
    /// The remote list was fetched and imported
    Succeeded,
    /// The last attempt failed; a retry may still succeed this session
    Failed,
}

/// When the launch flag is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagCommit {
    /// Before fetching: at most one attempt per installation, even if the
    /// process dies mid-import
    #[default]
    BeforeFetch,
    /// Only after a successful import
    OnSuccess,
}

/// How fetched tasks are written to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// One insert per task; failures are logged and skipped
    #[default]
    PerRecord,
    /// One transaction for the whole list; any failure imports nothing
    Atomic,
}

/// Policy knobs for [`FirstLaunchSync`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncOptions {
    #[serde(default)]
    pub flag_commit: FlagCommit,
    #[serde(default)]
    pub import_mode: ImportMode,
}
