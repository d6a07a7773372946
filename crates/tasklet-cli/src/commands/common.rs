use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tasklet_core::config::AppConfig;
use tasklet_core::sync::{FirstLaunchSync, HttpTodoSource, SettingsLaunchFlag};
use tasklet_core::{StoreUpdate, Task, TaskId, TaskService};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::error::CliError;
use crate::presenter::{run_first_launch, TerminalPresenter};

#[derive(Debug, Serialize)]
pub struct TaskListItem {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub completed: bool,
    pub date: i64,
    pub date_iso: String,
}

/// Open the task store and run the first-launch import unless `offline`.
pub async fn open_session(
    config: &AppConfig,
    db_path: Option<&Path>,
    offline: bool,
) -> Result<TaskService, CliError> {
    let db_path = match db_path {
        Some(path) => path.to_path_buf(),
        None => config.database_path()?,
    };
    let service = TaskService::open_path(db_path)?;
    spawn_update_logger(service.subscribe());

    if offline {
        tracing::debug!("Offline mode, not checking first launch");
        return Ok(service);
    }

    let source = HttpTodoSource::new(config.todos_url(), config.http_timeout())?;
    let presenter = Arc::new(TerminalPresenter::default());
    let sync = Arc::new(
        FirstLaunchSync::new(
            service.clone(),
            Arc::new(source),
            presenter.clone(),
            Arc::new(SettingsLaunchFlag::new(service.clone())),
        )
        .with_options(config.sync_options()),
    );

    let phase = run_first_launch(&sync, &presenter).await?;
    tracing::debug!("First launch check finished: {:?}", phase);
    Ok(service)
}

/// Log every published diff at debug level until the store goes away.
pub fn spawn_update_logger(mut updates: broadcast::Receiver<Arc<StoreUpdate>>) {
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => tracing::debug!("{}", describe_update(&update)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Update logger skipped {} diff(s)", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

pub fn describe_update(update: &StoreUpdate) -> String {
    let moves = update
        .sorted_moves()
        .iter()
        .map(|mv| format!("{}->{}", mv.old_index, mv.new_index))
        .collect::<Vec<_>>();
    format!(
        "Store diff: inserted={:?} deleted={:?} updated={:?} moved={:?}",
        update.inserted(),
        update.deleted(),
        update.updated(),
        moves
    )
}

pub fn normalize_name(name: &str) -> Result<String, CliError> {
    let name = name.trim();
    if name.is_empty() {
        Err(CliError::EmptyName)
    } else {
        Ok(name.to_string())
    }
}

pub fn parse_task_id(raw: &str) -> Result<TaskId, CliError> {
    raw.parse::<TaskId>()
        .map_err(|_| CliError::InvalidTaskId(raw.trim().to_string()))
}

pub async fn resolve_task(raw_id: &str, service: &TaskService) -> Result<Task, CliError> {
    let id = parse_task_id(raw_id)?;
    service
        .get_task(id)
        .await?
        .ok_or_else(|| CliError::TaskNotFound(id.to_string()))
}

/// Copy of `task` with the given fields replaced.
pub fn apply_edit(
    task: &Task,
    name: Option<&str>,
    description: Option<&str>,
) -> Result<Task, CliError> {
    if name.is_none() && description.is_none() {
        return Err(CliError::NothingToEdit);
    }

    let mut edited = task.clone();
    if let Some(name) = name {
        edited.name = normalize_name(name)?;
    }
    if let Some(description) = description {
        edited.description = description.trim().to_string();
    }
    Ok(edited)
}

pub fn format_task_lines(tasks: &[Task]) -> Vec<String> {
    let width = tasks
        .iter()
        .map(|task| task.id.to_string().len())
        .max()
        .unwrap_or(1);

    tasks
        .iter()
        .map(|task| {
            let mark = if task.completed { "x" } else { " " };
            let id = task.id.to_string();
            if task.description.is_empty() {
                format!("[{mark}] {id:>width$}  {}", task.name)
            } else {
                format!("[{mark}] {id:>width$}  {}  ({})", task.name, task.description)
            }
        })
        .collect()
}

pub fn task_to_list_item(task: &Task) -> TaskListItem {
    TaskListItem {
        id: task.id.get(),
        name: task.name.clone(),
        description: task.description.clone(),
        completed: task.completed,
        date: task.date,
        date_iso: format_date(task.date),
    }
}

pub fn format_date(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |value| value.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}
