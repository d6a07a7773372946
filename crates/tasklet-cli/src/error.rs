use std::io;

use tasklet_core::sync::FetchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] tasklet_core::Error),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Task name cannot be empty")]
    EmptyName,
    #[error("A task named {0:?} already exists")]
    DuplicateName(String),
    #[error("Invalid task id: {0:?}")]
    InvalidTaskId(String),
    #[error("Task not found: {0}")]
    TaskNotFound(String),
    #[error("Nothing to edit; pass --name and/or --description")]
    NothingToEdit,
}
