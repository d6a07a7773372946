//! Data models for Tasklet

mod task;

pub use task::{Task, TaskId};
