//! tasklet-core - Core library for Tasklet
//!
//! This crate contains the task model, the `SQLite` task store, the change
//! aggregator that turns store mutations into list diffs, and the first-launch
//! import pipeline used by every Tasklet front end.

pub mod changes;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod sync;
pub mod util;

pub use changes::{ChangeAggregator, ChangeEvent, ChangeKind, Move, StoreUpdate};
pub use error::{Error, Result};
pub use models::{Task, TaskId};
pub use services::TaskService;
