//! Services shared by Tasklet clients

mod task_service;

pub use task_service::TaskService;
