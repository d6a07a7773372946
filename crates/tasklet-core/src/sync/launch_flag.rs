//! Persisted "has launched before" flag.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::services::TaskService;
use crate::Result;

/// Settings key holding the flag
pub const LAUNCH_FLAG_KEY: &str = "has_launched_before";

/// Durable boolean gating the first-launch import
#[async_trait]
pub trait LaunchFlag: Send + Sync {
    /// Whether a previous launch already claimed the import
    async fn is_set(&self) -> Result<bool>;

    /// Record that the import has been claimed
    async fn mark_set(&self) -> Result<()>;
}

/// Flag stored in the settings table of the task database
#[derive(Clone)]
pub struct SettingsLaunchFlag {
    service: TaskService,
}

impl SettingsLaunchFlag {
    pub const fn new(service: TaskService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl LaunchFlag for SettingsLaunchFlag {
    async fn is_set(&self) -> Result<bool> {
        self.service.load_flag(LAUNCH_FLAG_KEY).await
    }

    async fn mark_set(&self) -> Result<()> {
        self.service.store_flag(LAUNCH_FLAG_KEY, true).await
    }
}

/// Process-local flag for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryLaunchFlag {
    set: AtomicBool,
}

impl MemoryLaunchFlag {
    pub const fn new(set: bool) -> Self {
        Self {
            set: AtomicBool::new(set),
        }
    }
}

#[async_trait]
impl LaunchFlag for MemoryLaunchFlag {
    async fn is_set(&self) -> Result<bool> {
        Ok(self.set.load(Ordering::SeqCst))
    }

    async fn mark_set(&self) -> Result<()> {
        self.set.store(true, Ordering::SeqCst);
        Ok(())
    }
}
