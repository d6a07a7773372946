//! Terminal rendering of the first-launch import.

use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::{Arc, Mutex, PoisonError};

use tasklet_core::sync::{FirstLaunchSync, Presenter, RetryAction, SyncPhase};

use crate::error::CliError;

const LOADER_TEXT: &str = "Importing starter tasks...";
const ERROR_TEXT: &str = "Could not download starter tasks.";

/// Writes progress to stderr and parks the retry action for the caller.
#[derive(Default)]
pub struct TerminalPresenter {
    pending_retry: Mutex<Option<RetryAction>>,
}

impl TerminalPresenter {
    pub fn take_retry(&self) -> Option<RetryAction> {
        self.pending_retry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Presenter for TerminalPresenter {
    fn show_loader(&self) {
        eprint!("{LOADER_TEXT}");
        let _ = io::stderr().flush();
    }

    fn hide_loader(&self) {
        eprintln!();
    }

    fn show_error(&self, retry: RetryAction) {
        eprintln!("{ERROR_TEXT}");
        *self
            .pending_retry
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(retry);
    }
}

/// Run the first-launch check, offering retries while stdin is a terminal.
pub async fn run_first_launch(
    sync: &Arc<FirstLaunchSync>,
    presenter: &TerminalPresenter,
) -> Result<SyncPhase, CliError> {
    let mut phase = sync.check_first_launch().await?;

    while phase == SyncPhase::Failed {
        let Some(retry) = presenter.take_retry() else {
            break;
        };
        if !io::stdin().is_terminal() || !confirm_retry()? {
            break;
        }
        phase = retry.retry().await;
    }

    Ok(phase)
}

fn confirm_retry() -> Result<bool, CliError> {
    eprint!("Retry? [y/N] ");
    io::stderr().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
