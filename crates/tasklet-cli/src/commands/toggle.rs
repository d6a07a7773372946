use tasklet_core::TaskService;

use crate::commands::common::parse_task_id;
use crate::error::CliError;

pub async fn run_toggle(id: &str, service: &TaskService) -> Result<(), CliError> {
    let id = parse_task_id(id)?;
    let completed = service.toggle_status(id).await?;

    println!("{id} {}", if completed { "done" } else { "open" });
    Ok(())
}
