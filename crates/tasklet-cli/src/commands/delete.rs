use tasklet_core::TaskService;

use crate::commands::common::parse_task_id;
use crate::error::CliError;

pub async fn run_delete(id: &str, service: &TaskService) -> Result<(), CliError> {
    let id = parse_task_id(id)?;
    service.delete_task(id).await?;

    println!("{id}");
    Ok(())
}
