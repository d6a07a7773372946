use tasklet_core::TaskService;

use crate::commands::common::normalize_name;
use crate::error::CliError;

pub async fn run_add(
    name_parts: &[String],
    description: &str,
    service: &TaskService,
) -> Result<(), CliError> {
    let name = normalize_name(&name_parts.join(" "))?;
    if service.exists_by_name(&name).await? {
        return Err(CliError::DuplicateName(name));
    }

    let task = service.create_task(&name, description.trim()).await?;
    println!("{}", task.id);
    Ok(())
}
