use tasklet_core::TaskService;

use crate::commands::common::{apply_edit, resolve_task};
use crate::error::CliError;

pub async fn run_edit(
    id: &str,
    name: Option<&str>,
    description: Option<&str>,
    service: &TaskService,
) -> Result<(), CliError> {
    let task = resolve_task(id, service).await?;
    let edited = apply_edit(&task, name, description)?;

    if edited != task {
        service.update_task(&edited).await?;
    }
    println!("{}", edited.id);
    Ok(())
}
