//! Tasklet CLI - Command-line front end for the local task list
//!
//! Every run opens the local store, imports the starter tasks on the very
//! first launch, then executes one command.

mod cli;
mod commands;
mod error;
mod presenter;

#[cfg(test)]
mod tests;

use clap::{CommandFactory, Parser};
use tasklet_core::config::AppConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::open_session;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::list::run_list;
use crate::commands::toggle::run_toggle;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tasklet=info")),
        )
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config = AppConfig::resolve(cli.config.as_deref())?;
    let service = open_session(&config, cli.db_path.as_deref(), cli.offline).await?;

    match command {
        Commands::Add { name, description } => run_add(&name, &description, &service).await?,
        Commands::List { search, json } => run_list(search.as_deref(), json, &service).await?,
        Commands::Edit {
            id,
            name,
            description,
        } => run_edit(&id, name.as_deref(), description.as_deref(), &service).await?,
        Commands::Toggle { id } => run_toggle(&id, &service).await?,
        Commands::Delete { id } => run_delete(&id, &service).await?,
    }

    Ok(())
}
