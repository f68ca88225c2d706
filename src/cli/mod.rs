pub mod commands;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "seed")]
#[command(about = "Development data loader for the Auth CRUD API store")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Sample resource data")]
    Samples {
        #[command(subcommand)]
        cmd: commands::samples::SampleCommands,
    },
}

pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    match cli.command {
        Commands::Samples { cmd } => commands::samples::handle(cmd, &config).await,
    }
}
