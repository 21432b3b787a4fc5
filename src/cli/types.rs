//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};

use super::commands::item::ItemArgs;
use super::commands::persona::PersonaArgs;
use super::commands::serve::ServeArgs;
use super::commands::stage::StageArgs;

#[derive(Parser)]
#[command(name = "stagegate")]
#[command(about = "Stagegate - stage-gated workflow for backlog items", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .stagegate/config.yaml with local and env overrides)
    #[arg(short, long, global = true, env = "STAGEGATE_CONFIG")]
    pub config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API server
    Serve(ServeArgs),

    /// Backlog item commands
    Item(ItemArgs),

    /// Stage and gate commands
    Stage(StageArgs),

    /// Persona discovery commands
    Persona(PersonaArgs),
}
