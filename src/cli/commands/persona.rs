//! Persona discovery CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use comfy_table::Cell;

use crate::cli::context::AppContext;
use crate::cli::output::{list_table, output, render_list, CommandOutput};
use crate::domain::models::{Config, Persona};

#[derive(Args, Debug)]
pub struct PersonaArgs {
    #[command(subcommand)]
    pub command: PersonaCommands,
}

#[derive(Subcommand, Debug)]
pub enum PersonaCommands {
    /// List every persona in the prompt store
    List,
    /// Find personas advertising a capability
    Find {
        /// Capability scope, matched case-insensitively
        capability: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct PersonaListOutput {
    pub personas: Vec<Persona>,
    pub total: usize,
}

impl From<Vec<Persona>> for PersonaListOutput {
    fn from(personas: Vec<Persona>) -> Self {
        Self {
            total: personas.len(),
            personas,
        }
    }
}

impl CommandOutput for PersonaListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["slug", "name", "capabilities"]);
        for persona in &self.personas {
            table.add_row(vec![
                Cell::new(&persona.slug),
                Cell::new(&persona.name),
                Cell::new(persona.capabilities.join(", ")),
            ]);
        }
        render_list("persona", &table, self.total)
    }
}

pub async fn execute(args: PersonaArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::build(config).await?;
    let result = run(&ctx, args.command, json_mode).await;
    ctx.shutdown().await;
    result
}

async fn run(ctx: &AppContext, command: PersonaCommands, json_mode: bool) -> Result<()> {
    let directory = ctx.require_personas()?;
    let personas = match command {
        PersonaCommands::List => directory.list_personas().await?,
        PersonaCommands::Find { capability } => directory.agents_by_capability(&capability).await?,
    };
    output(&PersonaListOutput::from(personas), json_mode);
    Ok(())
}
