//! Backlog item CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::commands::parse_item_id;
use crate::cli::context::AppContext;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{BacklogItem, Config};

#[derive(Args, Debug)]
pub struct ItemArgs {
    #[command(subcommand)]
    pub command: ItemCommands,
}

#[derive(Subcommand, Debug)]
pub enum ItemCommands {
    /// Create a backlog item
    Create {
        /// Item title
        title: String,
        /// Model tier (defaults to standard)
        #[arg(short, long)]
        tier: Option<String>,
    },
    /// Show an item and its current stage
    Show {
        /// Item ID
        id: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct ItemOutput {
    pub id: String,
    pub title: String,
    pub model_tier: String,
    pub stage_template: Vec<String>,
    pub stage_index: usize,
    pub current_stage: Option<String>,
    pub version: i64,
    pub updated_at: String,
}

impl From<&BacklogItem> for ItemOutput {
    fn from(item: &BacklogItem) -> Self {
        Self {
            id: item.id.to_string(),
            title: item.title.clone(),
            model_tier: item.model_tier.clone(),
            stage_template: item.stage_template.clone(),
            stage_index: item.stage_index,
            current_stage: item.current_stage().map(str::to_string),
            version: item.version,
            updated_at: item.updated_at.to_rfc3339(),
        }
    }
}

impl ItemOutput {
    /// Template with the current stage bracketed.
    pub fn stage_line(&self) -> String {
        if self.stage_template.is_empty() {
            return "(not initialized)".to_string();
        }
        self.stage_template
            .iter()
            .enumerate()
            .map(|(i, s)| if i == self.stage_index { format!("[{s}]") } else { s.clone() })
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

impl CommandOutput for ItemOutput {
    fn to_human(&self) -> String {
        [
            format!("Item: {}", self.title),
            format!("ID: {}", self.id),
            format!("Tier: {}", self.model_tier),
            format!("Stages: {}", self.stage_line()),
            format!("Version: {}", self.version),
            format!("Updated: {}", self.updated_at),
        ]
        .join("\n")
    }
}

pub async fn execute(args: ItemArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::build(config).await?;

    let result = run(&ctx, args.command, json_mode).await;
    ctx.shutdown().await;
    result
}

async fn run(ctx: &AppContext, command: ItemCommands, json_mode: bool) -> Result<()> {
    match command {
        ItemCommands::Create { title, tier } => {
            let item = ctx.service.create_item(&title, tier.as_deref()).await?;
            output(&ItemOutput::from(&item), json_mode);
        }
        ItemCommands::Show { id } => {
            let item = ctx.service.get_item(parse_item_id(&id)?).await?;
            output(&ItemOutput::from(&item), json_mode);
        }
    }
    Ok(())
}
