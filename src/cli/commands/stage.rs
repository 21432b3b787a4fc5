//! Stage and gate CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use comfy_table::Cell;

use crate::cli::commands::item::ItemOutput;
use crate::cli::commands::parse_item_id;
use crate::cli::context::AppContext;
use crate::cli::output::{list_table, output, truncate, CommandOutput};
use crate::domain::models::{Config, GateStatus};
use crate::services::{AdvanceOutcome, AdvanceRequest, StageInitResult};

/// Actor recorded when none is given on the command line.
const CLI_ACTOR: &str = "cli";

#[derive(Args, Debug)]
pub struct StageArgs {
    #[command(subcommand)]
    pub command: StageCommands,
}

#[derive(Subcommand, Debug)]
pub enum StageCommands {
    /// Assign a stage template and create gate criteria
    Init {
        /// Item ID
        id: String,
        /// Explicit stage list (comma-separated), overriding the tier template
        #[arg(short, long, value_delimiter = ',')]
        template: Option<Vec<String>>,
        /// Discard existing stages and gate state
        #[arg(long)]
        replace: bool,
    },
    /// Move an item to its next stage
    Advance {
        /// Item ID
        id: String,
        /// Bypass gate and velocity checks
        #[arg(long, requires = "reason")]
        force: bool,
        /// Justification for a forced advance
        #[arg(short, long)]
        reason: Option<String>,
        /// Who is advancing the item
        #[arg(long, default_value = CLI_ACTOR)]
        actor: String,
    },
    /// Satisfy gate criteria
    Satisfy {
        /// Item ID
        id: String,
        /// Criterion label
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        criterion: Option<String>,
        /// Satisfy every criterion of the stage
        #[arg(long)]
        all: bool,
        /// Stage to satisfy (defaults to the current stage)
        #[arg(short, long)]
        stage: Option<String>,
        /// Who attests the criterion
        #[arg(long = "by", default_value = CLI_ACTOR)]
        satisfied_by: String,
    },
    /// Show gate status
    Status {
        /// Item ID
        id: String,
        /// Stage to inspect (defaults to the current stage)
        #[arg(short, long)]
        stage: Option<String>,
    },
}

/// Human rendering of one stage's gate.
fn gate_table(gate: &GateStatus) -> String {
    let heading = format!(
        "Gate '{}': {}",
        gate.stage,
        if gate.all_met { "open" } else { "closed" }
    );
    if gate.criteria.is_empty() {
        return format!("{heading} (no criteria)");
    }

    let mut table = list_table(&["", "criterion", "satisfied by", "at"]);
    for c in &gate.criteria {
        table.add_row(vec![
            Cell::new(if c.satisfied { "x" } else { " " }),
            Cell::new(truncate(&c.criterion, 48)),
            Cell::new(&c.satisfied_by),
            Cell::new(c.satisfied_at.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()).unwrap_or_default()),
        ]);
    }
    format!("{heading}\n{table}")
}

#[derive(Debug, serde::Serialize)]
pub struct GateOutput(pub GateStatus);

impl CommandOutput for GateOutput {
    fn to_human(&self) -> String {
        gate_table(&self.0)
    }
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub item: ItemOutput,
    pub gates: Vec<GateStatus>,
}

impl From<StageInitResult> for InitOutput {
    fn from(result: StageInitResult) -> Self {
        Self {
            item: ItemOutput::from(&result.item.item),
            gates: result.gates,
        }
    }
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Stages initialized for {}", self.item.id),
            format!("  {}", self.item.stage_line()),
        ];
        for gate in &self.gates {
            lines.push(String::new());
            lines.push(gate_table(gate));
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct AdvanceOutput {
    pub item: ItemOutput,
    pub previous_stage: String,
    pub current_stage: String,
    pub completed: bool,
    pub forced: bool,
}

impl From<AdvanceOutcome> for AdvanceOutput {
    fn from(outcome: AdvanceOutcome) -> Self {
        Self {
            item: ItemOutput::from(&outcome.item.item),
            previous_stage: outcome.previous_stage,
            current_stage: outcome.current_stage,
            completed: outcome.completed,
            forced: outcome.forced,
        }
    }
}

impl CommandOutput for AdvanceOutput {
    fn to_human(&self) -> String {
        let mut line = format!("Advanced {}: {} -> {}", self.item.id, self.previous_stage, self.current_stage);
        if self.forced {
            line.push_str(" (forced)");
        }
        if self.completed {
            line.push_str("\nItem reached its final stage.");
        }
        line
    }
}

pub async fn execute(args: StageArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::build(config).await?;

    let result = run(&ctx, args.command, json_mode).await;
    ctx.shutdown().await;
    result
}

async fn run(ctx: &AppContext, command: StageCommands, json_mode: bool) -> Result<()> {
    match command {
        StageCommands::Init { id, template, replace } => {
            let result = ctx
                .service
                .initialize(parse_item_id(&id)?, template.as_deref(), replace)
                .await?;
            output(&InitOutput::from(result), json_mode);
        }
        StageCommands::Advance { id, force, reason, actor } => {
            let request = AdvanceRequest { force, reason, actor };
            let outcome = ctx.service.advance_stage(parse_item_id(&id)?, request).await?;
            output(&AdvanceOutput::from(outcome), json_mode);
        }
        StageCommands::Satisfy {
            id,
            criterion,
            all,
            stage,
            satisfied_by,
        } => {
            let id = parse_item_id(&id)?;
            let status = match criterion {
                Some(criterion) if !all => {
                    ctx.service
                        .satisfy_criterion(id, stage.as_deref(), &criterion, &satisfied_by)
                        .await?
                }
                _ => ctx.service.satisfy_all(id, stage.as_deref(), &satisfied_by).await?,
            };
            output(&GateOutput(status), json_mode);
        }
        StageCommands::Status { id, stage } => {
            let status = ctx.service.gate_status(parse_item_id(&id)?, stage.as_deref()).await?;
            output(&GateOutput(status), json_mode);
        }
    }
    Ok(())
}
