#![deny(warnings)]

//! Headless CLI: evaluates one JSON request with the cellar calculators and
//! prints the JSON result.

use anyhow::{Context, Result};
use cellar_config::Policy;
use cellar_core::{AccessContext, Batch, CostInputs, Unit, VolumeEvent};
use cellar_econ::{MarginInput, SaleLine};
use cellar_ledger::ReconciliationInput;
use cellar_loss::{KegFillInput, LossInput};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    " ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Debug, Parser)]
#[command(name = "cellar", version = VERSION, about = "Cellar volume, loss and cost calculators")]
struct Cli {
    /// YAML policy file overriding loss thresholds and tolerances.
    #[arg(long, env = "CELLAR_POLICY", global = true)]
    policy: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct InputArgs {
    /// JSON request file; reads stdin when omitted.
    #[arg(long)]
    input: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Convert a value between L/gal or kg/lb.
    Convert {
        #[arg(allow_negative_numbers = true)]
        value: f64,
        #[arg(long)]
        from: Unit,
        #[arg(long)]
        to: Unit,
    },
    /// Transfer or filter loss.
    Loss(InputArgs),
    /// Keg-fill loss and tier.
    KegFill(InputArgs),
    /// Cost of goods sold for a cost sheet.
    Cogs(InputArgs),
    /// Margin and markup for a priced run.
    Margin(InputArgs),
    /// Remaining inventory valued across runs.
    Valuation(InputArgs),
    /// Average selling price over sales lines.
    Asp(InputArgs),
    /// Apply a volume event to a batch.
    Apply(InputArgs),
    /// Reconcile a period's volumes in gallons.
    Reconcile(InputArgs),
}

/// Request body for `apply`.
#[derive(Debug, Deserialize)]
struct ApplyRequest {
    context: AccessContext,
    batch: Batch,
    event: VolumeEvent,
}

#[derive(Debug, Serialize)]
struct ApplyResponse {
    batch: Batch,
    applied: cellar_ledger::AppliedEvent,
}

#[derive(Debug, Serialize)]
struct AspResponse {
    /// `null` when nothing was sold.
    average_selling_price: Option<Decimal>,
}

#[derive(Debug, Serialize)]
struct ConvertResponse {
    value: f64,
    unit: Unit,
}

fn read_input(args: &InputArgs) -> Result<String> {
    match &args.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            Ok(buf)
        }
    }
}

fn parse<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T> {
    serde_json::from_str(text).context("invalid request JSON")
}

/// Run one command against an already-read request body.
fn evaluate(command: &Command, policy: &Policy, body: &str) -> Result<Value> {
    let out = match command {
        Command::Convert { value, from, to } => {
            let converted = cellar_core::convert(*value, *from, *to)?;
            serde_json::to_value(ConvertResponse {
                value: converted,
                unit: *to,
            })?
        }
        Command::Loss(_) => {
            let input: LossInput = parse(body)?;
            serde_json::to_value(cellar_loss::calculate_loss(&input, &policy.loss)?)?
        }
        Command::KegFill(_) => {
            let input: KegFillInput = parse(body)?;
            serde_json::to_value(cellar_loss::calculate_keg_fill(&input, &policy.loss)?)?
        }
        Command::Cogs(_) => {
            let input: CostInputs = parse(body)?;
            serde_json::to_value(cellar_econ::aggregate_cogs(&input)?)?
        }
        Command::Margin(_) => {
            let input: MarginInput = parse(body)?;
            serde_json::to_value(cellar_econ::calculate_margin(&input)?)?
        }
        Command::Valuation(_) => {
            let runs: Vec<MarginInput> = parse(body)?;
            serde_json::to_value(cellar_econ::inventory_valuation(&runs)?)?
        }
        Command::Asp(_) => {
            let lines: Vec<SaleLine> = parse(body)?;
            serde_json::to_value(AspResponse {
                average_selling_price: cellar_econ::average_selling_price(&lines)?,
            })?
        }
        Command::Apply(_) => {
            let req: ApplyRequest = parse(body)?;
            let mut batch = req.batch;
            let applied =
                cellar_ledger::apply_event(&mut batch, &req.event, &policy.loss, &req.context)?;
            serde_json::to_value(ApplyResponse { batch, applied })?
        }
        Command::Reconcile(_) => {
            let input: ReconciliationInput = parse(body)?;
            serde_json::to_value(cellar_ledger::reconcile(&input, &policy.reconciliation)?)?
        }
    };
    Ok(out)
}

fn main() -> Result<()> {
    // Logging goes to stderr; stdout carries the JSON result.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!(command = ?cli.command, policy = ?cli.policy, "starting CLI");
    let policy = Policy::load_or_default(cli.policy.as_ref())?;

    let body = match &cli.command {
        Command::Convert { .. } => String::new(),
        Command::Loss(a)
        | Command::KegFill(a)
        | Command::Cogs(a)
        | Command::Margin(a)
        | Command::Valuation(a)
        | Command::Asp(a)
        | Command::Apply(a)
        | Command::Reconcile(a) => read_input(a)?,
    };

    let out = evaluate(&cli.command, &policy, &body)?;
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
