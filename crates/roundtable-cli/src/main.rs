use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use roundtable_core::{ConfigLoader, ResearchWorkflow};
use std::fs;
use std::path::PathBuf;
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "roundtable-cli",
    version,
    about = "Multi-agent research assistant"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a research session and print the report.
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Topic to research.
    #[arg(long)]
    topic: String,

    /// Additional instructions for the research team.
    #[arg(long, default_value = "")]
    instructions: String,

    /// Optional configuration file (defaults to `roundtable.toml`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the Markdown report to this path as well as stdout.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Write the raw research record as JSON to this path.
    #[arg(long)]
    json: Option<PathBuf>,
}

fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,roundtable_core=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let rt = Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Command::Run(args) => run_command(args).await?,
        }
        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}

async fn run_command(args: RunArgs) -> Result<()> {
    let config = ConfigLoader::load(args.config)?;
    let mut workflow = ResearchWorkflow::new(config)?;

    info!(topic = %args.topic, "starting research session");

    let record = workflow
        .conduct_research(&args.topic, &args.instructions)
        .await;

    if record.is_failed() {
        info!("research run ended in failure; see the report for details");
    }

    let report = workflow.export_research_report(-1);
    println!("{report}");

    if let Some(path) = args.report {
        fs::write(&path, &report)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "report written");
    }

    if let Some(path) = args.json {
        let raw = workflow
            .export_research_data(-1)
            .context("no research record to export")?;
        fs::write(&path, raw)
            .with_context(|| format!("failed to write raw data to {}", path.display()))?;
        info!(path = %path.display(), "raw data written");
    }

    Ok(())
}
