use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use crewflow_core::{
    SessionLogInput, SessionOptions, log_session_completion, persist_trace,
    run_research_session_with_options,
};
use tokio::runtime::Runtime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "crewflow-cli",
    version,
    about = "Config-driven research crew demo"
)]
struct Cli {
    /// Research question to investigate.
    #[arg(default_value = "What are the latest developments in quantum computing?")]
    question: String,

    /// Path to the agents YAML; defaults to $CREWFLOW_CONFIG or config/agents.yaml.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Optional session ID; generated when omitted.
    #[arg(long)]
    session: Option<String>,

    /// Directory to write the session trace JSON into.
    #[arg(long)]
    trace_dir: Option<PathBuf>,

    /// Print the step-by-step trace after the report.
    #[arg(long, default_value_t = false)]
    show_trace: bool,
}

fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,crewflow_core=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let rt = Runtime::new()?;
    rt.block_on(run_command(cli))?;

    Ok(())
}

async fn run_command(args: Cli) -> Result<()> {
    info!(question = %args.question, "starting research session");

    let mut options = SessionOptions::new(&args.question);

    if let Some(session_id) = args.session {
        options = options.with_session_id(session_id);
    }

    if let Some(config) = args.config {
        options = options.with_config_path(config);
    }

    let outcome = run_research_session_with_options(options).await?;

    let trace_path = match args.trace_dir.as_ref() {
        Some(dir) => match persist_trace(dir, &outcome.session_id, &outcome.trace_events) {
            Ok(path) => {
                info!(path = %path.display(), "trace persisted");
                Some(path.display().to_string())
            }
            Err(error) => {
                warn!(%error, "failed to persist trace");
                None
            }
        },
        None => None,
    };

    println!();
    println!("Final Research Report:");
    println!("{}", "=".repeat(80));
    println!("{}", outcome.report);

    if args.show_trace {
        println!();
        println!("{}", outcome.trace_summary().render_markdown());
    }

    if let Err(error) = log_session_completion(SessionLogInput {
        session_id: outcome.session_id,
        question: Some(args.question),
        report: outcome.report,
        sources: outcome.sources,
        trace_path,
    }) {
        warn!(%error, "failed to record session log");
    }

    Ok(())
}
