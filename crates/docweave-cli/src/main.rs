use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

mod config;
mod headless;
mod pipeline;

use pipeline::{Input, RunArgs};

#[derive(Parser)]
#[command(
    version,
    about = "docweave - save pipeline for code with rich-text doc comments",
    long_about = None
)]
#[command(propagate_version = true)]
struct Cli {
    /// Session config file (TOML); defaults apply when it does not exist
    #[arg(long, global = true, env = "DOCWEAVE_CONFIG", default_value = "docweave.toml")]
    config: PathBuf,

    /// Log pipeline steps
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn a snapshot holding widget HTML into an update payload
    Decode(PipelineArgs),
    /// Load a Markdown snapshot and save it again, reflowing every doc block
    Roundtrip(PipelineArgs),
}

#[derive(Args)]
struct PipelineArgs {
    /// Snapshot JSON file
    snapshot: PathBuf,

    /// Write the payload here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,

    /// Path recorded in the payload (defaults to the snapshot path)
    #[arg(long)]
    file_path: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_miette()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = config::load(&cli.config)?;

    let (args, input) = match cli.command {
        Commands::Decode(args) => (args, Input::Html),
        Commands::Roundtrip(args) => (args, Input::Markdown),
    };
    let args = RunArgs {
        snapshot: args.snapshot,
        out: args.out,
        file_path: args.file_path,
    };
    pipeline::run(args, input, config).await
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

fn init_miette() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    miette::set_panic_hook();
    Ok(())
}
