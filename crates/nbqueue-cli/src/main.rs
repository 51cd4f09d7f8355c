//! nbqueue CLI - Run notebook chunks through the execution queue.

mod chunks;
mod colors;
mod run;
mod terminal;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "nbqueue")]
#[command(about = "Queue and run code chunks of fenced markdown notebooks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all chunks (or one) against the loopback engine
    Run {
        /// Path to the notebook (.md file)
        notebook: PathBuf,

        /// Run only the chunk with this label or id
        #[arg(long)]
        chunk: Option<String>,

        /// Report every statement separately instead of whole chunks
        #[arg(long)]
        single: bool,

        /// Give up if the queue has not drained after this many milliseconds
        #[arg(long, default_value = "30000")]
        timeout_ms: u64,

        /// Delay between engine events, in milliseconds
        #[arg(long, default_value = "0")]
        step_delay_ms: u64,
    },

    /// List the chunks of a notebook
    Chunks {
        /// Path to the notebook (.md file)
        notebook: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            notebook,
            chunk,
            single,
            timeout_ms,
            step_delay_ms,
        } => {
            let options = run::RunOptions {
                chunk,
                single,
                timeout_ms,
                step_delay_ms,
            };
            run::execute(&notebook, options).await?;
        }

        Commands::Chunks { notebook } => chunks::execute(&notebook)?,
    }

    Ok(())
}
