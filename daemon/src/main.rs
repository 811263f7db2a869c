//! nparse - live EverQuest log tailing and location sharing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nparse::Error;

mod cli;

#[derive(Parser)]
#[command(name = "nparse")]
#[command(about = "nparse - live EverQuest log tailing and location sharing")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to <config dir>/nparse/nparse.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Tail the active log and share locations until Ctrl-C
    Run,

    /// Show resolved paths and sharing configuration
    Status,
}

fn main() -> Result<(), Error> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(
            "nparse=info"
                .parse()
                .map_err(|e| Error::ConfigParse(format!("log filter: {e}")))?,
        ))
        .init();

    let cli = Cli::parse();

    match cli.command {
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
        Some(Commands::Run) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async {
                if let Err(e) = cli::daemon::run(cli.config).await {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            });
        }
        Some(Commands::Status) => {
            let exit_code = cli::status::run(cli.config)?;
            if exit_code != 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}
