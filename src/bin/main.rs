use clap::{Parser, Subcommand};
use edit_provenance::config::{EngineConfig, default_settings};
use edit_provenance::replay::{Trace, replay};
use std::path::PathBuf;

/// Attribute document text to the sources of the edits that produced it
#[derive(Parser)]
#[command(name = "edit-provenance")]
#[command(version)]
#[command(about = "Attribute document text to the sources of the edits that produced it")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded edit trace and print the attribution as JSON
    Replay {
        /// Path to the trace file (JSON)
        trace: PathBuf,

        /// Configuration file (default: the user config, if present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Print the default configuration as TOML
    Defaults,
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            trace,
            config,
            pretty,
        } => {
            let config = match config {
                Some(path) => EngineConfig::load(&path),
                None => EngineConfig::load_user(),
            }
            .unwrap_or_else(|e| fail(e));
            let trace = Trace::load(&trace).unwrap_or_else(|e| fail(e));

            let report = replay(&trace, config).await.unwrap_or_else(|e| fail(e));
            let json = if pretty {
                serde_json::to_string_pretty(&report)
            } else {
                serde_json::to_string(&report)
            };
            match json {
                Ok(json) => println!("{}", json),
                Err(e) => fail(e),
            }
        }
        Commands::Defaults => match toml::to_string_pretty(&default_settings()) {
            Ok(toml) => print!("{}", toml),
            Err(e) => fail(e),
        },
    }
}
