//! handsfree-pager - turn sheet-music pages with blinks and head shakes.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use handsfree_pager::backend::{self, BackendType};
use handsfree_pager::config::{self as pager_config, PagerConfig};
use handsfree_pager::policy::Instrument;

#[derive(Parser, Debug)]
#[command(
    name = "handsfree-pager",
    about = "Hands-free sheet-music page turning from facial gestures"
)]
struct Cli {
    /// Instrument whose default policy applies
    #[arg(long, default_value = "piano")]
    instrument: String,

    /// Policy file (s-expression) overriding the instrument default
    #[arg(long)]
    policy_file: Option<PathBuf>,

    /// Secondary gesture sensitivity, 0.0 (conservative) to 1.0 (permissive)
    #[arg(long, default_value_t = 0.5)]
    sensitivity: f64,

    /// Seconds a secondary gesture must be held before it triggers
    #[arg(long, default_value_t = 0.15)]
    min_gesture_duration: f64,

    /// Minimum producer confidence for a secondary gesture reading
    #[arg(long, default_value_t = 0.5)]
    min_confidence: f64,

    /// Live-mode event loop poll interval in milliseconds
    #[arg(long, default_value_t = 50)]
    poll_interval_ms: u64,

    /// Log at debug level
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a recorded frame trace on a virtual clock
    Replay { path: PathBuf },
    /// Read frames from stdin and page in real time
    Live,
    /// Print the active policy, or save/clear the policy file
    Policy {
        /// Write the active policy to this file
        #[arg(long)]
        save: Option<PathBuf>,
        /// Remove the policy file so the instrument default applies
        #[arg(long)]
        clear: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "handsfree_pager=debug"
    } else {
        "handsfree_pager=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(instrument) = Instrument::from_str(&cli.instrument) else {
        let known: Vec<&str> = Instrument::ALL.iter().map(|i| i.as_str()).collect();
        eprintln!("Unknown instrument: {}. Use one of: {}", cli.instrument, known.join(", "));
        std::process::exit(1);
    };

    let config = PagerConfig {
        sensitivity: cli.sensitivity,
        min_gesture_duration_s: cli.min_gesture_duration,
        min_confidence: cli.min_confidence,
        instrument,
        policy_file: cli.policy_file,
        poll_interval_ms: cli.poll_interval_ms,
        ..PagerConfig::default()
    };

    info!("handsfree-pager v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Replay { path } => backend::run(BackendType::Replay(path), &config),
        Command::Live => backend::run(BackendType::Live, &config),
        Command::Policy { save, clear } => {
            if clear {
                let path = config
                    .policy_file
                    .as_deref()
                    .context("--clear needs --policy-file")?;
                return pager_config::clear_policy_file(path);
            }
            let policy = config.load_policy()?;
            if let Some(path) = save {
                pager_config::save_policy_file(&path, &policy)?;
            }
            println!("{}", policy.to_sexp());
            Ok(())
        }
    }
}
