use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use facegate_core::{select_random_challenge, Action, EngineConfig, Severity};
use facegate_session::{load_engine_config, Config};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

mod simulate;

#[derive(Parser)]
#[command(name = "facegate", version, about = "Facegate liveness engine tools")]
struct Cli {
    /// Engine config TOML (defaults to FACEGATE_CONFIG / FACEGATE_* variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a scripted frame feed through the engine
    Simulate {
        /// JSON script of timestamped frames and button presses
        script: PathBuf,
        /// Force a single-action challenge
        #[arg(long, value_enum)]
        challenge: Option<ActionArg>,
        /// Seed for challenge selection
        #[arg(long)]
        seed: Option<u64>,
        /// Enable a capture button instead of the countdown
        #[arg(long)]
        manual: bool,
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sample challenges from the configured pool
    Challenge {
        #[arg(long, default_value_t = 5)]
        count: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print the effective engine configuration as TOML
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum ActionArg {
    LookStraight,
    Blink,
    Smile,
    HeadShake,
}

impl From<ActionArg> for Action {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::LookStraight => Action::LookStraight,
            ActionArg::Blink => Action::Blink,
            ActionArg::Smile => Action::Smile,
            ActionArg::HeadShake => Action::HeadShake,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let engine_config = load_config(cli.config)?;

    match cli.command {
        Command::Simulate {
            script,
            challenge,
            seed,
            manual,
            json,
        } => {
            let script = simulate::load_script(&script)?;
            let options = simulate::Options {
                seed,
                challenge: challenge.map(Action::from),
                manual,
            };
            let report = simulate::simulate(engine_config, &script, &options);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Command::Challenge { count, seed } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            for _ in 0..count {
                let challenge = select_random_challenge(&engine_config.challenges, &mut rng);
                let steps: Vec<String> = challenge.sequence.iter().map(|a| a.to_string()).collect();
                println!("{}", steps.join(" -> "));
            }
        }
        Command::Config => {
            let text = toml::to_string_pretty(&engine_config).context("failed to render config")?;
            print!("{text}");
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<EngineConfig> {
    match path {
        Some(path) => Ok(load_engine_config(&path)?),
        None => Ok(Config::from_env()?.engine),
    }
}

fn print_report(report: &simulate::Report) {
    if let Some(challenge) = &report.challenge {
        let steps: Vec<String> = challenge.iter().map(|a| a.to_string()).collect();
        println!("challenge: {}", steps.join(" -> "));
    }
    for record in &report.records {
        println!(
            "{:>7}ms  {:<7}  {}",
            record.at_ms,
            severity_label(record.status.severity()),
            record.message
        );
    }
    println!();
    match &report.captured {
        Some(path) => println!(
            "captured {} after {} attempt(s)",
            path, report.capture_attempts
        ),
        None => println!("no capture ({} attempt(s))", report.capture_attempts),
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "info",
        Severity::Success => "success",
        Severity::Warning => "warning",
        Severity::Error => "error",
    }
}
