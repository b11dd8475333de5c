//! CLI for simulating responsibility tracking

use clap::{Parser, Subcommand};
use minidht::common::Config;
use minidht::sim::Simulation;
use minidht::Number160;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "minidht")]
#[command(about = "minidht replication responsibility tools")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./minidht.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an in-process overlay with membership churn
    Simulate {
        /// Initial number of peers
        #[arg(long)]
        peers: Option<usize>,

        /// Number of content keys
        #[arg(long)]
        keys: Option<usize>,

        /// Membership changes to apply
        #[arg(long)]
        rounds: Option<usize>,

        /// RNG seed
        #[arg(long)]
        seed: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the 160-bit identifier of a content key
    KeyId {
        /// Key name
        key: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Simulate {
            peers,
            keys,
            rounds,
            seed,
            json,
        } => {
            // CLI arguments override the config file
            if let Some(peers) = peers {
                config.simulation.peers = peers;
            }
            if let Some(keys) = keys {
                config.simulation.keys = keys;
            }
            if let Some(rounds) = rounds {
                config.simulation.churn_rounds = rounds;
            }
            if let Some(seed) = seed {
                config.simulation.seed = seed;
            }

            let report = Simulation::new(config.simulation, config.ledger)?.run()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Simulation report:");
                println!("  Peers online: {}", report.peers_online);
                println!("  Keys: {}", report.keys);
                println!("  Joins / leaves: {} / {}", report.joins, report.leaves);
                println!("  Sweeps: {}", report.sweeps);
                println!("  Became responsible: {}", report.me_responsible);
                println!("  Handed over: {}", report.other_responsible);
                println!(
                    "  Converged: {} ({} divergent entries)",
                    report.converged(),
                    report.divergent_entries
                );
            }
            if !report.converged() {
                anyhow::bail!("ledgers did not converge");
            }
        }

        Commands::KeyId { key } => {
            println!("{}", Number160::from_key(&key));
        }
    }

    Ok(())
}
