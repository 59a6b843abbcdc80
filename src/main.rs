//! UDTX - Device registration client
//!
//! Command line front end for the CDE node operations.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use udtx::config::{self, Config};
use udtx::protocol::{self, DeviceIdentifier};
use udtx::{ActivateNode, CdeClient};

/// UDTX - Device registration client
#[derive(Parser)]
#[command(name = "udtx")]
#[command(author = "UDTX Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Send UDTX node messages to the CDE", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Activate a node
    Activate {
        /// Node DNA in dashed-triplet form (e.g. A5F2-16D1-00A2)
        dna: String,

        /// Data consumer ID to assign to the node
        dcid: String,

        /// Use the specified DC Registration Number
        #[arg(short = 'r', long = "registration-number")]
        dcrn: Option<u32>,

        /// Name to give the node
        #[arg(short, long)]
        name: Option<String>,

        /// CDE host
        #[arg(long)]
        host: Option<String>,

        /// CDE port
        #[arg(short, long)]
        port: Option<u16>,

        /// Timeout for each network step (seconds)
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse a DNA string and show its wire value
    Dna {
        /// Node DNA in dashed-triplet form
        dna: String,
    },

    /// Show current configuration
    Config {
        /// Generate sample configuration
        #[arg(long)]
        generate: bool,

        /// Output path for generated config
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let (config, load_error) = match &cli.config {
        Some(config_path) => (Config::load(config_path)?, None),
        None => match Config::load_default() {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        },
    };

    // Initialize logging
    let filter = if cli.verbose || config.general.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Some(e) = load_error {
        tracing::warn!(
            "Ignoring unreadable configuration, using defaults ({}:{}, DCRN {}): {}",
            config.cde.host,
            config.cde.port,
            config.consumer.dcrn,
            e
        );
    }

    match cli.command {
        Commands::Activate {
            dna,
            dcid,
            dcrn,
            name,
            host,
            port,
            timeout,
            json,
        } => {
            let mut net_config = config.network();
            if let Some(host) = host {
                net_config.host = host;
            }
            if let Some(port) = port {
                net_config.port = port;
            }
            if let Some(secs) = timeout {
                net_config = net_config.with_timeout(Duration::from_secs(secs));
            }

            let node_name = name
                .or_else(|| config.consumer.node_name.clone())
                .unwrap_or_else(|| protocol::DEFAULT_NODE_NAME.to_string());
            let params = ActivateNode::new(dna, dcid)
                .dcrn(dcrn.unwrap_or(config.consumer.dcrn))
                .node_name(node_name);

            let client = CdeClient::new(net_config);
            let succeeded = match client.activate(params).await {
                Ok(activated) => {
                    if json {
                        println!("{}", json!({ "activated": true, "result": activated }));
                    } else {
                        println!("Node activated successfully");
                        if activated.test_mode {
                            println!("(test DCRN used: no action was performed)");
                        }
                    }
                    true
                }
                Err(e) => {
                    if json {
                        println!(
                            "{}",
                            json!({ "activated": false, "kind": e.kind(), "error": e.to_string() })
                        );
                    } else {
                        println!("{}", e);
                    }
                    false
                }
            };

            if !succeeded {
                std::process::exit(1);
            }
        }
        Commands::Dna { dna } => {
            let parsed = DeviceIdentifier::parse(&dna)?;
            println!("{} = {:#014x} ({})", parsed, parsed.as_u64(), parsed.as_u64());
        }
        Commands::Config { generate, output } => {
            if generate {
                let sample = config::generate_sample_config()?;
                if let Some(path) = output {
                    std::fs::write(&path, &sample)?;
                    println!("Configuration written to: {}", path.display());
                } else {
                    println!("{}", sample);
                }
            } else {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}
