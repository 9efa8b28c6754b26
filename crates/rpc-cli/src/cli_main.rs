use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rpc_core::{init_tracing, Config};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::run::{call, serve};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
pub struct Cli {
    /// Path to config file
    #[clap(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[clap(long, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the built-in methods (ping, echo, sum, log) on stdin/stdout
    Serve,

    /// Call a method on a server started as a child process
    Call {
        /// Method to call
        method: String,

        /// Params as JSON text
        #[clap(long)]
        params: Option<String>,

        /// Give up after this many milliseconds
        #[clap(long, value_name = "MS")]
        timeout_ms: Option<u64>,

        /// Server command and its arguments
        #[clap(last = true, required = true)]
        command: Vec<String>,
    },
}

pub async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(cli.config.as_deref())?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    // stdout carries protocol traffic, so the log file path goes to stderr
    let log_file = init_tracing(&config.logging);
    if cli.verbose {
        eprintln!("Log file: {}", log_file.display());
    }
    debug!("Starting rpc with {:?}", cli.command);

    match cli.command {
        Commands::Serve => serve(&config).await,
        Commands::Call {
            method,
            params,
            timeout_ms,
            command,
        } => {
            let params = parse_params(params.as_deref())?;
            let timeout = timeout_ms.map(Duration::from_millis);
            match call(&config, &method, params, timeout, &command).await {
                Ok(result) => {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                    Ok(())
                }
                Err(e) => {
                    debug!("Call failed: {:#}", e);
                    eprintln!("Error: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

fn parse_params(params: Option<&str>) -> Result<Option<Value>> {
    params
        .map(|text| serde_json::from_str(text).context("--params is not valid JSON"))
        .transpose()
}
