//! Command-line access to the Start2Pay gateway.
//!
//! Subcommands:
//! - `context` – create a payment context
//! - `command` – send any signed command
//! - `sign` – print the signed payload without sending it
//! - `verify-callback` – check the signature of a callback body
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `CONFIG` sets the configuration file (default `config.json`)
//! - `RUST_LOG` controls log output (default `info`)

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use start2pay::{Config, ParamTree, PaymentDirection, Start2PayClient};

#[derive(Parser, Debug)]
#[command(name = "start2pay")]
#[command(about = "Start2Pay gateway client")]
struct CliArgs {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "CONFIG", default_value = "config.json")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a payment context and print the gateway response
    Context {
        /// JSON file with the request parameters
        #[arg(long)]
        params: PathBuf,
    },
    /// Send a signed command to an arbitrary gateway path
    Command {
        /// Gateway path, e.g. /pay_context/create
        #[arg(long)]
        uri: String,
        #[arg(long, default_value = "in")]
        direction: PaymentDirection,
        #[arg(long)]
        params: PathBuf,
    },
    /// Print the signed payload without contacting the gateway
    Sign {
        #[arg(long)]
        params: PathBuf,
        #[arg(long, default_value = "in")]
        direction: PaymentDirection,
    },
    /// Verify a callback body; exits with code 2 when the signature is invalid
    VerifyCallback {
        /// File with the raw JSON callback body
        #[arg(long)]
        payload: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

async fn read_params(path: &Path) -> Result<ParamTree, Box<dyn std::error::Error>> {
    let content = tokio::fs::read_to_string(path).await?;
    let value: Value = serde_json::from_str(&content)?;
    ParamTree::try_from(value)
        .map_err(|_| format!("{}: parameters must be a JSON object", path.display()).into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_tracing();

    let cli_args = CliArgs::parse();
    let config = Config::load_from_path(&cli_args.config)?;
    let client = Start2PayClient::try_new(&config)?;
    tracing::debug!(host = %client.credentials().host(), "Client ready");

    match cli_args.command {
        Command::Context { params } => {
            let response = client.get_context(read_params(&params).await?).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Command {
            uri,
            direction,
            params,
        } => {
            let response = client
                .send_command(read_params(&params).await?, &uri, direction)
                .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Sign { params, direction } => {
            let signed = client.prepare_command(read_params(&params).await?, direction);
            println!("{}", serde_json::to_string_pretty(&signed.payload())?);
        }
        Command::VerifyCallback { payload } => {
            let body = tokio::fs::read_to_string(&payload).await?;
            if client.verify_callback(&body)? {
                println!("valid");
            } else {
                println!("invalid");
                std::process::exit(2);
            }
        }
    }

    Ok(())
}
