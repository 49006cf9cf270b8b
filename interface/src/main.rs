// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The Carpocratian Church of Commonality and Equality, Inc.

//! privpass CLI
//!
//! Requests, stores and spends anonymous tokens from the command line.
//!
//! ```bash
//! export PRIVPASS_ISSUER_URL=http://localhost:8081
//! export PRIVPASS_ISSUER_PUBKEY=<base64url SEC1>
//!
//! privpass issue -n 10                       # request ten tokens
//! privpass count                             # tokens left
//! privpass redeem --host example.com --path /  # spend one, print the message
//! privpass verify --secret-key <b64> --host example.com --path / '<json>'
//! ```

use anyhow::{anyhow, bail, Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use clap::{Parser, Subcommand};
use colored::Colorize;
use privpass_client::config::clamp_batch;
use privpass_client::{
    BindingContext, ClientConfig, ConfigId, HttpTransport, Redemption, RedemptionVerifier,
    Session,
};
use privpass_common::api::RedemptionMsg;
use privpass_common::logging;
use privpass_crypto::DEFAULT_CONTEXT;
use std::path::PathBuf;
use tracing::debug;

/// privpass - anonymous token client
#[derive(Parser)]
#[command(name = "privpass")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Issuer URL
    #[arg(short, long, env = "PRIVPASS_ISSUER_URL")]
    url: Option<String>,

    /// Issuer configuration id
    #[arg(short, long, env = "PRIVPASS_CONFIG_ID")]
    config_id: Option<u32>,

    /// Token storage file
    #[arg(short, long, env = "PRIVPASS_STORAGE_PATH")]
    storage: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Request a batch of tokens from the issuer
    Issue {
        /// Number of tokens (clamped to 1..=100)
        #[arg(short, long)]
        n: Option<usize>,

        /// Fetch the issuer key from /.well-known/issuer when none is configured
        #[arg(long)]
        fetch_key: bool,
    },

    /// Show how many tokens are stored
    Count,

    /// List stored tokens
    List,

    /// Spend one token bound to a request
    Redeem {
        #[arg(long)]
        host: String,

        #[arg(long, default_value = "/")]
        path: String,
    },

    /// Check a redemption message with the issuer secret key
    Verify {
        /// Issuer secret key, base64url, 32 bytes
        #[arg(long, env = "PRIVPASS_ISSUER_SECRET_KEY")]
        secret_key: String,

        #[arg(long)]
        host: String,

        #[arg(long, default_value = "/")]
        path: String,

        /// Redemption message as printed by `redeem --format json`
        message: String,
    },

    /// Delete all stored tokens for the configuration
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("info");
    let cli = Cli::parse();

    let mut cfg = ClientConfig::from_env()?;
    if let Some(url) = cli.url {
        cfg.issuer_url = url;
    }
    if let Some(id) = cli.config_id {
        cfg.config_id = ConfigId(id);
    }
    if let Some(path) = cli.storage {
        cfg.storage_path = path;
    }
    debug!(?cfg, "resolved configuration");

    let format = cli.format;
    let config = cfg.config_id;

    match cli.command {
        Commands::Issue { n, fetch_key } => {
            let transport = HttpTransport::new(&cfg.issuer_url, cfg.request_timeout)?;
            if cfg.issuer_pubkey.is_none() && fetch_key {
                cfg.issuer_pubkey = Some(transport.fetch_issuer_key().await?);
            }
            if cfg.issuer_pubkey.is_none() && cfg.policy.require_proof {
                bail!("PRIVPASS_REQUIRE_PROOF is set but no issuer key is configured");
            }

            let session = Session::from_config(&cfg)?;
            let n = clamp_batch(n.unwrap_or(cfg.tokens_per_request));
            let stored = session
                .issue(config, n, &transport)
                .await
                .with_context(|| format!("issue from {}", cfg.issuer_url))?;
            let total = session.count(config)?;

            if format == OutputFormat::Json {
                println!(
                    "{}",
                    serde_json::json!({ "config_id": config.0, "issued": stored, "total": total })
                );
            } else {
                println!(
                    "{} {} of {} tokens stored for config {}",
                    "✓".green(),
                    stored.to_string().bold(),
                    n,
                    config
                );
                println!("{:.<25} {}", "Total", total);
            }
        }

        Commands::Count => {
            let session = Session::from_config(&cfg)?;
            let count = session.count(config)?;
            if format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "config_id": config.0, "count": count }));
            } else {
                println!("{:.<25} {}", format!("Config {}", config), count);
            }
        }

        Commands::List => {
            let session = Session::from_config(&cfg)?;
            let tokens = session.store().load(config)?.unwrap_or_default();
            if format == OutputFormat::Json {
                let stored: Vec<_> = tokens.iter().map(|t| t.to_stored()).collect();
                println!("{}", serde_json::to_string_pretty(&stored)?);
            } else {
                println!("{}", format!("Tokens for config {}", config).bold().underline());
                for (i, t) in tokens.iter().enumerate() {
                    let seed = t.seed.to_base64();
                    println!("{:>4}  {}…", i, &seed[..seed.len().min(16)]);
                }
                if tokens.is_empty() {
                    println!("{}", "none".dimmed());
                }
            }
        }

        Commands::Redeem { host, path } => {
            let session = Session::from_config(&cfg)?;
            let binding = BindingContext::from_request(&host, &path);
            let redemption = session.redeem(config, &binding)?;
            let msg = redemption.to_message();
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string(&msg)?);
            } else {
                println!("{} {}", "Data:".bold(), msg.data);
                println!("{} {}", "MAC:".bold(), msg.mac);
                println!("{:.<25} {}", "Remaining", session.count(config)?);
            }
        }

        Commands::Verify {
            secret_key,
            host,
            path,
            message,
        } => {
            let sk = Base64UrlUnpadded::decode_vec(&secret_key)
                .map_err(|e| anyhow!("secret key: {}", e))?;
            let verifier = RedemptionVerifier::from_secret_key(&sk, DEFAULT_CONTEXT)?;
            let msg: RedemptionMsg =
                serde_json::from_str(&message).context("parse redemption message")?;
            let redemption = Redemption::from_message(&msg)?;
            let binding = BindingContext::from_request(&host, &path);

            match verifier.verify(&redemption, &binding) {
                Ok(()) => println!("{} redemption valid", "✓".green()),
                Err(e) => {
                    println!("{} {}", "✗".red(), e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Clear => {
            let session = Session::from_config(&cfg)?;
            session.store().clear(config)?;
            println!("{} cleared config {}", "✓".green(), config);
        }
    }

    Ok(())
}
