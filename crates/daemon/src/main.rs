// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! wfhd: runs the scripted scenario in [`wfh_daemon::run_scenario`] against
//! an in-memory shard and reports what happened. A real deployment would
//! replace the scenario with an RPC listener in front of the same
//! [`wfh_engine::Engine`]; that listener is out of scope here (spec §1
//! Non-goals).

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;

use tracing::{error, info};
use wfh_core::ShardConfig;

fn load_config() -> ShardConfig {
    match std::env::var("WFH_CONFIG_PATH") {
        Ok(path) => match ShardConfig::load(&PathBuf::from(&path)) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("error: failed to load config from {path}: {err}");
                std::process::exit(1);
            }
        },
        Err(_) => ShardConfig::from_env(),
    }
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("wfhd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("wfhd {}", env!("CARGO_PKG_VERSION"));
                println!("Per-shard workflow history engine daemon");
                println!();
                println!("USAGE:");
                println!("    wfhd");
                println!();
                println!("Runs a scripted workflow through the in-memory engine and exits.");
                println!("There is no RPC listener in this build; wire `wfh_daemon::run_scenario`");
                println!("collaborators to real storage and a transport to serve traffic.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: wfhd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    setup_logging();
    let config = load_config();
    info!(conditional_retry_count = config.conditional_retry_count, "starting wfhd");

    match wfh_daemon::run_scenario().await {
        Ok(outcome) => {
            info!(
                run_id = %outcome.run_id,
                final_next_event_id = outcome.final_next_event_id.0,
                final_close_status = ?outcome.final_close_status,
                "scenario completed"
            );
            println!("{outcome:?}");
            Ok(())
        }
        Err(err) => {
            error!(%err, "scenario failed");
            Err(err.into())
        }
    }
}
