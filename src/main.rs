//! metric-zipper
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                    METRIC ZIPPER                     │
//!                    │                                                      │
//!   find / render /  │  ┌─────────┐   ┌─────────┐   ┌──────────────────┐    │
//!   info ────────────┼─▶│  http   │──▶│ routing │──▶│  cache lookup    │    │
//!                    │  │ server  │   │(search?)│   │ (path / search)  │    │
//!                    │  └─────────┘   └─────────┘   └────────┬─────────┘    │
//!                    │                                       │ miss         │
//!                    │                                       ▼              │
//!                    │                              ┌──────────────────┐    │
//!                    │                              │  scatter-gather  │────┼──▶ backends
//!                    │                              │ (limiter/backend)│◀───┼─── (JSON API)
//!                    │                              └────────┬─────────┘    │
//!                    │                                       ▼              │
//!   merged reply ◀───┼───────────────────────────────  merge + Stats        │
//!                    │                                                      │
//!                    │  config · observability · lifecycle · admin          │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use metric_zipper::config::load_config;
use metric_zipper::lifecycle::startup;

#[derive(Parser)]
#[command(name = "metric-zipper", version, about = "Metrics query aggregator")]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Write the process id to this file while running
    #[arg(long)]
    pid: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("metric-zipper: {}: {}", args.config.display(), e);
            std::process::exit(1);
        }
    };

    startup::run(config, args.pid).await?;
    Ok(())
}
