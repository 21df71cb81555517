//! Entry point for the Rust Upstream Pool tooling

use clap::{Parser, Subcommand};
use rust_upstream_pool::{
    cli::BenchArgs, init_logger_with_config, runtime::run_with_runtime, AppConfig,
};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "rust-upstream-pool")]
#[command(about = "Bounded LRU pool of outbound connections, one per destination")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log filter: a level (trace, debug, info, warn, error) or RUST_LOG-style directives
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run concurrent callers against a URL list, pooled or direct
    #[command(name = "bench")]
    Bench(BenchArgs),

    /// Print the effective configuration
    #[command(name = "config")]
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_config(cli.config.as_deref())?;
    if cli.verbose {
        config.log_level = "debug".to_string();
    } else if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }

    init_logger_with_config(&config.log_level);

    let runtime_config = config.runtime.clone();
    run_with_runtime(&runtime_config, async_main(cli.command, config))
}

async fn async_main(command: Commands, config: AppConfig) -> anyhow::Result<()> {
    match command {
        Commands::Bench(args) => {
            info!("🚀 Starting bench");
            info!("📋 Version: {}", env!("CARGO_PKG_VERSION"));

            match args.execute(&config).await {
                Ok(report) => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                    Ok(())
                }
                Err(e) => {
                    error!("Bench failed: {}", e);
                    Err(e)
                }
            }
        }
        Commands::Config => {
            println!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
    }
}
