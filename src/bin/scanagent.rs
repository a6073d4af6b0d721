use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Builder, Env};

use rouilleftps::core_scan::agent;
use rouilleftps::Config;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "scanagent", about = "Malware-scanning agent for rouilleftps.")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "")]
    config: String,

    /// Keep serving connections instead of exiting after one
    #[arg(long)]
    r#loop: bool,

    /// External scanner command (overrides the configuration file)
    #[arg(long)]
    scanner: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let timestamp = buf.timestamp();
            writeln!(
                buf,
                "[{}] [{}] {}",
                timestamp,
                record.level(),
                record.args()
            )
        })
        .init();

    let mut config = if !args.config.is_empty() && Path::new(&args.config).exists() {
        Config::load_from_file(&args.config)
            .with_context(|| format!("Failed to load configuration: {}", args.config))?
    } else {
        Config::default()
    };

    if args.r#loop {
        config.scan.loop_forever = true;
    }
    if let Some(scanner) = args.scanner {
        config.scan.scanner_command = scanner;
    }

    agent::run(&config.scan)
        .await
        .context("Scan agent terminated with an error")?;
    Ok(())
}
