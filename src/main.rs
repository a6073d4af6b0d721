use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::{Builder, Env};
use log::info;

use rouilleftps::core_cli::{Cli, Command};
use rouilleftps::core_queue::{JobOutcome, TransferJob, TransferJobQueue};
use rouilleftps::core_scan::ScanAgentClient;
use rouilleftps::{Config, FtpSession};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Cli::parse();

    // Initialize the logger with a custom format
    let default_level = if args.verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default_level))
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

    // Determine the default config path based on the OS
    let default_config_path = if cfg!(target_os = "windows") {
        "C:\\src\\rouilleftps\\etc\\rouilleftps.conf"
    } else {
        "/etc/rouilleftps.conf"
    };

    let config_path = if args.config.is_empty() {
        default_config_path
    } else {
        args.config.as_str()
    };
    let mut config = if Path::new(config_path).exists() {
        Config::load_from_file(config_path)
            .with_context(|| format!("Failed to load configuration: {}", config_path))?
    } else {
        Config::default()
    };

    // Override configuration from CLI where provided
    if let Some(host) = args.host {
        config.client.host = host;
    }
    if let Some(port) = args.port {
        config.client.port = port;
    }
    if let Some(user) = args.user {
        config.client.username = user;
    }
    if let Some(password) = args.password {
        config.client.password = password;
    }
    if args.active {
        config.client.passive = false;
    }
    if args.no_scan {
        config.scan.enabled = false;
    }

    let mut session = FtpSession::new(&config.client)?;
    if config.scan.enabled {
        session = session.with_scanner(ScanAgentClient::from_config(&config.scan));
    }

    session.connect().await?;
    if !session
        .login(&config.client.username, &config.client.password)
        .await?
    {
        bail!("Login failed for user {:?}", config.client.username);
    }

    match args.command {
        Command::List => {
            let listing = session.list().await?;
            println!("----List of files----");
            print!("{}", listing);
            println!("----------------------");
            session.quit().await?;
        }
        Command::Mkdir { name } => {
            let reply = session.mkd(&name).await?;
            info!("{}", reply);
            session.quit().await?;
        }
        Command::Rmdir { name } => {
            let reply = session.rmd(&name).await?;
            info!("{}", reply);
            session.quit().await?;
        }
        Command::Delete { name } => {
            let reply = session.dele(&name).await?;
            info!("{}", reply);
            session.quit().await?;
        }
        Command::Rename { from, to } => {
            let reply = session.rename(&from, &to).await?;
            info!("{}", reply);
            session.quit().await?;
        }
        Command::Pwd => {
            let reply = session.pwd().await?;
            println!("{}", reply.text);
            session.quit().await?;
        }
        Command::Size { name } => {
            let size = session.size(&name).await?;
            println!("{}", size);
            session.quit().await?;
        }
        Command::Stat => {
            let reply = session.stat().await?;
            println!("{}", reply);
            session.quit().await?;
        }
        // Transfers go through the job queue; the worker owns the session
        // and issues QUIT once the queue drains.
        Command::Put { local, remote } => {
            let remote = match remote {
                Some(remote) => remote,
                None => file_name_of(&local)?,
            };
            run_jobs(session, vec![TransferJob::UploadFile { local, remote }]).await?;
        }
        Command::Get { remote, local } => {
            let local = local.unwrap_or_else(|| PathBuf::from(base_name(&remote)));
            run_jobs(session, vec![TransferJob::DownloadFile { remote, local }]).await?;
        }
        Command::PutFolder { local, remote } => {
            let remote = match remote {
                Some(remote) => remote,
                None => file_name_of(&local)?,
            };
            run_jobs(session, vec![TransferJob::UploadFolder { local, remote }]).await?;
        }
        Command::GetFolder { remote, local } => {
            let local = local.unwrap_or_else(|| PathBuf::from(base_name(&remote)));
            run_jobs(session, vec![TransferJob::DownloadFolder { remote, local }]).await?;
        }
    }

    Ok(())
}

async fn run_jobs(session: FtpSession, jobs: Vec<TransferJob>) -> Result<()> {
    let (queue, mut reports) = TransferJobQueue::start(session);
    for job in jobs {
        queue
            .enqueue(job)
            .context("Failed to enqueue transfer job")?;
    }
    queue.shutdown();
    queue.join().await;

    let mut failed = Vec::new();
    while let Ok(report) = reports.try_recv() {
        match report.outcome {
            JobOutcome::Completed => info!("Completed: {}", report.job),
            JobOutcome::Rejected(reason) => {
                failed.push(format!("{}: rejected by malware scan: {}", report.job, reason))
            }
            JobOutcome::Failed(reason) => failed.push(format!("{}: {}", report.job, reason)),
        }
    }
    if !failed.is_empty() {
        bail!("{}", failed.join("; "));
    }
    Ok(())
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .with_context(|| format!("Path has no file name: {}", path.display()))
}

fn base_name(remote: &str) -> String {
    remote.rsplit('/').next().unwrap_or(remote).to_string()
}
