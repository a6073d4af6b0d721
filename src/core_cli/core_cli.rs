use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "rouilleftps", about = "A secure FTP client written in Rust.")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "")]
    pub config: String,

    /// FTP server host (overrides the configuration file)
    #[arg(long)]
    pub host: Option<String>,

    /// FTP server port
    #[arg(long)]
    pub port: Option<u16>,

    /// Username (overrides the configuration file)
    #[arg(short, long)]
    pub user: Option<String>,

    /// Password (overrides the configuration file)
    #[arg(short = 'P', long)]
    pub password: Option<String>,

    /// Use active (PORT) mode instead of passive
    #[arg(long)]
    pub active: bool,

    /// Skip the malware scan before uploads
    #[arg(long)]
    pub no_scan: bool,

    /// Enable verbose mode
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the current remote directory
    List,
    /// Upload a file (scanned first)
    Put {
        local: PathBuf,
        /// Remote name; defaults to the local file name
        remote: Option<String>,
    },
    /// Download a file
    Get {
        remote: String,
        /// Local path; defaults to the remote name
        local: Option<PathBuf>,
    },
    /// Upload a directory tree (every file scanned first)
    PutFolder {
        local: PathBuf,
        /// Remote name; defaults to the local directory name
        remote: Option<String>,
    },
    /// Download a directory tree
    GetFolder {
        remote: String,
        /// Local path; defaults to the remote name
        local: Option<PathBuf>,
    },
    /// Create a remote directory
    Mkdir { name: String },
    /// Remove a remote directory
    Rmdir { name: String },
    /// Delete a remote file
    Delete { name: String },
    /// Rename a remote file
    Rename { from: String, to: String },
    /// Print the remote working directory
    Pwd,
    /// Print the size of a remote file
    Size { name: String },
    /// Print server status
    Stat,
}
