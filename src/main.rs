mod cli;
mod config;
mod forms;
mod profile;
mod session;
mod storage;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::cell::RefCell;
use std::path::PathBuf;
use storage::{FileStorage, MemoryStorage, Storage};

#[derive(Parser)]
#[command(name = "vxfb", about = "Session manager for the vxfb video editor")]
pub struct Args {
    #[arg(long, help = "Config file path")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "VXFB_STORAGE", help = "Local storage file")]
    pub storage: Option<PathBuf>,

    #[arg(long, help = "Keep the session in memory only")]
    pub ephemeral: bool,

    #[arg(short, long, help = "Log session changes")]
    pub verbose: bool,

    #[arg(long, help = "Debug output (storage and config details)")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in with any email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        password: String,
    },
    /// Create an account and log in
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        password: String,
        #[arg(long, default_value = "")]
        confirm_password: String,
    },
    /// Log out and clear the stored session
    Logout,
    /// Show who is logged in
    Status {
        #[arg(long, help = "Print { user, isLoggedIn } as JSON")]
        json: bool,
    },
    /// Show the profile of the logged-in user
    Profile {
        #[arg(long)]
        json: bool,
    },
    /// Interactive shell (default)
    Shell,
}

/// Storage file to use: `--storage` (or `VXFB_STORAGE`), then the config's
/// `[storage] path`, then ~/.vxfb/local_storage.json. None with `--ephemeral`.
fn storage_path(args: &Args, cfg: &config::Config) -> Result<Option<PathBuf>> {
    if args.ephemeral {
        return Ok(None);
    }
    let path = args
        .storage
        .clone()
        .or_else(|| cfg.storage.path.clone())
        .or_else(FileStorage::default_path)
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory. Use --storage <path>."))?;
    Ok(Some(path))
}

fn open_storage(args: &Args, cfg: &config::Config) -> Result<(Box<dyn Storage>, Option<PathBuf>)> {
    match storage_path(args, cfg)? {
        Some(path) => {
            let storage = FileStorage::open(&path)?;
            Ok((Box::new(storage), Some(path)))
        }
        None => Ok((Box::new(MemoryStorage::new()), None)),
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let cfg = if let Some(config_path) = &args.config {
        config::Config::load_from(config_path)?
    } else {
        config::Config::load()?
    };

    let level = if args.debug {
        tracing::Level::DEBUG
    } else if args.verbose {
        tracing::Level::INFO
    } else {
        cfg.log_level().unwrap_or(tracing::Level::WARN)
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(errors) = cfg.validate() {
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        return Err(anyhow::anyhow!(
            "Invalid configuration:\n  {}",
            details.join("\n  ")
        ));
    }

    let (storage, storage_path) = open_storage(&args, &cfg)?;

    tracing::debug!(
        storage = ?storage_path,
        key = cfg.session_key(),
        "initializing session"
    );

    let store = session::SessionStore::initialize(storage, cfg.session_key())
        .context("restoring session")?;

    let ctx = cli::Context {
        config: cfg,
        storage_path,
        store: RefCell::new(store),
    };

    match &args.command {
        Some(command) => cli::run_command(&ctx, command),
        None => cli::run_repl(&ctx),
    }
}
