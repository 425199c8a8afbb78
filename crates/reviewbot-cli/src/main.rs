use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use reviewbot_core::{ClaimKey, DiffChange};
use reviewbot_runner::Settings;
use reviewbot_storage::{content_hash, ClaimStore};
use reviewbot_storage_sqlite::{SqliteClaimStore, SqliteResultCache};

#[derive(Parser)]
#[command(name = "reviewbot", version)]
struct Cli {
    /// Settings file (defaults to ./reviewbot.toml; environment variables override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default settings file and create both databases
    Init,

    /// Load and validate settings, then open the stores
    Doctor,

    /// Inspect or repair refactor-suggestion claims
    Claim {
        #[command(subcommand)]
        cmd: ClaimCommand,
    },

    /// Inspect the review result cache
    Cache {
        #[command(subcommand)]
        cmd: CacheCommand,
    },
}

#[derive(Subcommand)]
enum ClaimCommand {
    Status {
        #[arg(long)]
        project: i64,
        #[arg(long)]
        mr: i64,
    },
    Complete {
        #[arg(long)]
        project: i64,
        #[arg(long)]
        mr: i64,
    },
    /// Drop a queued claim so the next open event can retry
    Release {
        #[arg(long)]
        project: i64,
        #[arg(long)]
        mr: i64,
    },
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Print the content hash of a JSON array of changes
    Key {
        #[arg(long)]
        changes: PathBuf,
    },
    /// Print the cached result for a JSON array of changes
    Show {
        #[arg(long)]
        changes: PathBuf,
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = match &cli.config {
        Some(p) => p.clone(),
        None => Settings::config_path(&std::env::current_dir()?),
    };

    match cli.cmd {
        Command::Init => {
            init_tracing("info");
            init(&config_path)?;
        }
        Command::Doctor => {
            let settings = load_settings(&config_path)?;
            let _ = SqliteResultCache::open(&settings.storage.review_cache_path())?;
            let _ = SqliteClaimStore::open(&settings.storage.claim_state_path())?;
            let source = if config_path.exists() {
                config_path.display().to_string()
            } else {
                "defaults".to_string()
            };
            println!("settings: {}", source);
            println!("llm: {} / {}", settings.llm.provider, settings.llm.model);
            println!(
                "features: merge_request_review={} push_review={} refactor_suggestion={}",
                settings.features.merge_request_review,
                settings.features.push_review,
                settings.features.refactor_suggestion
            );
            println!("OK");
        }
        Command::Claim { cmd } => {
            let settings = load_settings(&config_path)?;
            let store = SqliteClaimStore::open(&settings.storage.claim_state_path())?;
            match cmd {
                ClaimCommand::Status { project, mr } => {
                    let key = ClaimKey::new(project, mr);
                    match store.record(key)? {
                        Some(rec) => println!(
                            "{} {} (updated {})",
                            rec.key,
                            rec.status.as_str(),
                            rec.updated_at
                        ),
                        None => println!("{} unclaimed", key),
                    }
                }
                ClaimCommand::Complete { project, mr } => {
                    let key = ClaimKey::new(project, mr);
                    store.mark_completed(key);
                    println!("{} -> {:?}", key, store.get_status(key));
                }
                ClaimCommand::Release { project, mr } => {
                    let key = ClaimKey::new(project, mr);
                    store.release_claim(key);
                    println!("{} -> {:?}", key, store.get_status(key));
                }
            }
        }
        Command::Cache { cmd } => match cmd {
            CacheCommand::Key { changes } => {
                println!("{}", content_hash(&read_changes(&changes)?));
            }
            CacheCommand::Show { changes, provider, model } => {
                let settings = load_settings(&config_path)?;
                let cache = SqliteResultCache::open(&settings.storage.review_cache_path())?;
                let provider = provider.unwrap_or_else(|| settings.llm.provider.clone());
                let model = model.unwrap_or_else(|| settings.llm.model.clone());
                let hash = content_hash(&read_changes(&changes)?);
                match cache.read(&provider, &model, &hash)? {
                    Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                    None => println!("miss: {} {} {}", provider, model, hash),
                }
            }
        },
    }

    Ok(())
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Settings from file and environment; installs the subscriber at the configured level.
fn load_settings(config_path: &Path) -> Result<Settings> {
    let settings = Settings::load_with_process_env(Some(config_path))?;
    let level = settings.log_directive();
    init_tracing(level.unwrap_or("info"));
    if level.is_none() {
        warn!(log_level = %settings.log_level, "unknown log level, using info");
    }
    Ok(settings)
}

fn init(config_path: &Path) -> Result<()> {
    if !config_path.exists() {
        Settings::default().save_to(config_path)?;
    }
    let settings = Settings::load_with_process_env(Some(config_path))?;
    let _ = SqliteResultCache::open(&settings.storage.review_cache_path())?;
    let _ = SqliteClaimStore::open(&settings.storage.claim_state_path())?;
    println!("Initialized reviewbot at {}", config_path.display());
    Ok(())
}

fn read_changes(path: &Path) -> Result<Vec<DiffChange>> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse changes in {}", path.display()))
}
