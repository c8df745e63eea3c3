//! Stride Control - CLI client for the Stride progress engine
//!
//! Resolves the actor, applies achievement events and edits state slices
//! against the local cache, replicating to the remote store before exit.

mod cli;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, SliceCommands};
use serde_json::Value;
use std::sync::Arc;
use stride_common::{AchievementEvent, LocalCache, MemoryCache, SqliteCache, StrideConfig};
use stride_sync::{HttpRemoteStore, Session};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Log filter variable, `RUST_LOG` syntax
const LOG_ENV: &str = "STRIDE_LOG";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => StrideConfig::load_from(path),
        None => StrideConfig::load(),
    };

    let cache = open_cache(&config);
    let store = Arc::new(
        HttpRemoteStore::new(&config.remote).context("Failed to set up remote store")?,
    );
    let hint = cli.host_hint();

    let session = Session::bootstrap(&config, cache, store, hint.as_ref()).await;
    let result = run(&cli, &config, &session).await;
    session.shutdown();
    result
}

/// Durable cache when possible, memory-only otherwise
fn open_cache(config: &StrideConfig) -> Arc<dyn LocalCache> {
    let path = config.cache.db_path();
    match SqliteCache::open(&path) {
        Ok(cache) => {
            debug!("Local cache at {}", path.display());
            Arc::new(cache)
        }
        Err(e) => {
            warn!(
                "Cannot open local cache at {}, progress will not persist: {}",
                path.display(),
                e
            );
            Arc::new(MemoryCache::new())
        }
    }
}

async fn run(cli: &Cli, config: &StrideConfig, session: &Session) -> Result<()> {
    let level_xp_unit = config.progress.level_xp_unit;

    match &cli.command {
        Commands::Whoami { json } => {
            let profile = session.profile();
            if *json {
                println!("{}", serde_json::to_string_pretty(&profile)?);
            } else {
                output::print_profile(session.identity(), &profile, level_xp_unit);
                if let Some(guest_id) = session.upgraded_from() {
                    println!("  guest progress from {} merged", guest_id);
                }
            }
        }

        Commands::Award { event_id, xp, coins } => {
            let before = session.profile();
            let after = session.apply_event(&AchievementEvent::new(event_id, *xp, *coins));
            output::print_award(event_id, &before, &after);
            if session.ledger().pending_count() > 0 {
                output::print_outcome("ledger", session.ledger().force_sync().await);
            }
        }

        Commands::Slice { action } => match action {
            SliceCommands::Get { key } => {
                let slice = session.slice(key, Value::Null);
                println!("{}", serde_json::to_string_pretty(&slice.read())?);
            }
            SliceCommands::Set { key, json } => {
                let value: Value = serde_json::from_str(json)
                    .with_context(|| format!("Slice value for '{}' is not valid JSON", key))?;
                let slice = session.slice(key, Value::Null);
                slice.write(value);
                output::print_outcome(key, slice.force_sync().await);
            }
        },

        Commands::Sync => {
            output::print_outcome("ledger", session.ledger().force_sync().await);
        }

        Commands::Status => {
            output::print_status(
                session.is_degraded(),
                session.cache_degraded(),
                session.ledger().pending_count(),
                session.ledger().status(),
                session.issues(),
            );
        }
    }

    Ok(())
}
