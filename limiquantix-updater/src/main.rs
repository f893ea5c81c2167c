//! # limiquantix Updater
//!
//! Console companion of the OTA update lifecycle. It reads the same state
//! file the lifecycle controller persists to.
//!
//! ## Usage
//! ```bash
//! limiquantix-updater status
//! limiquantix-updater pages --config /etc/limiquantix/updater.yaml
//! limiquantix-updater enroll accept
//! limiquantix-updater reset
//! ```

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use limiquantix_updater::config::{UpdaterConfig, DEFAULT_CONFIG_PATH};
use limiquantix_updater::controller::{resolve_stored_phase, LifecycleController};
use limiquantix_updater::orchestrator::MainsPowered;
use limiquantix_updater::store::{FileStore, PersistedState};

mod cli;

use cli::{Args, Command, EnrollChoice};

fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration, falling back to defaults when the default file is absent
    let (config, source) = match &args.config {
        Some(path) => (UpdaterConfig::load(path)?, Some(path.display().to_string())),
        None => match UpdaterConfig::load(DEFAULT_CONFIG_PATH) {
            Ok(cfg) => (cfg, Some(DEFAULT_CONFIG_PATH.to_string())),
            Err(_) => (UpdaterConfig::default(), None),
        },
    };

    // Initialize logging
    let level = args.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    limiquantix_common::init_logging_with_format(&level, config.log_format)?;

    match &source {
        Some(path) => info!(config_path = %path, "Configuration loaded"),
        None => info!("No config file found, using defaults"),
    }

    let state_file = args
        .state_file
        .clone()
        .unwrap_or_else(|| config.state_file.clone());
    let store = FileStore::open(&state_file)
        .with_context(|| format!("Failed to open state file: {}", state_file.display()))?;
    let mut state = PersistedState::new(Box::new(store));

    match args.command {
        Command::Status => print_status(&state),
        Command::Pages => {
            let controller = LifecycleController::new(config, state, Box::new(MainsPowered));
            let pages: BTreeMap<&str, _> = controller
                .registry()
                .iter()
                .map(|(phase, page)| (phase.as_str(), page))
                .collect();
            println!("{}", serde_json::to_string_pretty(&pages)?);
        }
        Command::Enroll { choice } => {
            let accepted = choice == EnrollChoice::Accept;
            state.set_early_updates(accepted);
            state.flush();
            info!(accepted, "Early updates preference saved");
        }
        Command::Reset => {
            state.clear_all();
            state.flush();
            warn!(path = %state_file.display(), "Persisted update state cleared");
        }
    }

    Ok(())
}

fn print_status(state: &PersistedState) {
    let page_id = state.page_id();
    let resumes = match resolve_stored_phase(&page_id, state.was_updating()) {
        Ok(phase) => phase.to_string(),
        Err(e) => format!("error ({})", e),
    };

    println!("Stored phase:     {}", if page_id.is_empty() { "-" } else { page_id.as_str() });
    println!("Cold start phase: {}", resumes);
    println!(
        "Progress:         {}% {}",
        state.progress_percent(),
        state.progress_step()
    );
    println!("Updating:         {}", state.was_updating());
    println!("Early updates:    {:?}", state.early_updates());
    match state.last_check() {
        Some(at) => println!("Last check:       {}", at.to_rfc3339()),
        None => println!("Last check:       never"),
    }
    match state.update_record() {
        Some(record) => println!(
            "Update:           {} ({} {}, {})",
            record.download_id, record.name, record.version, record.status
        ),
        None => println!("Update:           none"),
    }
}
