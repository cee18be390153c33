//! `TaskFlow` task store -- the HTTP backend behind the task list.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:8000
//! cargo run --bin taskflow-server
//!
//! # Run on custom address with a few starter tasks
//! cargo run --bin taskflow-server -- --bind 127.0.0.1:8080 --seed-file seed.json
//!
//! # Or via environment variable
//! TASKFLOW_BIND=127.0.0.1:8080 cargo run --bin taskflow-server
//! ```

use std::sync::Arc;

use clap::Parser;
use taskflow_server::config::{self, ServerCliArgs, ServerConfig};
use taskflow_server::server::{self, ServerState};
use taskflow_server::store::TaskStore;

#[tokio::main]
async fn main() {
    let cli = ServerCliArgs::parse();

    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(addr = %config.bind_addr, "starting taskflow task store");

    let store = TaskStore::new();
    if let Some(path) = &config.seed_file {
        let seed = match config::load_seed_file(path) {
            Ok(seed) => seed,
            Err(e) => {
                tracing::error!(error = %e, "failed to load seed file");
                std::process::exit(1);
            }
        };
        for new in seed {
            if let Err(e) = store.create(new).await {
                tracing::warn!(error = %e, "skipping invalid seed task");
            }
        }
        tracing::info!(count = store.len().await, "seeded task store");
    }

    let state = Arc::new(ServerState::with_config(config.max_body_size, store));

    match server::start_server_with_state(&config.bind_addr.to_string(), state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "task store listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "task store server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start task store");
            std::process::exit(1);
        }
    }
}
