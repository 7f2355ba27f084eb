/*
 * Copyright 2024 Vijaykumar Singh
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! VectorGate Server - management API and query gateway for external vector
//! databases

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vectorgate::{Config, VectorGate};

#[derive(Parser)]
#[command(name = "vectorgate-server")]
#[command(about = "VectorGate vector database management gateway")]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    #[arg(short, long)]
    port: Option<u16>,

    #[arg(short, long)]
    bind: Option<String>,

    /// Registry document; defaults to <data_dir>/database.json
    #[arg(long)]
    registry: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;

    // Override with CLI arguments
    if let Some(data_dir) = args.data_dir {
        config.server.data_dir = data_dir;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }
    if let Some(registry) = args.registry {
        config.storage.registry_path = Some(registry);
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.monitoring.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .init();

    info!(
        "Starting VectorGate on {}:{} (registry {:?})",
        config.server.bind_address,
        config.server.port,
        config.registry_path()
    );

    let mut gate = VectorGate::new(config).await?;
    let address = gate.start().await?;
    info!("VectorGate server started on {}", address);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal, stopping server...");

    if let Err(e) = gate.stop().await {
        error!("Error during shutdown: {}", e);
    }

    info!("VectorGate server stopped");
    Ok(())
}
