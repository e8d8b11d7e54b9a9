// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Loom bucket log collector binary.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use loom_ingest::{format_version_info, Collector, LocalObjectStore, Maintainer};
use loom_ingest_config::{IngestConfig, LogFormat, LoggingConfig};
use loom_ingest_core::CancellationToken;
use loom_ingest_db::LedgerStore;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Loom ingest - collects security logs from object-storage buckets.
#[derive(Parser, Debug)]
#[command(
	name = "loom-ingest",
	about = "Collects security logs from object-storage buckets",
	version
)]
struct Args {
	/// Configuration file (defaults to /etc/loom/ingest.toml)
	#[arg(long, short, global = true, env = "LOOM_INGEST_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
	/// Ingest continuously on the configured interval (default)
	Run,
	/// Run every configured bucket once and exit
	Once,
	/// Apply ledger retention to every scope and exit
	Maintain {
		/// Entries kept per scope, overriding every bucket's retain_count
		#[arg(long)]
		retain: Option<u32>,
	},
	/// Print the last successful run of every scope as JSON
	Status,
	/// Show version and build information
	Version,
}

#[tokio::main]
async fn main() -> ExitCode {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", format_version_info());
		return ExitCode::SUCCESS;
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => loom_ingest_config::load_config_with_file(path),
		None => loom_ingest_config::load_config(),
	};
	let config = match config {
		Ok(config) => config,
		Err(e) => {
			eprintln!("loom-ingest: {e}");
			return ExitCode::FAILURE;
		}
	};

	init_tracing(&config.logging);

	match execute(args.command.unwrap_or(Command::Run), config).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			tracing::error!(error = %e, "loom-ingest failed");
			ExitCode::FAILURE
		}
	}
}

fn init_tracing(logging: &LoggingConfig) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| logging.level.clone().into());
	let registry = tracing_subscriber::registry().with(filter);
	// Events may be written to stdout, so logs go to stderr.
	match logging.format {
		LogFormat::Json => registry
			.with(fmt::layer().json().with_writer(std::io::stderr))
			.init(),
		LogFormat::Text => registry
			.with(fmt::layer().with_writer(std::io::stderr))
			.init(),
	}
}

async fn execute(command: Command, config: IngestConfig) -> Result<(), BoxError> {
	tracing::info!(
		database = %config.database.url,
		store = %config.store.root.display(),
		buckets = config.buckets.len(),
		"starting loom-ingest"
	);

	let ledger = Arc::new(LedgerStore::open(&config.database.url).await?);

	match command {
		Command::Status => {
			let status = loom_ingest::CollectorStatus::collect(&ledger).await?;
			println!("{}", serde_json::to_string_pretty(&status)?);
			Ok(())
		}
		Command::Maintain { retain } => {
			let maintainer = match retain {
				Some(retain) => Maintainer::new(ledger, retain),
				None => Maintainer::new(ledger, config.collector.default_retain_count)
					.with_buckets(&config.buckets),
			};
			let report = maintainer.run_all().await?;
			println!("{}", serde_json::to_string_pretty(&report)?);
			Ok(())
		}
		Command::Once | Command::Run => {
			let store = Arc::new(LocalObjectStore::new(&config.store.root));
			let sink = loom_ingest::sink::from_config(&config.sink)?;
			let collector = Collector::from_config(&config, store, ledger, sink);

			let cancel = CancellationToken::new();
			let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
			{
				let cancel = cancel.clone();
				tokio::spawn(async move {
					if tokio::signal::ctrl_c().await.is_ok() {
						tracing::info!("Received shutdown signal");
						cancel.cancel();
						let _ = shutdown_tx.send(());
					}
				});
			}

			if matches!(command, Command::Once) {
				let reports = collector.run_once(&cancel).await?;
				println!("{}", serde_json::to_string_pretty(&reports)?);
			} else {
				collector.run(&cancel, shutdown_rx).await?;
			}
			tracing::info!("loom-ingest shutdown complete");
			Ok(())
		}
		Command::Version => {
			println!("{}", format_version_info());
			Ok(())
		}
	}
}
