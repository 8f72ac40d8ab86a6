//! CLI for the DSR document-store retry workload.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use dsr_core::config::{self, DsrConfig, StoreBackend};
use dsr_core::store;
use dsr_core::workload::{Workload, DEFAULT_AGE, DEFAULT_COUNT};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use commands::{
    run_classify, run_create, run_delete, run_demo, run_policies, run_read, run_transaction,
    run_update,
};

/// Top-level CLI for DSR.
#[derive(Debug, Parser)]
#[command(name = "dsr")]
#[command(about = "DSR: retrying CRUD and transactions against a replicated document store", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/dsr/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the store backend from config.
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendArg>,

    /// SQLite database file (sqlite backend only).
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Sqlite,
    Memory,
}

impl From<BackendArg> for StoreBackend {
    fn from(b: BackendArg) -> Self {
        match b {
            BackendArg::Sqlite => StoreBackend::Sqlite,
            BackendArg::Memory => StoreBackend::Memory,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Bulk-insert generated user profiles.
    Create {
        /// Number of profiles to insert.
        #[arg(long, default_value_t = DEFAULT_COUNT, value_name = "N")]
        count: usize,
    },

    /// Find user profiles by age.
    Read {
        #[arg(long, default_value_t = DEFAULT_AGE, value_name = "N")]
        age: i64,
    },

    /// Increment a user's age exactly once.
    Update {
        /// User profile id.
        id: String,
    },

    /// Delete one user profile by name.
    Delete { name: String },

    /// Insert a profile and its personalization record in one transaction.
    Transaction,

    /// Run create, read, update, delete and transaction in order.
    Demo,

    /// Show whether a fault would be retried.
    Classify {
        /// Fault kind, e.g. NotPrimary.
        kind: String,
        /// Optional fault message.
        message: Option<String>,
    },

    /// Print the effective retry policies.
    Policies,
}

impl Cli {
    /// Config file (or defaults) with command-line overrides applied.
    fn load_config(&self) -> Result<DsrConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load_from(path)?,
            None => config::load_or_init()?,
        };
        if let Some(backend) = self.backend {
            cfg.store.backend = backend.into();
        }
        if let Some(db) = &self.db {
            cfg.store.path = Some(db.clone());
        }
        Ok(cfg)
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = cli.load_config()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match &cli.command {
            CliCommand::Classify { kind, message } => {
                return run_classify(&cfg, kind, message.as_deref().unwrap_or_default());
            }
            CliCommand::Policies => return run_policies(&cfg),
            _ => {}
        }

        let client = store::open(&cfg.store).await?;
        let cancel = CancellationToken::new();
        spawn_ctrl_c(cancel.clone());
        let workload = Workload::from_config(client, &cfg, cancel)?;

        match cli.command {
            CliCommand::Create { count } => run_create(&workload, count).await?,
            CliCommand::Read { age } => run_read(&workload, age).await?,
            CliCommand::Update { id } => run_update(&workload, &id).await?,
            CliCommand::Delete { name } => run_delete(&workload, &name).await?,
            CliCommand::Transaction => run_transaction(&workload).await?,
            CliCommand::Demo => run_demo(&workload).await?,
            CliCommand::Classify { .. } | CliCommand::Policies => {}
        }

        Ok(())
    }
}

/// First Ctrl-C cancels the in-flight retry sequence.
fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling");
            cancel.cancel();
        }
    });
}
