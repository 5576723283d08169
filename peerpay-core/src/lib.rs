//! Peerpay Core - transfer engine for a peer-to-peer balance ledger
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Account, Amount, TransferRecord, etc.)
//! - **ports**: Trait definitions for storage (Repository, UnitOfWork)
//! - **services**: Business logic orchestration (engine, gateway, history)
//! - **adapters**: Concrete implementations (DuckDB, in-memory)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use adapters::duckdb::DuckDbRepository;
use config::Config;
use ports::Repository;
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, ErrorKind, Result};
pub use domain::{Account, Amount, Identity, Recipient, RecordId, TransferRecord, TransferStatus};

/// Main context for ledger operations
///
/// Holds the repository, configuration and every service wired to them.
pub struct PeerpayContext {
    pub config: Config,
    pub repository: Arc<DuckDbRepository>,
    pub engine: Arc<TransferEngine>,
    pub gateway: TransferGateway,
    pub account_service: AccountService,
    pub history_service: HistoryService,
}

impl PeerpayContext {
    /// Open the ledger in `data_dir`, creating and migrating it if needed
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;
        Self::with_config(data_dir, config)
    }

    pub fn with_config(data_dir: &Path, config: Config) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;

        let db_path = data_dir.join(&config.database_file);
        let repository = Arc::new(DuckDbRepository::new(&db_path, config.lock_timeout)?);

        // Initialize schema
        repository.ensure_schema()?;

        let shared: Arc<dyn Repository> = repository.clone();
        let engine = Arc::new(TransferEngine::new(Arc::clone(&shared)));
        let gateway = TransferGateway::new(Arc::clone(&engine));
        let account_service =
            AccountService::new(Arc::clone(&shared), config.default_opening_balance);
        let history_service = HistoryService::new(shared);

        Ok(Self {
            config,
            repository,
            engine,
            gateway,
            account_service,
            history_service,
        })
    }

    /// Record gateway outcomes in the given event log
    pub fn with_event_log(mut self, events: Arc<LoggingService>) -> Self {
        self.gateway = self.gateway.with_event_log(events);
        self
    }
}
