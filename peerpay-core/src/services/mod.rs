//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod account;
pub mod gateway;
mod history;
pub mod logging;
pub mod migration;
pub mod transfer;

pub use account::AccountService;
pub use gateway::{RawAmount, StatusCategory, TransferGateway, TransferRequest, TransferResponse};
pub use history::{Direction, HistoryEntry, HistoryService};
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use transfer::{CancelOnDrop, CancelToken, TransferEngine};
