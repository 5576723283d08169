//! DuckDB repository implementation

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::{params, Connection};
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;

use crate::domain::result::{Error, Result};
use crate::domain::{
    max_balance, Account, Amount, Identity, NewTransfer, Recipient, RecordId, TransferRecord,
    TransferStatus,
};
use crate::ports::{AccountStore, LedgerStore, Repository, UnitOfWork};
use crate::services::MigrationService;

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Default time to wait for the connection before reporting contention
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// Timestamp layout written to TIMESTAMP columns (naive UTC, microseconds)
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
        || lower.contains("could not set lock on file")
}

/// Map a DuckDB failure to the core taxonomy
///
/// Write-write conflicts are reported as contention so callers may retry.
fn classify(err: duckdb::Error) -> Error {
    let msg = err.to_string();
    if msg.to_lowercase().contains("conflict") {
        Error::contention(msg)
    } else {
        Error::storage(msg)
    }
}

/// DuckDB repository implementation
///
/// A single connection is shared behind a timed mutex. A unit of work holds
/// the mutex for its whole lifetime, so units are serialized against each
/// other and against readers.
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    lock_timeout: Duration,
}

impl DuckDbRepository {
    /// Open (or create) a ledger database file
    ///
    /// Includes retry logic with exponential backoff for file locking errors,
    /// which occur when another process holds the database file.
    pub fn new(db_path: &Path, lock_timeout: Duration) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: db_path.to_path_buf(),
                        lock_timeout,
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            delay_ms = delay.as_millis() as u64,
                            attempt = attempt + 1,
                            max_attempts = MAX_RETRIES,
                            error = %err_msg,
                            "database busy, retrying"
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(Error::storage(err_msg));
                }
            }
        }

        Err(last_error
            .map(|e| Error::contention(e.to_string()))
            .unwrap_or_else(|| {
                Error::contention(format!("failed to open database after {} retries", MAX_RETRIES))
            }))
    }

    /// Open a private in-memory database (tests and dry runs)
    pub fn in_memory(lock_timeout: Duration) -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
            lock_timeout,
        })
    }

    /// Attempt to open a database connection (called by new() with retry logic)
    fn try_open_connection(db_path: &Path) -> std::result::Result<Connection, duckdb::Error> {
        // Extension autoloading stays off; the ledger needs no extensions
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Connection::open_with_flags(db_path, config)
    }

    /// Run database migrations using the MigrationService
    pub fn run_migrations(&self) -> Result<crate::services::MigrationResult> {
        let conn = self.acquire()?;
        MigrationService::new(&conn)
            .run_pending()
            .map_err(|e| Error::storage(format!("{:#}", e)))
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Scoped acquisition of the shared connection
    ///
    /// The guard releases the connection on every exit path.
    fn acquire(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.try_lock_for(self.lock_timeout).ok_or_else(|| {
            tracing::warn!(
                timeout_ms = self.lock_timeout.as_millis() as u64,
                "ledger connection not acquired in time"
            );
            Error::contention(format!(
                "connection not available within {}ms",
                self.lock_timeout.as_millis()
            ))
        })
    }
}

impl Repository for DuckDbRepository {
    fn begin(&self, _participants: &[&Identity]) -> Result<Box<dyn UnitOfWork + '_>> {
        // The connection mutex already serializes every unit, so the
        // participant set does not need individual locks here.
        let conn = self.acquire()?;
        conn.execute_batch("BEGIN TRANSACTION").map_err(classify)?;
        tracing::debug!("duckdb unit of work started");
        Ok(Box::new(DuckDbUnit {
            conn,
            finished: false,
        }))
    }

    fn open_account(&self, account: &Account) -> Result<()> {
        account.validate().map_err(Error::invalid_request)?;
        let conn = self.acquire()?;

        if select_balance(&conn, &account.identity)?.is_some() {
            return Err(Error::AccountExists(account.identity.to_string()));
        }

        conn.execute(
            "INSERT INTO accounts (identity, display_name, balance, created_at)
             VALUES (?, ?, CAST(? AS DECIMAL(18, 2)), CAST(? AS TIMESTAMP))",
            params![
                account.identity.as_str(),
                account.display_name,
                account.balance.to_string(),
                format_timestamp(&account.created_at),
            ],
        )
        .map_err(classify)?;

        Ok(())
    }

    fn get_account(&self, identity: &Identity) -> Result<Option<Account>> {
        let conn = self.acquire()?;
        let row = conn.query_row(
            "SELECT identity, display_name, CAST(balance AS VARCHAR), created_at::VARCHAR
             FROM accounts WHERE identity = ?",
            [identity.as_str()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        );

        match row {
            Ok((id, display_name, balance, created_at)) => Ok(Some(Account {
                identity: Identity::parse(&id)?,
                display_name,
                balance: parse_decimal(&balance)?,
                created_at: parse_timestamp(&created_at)?,
            })),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(classify(e)),
        }
    }

    fn query_by_identity(&self, identity: &Identity) -> Result<Vec<TransferRecord>> {
        let conn = self.acquire()?;
        let mut stmt = conn.prepare(
            "SELECT transfer_id, CAST(amount AS VARCHAR), recipient_name, recipient_handle,
                    sender_identity, recipient_identity, status, committed_at::VARCHAR
             FROM transfers
             WHERE sender_identity = ? OR recipient_identity = ?
             ORDER BY transfer_id DESC",
        )?;

        let rows = stmt.query_map(params![identity.as_str(), identity.as_str()], |row| {
            Ok(TransferRow {
                id: row.get(0)?,
                amount: row.get(1)?,
                recipient_name: row.get(2)?,
                recipient_handle: row.get(3)?,
                sender: row.get(4)?,
                recipient: row.get(5)?,
                status: row.get(6)?,
                committed_at: row.get(7)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    fn transfer_count(&self) -> Result<i64> {
        let conn = self.acquire()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM transfers", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// A DuckDB transaction holding the connection for its lifetime
struct DuckDbUnit<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl AccountStore for DuckDbUnit<'_> {
    fn get_balance(&mut self, identity: &Identity) -> Result<Decimal> {
        select_balance(&self.conn, identity)?.ok_or_else(|| Error::not_found(identity.as_str()))
    }

    fn find_account(&mut self, identity: &Identity) -> Result<Option<Identity>> {
        Ok(select_balance(&self.conn, identity)?.map(|_| identity.clone()))
    }

    fn adjust_balance(&mut self, identity: &Identity, delta: Decimal) -> Result<()> {
        if delta.normalize().scale() > 2 {
            return Err(Error::InvalidAmount(format!(
                "delta {} has more than 2 decimal places",
                delta
            )));
        }

        let current = self.get_balance(identity)?;
        let updated = current
            .checked_add(delta)
            .filter(|balance| *balance <= max_balance())
            .ok_or_else(|| {
                Error::storage(format!("balance of {} would exceed the ledger maximum", identity))
            })?;
        if updated.is_sign_negative() && !updated.is_zero() {
            return Err(Error::InsufficientFunds {
                available: current,
                requested: -delta,
            });
        }

        self.conn
            .execute(
                "UPDATE accounts SET balance = CAST(? AS DECIMAL(18, 2)) WHERE identity = ?",
                params![updated.to_string(), identity.as_str()],
            )
            .map_err(classify)?;
        Ok(())
    }
}

impl LedgerStore for DuckDbUnit<'_> {
    fn append(&mut self, record: &NewTransfer) -> Result<RecordId> {
        let id: RecordId = self
            .conn
            .query_row("SELECT nextval('seq_transfer_id')", [], |row| row.get(0))
            .map_err(classify)?;

        self.conn
            .execute(
                "INSERT INTO transfers (transfer_id, amount, recipient_name, recipient_handle,
                                        sender_identity, recipient_identity, status, committed_at)
                 VALUES (?, CAST(? AS DECIMAL(18, 2)), ?, ?, ?, ?, ?, CAST(? AS TIMESTAMP))",
                params![
                    id,
                    record.amount.to_string(),
                    record.recipient_name,
                    record.recipient_handle,
                    record.sender.as_str(),
                    record.recipient.identity().map(|i| i.as_str()),
                    record.status.as_str(),
                    format_timestamp(&record.committed_at),
                ],
            )
            .map_err(classify)?;

        Ok(id)
    }
}

impl UnitOfWork for DuckDbUnit<'_> {
    fn commit(mut self: Box<Self>) -> Result<()> {
        self.conn.execute_batch("COMMIT").map_err(classify)?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for DuckDbUnit<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!(error = %e, "rollback failed");
            } else {
                tracing::debug!("duckdb unit of work rolled back");
            }
        }
    }
}

/// Raw transfers row before domain validation
struct TransferRow {
    id: RecordId,
    amount: String,
    recipient_name: String,
    recipient_handle: String,
    sender: String,
    recipient: Option<String>,
    status: String,
    committed_at: String,
}

impl TransferRow {
    fn into_record(self) -> Result<TransferRecord> {
        let recipient = match self.recipient {
            Some(identity) => Recipient::Resolved(Identity::parse(&identity)?),
            None => Recipient::External(self.recipient_handle.clone()),
        };
        Ok(TransferRecord {
            id: self.id,
            amount: Amount::new(parse_decimal(&self.amount)?)
                .map_err(|e| Error::storage(format!("corrupt amount in record {}: {}", self.id, e)))?,
            sender: Identity::parse(&self.sender)?,
            recipient_name: self.recipient_name,
            recipient_handle: self.recipient_handle,
            recipient,
            status: TransferStatus::parse(&self.status)?,
            committed_at: parse_timestamp(&self.committed_at)?,
        })
    }
}

// Helper functions

fn select_balance(conn: &Connection, identity: &Identity) -> Result<Option<Decimal>> {
    let balance = conn.query_row(
        "SELECT CAST(balance AS VARCHAR) FROM accounts WHERE identity = ?",
        [identity.as_str()],
        |row| row.get::<_, String>(0),
    );
    match balance {
        Ok(text) => Ok(Some(parse_decimal(&text)?)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(classify(e)),
    }
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s.trim()).map_err(|e| Error::storage(format!("bad decimal '{}': {}", s, e)))
}

fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::storage(format!("bad timestamp '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> DuckDbRepository {
        let repo = DuckDbRepository::in_memory(DEFAULT_LOCK_TIMEOUT).unwrap();
        repo.ensure_schema().unwrap();
        repo
    }

    fn id(s: &str) -> Identity {
        Identity::parse(s).unwrap()
    }

    fn seed(repo: &DuckDbRepository, identity: &str, cents: i64) {
        repo.open_account(&Account::new(id(identity), identity, Decimal::new(cents, 2)))
            .unwrap();
    }

    #[test]
    fn test_retryable_error_detection() {
        assert!(is_retryable_error("IO Error: Could not set lock on file"));
        assert!(is_retryable_error("database is locked"));
        assert!(!is_retryable_error("Catalog Error: Table does not exist"));
    }

    #[test]
    fn test_timestamp_round_trip_keeps_microseconds() {
        let ts = parse_timestamp("2026-10-14 09:30:15.123456").unwrap();
        assert_eq!(format_timestamp(&ts), "2026-10-14 09:30:15.123456");
        assert!(parse_timestamp("2026-10-14 09:30:15").is_ok());
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_open_account_rejects_duplicates() {
        let repo = repo();
        seed(&repo, "alice", 100000);
        let dup = Account::new(id("ALICE"), "Alice again", Decimal::ZERO);
        assert!(matches!(repo.open_account(&dup), Err(Error::AccountExists(_))));
        assert_eq!(repo.balance_of(&id("alice")).unwrap(), Decimal::new(100000, 2));
    }

    #[test]
    fn test_dropped_unit_rolls_back() {
        let repo = repo();
        seed(&repo, "alice", 5000);
        {
            let mut unit = repo.begin(&[&id("alice")]).unwrap();
            unit.adjust_balance(&id("alice"), Decimal::new(-2000, 2)).unwrap();
            assert_eq!(unit.get_balance(&id("alice")).unwrap(), Decimal::new(3000, 2));
        }
        assert_eq!(repo.balance_of(&id("alice")).unwrap(), Decimal::new(5000, 2));
    }

    #[test]
    fn test_adjust_never_goes_negative() {
        let repo = repo();
        seed(&repo, "alice", 1000);
        let mut unit = repo.begin(&[&id("alice")]).unwrap();
        let err = unit
            .adjust_balance(&id("alice"), Decimal::new(-1001, 2))
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));
        assert!(matches!(
            unit.adjust_balance(&id("nobody"), Decimal::ONE),
            Err(Error::AccountNotFound(_))
        ));
    }

    #[test]
    fn test_begin_times_out_while_unit_is_open() {
        let repo = DuckDbRepository::in_memory(Duration::from_millis(20)).unwrap();
        repo.ensure_schema().unwrap();
        let _held = repo.begin(&[]).unwrap();
        let err = repo.transfer_count().unwrap_err();
        assert!(err.is_retryable());
    }
}
