//! Infrastructure layer: Postgres-backed implementations of the task
//! runtime's store contracts.
//!
//! All cross-node coordination flows through the shared database — advisory
//! locks for leadership, the execution ledger for run accounting, and the
//! activity log as the append-only sink. SQL migrations for the runtime's
//! own tables live under `migrations/`.

pub mod activity_log;
pub mod ledger;
pub mod locks;
pub mod sms_log;

pub use activity_log::PgActivityLogStore;
pub use ledger::PgExecutionLedger;
pub use locks::PgAdvisoryLockManager;
pub use sms_log::PgSmsLogSource;

/// Embedded migrations for the runtime's own tables.
///
/// Safe to run from every node at startup: the migrator serializes itself
/// with an advisory lock.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
