//! Local persistence and database migrations.
//!
//! Gleaner stores harvested issue documents in a local `SQLite` database so
//! a resumed run can tell whether anything was collected before, and so the
//! final export can be rebuilt at any time. The schema is managed with
//! Diesel migrations so the database can be created and upgraded
//! consistently across machines.

mod error;
mod issue_store;
mod migrator;

pub use error::PersistenceError;
pub use issue_store::IssueStore;
pub use migrator::{INITIAL_SCHEMA_VERSION, SchemaVersion, migrate_database};
