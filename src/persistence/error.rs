//! Error types for local persistence operations.

use thiserror::Error;

/// Errors raised while initialising, migrating, or using the local `SQLite`
/// document store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistenceError {
    /// The database URL/path was present but blank.
    #[error("database URL is blank")]
    BlankDatabaseUrl,

    /// Opening a `SQLite` connection failed.
    #[error("could not open the SQLite database: {message}")]
    ConnectionFailed {
        /// Error detail from Diesel.
        message: String,
    },

    /// Applying pending migrations failed.
    #[error("database migrations failed: {message}")]
    MigrationFailed {
        /// Error detail from Diesel migrations.
        message: String,
    },

    /// Switching on foreign-key enforcement failed.
    #[error("could not enable foreign-key enforcement: {message}")]
    ForeignKeysEnableFailed {
        /// Error detail from the PRAGMA execution.
        message: String,
    },

    /// The schema version could not be read back after migrating.
    #[error("schema version lookup failed after migrations: {message}")]
    SchemaVersionQueryFailed {
        /// Error detail from Diesel query execution.
        message: String,
    },

    /// Migrations ran but left no version behind.
    #[error("no schema version recorded after migrations ran")]
    MissingSchemaVersion,

    /// The document table is absent; migrations have not been run.
    #[error("document store schema is not initialised; run migrations first")]
    SchemaNotInitialised,

    /// A read query failed.
    #[error("document store query failed: {message}")]
    QueryFailed {
        /// Error detail from Diesel query execution.
        message: String,
    },

    /// A write failed.
    #[error("document store write failed: {message}")]
    WriteFailed {
        /// Error detail from Diesel query execution.
        message: String,
    },
}
