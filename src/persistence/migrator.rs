//! Schema migrations for the harvest database.
//!
//! Migrations are embedded at compile time and applied on every start, so
//! a fresh database path becomes usable without a separate setup step. The
//! version that ends up current is reported through telemetry, which makes
//! it possible to tell from a run's log which schema the documents were
//! written against.

use diesel::Connection;
use diesel::OptionalExtension;
use diesel::QueryableByName;
use diesel::RunQueryDsl;
use diesel::sql_query;
use diesel::sql_types::Text;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use crate::telemetry::{TelemetryEvent, TelemetrySink};

use super::PersistenceError;

/// Migrations compiled into the binary.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Version string of the migration that creates the document table.
pub const INITIAL_SCHEMA_VERSION: &str = "20260301000000";

/// A Diesel migration version string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaVersion(String);

impl SchemaVersion {
    /// Returns the inner version string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Applies any pending migrations and reports the resulting schema version
/// through telemetry.
///
/// # Errors
///
/// Returns a [`PersistenceError`] when the URL is blank, the database cannot
/// be opened, a migration fails, or no version is recorded afterwards.
pub fn migrate_database(
    database_url: &str,
    telemetry: &dyn TelemetrySink,
) -> Result<SchemaVersion, PersistenceError> {
    let mut connection = open_database(database_url)?;

    connection
        .run_pending_migrations(MIGRATIONS)
        .map_err(|error| PersistenceError::MigrationFailed {
            message: error.to_string(),
        })?;

    let version = current_version(&mut connection)?;
    telemetry.record(TelemetryEvent::SchemaVersionRecorded {
        schema_version: version.as_str().to_owned(),
    });
    Ok(version)
}

/// Opens the database with foreign-key enforcement switched on.
fn open_database(database_url: &str) -> Result<SqliteConnection, PersistenceError> {
    let trimmed = database_url.trim();
    if trimmed.is_empty() {
        return Err(PersistenceError::BlankDatabaseUrl);
    }

    let mut connection =
        SqliteConnection::establish(trimmed).map_err(|error| PersistenceError::ConnectionFailed {
            message: error.to_string(),
        })?;

    sql_query("PRAGMA foreign_keys = ON;")
        .execute(&mut connection)
        .map(drop)
        .map_err(|error| PersistenceError::ForeignKeysEnableFailed {
            message: error.to_string(),
        })?;

    Ok(connection)
}

/// Reads the newest version from Diesel's migration bookkeeping table.
fn current_version(connection: &mut SqliteConnection) -> Result<SchemaVersion, PersistenceError> {
    #[derive(Debug, QueryableByName)]
    struct VersionRow {
        #[diesel(sql_type = Text)]
        version: String,
    }

    let newest: Option<VersionRow> = sql_query(
        "SELECT version FROM __diesel_schema_migrations ORDER BY version DESC LIMIT 1;",
    )
    .get_result(connection)
    .optional()
    .map_err(|error| PersistenceError::SchemaVersionQueryFailed {
        message: error.to_string(),
    })?;

    newest
        .map(|row| SchemaVersion(row.version))
        .ok_or(PersistenceError::MissingSchemaVersion)
}
