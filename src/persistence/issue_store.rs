//! `SQLite`-backed store for harvested issue documents.
//!
//! Each sampled issue is stored as one JSON document keyed by repository and
//! issue number, so a resumed run that re-collects an issue replaces the
//! earlier copy instead of duplicating it. Connections are opened per call;
//! harvest writes are infrequent enough that pooling would buy nothing.

use diesel::Connection;
use diesel::OptionalExtension;
use diesel::QueryableByName;
use diesel::RunQueryDsl;
use diesel::sql_query;
use diesel::sql_types::{BigInt, Text};
use diesel::sqlite::SqliteConnection;
use serde_json::Value;

use crate::github::models::IssueRecord;
use crate::harvest::DocumentSink;

use super::PersistenceError;

const COLLECTED_ISSUES_TABLE: &str = "collected_issues";

/// `SQLite`-backed document store for harvested issues.
#[derive(Debug, Clone)]
pub struct IssueStore {
    database_url: String,
}

impl IssueStore {
    /// Create a store targeting the configured `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::BlankDatabaseUrl`] when the URL is blank.
    pub fn new(database_url: impl Into<String>) -> Result<Self, PersistenceError> {
        let database_url_string = database_url.into();
        if database_url_string.trim().is_empty() {
            return Err(PersistenceError::BlankDatabaseUrl);
        }
        Ok(Self {
            database_url: database_url_string,
        })
    }

    fn establish_connection(&self) -> Result<SqliteConnection, PersistenceError> {
        let mut connection = SqliteConnection::establish(&self.database_url).map_err(|error| {
            PersistenceError::ConnectionFailed {
                message: error.to_string(),
            }
        })?;

        sql_query("PRAGMA foreign_keys = ON;")
            .execute(&mut connection)
            .map(drop)
            .map_err(|error| PersistenceError::ForeignKeysEnableFailed {
                message: error.to_string(),
            })?;

        Ok(connection)
    }

    fn issue_number_to_i64(number: u64) -> i64 {
        i64::try_from(number).unwrap_or(i64::MAX)
    }

    fn store_table_exists(
        connection: &mut SqliteConnection,
    ) -> Result<bool, diesel::result::Error> {
        #[derive(Debug, QueryableByName)]
        struct Row {
            #[diesel(sql_type = BigInt)]
            one: i64,
        }

        let exists: Option<Row> = sql_query(
            "SELECT 1 AS one FROM sqlite_master WHERE type = 'table' AND name = ? LIMIT 1;",
        )
        .bind::<Text, _>(COLLECTED_ISSUES_TABLE)
        .get_result(connection)
        .optional()?;

        let _ = exists.as_ref().map(|row| row.one);
        Ok(exists.is_some())
    }

    fn map_error_with_schema_check<F>(
        connection: &mut SqliteConnection,
        error: &diesel::result::Error,
        create_error: F,
    ) -> PersistenceError
    where
        F: Fn(String) -> PersistenceError,
    {
        match Self::store_table_exists(connection) {
            Ok(false) => PersistenceError::SchemaNotInitialised,
            Ok(true) => create_error(error.to_string()),
            Err(check_error) => create_error(format!(
                "schema presence check failed: {check_error}; original error: {error}"
            )),
        }
    }

    fn map_query_error(
        connection: &mut SqliteConnection,
        error: &diesel::result::Error,
    ) -> PersistenceError {
        Self::map_error_with_schema_check(connection, error, |message| {
            PersistenceError::QueryFailed { message }
        })
    }

    fn map_write_error(
        connection: &mut SqliteConnection,
        error: &diesel::result::Error,
    ) -> PersistenceError {
        Self::map_error_with_schema_check(connection, error, |message| {
            PersistenceError::WriteFailed { message }
        })
    }
}

impl DocumentSink for IssueStore {
    fn insert(&self, record: &IssueRecord) -> Result<(), PersistenceError> {
        let document = record
            .document()
            .map_err(|error| PersistenceError::WriteFailed {
                message: error.to_string(),
            })?;
        let rendered =
            serde_json::to_string(&document).map_err(|error| PersistenceError::WriteFailed {
                message: error.to_string(),
            })?;

        let mut connection = self.establish_connection()?;

        sql_query(
            "INSERT INTO collected_issues (repo, issue_number, document) \
             VALUES (?, ?, ?) \
             ON CONFLICT(repo, issue_number) DO UPDATE SET \
               document = excluded.document, \
               collected_at = CURRENT_TIMESTAMP;",
        )
        .bind::<Text, _>(&record.repo)
        .bind::<BigInt, _>(Self::issue_number_to_i64(record.issue.number))
        .bind::<Text, _>(&rendered)
        .execute(&mut connection)
        .map(drop)
        .map_err(|error| Self::map_write_error(&mut connection, &error))
    }

    fn collected_count(&self) -> Result<u64, PersistenceError> {
        #[derive(Debug, QueryableByName)]
        struct Row {
            #[diesel(sql_type = BigInt)]
            total: i64,
        }

        let mut connection = self.establish_connection()?;

        let row: Row = sql_query("SELECT COUNT(*) AS total FROM collected_issues;")
            .get_result(&mut connection)
            .map_err(|error| Self::map_query_error(&mut connection, &error))?;

        Ok(u64::try_from(row.total).unwrap_or(0))
    }

    fn collected(&self) -> Result<Vec<Value>, PersistenceError> {
        #[derive(Debug, QueryableByName)]
        struct Row {
            #[diesel(sql_type = Text)]
            document: String,
        }

        let mut connection = self.establish_connection()?;

        let rows: Vec<Row> = sql_query("SELECT document FROM collected_issues ORDER BY id;")
            .get_results(&mut connection)
            .map_err(|error| Self::map_query_error(&mut connection, &error))?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_str(&row.document).map_err(|error| {
                    PersistenceError::QueryFailed {
                        message: format!("stored document is not valid JSON: {error}"),
                    }
                })
            })
            .collect()
    }
}
