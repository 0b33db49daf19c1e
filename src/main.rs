//! Gleaner CLI entrypoint for the issue harvest.

use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use gleaner::harvest::HarvestState;
use gleaner::telemetry::StderrJsonlTelemetrySink;
use gleaner::{
    AccessToken, CheckpointStore, DocumentSink, FileCheckpointStore, GithubClient, GleanerConfig,
    HarvestError, Harvester, HttpIssueGateway, IssueStore, RetryPolicy, TelemetryEvent,
    TelemetrySink, harvest, migrate_database,
};
use ortho_config::OrthoConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if writeln!(io::stderr().lock(), "{error}").is_err() {
                return ExitCode::FAILURE;
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run() -> Result<(), HarvestError> {
    let config = load_config()?;
    let telemetry = StderrJsonlTelemetrySink;

    if config.migrate_db {
        let version = migrate_database(config.database_url(), &telemetry)?;
        tracing::info!(schema_version = version.as_str(), "database migrated");
        return Ok(());
    }
    migrate_database(config.database_url(), &telemetry)?;

    let token = AccessToken::new(config.resolve_token()?)?;
    let client = GithubClient::new(
        config.api_base(),
        &token,
        config.user_agent(),
        RetryPolicy::default(),
    )?;
    let gateway = HttpIssueGateway::new(client, config.harvest_filter()?);

    let store = IssueStore::new(config.database_url())?;
    let checkpoints = FileCheckpointStore::new(config.checkpoint_path());
    let interrupt = install_interrupt_flag();

    let resumed = resume_state(&store, &checkpoints)?;
    if let Some(state) = &resumed {
        telemetry.record(TelemetryEvent::CheckpointRestored {
            repo: state.repo_name.clone(),
            issues_page: state.issues_page,
        });
    }
    let settings = config.settings();
    let mut harvester = resumed.map_or_else(
        || Harvester::new(&gateway, &store, settings.clone(), Arc::clone(&interrupt)),
        |state| Harvester::with_state(&gateway, &store, settings.clone(), Arc::clone(&interrupt), state),
    );

    let outcome = harvest::run_to_completion(&mut harvester, &checkpoints, &telemetry).await;

    // The export reflects whatever made it into the store, even after a
    // failed or interrupted run.
    if let Err(export_error) = export_collected(&store, config.output_path()) {
        tracing::error!(%export_error, "failed to write the JSON export");
        outcome?;
        return Err(export_error);
    }

    outcome?;
    telemetry.record(TelemetryEvent::HarvestCompleted {
        collected: store.collected_count()?,
    });
    Ok(())
}

/// Loads configuration from CLI, environment, and files.
fn load_config() -> Result<GleanerConfig, HarvestError> {
    GleanerConfig::load().map_err(|error| {
        HarvestError::Api(gleaner::ApiError::Configuration {
            message: error.to_string(),
        })
    })
}

/// Restores the saved checkpoint, but only when the store shows a previous
/// run actually collected something; otherwise a stale checkpoint would
/// skip work a fresh harvest still owes.
fn resume_state(
    store: &IssueStore,
    checkpoints: &FileCheckpointStore,
) -> Result<Option<HarvestState>, HarvestError> {
    if store.collected_count()? == 0 {
        return Ok(None);
    }
    Ok(checkpoints.load()?)
}

/// Raises a shared flag on Ctrl-C so the harvester stops after the page in
/// flight instead of mid-write.
fn install_interrupt_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping after the current page");
            handler_flag.store(true, Ordering::Relaxed);
        }
    });
    flag
}

/// Writes every stored document to `output_path` as one JSON array.
fn export_collected(store: &IssueStore, output_path: &str) -> Result<(), HarvestError> {
    let documents = store.collected()?;
    let rendered =
        serde_json::to_vec_pretty(&documents).map_err(|error| HarvestError::Io {
            message: error.to_string(),
        })?;
    fs::write(output_path, rendered).map_err(|error| HarvestError::Io {
        message: error.to_string(),
    })?;
    tracing::info!(output_path, documents = documents.len(), "export written");
    Ok(())
}
