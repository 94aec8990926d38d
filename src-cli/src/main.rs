//! worksheetgen: submit worksheet generation jobs and inspect their state.

mod args;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{info, warn};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

use args::{Cli, Commands};
use worksheetgen::{
    cancel_job, job_status, list_jobs, load_config, Config, JobProgressEvent, JobRecordStore,
    JobService, RunOutcome, SqliteJobStore, WorksheetError, WorksheetRequest,
};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Worksheet(#[from] WorksheetError),

    #[error("Failed to read request file '{path}': {source}")]
    ReadRequest {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid request JSON: {0}")]
    ParseRequest(#[from] serde_json::Error),

    #[error("Failed to install Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

impl From<worksheetgen::JobError> for CliError {
    fn from(e: worksheetgen::JobError) -> Self {
        CliError::Worksheet(e.into())
    }
}

fn init_logging(json: bool) -> Result<(), CliError> {
    tracing_log::LogTracer::init().map_err(|e| CliError::Logging(e.to_string()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = Registry::default().with(filter);
    let result = if json {
        tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_writer(std::io::stderr)),
        )
    } else {
        tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_target(false).with_writer(std::io::stderr)),
        )
    };
    result.map_err(|e| CliError::Logging(e.to_string()))
}

fn load(config_path: Option<&Path>) -> Result<Config, CliError> {
    match config_path {
        Some(path) => {
            let config = load_config(path).map_err(WorksheetError::from)?;
            info!("Configuration loaded from {}", path.display());
            Ok(config)
        }
        None => Ok(Config::default()),
    }
}

fn open_store(config: &Config) -> Result<SqliteJobStore, CliError> {
    let path = config.resolved_database_path().ok_or_else(|| {
        WorksheetError::from(worksheetgen::db::DatabaseError::Unavailable(
            "no database path configured and no home directory".to_string(),
        ))
    })?;
    let db = worksheetgen::db::Database::open(&path).map_err(WorksheetError::from)?;
    Ok(SqliteJobStore::new(db))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_event(event: &JobProgressEvent) {
    match &event.error {
        Some(error) => eprintln!("[{:>3}%] {}: {}", event.percent, event.message, error),
        None => eprintln!("[{:>3}%] {}", event.percent, event.message),
    }
}

async fn generate(
    config: &Config,
    request_path: &Path,
    owner: Option<String>,
) -> Result<ExitCode, CliError> {
    let content = std::fs::read_to_string(request_path).map_err(|e| CliError::ReadRequest {
        path: request_path.display().to_string(),
        source: e,
    })?;
    let request: WorksheetRequest = serde_json::from_str(&content)?;

    let service = JobService::from_config(config)?;
    let mut events = service.subscribe();
    let job_id = service.submit(request, owner)?;
    eprintln!("Job {} submitted", job_id);

    let jobs: Arc<dyn JobRecordStore> = Arc::clone(service.jobs());
    let cancel_id = job_id.clone();
    ctrlc::set_handler(move || match cancel_job(jobs.as_ref(), &cancel_id) {
        Ok(response) => eprintln!("{}", response.message),
        Err(e) => eprintln!("Cancellation failed: {}", e),
    })?;

    let wait = service.wait(&job_id);
    tokio::pin!(wait);
    let finished = loop {
        tokio::select! {
            outcome = &mut wait => break Some(outcome),
            event = events.recv() => match event {
                Ok(event) if event.job_id == job_id => print_event(&event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!("Skipped {} progress events", skipped),
                Err(RecvError::Closed) => break None,
            },
        }
    };
    let outcome = match finished {
        Some(outcome) => outcome,
        None => wait.await,
    };
    while let Ok(event) = events.try_recv() {
        if event.job_id == job_id {
            print_event(&event);
        }
    }

    print_json(&service.status(&job_id)?)?;
    Ok(match outcome {
        Some(RunOutcome::Done { .. }) => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let config = load(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate { request, owner } => generate(&config, &request, owner).await,
        Commands::Status { job_id } => {
            let store = open_store(&config)?;
            print_json(&job_status(&store, &job_id)?)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Cancel { job_id } => {
            let store = open_store(&config)?;
            let response = cancel_job(&store, &job_id)?;
            print_json(&response)?;
            Ok(if response.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::List { owner } => {
            let store = open_store(&config)?;
            print_json(&list_jobs(&store, owner.as_deref())?)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.log_json) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
