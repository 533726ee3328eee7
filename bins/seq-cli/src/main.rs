//! # seq-cli
//!
//! Command-line runner for the sequence orchestration engine: loads an INI
//! configuration file and a JSON sequence document, then drives every step
//! against a live GraphQL endpoint, writing the per-step results and the
//! HTTP request log to the configured output directory.
//!
//! ```bash
//! seq-cli --config config.ini
//! RUST_LOG=debug seq-cli --config config.ini
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use seq_core::{CancelFlag, Orchestrator, SequencePlan};
use seq_io::{AppConfig, CsvDatasetLoader, HttpTransport};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "seq-cli")]
#[command(about = "Run a declarative GraphQL provisioning sequence")]
struct Args {
    /// Path to the INI configuration file
    #[arg(short, long, default_value = "config.ini")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load(&args.config).context("loading configuration")?;
    let output_dir = PathBuf::from(config.get_or("files", "output_dir", "./logs"));
    std::fs::create_dir_all(&output_dir).context("creating output directory")?;

    let run_timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string();
    let _file_guard = init_logging(&output_dir, &run_timestamp)?;

    info!("starting sequence run");

    let sequence_file =
        PathBuf::from(config.get_or("files", "sequence_file", "provisioning_sequence.json"));
    let plan: SequencePlan =
        seq_io::sequence_loader::load(&sequence_file).context("loading sequence document")?;
    info!(steps = plan.steps.len(), "sequence loaded");
    if plan.has_master_iteration() {
        info!(master = %plan.master_iterate_over, "batch mode active");
    }

    let request_timeout = config.get_f64("execution", "request_timeout", 30.0);
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs_f64(request_timeout))
        .build()
        .context("building http client")?;

    let api_key = config.get("api", "api_key").context("missing [api] api_key")?;
    let account_id = config.get("api", "account_id").context("missing [api] account_id")?;
    let api_url = config.get_or("api", "api_url", "https://api.catonetworks.com/api/v1/graphql2");
    let http_logging_enabled = config.get_bool("execution", "enable_http_logging", true);

    let transport =
        std::sync::Arc::new(HttpTransport::new(http_client, api_url, api_key, http_logging_enabled));
    let transport_for_log = transport.clone();

    let mut orchestrator = Orchestrator::new(
        Box::new(transport),
        Box::new(CsvDatasetLoader),
        account_id,
        HashMap::new(),
    );

    let cancel = Arc::new(CancelFlag::new());
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            error!("received ctrl-c, finishing the in-flight step before exit");
            cancel_for_signal.cancel();
        }
    });

    let results = match orchestrator.run(&plan, &cancel).await {
        Ok(results) => results,
        Err(err) => {
            error!(error = %err, "fatal engine error");
            return Err(err.into());
        }
    };

    let results_path = seq_io::sink::write_results(&output_dir, &run_timestamp, &results)
        .context("writing results file")?;
    info!(path = %results_path.display(), "results written");

    if let Some(http_log_path) =
        seq_io::sink::write_http_log(&output_dir, &run_timestamp, transport_for_log.log())
            .context("writing http request log")?
    {
        info!(path = %http_log_path.display(), "http request log written");
    }

    print_summary(&results);

    if cancel.is_cancelled() {
        error!("run cancelled, exiting with partial results");
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(results: &[seq_core::StepOutcome]) {
    let success_count = results.iter().filter(|r| r.is_success()).count();
    let error_count = results.len() - success_count;
    info!(success_count, error_count, total = results.len(), "run summary");
    if error_count == 0 {
        info!("all steps provisioned successfully");
    } else {
        info!(error_count, "errors detected, consult the results file");
    }
}

fn init_logging(
    output_dir: &std::path::Path,
    run_timestamp: &str,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let file_appender =
        tracing_appender::rolling::never(output_dir, format!("execution_{run_timestamp}.log"));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}
