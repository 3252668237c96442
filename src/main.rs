use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use compact_connect::accounts::AccountService;
use compact_connect::clients::{MemoryIdentityProvider, MemoryNotifier};
use compact_connect::config::AppConfig;
use compact_connect::encumbrance::EncumbranceService;
use compact_connect::error::AppError;
use compact_connect::events::{IngestQueue, MemoryQueue, RecordingPublisher};
use compact_connect::home::HomeJurisdictionService;
use compact_connect::pipeline::{
    IngestService, PreprocessService, RawLicenseUpload, UploadBatchItem,
};
use compact_connect::ratelimit::SsnAccessMonitor;
use compact_connect::routes::{compact_router, AppServices};
use compact_connect::store::memory::{MemoryStore, MemorySsnIndex};
use compact_connect::store::{ProviderStore, RecordBody};
use compact_connect::telemetry;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

type MemoryServices = AppServices<
    MemoryStore,
    MemorySsnIndex,
    MemoryQueue,
    RecordingPublisher,
    MemoryNotifier,
    MemoryIdentityProvider,
>;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Compact Connect",
    about = "Provider record reconciliation engine for multi-state licensure compacts",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run the two-stage ingest pipeline against a JSON upload file
    Ingest(IngestArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct IngestArgs {
    /// JSON file containing an array of raw license upload records
    #[arg(long)]
    file: PathBuf,
    /// Evaluation date for status derivation (defaults to today)
    #[arg(long, value_parser = parse_date)]
    today: Option<NaiveDate>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Ingest(args) => run_ingest_demo(args),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

fn build_services(config: &AppConfig) -> Arc<MemoryServices> {
    let store = Arc::new(MemoryStore::new());
    let ssn_index = Arc::new(MemorySsnIndex::new());
    let queue = Arc::new(MemoryQueue::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let notifier = Arc::new(MemoryNotifier::new());
    let identity = Arc::new(MemoryIdentityProvider::new());
    let monitor = Arc::new(SsnAccessMonitor::from_config(&config.ssn_access));

    Arc::new(AppServices {
        preprocess: PreprocessService::new(store.clone(), ssn_index.clone(), queue.clone()),
        ingest: IngestService::new(store.clone(), publisher.clone()),
        home: HomeJurisdictionService::new(store.clone(), publisher.clone()),
        encumbrance: EncumbranceService::new(store.clone(), publisher.clone()),
        accounts: AccountService::new(store.clone(), ssn_index, notifier, identity, monitor),
        store,
        queue,
    })
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let services = build_services(&config);

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(compact_router(services))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "compact connect ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_ingest_demo(args: IngestArgs) -> Result<(), AppError> {
    let IngestArgs { file, today } = args;
    let today = today.unwrap_or_else(|| Local::now().date_naive());

    let raw = std::fs::read_to_string(&file)?;
    let uploads: Vec<RawLicenseUpload> = serde_json::from_str(&raw)?;
    let total = uploads.len();
    let compacts: BTreeSet<String> = uploads
        .iter()
        .map(|upload| upload.compact.0.clone())
        .collect();

    let config = AppConfig::load()?;
    let services = build_services(&config);

    let items = uploads
        .into_iter()
        .enumerate()
        .map(|(index, upload)| UploadBatchItem {
            item_id: format!("upload-{index}"),
            upload,
        })
        .collect();
    let mut failures = services.preprocess.preprocess_batch(items);

    let queued = services
        .queue
        .receive(total)
        .map_err(compact_connect::error::DomainError::from)?;
    let messages = queued
        .into_iter()
        .enumerate()
        .map(|(index, body)| (format!("ingest-{index}"), body))
        .collect();
    failures.extend(services.ingest.ingest_batch(messages, today));

    println!("License ingest demo (evaluated {today})");
    println!("Processed {total} upload(s), {} failed", failures.len());
    for failure in &failures {
        println!("- {}: {}", failure.item_id, failure.reason);
    }

    for compact in compacts {
        let compact = compact_connect::domain::Compact(compact);
        let providers = services
            .store
            .providers_by_family_name(&compact)
            .map_err(compact_connect::error::DomainError::from)?;
        println!("\nProviders in {compact}");
        for provider in providers {
            println!(
                "- {} {} ({}), home {}, status {}, eligibility {}",
                provider.given_name,
                provider.family_name,
                provider.provider_id,
                provider
                    .license_jurisdiction
                    .as_ref()
                    .map(|jurisdiction| jurisdiction.0.as_str())
                    .unwrap_or("none"),
                provider.license_status.label(),
                provider.compact_eligibility.label(),
            );

            for record in services
                .store
                .provider_records(&compact, provider.provider_id)
                .map_err(compact_connect::error::DomainError::from)?
            {
                match record.body {
                    RecordBody::License(license) => println!(
                        "    license {}/{}: {} ({})",
                        license.jurisdiction,
                        license.license_type,
                        license.status.label(),
                        license.compact_eligibility.label(),
                    ),
                    RecordBody::Privilege(privilege) => println!(
                        "    privilege {}/{}: {}",
                        privilege.jurisdiction,
                        privilege.license_type,
                        privilege.status.label(),
                    ),
                    _ => {}
                }
            }
        }
    }

    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
