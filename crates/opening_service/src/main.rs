//! Opening service entry point.
//!
//! Loads the opening reference book, starts the game poller and the
//! classification service, and serves the HTTP read API.

use anyhow::{Context, Result};
use feed::{GamePoller, PollerConfig, Source};
use lichess::LichessClient;
use metrics_exporter_prometheus::PrometheusBuilder;
use normalizer::definitions::parse_book;
use opening_service::{
    create_router, AppState, Classifier, GameRegistry, OpeningIndex, OpeningService,
    OpeningServiceConfig, OpeningTree, QueryService, ServiceStats,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Reference book compiled into the binary; `OPENINGS_PATH` overrides it.
const DEFAULT_BOOK: &str = include_str!("../data/openings.tsv");

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting opening service...");

    // Initialize Prometheus metrics
    let metrics_port: u16 = env_parse("METRICS_PORT", 9091);
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], metrics_port))
        .install()?;
    info!(
        "Prometheus metrics available at http://0.0.0.0:{}/metrics",
        metrics_port
    );

    // Configuration from environment
    let http_port: u16 = env_parse("HTTP_PORT", 8080);
    let poll_interval = Duration::from_secs(env_parse("POLL_INTERVAL_SECS", 30u64));
    let staleness_window = Duration::from_secs(env_parse("STALENESS_SECS", 120u64));
    let sweep_interval = Duration::from_secs(env_parse("SWEEP_INTERVAL_SECS", 15u64));
    let poll_limit = std::env::var("POLL_LIMIT").ok().and_then(|v| v.parse().ok());
    let source = match std::env::var("SOURCE") {
        Ok(raw) => Source::parse(&raw).with_context(|| format!("unknown SOURCE '{}'", raw))?,
        Err(_) => Source::default(),
    };

    // Load the opening reference book. A corrupt book is fatal: serving
    // with a broken tree would silently mis-classify every game.
    let book = match std::env::var("OPENINGS_PATH") {
        Ok(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read opening book at {}", path))?,
        Err(_) => DEFAULT_BOOK.to_string(),
    };
    let definitions = parse_book(&book).context("invalid opening book")?;
    let tree = Arc::new(
        OpeningTree::build(definitions).context("opening book failed validation, refusing to serve")?,
    );

    // Core state: index seeded from the tree, registry wired to both
    let index = Arc::new(OpeningIndex::from_tree(&tree));
    let stats = Arc::new(ServiceStats::new());
    let registry = Arc::new(GameRegistry::new(
        Classifier::new(tree),
        index.clone(),
        stats.clone(),
        staleness_window,
    ));

    // Channel plumbing: poller -> service, plus shutdown channels
    let (update_tx, update_rx) = mpsc::channel(256);
    let (service_shutdown_tx, service_shutdown_rx) = mpsc::channel::<()>(1);
    let (poller_shutdown_tx, poller_shutdown_rx) = mpsc::channel::<()>(1);

    // Spawn the game poller
    let lichess_url =
        std::env::var("LICHESS_URL").unwrap_or_else(|_| lichess::DEFAULT_BASE_URL.into());
    let client = LichessClient::with_base_url(&lichess_url)?;
    let poller_config = PollerConfig {
        source,
        interval: poll_interval,
        limit: poll_limit,
    };
    let poller = GamePoller::new(client, poller_config, update_tx, poller_shutdown_rx);
    let poller_handle = tokio::spawn(async move {
        if let Err(e) = poller.run().await {
            error!("Game poller failed: {:?}", e);
        }
    });

    // Spawn the classification service
    let service_config = OpeningServiceConfig {
        sweep_interval,
        ..Default::default()
    };
    let service = OpeningService::new(
        registry.clone(),
        index.clone(),
        service_config,
        update_rx,
        service_shutdown_rx,
    );
    let service_handle = tokio::spawn(async move {
        if let Err(e) = service.run().await {
            error!("OpeningService failed: {:?}", e);
        }
    });

    // Create HTTP server
    let app_state = AppState {
        query: QueryService::new(registry, index, stats),
    };
    let router = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", http_port)).await?;
    info!("HTTP API listening on http://0.0.0.0:{}", http_port);
    info!("Available endpoints:");
    info!("  GET /                      - Live openings browser");
    info!("  GET /health                - Health check");
    info!("  GET /stats                 - Service statistics");
    info!("  GET /openings              - Filtered opening index");
    info!("  GET /openings/{{code}}/games - Games for one opening");
    info!("  GET /games                 - All tracked games");
    info!("  GET /games/{{id}}            - Single game snapshot");

    // Run HTTP server with graceful shutdown
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(service_shutdown_tx, poller_shutdown_tx))
        .await?;

    // Wait for background tasks to stop
    let _ = poller_handle.await;
    let _ = service_handle.await;

    info!("Opening service stopped");
    Ok(())
}

/// Read an environment variable, falling back to `default` when unset or
/// unparseable.
fn env_parse<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Ignoring unparseable {}={}", name, raw);
            default
        }),
        Err(_) => default,
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal(service_tx: mpsc::Sender<()>, poller_tx: mpsc::Sender<()>) {
    tokio::signal::ctrl_c().await.ok();
    info!("Received shutdown signal");
    let _ = poller_tx.send(()).await;
    let _ = service_tx.send(()).await;
}
