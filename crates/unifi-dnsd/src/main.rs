// # unifi-dnsd - external-dns UniFi webhook daemon
//
// This daemon is a THIN integration layer:
// - All reconciliation logic lives in unifi-dns-core
// - All UniFi API details live in unifi-dns-client
// - Configuration is via environment variables ONLY
//
// The daemon is responsible for:
// 1. Reading and validating configuration from the environment
// 2. Initializing logging and the runtime
// 3. Wiring client, engine, readiness cache and metrics together
// 4. Serving the webhook and health listeners until SIGINT/SIGTERM
//
// ## Configuration
//
// ### UniFi controller
// - `WEBHOOK_UNIFI_HOST`: Controller base URL (default `https://unifi.local`)
// - `WEBHOOK_UNIFI_API_KEY`: API key (required)
// - `WEBHOOK_UNIFI_SITE`: Site name (default `default`)
// - `WEBHOOK_UNIFI_SKIP_TLS_VERIFY`: Accept invalid certificates (default `false`)
//
// ### Listeners
// - `WEBHOOK_SERVER_HOST` / `WEBHOOK_SERVER_PORT`: webhook API (default `localhost:8888`)
// - `WEBHOOK_HEALTH_HOST` / `WEBHOOK_HEALTH_PORT`: health and metrics (default `0.0.0.0:8080`)
//
// ### Domain filter
// - `WEBHOOK_DOMAIN_FILTER_FILTERS`: Comma-separated managed domains
// - `WEBHOOK_DOMAIN_FILTER_EXCLUDE_FILTERS`: Comma-separated excluded domains
//
// ### Logging
// - `WEBHOOK_LOGGING_LEVEL`: trace, debug, info, warn, error (default `info`)
// - `WEBHOOK_LOGGING_FORMAT`: json or text (default `json`)
//
// ### Engine
// - `WEBHOOK_ENGINE_MAX_CONCURRENCY`: Remote mutations in flight (default 5)
// - `WEBHOOK_ENGINE_OPERATION_TIMEOUT_SECS`: Per-operation deadline (default 30)
// - `WEBHOOK_ENGINE_READINESS_TTL_SECS`: Readiness cache TTL (default 30)
//
// ## Example
//
// ```bash
// export WEBHOOK_UNIFI_HOST=https://192.168.1.1
// export WEBHOOK_UNIFI_API_KEY=your_key
// export WEBHOOK_DOMAIN_FILTER_FILTERS=home.example.com
//
// unifi-dnsd
// ```

mod health;
mod metrics;
#[cfg(test)]
mod test_support;
mod webhook;

use anyhow::{Context, Result};
use axum::Router;
use std::future::IntoFuture;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use unifi_dns_client::UnifiClient;
use unifi_dns_core::{
    DnsProvider, LogFormat, MetricsRecorder, ReadinessCache, ReconciliationEngine, WebhookConfig,
};

use crate::metrics::PrometheusRecorder;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// How long in-flight requests may run after a shutdown signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum WebhookExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<WebhookExitCode> for ExitCode {
    fn from(code: WebhookExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match WebhookConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return WebhookExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return WebhookExitCode::ConfigError.into();
    }

    if let Err(e) = init_tracing(&config) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return WebhookExitCode::ConfigError.into();
    }

    let client = match UnifiClient::from_config(&config.unifi) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "failed to create UniFi client");
            return WebhookExitCode::ConfigError.into();
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        site = %config.unifi.site,
        server = %config.server.address(),
        health = %config.health.address(),
        max_concurrency = config.engine.max_concurrency,
        "starting external-dns UniFi webhook"
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return WebhookExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config, client).await {
            error!("Daemon error: {:#}", e);
            WebhookExitCode::RuntimeError
        } else {
            WebhookExitCode::CleanShutdown
        }
    });

    result.into()
}

fn init_tracing(config: &WebhookConfig) -> Result<()> {
    let level = match config.logging.level.to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder().with_max_level(level);
    match config.logging.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
    }
    Ok(())
}

/// Request tracing and panic recovery shared by both listeners
///
/// A panicking handler answers 500 instead of dropping the connection.
fn http_layers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
}

/// Run both listeners until shutdown
async fn run_daemon(config: WebhookConfig, client: UnifiClient) -> Result<()> {
    let recorder = Arc::new(PrometheusRecorder::new().context("failed to register metrics")?);
    let metrics: Arc<dyn MetricsRecorder> = recorder.clone();

    let engine = ReconciliationEngine::new(
        Arc::new(client),
        config.unifi.site.clone(),
        config.domain_filter.build(),
    )
    .with_limiter(config.engine.limiter())
    .with_metrics(metrics.clone());
    let provider: Arc<dyn DnsProvider> = Arc::new(engine);

    let readiness = Arc::new(
        ReadinessCache::new(provider.clone(), config.engine.readiness_ttl()).with_metrics(metrics),
    );

    // Stops accepting connections
    let shutdown = CancellationToken::new();
    // Aborts in-flight remote work once draining runs out of time
    let requests = CancellationToken::new();

    let webhook_listener = TcpListener::bind(config.server.address())
        .await
        .with_context(|| format!("failed to bind webhook listener on {}", config.server.address()))?;
    let health_listener = TcpListener::bind(config.health.address())
        .await
        .with_context(|| format!("failed to bind health listener on {}", config.health.address()))?;

    info!(address = %config.server.address(), "webhook server listening");
    info!(address = %config.health.address(), "health server listening");

    let signals = ShutdownSignals::install()?;
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        let name = signals.recv().await;
        info!(signal = name, "received shutdown signal");
        signal_token.cancel();
    });

    let webhook_server = axum::serve(
        webhook_listener,
        webhook::router(provider, requests.clone()),
    )
    .with_graceful_shutdown(shutdown.clone().cancelled_owned());
    let health_server = axum::serve(
        health_listener,
        health::router(readiness, recorder, requests.clone()),
    )
    .with_graceful_shutdown(shutdown.clone().cancelled_owned());

    let servers = async {
        tokio::try_join!(webhook_server.into_future(), health_server.into_future())
            .context("server error")
    };
    tokio::pin!(servers);

    tokio::select! {
        result = &mut servers => {
            result?;
        }
        _ = shutdown.cancelled() => {
            info!("shutting down, draining in-flight requests");
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut servers).await {
                Ok(result) => {
                    result?;
                }
                Err(_) => {
                    warn!("graceful shutdown timed out after {:?}", SHUTDOWN_TIMEOUT);
                    requests.cancel();
                }
            }
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Registered SIGTERM/SIGINT handlers
#[cfg(unix)]
struct ShutdownSignals {
    sigterm: Signal,
    sigint: Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        let sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
        let sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;
        Ok(Self { sigterm, sigint })
    }

    /// Wait for the first signal and return its name
    async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}

/// CTRL-C only; fallback for non-Unix platforms
#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for CTRL-C: {}", e);
        }
        "SIGINT"
    }
}
