use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;
use trafficmeter::*;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    // Startup failures are fatal: there is no safe default for a corrupt config or ledger.
    let config_path = config::AppConfig::path_from_env();
    let app_config = config::AppConfig::load_or_create(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    let ledger_path = app_config.data_path();
    let ledger = ledger::TrafficLedger::load(&ledger_path)
        .with_context(|| format!("loading traffic ledger {}", ledger_path.display()))?;
    tracing::info!(
        service = %version::banner(),
        sessions = ledger.session_count(),
        interface = app_config.interface_filter().as_deref().unwrap_or("*"),
        "Loaded traffic ledger"
    );
    let ledger = ledger.into_shared();

    let sysinfo_repo = Arc::new(sysinfo_repo::SysinfoRepo::new());
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let mut worker_handle = worker::spawn(
        worker::WorkerDeps {
            counter_source: sysinfo_repo.clone(),
            boot_clock: sysinfo_repo.clone(),
            ledger: ledger.clone(),
            shutdown_rx,
        },
        worker::WorkerConfig {
            app_config: app_config.clone(),
            config_path,
        },
    );

    let app = routes::app(ledger, sysinfo_repo, app_config.interface_filter());
    let addr = format!("{}:{}", app_config.host, app_config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!("Listening on http://{}", addr);

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    // The loop only finishes on its own after a fatal error.
    let finished = tokio::select! {
        result = server => {
            result?;
            let _ = shutdown_tx.send(());
            None
        }
        joined = &mut worker_handle => Some(joined),
    };
    let joined = match finished {
        Some(joined) => joined,
        None => worker_handle.await,
    };
    joined.context("accounting loop panicked")??;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("Received shutdown signal");
}
