//! Brand monitor — binary entrypoint.
//! Every tick: analyse pending responses, then run one alert cycle.
//!
//! See `README.md` for configuration and environment variables.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ai_brand_monitor::config::env_flag;
use ai_brand_monitor::metrics::Metrics;
use ai_brand_monitor::{
    AlertEngine, DataProcessor, MonitorConfig, NotifierMux, PgStore, ResponseStore, TextAnalyzer,
};

/// `info` unless RUST_LOG says otherwise; LOG_FORMAT=json for JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn serve_metrics(metrics: &Metrics, addr: &str) -> Result<()> {
    let addr: SocketAddr = addr.parse().with_context(|| format!("invalid METRICS_ADDR {addr}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding metrics listener on {addr}"))?;
    let router = metrics.router();
    info!(%addr, "metrics endpoint listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!(error = %e, "metrics server stopped");
        }
    });
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = MonitorConfig::load_default().context("loading monitor config")?;

    if let Ok(addr) = std::env::var("METRICS_ADDR") {
        let metrics = Metrics::init()?;
        serve_metrics(&metrics, &addr).await?;
    }

    let url = std::env::var("DATABASE_URL").context("DATABASE_URL missing")?;
    let pg = PgStore::connect_lazy(&url)?;
    pg.init_schema().await.context("initialising schema")?;
    let store: Arc<dyn ResponseStore> = Arc::new(pg);

    let notifier = Arc::new(NotifierMux::from_env()?);
    let engine = AlertEngine::new(cfg.rules.clone(), store.clone(), notifier, cfg.engine_config())?;

    let analyzer = Arc::new(TextAnalyzer::from_default_config());
    let processor = DataProcessor::new(analyzer, &cfg.monitor.brand_keywords, store)
        .with_batch_limit(cfg.monitor.batch_limit)
        .with_context_window(cfg.monitor.context_window);

    let run_once = env_flag("RUN_ONCE").unwrap_or(false);
    info!(
        rules = engine.rules().len(),
        brands = cfg.monitor.brand_keywords.len(),
        interval_secs = cfg.monitor.interval_secs,
        run_once,
        "brand monitor started"
    );

    let mut ticker = tokio::time::interval(cfg.interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;

        if let Err(e) = processor.batch_process_unprocessed().await {
            warn!(error = %e, "batch analysis skipped");
        }
        engine.run_cycle().await;

        if run_once {
            break;
        }
    }

    info!("brand monitor finished");
    Ok(())
}
