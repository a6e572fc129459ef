use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use innkeep::config::Config;
use innkeep::engine::Engine;
use innkeep::http::{self, AppState};
use innkeep::intake::{ChatCompletionsClient, HttpMediaSource, IntakePipeline, WhisperClient};
use innkeep::reaper;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    innkeep::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let engine = Arc::new(Engine::new(config.wal_path())?);

    let nlu = ChatCompletionsClient::new(
        config.nlu_url.clone(),
        config.nlu_model.clone(),
        config.nlu_api_key.clone(),
        config.external_timeout,
    )?;
    let media = HttpMediaSource::new(config.media_auth.clone(), config.external_timeout)?;
    let transcriber = WhisperClient::new(
        config.stt_url.clone(),
        config.stt_model.clone(),
        config.stt_api_key.clone(),
        config.external_timeout,
    )?;
    let mut intake = IntakePipeline::new(engine.clone(), Arc::new(nlu), config.external_timeout)
        .with_transcription(Arc::new(media), Arc::new(transcriber));
    if let Some(ttl) = config.session_ttl {
        intake = intake.with_sessions(ttl);
    }
    let intake = Arc::new(intake);

    let cancel = CancellationToken::new();
    let background = [
        tokio::spawn(reaper::run_reconciler(
            engine.clone(),
            config.reconcile_interval,
            cancel.clone(),
        )),
        tokio::spawn(reaper::run_compactor(
            engine.clone(),
            config.compact_threshold,
            cancel.clone(),
        )),
        tokio::spawn(reaper::run_session_sweeper(intake.clone(), cancel.clone())),
    ];

    let app = http::router(AppState {
        engine: engine.clone(),
        intake,
    });
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("innkeep listening on {addr}");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  nlu: {} ({})", config.nlu_url, config.nlu_model);
    info!(
        "  sessions: {}",
        config
            .session_ttl
            .map_or("disabled".to_string(), |ttl| format!("{}s", ttl.as_secs()))
    );
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutdown signal received, stopping background tasks");
    cancel.cancel();
    for task in background {
        let _ = task.await;
    }
    info!("innkeep stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("no SIGTERM handler ({e}), waiting for ctrl-c");
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
