use anyhow::Context;
use clap::Parser;
use shorty_core::{Repository, Shortener};
use shorty_gateway::cli::{Cli, GeneratorArg, StorageBackendArg};
use shorty_gateway::{App, AppState};
use shorty_generator::{RandomGenerator, SeqGenerator};
use shorty_shortener::{ShortenerService, ShortenerSettings};
use shorty_storage::{InMemoryRepository, RedisRepository};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse();
    shorty_telemetry::init(config.log_format.into())?;

    info!(
        listen_addr = %config.listen_addr,
        storage_backend = %config.storage,
        generator = %config.generator,
        public_base_url = %config.public_base_url,
        "starting shorty gateway"
    );

    let shortener = match config.storage {
        StorageBackendArg::InMemory => build_shortener(InMemoryRepository::new(), &config),
        StorageBackendArg::Redis => {
            let redis_url = config
                .redis_url
                .as_deref()
                .context("redis url is required when storage backend is redis")?;
            let repository = RedisRepository::connect(redis_url, config.redis_key_prefix.clone())
                .await
                .context("failed to connect to redis")?;
            build_shortener(repository, &config)
        }
    };

    let indexed = shortener
        .rebuild_index()
        .await
        .context("failed to rebuild acceleration index")?;
    info!(entries = indexed, "acceleration index ready");

    let state = AppState::new(shortener, config.public_base_url.clone());
    let app = App::router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(listen_addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("gateway stopped");
    Ok(())
}

fn build_shortener<R: Repository>(repository: R, config: &Cli) -> Arc<dyn Shortener> {
    let settings = ShortenerSettings::builder()
        .max_generation_attempts(config.max_generation_attempts)
        .build();

    match config.generator {
        GeneratorArg::Random => Arc::new(ShortenerService::with_settings(
            repository,
            RandomGenerator::with_length(config.code_length),
            settings,
        )),
        GeneratorArg::Seq => Arc::new(ShortenerService::with_settings(
            repository,
            SeqGenerator::with_prefix(config.generator_prefix.clone()),
            settings,
        )),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
