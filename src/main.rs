use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use classify_backend::{configure, cors, AppState, Config, OnnxClassifier, PdfiumRasterizer};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    config.validate()?;

    let classifier = OnnxClassifier::load(&config.model_dir)
        .with_context(|| format!("loading model from {}", config.model_dir.display()))?;

    let state = web::Data::new(AppState::new(
        Arc::new(classifier),
        Arc::new(PdfiumRasterizer::new(config.pdfium_dir.clone())),
        config.max_upload_bytes,
    ));

    let origins = config.allowed_origins.clone();
    info!("Allowed origins: {}", origins.join(", "));
    info!("Server running at http://{}:{}", config.host, config.port);

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(cors(&origins))
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    });
    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    server.bind(config.bind_addr())?.run().await?;
    Ok(())
}
