use std::sync::Arc;

use actix_cors::Cors;
use actix_web::web;

use crate::handlers;
use crate::inference::Classifier;
use crate::pdf::PdfRasterizer;

/// Shared, read-only state handed to every request.
pub struct AppState {
    pub classifier: Arc<dyn Classifier>,
    pub rasterizer: Arc<dyn PdfRasterizer>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        rasterizer: Arc<dyn PdfRasterizer>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            classifier,
            rasterizer,
            max_upload_bytes,
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/classify").route(web::post().to(handlers::classify)))
        .service(web::resource("/health").route(web::get().to(handlers::health)));
}

/// CORS policy admitting only `origins`, with any method and header.
pub fn cors(origins: &[String]) -> Cors {
    origins.iter().fold(
        Cors::default().allow_any_method().allow_any_header(),
        |cors, origin| cors.allowed_origin(origin),
    )
}
