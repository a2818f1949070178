use std::time::Instant;

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ClassifyError;
use crate::imaging::decode_rgb;
use crate::inference::Classifier;
use crate::models::{HealthResponse, PredictionResponse};
use crate::pdf::PdfRasterizer;
use crate::upload::{read_upload, FileKind};

/// `POST /classify`: classify the uploaded image, or the first page of an uploaded PDF.
pub async fn classify(
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ClassifyError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("classify", %request_id);

    async move {
        let upload = read_upload(payload, state.max_upload_bytes).await?;
        let kind = upload.kind().map_err(|e| {
            warn!("Rejected '{}': unsupported extension", upload.filename);
            e
        })?;
        info!(
            "Classifying '{}' as {} ({} bytes)",
            upload.filename,
            kind.as_str(),
            upload.bytes.len()
        );

        let started = Instant::now();
        let classifier = state.classifier.clone();
        let rasterizer = state.rasterizer.clone();

        // decoding, rendering and the forward pass are all CPU-bound
        let label = web::block(move || {
            classify_upload(kind, &upload.bytes, classifier.as_ref(), rasterizer.as_ref())
        })
        .await
        .map_err(ClassifyError::processing)??;

        info!(
            "Predicted '{}' in {} ms",
            label,
            started.elapsed().as_millis()
        );
        Ok::<_, ClassifyError>(HttpResponse::Ok().json(PredictionResponse { result: label }))
    }
    .instrument(span)
    .await
}

/// Runs the blocking part of a request: decode (or rasterize), then classify.
pub fn classify_upload(
    kind: FileKind,
    bytes: &[u8],
    classifier: &dyn Classifier,
    rasterizer: &dyn PdfRasterizer,
) -> Result<String, ClassifyError> {
    let image = match kind {
        FileKind::Image => decode_rgb(bytes).map_err(|e| {
            warn!("Failed to decode image: {}", e);
            ClassifyError::processing(e)
        })?,
        FileKind::Pdf => {
            // the rasterizer logs its own failures
            let pages = rasterizer.rasterize(bytes).unwrap_or_default();
            debug!("PDF rasterized to {} page image(s)", pages.len());

            let first = pages.first().ok_or(ClassifyError::PdfConversion)?;
            decode_rgb(first).map_err(|e| {
                warn!("Failed to decode rendered PDF page: {}", e);
                ClassifyError::processing(e)
            })?
        }
    };

    classifier.classify(&image).map_err(|e| {
        warn!("{}", e);
        ClassifyError::processing(e)
    })
}

/// `GET /health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
    })
}
