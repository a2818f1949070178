//! Request-level errors and their JSON rendering.
//!
//! Every failure a client can observe goes through [`ClassifyError`], which
//! renders as `{"error": "<message>"}` with a fixed status code. Lower layers
//! keep their own error enums and are folded into this one at the handler.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::models::ErrorResponse;

#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The multipart form had no `file` part, or the request was not multipart.
    #[error("No file provided")]
    MissingFile,

    /// The uploaded filename's extension is not on the allow-list.
    #[error("Unsupported file type")]
    UnsupportedFileType,

    /// The PDF could not be opened or produced no pages.
    #[error("PDF conversion failed.")]
    PdfConversion,

    /// The upload exceeded the configured size cap.
    #[error("File too large")]
    PayloadTooLarge,

    /// Anything else that went wrong while handling the upload.
    #[error("An error occurred: {0}")]
    Processing(String),
}

impl ClassifyError {
    pub fn processing(err: impl std::fmt::Display) -> Self {
        ClassifyError::Processing(err.to_string())
    }
}

impl ResponseError for ClassifyError {
    fn status_code(&self) -> StatusCode {
        match self {
            ClassifyError::MissingFile | ClassifyError::UnsupportedFileType => {
                StatusCode::BAD_REQUEST
            }
            ClassifyError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ClassifyError::PdfConversion | ClassifyError::Processing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
