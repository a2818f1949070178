//! HTTP service that classifies an uploaded image, or the first page of an
//! uploaded PDF, with a pretrained ONNX image classifier.

pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod imaging;
pub mod inference;
pub mod labels;
pub mod models;
pub mod pdf;
pub mod preprocess;
pub mod upload;

pub use app::{configure, cors, AppState};
pub use config::Config;
pub use error::ClassifyError;
pub use inference::{Classifier, OnnxClassifier};
pub use pdf::{PdfRasterizer, PdfiumRasterizer};
