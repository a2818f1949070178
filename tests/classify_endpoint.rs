//! End-to-end tests for `POST /classify` through the real actix app.
//!
//! The ONNX model and pdfium are replaced by small stand-ins so the tests run
//! without model weights or a pdfium library: the classifier labels an image
//! "bright" or "dark" from its mean intensity, and the rasterizer hands back
//! pre-rendered JPEG pages.

use std::io::Cursor;
use std::sync::Arc;

use actix_web::http::header::{self, HeaderValue};
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::Value;

use classify_backend::inference::InferenceError;
use classify_backend::pdf::{encode_jpeg, PdfError};
use classify_backend::{configure, cors, AppState, Classifier, PdfRasterizer};

const BOUNDARY: &str = "----classify-test-boundary";
const LABELS: [&str; 2] = ["bright", "dark"];

// ── Stand-ins ────────────────────────────────────────────────────────────────

struct Brightness;

impl Classifier for Brightness {
    fn classify(&self, image: &RgbImage) -> Result<String, InferenceError> {
        let (sum, count) = image
            .pixels()
            .flat_map(|p| p.0)
            .fold((0u64, 0u64), |(s, n), v| (s + v as u64, n + 1));
        if count == 0 {
            return Err(InferenceError::NoScores);
        }
        let label = if sum / count > 127 { LABELS[0] } else { LABELS[1] };
        Ok(label.to_string())
    }
}

/// Treats any input starting with `%PDF` as a document with the given pages.
struct FakePdf {
    pages: Vec<Vec<u8>>,
}

impl PdfRasterizer for FakePdf {
    fn rasterize(&self, pdf: &[u8]) -> Result<Vec<Vec<u8>>, PdfError> {
        if !pdf.starts_with(b"%PDF") {
            return Err(PdfError::Corrupt("missing header".to_string()));
        }
        Ok(self.pages.clone())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn solid(value: u8) -> RgbImage {
    RgbImage::from_pixel(16, 12, Rgb([value, value, value]))
}

fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let dynamic = match format {
        ImageFormat::Gif => DynamicImage::ImageRgba8(DynamicImage::ImageRgb8(image.clone()).to_rgba8()),
        _ => DynamicImage::ImageRgb8(image.clone()),
    };
    let mut buf = Cursor::new(Vec::new());
    dynamic.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

fn jpeg_page(value: u8) -> Vec<u8> {
    encode_jpeg(DynamicImage::ImageRgb8(solid(value)), 1).unwrap()
}

/// Two pages: a dark first page and a bright second page.
fn two_page_pdf() -> FakePdf {
    FakePdf {
        pages: vec![jpeg_page(10), jpeg_page(250)],
    }
}

fn multipart(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let parts: Vec<_> = parts
        .iter()
        .map(|(name, filename, bytes)| (*name, Some(*filename), *bytes))
        .collect();
    form_body(&parts)
}

/// Builds a multipart body; a part with no filename is a plain text field.
fn form_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let disposition = match filename {
            Some(filename) => {
                format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n")
            }
            None => format!("Content-Disposition: form-data; name=\"{name}\"\r\n"),
        };
        body.extend_from_slice(disposition.as_bytes());
        if filename.is_some() {
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n");
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn form_request(body: Vec<u8>) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/classify")
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        ))
        .set_payload(body)
}

fn upload_request(parts: &[(&str, &str, &[u8])]) -> test::TestRequest {
    form_request(multipart(parts))
}

fn state(rasterizer: FakePdf, max_upload_bytes: usize) -> web::Data<AppState> {
    web::Data::new(AppState::new(
        Arc::new(Brightness),
        Arc::new(rasterizer),
        max_upload_bytes,
    ))
}

async fn send(data: web::Data<AppState>, req: test::TestRequest) -> (StatusCode, Value) {
    let app = test::init_service(App::new().app_data(data).configure(configure)).await;
    let resp = test::call_service(&app, req.to_request()).await;
    let status = resp.status();
    let body: Value = test::read_body_json(resp).await;
    (status, body)
}

async fn classify(parts: &[(&str, &str, &[u8])]) -> (StatusCode, Value) {
    send(state(two_page_pdf(), 1024 * 1024), upload_request(parts)).await
}

// ── Success paths ────────────────────────────────────────────────────────────

#[actix_rt::test]
async fn png_jpeg_and_gif_are_classified() {
    let bright = solid(240);
    let cases = [
        ("a.png", encode(&bright, ImageFormat::Png)),
        ("a.jpg", encode(&bright, ImageFormat::Jpeg)),
        ("a.JPEG", encode(&bright, ImageFormat::Jpeg)),
        ("a.gif", encode(&bright, ImageFormat::Gif)),
    ];

    for (filename, bytes) in cases {
        let (status, body) = classify(&[("file", filename, &bytes)]).await;
        assert_eq!(status, StatusCode::OK, "{filename}: {body}");
        assert_eq!(body, serde_json::json!({"result": "bright"}), "{filename}");
    }
}

#[actix_rt::test]
async fn result_is_always_a_known_label() {
    for value in [0u8, 64, 127, 128, 200, 255] {
        let png = encode(&solid(value), ImageFormat::Png);
        let (status, body) = classify(&[("file", "x.png", &png)]).await;
        assert_eq!(status, StatusCode::OK);
        let label = body["result"].as_str().unwrap();
        assert!(LABELS.contains(&label), "unexpected label {label}");
    }
}

#[actix_rt::test]
async fn pdf_matches_its_first_page_submitted_as_image() {
    let (status, from_pdf) = classify(&[("file", "scan.pdf", b"%PDF-1.7 two pages")]).await;
    assert_eq!(status, StatusCode::OK);

    let first_page = jpeg_page(10);
    let (status, from_image) = classify(&[("file", "page1.jpg", &first_page)]).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(from_pdf, from_image);
    assert_eq!(from_pdf["result"], "dark");
}

#[actix_rt::test]
async fn only_the_file_field_is_used() {
    let png = encode(&solid(255), ImageFormat::Png);
    let (status, body) = classify(&[
        ("comment", "note.txt", b"hello"),
        ("file", "photo.png", &png),
    ])
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "bright");
}

// ── Client errors ────────────────────────────────────────────────────────────

#[actix_rt::test]
async fn missing_file_field_is_400() {
    let (status, body) = classify(&[("upload", "a.png", b"whatever")]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, serde_json::json!({"error": "No file provided"}));
}

#[actix_rt::test]
async fn text_field_named_file_is_not_an_upload() {
    let body = form_body(&[("file", None, b"hello")]);
    let (status, body) = send(state(two_page_pdf(), 1024), form_request(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, serde_json::json!({"error": "No file provided"}));
}

#[actix_rt::test]
async fn file_part_after_text_field_named_file_is_used() {
    let png = encode(&solid(250), ImageFormat::Png);
    let body = form_body(&[("file", None, b"hello"), ("file", Some("a.png"), &png)]);
    let (status, body) = send(state(two_page_pdf(), 1024 * 1024), form_request(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"], "bright");
}

#[actix_rt::test]
async fn non_multipart_request_is_400() {
    let req = test::TestRequest::post().uri("/classify");
    let (status, body) = send(state(two_page_pdf(), 1024), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");
}

#[actix_rt::test]
async fn unsupported_extension_is_400_regardless_of_content() {
    let png = encode(&solid(100), ImageFormat::Png);
    for filename in ["image.bmp", "image.webp", "archive.zip", "noext"] {
        let (status, body) = classify(&[("file", filename, &png)]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{filename}");
        assert_eq!(body, serde_json::json!({"error": "Unsupported file type"}));
    }
}

#[actix_rt::test]
async fn oversized_upload_is_413() {
    let png = encode(&solid(100), ImageFormat::Png);
    let data = state(two_page_pdf(), 16);
    let (status, body) = send(data, upload_request(&[("file", "a.png", &png)])).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "File too large");
}

// ── Server errors ────────────────────────────────────────────────────────────

#[actix_rt::test]
async fn corrupt_pdf_is_500_conversion_failed() {
    let (status, body) = classify(&[("file", "broken.pdf", b"not a pdf at all")]).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, serde_json::json!({"error": "PDF conversion failed."}));
}

#[actix_rt::test]
async fn pdf_without_pages_is_500_conversion_failed() {
    let data = state(FakePdf { pages: vec![] }, 1024);
    let req = upload_request(&[("file", "empty.pdf", b"%PDF-1.4")]);
    let (status, body) = send(data, req).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "PDF conversion failed.");
}

#[actix_rt::test]
async fn renamed_binary_is_500_generic_error() {
    let binary = [0x7Fu8, b'E', b'L', b'F', 2, 1, 1, 0, 0, 0, 0, 0];
    let (status, body) = classify(&[("file", "program.jpg", &binary)]).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("An error occurred: "), "got: {message}");
}

// ── Health and CORS ──────────────────────────────────────────────────────────

#[actix_rt::test]
async fn health_reports_ok() {
    let req = test::TestRequest::get().uri("/health");
    let (status, body) = send(state(two_page_pdf(), 1024), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[actix_rt::test]
async fn cors_admits_only_configured_origins() {
    let origins = vec![
        "http://localhost:5173".to_string(),
        "https://your-frontend.onrender.com".to_string(),
    ];
    let app = test::init_service(
        App::new()
            .wrap(cors(&origins))
            .app_data(state(two_page_pdf(), 1024))
            .configure(configure),
    )
    .await;

    let allowed = test::TestRequest::get()
        .uri("/health")
        .insert_header((header::ORIGIN, "http://localhost:5173"))
        .to_request();
    let resp = test::call_service(&app, allowed).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
        Some(&HeaderValue::from_static("http://localhost:5173"))
    );

    let denied = test::TestRequest::get()
        .uri("/health")
        .insert_header((header::ORIGIN, "https://evil.example"))
        .to_request();
    let resp = test::call_service(&app, denied).await;
    assert!(resp
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}
