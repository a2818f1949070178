//! PDF rasterisation via pdfium.
//!
//! Every page is rendered at a scale factor of 1.0 (one pixel per PDF point,
//! i.e. 72 DPI) and encoded as a JPEG buffer. Callers currently only use the
//! first page.

use std::io::Cursor;
use std::path::PathBuf;

use image::{DynamicImage, ImageFormat};
use pdfium_render::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("failed to bind to pdfium library: {0}")]
    Binding(String),

    #[error("PDF could not be opened: {0}")]
    Corrupt(String),

    #[error("rendering page {page} failed: {detail}")]
    Render { page: usize, detail: String },

    #[error("encoding page {page} as JPEG failed: {source}")]
    Encode {
        page: usize,
        #[source]
        source: image::ImageError,
    },
}

/// Renders each page of a PDF to an encoded raster image, in page order.
pub trait PdfRasterizer: Send + Sync {
    fn rasterize(&self, pdf: &[u8]) -> Result<Vec<Vec<u8>>, PdfError>;
}

#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    library_dir: Option<PathBuf>,
}

impl PdfiumRasterizer {
    /// Uses the pdfium library in `library_dir`, or the system library when `None`.
    pub fn new(library_dir: Option<PathBuf>) -> Self {
        Self { library_dir }
    }

    fn bind(&self) -> Result<Pdfium, PdfError> {
        let bindings = match &self.library_dir {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| PdfError::Binding(format!("{e:?}")))?;

        Ok(Pdfium::new(bindings))
    }

    fn render_all(&self, pdf: &[u8]) -> Result<Vec<Vec<u8>>, PdfError> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf, None)
            .map_err(|e| PdfError::Corrupt(format!("{e:?}")))?;

        let pages = document.pages();
        info!("PDF loaded: {} pages", pages.len());

        let render_config = PdfRenderConfig::new().scale_page_by_factor(1.0);
        let mut images = Vec::with_capacity(pages.len() as usize);

        for (index, page) in pages.iter().enumerate() {
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| PdfError::Render {
                    page: index + 1,
                    detail: format!("{e:?}"),
                })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                index + 1,
                image.width(),
                image.height()
            );

            images.push(encode_jpeg(image, index + 1)?);
        }

        Ok(images)
    }
}

impl PdfRasterizer for PdfiumRasterizer {
    fn rasterize(&self, pdf: &[u8]) -> Result<Vec<Vec<u8>>, PdfError> {
        self.render_all(pdf).map_err(|e| {
            warn!("Error converting PDF: {}", e);
            e
        })
    }
}

/// Encodes a rendered page as JPEG. JPEG has no alpha channel, so the page is
/// flattened to RGB first.
pub fn encode_jpeg(image: DynamicImage, page: usize) -> Result<Vec<u8>, PdfError> {
    let rgb = DynamicImage::ImageRgb8(image.into_rgb8());
    let mut buf = Cursor::new(Vec::new());
    rgb.write_to(&mut buf, ImageFormat::Jpeg)
        .map_err(|source| PdfError::Encode { page, source })?;
    Ok(buf.into_inner())
}
