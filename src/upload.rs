//! Reading the uploaded file out of a multipart form and deciding how to treat it.

use actix_multipart::Multipart;
use futures_util::StreamExt;
use tracing::{debug, warn};

use crate::error::ClassifyError;

/// Name of the multipart form field that carries the upload.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Image,
    Pdf,
}

impl FileKind {
    /// Picks the handling path from the filename's last extension, case-insensitively.
    ///
    /// The file's content is never inspected here: a PNG named `scan.txt` is
    /// rejected and a text file named `scan.jpg` is accepted (and later fails to
    /// decode).
    pub fn from_filename(filename: &str) -> Result<Self, ClassifyError> {
        let (_, ext) = filename
            .rsplit_once('.')
            .ok_or(ClassifyError::UnsupportedFileType)?;

        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "gif" => Ok(FileKind::Image),
            "pdf" => Ok(FileKind::Pdf),
            _ => Err(ClassifyError::UnsupportedFileType),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Image => "image",
            FileKind::Pdf => "pdf",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn kind(&self) -> Result<FileKind, ClassifyError> {
        FileKind::from_filename(&self.filename)
    }
}

/// Buffers the first `file` part of the form into memory.
///
/// Only a part carrying a `filename` parameter counts as an upload; a plain
/// text field named `file` is skipped like any other part. Skipped parts are
/// drained. A body that is not a multipart form at all is treated the same
/// as a form without a `file` part.
pub async fn read_upload(
    mut payload: Multipart,
    limit: usize,
) -> Result<UploadedFile, ClassifyError> {
    while let Some(item) = payload.next().await {
        let mut field = match item {
            Ok(field) => field,
            Err(e) => {
                warn!("Unreadable multipart body: {}", e);
                return Err(ClassifyError::MissingFile);
            }
        };

        let disposition = field.content_disposition();
        let filename = match disposition.get_filename() {
            Some(name) if disposition.get_name() == Some(FILE_FIELD) => Some(name.to_string()),
            _ => None,
        };

        let Some(filename) = filename else {
            while let Some(chunk) = field.next().await {
                chunk.map_err(ClassifyError::processing)?;
            }
            continue;
        };

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(ClassifyError::processing)?;
            if bytes.len() + data.len() > limit {
                warn!("Upload '{}' exceeds {} bytes", filename, limit);
                return Err(ClassifyError::PayloadTooLarge);
            }
            bytes.extend_from_slice(&data);
        }

        debug!("Received '{}' ({} bytes)", filename, bytes.len());
        return Ok(UploadedFile { filename, bytes });
    }

    Err(ClassifyError::MissingFile)
}
