// document-toolkit/src/error.rs

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DocumentError>;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Invalid document format: {0}")]
    InvalidFormat(String),

    #[error("Malformed content item {id}: {reason}")]
    MalformedItem { id: String, reason: String },

    #[error("PDF error: {0}")]
    PdfError(#[from] lopdf::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Archive error: {0}")]
    ArchiveError(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Base64 encoding error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),
}

impl DocumentError {
    pub fn error_type(&self) -> &'static str {
        match self {
            DocumentError::InvalidFormat(_) => "invalid_format",
            DocumentError::MalformedItem { .. } => "malformed_item",
            DocumentError::PdfError(_) => "pdf_error",
            DocumentError::ImageError(_) => "image_error",
            DocumentError::ArchiveError(_) => "archive_error",
            DocumentError::IoError(_) => "io_error",
            DocumentError::SerializationError(_) => "serialization_error",
            DocumentError::Base64Error(_) => "base64_error",
            DocumentError::InvalidData(_) => "invalid_data",
            DocumentError::GenerationFailed(_) => "generation_failed",
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
            error_type: self.error_type().to_string(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_type: String,
}
