//! Errors raised while locating, downloading or decoding datasets.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed file contents (truncated record, wrong length).
    #[error("format error: {0}")]
    Format(String),

    #[error("label {label} at sample {index} is outside [0, {num_classes})")]
    LabelOutOfRange {
        index: usize,
        label: u8,
        num_classes: usize,
    },

    #[error("index out of bounds: {index} >= {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("download error: {0}")]
    Download(String),

    #[error("checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: String, got: String },

    #[error("decompression error: {0}")]
    Decompression(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
