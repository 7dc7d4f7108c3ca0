pub mod types;
pub mod cli;
pub mod ocr;
pub mod barcode;
pub mod lookup;
pub mod download;
pub mod orchestrator;

pub use types::*;
pub use ocr::*;
pub use barcode::*;
pub use lookup::*;
pub use download::*;
pub use orchestrator::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not load image at {path}: {reason}")]
    ImageRead { path: PathBuf, reason: String },

    #[error("Image download failed: {0}")]
    ImageDownload(String),

    #[error("Image download returned status {0}")]
    ImageStatus(u16),

    #[error("{tool} is not installed or not on PATH")]
    ToolMissing { tool: String },

    #[error("{tool} exited with status {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: i32,
        stderr: String,
    },

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("Barcode decoding failed: {0}")]
    BarcodeDecoding(String),

    #[error("Lookup request failed: {0}")]
    LookupTransport(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}
