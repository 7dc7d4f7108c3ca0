use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::AcquisitionError;

/// Where the product photo comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Url(String),
    Path(PathBuf),
}

impl ImageSource {
    /// `http://` and `https://` references are fetched, anything else is a local path.
    pub fn parse(reference: &str) -> Self {
        let reference = reference.trim();
        if reference.starts_with("http://") || reference.starts_with("https://") {
            ImageSource::Url(reference.to_string())
        } else {
            ImageSource::Path(PathBuf::from(reference))
        }
    }
}

/// Inputs to the acquisition stage. Both are optional.
#[derive(Debug, Clone, Default)]
pub struct AcquisitionInput {
    pub image: Option<ImageSource>,
    pub barcode: Option<String>,
}

/// One symbol read off the image, e.g. `EAN13` / `4006381333931`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedSymbol {
    pub symbology: String,
    pub value: String,
}

/// Product facts returned by a successful lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFacts {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub quantity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(ProductFacts),
    NotFound,
}

/// Summary of what the acquisition stage wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionReport {
    pub image_loaded: bool,
    pub text_found: bool,
    pub codes_found: Vec<String>,
    pub lookups: usize,
    /// Per-item failures recorded as markers in the buffer.
    pub failures: usize,
}

/// Text recognition capability.
pub trait OcrEngine {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, AcquisitionError>;
}

/// Barcode / symbol decoding capability.
pub trait BarcodeDecoder {
    fn decode(&self, image_bytes: &[u8]) -> Result<Vec<DecodedSymbol>, AcquisitionError>;
}

/// Product database lookup by code. Non-2xx and undecodable replies are `NotFound`;
/// only transport failures are errors.
pub trait ProductLookup {
    fn lookup(&self, code: &str) -> Result<LookupOutcome, AcquisitionError>;
}

/// Downloads a remote image into a temp file that is deleted when dropped.
pub trait ImageFetcher {
    fn fetch(&self, url: &str) -> Result<NamedTempFile, AcquisitionError>;
}
