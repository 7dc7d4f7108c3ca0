//! Acquisition stage: image → OCR text + barcode symbols → product lookups.
//!
//! Append-only on the buffer. Per-item failures (unreadable image, OCR error,
//! lookup outage) are written as markers so later stages still see that the
//! step ran; only buffer write failures leave this stage as errors.

use tempfile::NamedTempFile;

use super::lookup::describe_lookup;
use super::types::{
    AcquisitionInput, AcquisitionReport, BarcodeDecoder, ImageFetcher, ImageSource, OcrEngine,
    ProductLookup,
};
use super::AcquisitionError;
use crate::pipeline::buffer::{BufferError, EvidenceBuffer};

/// Barcode values callers use to mean "no barcode".
const BARCODE_SENTINELS: &[&str] = &["unknown", "n/a"];

pub struct EvidenceAcquirer {
    fetcher: Box<dyn ImageFetcher + Send + Sync>,
    ocr: Box<dyn OcrEngine + Send + Sync>,
    decoder: Box<dyn BarcodeDecoder + Send + Sync>,
    lookup: Box<dyn ProductLookup + Send + Sync>,
}

impl EvidenceAcquirer {
    pub fn new(
        fetcher: Box<dyn ImageFetcher + Send + Sync>,
        ocr: Box<dyn OcrEngine + Send + Sync>,
        decoder: Box<dyn BarcodeDecoder + Send + Sync>,
        lookup: Box<dyn ProductLookup + Send + Sync>,
    ) -> Self {
        Self {
            fetcher,
            ocr,
            decoder,
            lookup,
        }
    }

    /// Run the stage, appending evidence to `buffer`.
    pub fn acquire(
        &self,
        input: &AcquisitionInput,
        buffer: &mut dyn EvidenceBuffer,
    ) -> Result<AcquisitionReport, BufferError> {
        let _span = tracing::info_span!(
            "acquire",
            has_image = input.image.is_some(),
            has_barcode = input.barcode.is_some()
        )
        .entered();
        let mut report = AcquisitionReport::default();

        // Held until the end of this function so the download is deleted on every path.
        let mut downloaded: Option<NamedTempFile> = None;

        if let Some(source) = &input.image {
            match self.load_image(source, &mut downloaded) {
                Ok(bytes) => {
                    report.image_loaded = true;
                    self.recognize_text(&bytes, buffer, &mut report)?;
                    self.decode_symbols(&bytes, buffer, &mut report)?;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping recognition, image unavailable");
                    report.failures += 1;
                    buffer.append(&format!("Image unavailable: {e}"))?;
                }
            }
        }

        let codes: Vec<String> = match usable_barcode(input.barcode.as_deref()) {
            Some(code) => vec![code.to_string()],
            None => report.codes_found.clone(),
        };

        for code in &codes {
            tracing::info!(code = %code, "Looking up product info");
            let outcome = self.lookup.lookup(code);
            if outcome.is_err() {
                report.failures += 1;
            }
            report.lookups += 1;
            buffer.append(&describe_lookup(code, &outcome))?;
        }

        if let Some(file) = downloaded.take() {
            let path = file.path().to_path_buf();
            match file.close() {
                Ok(()) => tracing::info!(path = %path.display(), "Cleaned up downloaded image"),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove downloaded image"),
            }
        }

        tracing::info!(
            codes = report.codes_found.len(),
            lookups = report.lookups,
            failures = report.failures,
            "Acquisition complete"
        );
        Ok(report)
    }

    fn load_image(
        &self,
        source: &ImageSource,
        downloaded: &mut Option<NamedTempFile>,
    ) -> Result<Vec<u8>, AcquisitionError> {
        let path = match source {
            ImageSource::Url(url) => {
                let file = self.fetcher.fetch(url)?;
                let path = file.path().to_path_buf();
                *downloaded = Some(file);
                path
            }
            ImageSource::Path(path) => path.clone(),
        };

        let bytes = std::fs::read(&path).map_err(|e| AcquisitionError::ImageRead {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        if bytes.is_empty() {
            return Err(AcquisitionError::ImageRead {
                path,
                reason: "file is empty".into(),
            });
        }
        Ok(bytes)
    }

    fn recognize_text(
        &self,
        bytes: &[u8],
        buffer: &mut dyn EvidenceBuffer,
        report: &mut AcquisitionReport,
    ) -> Result<(), BufferError> {
        tracing::info!("Performing OCR");
        match self.ocr.recognize(bytes) {
            Ok(text) if !text.trim().is_empty() => {
                report.text_found = true;
                buffer.append(&format!("Extracted Text (OCR):\n{}\n", text.trim()))
            }
            Ok(_) => buffer.append("No text found via OCR.\n"),
            Err(e) => {
                tracing::warn!(error = %e, "OCR failed");
                report.failures += 1;
                buffer.append(&format!("OCR failed: {e}"))
            }
        }
    }

    fn decode_symbols(
        &self,
        bytes: &[u8],
        buffer: &mut dyn EvidenceBuffer,
        report: &mut AcquisitionReport,
    ) -> Result<(), BufferError> {
        tracing::info!("Scanning for barcodes");
        match self.decoder.decode(bytes) {
            Ok(symbols) => {
                for symbol in symbols {
                    let line = format!("Found {} barcode: {}", symbol.symbology, symbol.value);
                    tracing::info!("{line}");
                    buffer.append(&line)?;
                    report.codes_found.push(symbol.value);
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Barcode scan failed");
                report.failures += 1;
                buffer.append(&format!("Barcode scan failed: {e}"))
            }
        }
    }
}

/// The caller's barcode, unless it is blank or a sentinel.
fn usable_barcode(barcode: Option<&str>) -> Option<&str> {
    let code = barcode?.trim();
    if code.is_empty() || BARCODE_SENTINELS.iter().any(|s| code.eq_ignore_ascii_case(s)) {
        None
    } else {
        Some(code)
    }
}
