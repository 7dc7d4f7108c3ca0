use super::cli::run_on_image;
use super::types::OcrEngine;
use super::AcquisitionError;

/// Tesseract OCR through its command-line front end (`tesseract <image> stdout`).
pub struct TesseractCli {
    program: String,
    lang: Option<String>,
}

impl TesseractCli {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            lang: None,
        }
    }

    /// Set language(s) for OCR (e.g., "eng", "eng+fra")
    pub fn with_languages(mut self, langs: &str) -> Self {
        self.lang = Some(langs.to_string());
        self
    }

    pub fn languages(&self) -> Option<&str> {
        self.lang.as_deref()
    }

    fn args(&self) -> Vec<&str> {
        let mut args = vec!["{image}", "stdout"];
        if let Some(lang) = &self.lang {
            args.push("-l");
            args.push(lang.as_str());
        }
        args
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String, AcquisitionError> {
        let _span = tracing::info_span!("ocr", image_size = image_bytes.len()).entered();
        let output = run_on_image(&self.program, &self.args(), image_bytes)?;
        if output.status != 0 {
            return Err(AcquisitionError::ToolFailed {
                tool: self.program.clone(),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

/// Mock OCR engine for unit testing without Tesseract.
pub struct MockOcrEngine {
    result: Result<String, String>,
}

impl MockOcrEngine {
    pub fn new(text: &str) -> Self {
        Self {
            result: Ok(text.to_string()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            result: Err(reason.to_string()),
        }
    }
}

impl OcrEngine for MockOcrEngine {
    fn recognize(&self, _image_bytes: &[u8]) -> Result<String, AcquisitionError> {
        self.result
            .clone()
            .map_err(AcquisitionError::OcrProcessing)
    }
}
