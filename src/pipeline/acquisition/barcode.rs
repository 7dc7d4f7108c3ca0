use super::cli::run_on_image;
use super::types::{BarcodeDecoder, DecodedSymbol};
use super::AcquisitionError;

/// zbarimg exits with this status when the image holds no symbols.
const ZBAR_NO_SYMBOLS: i32 = 4;

/// zbar barcode decoding through `zbarimg -q <image>`.
pub struct ZbarCli {
    program: String,
}

impl ZbarCli {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

impl BarcodeDecoder for ZbarCli {
    fn decode(&self, image_bytes: &[u8]) -> Result<Vec<DecodedSymbol>, AcquisitionError> {
        let _span = tracing::info_span!("barcode_scan", image_size = image_bytes.len()).entered();
        let output = run_on_image(&self.program, &["-q", "{image}"], image_bytes)?;
        match output.status {
            0 => Ok(parse_zbar_output(&output.stdout)),
            ZBAR_NO_SYMBOLS => Ok(Vec::new()),
            status => Err(AcquisitionError::ToolFailed {
                tool: self.program.clone(),
                status,
                stderr: output.stderr.trim().to_string(),
            }),
        }
    }
}

/// Parse `TYPE:value` lines as printed by zbarimg. Lines without a separator are skipped.
pub fn parse_zbar_output(stdout: &str) -> Vec<DecodedSymbol> {
    stdout
        .lines()
        .filter_map(|line| {
            let (symbology, value) = line.trim().split_once(':')?;
            if symbology.is_empty() || value.is_empty() {
                return None;
            }
            Some(DecodedSymbol {
                symbology: symbology.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

/// Mock decoder returning a fixed symbol list.
pub struct MockBarcodeDecoder {
    result: Result<Vec<DecodedSymbol>, String>,
}

impl MockBarcodeDecoder {
    pub fn new(symbols: &[(&str, &str)]) -> Self {
        Self {
            result: Ok(symbols
                .iter()
                .map(|(symbology, value)| DecodedSymbol {
                    symbology: symbology.to_string(),
                    value: value.to_string(),
                })
                .collect()),
        }
    }

    pub fn empty() -> Self {
        Self::new(&[])
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            result: Err(reason.to_string()),
        }
    }
}

impl BarcodeDecoder for MockBarcodeDecoder {
    fn decode(&self, _image_bytes: &[u8]) -> Result<Vec<DecodedSymbol>, AcquisitionError> {
        self.result
            .clone()
            .map_err(AcquisitionError::BarcodeDecoding)
    }
}
