use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;

use super::types::ImageFetcher;
use super::AcquisitionError;

/// Downloads product photos over HTTP into `.jpg` temp files.
pub struct HttpImageFetcher {
    client: reqwest::blocking::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, AcquisitionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AcquisitionError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }
}

impl ImageFetcher for HttpImageFetcher {
    fn fetch(&self, url: &str) -> Result<NamedTempFile, AcquisitionError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| AcquisitionError::ImageDownload(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AcquisitionError::ImageStatus(status.as_u16()));
        }

        let mut file = tempfile::Builder::new()
            .prefix("shelfscan-download-")
            .suffix(".jpg")
            .tempfile()?;
        response
            .copy_to(&mut file)
            .map_err(|e| AcquisitionError::ImageDownload(e.to_string()))?;
        file.flush()?;

        tracing::info!(path = %file.path().display(), "Downloaded image from URL");
        Ok(file)
    }
}

/// Mock fetcher for testing. Serves fixed bytes from a fresh temp file, or
/// fails with an HTTP status.
pub struct MockImageFetcher {
    response: Result<Vec<u8>, u16>,
}

impl MockImageFetcher {
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            response: Ok(bytes.to_vec()),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            response: Err(status),
        }
    }
}

impl ImageFetcher for MockImageFetcher {
    fn fetch(&self, _url: &str) -> Result<NamedTempFile, AcquisitionError> {
        let bytes = self
            .response
            .as_ref()
            .map_err(|status| AcquisitionError::ImageStatus(*status))?;
        let mut file = tempfile::Builder::new()
            .prefix("shelfscan-download-")
            .suffix(".jpg")
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(file)
    }
}
