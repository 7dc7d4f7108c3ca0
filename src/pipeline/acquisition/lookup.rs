use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use super::types::{LookupOutcome, ProductFacts, ProductLookup};
use super::AcquisitionError;
use crate::config::APP_VERSION;

/// Open Food Facts product API client (`GET {base}/{code}.json`).
pub struct OpenFoodFactsClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl OpenFoodFactsClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AcquisitionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(format!("shelfscan/{APP_VERSION}"))
            .build()
            .map_err(|e| AcquisitionError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// `None` unless the code is all ASCII digits, so it can never change the path.
    fn product_url(&self, code: &str) -> Option<String> {
        let code = code.trim();
        if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(format!("{}/{}.json", self.base_url, code))
    }
}

/// Response body from the product endpoint. `status == 1` means found.
#[derive(Deserialize)]
struct ProductResponse {
    #[serde(default)]
    status: i64,
    product: Option<ProductBody>,
}

#[derive(Deserialize)]
struct ProductBody {
    product_name: Option<String>,
    brands: Option<String>,
    quantity: Option<String>,
}

impl ProductResponse {
    fn into_outcome(self) -> LookupOutcome {
        match (self.status, self.product) {
            (1, Some(p)) => LookupOutcome::Found(ProductFacts {
                name: non_empty(p.product_name),
                brand: non_empty(p.brands),
                quantity: non_empty(p.quantity),
            }),
            _ => LookupOutcome::NotFound,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl ProductLookup for OpenFoodFactsClient {
    fn lookup(&self, code: &str) -> Result<LookupOutcome, AcquisitionError> {
        let Some(url) = self.product_url(code) else {
            tracing::warn!(code, "Barcode is not numeric, skipping lookup");
            return Ok(LookupOutcome::NotFound);
        };
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| AcquisitionError::LookupTransport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(code, status = status.as_u16(), "Lookup returned non-success status");
            return Ok(LookupOutcome::NotFound);
        }

        match response.json::<ProductResponse>() {
            Ok(body) => Ok(body.into_outcome()),
            Err(e) => {
                tracing::warn!(code, error = %e, "Lookup response could not be decoded");
                Ok(LookupOutcome::NotFound)
            }
        }
    }
}

/// Buffer text for one lookup attempt.
pub fn describe_lookup(code: &str, outcome: &Result<LookupOutcome, AcquisitionError>) -> String {
    match outcome {
        Ok(LookupOutcome::Found(facts)) => format!(
            "Product Info for {code}:\n  Name: {}\n  Brand: {}\n  Quantity: {}\n",
            facts.name.as_deref().unwrap_or("N/A"),
            facts.brand.as_deref().unwrap_or("N/A"),
            facts.quantity.as_deref().unwrap_or("N/A"),
        ),
        Ok(LookupOutcome::NotFound) => format!("No product found for barcode {code}.\n"),
        Err(e) => format!("Error fetching product info: {e}\n"),
    }
}

/// Mock lookup keyed by code. Unknown codes are `NotFound`.
#[derive(Default)]
pub struct MockProductLookup {
    products: HashMap<String, ProductFacts>,
    unreachable: bool,
}

impl MockProductLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(mut self, code: &str, name: &str, brand: &str, quantity: &str) -> Self {
        self.products.insert(
            code.to_string(),
            ProductFacts {
                name: Some(name.to_string()),
                brand: Some(brand.to_string()),
                quantity: Some(quantity.to_string()),
            },
        );
        self
    }

    /// Every lookup fails at the transport level.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }
}

impl ProductLookup for MockProductLookup {
    fn lookup(&self, code: &str) -> Result<LookupOutcome, AcquisitionError> {
        if self.unreachable {
            return Err(AcquisitionError::LookupTransport("connection refused".into()));
        }
        Ok(self
            .products
            .get(code)
            .cloned()
            .map_or(LookupOutcome::NotFound, LookupOutcome::Found))
    }
}
