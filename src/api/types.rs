//! Shared types for the API layer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::pipeline::processor::{PipelineProcessor, ProductSeed};

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    pub processor: Arc<PipelineProcessor>,
    pub started_at: DateTime<Utc>,
}

impl ApiContext {
    pub fn new(processor: Arc<PipelineProcessor>) -> Self {
        Self {
            processor,
            started_at: Utc::now(),
        }
    }
}

/// `POST /process` body: `{ "product": { ... } }`.
#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub product: ProductSeed,
}
