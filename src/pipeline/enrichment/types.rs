use serde_json::Value;

use super::EnrichmentError;

/// Hosted agent workflow abstraction (allows mocking).
pub trait WorkflowClient {
    /// Send `message` to the workflow and return its raw JSON envelope.
    fn run(&self, message: &str) -> Result<Value, EnrichmentError>;
}

/// How the enrichment stage left the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    /// A JSON object was recovered; the buffer holds it pretty-printed.
    Recovered,
    /// Nothing usable was recovered; the buffer holds the raw envelope.
    Fallback { reason: String },
}

impl EnrichmentOutcome {
    pub fn is_recovered(&self) -> bool {
        matches!(self, Self::Recovered)
    }
}
