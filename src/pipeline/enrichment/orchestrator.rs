//! Enrichment stage: send the structuring output to the hosted agent workflow,
//! dig the model text out of its envelope and recover a clean JSON object.
//!
//! The buffer ends up holding either the recovered object or, when nothing
//! could be recovered, the raw envelope (both pretty-printed). A transport
//! failure leaves the buffer untouched.

use serde_json::Value;

use super::langflow::find_nested_text_field;
use super::recovery::JsonRecovery;
use super::types::{EnrichmentOutcome, WorkflowClient};
use super::EnrichmentError;
use crate::pipeline::buffer::EvidenceBuffer;

pub struct ProductEnricher {
    workflow: Box<dyn WorkflowClient + Send + Sync>,
    recovery: JsonRecovery,
}

impl ProductEnricher {
    pub fn new(workflow: Box<dyn WorkflowClient + Send + Sync>) -> Self {
        Self {
            workflow,
            recovery: JsonRecovery::default(),
        }
    }

    pub fn enrich(
        &self,
        buffer: &mut dyn EvidenceBuffer,
    ) -> Result<EnrichmentOutcome, EnrichmentError> {
        let _span = tracing::info_span!("enrich_product").entered();

        let message = buffer.read_all()?;
        let envelope = self.workflow.run(message.trim()).map_err(|e| {
            tracing::warn!(error = %e, "Enrichment workflow call failed");
            e
        })?;

        let reason = match find_nested_text_field(&envelope) {
            None => "workflow response has no message text".to_string(),
            Some(text) => match self.recovery.recover(text) {
                Some(object) => {
                    buffer.replace(&pretty(&Value::Object(object))?)?;
                    tracing::info!("Clean JSON extracted and written to buffer");
                    return Ok(EnrichmentOutcome::Recovered);
                }
                None => "no JSON object could be recovered from the message text".to_string(),
            },
        };

        buffer.replace(&pretty(&envelope)?)?;
        tracing::warn!(%reason, "Wrote raw workflow response to buffer");
        Ok(EnrichmentOutcome::Fallback { reason })
    }
}

fn pretty(value: &Value) -> Result<String, EnrichmentError> {
    serde_json::to_string_pretty(value).map_err(|e| EnrichmentError::ResponseParsing(e.to_string()))
}
