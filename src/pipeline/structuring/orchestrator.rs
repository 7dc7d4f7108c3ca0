use super::prompt::{build_structuring_prompt, STRUCTURING_SYSTEM_PROMPT};
use super::types::{LlmClient, StructuringReport};
use super::StructuringError;
use crate::pipeline::buffer::EvidenceBuffer;
use crate::pipeline::schema::TargetSchema;

/// Turns the raw evidence in a buffer into a JSON-shaped guess:
/// read → prompt → LLM → replace
pub struct ProductStructurer {
    llm: Box<dyn LlmClient + Send + Sync>,
    model_name: String,
    schema: TargetSchema,
}

impl ProductStructurer {
    pub fn new(llm: Box<dyn LlmClient + Send + Sync>, model_name: &str) -> Self {
        Self {
            llm,
            model_name: model_name.to_string(),
            schema: TargetSchema::product(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Overwrite the buffer with the model's answer, verbatim.
    ///
    /// On error the buffer is left as it was so the caller can surface the
    /// evidence that failed to structure.
    pub fn structure(
        &self,
        buffer: &mut dyn EvidenceBuffer,
    ) -> Result<StructuringReport, StructuringError> {
        let _span = tracing::info_span!("structure_product", model = %self.model_name).entered();

        let raw_text = buffer.read_all()?;
        let prompt = build_structuring_prompt(&raw_text, &self.schema);

        let response = self
            .llm
            .generate(&self.model_name, &prompt, STRUCTURING_SYSTEM_PROMPT)
            .map_err(|e| {
                tracing::warn!(error = %e, "Structuring model call failed");
                e
            })?;

        buffer.replace(&response)?;

        tracing::info!(
            prompt_chars = prompt.len(),
            response_chars = response.len(),
            "Structuring output written to buffer"
        );

        Ok(StructuringReport {
            model: self.model_name.clone(),
            prompt_chars: prompt.len(),
            response_chars: response.len(),
        })
    }
}
