use super::StructuringError;

/// Generative text model abstraction (allows mocking)
pub trait LlmClient {
    /// Single non-streaming completion for `prompt` under the `system` instruction.
    fn generate(&self, model: &str, prompt: &str, system: &str) -> Result<String, StructuringError>;
}

/// What the structuring stage wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringReport {
    pub model: String,
    pub prompt_chars: usize,
    pub response_chars: usize,
}
