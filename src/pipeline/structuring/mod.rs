pub mod types;
pub mod prompt;
pub mod openai;
pub mod ollama;
pub mod orchestrator;

pub use types::*;
pub use prompt::*;
pub use openai::*;
pub use ollama::*;
pub use orchestrator::*;

use thiserror::Error;

use crate::pipeline::buffer::BufferError;

#[derive(Error, Debug)]
pub enum StructuringError {
    #[error("LLM endpoint is not reachable at {0}")]
    Connection(String),

    #[error("LLM returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("LLM response contained no choices")]
    EmptyCompletion,

    #[error("Missing API key for {0}")]
    MissingApiKey(&'static str),

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),
}
