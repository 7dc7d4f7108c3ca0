pub mod types;
pub mod langflow;
pub mod clean;
pub mod recovery;
pub mod orchestrator;

pub use types::*;
pub use langflow::*;
pub use clean::*;
pub use recovery::*;
pub use orchestrator::*;

use thiserror::Error;

use crate::pipeline::buffer::BufferError;

#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("Workflow endpoint is not reachable at {0}")]
    Connection(String),

    #[error("Workflow returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Workflow response is not JSON: {0}")]
    ResponseParsing(String),

    #[error("Missing workflow setting: {0}")]
    MissingConfig(&'static str),

    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),
}
