use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Shelfscan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_STRUCTURING_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_LANGFLOW_URL: &str = "https://api.langflow.astra.datastax.com";
const DEFAULT_LOOKUP_URL: &str = "https://world.openfoodfacts.org/api/v0/product";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;

/// Default `tracing` filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "shelfscan_lib=info,shelfscan=info,tower_http=info"
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

/// Which generative backend the structuring stage talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Ollama,
}

/// What the orchestrator does when the enrichment workflow cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnrichmentFailurePolicy {
    /// Keep the structuring output in the buffer and continue to the final parse.
    #[default]
    CarryForward,
    /// Fail the whole request.
    Abort,
}

/// Runtime configuration, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub llm_provider: LlmProvider,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub ollama_url: String,
    pub structuring_model: String,
    pub temperature: f32,
    pub langflow_url: String,
    pub langflow_id: String,
    pub flow_id: String,
    /// Named endpoint; when empty the flow id is used instead.
    pub flow_endpoint: Option<String>,
    pub application_token: Option<String>,
    /// Per-component flow overrides (`LANGFLOW_TWEAKS`, a JSON object).
    pub langflow_tweaks: Map<String, Value>,
    pub lookup_url: String,
    pub tesseract_bin: String,
    /// Tesseract language list, e.g. `eng+fra`.
    pub ocr_lang: Option<String>,
    pub zbarimg_bin: String,
    pub http_timeout: Duration,
    pub llm_timeout: Duration,
    /// When set, each run stages its buffer in a temp file under this directory.
    pub buffer_dir: Option<PathBuf>,
    pub dump_dir: Option<PathBuf>,
    pub enrichment_failure: EnrichmentFailurePolicy,
}

impl AppConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_raw = get("SHELFSCAN_BIND").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                key: "SHELFSCAN_BIND",
                value: bind_raw.clone(),
            })?;

        let llm_provider = match get("SHELFSCAN_LLM_PROVIDER").as_deref() {
            None => LlmProvider::OpenAi,
            Some(v) if v.eq_ignore_ascii_case("openai") => LlmProvider::OpenAi,
            Some(v) if v.eq_ignore_ascii_case("ollama") => LlmProvider::Ollama,
            Some(v) => {
                return Err(ConfigError::InvalidValue {
                    key: "SHELFSCAN_LLM_PROVIDER",
                    value: v.to_string(),
                })
            }
        };

        let temperature = match get("SHELFSCAN_TEMPERATURE") {
            None => DEFAULT_TEMPERATURE,
            Some(v) => v
                .parse::<f32>()
                .ok()
                .filter(|t| (0.0..=2.0).contains(t))
                .ok_or(ConfigError::InvalidValue {
                    key: "SHELFSCAN_TEMPERATURE",
                    value: v,
                })?,
        };

        let enrichment_failure = match get("SHELFSCAN_ENRICHMENT_FAILURE").as_deref() {
            None => EnrichmentFailurePolicy::default(),
            Some("carry_forward") => EnrichmentFailurePolicy::CarryForward,
            Some("abort") => EnrichmentFailurePolicy::Abort,
            Some(v) => {
                return Err(ConfigError::InvalidValue {
                    key: "SHELFSCAN_ENRICHMENT_FAILURE",
                    value: v.to_string(),
                })
            }
        };

        let langflow_tweaks = match get("LANGFLOW_TWEAKS") {
            None => Map::new(),
            Some(v) => match serde_json::from_str::<Value>(&v) {
                Ok(Value::Object(map)) => map,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "LANGFLOW_TWEAKS",
                        value: v,
                    })
                }
            },
        };

        let config = Self {
            bind_addr,
            llm_provider,
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            ollama_url: get("OLLAMA_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            structuring_model: get("SHELFSCAN_STRUCTURING_MODEL")
                .unwrap_or_else(|| DEFAULT_STRUCTURING_MODEL.to_string()),
            temperature,
            langflow_url: get("LANGFLOW_URL").unwrap_or_else(|| DEFAULT_LANGFLOW_URL.to_string()),
            langflow_id: get("LANGFLOW_ID").unwrap_or_default(),
            flow_id: get("LANGFLOW_FLOW_ID").unwrap_or_default(),
            flow_endpoint: get("LANGFLOW_ENDPOINT"),
            application_token: get("APPLICATION_TOKEN"),
            langflow_tweaks,
            lookup_url: get("SHELFSCAN_LOOKUP_URL").unwrap_or_else(|| DEFAULT_LOOKUP_URL.to_string()),
            tesseract_bin: get("SHELFSCAN_TESSERACT_BIN").unwrap_or_else(|| "tesseract".to_string()),
            ocr_lang: get("SHELFSCAN_OCR_LANG"),
            zbarimg_bin: get("SHELFSCAN_ZBARIMG_BIN").unwrap_or_else(|| "zbarimg".to_string()),
            http_timeout: parse_secs(
                &get,
                "SHELFSCAN_HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?,
            llm_timeout: parse_secs(&get, "SHELFSCAN_LLM_TIMEOUT_SECS", DEFAULT_LLM_TIMEOUT_SECS)?,
            buffer_dir: get("SHELFSCAN_BUFFER_DIR").map(PathBuf::from),
            dump_dir: get("SHELFSCAN_DUMP_DIR").map(PathBuf::from),
            enrichment_failure,
        };

        Ok(config)
    }

    /// Check the settings the remote stages need before serving requests.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm_provider == LlmProvider::OpenAi && self.openai_api_key.is_none() {
            return Err(ConfigError::Missing("OPENAI_API_KEY"));
        }
        if self.langflow_id.is_empty() {
            return Err(ConfigError::Missing("LANGFLOW_ID"));
        }
        if self.flow_id.is_empty() && self.flow_endpoint.is_none() {
            return Err(ConfigError::Missing("LANGFLOW_FLOW_ID"));
        }
        Ok(())
    }
}

fn parse_secs<F>(get: &F, key: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(Duration::from_secs(default)),
        Some(v) => v
            .parse::<u64>()
            .ok()
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .ok_or(ConfigError::InvalidValue { key, value: v }),
    }
}
