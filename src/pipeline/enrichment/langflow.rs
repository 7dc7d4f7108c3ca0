use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

use super::types::WorkflowClient;
use super::EnrichmentError;

/// Client for a hosted Langflow flow (`POST {base}/lf/{langflow_id}/api/v1/run/{endpoint}`).
pub struct LangflowClient {
    base_url: String,
    langflow_id: String,
    endpoint: String,
    application_token: Option<String>,
    tweaks: Map<String, Value>,
    client: reqwest::blocking::Client,
}

impl LangflowClient {
    /// `endpoint` falls back to `flow_id` when absent or blank.
    pub fn new(
        base_url: &str,
        langflow_id: &str,
        flow_id: &str,
        endpoint: Option<&str>,
        application_token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, EnrichmentError> {
        if langflow_id.trim().is_empty() {
            return Err(EnrichmentError::MissingConfig("LANGFLOW_ID"));
        }
        let endpoint = endpoint
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .unwrap_or(flow_id.trim());
        if endpoint.is_empty() {
            return Err(EnrichmentError::MissingConfig("LANGFLOW_FLOW_ID"));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EnrichmentError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            langflow_id: langflow_id.trim().to_string(),
            endpoint: endpoint.to_string(),
            application_token: application_token
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            tweaks: Map::new(),
            client,
        })
    }

    /// Per-component overrides sent with every run.
    pub fn with_tweaks(mut self, tweaks: Map<String, Value>) -> Self {
        self.tweaks = tweaks;
        self
    }

    pub fn tweaks(&self) -> &Map<String, Value> {
        &self.tweaks
    }

    pub fn run_url(&self) -> String {
        format!(
            "{}/lf/{}/api/v1/run/{}",
            self.base_url, self.langflow_id, self.endpoint
        )
    }

    fn request_body<'a>(&'a self, message: &'a str) -> RunRequest<'a> {
        RunRequest {
            input_value: message,
            output_type: "chat",
            input_type: "chat",
            tweaks: (!self.tweaks.is_empty()).then_some(&self.tweaks),
        }
    }
}

/// Request body for the flow run endpoint
#[derive(Serialize)]
struct RunRequest<'a> {
    input_value: &'a str,
    output_type: &'a str,
    input_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tweaks: Option<&'a Map<String, Value>>,
}

impl WorkflowClient for LangflowClient {
    fn run(&self, message: &str) -> Result<Value, EnrichmentError> {
        let url = self.run_url();
        let mut request = self.client.post(&url).json(&self.request_body(message));
        if let Some(token) = &self.application_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| {
            if e.is_connect() {
                EnrichmentError::Connection(self.base_url.clone())
            } else {
                EnrichmentError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(EnrichmentError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .map_err(|e| EnrichmentError::ResponseParsing(e.to_string()))
    }
}

/// First non-empty `outputs[i].outputs[j].results.message.data.text` string.
///
/// Every level is optional; anything of the wrong shape is skipped.
pub fn find_nested_text_field(envelope: &Value) -> Option<&str> {
    let outer = envelope.get("outputs")?.as_array()?;
    outer
        .iter()
        .filter_map(|o| o.get("outputs").and_then(Value::as_array))
        .flatten()
        .filter_map(|inner| {
            inner
                .get("results")?
                .get("message")?
                .get("data")?
                .get("text")?
                .as_str()
        })
        .find(|text| !text.is_empty())
}

/// Wrap model text in the envelope shape a Langflow chat flow returns.
pub fn chat_envelope(text: &str) -> Value {
    serde_json::json!({
        "session_id": "mock-session",
        "outputs": [{
            "inputs": { "input_value": "" },
            "outputs": [{
                "results": { "message": { "data": { "text": text } } }
            }]
        }]
    })
}

/// Mock workflow client for testing. Returns a fixed envelope and remembers the
/// last message it was sent.
pub struct MockWorkflowClient {
    response: Result<Value, String>,
    last_message: Mutex<Option<String>>,
}

impl MockWorkflowClient {
    /// Respond with `envelope` as-is.
    pub fn new(envelope: Value) -> Self {
        Self {
            response: Ok(envelope),
            last_message: Mutex::new(None),
        }
    }

    /// Respond with a chat envelope whose nested text is `text`.
    pub fn replying(text: &str) -> Self {
        Self::new(chat_envelope(text))
    }

    /// Every call fails as if the endpoint were down.
    pub fn unreachable() -> Self {
        Self {
            response: Err("mock workflow endpoint".into()),
            last_message: Mutex::new(None),
        }
    }

    pub fn last_message(&self) -> Option<String> {
        self.last_message.lock().ok().and_then(|m| m.clone())
    }
}

impl WorkflowClient for MockWorkflowClient {
    fn run(&self, message: &str) -> Result<Value, EnrichmentError> {
        if let Ok(mut last) = self.last_message.lock() {
            *last = Some(message.to_string());
        }
        match &self.response {
            Ok(envelope) => Ok(envelope.clone()),
            Err(target) => Err(EnrichmentError::Connection(target.clone())),
        }
    }
}
