pub mod api; // HTTP front door
pub mod config;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, ConfigError, LlmProvider};
use crate::pipeline::acquisition::{
    AcquisitionError, EvidenceAcquirer, HttpImageFetcher, OpenFoodFactsClient, TesseractCli,
    ZbarCli,
};
use crate::pipeline::enrichment::{EnrichmentError, LangflowClient, ProductEnricher};
use crate::pipeline::processor::PipelineProcessor;
use crate::pipeline::structuring::{
    LlmClient, OllamaClient, OpenAiClient, ProductStructurer, StructuringError,
};

/// Errors raised while wiring the service together, before any request runs.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Acquisition setup failed: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("Structuring setup failed: {0}")]
    Structuring(#[from] StructuringError),

    #[error("Enrichment setup failed: {0}")]
    Enrichment(#[from] EnrichmentError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Build the production pipeline from configuration.
///
/// Creates blocking HTTP clients, so call it outside any async runtime.
pub fn build_processor(config: &AppConfig) -> Result<PipelineProcessor, StartupError> {
    let acquirer = EvidenceAcquirer::new(
        Box::new(HttpImageFetcher::new(config.http_timeout)?),
        Box::new(ocr_engine(config)),
        Box::new(ZbarCli::new(&config.zbarimg_bin)),
        Box::new(OpenFoodFactsClient::new(
            &config.lookup_url,
            config.http_timeout,
        )?),
    );

    let llm: Box<dyn LlmClient + Send + Sync> = match config.llm_provider {
        LlmProvider::OpenAi => Box::new(OpenAiClient::new(
            &config.openai_base_url,
            config.openai_api_key.as_deref().unwrap_or_default(),
            config.temperature,
            config.llm_timeout,
        )?),
        LlmProvider::Ollama => Box::new(OllamaClient::new(
            &config.ollama_url,
            config.temperature,
            config.llm_timeout,
        )?),
    };

    let workflow = workflow_client(config)?;

    tracing::info!(
        provider = ?config.llm_provider,
        model = %config.structuring_model,
        enrichment_failure = ?config.enrichment_failure,
        "Pipeline configured"
    );

    Ok(PipelineProcessor::new(
        acquirer,
        ProductStructurer::new(llm, &config.structuring_model),
        ProductEnricher::new(Box::new(workflow)),
    )
    .with_enrichment_failure(config.enrichment_failure)
    .with_buffer_dir(config.buffer_dir.clone())
    .with_dump_dir(config.dump_dir.clone()))
}

fn ocr_engine(config: &AppConfig) -> TesseractCli {
    let engine = TesseractCli::new(&config.tesseract_bin);
    match config.ocr_lang.as_deref() {
        Some(langs) => engine.with_languages(langs),
        None => engine,
    }
}

fn workflow_client(config: &AppConfig) -> Result<LangflowClient, EnrichmentError> {
    Ok(LangflowClient::new(
        &config.langflow_url,
        &config.langflow_id,
        &config.flow_id,
        config.flow_endpoint.as_deref(),
        config.application_token.as_deref(),
        config.llm_timeout,
    )?
    .with_tweaks(config.langflow_tweaks.clone()))
}
