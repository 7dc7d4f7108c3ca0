//! Product processing orchestrator.
//!
//! Single entry point that drives one pipeline run over its own evidence buffer:
//! seed → acquire → structure → enrich → final parse → schema conformance.
//!
//! Uses trait-based DI for every external capability (OCR, barcode decoding,
//! lookup, LLM, workflow) so the orchestrator stays testable with mocks.
//! Every failure ends as a `{error, raw}` result; nothing escapes as a panic.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::EnrichmentFailurePolicy;
use crate::pipeline::acquisition::{AcquisitionInput, EvidenceAcquirer, ImageSource};
use crate::pipeline::buffer::{BufferError, EvidenceBuffer, FileBuffer, MemoryBuffer};
use crate::pipeline::diagnostic::StageDump;
use crate::pipeline::enrichment::{
    last_parsable_object, EnrichmentError, EnrichmentOutcome, ProductEnricher,
};
use crate::pipeline::schema::TargetSchema;
use crate::pipeline::structuring::{ProductStructurer, StructuringError};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that end a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Structuring failed: {0}")]
    Structuring(#[from] StructuringError),

    #[error("Enrichment failed: {0}")]
    Enrichment(#[from] EnrichmentError),

    #[error("No valid JSON found in buffer")]
    NoValidJson,

    #[error("Parsed JSON shares no field with the product schema")]
    NoSchemaFields,
}

// ---------------------------------------------------------------------------
// Input / result types
// ---------------------------------------------------------------------------

/// Caller-supplied product fields. Only `product_image` and `barcode` are
/// consumed by name; everything else is passed along as evidence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductSeed(pub Map<String, Value>);

/// Seed values callers use to mean "not provided".
const ABSENT_MARKERS: &[&str] = &["n/a"];

impl ProductSeed {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Seed from CLI-style arguments.
    pub fn from_parts(image: Option<&str>, barcode: Option<&str>) -> Self {
        let mut fields = Map::new();
        if let Some(image) = image {
            fields.insert("product_image".into(), Value::String(image.to_string()));
        }
        if let Some(barcode) = barcode {
            fields.insert("barcode".into(), Value::String(barcode.to_string()));
        }
        Self(fields)
    }

    pub fn image(&self) -> Option<ImageSource> {
        self.present("product_image").map(|r| ImageSource::parse(&r))
    }

    pub fn barcode(&self) -> Option<String> {
        self.present("barcode")
    }

    fn present(&self, key: &str) -> Option<String> {
        let text = match self.0.get(key)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        if text.is_empty() || ABSENT_MARKERS.iter().any(|m| text.eq_ignore_ascii_case(m)) {
            None
        } else {
            Some(text)
        }
    }

    /// `Input Product Data:` header plus one `key: value` line per field.
    /// Strings are written unquoted, everything else as JSON.
    pub fn to_evidence_block(&self) -> String {
        let mut lines = vec!["Input Product Data:".to_string()];
        for (key, value) in &self.0 {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            lines.push(format!("{key}: {rendered}"));
        }
        lines.join("\n")
    }

    fn acquisition_input(&self) -> AcquisitionInput {
        AcquisitionInput {
            image: self.image(),
            barcode: self.barcode(),
        }
    }
}

/// What a caller gets back: the conformed record, or an error object carrying
/// the buffer text when there was one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PipelineResult {
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw: Option<String>,
    },
    Record(Map<String, Value>),
}

impl PipelineResult {
    pub fn error(error: impl Into<String>, raw: Option<String>) -> Self {
        Self::Error {
            error: error.into(),
            raw,
        }
    }

    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record(_))
    }

    pub fn as_record(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Record(map) => Some(map),
            Self::Error { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Cleared,
    Acquired,
    Structured,
    Enriched,
    Resulted,
    Failed,
}

impl PipelineState {
    fn label(self) -> &'static str {
        match self {
            Self::Cleared => "cleared",
            Self::Acquired => "acquired",
            Self::Structured => "structured",
            Self::Enriched => "enriched",
            Self::Resulted => "resulted",
            Self::Failed => "failed",
        }
    }
}

/// Full record of one run. Only `result` goes over the wire.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub run_id: Uuid,
    pub state: PipelineState,
    /// Last stage that completed before the run ended.
    pub last_stage: Option<PipelineState>,
    pub result: PipelineResult,
    /// `None` when enrichment was skipped after a transport failure.
    pub enrichment: Option<EnrichmentOutcome>,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives acquire → structure → enrich → parse for one product at a time.
///
/// Holds no per-run state: every call to [`process`](Self::process) gets its
/// own buffer, so concurrent runs never see each other's evidence.
pub struct PipelineProcessor {
    acquirer: EvidenceAcquirer,
    structurer: ProductStructurer,
    enricher: ProductEnricher,
    schema: TargetSchema,
    enrichment_failure: EnrichmentFailurePolicy,
    buffer_dir: Option<PathBuf>,
    dump_dir: Option<PathBuf>,
}

impl PipelineProcessor {
    pub fn new(
        acquirer: EvidenceAcquirer,
        structurer: ProductStructurer,
        enricher: ProductEnricher,
    ) -> Self {
        Self {
            acquirer,
            structurer,
            enricher,
            schema: TargetSchema::product(),
            enrichment_failure: EnrichmentFailurePolicy::default(),
            buffer_dir: None,
            dump_dir: None,
        }
    }

    pub fn with_enrichment_failure(mut self, policy: EnrichmentFailurePolicy) -> Self {
        self.enrichment_failure = policy;
        self
    }

    /// Stage each run's buffer in a temp file under `dir` instead of memory.
    pub fn with_buffer_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.buffer_dir = dir;
        self
    }

    pub fn with_dump_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.dump_dir = dir;
        self
    }

    /// Run the full pipeline for one product. Never fails: errors become an
    /// error result.
    pub fn process(&self, seed: &ProductSeed) -> PipelineOutcome {
        let run_id = Uuid::new_v4();
        let _span = tracing::info_span!("process_product", %run_id).entered();
        let mut dump = StageDump::new(self.dump_dir.as_deref(), &run_id);

        let mut outcome = PipelineOutcome {
            run_id,
            state: PipelineState::Failed,
            last_stage: None,
            result: PipelineResult::error("pipeline did not run", None),
            enrichment: None,
            warnings: Vec::new(),
        };

        let mut buffer = match self.open_buffer() {
            Ok(buffer) => buffer,
            Err(e) => {
                tracing::error!(error = %e, "Could not open evidence buffer");
                outcome.result = PipelineResult::error(e.to_string(), None);
                return outcome;
            }
        };

        match self.run_stages(seed, buffer.as_mut(), &mut dump, &mut outcome) {
            Ok(record) => {
                outcome.state = PipelineState::Resulted;
                outcome.result = PipelineResult::Record(record);
                tracing::info!(warnings = outcome.warnings.len(), "Pipeline run complete");
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    last_stage = ?outcome.last_stage,
                    "Pipeline run failed"
                );
                outcome.state = PipelineState::Failed;
                outcome.result = PipelineResult::error(e.to_string(), buffer.read_all().ok());
            }
        }

        dump.json("result", &outcome.result);
        outcome
    }

    fn open_buffer(&self) -> Result<Box<dyn EvidenceBuffer>, BufferError> {
        match &self.buffer_dir {
            Some(dir) => {
                let buffer = FileBuffer::temporary_in(dir)?;
                tracing::debug!(path = %buffer.path().display(), "Using file-backed buffer");
                Ok(Box::new(buffer))
            }
            None => Ok(Box::new(MemoryBuffer::new())),
        }
    }

    fn run_stages(
        &self,
        seed: &ProductSeed,
        buffer: &mut dyn EvidenceBuffer,
        dump: &mut StageDump,
        outcome: &mut PipelineOutcome,
    ) -> Result<Map<String, Value>, ProcessingError> {
        // CLEARED
        buffer.clear()?;
        buffer.append(&seed.to_evidence_block())?;
        self.finish_stage(PipelineState::Cleared, buffer, dump, outcome)?;

        // ACQUIRED
        let input = seed.acquisition_input();
        self.acquirer.acquire(&input, buffer)?;
        self.finish_stage(PipelineState::Acquired, buffer, dump, outcome)?;

        // STRUCTURED
        self.structurer.structure(buffer)?;
        self.finish_stage(PipelineState::Structured, buffer, dump, outcome)?;

        // ENRICHED
        match self.enricher.enrich(buffer) {
            Ok(enrichment) => outcome.enrichment = Some(enrichment),
            Err(EnrichmentError::Buffer(e)) => return Err(e.into()),
            Err(e) if self.enrichment_failure == EnrichmentFailurePolicy::CarryForward => {
                tracing::warn!(error = %e, "Enrichment unavailable, keeping structuring output");
                outcome
                    .warnings
                    .push(format!("Enrichment skipped: {e}"));
            }
            Err(e) => return Err(e.into()),
        }
        self.finish_stage(PipelineState::Enriched, buffer, dump, outcome)?;

        // RESULTED
        let text = buffer.read_all()?;
        let candidate = last_parsable_object(&text).ok_or(ProcessingError::NoValidJson)?;
        let conformed = self.schema.conform(&candidate);
        if conformed.matched_fields == 0 {
            return Err(ProcessingError::NoSchemaFields);
        }
        if !conformed.dropped.is_empty() {
            tracing::debug!(dropped = ?conformed.dropped, "Dropped fields outside the schema");
        }
        for warning in &conformed.warnings {
            tracing::warn!(%warning, "Value did not fit its schema type");
        }
        outcome.warnings.extend(conformed.warnings);
        Ok(conformed.record)
    }

    /// Log and dump the buffer after a stage completes.
    fn finish_stage(
        &self,
        state: PipelineState,
        buffer: &dyn EvidenceBuffer,
        dump: &mut StageDump,
        outcome: &mut PipelineOutcome,
    ) -> Result<(), BufferError> {
        let snapshot = buffer.read_all()?;
        tracing::debug!(stage = state.label(), buffer = %snapshot, "Stage complete");
        dump.text(state.label(), &snapshot);
        outcome.last_stage = Some(state);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;
    use crate::pipeline::acquisition::{
        MockBarcodeDecoder, MockImageFetcher, MockOcrEngine, MockProductLookup,
    };
    use crate::pipeline::enrichment::MockWorkflowClient;
    use crate::pipeline::structuring::MockLlmClient;

    const STRUCTURED: &str = r#"{"product_name": "Nutella", "barcode": "3017620422003", "brand": "Ferrero", "ingredients": "sugar, palm oil, hazelnuts", "color": "N/A"}"#;

    fn acquirer(lookup: MockProductLookup) -> EvidenceAcquirer {
        EvidenceAcquirer::new(
            Box::new(MockImageFetcher::failing(404)),
            Box::new(MockOcrEngine::new("NUTELLA\nhazelnut spread")),
            Box::new(MockBarcodeDecoder::new(&[("EAN13", "3017620422003")])),
            Box::new(lookup),
        )
    }

    fn processor(llm: MockLlmClient, workflow: MockWorkflowClient) -> PipelineProcessor {
        PipelineProcessor::new(
            acquirer(MockProductLookup::new().with_product(
                "3017620422003",
                "Nutella",
                "Ferrero",
                "400 g",
            )),
            ProductStructurer::new(Box::new(llm), "test-model"),
            ProductEnricher::new(Box::new(workflow)),
        )
    }

    fn seed(value: Value) -> ProductSeed {
        match value {
            Value::Object(map) => ProductSeed::new(map),
            _ => panic!("seed must be an object"),
        }
    }

    fn image_file(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("front.jpg");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"\xff\xd8\xff fake jpeg").unwrap();
        path
    }

    #[test]
    fn happy_path_returns_conformed_record() {
        let enriched = "```json\n{\n  \"product_name\": \"Nutella\",\n  \"barcode\": 3017620422003,\n  \"brand\": \"Ferrero\",\n  \"item_weight\": \"400\",\n  \"weight_unit\": \"g\",\n  \"rating\": 4.5,\n}\n```";
        let p = processor(MockLlmClient::new(STRUCTURED), MockWorkflowClient::replying(enriched));

        let outcome = p.process(&seed(json!({ "barcode": "3017620422003" })));

        assert_eq!(outcome.state, PipelineState::Resulted);
        assert_eq!(outcome.enrichment, Some(EnrichmentOutcome::Recovered));
        let record = outcome.result.as_record().unwrap();
        let keys: Vec<&str> = record.keys().map(String::as_str).collect();
        let expected: Vec<&str> = TargetSchema::product().fields().iter().map(|f| f.name).collect();
        assert_eq!(keys, expected);
        assert_eq!(record["brand"], "Ferrero");
        assert_eq!(record["barcode"], json!(3017620422003u64));
        assert_eq!(record["item_weight"], json!(400.0));
        assert!(record["color"].is_null());
        assert!(!record.contains_key("rating"));
    }

    #[test]
    fn carry_forward_uses_structuring_output_when_enrichment_is_down() {
        let p = processor(MockLlmClient::new(STRUCTURED), MockWorkflowClient::unreachable());

        let outcome = p.process(&seed(json!({ "barcode": "3017620422003" })));

        assert_eq!(outcome.state, PipelineState::Resulted);
        assert!(outcome.enrichment.is_none());
        assert!(outcome.warnings.iter().any(|w| w.starts_with("Enrichment skipped")));
        let record = outcome.result.as_record().unwrap();
        assert_eq!(record["product_name"], "Nutella");
        // "N/A" in the structuring output is only repaired by enrichment; the
        // final conform step still treats it as absent.
        assert!(record["color"].is_null());
        assert_eq!(
            record["ingredients"],
            json!(["sugar", "palm oil", "hazelnuts"])
        );
    }

    #[test]
    fn abort_policy_fails_when_enrichment_is_down() {
        let p = processor(MockLlmClient::new(STRUCTURED), MockWorkflowClient::unreachable())
            .with_enrichment_failure(EnrichmentFailurePolicy::Abort);

        let outcome = p.process(&seed(json!({})));

        assert_eq!(outcome.state, PipelineState::Failed);
        assert_eq!(outcome.last_stage, Some(PipelineState::Structured));
        match outcome.result {
            PipelineResult::Error { error, raw } => {
                assert!(error.starts_with("Enrichment failed"));
                assert_eq!(raw.as_deref(), Some(STRUCTURED));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn structuring_failure_returns_raw_evidence() {
        let p = processor(MockLlmClient::failing(500), MockWorkflowClient::replying("{}"));

        let outcome = p.process(&seed(json!({ "barcode": "3017620422003", "brand": "Ferrero" })));

        assert_eq!(outcome.state, PipelineState::Failed);
        assert_eq!(outcome.last_stage, Some(PipelineState::Acquired));
        match outcome.result {
            PipelineResult::Error { error, raw } => {
                assert!(error.starts_with("Structuring failed"));
                let raw = raw.unwrap();
                assert!(raw.starts_with("Input Product Data:\nbarcode: 3017620422003\nbrand: Ferrero\n"));
                assert!(raw.contains("Product Info for 3017620422003:"));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn envelope_fallback_without_schema_fields_is_an_error() {
        let p = processor(
            MockLlmClient::new("not json"),
            MockWorkflowClient::replying("Sorry, nothing found."),
        );

        let outcome = p.process(&seed(json!({})));

        assert_eq!(outcome.state, PipelineState::Failed);
        assert!(matches!(
            outcome.enrichment,
            Some(EnrichmentOutcome::Fallback { .. })
        ));
        match outcome.result {
            PipelineResult::Error { error, raw } => {
                assert_eq!(error, ProcessingError::NoSchemaFields.to_string());
                assert!(raw.unwrap().contains("Sorry, nothing found."));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn no_json_anywhere_is_an_error_with_raw_text() {
        let p = processor(MockLlmClient::new("I cannot help"), MockWorkflowClient::unreachable());

        let outcome = p.process(&seed(json!({})));

        match outcome.result {
            PipelineResult::Error { error, raw } => {
                assert_eq!(error, "No valid JSON found in buffer");
                assert_eq!(raw.as_deref(), Some("I cannot help"));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_structuring_output_never_yields_a_nested_fragment() {
        let structured = r#"{"product_name":"Nutella","brand":"Ferrero","dimensions":{"width":10,"height":5},}"#;
        let p = processor(MockLlmClient::new(structured), MockWorkflowClient::unreachable());

        let outcome = p.process(&seed(json!({})));

        assert_eq!(outcome.state, PipelineState::Failed);
        match outcome.result {
            PipelineResult::Error { error, raw } => {
                assert_eq!(error, "No valid JSON found in buffer");
                assert_eq!(raw.as_deref(), Some(structured));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn image_seed_drives_ocr_and_barcode_evidence() {
        let tmp = tempfile::tempdir().unwrap();
        let image = image_file(tmp.path());
        let llm = std::sync::Arc::new(MockLlmClient::new(STRUCTURED));

        struct Shared(std::sync::Arc<MockLlmClient>);
        impl crate::pipeline::structuring::LlmClient for Shared {
            fn generate(&self, m: &str, p: &str, s: &str) -> Result<String, StructuringError> {
                self.0.generate(m, p, s)
            }
        }

        let p = PipelineProcessor::new(
            acquirer(MockProductLookup::new()),
            ProductStructurer::new(Box::new(Shared(llm.clone())), "m"),
            ProductEnricher::new(Box::new(MockWorkflowClient::unreachable())),
        );

        let outcome = p.process(&seed(json!({
            "product_image": image.to_string_lossy(),
            "barcode": "N/A"
        })));

        assert!(outcome.result.is_record());
        let prompt = llm.last_prompt().unwrap();
        assert!(prompt.contains("Extracted Text (OCR):\nNUTELLA\nhazelnut spread"));
        assert!(prompt.contains("Found EAN13 barcode: 3017620422003"));
        assert!(prompt.contains("No product found for barcode 3017620422003."));
    }

    #[test]
    fn file_buffer_is_removed_after_run() {
        let tmp = tempfile::tempdir().unwrap();
        let p = processor(MockLlmClient::new(STRUCTURED), MockWorkflowClient::unreachable())
            .with_buffer_dir(Some(tmp.path().to_path_buf()));

        let outcome = p.process(&seed(json!({})));

        assert!(outcome.result.is_record());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_buffer_dir_fails_without_raw() {
        let p = processor(MockLlmClient::new(STRUCTURED), MockWorkflowClient::unreachable())
            .with_buffer_dir(Some(PathBuf::from("/nonexistent/shelfscan/buffers")));

        let outcome = p.process(&seed(json!({})));

        assert_eq!(outcome.state, PipelineState::Failed);
        assert!(matches!(outcome.result, PipelineResult::Error { raw: None, .. }));
    }

    #[test]
    fn stage_snapshots_are_dumped() {
        let tmp = tempfile::tempdir().unwrap();
        let p = processor(MockLlmClient::new(STRUCTURED), MockWorkflowClient::replying(STRUCTURED))
            .with_dump_dir(Some(tmp.path().to_path_buf()));

        let outcome = p.process(&seed(json!({ "barcode": "3017620422003" })));

        let dir = tmp.path().join(outcome.run_id.to_string());
        let cleared = std::fs::read_to_string(dir.join("01-cleared.txt")).unwrap();
        assert_eq!(cleared, "Input Product Data:\nbarcode: 3017620422003\n");
        assert!(dir.join("02-acquired.txt").exists());
        assert_eq!(
            std::fs::read_to_string(dir.join("03-structured.txt")).unwrap(),
            STRUCTURED
        );
        assert!(dir.join("04-enriched.txt").exists());
        assert!(dir.join("05-result.json").exists());
    }

    #[test]
    fn concurrent_runs_do_not_share_buffers() {
        let p = std::sync::Arc::new(processor(
            MockLlmClient::new(STRUCTURED),
            MockWorkflowClient::unreachable(),
        ));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let p = p.clone();
                std::thread::spawn(move || p.process(&seed(json!({ "id": i }))))
            })
            .collect();

        let ids: std::collections::HashSet<Uuid> =
            handles.into_iter().map(|h| h.join().unwrap().run_id).collect();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn seed_block_renders_values() {
        let s = seed(json!({ "product_name": "Oat Milk", "barcode": 5000112637922u64, "tags": ["a"], "size": null }));
        assert_eq!(
            s.to_evidence_block(),
            "Input Product Data:\nproduct_name: Oat Milk\nbarcode: 5000112637922\ntags: [\"a\"]\nsize: null"
        );
    }

    #[test]
    fn seed_absent_markers() {
        let s = seed(json!({ "product_image": "  ", "barcode": "n/A" }));
        assert!(s.image().is_none());
        assert!(s.barcode().is_none());

        let s = seed(json!({ "product_image": "https://img.test/a.jpg", "barcode": 123 }));
        assert_eq!(s.image(), Some(ImageSource::Url("https://img.test/a.jpg".into())));
        assert_eq!(s.barcode().as_deref(), Some("123"));

        let s = ProductSeed::from_parts(Some("front.jpg"), None);
        assert_eq!(s.image(), Some(ImageSource::Path(PathBuf::from("front.jpg"))));
    }

    #[test]
    fn result_serializes_untagged() {
        let err = PipelineResult::error("boom", Some("raw text".into()));
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({ "error": "boom", "raw": "raw text" })
        );
        let err = PipelineResult::error("boom", None);
        assert_eq!(serde_json::to_value(&err).unwrap(), json!({ "error": "boom" }));

        let mut map = Map::new();
        map.insert("brand".into(), json!("Acme"));
        assert_eq!(
            serde_json::to_value(PipelineResult::Record(map)).unwrap(),
            json!({ "brand": "Acme" })
        );
    }
}
