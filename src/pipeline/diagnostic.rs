//! Pipeline diagnostic dump: writes per-stage buffer snapshots to disk.
//!
//! Disabled unless a dump directory is configured (`SHELFSCAN_DUMP_DIR`).
//! Snapshots are an operator hook only and never feed back into the result.
//!
//! **Output structure**:
//! ```text
//! {dump_dir}/{run_id}/
//!   01-cleared.txt
//!   02-acquired.txt
//!   03-structured.txt
//!   04-enriched.txt
//!   05-result.json
//! ```

use std::path::{Path, PathBuf};

use uuid::Uuid;

// ──────────────────────────────────────────────
// Dump directory resolution
// ──────────────────────────────────────────────

/// Returns the dump directory for a run, creating it on first use.
///
/// Returns `None` (with a warning) if directory creation fails. Never panics,
/// never blocks the pipeline.
pub fn dump_dir_for(base: &Path, run_id: &Uuid) -> Option<PathBuf> {
    let dir = base.join(run_id.to_string());

    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(
            path = %dir.display(),
            error = %e,
            "Diagnostic dump: failed to create directory"
        );
        return None;
    }

    Some(dir)
}

/// Numbered snapshot writer for one pipeline run. A no-op when disabled.
#[derive(Debug)]
pub struct StageDump {
    dir: Option<PathBuf>,
    next: u32,
}

impl StageDump {
    pub fn new(base: Option<&Path>, run_id: &Uuid) -> Self {
        Self {
            dir: base.and_then(|b| dump_dir_for(b, run_id)),
            next: 1,
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Write `NN-{stage}.txt`.
    pub fn text(&mut self, stage: &str, text: &str) {
        if let Some(filename) = self.next_name(stage, "txt") {
            if let Some(dir) = &self.dir {
                dump_text(dir, &filename, text);
            }
        }
    }

    /// Write `NN-{stage}.json`.
    pub fn json<T: serde::Serialize>(&mut self, stage: &str, value: &T) {
        if let Some(filename) = self.next_name(stage, "json") {
            if let Some(dir) = &self.dir {
                dump_json(dir, &filename, value);
            }
        }
    }

    fn next_name(&mut self, stage: &str, ext: &str) -> Option<String> {
        self.dir.as_ref()?;
        let name = format!("{:02}-{stage}.{ext}", self.next);
        self.next += 1;
        Some(name)
    }
}

// ──────────────────────────────────────────────
// Dump writers
// ──────────────────────────────────────────────

/// Write a JSON artifact (any serde-serializable value).
///
/// Uses pretty-printing for human readability. Never panics.
pub fn dump_json<T: serde::Serialize>(dir: &Path, filename: &str, value: &T) {
    let path = dir.join(filename);
    match serde_json::to_string_pretty(value) {
        Ok(json) => match std::fs::write(&path, json.as_bytes()) {
            Ok(()) => tracing::debug!(
                path = %path.display(),
                size = json.len(),
                "Diagnostic dump: JSON written"
            ),
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "Diagnostic dump: failed to write JSON"
            ),
        },
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Diagnostic dump: failed to serialize JSON"
        ),
    }
}

/// Write a text artifact (buffer snapshot).
pub fn dump_text(dir: &Path, filename: &str, text: &str) {
    let path = dir.join(filename);
    match std::fs::write(&path, text.as_bytes()) {
        Ok(()) => tracing::debug!(
            path = %path.display(),
            size = text.len(),
            "Diagnostic dump: text written"
        ),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Diagnostic dump: failed to write text"
        ),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_dir_for_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let run_id = Uuid::new_v4();

        let dir = dump_dir_for(tmp.path(), &run_id).unwrap();

        assert!(dir.exists());
        assert!(dir.ends_with(run_id.to_string()));
    }

    #[test]
    fn stage_dump_numbers_files_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let run_id = Uuid::new_v4();
        let mut dump = StageDump::new(Some(tmp.path()), &run_id);

        dump.text("cleared", "Input Product Data:\n");
        dump.text("acquired", "Found EAN13 barcode: 123\n");
        dump.json("result", &serde_json::json!({ "brand": "Acme" }));

        let dir = tmp.path().join(run_id.to_string());
        assert_eq!(
            std::fs::read_to_string(dir.join("01-cleared.txt")).unwrap(),
            "Input Product Data:\n"
        );
        assert!(dir.join("02-acquired.txt").exists());
        let result = std::fs::read_to_string(dir.join("03-result.json")).unwrap();
        assert!(result.contains("\"brand\": \"Acme\""));
    }

    #[test]
    fn disabled_dump_writes_nothing() {
        let mut dump = StageDump::new(None, &Uuid::new_v4());
        dump.text("cleared", "x");
        assert!(dump.dir().is_none());
    }

    #[test]
    fn dump_json_writes_pretty_json() {
        let tmp = tempfile::tempdir().unwrap();

        #[derive(serde::Serialize)]
        struct Info {
            name: String,
            value: u32,
        }

        let info = Info {
            name: "test".to_string(),
            value: 42,
        };

        dump_json(tmp.path(), "info.json", &info);

        let content = std::fs::read_to_string(tmp.path().join("info.json")).unwrap();
        assert!(content.contains("\"name\": \"test\""));
        assert!(content.contains("\"value\": 42"));
        assert!(content.contains('\n'));
    }

    #[test]
    fn dump_text_handles_write_failure_gracefully() {
        let bad_dir = Path::new("/nonexistent/path");
        dump_text(bad_dir, "test.txt", "data");
        dump_json(bad_dir, "test.json", &"data");
    }
}
