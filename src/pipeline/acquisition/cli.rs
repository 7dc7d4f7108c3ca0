//! Runs external image tools (tesseract, zbarimg) against in-memory image bytes.

use std::io::Write;
use std::process::Command;

use super::AcquisitionError;

/// Captured result of one tool invocation.
#[derive(Debug)]
pub struct ToolOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Stage `image_bytes` in a temp file and run `program` on it.
///
/// `args` may contain the placeholder `{image}`, replaced by the temp file path.
/// The temp file is removed when this returns. Non-zero exit codes are returned
/// to the caller; only spawn failures are errors.
pub fn run_on_image(
    program: &str,
    args: &[&str],
    image_bytes: &[u8],
) -> Result<ToolOutput, AcquisitionError> {
    let mut staged = tempfile::Builder::new()
        .prefix("shelfscan-image-")
        .tempfile()?;
    staged.write_all(image_bytes)?;
    staged.flush()?;

    let image_path = staged.path().to_string_lossy().into_owned();
    let resolved: Vec<String> = args
        .iter()
        .map(|a| if *a == "{image}" { image_path.clone() } else { (*a).to_string() })
        .collect();

    let output = Command::new(program).args(&resolved).output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AcquisitionError::ToolMissing {
                tool: program.to_string(),
            }
        } else {
            AcquisitionError::Io(e)
        }
    })?;

    let result = ToolOutput {
        status: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    tracing::debug!(
        tool = program,
        status = result.status,
        stderr = %result.stderr.trim(),
        "External tool finished"
    );

    Ok(result)
}
