//! Subprocess execution shared by the external capability adapters

use super::CapabilityError;
use std::process::{Output, Stdio};
use tokio::process::Command;

/// Longest diagnostic excerpt attached to a failure
const DIAGNOSTIC_LIMIT: usize = 2000;

/// Run a command to completion and require a successful exit status
///
/// The child is killed if the returned future is dropped, so callers may
/// wrap this in `tokio::time::timeout`.
pub async fn run_to_completion(program: &str, mut command: Command) -> Result<Output, CapabilityError> {
    command
        .kill_on_drop(true)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    tracing::debug!(program, command = ?command.as_std(), "Spawning external process");

    let child = command.spawn().map_err(|source| CapabilityError::Spawn {
        program: program.to_string(),
        source,
    })?;

    let output = child.wait_with_output().await?;

    if !output.status.success() {
        let diagnostic = diagnostic_excerpt(&output);
        tracing::warn!(
            program,
            status = ?output.status.code(),
            diagnostic = %diagnostic,
            "External process failed"
        );
        return Err(CapabilityError::Failed {
            program: program.to_string(),
            status: output.status.code(),
            diagnostic,
        });
    }

    Ok(output)
}

/// Tail of stderr, or of stdout when stderr is empty
pub fn diagnostic_excerpt(output: &Output) -> String {
    let stream = if output.stderr.iter().any(|b| !b.is_ascii_whitespace()) {
        &output.stderr
    } else {
        &output.stdout
    };
    let text = String::from_utf8_lossy(stream);
    let text = text.trim();

    if text.is_empty() {
        return "no diagnostic output".to_string();
    }

    let char_count = text.chars().count();
    if char_count <= DIAGNOSTIC_LIMIT {
        text.to_string()
    } else {
        let tail: String = text.chars().skip(char_count - DIAGNOSTIC_LIMIT).collect();
        format!("...{}", tail)
    }
}
