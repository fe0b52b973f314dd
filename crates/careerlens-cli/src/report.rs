//! Profile file input and analysis output.

use std::path::Path;

use anyhow::{Context, Result, bail};
use careerlens_agent::ProfileAnalysis;
use tracing::info;

/// Read the profile text from `path`.  An empty file is an error.
pub fn read_profile(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile from {}", path.display()))?;
    if text.trim().is_empty() {
        bail!("profile file {} is empty", path.display());
    }
    Ok(text)
}

/// Write `analysis` to `path` as pretty-printed JSON.
pub fn write_results(path: &Path, analysis: &ProfileAnalysis) -> Result<()> {
    let json = serde_json::to_string_pretty(analysis).context("failed to serialise analysis")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write results to {}", path.display()))
}

/// Log the headline findings.
pub fn log_summary(analysis: &ProfileAnalysis) {
    let a = &analysis.assessment;
    info!(skills = analysis.skills.len(), "extracted skills");
    info!(level = %a.experience_level, "experience level");
    info!(strengths = %a.strengths.join(", "), "key strengths");
}
