//! GitHub Actions step outputs

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Append `key=value` lines to `$GITHUB_OUTPUT`. Outside Actions the pairs
/// are only logged.
pub fn write_outputs(path: Option<&Path>, pairs: &[(&str, &str)]) -> Result<()> {
    let Some(path) = path else {
        for (key, value) in pairs {
            info!("{}={}", key, value);
        }
        return Ok(());
    };

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening GITHUB_OUTPUT at {}", path.display()))?;
    for (key, value) in pairs {
        // a newline would start a new key
        let value = value.replace(['\r', '\n'], " ");
        writeln!(file, "{}={}", key, value)?;
    }
    Ok(())
}
