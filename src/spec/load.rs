use std::path::Path;

use anyhow::Context;
use tracing::info;

use super::document::SpecDocument;

/// Load a Swagger 2.0 document from a `.yaml`/`.yml` or `.json` file.
pub fn load_spec(file_path: impl AsRef<Path>) -> anyhow::Result<SpecDocument> {
    let path = file_path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read API document {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let spec = if is_yaml {
        load_spec_from_yaml(&content)
    } else {
        load_spec_from_json(&content)
    }
    .with_context(|| format!("failed to parse API document {}", path.display()))?;

    info!(
        path = %path.display(),
        operations = spec.operations().len(),
        base_path = %spec.base_path(),
        "API document loaded"
    );
    Ok(spec)
}

pub fn load_spec_from_yaml(content: &str) -> anyhow::Result<SpecDocument> {
    let value: serde_json::Value = serde_yaml::from_str(content)?;
    SpecDocument::from_value(value)
}

pub fn load_spec_from_json(content: &str) -> anyhow::Result<SpecDocument> {
    let value: serde_json::Value = serde_json::from_str(content)?;
    SpecDocument::from_value(value)
}

/// Parse either serialization; JSON is tried first since it is also YAML.
pub fn load_spec_from_str(content: &str) -> anyhow::Result<SpecDocument> {
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(value) => SpecDocument::from_value(value),
        Err(_) => load_spec_from_yaml(content),
    }
}
