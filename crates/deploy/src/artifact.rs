//! Contract artifact loading.

use std::path::Path;

use alloy_core::primitives::Bytes;
use serde::Deserialize;
use serde_json::Value;

use crate::config::ConfigError;

#[derive(Deserialize)]
struct Artifact {
    #[serde(default)]
    bytecode: Value,
}

/// Read the creation bytecode from a Hardhat (`{"bytecode": "0x.."}`) or Foundry
/// (`{"bytecode": {"object": "0x.."}}`) artifact.
pub fn load_init_code(path: &Path) -> Result<Bytes, ConfigError> {
    let invalid = |reason: String| ConfigError::Artifact {
        path: path.to_path_buf(),
        reason,
    };

    let content = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let artifact: Artifact = serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;

    let bytecode = match &artifact.bytecode {
        Value::String(code) => code.as_str(),
        Value::Object(object) => object
            .get("object")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("bytecode.object is missing".to_string()))?,
        _ => return Err(invalid("bytecode field is missing".to_string())),
    };

    let code = hex::decode(bytecode.trim_start_matches("0x"))
        .map_err(|e| invalid(format!("bytecode is not valid hex: {}", e)))?;
    if code.is_empty() {
        return Err(invalid("bytecode is empty".to_string()));
    }

    tracing::debug!(path = %path.display(), size = code.len(), "Contract artifact loaded");
    Ok(Bytes::from(code))
}
