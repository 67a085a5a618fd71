//! Chain info files: the per-environment registry of target chains and deployed contracts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use derive_more::{Deref, DerefMut};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Registry key of the bootstrap contract inside a chain's `contracts` map.
pub const CONTRACT_NAME: &str = "ConstAddressDeployer";

/// Errors raised before any deployment work starts. These abort the whole batch.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Chain {0} is not defined in the info file")]
    UnknownChain(String),
    #[error("No chain names were provided")]
    EmptyChainList,
    #[error("Either a private key or a Ledger device must be selected")]
    MissingSigner,
    #[error("Invalid contract artifact {}: {reason}", path.display())]
    Artifact { path: PathBuf, reason: String },
}

/// Deployment environment, selecting which info file is used.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Environment {
    Local,
    Devnet,
    Testnet,
    Mainnet,
}

impl Environment {
    /// Name of the info file chain targets are loaded from.
    ///
    /// A local network is seeded from the testnet chain definitions.
    pub fn source_file_name(&self) -> String {
        match self {
            Environment::Local => format!("{}.json", Environment::Testnet),
            other => format!("{}.json", other),
        }
    }

    /// Name of the info file chain targets are written back to.
    pub fn target_file_name(&self) -> String {
        format!("{}.json", self)
    }
}

/// Gas overrides applied to the deployment transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    /// Legacy gas price in wei.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<u64>,
    /// Fields this tool does not interpret, kept so they survive a save.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GasOptions {
    pub fn is_empty(&self) -> bool {
        self.gas_limit.is_none()
            && self.gas_price.is_none()
            && self.max_fee_per_gas.is_none()
            && self.max_priority_fee_per_gas.is_none()
            && self.extra.is_empty()
    }
}

/// A contract's entry in a chain's registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployer: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_options: Option<GasOptions>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A target chain as described in the info file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainTarget {
    pub name: String,
    pub rpc: String,
    #[serde(default)]
    pub token_symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_options: Option<GasOptions>,
    #[serde(default)]
    pub contracts: BTreeMap<String, ContractEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChainTarget {
    /// The bootstrap contract's registry entry, if any.
    pub fn contract(&self) -> Option<&ContractEntry> {
        self.contracts.get(CONTRACT_NAME)
    }

    /// The bootstrap contract's registry entry, created empty if missing.
    pub fn contract_mut(&mut self) -> &mut ContractEntry {
        self.contracts.entry(CONTRACT_NAME.to_string()).or_default()
    }
}

/// Chains keyed by their lowercase info-file key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Deref, DerefMut)]
#[serde(transparent)]
pub struct ChainTargets(BTreeMap<String, ChainTarget>);

/// The full contents of an environment info file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfoFile {
    pub chains: ChainTargets,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InfoFile {
    /// Resolve user-supplied chain names to info-file keys.
    ///
    /// Every name is validated before returning so an unknown chain fails the batch before
    /// any network I/O happens. Order is preserved.
    pub fn select(&self, names: &[String]) -> Result<Vec<String>, ConfigError> {
        let mut keys = Vec::with_capacity(names.len());
        for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            let key = name.to_lowercase();
            if !self.chains.contains_key(&key) {
                return Err(ConfigError::UnknownChain(name.to_string()));
            }
            keys.push(key);
        }

        if keys.is_empty() {
            return Err(ConfigError::EmptyChainList);
        }

        Ok(keys)
    }
}

/// Persistence capability for chain info.
pub trait ChainStore {
    fn load(&self, env: Environment) -> Result<InfoFile>;

    /// Overwrite the stored info for `env`.
    fn save(&self, env: Environment, info: &InfoFile) -> Result<()>;
}

/// Stores info files as pretty-printed JSON under a directory (`<dir>/<env>.json`).
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ChainStore for JsonFileStore {
    fn load(&self, env: Environment) -> Result<InfoFile> {
        let path = self.dir.join(env.source_file_name());
        if !path.exists() {
            anyhow::bail!("Info file not found: {}", path.display());
        }

        let content = std::fs::read_to_string(&path)
            .context(format!("Failed to read info file {}", path.display()))?;
        let info: InfoFile = serde_json::from_str(&content)
            .context(format!("Failed to parse info file {}", path.display()))?;

        tracing::debug!(path = %path.display(), chains = info.chains.len(), "Info file loaded");
        Ok(info)
    }

    fn save(&self, env: Environment, info: &InfoFile) -> Result<()> {
        let path = self.dir.join(env.target_file_name());
        let mut content =
            serde_json::to_string_pretty(info).context("Failed to serialize chain info")?;
        content.push('\n');

        std::fs::write(&path, content)
            .context(format!("Failed to write info file {}", path.display()))?;

        tracing::debug!(path = %path.display(), "Info file saved");
        Ok(())
    }
}
