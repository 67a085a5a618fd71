//! cad-deploy - Deployment library for the canonical `ConstAddressDeployer` contract.
//!
//! This crate provides the preflight checks, signers and batch orchestration used to
//! deploy the bootstrap contract to the same address on every EVM chain.

mod address;
pub use address::{address_from_public_key, deterministic_address};

mod artifact;
pub use artifact::load_init_code;

mod backend;
pub use backend::{ChainBackend, DEFAULT_RECEIPT_TIMEOUT, LOCAL_FUNDING_WEI, Receipt, RpcBackend};

mod config;
pub use config::{
    CONTRACT_NAME, ChainStore, ChainTarget, ChainTargets, ConfigError, ContractEntry,
    Environment, GasOptions, InfoFile, JsonFileStore,
};

mod confirm;
pub use confirm::{AssumeYes, Confirm, StdinConfirm};

mod orchestrator;
pub use orchestrator::{BatchOptions, BatchReport, ChainOutcome, ChainStatus, DeploymentBatch};

mod preflight;
pub use preflight::{
    DeploymentDecision, PreflightOptions, PreflightReport, evaluate, resolve_gas_options,
};

mod rlp;
mod rpc;

pub mod signer;
pub use signer::{SerializedSignature, SignatureScheme, SignerHandle, TxSigner};

mod tx;
pub use tx::{DeployTransaction, Fees};
