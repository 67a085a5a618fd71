//! Preflight checks run before any gas is spent on a chain.

use std::fmt;

use alloy_core::primitives::utils::format_ether;
use alloy_core::primitives::{Address, U256};
use anyhow::{Context, Result};

use crate::address::deterministic_address;
use crate::backend::ChainBackend;
use crate::config::{CONTRACT_NAME, ChainTarget, GasOptions};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreflightOptions {
    /// Redeploy even when code already exists at the expected address.
    pub force: bool,
    /// Deploy from a deployer whose nonce is not zero.
    pub ignore_nonce: bool,
}

/// What to do with a chain. Computed fresh for every chain and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentDecision {
    Proceed,
    SkipAlreadyDeployed,
    AbortNonceNonZero { nonce: u64 },
    AbortNoFunds,
    AbortUserDeclined,
}

impl DeploymentDecision {
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            DeploymentDecision::AbortNonceNonZero { .. }
                | DeploymentDecision::AbortNoFunds
                | DeploymentDecision::AbortUserDeclined
        )
    }
}

impl fmt::Display for DeploymentDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentDecision::Proceed => write!(f, "ready to deploy"),
            DeploymentDecision::SkipAlreadyDeployed => {
                write!(f, "{} already deployed", CONTRACT_NAME)
            }
            DeploymentDecision::AbortNonceNonZero { nonce } => {
                write!(f, "nonce value must be zero (deployer nonce is {})", nonce)
            }
            DeploymentDecision::AbortNoFunds => write!(f, "deployer account has no funds"),
            DeploymentDecision::AbortUserDeclined => write!(f, "deployment declined by user"),
        }
    }
}

/// Result of evaluating a chain.
///
/// Fields read after an early decision are `None`: a skipped chain has no nonce, and a
/// nonce abort has no balance.
#[derive(Debug, Clone, PartialEq)]
pub struct PreflightReport {
    pub decision: DeploymentDecision,
    /// Recorded registry address, or the nonce-0 prediction when none is recorded.
    pub expected_address: Address,
    /// Where a deployment at the live nonce lands.
    pub predicted_address: Option<Address>,
    pub nonce: Option<u64>,
    pub balance: Option<U256>,
    pub gas_options: GasOptions,
}

impl PreflightReport {
    fn early(decision: DeploymentDecision, expected_address: Address) -> Self {
        Self {
            decision,
            expected_address,
            predicted_address: None,
            nonce: None,
            balance: None,
            gas_options: GasOptions::default(),
        }
    }

    /// The registry expects a different address than a deployment would produce now.
    pub fn address_mismatch(&self) -> bool {
        self.predicted_address
            .is_some_and(|predicted| predicted != self.expected_address)
    }
}

/// Gas overrides for the bootstrap contract on `chain`.
///
/// The contract entry's overrides win over the chain defaults. Empty option sets are
/// treated as absent.
pub fn resolve_gas_options(chain: &ChainTarget) -> GasOptions {
    chain
        .contract()
        .and_then(|entry| entry.gas_options.as_ref())
        .filter(|options| !options.is_empty())
        .or_else(|| chain.gas_options.as_ref().filter(|options| !options.is_empty()))
        .cloned()
        .unwrap_or_default()
}

/// Decide whether deploying to `chain` from `deployer` is safe.
///
/// Checks run in a fixed order (code, nonce, balance) and stop at the first one that
/// decides. Backend failures are returned as errors.
pub async fn evaluate<B: ChainBackend>(
    backend: &B,
    deployer: Address,
    chain: &ChainTarget,
    options: &PreflightOptions,
) -> Result<PreflightReport> {
    let expected_address = chain
        .contract()
        .and_then(|entry| entry.address)
        .unwrap_or_else(|| deterministic_address(deployer, 0));

    if !options.force {
        let code = backend
            .get_code(expected_address)
            .await
            .with_context(|| format!("Failed to read code at {}", expected_address))?;
        if !code.is_empty() {
            tracing::info!(address = %expected_address, "{} already deployed", CONTRACT_NAME);
            return Ok(PreflightReport::early(
                DeploymentDecision::SkipAlreadyDeployed,
                expected_address,
            ));
        }
    }

    let nonce = backend
        .get_transaction_count(deployer)
        .await
        .context("Failed to read deployer nonce")?;
    let predicted_address = deterministic_address(deployer, nonce);

    if nonce != 0 && !options.ignore_nonce {
        return Ok(PreflightReport {
            nonce: Some(nonce),
            predicted_address: Some(predicted_address),
            ..PreflightReport::early(
                DeploymentDecision::AbortNonceNonZero { nonce },
                expected_address,
            )
        });
    }

    let balance = backend
        .get_balance(deployer)
        .await
        .context("Failed to read deployer balance")?;

    let decision = if balance.is_zero() {
        DeploymentDecision::AbortNoFunds
    } else {
        DeploymentDecision::Proceed
    };

    let gas_options = resolve_gas_options(chain);

    tracing::info!(
        balance = %format_ether(balance),
        token = %chain.token_symbol,
        nonce,
        gas_options = %serde_json::to_string(&gas_options).unwrap_or_default(),
        "Deployer account state"
    );

    Ok(PreflightReport {
        decision,
        expected_address,
        predicted_address: Some(predicted_address),
        nonce: Some(nonce),
        balance: Some(balance),
        gas_options,
    })
}
