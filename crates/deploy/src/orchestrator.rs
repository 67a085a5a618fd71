//! Batch deployment across chains.

use alloy_core::primitives::{Address, B256, Bytes, U256};
use anyhow::{Context, Result};
use tracing::Instrument;

use crate::backend::ChainBackend;
use crate::config::{CONTRACT_NAME, ChainStore, ChainTarget, Environment, InfoFile};
use crate::confirm::Confirm;
use crate::preflight::{self, DeploymentDecision, PreflightOptions, PreflightReport};
use crate::signer::{DeviceError, TxSigner};
use crate::tx::{DeployTransaction, Fees};

/// Policy knobs for a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub preflight: PreflightOptions,
    /// Skip the confirmation prompt.
    pub yes: bool,
    /// Stop the batch at the first aborted chain.
    pub halt_on_abort: bool,
    /// Stop the batch when the signing device becomes unreachable.
    pub halt_on_device_error: bool,
    pub verify: bool,
    /// Wei sent to the deployer on each chain before its preflight (local networks).
    pub fund_deployer: Option<U256>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            preflight: PreflightOptions::default(),
            yes: false,
            halt_on_abort: false,
            halt_on_device_error: true,
            verify: false,
            fund_deployer: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ChainStatus {
    Deployed { address: Address, tx_hash: B256 },
    Skipped { address: Address },
    Aborted(DeploymentDecision),
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOutcome {
    /// Info-file key of the chain.
    pub chain: String,
    pub status: ChainStatus,
    /// Why the chain was not deployed, naming the chain and the condition.
    pub reason: Option<String>,
}

impl ChainOutcome {
    /// Contract address on this chain, if known.
    pub fn address(&self) -> Option<Address> {
        match &self.status {
            ChainStatus::Deployed { address, .. } | ChainStatus::Skipped { address } => {
                Some(*address)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub deployer: Address,
    pub outcomes: Vec<ChainOutcome>,
    /// Set when the batch stopped before processing every chain.
    pub halted: Option<String>,
}

impl BatchReport {
    pub fn outcome(&self, chain: &str) -> Option<&ChainOutcome> {
        self.outcomes.iter().find(|outcome| outcome.chain == chain)
    }

    pub fn deployed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.status, ChainStatus::Deployed { .. }))
            .count()
    }
}

/// Runs the deployment pipeline over a list of chains.
///
/// Chains are processed strictly in order. The info file is saved after every chain so
/// completed work survives a later failure.
pub struct DeploymentBatch<'a, St, C> {
    env: Environment,
    store: &'a St,
    confirm: C,
    init_code: Bytes,
    options: BatchOptions,
}

impl<'a, St: ChainStore, C: Confirm> DeploymentBatch<'a, St, C> {
    pub fn new(
        env: Environment,
        store: &'a St,
        confirm: C,
        init_code: Bytes,
        options: BatchOptions,
    ) -> Self {
        Self {
            env,
            store,
            confirm,
            init_code,
            options,
        }
    }

    pub fn confirm(&self) -> &C {
        &self.confirm
    }

    /// Deploy to every chain in `names`.
    ///
    /// Returns an error only for configuration problems and for failing to derive the
    /// deployer address, both of which happen before any chain is touched. Per-chain
    /// problems are reported in the [`BatchReport`].
    pub async fn run<S, B, F>(
        &mut self,
        info: &mut InfoFile,
        names: &[String],
        signer: &mut S,
        connect: F,
    ) -> Result<BatchReport>
    where
        S: TxSigner,
        B: ChainBackend,
        F: Fn(&ChainTarget) -> Result<B>,
    {
        let keys = info.select(names)?;

        let deployer = signer
            .address()
            .await
            .context("Failed to derive the deployer address")?;
        tracing::info!(
            deployer = %deployer,
            env = %self.env,
            chains = keys.len(),
            "Starting deployment batch"
        );

        if self.options.verify {
            tracing::warn!(
                "Contract verification is not supported, verify the deployment externally"
            );
        }

        let mut report = BatchReport {
            deployer,
            outcomes: Vec::with_capacity(keys.len()),
            halted: None,
        };

        for key in keys {
            let Some(chain) = info.chains.get(&key).cloned() else {
                continue;
            };

            let result = self
                .process_chain(&chain, deployer, signer, &connect)
                .instrument(tracing::info_span!("chain", name = %chain.name))
                .await;

            let mut halt = None;

            let outcome = match result {
                Ok(status) => {
                    let reason = match &status {
                        ChainStatus::Aborted(decision) => {
                            tracing::warn!(
                                chain = %chain.name,
                                reason = %decision,
                                "Deployment aborted"
                            );
                            if self.options.halt_on_abort {
                                halt = Some(format!("{}: {}", chain.name, decision));
                            }
                            Some(format!("{}: {}", chain.name, decision))
                        }
                        ChainStatus::Skipped { address } => Some(format!(
                            "{}: {} already deployed at address {}",
                            chain.name, CONTRACT_NAME, address
                        )),
                        _ => None,
                    };

                    if let ChainStatus::Deployed { address, .. } = &status {
                        let entry = info
                            .chains
                            .get_mut(&key)
                            .map(|chain| chain.contract_mut());
                        if let Some(entry) = entry {
                            entry.address = Some(*address);
                            entry.deployer = Some(deployer);
                        }
                        tracing::info!(
                            address = %address,
                            "{} | {} deployed",
                            chain.name,
                            CONTRACT_NAME
                        );
                    }

                    ChainOutcome {
                        chain: key.clone(),
                        status,
                        reason,
                    }
                }
                Err(err) => {
                    tracing::error!(
                        chain = %chain.name,
                        error = %format!("{:#}", err),
                        "Deployment failed"
                    );

                    let device_error = err
                        .chain()
                        .find_map(|cause| cause.downcast_ref::<DeviceError>());
                    if let Some(device_error) = device_error {
                        if device_error.is_connectivity() && self.options.halt_on_device_error {
                            halt = Some(format!("{}: {}", chain.name, device_error));
                        }
                    }

                    ChainOutcome {
                        chain: key.clone(),
                        status: ChainStatus::Failed,
                        reason: Some(format!("{}: {:#}", chain.name, err)),
                    }
                }
            };
            report.outcomes.push(outcome);

            if let Err(err) = self.store.save(self.env, info) {
                tracing::error!(error = %format!("{:#}", err), "Failed to save chain info");
                halt.get_or_insert_with(|| format!("Failed to save chain info: {:#}", err));
            }

            if let Some(reason) = halt {
                tracing::error!(reason = %reason, "Halting deployment batch");
                report.halted = Some(reason);
                break;
            }
        }

        Ok(report)
    }

    async fn process_chain<S, B, F>(
        &mut self,
        chain: &ChainTarget,
        deployer: Address,
        signer: &mut S,
        connect: &F,
    ) -> Result<ChainStatus>
    where
        S: TxSigner,
        B: ChainBackend,
        F: Fn(&ChainTarget) -> Result<B>,
    {
        let backend =
            connect(chain).with_context(|| format!("Failed to connect to {}", chain.rpc))?;

        if let Some(amount) = self.options.fund_deployer {
            let receipt = backend
                .fund(deployer, amount)
                .await
                .context("Failed to fund the deployer")?;
            tracing::info!(
                deployer = %deployer,
                block = receipt.block_number,
                "Deployer funded"
            );
        }

        let report =
            preflight::evaluate(&backend, deployer, chain, &self.options.preflight).await?;

        let predicted = match (&report.decision, report.predicted_address) {
            (DeploymentDecision::SkipAlreadyDeployed, _) => {
                return Ok(ChainStatus::Skipped {
                    address: report.expected_address,
                });
            }
            (DeploymentDecision::Proceed, Some(predicted)) => predicted,
            (DeploymentDecision::Proceed, None) => {
                anyhow::bail!("Preflight did not produce a predicted address")
            }
            (decision, _) => return Ok(ChainStatus::Aborted(decision.clone())),
        };

        // Reject unusable gas options before prompting.
        let fees = Fees::from_gas_options(&report.gas_options)?;

        tracing::info!(address = %predicted, "{} will be deployed to", CONTRACT_NAME);
        if report.address_mismatch() {
            tracing::warn!(
                expected = %report.expected_address,
                predicted = %predicted,
                "Predicted address differs from the expected address"
            );
        }

        if !self.options.yes && !self.ask(chain, &report, predicted)? {
            return Ok(ChainStatus::Aborted(DeploymentDecision::AbortUserDeclined));
        }

        self.deploy(&backend, &report, fees, deployer, predicted, signer)
            .await
    }

    fn ask(
        &mut self,
        chain: &ChainTarget,
        preflight: &PreflightReport,
        predicted: Address,
    ) -> Result<bool> {
        let mut prompt = format!(
            "{} will be deployed to {} on {}.\n",
            CONTRACT_NAME, predicted, chain.name
        );
        if preflight.address_mismatch() {
            prompt.push_str(&format!(
                "The info file expects {}.\n",
                preflight.expected_address
            ));
        }
        prompt.push_str(&format!(
            "Does this match any existing deployments? Proceed with deployment on {}?",
            chain.name
        ));

        self.confirm.ask(&prompt)
    }

    async fn deploy<S, B>(
        &self,
        backend: &B,
        preflight: &PreflightReport,
        fees: Option<Fees>,
        deployer: Address,
        predicted: Address,
        signer: &mut S,
    ) -> Result<ChainStatus>
    where
        S: TxSigner,
        B: ChainBackend,
    {
        let nonce = preflight.nonce.context("Preflight did not read the nonce")?;
        let chain_id = backend.chain_id().await.context("Failed to read chain id")?;

        let fees = match fees {
            Some(fees) => fees,
            None => Fees::Legacy {
                gas_price: backend.gas_price().await.context("Failed to read gas price")?,
            },
        };
        let gas_limit = match preflight.gas_options.gas_limit {
            Some(limit) => limit,
            None => backend
                .estimate_gas(deployer, &self.init_code)
                .await
                .context("Failed to estimate deployment gas")?,
        };

        let tx = DeployTransaction {
            nonce,
            fees,
            gas_limit,
            init_code: self.init_code.clone(),
            chain_id,
        };
        tracing::debug!(
            nonce,
            fees = ?fees,
            gas_limit,
            chain_id,
            "Signing deployment transaction"
        );

        let signature = signer
            .sign(&tx.signing_payload())
            .await
            .context("Failed to sign deployment transaction")?;
        tracing::debug!(signature = %signature.to_base64(), "Transaction signed");

        let raw_tx = tx.into_signed(&signature)?;
        let receipt = backend.broadcast(&raw_tx).await?;

        if !receipt.success {
            anyhow::bail!(
                "Deployment transaction {} reverted in block {}",
                receipt.transaction_hash,
                receipt.block_number
            );
        }

        match receipt.contract_address {
            Some(address) if address == predicted => Ok(ChainStatus::Deployed {
                address,
                tx_hash: receipt.transaction_hash,
            }),
            Some(address) => anyhow::bail!(
                "{} was deployed to {} instead of the predicted {}",
                CONTRACT_NAME,
                address,
                predicted
            ),
            None => anyhow::bail!(
                "Receipt of {} has no contract address",
                receipt.transaction_hash
            ),
        }
    }
}
