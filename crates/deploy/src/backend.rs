//! Chain backend capability and its JSON-RPC implementation.

use std::future::Future;
use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes, U256};
use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

use crate::rpc;

/// Default time to wait for a broadcast transaction to be mined.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(300);

/// Amount sent to the deployer on a local network before deploying (1000 ETH).
pub const LOCAL_FUNDING_WEI: u128 = 1_000_000_000_000_000_000_000;

/// Outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: B256,
    pub block_number: u64,
    /// Address of the created contract, for contract-creation transactions.
    pub contract_address: Option<Address>,
    /// Whether execution succeeded.
    pub success: bool,
}

/// Read and broadcast capability against a single chain.
///
/// Implementations do not retry. Every failure is surfaced to the caller.
pub trait ChainBackend: Send + Sync {
    /// Bytecode deployed at `address` (empty for externally owned accounts).
    fn get_code(&self, address: Address) -> impl Future<Output = Result<Bytes>> + Send;

    /// Number of transactions sent from `address`.
    fn get_transaction_count(&self, address: Address) -> impl Future<Output = Result<u64>> + Send;

    fn get_balance(&self, address: Address) -> impl Future<Output = Result<U256>> + Send;

    fn chain_id(&self) -> impl Future<Output = Result<u64>> + Send;

    fn gas_price(&self) -> impl Future<Output = Result<u128>> + Send;

    /// Gas needed to create a contract from `init_code` when sent by `from`.
    fn estimate_gas(
        &self,
        from: Address,
        init_code: &Bytes,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Submit a signed raw transaction and wait until it is mined.
    fn broadcast(&self, raw_tx: &Bytes) -> impl Future<Output = Result<Receipt>> + Send;

    /// Send `amount` wei to `to` from an account the node controls, and wait until the
    /// transfer is mined. Only development networks support this.
    fn fund(&self, to: Address, amount: U256) -> impl Future<Output = Result<Receipt>> + Send;
}

/// Receipt as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: B256,
    block_number: String,
    #[serde(default)]
    contract_address: Option<Address>,
    #[serde(default)]
    status: Option<String>,
}

impl RpcReceipt {
    fn into_receipt(self) -> Result<Receipt> {
        let success = match self.status.as_deref() {
            Some(status) => rpc::parse_quantity(status)? == 1,
            // Pre-Byzantium receipts carry no status field.
            None => true,
        };

        Ok(Receipt {
            transaction_hash: self.transaction_hash,
            block_number: u64::try_from(rpc::parse_quantity(&self.block_number)?)
                .context("Block number does not fit in u64")?,
            contract_address: self.contract_address,
            success,
        })
    }
}

/// [`ChainBackend`] over HTTP JSON-RPC.
#[derive(Debug, Clone)]
pub struct RpcBackend {
    client: reqwest::Client,
    url: String,
    receipt_timeout: Duration,
}

impl RpcBackend {
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("Invalid RPC URL: {}", url))?;

        Ok(Self {
            client: rpc::create_client()?,
            url: url.to_string(),
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        })
    }

    pub fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn quantity(&self, method: &str, params: Vec<serde_json::Value>) -> Result<u128> {
        let value: String = rpc::json_rpc_call(&self.client, &self.url, method, params).await?;
        rpc::parse_quantity(&value)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<Receipt> {
        let receipt: RpcReceipt = rpc::poll_until(
            &format!("receipt of {}", tx_hash),
            self.receipt_timeout,
            || async move {
                rpc::json_rpc_call::<Option<RpcReceipt>>(
                    &self.client,
                    &self.url,
                    "eth_getTransactionReceipt",
                    vec![serde_json::json!(tx_hash)],
                )
                .await
            },
        )
        .await?;

        receipt.into_receipt()
    }

    /// Send `amount` wei to `to` from the node's first unlocked account.
    ///
    /// Only meaningful against development nodes (Anvil, Hardhat) that expose unlocked
    /// accounts through `eth_accounts`.
    pub async fn fund_from_dev_account(&self, to: Address, amount: U256) -> Result<Receipt> {
        let accounts: Vec<Address> =
            rpc::json_rpc_call(&self.client, &self.url, "eth_accounts", vec![])
                .await
                .context("Failed to list dev accounts")?;
        let funder = accounts
            .first()
            .context("The node exposes no unlocked dev account")?;

        let tx_hash: B256 = rpc::json_rpc_call(
            &self.client,
            &self.url,
            "eth_sendTransaction",
            vec![serde_json::json!({
                "from": funder,
                "to": to,
                "value": format!("0x{:x}", amount),
            })],
        )
        .await
        .context("Failed to send funding transaction")?;

        tracing::info!(
            funder = %funder,
            to = %to,
            tx_hash = %tx_hash,
            "Funding transaction sent"
        );

        self.wait_for_receipt(tx_hash).await
    }
}

impl ChainBackend for RpcBackend {
    async fn get_code(&self, address: Address) -> Result<Bytes> {
        rpc::json_rpc_call(
            &self.client,
            &self.url,
            "eth_getCode",
            vec![serde_json::json!(address), serde_json::json!("latest")],
        )
        .await
    }

    async fn get_transaction_count(&self, address: Address) -> Result<u64> {
        let count = self
            .quantity(
                "eth_getTransactionCount",
                vec![serde_json::json!(address), serde_json::json!("latest")],
            )
            .await?;
        u64::try_from(count).context("Transaction count does not fit in u64")
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        rpc::json_rpc_call(
            &self.client,
            &self.url,
            "eth_getBalance",
            vec![serde_json::json!(address), serde_json::json!("latest")],
        )
        .await
    }

    async fn chain_id(&self) -> Result<u64> {
        let id = self.quantity("eth_chainId", vec![]).await?;
        u64::try_from(id).context("Chain id does not fit in u64")
    }

    async fn gas_price(&self) -> Result<u128> {
        self.quantity("eth_gasPrice", vec![]).await
    }

    async fn estimate_gas(&self, from: Address, init_code: &Bytes) -> Result<u64> {
        let gas = self
            .quantity(
                "eth_estimateGas",
                vec![serde_json::json!({ "from": from, "data": init_code })],
            )
            .await?;
        u64::try_from(gas).context("Gas estimate does not fit in u64")
    }

    async fn broadcast(&self, raw_tx: &Bytes) -> Result<Receipt> {
        let tx_hash: B256 = rpc::json_rpc_call(
            &self.client,
            &self.url,
            "eth_sendRawTransaction",
            vec![serde_json::json!(raw_tx)],
        )
        .await
        .context("Failed to broadcast transaction")?;

        tracing::info!(tx_hash = %tx_hash, "Transaction broadcast, waiting for receipt...");

        self.wait_for_receipt(tx_hash).await
    }

    async fn fund(&self, to: Address, amount: U256) -> Result<Receipt> {
        self.fund_from_dev_account(to, amount).await
    }
}
