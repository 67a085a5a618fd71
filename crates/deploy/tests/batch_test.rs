//! Batch orchestration tests against in-memory chains.
//!
//! Each chain is simulated by a [`MemoryBackend`] that lands contract creations at the
//! address derived from the deployer's live nonce, like a real node would.
//! Run with: cargo test --test batch_test

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy_core::primitives::{Address, Bytes, U256, address, keccak256};
use alloy_core::rlp::{Decodable, Header};
use anyhow::{Context, Result};
use cad_deploy::signer::{DeviceError, LocalKeySigner};
use cad_deploy::{
    BatchOptions, BatchReport, CONTRACT_NAME, ChainBackend, ChainStatus, ChainStore, ChainTarget,
    ConfigError, Confirm, DeploymentBatch, DeploymentDecision, Environment, GasOptions, InfoFile,
    Receipt, SerializedSignature, TxSigner, deterministic_address,
};

const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const DEPLOYER: Address = address!("f39fd6e51aad88f6f4ce6ab8827279cfffb92266");
const INIT_CODE: [u8; 5] = [0x60, 0x80, 0x60, 0x40, 0x52];

#[derive(Debug)]
struct ChainState {
    chain_id: u64,
    nonce: u64,
    balance: U256,
    code: HashMap<Address, Bytes>,
    broadcasts: usize,
    /// Raw transactions as received by the node.
    raw_txs: Vec<Bytes>,
    estimates: usize,
    fail_broadcast: bool,
    /// The node exposes no unlocked account to fund from.
    fail_funding: bool,
    /// Land contracts somewhere other than the creation address.
    misplace: bool,
}

impl ChainState {
    fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            nonce: 0,
            balance: U256::from(10u64).pow(U256::from(18u64)),
            code: HashMap::new(),
            broadcasts: 0,
            raw_txs: Vec::new(),
            estimates: 0,
            fail_broadcast: false,
            fail_funding: false,
            misplace: false,
        }
    }
}

#[derive(Clone)]
struct MemoryBackend {
    sender: Address,
    state: Arc<Mutex<ChainState>>,
}

impl ChainBackend for MemoryBackend {
    async fn get_code(&self, address: Address) -> Result<Bytes> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .code
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_transaction_count(&self, _address: Address) -> Result<u64> {
        Ok(self.state.lock().unwrap().nonce)
    }

    async fn get_balance(&self, _address: Address) -> Result<U256> {
        Ok(self.state.lock().unwrap().balance)
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.state.lock().unwrap().chain_id)
    }

    async fn gas_price(&self) -> Result<u128> {
        Ok(1_000_000_000)
    }

    async fn estimate_gas(&self, _from: Address, _init_code: &Bytes) -> Result<u64> {
        self.state.lock().unwrap().estimates += 1;
        Ok(500_000)
    }

    async fn broadcast(&self, raw_tx: &Bytes) -> Result<Receipt> {
        let mut state = self.state.lock().unwrap();
        if state.fail_broadcast {
            anyhow::bail!("connection reset by peer");
        }

        let address = if state.misplace {
            Address::repeat_byte(0xee)
        } else {
            deterministic_address(self.sender, state.nonce)
        };
        state.code.insert(address, Bytes::from(INIT_CODE.to_vec()));
        state.nonce += 1;
        state.broadcasts += 1;
        state.raw_txs.push(raw_tx.clone());

        Ok(Receipt {
            transaction_hash: keccak256(raw_tx),
            block_number: state.broadcasts as u64,
            contract_address: Some(address),
            success: true,
        })
    }

    async fn fund(&self, to: Address, amount: U256) -> Result<Receipt> {
        let mut state = self.state.lock().unwrap();
        if state.fail_funding {
            anyhow::bail!("The node exposes no unlocked dev account");
        }
        assert_eq!(to, self.sender);
        state.balance += amount;

        Ok(Receipt {
            transaction_hash: keccak256(amount.to_be_bytes::<32>()),
            block_number: state.broadcasts as u64,
            contract_address: None,
            success: true,
        })
    }
}

/// Fields of a broadcast EIP-1559 transaction, up to the gas limit.
#[derive(Debug, PartialEq, Eq)]
struct Eip1559Fields {
    chain_id: u64,
    nonce: u64,
    max_priority_fee_per_gas: u128,
    max_fee_per_gas: u128,
    gas_limit: u64,
}

fn decode_eip1559(raw: &[u8]) -> Eip1559Fields {
    let (tx_type, mut buf) = raw.split_first().unwrap();
    assert_eq!(*tx_type, 0x02, "not a type 2 transaction");
    assert!(Header::decode(&mut buf).unwrap().list);

    Eip1559Fields {
        chain_id: u64::decode(&mut buf).unwrap(),
        nonce: u64::decode(&mut buf).unwrap(),
        max_priority_fee_per_gas: u128::decode(&mut buf).unwrap(),
        max_fee_per_gas: u128::decode(&mut buf).unwrap(),
        gas_limit: u64::decode(&mut buf).unwrap(),
    }
}

/// `(nonce, gas_price, gas_limit)` of a broadcast legacy transaction.
fn decode_legacy(raw: &[u8]) -> (u64, u128, u64) {
    let mut buf = raw;
    assert!(Header::decode(&mut buf).unwrap().list, "not a legacy transaction");

    (
        u64::decode(&mut buf).unwrap(),
        u128::decode(&mut buf).unwrap(),
        u64::decode(&mut buf).unwrap(),
    )
}

/// A set of simulated chains keyed by RPC URL.
struct Networks {
    chains: HashMap<String, Arc<Mutex<ChainState>>>,
    connects: AtomicUsize,
}

impl Networks {
    fn new(info: &InfoFile) -> Self {
        let chains = info
            .chains
            .values()
            .enumerate()
            .map(|(i, chain)| {
                (
                    chain.rpc.clone(),
                    Arc::new(Mutex::new(ChainState::new(1000 + i as u64))),
                )
            })
            .collect();

        Self {
            chains,
            connects: AtomicUsize::new(0),
        }
    }

    fn state(&self, info: &InfoFile, key: &str) -> std::sync::MutexGuard<'_, ChainState> {
        let rpc = &info.chains[key].rpc;
        self.chains[rpc].lock().unwrap()
    }

    fn connect(&self, chain: &ChainTarget) -> Result<MemoryBackend> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let state = self
            .chains
            .get(&chain.rpc)
            .cloned()
            .with_context(|| format!("No network at {}", chain.rpc))?;

        Ok(MemoryBackend {
            sender: DEPLOYER,
            state,
        })
    }
}

#[derive(Default)]
struct MemoryStore {
    saved: Mutex<Vec<(Environment, InfoFile)>>,
}

impl MemoryStore {
    fn saves(&self) -> usize {
        self.saved.lock().unwrap().len()
    }

    fn last(&self) -> InfoFile {
        self.saved.lock().unwrap().last().unwrap().1.clone()
    }
}

impl ChainStore for MemoryStore {
    fn load(&self, env: Environment) -> Result<InfoFile> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(saved_env, _)| *saved_env == env)
            .map(|(_, info)| info.clone())
            .context("Nothing saved")
    }

    fn save(&self, env: Environment, info: &InfoFile) -> Result<()> {
        self.saved.lock().unwrap().push((env, info.clone()));
        Ok(())
    }
}

#[derive(Default)]
struct ScriptedConfirm {
    answers: VecDeque<bool>,
    prompts: Vec<String>,
}

impl Confirm for ScriptedConfirm {
    fn ask(&mut self, prompt: &str) -> Result<bool> {
        self.prompts.push(prompt.to_string());
        Ok(self.answers.pop_front().unwrap_or(false))
    }
}

/// Derives its address fine, then loses the device on every signature.
struct UnpluggedDevice {
    inner: LocalKeySigner,
    sign_attempts: usize,
}

impl TxSigner for UnpluggedDevice {
    async fn address(&mut self) -> Result<Address> {
        self.inner.address().await
    }

    async fn sign(&mut self, _payload: &[u8]) -> Result<SerializedSignature> {
        self.sign_attempts += 1;
        Err(DeviceError::Unavailable {
            reason: "device disconnected".to_string(),
        }
        .into())
    }
}

fn info_file() -> InfoFile {
    serde_json::from_value(serde_json::json!({
        "chains": {
            "avalanche": {
                "name": "Avalanche",
                "rpc": "mem://avalanche",
                "tokenSymbol": "AVAX",
                "chainId": 43113
            },
            "fantom": {
                "name": "Fantom",
                "rpc": "mem://fantom",
                "tokenSymbol": "FTM",
                "gasOptions": { "gasLimit": 4000000 }
            },
            "moonbeam": {
                "name": "Moonbeam",
                "rpc": "mem://moonbeam",
                "tokenSymbol": "GLMR",
                "contracts": {
                    "AxelarGateway": { "address": "0x4f4495243837681061c4743b74b3eedf548d56a5" }
                }
            }
        }
    }))
    .unwrap()
}

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn yes() -> BatchOptions {
    BatchOptions {
        yes: true,
        ..Default::default()
    }
}

fn signer() -> LocalKeySigner {
    LocalKeySigner::from_private_key(ANVIL_KEY).unwrap()
}

async fn run(
    info: &mut InfoFile,
    networks: &Networks,
    store: &MemoryStore,
    options: BatchOptions,
    chains: &[&str],
) -> Result<BatchReport> {
    let mut batch = DeploymentBatch::new(
        Environment::Testnet,
        store,
        ScriptedConfirm::default(),
        Bytes::from(INIT_CODE.to_vec()),
        options,
    );
    batch
        .run(info, &names(chains), &mut signer(), |chain| networks.connect(chain))
        .await
}

#[tokio::test]
async fn test_middle_chain_abort_does_not_stop_batch() {
    let mut info = info_file();
    let networks = Networks::new(&info);
    let store = MemoryStore::default();
    networks.state(&info, "fantom").nonce = 1;

    let report = run(
        &mut info,
        &networks,
        &store,
        yes(),
        &["Avalanche", "Fantom", "Moonbeam"],
    )
    .await
    .unwrap();

    let expected = deterministic_address(DEPLOYER, 0);
    assert_eq!(report.deployer, DEPLOYER);
    assert!(report.halted.is_none());
    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.deployed(), 2);

    assert_eq!(report.outcome("avalanche").unwrap().address(), Some(expected));
    assert_eq!(report.outcome("moonbeam").unwrap().address(), Some(expected));

    let fantom = report.outcome("fantom").unwrap();
    assert_eq!(
        fantom.status,
        ChainStatus::Aborted(DeploymentDecision::AbortNonceNonZero { nonce: 1 })
    );
    assert!(fantom.reason.as_ref().unwrap().contains("Fantom"));

    // Registry is updated for deployed chains only, and saved after every chain.
    for key in ["avalanche", "moonbeam"] {
        let entry = info.chains[key].contract().unwrap();
        assert_eq!(entry.address, Some(expected));
        assert_eq!(entry.deployer, Some(DEPLOYER));
    }
    assert!(info.chains["fantom"].contract().is_none());
    assert_eq!(store.saves(), 3);
    assert_eq!(store.last(), info);

    // Unrelated registry entries survive.
    assert!(info.chains["moonbeam"].contracts.contains_key("AxelarGateway"));
    assert_eq!(
        info.chains["avalanche"].extra.get("chainId"),
        Some(&serde_json::json!(43113))
    );
}

#[tokio::test]
async fn test_existing_deployment_is_skipped() {
    let mut info = info_file();
    let networks = Networks::new(&info);
    let store = MemoryStore::default();
    networks
        .state(&info, "avalanche")
        .code
        .insert(deterministic_address(DEPLOYER, 0), Bytes::from(INIT_CODE.to_vec()));

    let report = run(&mut info, &networks, &store, yes(), &["avalanche"])
        .await
        .unwrap();

    let outcome = report.outcome("avalanche").unwrap();
    assert!(matches!(outcome.status, ChainStatus::Skipped { .. }));
    assert!(outcome.reason.as_ref().unwrap().contains("already deployed"));
    assert_eq!(networks.state(&info, "avalanche").broadcasts, 0);
    assert_eq!(store.saves(), 1);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let mut info = info_file();
    let networks = Networks::new(&info);
    let store = MemoryStore::default();

    let first = run(&mut info, &networks, &store, yes(), &["avalanche", "fantom"])
        .await
        .unwrap();
    assert_eq!(first.deployed(), 2);

    let second = run(&mut info, &networks, &store, yes(), &["avalanche", "fantom"])
        .await
        .unwrap();
    assert_eq!(second.deployed(), 0);
    assert!(
        second
            .outcomes
            .iter()
            .all(|outcome| matches!(outcome.status, ChainStatus::Skipped { .. }))
    );
    assert_eq!(networks.state(&info, "avalanche").broadcasts, 1);
    assert_eq!(networks.state(&info, "fantom").broadcasts, 1);
}

#[tokio::test]
async fn test_declined_confirmation_aborts_chain() {
    let mut info = info_file();
    let networks = Networks::new(&info);
    let store = MemoryStore::default();

    let confirm = ScriptedConfirm {
        answers: VecDeque::from([false, true]),
        prompts: Vec::new(),
    };
    let mut batch = DeploymentBatch::new(
        Environment::Testnet,
        &store,
        confirm,
        Bytes::from(INIT_CODE.to_vec()),
        BatchOptions::default(),
    );
    let report = batch
        .run(
            &mut info,
            &names(&["avalanche", "fantom"]),
            &mut signer(),
            |chain| networks.connect(chain),
        )
        .await
        .unwrap();

    assert_eq!(
        report.outcome("avalanche").unwrap().status,
        ChainStatus::Aborted(DeploymentDecision::AbortUserDeclined)
    );
    assert!(matches!(
        report.outcome("fantom").unwrap().status,
        ChainStatus::Deployed { .. }
    ));
    assert_eq!(networks.state(&info, "avalanche").broadcasts, 0);

    let prompts = &batch.confirm().prompts;
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains(&deterministic_address(DEPLOYER, 0).to_string()));
    assert!(prompts[0].contains("Avalanche"));
}

#[tokio::test]
async fn test_unknown_chain_fails_before_any_io() {
    let mut info = info_file();
    let networks = Networks::new(&info);
    let store = MemoryStore::default();

    let err = run(
        &mut info,
        &networks,
        &store,
        yes(),
        &["avalanche", "polygon"],
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::UnknownChain(name)) if name == "polygon"
    ));
    assert_eq!(networks.connects.load(Ordering::SeqCst), 0);
    assert_eq!(store.saves(), 0);
}

#[tokio::test]
async fn test_halt_on_abort_stops_batch() {
    let mut info = info_file();
    let networks = Networks::new(&info);
    let store = MemoryStore::default();
    networks.state(&info, "fantom").balance = U256::ZERO;

    let options = BatchOptions {
        halt_on_abort: true,
        ..yes()
    };
    let report = run(
        &mut info,
        &networks,
        &store,
        options,
        &["avalanche", "fantom", "moonbeam"],
    )
    .await
    .unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(
        report.outcome("fantom").unwrap().status,
        ChainStatus::Aborted(DeploymentDecision::AbortNoFunds)
    );
    assert!(report.halted.as_ref().unwrap().contains("no funds"));
    assert!(report.outcome("moonbeam").is_none());
    assert_eq!(networks.state(&info, "moonbeam").broadcasts, 0);
}

#[tokio::test]
async fn test_network_failure_marks_chain_failed() {
    let mut info = info_file();
    let networks = Networks::new(&info);
    let store = MemoryStore::default();
    networks.state(&info, "avalanche").fail_broadcast = true;

    let report = run(&mut info, &networks, &store, yes(), &["avalanche", "fantom"])
        .await
        .unwrap();

    let avalanche = report.outcome("avalanche").unwrap();
    assert_eq!(avalanche.status, ChainStatus::Failed);
    assert!(avalanche.reason.as_ref().unwrap().contains("connection reset"));
    assert!(info.chains["avalanche"].contract().is_none());

    assert!(matches!(
        report.outcome("fantom").unwrap().status,
        ChainStatus::Deployed { .. }
    ));
    assert!(report.halted.is_none());
}

#[tokio::test]
async fn test_unexpected_contract_address_is_not_recorded() {
    let mut info = info_file();
    let networks = Networks::new(&info);
    let store = MemoryStore::default();
    networks.state(&info, "avalanche").misplace = true;

    let report = run(&mut info, &networks, &store, yes(), &["avalanche"])
        .await
        .unwrap();

    let outcome = report.outcome("avalanche").unwrap();
    assert_eq!(outcome.status, ChainStatus::Failed);
    assert!(outcome.reason.as_ref().unwrap().contains("instead of the predicted"));
    assert!(info.chains["avalanche"].contract().is_none());
}

#[tokio::test]
async fn test_gas_overrides_skip_estimation() {
    let mut info = info_file();
    let networks = Networks::new(&info);
    let store = MemoryStore::default();

    run(&mut info, &networks, &store, yes(), &["avalanche", "fantom"])
        .await
        .unwrap();

    assert_eq!(networks.state(&info, "avalanche").estimates, 1);
    assert_eq!(networks.state(&info, "fantom").estimates, 0);
}

#[tokio::test]
async fn test_device_loss_halts_batch() {
    let mut info = info_file();
    let networks = Networks::new(&info);
    let store = MemoryStore::default();

    let mut device = UnpluggedDevice {
        inner: signer(),
        sign_attempts: 0,
    };
    let mut batch = DeploymentBatch::new(
        Environment::Testnet,
        &store,
        ScriptedConfirm::default(),
        Bytes::from(INIT_CODE.to_vec()),
        yes(),
    );
    let report = batch
        .run(
            &mut info,
            &names(&["avalanche", "fantom"]),
            &mut device,
            |chain| networks.connect(chain),
        )
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].status, ChainStatus::Failed);
    let halted = report.halted.unwrap();
    assert!(halted.contains("Avalanche"));
    assert!(halted.contains("Ethereum app is open"));
    assert_eq!(device.sign_attempts, 1);
}

#[tokio::test]
async fn test_device_loss_can_continue() {
    let mut info = info_file();
    let networks = Networks::new(&info);
    let store = MemoryStore::default();

    let mut device = UnpluggedDevice {
        inner: signer(),
        sign_attempts: 0,
    };
    let options = BatchOptions {
        halt_on_device_error: false,
        ..yes()
    };
    let mut batch = DeploymentBatch::new(
        Environment::Testnet,
        &store,
        ScriptedConfirm::default(),
        Bytes::from(INIT_CODE.to_vec()),
        options,
    );
    let report = batch
        .run(
            &mut info,
            &names(&["avalanche", "fantom"]),
            &mut device,
            |chain| networks.connect(chain),
        )
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert!(report.halted.is_none());
    assert_eq!(device.sign_attempts, 2);
    assert_eq!(store.saves(), 2);
    assert!(
        store
            .last()
            .chains
            .values()
            .all(|chain| chain.contract().is_none())
    );
    assert!(!info.chains["avalanche"].contracts.contains_key(CONTRACT_NAME));
}

fn gas_options(value: serde_json::Value) -> GasOptions {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn test_fee_market_override_builds_eip1559_transaction() {
    let mut info = info_file();
    let networks = Networks::new(&info);
    let store = MemoryStore::default();
    info.chains.get_mut("avalanche").unwrap().contract_mut().gas_options =
        Some(gas_options(serde_json::json!({
            "maxFeePerGas": 200000000000u64,
            "maxPriorityFeePerGas": 2000000000,
            "gasLimit": 900000
        })));

    let report = run(&mut info, &networks, &store, yes(), &["avalanche"])
        .await
        .unwrap();
    assert!(matches!(
        report.outcome("avalanche").unwrap().status,
        ChainStatus::Deployed { .. }
    ));

    let state = networks.state(&info, "avalanche");
    assert_eq!(state.raw_txs.len(), 1);
    assert_eq!(
        decode_eip1559(&state.raw_txs[0]),
        Eip1559Fields {
            chain_id: state.chain_id,
            nonce: 0,
            max_priority_fee_per_gas: 2_000_000_000,
            max_fee_per_gas: 200_000_000_000,
            gas_limit: 900_000,
        }
    );
    assert_eq!(state.estimates, 0);
}

#[tokio::test]
async fn test_gas_price_override_is_signed() {
    let mut info = info_file();
    let networks = Networks::new(&info);
    let store = MemoryStore::default();
    info.chains.get_mut("fantom").unwrap().gas_options = Some(gas_options(serde_json::json!({
        "gasPrice": 30000000000u64,
        "gasLimit": 4000000
    })));

    run(&mut info, &networks, &store, yes(), &["fantom"])
        .await
        .unwrap();

    let state = networks.state(&info, "fantom");
    assert_eq!(
        decode_legacy(&state.raw_txs[0]),
        (0, 30_000_000_000, 4_000_000)
    );
}

#[tokio::test]
async fn test_unsupported_gas_option_fails_chain() {
    let mut info = info_file();
    let networks = Networks::new(&info);
    let store = MemoryStore::default();
    info.chains.get_mut("avalanche").unwrap().gas_options = Some(gas_options(
        serde_json::json!({ "maxFeePerBlobGas": 1, "gasLimit": 900000 }),
    ));

    let confirm = ScriptedConfirm {
        answers: VecDeque::from([true, true]),
        prompts: Vec::new(),
    };
    let mut batch = DeploymentBatch::new(
        Environment::Testnet,
        &store,
        confirm,
        Bytes::from(INIT_CODE.to_vec()),
        BatchOptions::default(),
    );
    let report = batch
        .run(
            &mut info,
            &names(&["avalanche", "moonbeam"]),
            &mut signer(),
            |chain| networks.connect(chain),
        )
        .await
        .unwrap();

    let avalanche = report.outcome("avalanche").unwrap();
    assert_eq!(avalanche.status, ChainStatus::Failed);
    assert!(avalanche.reason.as_ref().unwrap().contains("maxFeePerBlobGas"));
    assert_eq!(networks.state(&info, "avalanche").broadcasts, 0);

    // The operator is only asked about the chain that can be deployed.
    assert_eq!(batch.confirm().prompts.len(), 1);
    assert!(matches!(
        report.outcome("moonbeam").unwrap().status,
        ChainStatus::Deployed { .. }
    ));
}

#[tokio::test]
async fn test_funding_failure_fails_only_that_chain() {
    let mut info = info_file();
    let networks = Networks::new(&info);
    let store = MemoryStore::default();
    networks.state(&info, "avalanche").fail_funding = true;

    let options = BatchOptions {
        fund_deployer: Some(U256::from(1_000u64)),
        ..yes()
    };
    let report = run(&mut info, &networks, &store, options, &["avalanche", "fantom"])
        .await
        .unwrap();

    let avalanche = report.outcome("avalanche").unwrap();
    assert_eq!(avalanche.status, ChainStatus::Failed);
    let reason = avalanche.reason.as_ref().unwrap();
    assert!(reason.contains("Avalanche"));
    assert!(reason.contains("Failed to fund the deployer"));
    assert_eq!(networks.state(&info, "avalanche").broadcasts, 0);

    assert!(matches!(
        report.outcome("fantom").unwrap().status,
        ChainStatus::Deployed { .. }
    ));
    assert!(report.halted.is_none());
    assert_eq!(store.saves(), 2);
}

#[tokio::test]
async fn test_funding_tops_up_empty_deployer() {
    let mut info = info_file();
    let networks = Networks::new(&info);
    let store = MemoryStore::default();
    for key in ["avalanche", "fantom"] {
        networks.state(&info, key).balance = U256::ZERO;
    }

    let amount = U256::from(cad_deploy::LOCAL_FUNDING_WEI);
    let options = BatchOptions {
        fund_deployer: Some(amount),
        ..yes()
    };
    let report = run(&mut info, &networks, &store, options, &["avalanche", "fantom"])
        .await
        .unwrap();

    assert_eq!(report.deployed(), 2);
    assert_eq!(networks.state(&info, "avalanche").balance, amount);
    assert_eq!(networks.state(&info, "fantom").balance, amount);
}
