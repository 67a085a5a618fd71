//! cad deploys the ConstAddressDeployer contract to a batch of EVM chains.

mod cli;

use std::process::ExitCode;

use alloy_core::primitives::U256;
use anyhow::Result;
use clap::Parser;
use comfy_table::{Table, presets::UTF8_FULL};

use cad_deploy::signer::{DeviceSigner, LedgerConnector, LocalKeySigner};
use cad_deploy::{
    AssumeYes, BatchOptions, BatchReport, ChainStore, ChainTarget, ConfigError, Confirm,
    DeploymentBatch, Environment, JsonFileStore, LOCAL_FUNDING_WEI, PreflightOptions,
    RpcBackend, SignerHandle, StdinConfirm, load_init_code,
};
use cli::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let store = JsonFileStore::new(&cli.info_dir);
    let mut info = store.load(cli.env)?;

    // Fail on configuration problems before touching any network.
    let keys = info.select(&cli.chain_names)?;
    let init_code = load_init_code(&cli.artifact)?;
    let mut signer = build_signer(&cli)?;

    let options = BatchOptions {
        preflight: PreflightOptions {
            force: cli.force,
            ignore_nonce: cli.ignore,
        },
        yes: cli.yes,
        halt_on_abort: cli.halt_on_abort,
        halt_on_device_error: !cli.continue_on_device_error,
        verify: cli.verify,
        fund_deployer: (cli.env == Environment::Local).then_some(U256::from(LOCAL_FUNDING_WEI)),
    };

    let confirm: Box<dyn Confirm> = if cli.yes {
        Box::new(AssumeYes)
    } else {
        Box::new(StdinConfirm)
    };

    let mut batch = DeploymentBatch::new(cli.env, &store, confirm, init_code, options);
    let report = batch
        .run(&mut info, &keys, &mut signer, |chain: &ChainTarget| {
            RpcBackend::new(&chain.rpc)
        })
        .await?;

    print_summary(&report);

    if let Some(reason) = &report.halted {
        tracing::error!(reason = %reason, "Deployment batch halted");
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}

fn build_signer(cli: &Cli) -> Result<SignerHandle> {
    if cli.ledger {
        let connector = LedgerConnector::new(&cli.ledger_url)?;
        tracing::info!(url = %cli.ledger_url, path = %cli.derivation_path, "Using Ledger signer");
        return Ok(SignerHandle::Device(DeviceSigner::new(
            connector,
            cli.derivation_path.clone(),
        )));
    }

    match &cli.private_key {
        Some(private_key) => Ok(SignerHandle::Local(LocalKeySigner::from_private_key(
            private_key,
        )?)),
        None => Err(ConfigError::MissingSigner.into()),
    }
}

fn print_summary(report: &BatchReport) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Chain", "Status", "Address", "Detail"]);

    for outcome in &report.outcomes {
        table.add_row(vec![
            outcome.chain.clone(),
            outcome.status.to_string(),
            outcome
                .address()
                .map(|address| address.to_string())
                .unwrap_or_default(),
            outcome.reason.clone().unwrap_or_default(),
        ]);
    }

    println!("Deployer: {}", report.deployer);
    println!("{table}");
}
