use std::path::PathBuf;

use cad_deploy::Environment;
use cad_deploy::signer::{DEFAULT_DERIVATION_PATH, DEFAULT_SPECULOS_URL, DerivationPath};
use clap::Parser;
use tracing::level_filters::LevelFilter;

/// Default directory holding the `<env>.json` info files.
const DEFAULT_INFO_DIR: &str = "info";

/// Default location of the compiled `ConstAddressDeployer` artifact.
const DEFAULT_ARTIFACT: &str = "artifacts/ConstAddressDeployer.json";

#[derive(Parser)]
#[command(name = "cad")]
#[command(
    author,
    version,
    about = "Deploy the ConstAddressDeployer contract to the same address on every EVM chain"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(long, env = "CAD_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// The environment whose info file lists the target chains.
    #[arg(short, long, env = "ENV", default_value_t = Environment::Testnet)]
    pub env: Environment,

    /// Comma separated names of the chains to deploy to.
    #[arg(short = 'n', long, env = "CHAIN_NAMES", value_delimiter = ',', required = true)]
    pub chain_names: Vec<String>,

    /// Hex private key of the deployer.
    #[arg(short, long, env = "PRIVATE_KEY", hide_env_values = true, conflicts_with = "ledger")]
    pub private_key: Option<String>,

    /// Sign with a Ledger device instead of a private key.
    #[arg(long)]
    pub ledger: bool,

    /// APDU endpoint of the Ledger device (Speculos or a Ledger HTTP bridge).
    #[arg(long, env = "CAD_LEDGER_URL", default_value = DEFAULT_SPECULOS_URL)]
    pub ledger_url: String,

    /// Derivation path of the Ledger account.
    #[arg(long, env = "CAD_DERIVATION_PATH", default_value = DEFAULT_DERIVATION_PATH)]
    pub derivation_path: DerivationPath,

    /// Ignore the nonce value check.
    #[arg(short, long)]
    pub ignore: bool,

    /// Redeploy even if the contract already exists at the expected address.
    #[arg(short, long)]
    pub force: bool,

    /// Skip the confirmation prompt.
    #[arg(short, long)]
    pub yes: bool,

    /// Verify the deployed contract on the explorer.
    ///
    /// Verification is not performed by this tool, the flag is only recorded.
    #[arg(long, env = "VERIFY")]
    pub verify: bool,

    /// Stop the batch at the first chain that is aborted.
    #[arg(long)]
    pub halt_on_abort: bool,

    /// Keep going when the Ledger becomes unreachable while signing.
    #[arg(long)]
    pub continue_on_device_error: bool,

    /// Directory holding the environment info files.
    #[arg(long, env = "CAD_INFO_DIR", default_value = DEFAULT_INFO_DIR)]
    pub info_dir: PathBuf,

    /// Path to the contract artifact JSON.
    #[arg(long, env = "CAD_ARTIFACT", default_value = DEFAULT_ARTIFACT)]
    pub artifact: PathBuf,
}
