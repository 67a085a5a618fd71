//! Hardware device signer.
//!
//! The device connection is a scoped resource owned by [`DeviceSigner`]. It is opened
//! lazily by the first public operation and reused until [`DeviceSigner::close`] is called
//! or the signer is dropped. Every state change goes through [`DeviceSigner::transition`],
//! which rejects edges the lifecycle does not allow.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use alloy_core::primitives::Address;
use anyhow::Result;
use k256::ecdsa::VerifyingKey;

use super::{SerializedSignature, SignatureScheme, TxSigner};
use crate::address::address_from_public_key;

/// BIP-44 path of the first Ethereum account.
pub const DEFAULT_DERIVATION_PATH: &str = "44'/60'/0'/0/0";

const HARDENED: u32 = 0x8000_0000;

/// Checklist shown when the device cannot be reached.
const CONNECT_CHECKLIST: &str = "Please ensure:\n\
    1. Ledger device is connected\n\
    2. Ethereum app is open on the device\n\
    3. Device is unlocked\n\
    4. No other applications are using the device";

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Cannot connect to Ledger device ({reason}). {}", CONNECT_CHECKLIST)]
    Unavailable { reason: String },
    #[error("Request was rejected on the device")]
    Rejected,
    #[error("Ethereum app is not open on the device (status {status:#06x})")]
    AppNotOpen { status: u16 },
    #[error("Device is locked")]
    Locked,
    #[error("Device refused the request (status {status:#06x})")]
    Refused { status: u16 },
    #[error("Device transport error: {0}")]
    Transport(String),
    #[error("Invalid device response: {0}")]
    InvalidResponse(String),
    #[error("Invalid device state transition from {from} to {to}")]
    InvalidTransition { from: DeviceStatus, to: DeviceStatus },
}

impl DeviceError {
    /// Map an APDU status word to an error. Returns `None` for success (`0x9000`).
    pub fn from_status_word(status: u16) -> Option<Self> {
        match status {
            0x9000 => None,
            0x6985 => Some(DeviceError::Rejected),
            0x6d00 | 0x6e00 | 0x6511 => Some(DeviceError::AppNotOpen { status }),
            0x5515 => Some(DeviceError::Locked),
            status => Some(DeviceError::Refused { status }),
        }
    }

    /// Whether the error means the device link itself is unusable, as opposed to a
    /// per-request refusal.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            DeviceError::Unavailable { .. }
                | DeviceError::AppNotOpen { .. }
                | DeviceError::Locked
                | DeviceError::Transport(_)
        )
    }
}

/// A BIP-32 derivation path such as `44'/60'/0'/0/0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPath(Vec<u32>);

impl DerivationPath {
    pub fn components(&self) -> &[u32] {
        &self.0
    }

    /// Serialized as a component count followed by big-endian components.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.0.len() * 4);
        out.push(self.0.len() as u8);
        for component in &self.0 {
            out.extend_from_slice(&component.to_be_bytes());
        }
        out
    }
}

impl Default for DerivationPath {
    fn default() -> Self {
        DEFAULT_DERIVATION_PATH
            .parse()
            .unwrap_or_else(|_| DerivationPath(vec![44 | HARDENED, 60 | HARDENED, HARDENED, 0, 0]))
    }
}

impl FromStr for DerivationPath {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().strip_prefix("m/").unwrap_or(s.trim());

        let components = s
            .split('/')
            .map(|part| {
                let (index, hardened) = match part.strip_suffix('\'') {
                    Some(index) => (index, true),
                    None => (part, false),
                };
                let index: u32 = index
                    .parse()
                    .map_err(|_| anyhow::anyhow!("Invalid derivation path component '{}'", part))?;
                if index >= HARDENED {
                    anyhow::bail!("Derivation path component '{}' is out of range", part);
                }
                Ok(if hardened { index | HARDENED } else { index })
            })
            .collect::<Result<Vec<_>>>()?;

        if components.is_empty() || components.len() > 10 {
            anyhow::bail!("Derivation path must have between 1 and 10 components");
        }

        Ok(Self(components))
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|c| {
                if c & HARDENED != 0 {
                    format!("{}'", c & !HARDENED)
                } else {
                    c.to_string()
                }
            })
            .collect();
        write!(f, "{}", parts.join("/"))
    }
}

/// Public key material reported by the device for a derivation path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceKey {
    /// Uncompressed SEC1 public key (65 bytes).
    pub public_key: Vec<u8>,
    pub address: Address,
}

/// An open link to a signing device.
pub trait DeviceTransport: Send {
    /// Scheme of the signatures this device app produces.
    fn scheme(&self) -> SignatureScheme;

    fn public_key(
        &mut self,
        path: &DerivationPath,
    ) -> impl Future<Output = Result<DeviceKey, DeviceError>> + Send;

    /// Sign a transaction payload, returning the compact `r || s` signature.
    fn sign(
        &mut self,
        path: &DerivationPath,
        payload: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, DeviceError>> + Send;
}

/// Opens transports to a device.
pub trait DeviceConnector: Send {
    type Transport: DeviceTransport;

    fn open(&self) -> impl Future<Output = Result<Self::Transport, DeviceError>> + Send;
}

/// Lifecycle state tag of a [`DeviceSigner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum DeviceStatus {
    Uninitialized,
    Connecting,
    Ready,
    Error,
}

enum DeviceState<T> {
    Uninitialized,
    Connecting,
    Ready { transport: T, key: DeviceKey },
    Error { reason: String },
}

impl<T> DeviceState<T> {
    fn status(&self) -> DeviceStatus {
        match self {
            DeviceState::Uninitialized => DeviceStatus::Uninitialized,
            DeviceState::Connecting => DeviceStatus::Connecting,
            DeviceState::Ready { .. } => DeviceStatus::Ready,
            DeviceState::Error { .. } => DeviceStatus::Error,
        }
    }
}

/// Signer backed by a hardware device reached through `C`.
pub struct DeviceSigner<C: DeviceConnector> {
    connector: C,
    path: DerivationPath,
    state: DeviceState<C::Transport>,
}

impl<C: DeviceConnector> DeviceSigner<C> {
    pub fn new(connector: C, path: DerivationPath) -> Self {
        Self {
            connector,
            path,
            state: DeviceState::Uninitialized,
        }
    }

    pub fn status(&self) -> DeviceStatus {
        self.state.status()
    }

    pub fn path(&self) -> &DerivationPath {
        &self.path
    }

    /// Reason of the last failed connection attempt, if the signer is in the error state.
    pub fn last_error(&self) -> Option<&str> {
        match &self.state {
            DeviceState::Error { reason } => Some(reason),
            _ => None,
        }
    }

    /// Connect to the device and derive the public key, unless already connected.
    pub async fn init(&mut self) -> Result<&DeviceKey, DeviceError> {
        self.ensure_ready().await?;
        self.ready().map(|(_, key)| key)
    }

    pub async fn device_key(&mut self) -> Result<DeviceKey, DeviceError> {
        self.init().await.cloned()
    }

    /// Sign `payload` on the device and bind the result to the device's public key.
    pub async fn sign_payload(
        &mut self,
        payload: &[u8],
    ) -> Result<SerializedSignature, DeviceError> {
        self.ensure_ready().await?;

        let path = self.path.clone();
        let (transport, key) = self.ready()?;
        let scheme = transport.scheme();
        let public_key = reconstruct_public_key(scheme, key)?;

        let signature = match transport.sign(&path, payload).await {
            Ok(signature) => signature,
            Err(err) => {
                if err.is_connectivity() {
                    self.transition(DeviceState::Error {
                        reason: err.to_string(),
                    })?;
                }
                return Err(err);
            }
        };

        SerializedSignature::new(scheme, signature, public_key)
            .map_err(|e| DeviceError::InvalidResponse(e.to_string()))
    }

    /// Release the device connection. The next operation reconnects.
    pub fn close(&mut self) -> Result<(), DeviceError> {
        match self.status() {
            DeviceStatus::Uninitialized => Ok(()),
            _ => self.transition(DeviceState::Uninitialized),
        }
    }

    /// Drive the lifecycle to `Ready`, connecting if needed.
    async fn ensure_ready(&mut self) -> Result<(), DeviceError> {
        match self.status() {
            DeviceStatus::Ready => return Ok(()),
            // A previous connection attempt was abandoned midway.
            DeviceStatus::Connecting => self.transition(DeviceState::Error {
                reason: "connection attempt was interrupted".to_string(),
            })?,
            DeviceStatus::Uninitialized | DeviceStatus::Error => {}
        }

        self.transition(DeviceState::Connecting)?;
        tracing::debug!(path = %self.path, "Connecting to signing device...");

        match self.connect().await {
            Ok((transport, key)) => {
                tracing::info!(address = %key.address, path = %self.path, "Signing device ready");
                self.transition(DeviceState::Ready { transport, key })
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to connect to signing device");
                self.transition(DeviceState::Error {
                    reason: err.to_string(),
                })?;
                Err(err)
            }
        }
    }

    async fn connect(&self) -> Result<(C::Transport, DeviceKey), DeviceError> {
        let mut transport = self.connector.open().await?;
        let key = transport.public_key(&self.path).await?;

        let derived = address_from_public_key(&key.public_key)
            .map_err(|e| DeviceError::InvalidResponse(e.to_string()))?;
        if derived != key.address {
            return Err(DeviceError::InvalidResponse(format!(
                "device reported address {} but its public key derives {}",
                key.address, derived
            )));
        }

        Ok((transport, key))
    }

    fn ready(&mut self) -> Result<(&mut C::Transport, &DeviceKey), DeviceError> {
        let status = self.status();
        match &mut self.state {
            DeviceState::Ready { transport, key } => Ok((transport, &*key)),
            _ => Err(DeviceError::InvalidTransition {
                from: status,
                to: DeviceStatus::Ready,
            }),
        }
    }

    /// Apply a state change, rejecting edges outside the device lifecycle.
    fn transition(&mut self, next: DeviceState<C::Transport>) -> Result<(), DeviceError> {
        use DeviceStatus::*;

        let from = self.status();
        let to = next.status();
        let allowed = matches!(
            (from, to),
            (Uninitialized, Connecting)
                | (Error, Connecting)
                | (Connecting, Ready)
                | (Connecting, Error)
                | (Ready, Error)
                | (Ready, Uninitialized)
                | (Error, Uninitialized)
        );

        if !allowed {
            return Err(DeviceError::InvalidTransition { from, to });
        }

        tracing::trace!(%from, %to, "Device state transition");
        self.state = next;
        Ok(())
    }
}

/// Rebuild the public key in the form the serialized signature carries for `scheme`.
fn reconstruct_public_key(
    scheme: SignatureScheme,
    key: &DeviceKey,
) -> Result<Vec<u8>, DeviceError> {
    match scheme {
        SignatureScheme::Secp256k1 => {
            let verifying_key = VerifyingKey::from_sec1_bytes(&key.public_key)
                .map_err(|e| DeviceError::InvalidResponse(format!("invalid public key: {}", e)))?;
            Ok(verifying_key.to_encoded_point(true).as_bytes().to_vec())
        }
        SignatureScheme::Ed25519 => {
            if key.public_key.len() != scheme.public_key_len() {
                return Err(DeviceError::InvalidResponse(format!(
                    "ed25519 public key must be 32 bytes, got {}",
                    key.public_key.len()
                )));
            }
            Ok(key.public_key.clone())
        }
    }
}

impl<C: DeviceConnector> fmt::Debug for DeviceSigner<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSigner")
            .field("path", &self.path.to_string())
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl<C: DeviceConnector> TxSigner for DeviceSigner<C>
where
    C: Sync,
    C::Transport: Sync,
{
    async fn address(&mut self) -> Result<Address> {
        Ok(self.init().await?.address)
    }

    async fn sign(&mut self, payload: &[u8]) -> Result<SerializedSignature> {
        Ok(self.sign_payload(payload).await?)
    }
}
