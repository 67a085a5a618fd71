//! Signing capability shared by the in-memory key signer and the hardware device signer.
//!
//! Both variants implement [`TxSigner`]. The orchestrator only sees the trait (or the
//! [`SignerHandle`] tagged union when the variant is picked at runtime), so the device
//! connection lifecycle stays inside [`DeviceSigner`].

mod device;
mod ledger;
mod local;

use std::future::Future;

use alloy_core::primitives::{Address, Bytes};
use anyhow::Result;
use base64::{Engine, engine::general_purpose::STANDARD};

pub use device::{
    DEFAULT_DERIVATION_PATH, DerivationPath, DeviceConnector, DeviceError, DeviceKey,
    DeviceSigner, DeviceStatus, DeviceTransport,
};
pub use ledger::{DEFAULT_SPECULOS_URL, LedgerConnector, LedgerTransport};
pub use local::LocalKeySigner;

/// Signature schemes a serialized signature can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum SignatureScheme {
    Ed25519,
    Secp256k1,
}

impl SignatureScheme {
    /// Flag byte prefixed to the serialized signature.
    pub const fn flag(&self) -> u8 {
        match self {
            SignatureScheme::Ed25519 => 0x00,
            SignatureScheme::Secp256k1 => 0x01,
        }
    }

    pub const fn signature_len(&self) -> usize {
        64
    }

    pub const fn public_key_len(&self) -> usize {
        match self {
            SignatureScheme::Ed25519 => 32,
            SignatureScheme::Secp256k1 => 33,
        }
    }
}

/// A signature bound to its scheme and the public key that produced it.
///
/// Serialized as `flag || signature || public_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedSignature {
    scheme: SignatureScheme,
    signature: Bytes,
    public_key: Bytes,
}

impl SerializedSignature {
    pub fn new(
        scheme: SignatureScheme,
        signature: impl Into<Bytes>,
        public_key: impl Into<Bytes>,
    ) -> Result<Self> {
        let signature = signature.into();
        let public_key = public_key.into();

        if signature.len() != scheme.signature_len() {
            anyhow::bail!(
                "{} signature must be {} bytes, got {}",
                scheme,
                scheme.signature_len(),
                signature.len()
            );
        }
        if public_key.len() != scheme.public_key_len() {
            anyhow::bail!(
                "{} public key must be {} bytes, got {}",
                scheme,
                scheme.public_key_len(),
                public_key.len()
            );
        }

        Ok(Self {
            scheme,
            signature,
            public_key,
        })
    }

    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    pub fn signature(&self) -> &Bytes {
        &self.signature
    }

    pub fn public_key(&self) -> &Bytes {
        &self.public_key
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.signature.len() + self.public_key.len());
        out.push(self.scheme.flag());
        out.extend_from_slice(&self.signature);
        out.extend_from_slice(&self.public_key);
        out
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }
}

/// Capability to derive the signing address and sign transaction payloads.
///
/// Methods take `&mut self`: a signer is never used by two callers at once.
pub trait TxSigner: Send {
    fn address(&mut self) -> impl Future<Output = Result<Address>> + Send;

    /// Sign an unsigned transaction payload.
    fn sign(&mut self, payload: &[u8]) -> impl Future<Output = Result<SerializedSignature>> + Send;
}

/// The signer selected for a batch run.
#[derive(Debug)]
pub enum SignerHandle {
    Local(LocalKeySigner),
    Device(DeviceSigner<LedgerConnector>),
}

impl TxSigner for SignerHandle {
    async fn address(&mut self) -> Result<Address> {
        match self {
            SignerHandle::Local(signer) => signer.address().await,
            SignerHandle::Device(signer) => signer.address().await,
        }
    }

    async fn sign(&mut self, payload: &[u8]) -> Result<SerializedSignature> {
        match self {
            SignerHandle::Local(signer) => signer.sign(payload).await,
            SignerHandle::Device(signer) => signer.sign(payload).await,
        }
    }
}
