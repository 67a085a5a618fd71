//! In-memory private key signer.

use std::fmt;

use alloy_core::primitives::{Address, B256, keccak256};
use alloy_signer_local::PrivateKeySigner;
use anyhow::{Context, Result};

use super::{SerializedSignature, SignatureScheme, TxSigner};

/// Signs with a secp256k1 key held in memory. No operation performs I/O.
#[derive(Clone)]
pub struct LocalKeySigner {
    inner: PrivateKeySigner,
}

impl LocalKeySigner {
    /// Create a signer from a hex private key (with or without 0x prefix).
    pub fn from_private_key(private_key_hex: &str) -> Result<Self> {
        let private_key_hex = private_key_hex
            .trim()
            .strip_prefix("0x")
            .unwrap_or(private_key_hex.trim());

        let bytes: [u8; 32] = hex::decode(private_key_hex)
            .context("Private key is not valid hex")?
            .try_into()
            .map_err(|_| anyhow::anyhow!("Private key must be exactly 32 bytes"))?;

        let inner = PrivateKeySigner::from_bytes(&B256::from(bytes))
            .map_err(|e| anyhow::anyhow!("Invalid secp256k1 private key: {}", e))?;

        Ok(Self { inner })
    }

    pub fn signer_address(&self) -> Address {
        self.inner.address()
    }

    /// Compressed SEC1 public key (33 bytes).
    pub fn public_key(&self) -> Vec<u8> {
        self.inner
            .credential()
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    /// Sign `keccak256(payload)`, returning the compact `r || s` signature.
    pub fn sign_payload(&self, payload: &[u8]) -> Result<SerializedSignature> {
        let digest = keccak256(payload);
        let (signature, _recovery_id) = self
            .inner
            .credential()
            .sign_prehash_recoverable(digest.as_slice())
            .map_err(|e| anyhow::anyhow!("Failed to sign payload: {}", e))?;

        SerializedSignature::new(
            SignatureScheme::Secp256k1,
            signature.to_bytes().to_vec(),
            self.public_key(),
        )
    }
}

impl fmt::Debug for LocalKeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalKeySigner")
            .field("address", &self.signer_address())
            .finish_non_exhaustive()
    }
}

impl TxSigner for LocalKeySigner {
    async fn address(&mut self) -> Result<Address> {
        Ok(self.signer_address())
    }

    async fn sign(&mut self, payload: &[u8]) -> Result<SerializedSignature> {
        self.sign_payload(payload)
    }
}
