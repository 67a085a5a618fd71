//! Contract creation address prediction.

use alloy_core::primitives::{Address, keccak256};

use crate::rlp::RlpList;

/// Compute the address of a contract created by `sender` with transaction number `nonce`.
///
/// This is the low-order 20 bytes of `keccak256(rlp([sender, nonce]))`. A zero nonce is
/// encoded as the empty string, never as a single zero byte.
pub fn deterministic_address(sender: Address, nonce: u64) -> Address {
    let encoded = RlpList::new()
        .bytes(sender.as_slice())
        .uint(nonce)
        .finish();

    Address::from_slice(&keccak256(encoded)[12..])
}

/// Derive an account address from an uncompressed secp256k1 public key.
///
/// Accepts the 65-byte SEC1 form (with the `0x04` marker) or the raw 64-byte point.
pub fn address_from_public_key(public_key: &[u8]) -> anyhow::Result<Address> {
    let point = match public_key {
        [0x04, rest @ ..] if rest.len() == 64 => rest,
        raw if raw.len() == 64 => raw,
        other => anyhow::bail!(
            "Expected an uncompressed secp256k1 public key, got {} bytes",
            other.len()
        ),
    };

    Ok(Address::from_slice(&keccak256(point)[12..]))
}
