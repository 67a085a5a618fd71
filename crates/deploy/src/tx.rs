//! Contract-creation transactions: legacy EIP-155 and EIP-1559 (type 2).

use alloy_core::primitives::{B256, Bytes, keccak256};
use anyhow::{Context, Result};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

use crate::config::GasOptions;
use crate::rlp::RlpList;
use crate::signer::{SerializedSignature, SignatureScheme};

const EIP1559_TX_TYPE: u8 = 0x02;

/// How the deployment transaction pays for gas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fees {
    Legacy {
        gas_price: u128,
    },
    Eip1559 {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
}

impl Fees {
    /// Fees fixed by the operator's gas options, or `None` when the node prices the
    /// transaction.
    ///
    /// Fails on any field that cannot be honored, so an override is never dropped.
    pub fn from_gas_options(options: &GasOptions) -> Result<Option<Self>> {
        if !options.extra.is_empty() {
            let fields: Vec<&str> = options.extra.keys().map(String::as_str).collect();
            anyhow::bail!("Unsupported gas options: {}", fields.join(", "));
        }

        let fees = match (
            options.gas_price,
            options.max_fee_per_gas,
            options.max_priority_fee_per_gas,
        ) {
            (None, None, None) => None,
            (Some(gas_price), None, None) => Some(Fees::Legacy {
                gas_price: u128::from(gas_price),
            }),
            (Some(_), _, _) => anyhow::bail!(
                "gasPrice cannot be combined with maxFeePerGas or maxPriorityFeePerGas"
            ),
            (None, None, Some(_)) => anyhow::bail!("maxPriorityFeePerGas requires maxFeePerGas"),
            (None, Some(max_fee), priority_fee) => {
                // Without a tip cap the fee cap bounds the whole price, like a legacy gasPrice.
                let priority_fee = priority_fee.unwrap_or(max_fee);
                if priority_fee > max_fee {
                    anyhow::bail!(
                        "maxPriorityFeePerGas ({}) exceeds maxFeePerGas ({})",
                        priority_fee,
                        max_fee
                    );
                }
                Some(Fees::Eip1559 {
                    max_fee_per_gas: u128::from(max_fee),
                    max_priority_fee_per_gas: u128::from(priority_fee),
                })
            }
        };

        Ok(fees)
    }
}

/// The single transaction this tool ever builds: a contract creation with no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployTransaction {
    pub nonce: u64,
    pub fees: Fees,
    pub gas_limit: u64,
    pub init_code: Bytes,
    pub chain_id: u64,
}

impl DeployTransaction {
    fn fields(&self) -> RlpList {
        match self.fees {
            Fees::Legacy { gas_price } => RlpList::new()
                .uint(self.nonce)
                .uint(gas_price)
                .uint(self.gas_limit)
                // Empty recipient marks a contract creation.
                .bytes(&[])
                .uint(0u8)
                .bytes(&self.init_code),
            Fees::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => RlpList::new()
                .uint(self.chain_id)
                .uint(self.nonce)
                .uint(max_priority_fee_per_gas)
                .uint(max_fee_per_gas)
                .uint(self.gas_limit)
                .bytes(&[])
                .uint(0u8)
                .bytes(&self.init_code)
                .empty_list(),
        }
    }

    /// Bytes whose keccak256 digest is signed.
    ///
    /// Legacy: `rlp([nonce, gasPrice, gasLimit, "", 0, initcode, chainId, 0, 0])`.
    /// EIP-1559: `0x02 || rlp([chainId, nonce, tip, feeCap, gasLimit, "", 0, initcode, []])`.
    pub fn signing_payload(&self) -> Vec<u8> {
        match self.fees {
            Fees::Legacy { .. } => self.fields().uint(self.chain_id).uint(0u8).uint(0u8).finish(),
            Fees::Eip1559 { .. } => typed(self.fields().finish()),
        }
    }

    pub fn signing_hash(&self) -> B256 {
        keccak256(self.signing_payload())
    }

    /// Recover the y-parity of `signature` by matching the recovered key against the
    /// public key the signature carries.
    pub fn recovery_parity(&self, signature: &SerializedSignature) -> Result<(Signature, u8)> {
        if signature.scheme() != SignatureScheme::Secp256k1 {
            anyhow::bail!(
                "{} signatures cannot sign EVM transactions",
                signature.scheme()
            );
        }

        let expected = VerifyingKey::from_sec1_bytes(signature.public_key())
            .context("Signature carries an invalid secp256k1 public key")?;
        let compact = Signature::from_slice(signature.signature())
            .context("Signature is not a valid secp256k1 signature")?;
        // Transactions with high-s signatures are rejected by nodes.
        let compact = compact.normalize_s().unwrap_or(compact);

        let hash = self.signing_hash();
        for parity in [0u8, 1] {
            let Some(recovery_id) = RecoveryId::from_byte(parity) else {
                continue;
            };
            match VerifyingKey::recover_from_prehash(hash.as_slice(), &compact, recovery_id) {
                Ok(recovered) if recovered == expected => return Ok((compact, parity)),
                _ => continue,
            }
        }

        anyhow::bail!("Signature does not match the signer's public key")
    }

    /// Attach `signature` and return the raw transaction ready for broadcast.
    pub fn into_signed(self, signature: &SerializedSignature) -> Result<Bytes> {
        let (compact, parity) = self.recovery_parity(signature)?;
        let (r, s) = compact.split_bytes();

        let raw = match self.fees {
            Fees::Legacy { .. } => {
                let v = u128::from(parity) + 35 + 2 * u128::from(self.chain_id);
                self.fields().uint(v).uint_be(&r).uint_be(&s).finish()
            }
            Fees::Eip1559 { .. } => {
                typed(self.fields().uint(parity).uint_be(&r).uint_be(&s).finish())
            }
        };
        Ok(Bytes::from(raw))
    }
}

fn typed(list: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + list.len());
    out.push(EIP1559_TX_TYPE);
    out.extend_from_slice(&list);
    out
}
