//! Ledger Ethereum app transport.
//!
//! APDUs are exchanged over the HTTP interface exposed by Speculos and by the Ledger
//! bridge: `POST /apdu` with `{"data": "<hex>"}`, answered by `{"data": "<hex>"}` where
//! the last two bytes are the status word.

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};

use super::SignatureScheme;
use super::device::{DerivationPath, DeviceConnector, DeviceError, DeviceKey, DeviceTransport};

/// Default endpoint of a local Speculos emulator.
pub const DEFAULT_SPECULOS_URL: &str = "http://127.0.0.1:5000";

const CLA: u8 = 0xe0;
const INS_GET_PUBLIC_KEY: u8 = 0x02;
const INS_SIGN: u8 = 0x04;
const INS_GET_APP_CONFIGURATION: u8 = 0x06;

const P1_FIRST_CHUNK: u8 = 0x00;
const P1_MORE_CHUNKS: u8 = 0x80;

/// Maximum data length of a single APDU.
const MAX_CHUNK_LEN: usize = 255;

#[derive(Serialize)]
struct ApduRequest {
    data: String,
}

#[derive(Deserialize)]
struct ApduResponse {
    data: String,
}

/// Opens connections to a Ledger reachable at an HTTP APDU endpoint.
#[derive(Debug, Clone)]
pub struct LedgerConnector {
    client: reqwest::Client,
    url: String,
}

impl LedgerConnector {
    pub fn new(url: &str) -> anyhow::Result<Self> {
        let url = url::Url::parse(url)
            .map_err(|e| anyhow::anyhow!("Invalid Ledger URL '{}': {}", url, e))?;
        Ok(Self {
            client: crate::rpc::create_client()?,
            url: url.join("apdu")?.to_string(),
        })
    }
}

impl DeviceConnector for LedgerConnector {
    type Transport = LedgerTransport;

    async fn open(&self) -> Result<LedgerTransport, DeviceError> {
        let mut transport = LedgerTransport {
            client: self.client.clone(),
            url: self.url.clone(),
        };

        // Fails with AppNotOpen when the dashboard or another app is in front.
        let config = transport
            .exchange(&build_apdu(INS_GET_APP_CONFIGURATION, 0x00, 0x00, &[]))
            .await?;
        if let [_flags, major, minor, patch, ..] = config.as_slice() {
            let version = format!("{}.{}.{}", major, minor, patch);
            tracing::debug!(version = %version, "Ledger Ethereum app detected");
        }

        Ok(transport)
    }
}

/// An open APDU channel to the Ledger Ethereum app.
#[derive(Debug)]
pub struct LedgerTransport {
    client: reqwest::Client,
    url: String,
}

impl LedgerTransport {
    /// Send one APDU and return the response data with the status word stripped.
    async fn exchange(&mut self, apdu: &[u8]) -> Result<Vec<u8>, DeviceError> {
        tracing::trace!(apdu = %hex::encode(apdu), "=> Ledger");

        let response = self
            .client
            .post(&self.url)
            .json(&ApduRequest {
                data: hex::encode(apdu),
            })
            .send()
            .await
            .map_err(|e| DeviceError::Unavailable {
                reason: e.to_string(),
            })?;

        let response: ApduResponse = response
            .json()
            .await
            .map_err(|e| DeviceError::Transport(format!("malformed APDU response: {}", e)))?;

        let raw = hex::decode(response.data.trim_start_matches("0x"))
            .map_err(|e| DeviceError::InvalidResponse(format!("response is not hex: {}", e)))?;

        tracing::trace!(response = %hex::encode(&raw), "<= Ledger");
        split_status_word(raw)
    }
}

impl DeviceTransport for LedgerTransport {
    fn scheme(&self) -> SignatureScheme {
        SignatureScheme::Secp256k1
    }

    async fn public_key(&mut self, path: &DerivationPath) -> Result<DeviceKey, DeviceError> {
        let response = self
            .exchange(&build_apdu(
                INS_GET_PUBLIC_KEY,
                0x00,
                0x00,
                &path.to_bytes(),
            ))
            .await?;
        parse_public_key_response(&response)
    }

    async fn sign(
        &mut self,
        path: &DerivationPath,
        payload: &[u8],
    ) -> Result<Vec<u8>, DeviceError> {
        let mut response = Vec::new();
        for apdu in sign_apdus(path, payload) {
            response = self.exchange(&apdu).await?;
        }
        parse_signature_response(&response)
    }
}

fn build_apdu(ins: u8, p1: u8, p2: u8, data: &[u8]) -> Vec<u8> {
    let mut apdu = Vec::with_capacity(5 + data.len());
    apdu.extend_from_slice(&[CLA, ins, p1, p2, data.len() as u8]);
    apdu.extend_from_slice(data);
    apdu
}

/// Split the path-prefixed payload into sign APDUs of at most [`MAX_CHUNK_LEN`] bytes.
fn sign_apdus(path: &DerivationPath, payload: &[u8]) -> Vec<Vec<u8>> {
    let mut data = path.to_bytes();
    data.extend_from_slice(payload);

    data.chunks(MAX_CHUNK_LEN)
        .enumerate()
        .map(|(i, chunk)| {
            let p1 = if i == 0 { P1_FIRST_CHUNK } else { P1_MORE_CHUNKS };
            build_apdu(INS_SIGN, p1, 0x00, chunk)
        })
        .collect()
}

fn split_status_word(mut raw: Vec<u8>) -> Result<Vec<u8>, DeviceError> {
    if raw.len() < 2 {
        return Err(DeviceError::InvalidResponse(format!(
            "response too short ({} bytes)",
            raw.len()
        )));
    }

    let status = u16::from_be_bytes([raw[raw.len() - 2], raw[raw.len() - 1]]);
    raw.truncate(raw.len() - 2);

    match DeviceError::from_status_word(status) {
        None => Ok(raw),
        Some(err) => Err(err),
    }
}

/// Parse `pk_len || pk || addr_len || addr_ascii_hex [|| chain_code]`.
fn parse_public_key_response(data: &[u8]) -> Result<DeviceKey, DeviceError> {
    let invalid =
        |what: &str| DeviceError::InvalidResponse(format!("public key response: {}", what));

    let (&pk_len, rest) = data.split_first().ok_or_else(|| invalid("empty"))?;
    let pk_len = pk_len as usize;
    if rest.len() < pk_len + 1 {
        return Err(invalid("truncated public key"));
    }
    let (public_key, rest) = rest.split_at(pk_len);

    let (&addr_len, rest) = rest.split_first().ok_or_else(|| invalid("missing address"))?;
    let addr_len = addr_len as usize;
    if rest.len() < addr_len {
        return Err(invalid("truncated address"));
    }

    let address = std::str::from_utf8(&rest[..addr_len])
        .map_err(|_| invalid("address is not ascii"))?;
    let address: Address = format!("0x{}", address.trim_start_matches("0x"))
        .parse()
        .map_err(|_| invalid("address is not valid hex"))?;

    Ok(DeviceKey {
        public_key: public_key.to_vec(),
        address,
    })
}

/// Parse `v || r || s` into the compact `r || s` signature.
fn parse_signature_response(data: &[u8]) -> Result<Vec<u8>, DeviceError> {
    match data {
        [_v, rs @ ..] if rs.len() == 64 => Ok(rs.to_vec()),
        _ => Err(DeviceError::InvalidResponse(format!(
            "signature response must be 65 bytes, got {}",
            data.len()
        ))),
    }
}
