// src/services/token.rs
//! Compact token encoding for signed credentials.
//!
//! A token is three base64url (unpadded) segments joined by `.`:
//! the canonical JSON header, the canonical JSON payload, and the raw
//! signature bytes. The signature covers exactly `header.payload`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{VcError, VcResult};
use crate::utils::serialization::canonicalize;

/// Token type declared in every header.
pub const TOKEN_TYPE: &str = "JWT";

/// Signature algorithms a token header may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JwsAlgorithm {
    /// secp256k1 ECDSA over SHA-256 with a trailing recovery id (65 bytes)
    #[serde(rename = "ES256K-R")]
    Es256kR,
    /// secp256k1 ECDSA over SHA-256, `r ‖ s` only (64 bytes)
    #[serde(rename = "ES256K")]
    Es256k,
}

/// The header segment of a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: JwsAlgorithm,
    pub typ: String,
}

/// A token split back into its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken<P> {
    pub header: TokenHeader,
    pub payload: P,
    pub signature: Vec<u8>,
    signing_input: String,
}

impl TokenHeader {
    /// Header for the given algorithm.
    pub fn new(alg: JwsAlgorithm) -> Self {
        Self {
            alg,
            typ: TOKEN_TYPE.to_string(),
        }
    }
}

impl Default for TokenHeader {
    fn default() -> Self {
        Self::new(JwsAlgorithm::Es256kR)
    }
}

impl<P> DecodedToken<P> {
    /// The exact bytes the signature covers: the received header and payload
    /// segments joined by `.`.
    pub fn signing_input(&self) -> &[u8] {
        self.signing_input.as_bytes()
    }
}

fn encode_segment(bytes: &[u8]) -> String {
    base64::encode_config(bytes, base64::URL_SAFE_NO_PAD)
}

fn decode_segment(segment: &str, name: &str) -> VcResult<Vec<u8>> {
    base64::decode_config(segment, base64::URL_SAFE_NO_PAD)
        .map_err(|e| VcError::MalformedToken(format!("{} is not base64url: {}", name, e)))
}

/// Builds the signing input `b64(canonical header) . b64(canonical payload)`.
pub fn signing_input<P: Serialize>(header: &TokenHeader, payload: &P) -> VcResult<String> {
    Ok(format!(
        "{}.{}",
        encode_segment(&canonicalize(header)?),
        encode_segment(&canonicalize(payload)?)
    ))
}

/// Encodes header, payload and signature into a token string.
pub fn encode<P: Serialize>(header: &TokenHeader, payload: &P, signature: &[u8]) -> VcResult<String> {
    let input = signing_input(header, payload)?;
    Ok(format!("{}.{}", input, encode_segment(signature)))
}

/// Decodes a token string.
///
/// # Errors
/// Returns [`VcError::MalformedToken`] unless the token has exactly three
/// segments, each valid base64url, with header and payload parsing as JSON of
/// the expected shape and a header `typ` of `JWT`.
pub fn decode<P: DeserializeOwned>(token: &str) -> VcResult<DecodedToken<P>> {
    let token = token.trim();
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(VcError::MalformedToken(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    }

    let header_bytes = decode_segment(segments[0], "header")?;
    let payload_bytes = decode_segment(segments[1], "payload")?;
    let signature = decode_segment(segments[2], "signature")?;

    let header: TokenHeader = serde_json::from_slice(&header_bytes)
        .map_err(|e| VcError::MalformedToken(format!("header is not valid JSON: {}", e)))?;
    if header.typ != TOKEN_TYPE {
        return Err(VcError::MalformedToken(format!(
            "unsupported token type {}",
            header.typ
        )));
    }

    let payload: P = serde_json::from_slice(&payload_bytes)
        .map_err(|e| VcError::MalformedToken(format!("payload is not valid JSON: {}", e)))?;

    Ok(DecodedToken {
        header,
        payload,
        signature,
        signing_input: format!("{}.{}", segments[0], segments[1]),
    })
}
