// src/models/did.rs
//! Decentralized Identifier (DID) data model implementation.
//!
//! Defines DID parsing, the subset of a W3C DID Document needed to find an
//! issuer's verification key, and the verification material a resolver hands
//! back to the verifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{VcError, VcResult};
use crate::utils::crypto::address_from_sec1;

/// A parsed DID of the form `did:<method>:<method-specific-id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Did {
    method: String,
    method_specific_id: String,
}

/// Key material a DID resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationMaterial {
    /// A blockchain-style address (`0x` + 40 hex characters)
    Address(String),
    /// A SEC1-encoded secp256k1 public key
    PublicKey(Vec<u8>),
}

/// The parts of a DID Document used for verification.
///
/// Follows the [DID Core Specification](https://www.w3.org/TR/did-core/); fields
/// other than the verification methods are ignored.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    /// The DID the document describes
    pub id: String,

    /// Verification methods, in document order
    #[serde(default)]
    pub verification_method: Vec<VerificationMethod>,
}

/// One verification method entry of a DID Document.
///
/// Only the key representations used by `did:ethr` documents are read.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    pub id: String,

    #[serde(rename = "type", default)]
    pub method_type: String,

    /// CAIP-10 account id, e.g. `eip155:1:0xabc...`
    #[serde(default)]
    pub blockchain_account_id: Option<String>,

    /// Legacy plain address form
    #[serde(default)]
    pub ethereum_address: Option<String>,

    /// Hex-encoded SEC1 public key
    #[serde(default)]
    pub public_key_hex: Option<String>,
}

impl Did {
    /// The DID method name, e.g. `ethr`.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The last `:`-separated segment of the method-specific id. For address
    /// based methods (`did:ethr:0x..`, `did:ethr:goerli:0x..`) this is the address.
    pub fn address_suffix(&self) -> &str {
        self.method_specific_id
            .rsplit(':')
            .next()
            .unwrap_or(&self.method_specific_id)
    }
}

impl FromStr for Did {
    type Err = VcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("did"), Some(method), Some(rest)) if !method.is_empty() && !rest.is_empty() => {
                Ok(Did {
                    method: method.to_string(),
                    method_specific_id: rest.to_string(),
                })
            }
            _ => Err(VcError::unresolvable(s, "not a did:<method>:<id> identifier")),
        }
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "did:{}:{}", self.method, self.method_specific_id)
    }
}

impl VerificationMaterial {
    /// Whether `address` is the address of this material, compared
    /// case-insensitively.
    pub fn matches_address(&self, address: &str) -> bool {
        match self {
            VerificationMaterial::Address(expected) => expected.eq_ignore_ascii_case(address),
            VerificationMaterial::PublicKey(bytes) => address_from_sec1(bytes)
                .map(|expected| expected.eq_ignore_ascii_case(address))
                .unwrap_or(false),
        }
    }
}

impl DidDocument {
    /// Collects the verification material of every method the document lists.
    /// Methods carrying no recognised key representation are skipped.
    pub fn verification_material(&self) -> VcResult<Vec<VerificationMaterial>> {
        let mut material = Vec::new();
        for method in &self.verification_method {
            if let Some(account) = &method.blockchain_account_id {
                let address = account.rsplit(':').next().unwrap_or(account);
                material.push(VerificationMaterial::Address(address.to_string()));
            } else if let Some(address) = &method.ethereum_address {
                material.push(VerificationMaterial::Address(address.clone()));
            } else if let Some(key_hex) = &method.public_key_hex {
                let bytes = ethers::utils::hex::decode(key_hex.trim_start_matches("0x"))
                    .map_err(|e| VcError::unresolvable(&self.id, format!("bad publicKeyHex: {}", e)))?;
                material.push(VerificationMaterial::PublicKey(bytes));
            }
        }
        Ok(material)
    }
}
