// src/wallet/key_management.rs
//! Issuer key management and recoverable ECDSA signatures.
//!
//! Provides signing with the issuer's secp256k1 key and recovery of a signer's
//! address from a signature and the signed digest. Recovery lets a verifier
//! learn who signed a credential without looking up a public key first.
//!
//! Uses the following cryptographic primitives:
//! - secp256k1 curve (via `k256` crate), deterministic RFC 6979 nonces
//! - Keccak-256 for address derivation (via `ethers` crate)

use ethers::utils::hex;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use std::fmt;

use crate::error::{VcError, VcResult};
use crate::utils::crypto::{address_of, personal_message_hash, sha256};

/// The issuer's signing key together with its derived address.
///
/// Read-only once loaded; shared by every issuance call.
#[derive(Clone)]
pub struct IssuerKey {
    /// Secret scalar (never exposed or logged)
    signing_key: SigningKey,
    /// Checksummed address derived from the public key
    address: String,
}

/// An ECDSA signature as r ‖ s plus the recovery id, when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoverableSignature {
    r_s: [u8; 64],
    recovery_id: Option<u8>,
}

impl IssuerKey {
    /// Loads an issuer key from a hex-encoded 32-byte scalar, with or without a
    /// `0x` prefix.
    ///
    /// # Errors
    /// Returns [`VcError::Key`] if the key is empty, not hex, not 32 bytes, zero,
    /// or not below the curve order.
    pub fn from_hex(private_key: &str) -> VcResult<Self> {
        let trimmed = private_key.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(VcError::Key("private key is empty".into()));
        }

        let bytes = hex::decode(trimmed)
            .map_err(|e| VcError::Key(format!("private key is not hex: {}", e)))?;
        if bytes.len() != 32 {
            return Err(VcError::Key(format!(
                "private key must be 32 bytes, got {}",
                bytes.len()
            )));
        }

        let signing_key = SigningKey::from_slice(&bytes)
            .map_err(|_| VcError::Key("private key is zero or out of range".into()))?;
        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = address_of(signing_key.verifying_key());
        Self {
            signing_key,
            address,
        }
    }

    /// The checksummed address of this key.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The issuer DID bound to this key: `did:<method>:<address>`.
    ///
    /// The same key always yields the same DID.
    pub fn did(&self, method: &str) -> String {
        format!("did:{}:{}", method, self.address)
    }

    /// Signs a 32-byte digest.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> VcResult<RecoverableSignature> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|e| VcError::Key(format!("signing failed: {}", e)))?;

        let mut r_s = [0u8; 64];
        r_s.copy_from_slice(&signature.to_bytes());
        Ok(RecoverableSignature {
            r_s,
            recovery_id: Some(recovery_id.to_byte()),
        })
    }

    /// Signs a token signing input (SHA-256 digest).
    pub fn sign_token_input(&self, signing_input: &[u8]) -> VcResult<RecoverableSignature> {
        self.sign_digest(&sha256(signing_input))
    }

    /// Signs a message the way wallets do for `personal_sign`.
    pub fn sign_personal_message(&self, message: &[u8]) -> VcResult<RecoverableSignature> {
        self.sign_digest(&personal_message_hash(message))
    }
}

impl fmt::Debug for IssuerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuerKey")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl RecoverableSignature {
    /// Parses a raw signature: 65 bytes `r ‖ s ‖ v` or 64 bytes `r ‖ s`.
    ///
    /// `v` may be a bare recovery id (0, 1) or the wallet form (27, 28).
    pub fn from_bytes(bytes: &[u8]) -> VcResult<Self> {
        let mut r_s = [0u8; 64];
        match bytes.len() {
            64 => {
                r_s.copy_from_slice(bytes);
                Ok(Self {
                    r_s,
                    recovery_id: None,
                })
            }
            65 => {
                r_s.copy_from_slice(&bytes[..64]);
                let recovery_id = match bytes[64] {
                    v @ (0 | 1) => v,
                    v @ (27 | 28) => v - 27,
                    v => {
                        return Err(VcError::Encoding(format!(
                            "unsupported signature recovery byte {}",
                            v
                        )))
                    }
                };
                Ok(Self {
                    r_s,
                    recovery_id: Some(recovery_id),
                })
            }
            len => Err(VcError::Encoding(format!(
                "signature must be 64 or 65 bytes, got {}",
                len
            ))),
        }
    }

    /// Parses a `0x`-prefixed (or bare) hex signature.
    pub fn from_hex(signature: &str) -> VcResult<Self> {
        let trimmed = signature.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(trimmed)
            .map_err(|e| VcError::Encoding(format!("signature is not hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Raw bytes: `r ‖ s ‖ recovery id`, or `r ‖ s` when the id is unknown.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.r_s.to_vec();
        if let Some(recovery_id) = self.recovery_id {
            bytes.push(recovery_id);
        }
        bytes
    }

    /// Wallet-style hex form: `0x` + r ‖ s ‖ (27 + recovery id).
    #[cfg(test)]
    pub fn to_hex(&self) -> String {
        let mut bytes = self.r_s.to_vec();
        if let Some(recovery_id) = self.recovery_id {
            bytes.push(27 + recovery_id);
        }
        format!("0x{}", hex::encode(bytes))
    }

    /// Addresses that this signature over `digest` recovers to.
    ///
    /// With a known recovery id there is at most one. Without one, both
    /// candidate ids are tried and every successful recovery is returned, so
    /// the caller must compare against an expected signer. An empty result
    /// means the signature is not a valid point on the curve for this digest.
    pub fn recover_addresses(&self, digest: &[u8; 32]) -> Vec<String> {
        let signature = match Signature::from_slice(&self.r_s) {
            Ok(signature) => signature,
            Err(_) => return Vec::new(),
        };

        let candidates: Vec<u8> = match self.recovery_id {
            Some(id) => vec![id],
            None => vec![0, 1],
        };

        candidates
            .into_iter()
            .filter_map(RecoveryId::from_byte)
            .filter_map(|id| VerifyingKey::recover_from_prehash(digest, &signature, id).ok())
            .map(|key| address_of(&key))
            .collect()
    }

    /// The single address this signature recovers to, when the recovery id is
    /// known and recovery succeeds.
    pub fn recover_address(&self, digest: &[u8; 32]) -> Option<String> {
        self.recovery_id?;
        self.recover_addresses(digest).into_iter().next()
    }
}
