// src/services/verifier.rs
//! Credential verification service for the DID system.
//!
//! Two verification paths are offered:
//! - [`Verifier::verify_token`] for credentials in compact token form
//! - [`Verifier::verify_detached`] for a raw credential plus a wallet-style
//!   signature over its canonical JSON
//!
//! Both recover the signer's address from the signature alone. The token path
//! then asks the DID resolver which key the claimed issuer currently uses; the
//! detached path reads the expected address from the issuer DID itself.
//! The token path also requires the claim set to agree with the signed `iss`
//! and `sub` claims, and the current time to fall inside `nbf`..`exp`.
//! Every call reads the revocation registry afresh.

use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::did_resolver::DidResolver;
use crate::error::{VcError, VcResult};
use crate::models::credential::{ClaimMap, ClaimValue, CredentialPayload};
use crate::models::did::{Did, VerificationMaterial};
use crate::services::revocation::RevocationRegistry;
use crate::services::token::{self, DecodedToken, JwsAlgorithm};
use crate::utils::crypto::{personal_message_hash, sha256};
use crate::utils::serialization::canonicalize_claim;
use crate::wallet::key_management::RecoverableSignature;

/// Tolerated clock difference between issuer and verifier, in seconds.
const CLOCK_SKEW_SECS: i64 = 300;

/// Why a credential was judged invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum InvalidReason {
    /// The signature does not recover to the expected signer
    SignatureMismatch,
    /// The signature bytes could not be parsed
    MalformedSignature { message: String },
    /// The issuer DID could not be resolved (including timeouts)
    #[serde(rename = "UnresolvableDID")]
    UnresolvableDid { did: String, message: String },
    /// The credential names no issuer
    MissingIssuer,
    /// The issuer is not a DID ending in an address
    IssuerNotAddress { issuer: String },
    /// The claim set disagrees with the signed `iss` or `sub` claim
    ClaimsMismatch { field: String },
    /// The token's `nbf` is still in the future
    NotYetValid { nbf: i64 },
    /// The token's `exp` has passed
    Expired { exp: i64 },
}

/// Verdict for a token credential.
#[derive(Debug, Clone, Serialize)]
pub struct TokenVerification {
    pub valid: bool,
    pub revoked: bool,
    /// Address recovered from the signature
    pub signer: Option<String>,
    /// Issuer DID claimed by the token
    pub issuer: String,
    pub claims: CredentialPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<InvalidReason>,
}

/// Verdict for a detached-signature credential.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachedVerification {
    pub valid: bool,
    pub revoked: bool,
    /// Address recovered from the signature
    pub signer: Option<String>,
    /// Address taken from the credential's issuer DID
    pub issuer_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<InvalidReason>,
}

/// Verifies credentials against their issuers and the revocation registry.
pub struct Verifier {
    /// Maps issuer DIDs to verification material
    resolver: Arc<dyn DidResolver>,
    /// Consulted on every verification
    revocations: Arc<RevocationRegistry>,
    /// Upper bound on a single DID resolution
    resolver_timeout: Duration,
}

impl Verifier {
    /// Constructs a new Verifier instance.
    ///
    /// # Arguments
    /// * `resolver` - DID resolver for issuer lookups
    /// * `revocations` - Registry consulted for revocation status
    /// * `resolver_timeout` - Resolution attempts exceeding this are reported
    ///   as unresolvable
    pub fn new(
        resolver: Arc<dyn DidResolver>,
        revocations: Arc<RevocationRegistry>,
        resolver_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            revocations,
            resolver_timeout,
        }
    }

    /// Verifies a credential token.
    ///
    /// # Errors
    /// - [`VcError::MalformedToken`] if the token cannot be decoded or its
    ///   signature segment has the wrong shape
    /// - [`VcError::StoreIo`] if the revocation registry cannot be read
    ///
    /// An unresolvable issuer is not an error: it yields `valid = false` with
    /// [`InvalidReason::UnresolvableDid`]. A sound proof over a claim set that
    /// disagrees with `iss`/`sub`, or outside its `nbf`..`exp` window, is
    /// likewise reported through the verdict.
    pub async fn verify_token(&self, token: &str) -> VcResult<TokenVerification> {
        let decoded: DecodedToken<CredentialPayload> = token::decode(token)?;
        let signature = parse_token_signature(&decoded)?;

        let digest = sha256(decoded.signing_input());
        let candidates = signature.recover_addresses(&digest);
        let issuer = decoded.payload.iss.clone();

        let (valid, signer, reason) = match self.resolve_issuer(&issuer).await {
            Ok(material) => {
                let matched = candidates
                    .iter()
                    .find(|address| material.matches_address(address))
                    .cloned();
                match matched {
                    Some(address) => (true, Some(address), None),
                    None => (
                        false,
                        signature.recover_address(&digest),
                        Some(InvalidReason::SignatureMismatch),
                    ),
                }
            }
            Err(reason) => (false, signature.recover_address(&digest), Some(reason)),
        };
        let (valid, reason) = match check_claims(&decoded.payload, Utc::now().timestamp()) {
            Some(problem) if valid => (false, Some(problem)),
            _ => (valid, reason),
        };

        let revoked = self.revocations.is_revoked(&decoded.payload.vc.id).await?;
        info!(
            "Verified token credential {} for {}: valid={} revoked={}",
            decoded.payload.vc.id,
            decoded.payload.vc.subject().unwrap_or("unknown subject"),
            valid,
            revoked
        );

        Ok(TokenVerification {
            valid,
            revoked,
            signer,
            issuer,
            claims: decoded.payload,
            reason,
        })
    }

    /// Verifies a credential with a detached wallet-style signature over its
    /// canonical JSON.
    ///
    /// # Errors
    /// - [`VcError::MissingSignature`] if no signature is supplied
    /// - [`VcError::Encoding`] if the credential cannot be canonicalized
    /// - [`VcError::StoreIo`] if the revocation registry cannot be read
    pub async fn verify_detached(
        &self,
        credential: &ClaimMap,
        signature: Option<&str>,
    ) -> VcResult<DetachedVerification> {
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(VcError::MissingSignature)?;

        let canonical = canonicalize_claim(&ClaimValue::Map(credential.clone()))?;
        let issuer_address = expected_issuer_address(credential);

        let signer = match RecoverableSignature::from_hex(signature) {
            Ok(parsed) => Ok(parsed.recover_address(&personal_message_hash(&canonical))),
            Err(e) => Err(InvalidReason::MalformedSignature {
                message: e.to_string(),
            }),
        };

        let (valid, signer, reason) = match (signer, &issuer_address) {
            (Err(reason), _) => (false, None, Some(reason)),
            (Ok(signer), Err(reason)) => (false, signer, Some(reason.clone())),
            (Ok(Some(signer)), Ok(expected)) if signer.eq_ignore_ascii_case(expected) => {
                (true, Some(signer), None)
            }
            (Ok(signer), Ok(_)) => (false, signer, Some(InvalidReason::SignatureMismatch)),
        };

        let revoked = match credential.get("id").and_then(ClaimValue::as_str) {
            Some(id) => self.revocations.is_revoked(id).await?,
            None => false,
        };
        info!("Verified detached credential: valid={} revoked={}", valid, revoked);

        Ok(DetachedVerification {
            valid,
            revoked,
            signer,
            issuer_address: issuer_address.ok(),
            reason,
        })
    }

    async fn resolve_issuer(&self, did: &str) -> Result<VerificationMaterial, InvalidReason> {
        match tokio::time::timeout(self.resolver_timeout, self.resolver.resolve(did)).await {
            Ok(Ok(material)) => {
                debug!("Resolved {} to {:?}", did, material);
                Ok(material)
            }
            Ok(Err(e)) => {
                warn!("Could not resolve issuer {}: {}", did, e);
                Err(InvalidReason::UnresolvableDid {
                    did: did.to_string(),
                    message: e.to_string(),
                })
            }
            Err(_) => {
                warn!(
                    "Resolving issuer {} timed out after {:?}",
                    did, self.resolver_timeout
                );
                Err(InvalidReason::UnresolvableDid {
                    did: did.to_string(),
                    message: format!("timed out after {}ms", self.resolver_timeout.as_millis()),
                })
            }
        }
    }
}

/// Checks that the claim set names the signed issuer and subject, and that
/// `now` lies within the token's validity window.
fn check_claims(payload: &CredentialPayload, now: i64) -> Option<InvalidReason> {
    let mismatch = |field: &str| InvalidReason::ClaimsMismatch {
        field: field.to_string(),
    };
    if payload.vc.issuer != payload.iss {
        return Some(mismatch("issuer"));
    }
    if payload.vc.subject() != Some(payload.sub.as_str()) {
        return Some(mismatch("subject"));
    }
    if payload.nbf > now + CLOCK_SKEW_SECS {
        return Some(InvalidReason::NotYetValid { nbf: payload.nbf });
    }
    match payload.exp {
        Some(exp) if exp <= now - CLOCK_SKEW_SECS => Some(InvalidReason::Expired { exp }),
        _ => None,
    }
}

/// Checks the signature segment against the header's algorithm.
fn parse_token_signature<P>(decoded: &DecodedToken<P>) -> VcResult<RecoverableSignature> {
    let expected_len = match decoded.header.alg {
        JwsAlgorithm::Es256kR => 65,
        JwsAlgorithm::Es256k => 64,
    };
    if decoded.signature.len() != expected_len {
        return Err(VcError::MalformedToken(format!(
            "{:?} signature must be {} bytes, got {}",
            decoded.header.alg,
            expected_len,
            decoded.signature.len()
        )));
    }
    RecoverableSignature::from_bytes(&decoded.signature)
        .map_err(|e| VcError::MalformedToken(e.to_string()))
}

/// Reads the issuer (a string or an object with an `id`) and returns the
/// address suffix of its DID.
fn expected_issuer_address(credential: &ClaimMap) -> Result<String, InvalidReason> {
    let issuer = match credential.get("issuer") {
        Some(ClaimValue::String(issuer)) => issuer.as_str(),
        Some(ClaimValue::Map(issuer)) => issuer
            .get("id")
            .and_then(ClaimValue::as_str)
            .ok_or(InvalidReason::MissingIssuer)?,
        _ => return Err(InvalidReason::MissingIssuer),
    };

    let did: Did = issuer.parse().map_err(|_| InvalidReason::IssuerNotAddress {
        issuer: issuer.to_string(),
    })?;
    Ok(did.address_suffix().to_string())
}
