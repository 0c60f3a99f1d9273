// src/blockchain/did_resolver.rs
//! DID resolution.
//!
//! Maps an issuer DID to the key material allowed to sign for it. Resolution
//! may be slow or unavailable, so it is an async capability; the verifier
//! bounds every call with a timeout.
//!
//! Implementations:
//! - [`EthrResolver`]: offline `did:ethr` resolution, where the DID embeds
//!   the controlling address or public key
//! - [`StaticResolver`]: a fixed DID → material table
//! - [`UniversalResolver`]: HTTP lookup against a DID universal resolver

use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{VcError, VcResult};
use crate::models::did::{Did, DidDocument, VerificationMaterial};

/// Resolves a DID to its verification material.
#[async_trait]
pub trait DidResolver: Send + Sync {
    /// # Errors
    /// Returns [`VcError::UnresolvableDid`] when the DID cannot be resolved.
    async fn resolve(&self, did: &str) -> VcResult<VerificationMaterial>;
}

/// Resolves `did:ethr` identifiers without network access.
///
/// Covers DIDs whose controller was never changed on chain, which is the
/// default state of every `did:ethr` identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct EthrResolver;

/// Resolves DIDs from a fixed table.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    entries: HashMap<String, VerificationMaterial>,
}

/// Resolves DIDs through a universal resolver's
/// `GET <base>/1.0/identifiers/<did>` endpoint.
#[derive(Debug, Clone)]
pub struct UniversalResolver {
    client: reqwest::Client,
    base_url: String,
}

/// Universal resolver responses wrap the document; some resolvers return the
/// bare document instead.
#[derive(Deserialize)]
#[serde(untagged)]
enum ResolutionResponse {
    #[serde(rename_all = "camelCase")]
    Wrapped { did_document: DidDocument },
    Bare(DidDocument),
}

fn is_hex(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}

#[async_trait]
impl DidResolver for EthrResolver {
    async fn resolve(&self, did: &str) -> VcResult<VerificationMaterial> {
        let parsed: Did = did.parse()?;
        if parsed.method() != "ethr" {
            return Err(VcError::unresolvable(
                did,
                format!("unsupported DID method {}", parsed.method()),
            ));
        }

        let suffix = parsed.address_suffix();
        let hex_part = suffix
            .strip_prefix("0x")
            .ok_or_else(|| VcError::unresolvable(did, "identifier is not 0x-prefixed"))?;
        if !is_hex(hex_part) {
            return Err(VcError::unresolvable(did, "identifier is not hex"));
        }

        match hex_part.len() {
            40 => Ok(VerificationMaterial::Address(suffix.to_string())),
            66 => {
                let bytes = ethers::utils::hex::decode(hex_part)
                    .map_err(|e| VcError::unresolvable(did, e.to_string()))?;
                Ok(VerificationMaterial::PublicKey(bytes))
            }
            len => Err(VcError::unresolvable(
                did,
                format!("identifier has {} hex digits, expected 40 or 66", len),
            )),
        }
    }
}

impl StaticResolver {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a DID entry.
    pub fn with_entry(mut self, did: impl Into<String>, material: VerificationMaterial) -> Self {
        self.entries.insert(did.into(), material);
        self
    }
}

#[async_trait]
impl DidResolver for StaticResolver {
    async fn resolve(&self, did: &str) -> VcResult<VerificationMaterial> {
        self.entries
            .get(did)
            .cloned()
            .ok_or_else(|| VcError::unresolvable(did, "unknown DID"))
    }
}

impl UniversalResolver {
    /// Creates a resolver for the given base URL. `request_timeout` bounds each
    /// HTTP exchange independently of the verifier's own timeout.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> VcResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| VcError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DidResolver for UniversalResolver {
    async fn resolve(&self, did: &str) -> VcResult<VerificationMaterial> {
        let url = format!("{}/1.0/identifiers/{}", self.base_url, did);
        debug!("Resolving {} via {}", did, url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!("DID resolution request for {} failed: {}", did, e);
            VcError::unresolvable(did, e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(VcError::unresolvable(
                did,
                format!("resolver answered {}", status),
            ));
        }

        let document = match response
            .json::<ResolutionResponse>()
            .await
            .map_err(|e| VcError::unresolvable(did, format!("invalid DID document: {}", e)))?
        {
            ResolutionResponse::Wrapped { did_document } => did_document,
            ResolutionResponse::Bare(document) => document,
        };

        document
            .verification_material()?
            .into_iter()
            .next()
            .ok_or_else(|| VcError::unresolvable(did, "DID document lists no usable key"))
    }
}
