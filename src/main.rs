// src/main.rs

//! # Verifiable Credential Service - Main Entry Point
//!
//! This module serves as the main entry point for the credential service.
//! It loads configuration, wires the core components together and starts the
//! API server.
//!
//! ## Architecture Overview
//! 1. **Identity Layer**: DID resolution for issuer keys
//! 2. **Services Layer**: Credential issuance, verification, revocation and API endpoints
//! 3. **Storage Layer**: JSON record collections and content-addressed uploads
//! 4. **Cryptography Layer**: Issuer key management and signature recovery
//!
//! ## Environment Variables
//! - `ISSUER_PRIVATE_KEY`: (Optional) issuer secp256k1 key; issuance is disabled without it
//! - `DATA_DIR`: (Optional) directory for `vcs.json`, `revocations.json` and uploads
//! - `RESOLVER_URL`: (Optional) universal resolver; `did:ethr` resolves offline otherwise
//! - `IPFS_API_URL`: (Optional) IPFS node URL; uploads are stored locally otherwise
//!
//! See [`config::Settings`] for the full list.

use crate::blockchain::did_resolver::{
    DidResolver, EthrResolver, StaticResolver, UniversalResolver,
};
use crate::config::Settings;
use crate::models::credential::CredentialRecord;
use crate::models::did::VerificationMaterial;
use crate::models::revocation::RevocationEntry;
use crate::services::api_server::ApiServer;
use crate::services::credential_issuer::CredentialIssuer;
use crate::services::revocation::RevocationRegistry;
use crate::services::verifier::Verifier;
use crate::storage::ipfs_client::{ContentStore, IpfsStorage, LocalContentStore};
use crate::storage::record_store::JsonFileStore;
use dotenv::dotenv;
use log::{info, warn};
use std::sync::Arc;

// Module declarations (organized by functional domain)
mod blockchain; // DID resolution
mod config; // Environment settings
mod error; // Error taxonomy
mod models; // Data structures
mod services; // Business logic and API
mod storage; // Record collections and uploads
mod utils; // Hashing and canonical encoding
mod wallet; // Issuer key operations

/// Main application entry point
///
/// # Initialization Sequence
/// 1. Load environment configuration
/// 2. Open the credential and revocation collections
/// 3. Initialize service components
/// 4. Start API server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::from_env()?;
    let issuer_key = settings.issuer_key()?;

    // Persisted collections
    let credentials = JsonFileStore::<CredentialRecord>::open(settings.credentials_path()).await?;
    let revocation_entries =
        JsonFileStore::<RevocationEntry>::open(settings.revocations_path()).await?;
    info!(
        "Credential records at {}, revocations at {}",
        credentials.path().display(),
        revocation_entries.path().display()
    );
    let revocations = Arc::new(RevocationRegistry::new(Arc::new(revocation_entries)));

    // Issuer key resolution
    let resolver: Arc<dyn DidResolver> = match settings.resolver_url.as_deref() {
        Some(url) => {
            info!("Resolving issuer DIDs via {}", url);
            Arc::new(UniversalResolver::new(url, settings.resolver_timeout())?)
        }
        None if settings.did_method == "ethr" => Arc::new(EthrResolver),
        None => {
            // Without a resolver only this service's own DID is known.
            let mut local = StaticResolver::new();
            if let Some(key) = &issuer_key {
                local = local.with_entry(
                    key.did(&settings.did_method),
                    VerificationMaterial::Address(key.address().to_string()),
                );
            }
            warn!(
                "No RESOLVER_URL for did:{}; only the local issuer DID will resolve",
                settings.did_method
            );
            Arc::new(local)
        }
    };

    // Document uploads
    let content_store: Arc<dyn ContentStore> = match settings.ipfs_api_url.as_deref() {
        Some(url) => {
            info!("Uploads go to IPFS node {}", url);
            Arc::new(IpfsStorage::new(url)?)
        }
        None => Arc::new(LocalContentStore::new(settings.uploads_dir())),
    };

    // Credential Issuer Service
    let credential_issuer =
        CredentialIssuer::new(issuer_key, settings.did_method.clone(), Arc::new(credentials))
            .with_revocations(revocations.clone());
    match credential_issuer.issuer_did() {
        Some(did) => info!("Issuer DID: {}", did),
        None => warn!("ISSUER_PRIVATE_KEY not set; issuance is disabled"),
    }

    // Credential Verifier Service
    let verifier = Verifier::new(resolver, revocations.clone(), settings.resolver_timeout());

    let api_server = ApiServer::new(credential_issuer, verifier, revocations, content_store);

    let addr = settings.socket_addr()?;
    info!("Available endpoints:");
    info!("- POST /api/issue");
    info!("- POST /api/verify");
    info!("- POST /api/revoke");
    info!("- GET  /api/vcs");
    info!("- POST /api/upload");

    api_server.run(addr).await?;
    Ok(())
}
