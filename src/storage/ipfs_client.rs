// src/storage/ipfs_client.rs
//! Content-addressed storage for uploaded documents.
//!
//! Uploads are opaque bytes; the store answers with a content identifier.
//!
//! # Backends
//! - [`LocalContentStore`]: files under a local directory, named by a SHA-256
//!   derived identifier
//! - [`IpfsStorage`]: an IPFS node's HTTP API; the identifier is the node's CID
//!
//! # Security Considerations
//! - Content on IPFS is public; encrypt sensitive documents before upload
//! - Identifiers are content-derived, so identical uploads share one identifier

use async_trait::async_trait;
use ethers::utils::hex;
use ipfs_api_backend_hyper::{IpfsApi, IpfsClient, TryFromUri};
use log::{debug, info};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task;

use crate::error::{VcError, VcResult};
use crate::utils::crypto::sha256;

/// Prefix of identifiers minted by [`LocalContentStore`].
pub const LOCAL_CID_PREFIX: &str = "cid-backend-";

/// Number of hex digits of the digest kept in a local identifier.
const LOCAL_CID_HEX_LEN: usize = 40;

/// Stores uploaded bytes and returns their content identifier.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// # Errors
    /// Returns [`VcError::ContentStore`] if the backend rejects the upload.
    async fn store(&self, data: Vec<u8>) -> VcResult<String>;
}

/// Content store backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalContentStore {
    dir: PathBuf,
}

/// Thread-safe IPFS client wrapper.
#[derive(Clone)]
pub struct IpfsStorage {
    /// Shared IPFS client instance
    client: Arc<IpfsClient>,
}

/// Identifier [`LocalContentStore`] gives to `data`.
pub fn local_cid(data: &[u8]) -> String {
    let digest = hex::encode(sha256(data));
    format!("{}{}", LOCAL_CID_PREFIX, &digest[..LOCAL_CID_HEX_LEN])
}

impl LocalContentStore {
    /// Creates a store writing into `dir`. The directory is created on first
    /// upload.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ContentStore for LocalContentStore {
    async fn store(&self, data: Vec<u8>) -> VcResult<String> {
        let cid = local_cid(&data);
        let path = self.dir.join(&cid);

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| VcError::ContentStore(format!("{}: {}", self.dir.display(), e)))?;
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| VcError::ContentStore(format!("{}: {}", path.display(), e)))?;

        info!("Stored {} bytes locally as {}", data.len(), cid);
        Ok(cid)
    }
}

impl IpfsStorage {
    /// Creates a client for the IPFS node API at `api_url`
    /// (e.g. `http://localhost:5001`).
    ///
    /// # Errors
    /// Returns [`VcError::Config`] if the URL is not a valid node address.
    pub fn new(api_url: &str) -> VcResult<Self> {
        let client = IpfsClient::from_str(api_url)
            .map_err(|e| VcError::Config(format!("invalid IPFS API URL {}: {}", api_url, e)))?;
        Ok(IpfsStorage {
            client: Arc::new(client),
        })
    }
}

#[async_trait]
impl ContentStore for IpfsStorage {
    /// Adds the bytes to the node and returns its CID.
    ///
    /// The IPFS client futures are not `Send`, so the request runs on a
    /// dedicated runtime inside a blocking task.
    async fn store(&self, data: Vec<u8>) -> VcResult<String> {
        let client = self.client.clone();
        let len = data.len();

        let hash = task::spawn_blocking(move || -> Result<String, String> {
            let rt = tokio::runtime::Runtime::new().map_err(|e| e.to_string())?;
            rt.block_on(async {
                client
                    .add(Cursor::new(data))
                    .await
                    .map(|res| res.hash)
                    .map_err(|e| e.to_string())
            })
        })
        .await
        .map_err(|e| VcError::ContentStore(e.to_string()))?
        .map_err(VcError::ContentStore)?;

        debug!("Added {} bytes to IPFS as {}", len, hash);
        Ok(hash)
    }
}
