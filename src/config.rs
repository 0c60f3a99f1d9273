// src/config.rs
//! Service configuration.
//!
//! Settings come from the process environment (after `.env` is loaded by
//! `main`), layered over built-in defaults. Keys are the lower-cased
//! environment variable names.
//!
//! | Variable              | Default       |
//! |-----------------------|---------------|
//! | `ISSUER_PRIVATE_KEY`  | unset         |
//! | `DID_METHOD`          | `ethr`        |
//! | `DATA_DIR`            | `./data`      |
//! | `PORT`                | `3000`        |
//! | `BIND_ADDRESS`        | `127.0.0.1`   |
//! | `RESOLVER_URL`        | unset         |
//! | `RESOLVER_TIMEOUT_MS` | `5000`        |
//! | `IPFS_API_URL`        | unset         |

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment};
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{VcError, VcResult};
use crate::wallet::key_management::IssuerKey;

const DEFAULT_DID_METHOD: &str = "ethr";
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_PORT: i64 = 3000;
const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
const DEFAULT_RESOLVER_TIMEOUT_MS: i64 = 5000;

/// Runtime settings for the credential service.
#[derive(Clone, Deserialize)]
pub struct Settings {
    /// Hex secp256k1 key; issuance is disabled without it
    #[serde(default)]
    pub issuer_private_key: Option<String>,
    pub did_method: String,
    pub data_dir: PathBuf,
    pub port: u16,
    pub bind_address: String,
    /// Universal resolver base URL; `did:ethr` is resolved offline without it
    #[serde(default)]
    pub resolver_url: Option<String>,
    pub resolver_timeout_ms: u64,
    /// IPFS node API; uploads go to `data_dir/uploads` without it
    #[serde(default)]
    pub ipfs_api_url: Option<String>,
}

impl Settings {
    /// Loads settings from the environment.
    ///
    /// # Errors
    /// Returns [`VcError::Config`] if a value has the wrong type.
    pub fn from_env() -> VcResult<Self> {
        Ok(Self::defaults()?
            .add_source(Environment::default())
            .build()?
            .try_deserialize()?)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("did_method", DEFAULT_DID_METHOD)?
            .set_default("data_dir", DEFAULT_DATA_DIR)?
            .set_default("port", DEFAULT_PORT)?
            .set_default("bind_address", DEFAULT_BIND_ADDRESS)?
            .set_default("resolver_timeout_ms", DEFAULT_RESOLVER_TIMEOUT_MS)
    }

    /// The configured issuer key, `None` when unset or blank.
    ///
    /// # Errors
    /// Returns [`VcError::Key`] if a key is set but invalid.
    pub fn issuer_key(&self) -> VcResult<Option<IssuerKey>> {
        match self.issuer_private_key.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(hex) => IssuerKey::from_hex(hex).map(Some),
        }
    }

    /// Address the API server binds to.
    pub fn socket_addr(&self) -> VcResult<SocketAddr> {
        let ip: IpAddr = self.bind_address.parse().map_err(|e| {
            VcError::Config(format!("invalid BIND_ADDRESS {}: {}", self.bind_address, e))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn resolver_timeout(&self) -> Duration {
        Duration::from_millis(self.resolver_timeout_ms)
    }

    /// Issued credential records.
    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join("vcs.json")
    }

    /// Revocation entries.
    pub fn revocations_path(&self) -> PathBuf {
        self.data_dir.join("revocations.json")
    }

    /// Local upload directory.
    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field(
                "issuer_private_key",
                &self.issuer_private_key.as_ref().map(|_| "<redacted>"),
            )
            .field("did_method", &self.did_method)
            .field("data_dir", &self.data_dir)
            .field("port", &self.port)
            .field("bind_address", &self.bind_address)
            .field("resolver_url", &self.resolver_url)
            .field("resolver_timeout_ms", &self.resolver_timeout_ms)
            .field("ipfs_api_url", &self.ipfs_api_url)
            .finish()
    }
}
