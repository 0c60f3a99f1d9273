// src/error.rs
//! Error types for the credential service.
//!
//! Every caller-facing failure carries a stable [`ErrorKind`] discriminant and a
//! human-readable message. The HTTP layer renders both; nothing else about the
//! error (source chains, backtraces) is part of the contract.

use serde::Serialize;
use thiserror::Error;

/// Result type used throughout the credential core.
pub type VcResult<T> = Result<T, VcError>;

/// Failures raised by issuance, verification, revocation and storage.
#[derive(Debug, Error)]
pub enum VcError {
    /// Issuance was requested but no issuer signing key is configured.
    #[error("issuer signing key is not configured (set ISSUER_PRIVATE_KEY)")]
    IssuerNotConfigured,

    /// The signing key is absent, malformed or zero.
    #[error("invalid issuer key: {0}")]
    Key(String),

    /// A value could not be serialized canonically.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The token is not three valid base64url/JSON segments.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// A detached credential was submitted without a signature.
    #[error("no signature to verify")]
    MissingSignature,

    /// The DID could not be resolved to verification material.
    #[error("unable to resolve DID {did}: {reason}")]
    UnresolvableDid { did: String, reason: String },

    /// An issuance request reused a credential identifier already issued or
    /// revoked.
    #[error("credential identifier {0} is already in use")]
    DuplicateIdentifier(String),

    /// A revocation request did not name a credential.
    #[error("missing credential identifier")]
    MissingIdentifier,

    /// Reading or writing a persisted collection failed.
    #[error("store I/O error: {0}")]
    StoreIo(String),

    /// Content-addressed storage rejected or failed an upload.
    #[error("content store error: {0}")]
    ContentStore(String),

    /// Start-up configuration could not be loaded or applied.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Stable discriminant for [`VcError`], serialized by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    IssuerNotConfigured,
    KeyError,
    EncodingError,
    MalformedTokenError,
    MissingSignatureError,
    UnresolvableDID,
    DuplicateIdentifier,
    MissingIdentifier,
    StoreIOError,
    ContentStoreError,
    ConfigError,
}

impl VcError {
    /// Returns the stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VcError::IssuerNotConfigured => ErrorKind::IssuerNotConfigured,
            VcError::Key(_) => ErrorKind::KeyError,
            VcError::Encoding(_) => ErrorKind::EncodingError,
            VcError::MalformedToken(_) => ErrorKind::MalformedTokenError,
            VcError::MissingSignature => ErrorKind::MissingSignatureError,
            VcError::UnresolvableDid { .. } => ErrorKind::UnresolvableDID,
            VcError::DuplicateIdentifier(_) => ErrorKind::DuplicateIdentifier,
            VcError::MissingIdentifier => ErrorKind::MissingIdentifier,
            VcError::StoreIo(_) => ErrorKind::StoreIOError,
            VcError::ContentStore(_) => ErrorKind::ContentStoreError,
            VcError::Config(_) => ErrorKind::ConfigError,
        }
    }

    pub(crate) fn unresolvable(did: &str, reason: impl Into<String>) -> Self {
        VcError::UnresolvableDid {
            did: did.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<config::ConfigError> for VcError {
    fn from(err: config::ConfigError) -> Self {
        VcError::Config(err.to_string())
    }
}

impl From<std::io::Error> for VcError {
    fn from(err: std::io::Error) -> Self {
        VcError::StoreIo(err.to_string())
    }
}
