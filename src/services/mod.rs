// src/services/mod.rs
//! Credential services and the HTTP API in front of them.

pub mod api_server;
pub mod credential_issuer;
pub mod revocation;
pub mod token;
pub mod verifier;
