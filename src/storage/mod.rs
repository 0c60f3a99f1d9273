// src/storage/mod.rs
//! Persistence: record collections and content-addressed uploads.

pub mod ipfs_client;
pub mod record_store;
