// src/blockchain/mod.rs
//! Identity resolution against DID methods.

pub mod did_resolver;
