// src/models/mod.rs
//! Data structures shared by the services.

pub mod credential;
pub mod did;
pub mod revocation;
