// src/utils/crypto.rs
//! Cryptographic utilities optimized for blockchain compatibility.
//!
//! Keccak-256 backs address derivation and wallet-style message digests;
//! SHA-256 backs token signing input digests, as JWS `ES256K` prescribes.

use ethers::types::Address;
use ethers::utils::{hex, keccak256, to_checksum};
use k256::ecdsa::VerifyingKey;
use rand::rngs::OsRng;
use rand::RngCore;
use ring::digest::{digest, SHA256};

use crate::error::{VcError, VcResult};

/// Computes a Keccak-256 hash of the input data (Ethereum-compatible).
pub fn hash_data(data: &[u8]) -> [u8; 32] {
    keccak256(data)
}

/// Computes a SHA-256 hash of the input data.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let hash = digest(&SHA256, data);
    let mut out = [0u8; 32];
    out.copy_from_slice(hash.as_ref());
    out
}

/// Digest of `message` as an EIP-191 personal message, the form wallets sign
/// with `personal_sign`:
///
/// `keccak256("\x19Ethereum Signed Message:\n" + len(message) + message)`
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut prefixed = format!("\x19Ethereum Signed Message:\n{}", message.len()).into_bytes();
    prefixed.extend_from_slice(message);
    hash_data(&prefixed)
}

/// Derives the EIP-55 checksummed address of a secp256k1 public key: the last
/// 20 bytes of the Keccak-256 hash of the uncompressed point (without its
/// `0x04` tag).
pub fn address_of(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let hash = hash_data(&point.as_bytes()[1..]);
    to_checksum(&Address::from_slice(&hash[12..]), None)
}

/// Derives the address of a SEC1-encoded (compressed or uncompressed) public key.
pub fn address_from_sec1(bytes: &[u8]) -> VcResult<String> {
    let key = VerifyingKey::from_sec1_bytes(bytes)
        .map_err(|e| VcError::Key(format!("invalid public key: {}", e)))?;
    Ok(address_of(&key))
}

/// Lowercase hex of `len` bytes drawn from the operating system CSPRNG.
pub fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
