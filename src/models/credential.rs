// src/models/credential.rs
//! Verifiable Credential data model implementation.
//!
//! Defines the claim value type, the W3C-style credential claim set, the JWT
//! payload wrapping it, and the record persisted for every issued credential.
//!
//! Claim values are a closed set of variants so that every credential can be
//! canonicalized deterministically (see [`crate::utils::serialization`]).

use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::storage::record_store::StoredEntry;

/// The literal that always leads a credential's type list.
pub const VERIFIABLE_CREDENTIAL_TYPE: &str = "VerifiableCredential";

/// Credential type used when the issuance request names none.
pub const DEFAULT_CREDENTIAL_TYPE: &str = "IdentityCredential";

/// JSON-LD context of the W3C credentials data model v1.
pub const CREDENTIALS_CONTEXT_V1: &str = "https://www.w3.org/2018/credentials/v1";

/// Mapping of claim key to claim value, ordered by raw key.
pub type ClaimMap = BTreeMap<String, ClaimValue>;

/// A single claim value.
///
/// Numbers are split into integers and floats so that integral values keep an
/// exact decimal form. Non-finite floats are representable in memory but fail
/// serialization.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<ClaimValue>),
    Map(ClaimMap),
}

/// The semantic payload of a credential, in W3C VC data model shape.
///
/// `credential_subject` always carries an `id` entry naming the subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialClaimSet {
    /// JSON-LD contexts
    #[serde(rename = "@context", default = "default_context")]
    pub context: Vec<String>,

    /// Type labels, led by "VerifiableCredential"
    #[serde(rename = "type")]
    pub types: Vec<String>,

    /// Subject id plus the issued claims
    pub credential_subject: ClaimMap,

    /// Unique credential identifier, the revocation join key
    pub id: String,

    /// RFC3339 issuance timestamp
    pub issuance_date: String,

    /// DID of the issuer
    pub issuer: String,
}

/// Payload of a credential token: the claim set plus JWT timing claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialPayload {
    /// Subject identifier
    pub sub: String,

    /// Not-before, the issuance time in epoch seconds
    pub nbf: i64,

    /// Optional expiry in epoch seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issuer DID
    pub iss: String,

    /// The credential itself
    pub vc: CredentialClaimSet,
}

/// Record persisted once per issued credential. Never mutated after issuance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub id: String,
    pub issuer: String,
    pub subject: String,
    /// Token string, when the credential was issued in token form
    pub jwt: Option<String>,
    /// The signed payload
    pub raw: CredentialPayload,
    /// Issuance time in epoch milliseconds
    pub issued_at: i64,
}

fn default_context() -> Vec<String> {
    vec![CREDENTIALS_CONTEXT_V1.to_string()]
}

impl ClaimValue {
    /// Returns the string content if this is a string claim.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ClaimValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl CredentialClaimSet {
    /// Builds a claim set for `subject` with the type list
    /// `["VerifiableCredential", credential_type]`.
    ///
    /// Claims are merged into `credentialSubject` and the subject's `id` is
    /// written last, so a claim named `id` cannot displace the subject.
    pub fn new(
        id: String,
        subject: &str,
        credential_type: &str,
        claims: ClaimMap,
        issuer: String,
        issuance_date: String,
    ) -> Self {
        let mut credential_subject = claims;
        credential_subject.insert("id".to_string(), ClaimValue::from(subject));

        let mut types = vec![VERIFIABLE_CREDENTIAL_TYPE.to_string()];
        if credential_type != VERIFIABLE_CREDENTIAL_TYPE {
            types.push(credential_type.to_string());
        }

        Self {
            context: default_context(),
            types,
            credential_subject,
            id,
            issuance_date,
            issuer,
        }
    }

    /// The subject identifier recorded under `credentialSubject.id`.
    pub fn subject(&self) -> Option<&str> {
        self.credential_subject.get("id").and_then(ClaimValue::as_str)
    }
}

impl StoredEntry for CredentialRecord {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Serialize for ClaimValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ClaimValue::Null => serializer.serialize_unit(),
            ClaimValue::Bool(b) => serializer.serialize_bool(*b),
            ClaimValue::Integer(i) => serializer.serialize_i64(*i),
            ClaimValue::Float(f) if !f.is_finite() => {
                Err(S::Error::custom(format!("non-finite number {} is not representable", f)))
            }
            ClaimValue::Float(f) => serializer.serialize_f64(*f),
            ClaimValue::String(s) => serializer.serialize_str(s),
            ClaimValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            ClaimValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

impl From<serde_json::Value> for ClaimValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => ClaimValue::Null,
            Value::Bool(b) => ClaimValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ClaimValue::Integer(i),
                None => ClaimValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => ClaimValue::String(s),
            Value::Array(items) => ClaimValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(entries) => ClaimValue::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, value.into()))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for ClaimValue {
    fn from(s: &str) -> Self {
        ClaimValue::String(s.to_string())
    }
}

impl From<String> for ClaimValue {
    fn from(s: String) -> Self {
        ClaimValue::String(s)
    }
}

impl From<i64> for ClaimValue {
    fn from(i: i64) -> Self {
        ClaimValue::Integer(i)
    }
}

impl From<bool> for ClaimValue {
    fn from(b: bool) -> Self {
        ClaimValue::Bool(b)
    }
}
