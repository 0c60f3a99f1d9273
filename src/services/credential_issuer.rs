// src/services/credential_issuer.rs
//! Credential Issuer Service
//!
//! Mints signed verifiable credentials. Each issuance builds the claim set,
//! wraps it in a token payload, signs the canonical token encoding with the
//! issuer key, and appends one record to the credential store.
//!
//! Issuance is atomic from the caller's point of view: every fallible step runs
//! before the single store append, so a failure leaves the store untouched.
//! Credential identifiers are unique across the store and the revocation
//! registry; a reused identifier is refused before anything is signed.

use chrono::{SecondsFormat, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{VcError, VcResult};
use crate::models::credential::{
    ClaimMap, CredentialClaimSet, CredentialPayload, CredentialRecord, DEFAULT_CREDENTIAL_TYPE,
};
use crate::services::revocation::RevocationRegistry;
use crate::services::token::{self, TokenHeader};
use crate::storage::record_store::RecordStore;
use crate::utils::crypto::random_hex;
use crate::wallet::key_management::IssuerKey;

/// Prefix of generated credential identifiers.
const CREDENTIAL_ID_PREFIX: &str = "vc-";

/// Prefix of generated placeholder subjects.
const PLACEHOLDER_SUBJECT_PREFIX: &str = "did:example:";

/// An issuance request as received from a caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueRequest {
    /// Subject identifier; a placeholder DID is generated when absent
    #[serde(default)]
    pub subject: Option<String>,

    /// Credential type; `IdentityCredential` when absent
    #[serde(default, rename = "type")]
    pub credential_type: Option<String>,

    /// Claims about the subject
    #[serde(default, alias = "claim")]
    pub claims: ClaimMap,

    /// Credential identifier; generated when absent
    #[serde(default)]
    pub id: Option<String>,
}

/// The outcome of a successful issuance.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedCredential {
    /// The persisted record
    pub record: CredentialRecord,
    /// The signed token
    pub token: String,
}

/// Service for issuing and listing credentials.
#[derive(Clone)]
pub struct CredentialIssuer {
    /// Issuer key; `None` when the deployment has no key configured
    issuer_key: Option<Arc<IssuerKey>>,

    /// DID method used to derive the issuer DID from the key
    did_method: String,

    /// Persisted credential records
    store: Arc<dyn RecordStore<CredentialRecord>>,

    /// Revoked identifiers may not be issued again
    revocations: Option<Arc<RevocationRegistry>>,

    /// Serializes the uniqueness check with the append
    issue_lock: Arc<Mutex<()>>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl CredentialIssuer {
    /// Creates a new CredentialIssuer instance
    ///
    /// # Arguments
    /// * `issuer_key` - Signing key, or `None` to run without issuance
    /// * `did_method` - Method name for the issuer DID (e.g. `ethr`)
    /// * `store` - Collection receiving one record per issued credential
    pub fn new(
        issuer_key: Option<IssuerKey>,
        did_method: impl Into<String>,
        store: Arc<dyn RecordStore<CredentialRecord>>,
    ) -> Self {
        Self {
            issuer_key: issuer_key.map(Arc::new),
            did_method: did_method.into(),
            store,
            revocations: None,
            issue_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Also refuses identifiers found in `revocations`.
    pub fn with_revocations(mut self, revocations: Arc<RevocationRegistry>) -> Self {
        self.revocations = Some(revocations);
        self
    }

    /// The issuer DID, if a key is configured.
    pub fn issuer_did(&self) -> Option<String> {
        self.issuer_key.as_ref().map(|key| key.did(&self.did_method))
    }

    /// Issues a new verifiable credential.
    ///
    /// # Process Flow
    /// 1. Resolve defaults (identifier, subject, type)
    /// 2. Build the claim set and token payload stamped with the current time
    /// 3. Sign the canonical `header.payload` encoding
    /// 4. Encode the token and append the credential record
    ///
    /// # Errors
    /// - [`VcError::IssuerNotConfigured`] if no issuer key is available
    /// - [`VcError::DuplicateIdentifier`] if the identifier was already issued
    ///   or revoked
    /// - [`VcError::Encoding`] / [`VcError::Key`] if the payload cannot be signed
    /// - [`VcError::StoreIo`] if the record cannot be persisted
    pub async fn issue(&self, request: IssueRequest) -> VcResult<IssuedCredential> {
        let issuer_key = self
            .issuer_key
            .as_ref()
            .ok_or(VcError::IssuerNotConfigured)?;
        let issuer_did = issuer_key.did(&self.did_method);

        let credential_id = non_empty(request.id)
            .unwrap_or_else(|| format!("{}{}", CREDENTIAL_ID_PREFIX, random_hex(16)));
        let subject = non_empty(request.subject)
            .unwrap_or_else(|| format!("{}{}", PLACEHOLDER_SUBJECT_PREFIX, random_hex(6)));
        let credential_type = non_empty(request.credential_type)
            .unwrap_or_else(|| DEFAULT_CREDENTIAL_TYPE.to_string());

        let _guard = self.issue_lock.lock().await;
        self.ensure_unused(&credential_id).await?;

        let now = Utc::now();
        let claim_set = CredentialClaimSet::new(
            credential_id.clone(),
            &subject,
            &credential_type,
            request.claims,
            issuer_did.clone(),
            now.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        let payload = CredentialPayload {
            sub: subject.clone(),
            nbf: now.timestamp(),
            exp: None,
            iss: issuer_did.clone(),
            vc: claim_set,
        };

        let header = TokenHeader::default();
        let signing_input = token::signing_input(&header, &payload)?;
        let signature = issuer_key.sign_token_input(signing_input.as_bytes())?;
        let jwt = token::encode(&header, &payload, &signature.to_bytes())?;
        debug!("Signed credential {} ({} bytes)", credential_id, jwt.len());

        let record = CredentialRecord {
            id: credential_id,
            issuer: issuer_did,
            subject,
            jwt: Some(jwt.clone()),
            raw: payload,
            issued_at: now.timestamp_millis(),
        };
        self.store.append(record.clone()).await?;
        info!("Issued credential {} by {}", record.id, record.issuer);

        Ok(IssuedCredential { record, token: jwt })
    }

    async fn ensure_unused(&self, credential_id: &str) -> VcResult<()> {
        let revoked = match &self.revocations {
            Some(revocations) => revocations.is_revoked(credential_id).await?,
            None => false,
        };
        if revoked || self.store.contains(credential_id).await? {
            return Err(VcError::DuplicateIdentifier(credential_id.to_string()));
        }
        Ok(())
    }

    /// All issued credential records, most recent first.
    pub async fn list_credentials(&self) -> VcResult<Vec<CredentialRecord>> {
        self.store.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::credential::ClaimValue;
    use crate::models::revocation::RevocationEntry;
    use crate::services::token::{decode, DecodedToken, JwsAlgorithm};
    use crate::storage::record_store::MemoryStore;
    use crate::utils::crypto::sha256;
    use crate::wallet::key_management::RecoverableSignature;
    use tokio_test::{assert_err, assert_ok};

    const TEST_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn issuer(key: Option<&str>) -> (CredentialIssuer, Arc<MemoryStore<CredentialRecord>>) {
        let store = Arc::new(MemoryStore::new());
        let key = key.map(|k| IssuerKey::from_hex(k).unwrap());
        (CredentialIssuer::new(key, "ethr", store.clone()), store)
    }

    fn alice_request() -> IssueRequest {
        let mut claims = ClaimMap::new();
        claims.insert("name".into(), ClaimValue::from("Alice"));
        IssueRequest {
            subject: Some("did:example:abc123".into()),
            credential_type: Some("IdentityCredential".into()),
            claims,
            id: None,
        }
    }

    #[tokio::test]
    async fn test_issue_token_payload() {
        let (issuer, _) = issuer(Some(TEST_KEY));
        let issued = assert_ok!(issuer.issue(alice_request()).await);

        let decoded: DecodedToken<CredentialPayload> = decode(&issued.token).unwrap();
        assert_eq!(decoded.header.alg, JwsAlgorithm::Es256kR);
        assert_eq!(decoded.payload.sub, "did:example:abc123");
        assert_eq!(decoded.payload.vc.types, vec!["VerifiableCredential", "IdentityCredential"]);
        assert_eq!(decoded.payload.vc.credential_subject["name"], ClaimValue::from("Alice"));
        assert_eq!(decoded.payload.iss, "did:ethr:0x2c7536E3605D9C16a7a3D7b1898e529396a65c23");
        assert_eq!(decoded.payload, issued.record.raw);
        assert!(decoded.payload.vc.id.starts_with("vc-"));
        assert_eq!(decoded.payload.vc.id.len(), 3 + 32);
    }

    #[tokio::test]
    async fn test_issue_signature_recovers_issuer() {
        let (issuer, _) = issuer(Some(TEST_KEY));
        let issued = issuer.issue(alice_request()).await.unwrap();

        let decoded: DecodedToken<CredentialPayload> = decode(&issued.token).unwrap();
        let signature = RecoverableSignature::from_bytes(&decoded.signature).unwrap();
        let recovered = signature.recover_address(&sha256(decoded.signing_input()));
        assert_eq!(
            recovered.as_deref(),
            Some("0x2c7536E3605D9C16a7a3D7b1898e529396a65c23")
        );
    }

    #[tokio::test]
    async fn test_issue_appends_exactly_one_record() {
        let (issuer, store) = issuer(Some(TEST_KEY));
        let first = issuer.issue(alice_request()).await.unwrap();
        let second = issuer.issue(alice_request()).await.unwrap();

        assert_ne!(first.record.id, second.record.id);
        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, second.record.id);
        assert_eq!(records[0].jwt.as_deref(), Some(second.token.as_str()));
        assert_eq!(issuer.list_credentials().await.unwrap(), records);
    }

    #[tokio::test]
    async fn test_issue_without_key_fails_and_stores_nothing() {
        let (issuer, store) = issuer(None);
        assert_eq!(issuer.issuer_did(), None);

        let err = assert_err!(issuer.issue(alice_request()).await);
        assert!(matches!(err, VcError::IssuerNotConfigured));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_issue_unencodable_claim_stores_nothing() {
        let (issuer, store) = issuer(Some(TEST_KEY));
        let mut request = alice_request();
        request.claims.insert("score".into(), ClaimValue::Float(f64::NAN));

        let err = assert_err!(issuer.issue(request).await);
        assert!(matches!(err, VcError::Encoding(_)));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_issue_defaults() {
        let (issuer, _) = issuer(Some(TEST_KEY));
        let issued = issuer.issue(IssueRequest::default()).await.unwrap();

        assert!(issued.record.subject.starts_with("did:example:"));
        assert_eq!(
            issued.record.raw.vc.types,
            vec!["VerifiableCredential", "IdentityCredential"]
        );
        assert_eq!(issued.record.raw.vc.subject(), Some(issued.record.subject.as_str()));
    }

    #[tokio::test]
    async fn test_issue_keeps_supplied_id() {
        let (issuer, _) = issuer(Some(TEST_KEY));
        let mut request = alice_request();
        request.id = Some("urn:uuid:1234".into());
        let issued = issuer.issue(request).await.unwrap();
        assert_eq!(issued.record.id, "urn:uuid:1234");
        assert_eq!(issued.record.raw.vc.id, "urn:uuid:1234");
    }

    #[tokio::test]
    async fn test_issue_refuses_reused_id() {
        let (issuer, store) = issuer(Some(TEST_KEY));
        let mut request = alice_request();
        request.id = Some("dup-1".into());

        assert_ok!(issuer.issue(request.clone()).await);
        let err = assert_err!(issuer.issue(request).await);
        assert!(matches!(err, VcError::DuplicateIdentifier(id) if id == "dup-1"));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_issue_refuses_revoked_id() {
        let revocations = Arc::new(RevocationRegistry::new(Arc::new(
            MemoryStore::<RevocationEntry>::new(),
        )));
        revocations.revoke("dup-1").await.unwrap();

        let (issuer, store) = issuer(Some(TEST_KEY));
        let issuer = issuer.with_revocations(revocations);
        let mut request = alice_request();
        request.id = Some("dup-1".into());

        let err = assert_err!(issuer.issue(request).await);
        assert!(matches!(err, VcError::DuplicateIdentifier(_)));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_issues_of_one_id_store_one_record() {
        let (issuer, store) = issuer(Some(TEST_KEY));
        let mut handles = Vec::new();
        for _ in 0..5 {
            let issuer = issuer.clone();
            let mut request = alice_request();
            request.id = Some("race-1".into());
            handles.push(tokio::spawn(async move { issuer.issue(request).await }));
        }

        let mut succeeded = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }
        assert_eq!(succeeded, 1);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[test]
    fn test_issuer_did_is_stable() {
        let (a, _) = issuer(Some(TEST_KEY));
        let (b, _) = issuer(Some(TEST_KEY));
        assert_eq!(a.issuer_did(), b.issuer_did());
        assert_eq!(
            a.issuer_did().as_deref(),
            Some("did:ethr:0x2c7536E3605D9C16a7a3D7b1898e529396a65c23")
        );
    }

    #[test]
    fn test_request_accepts_claim_alias() {
        let request: IssueRequest =
            serde_json::from_str(r#"{"subject":"did:example:x","type":"Degree","claim":{"gpa":4}}"#)
                .unwrap();
        assert_eq!(request.credential_type.as_deref(), Some("Degree"));
        assert_eq!(request.claims["gpa"], ClaimValue::Integer(4));
    }
}
