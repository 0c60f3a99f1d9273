// src/services/api_server.rs
//! API Server for the credential service
//!
//! A thin REST layer over the issuance, verification and revocation services.
//! Handlers only translate between JSON and service calls; every decision is
//! made by the services.
//!
//! Endpoints:
//! - `POST /api/issue`  issue and sign a credential
//! - `POST /api/verify` verify a token (`{"jwt"}`) or a detached credential
//!   (`{"vc", "signature"}`)
//! - `POST /api/revoke` revoke a credential by id
//! - `GET  /api/vcs`    list issued credentials, newest first
//! - `POST /api/upload` store a raw document body, returning its identifier

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::error::{ErrorKind, VcError, VcResult};
use crate::models::credential::{ClaimMap, CredentialPayload, CredentialRecord};
use crate::services::credential_issuer::{CredentialIssuer, IssueRequest};
use crate::services::revocation::{RevocationAck, RevocationRegistry};
use crate::services::verifier::Verifier;
use crate::storage::ipfs_client::ContentStore;

/// Body of `POST /api/verify`.
#[derive(Deserialize)]
#[serde(untagged)]
enum VerifyRequest {
    Token {
        jwt: String,
    },
    Detached {
        vc: ClaimMap,
        #[serde(default)]
        signature: Option<String>,
    },
}

/// Response for credential issuance
#[derive(Serialize)]
struct IssueResponse {
    jwt: String,
    vc: CredentialPayload,
}

/// Request payload for revoking a credential
#[derive(Deserialize)]
struct RevokeRequest {
    #[serde(default)]
    id: String,
}

/// Response for document upload
#[derive(Serialize)]
struct UploadResponse {
    cid: String,
    size: usize,
}

/// Error body shared by every endpoint
#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorKind,
    message: String,
}

impl IntoResponse for VcError {
    fn into_response(self) -> Response {
        let status = match self {
            VcError::MalformedToken(_)
            | VcError::MissingSignature
            | VcError::MissingIdentifier
            | VcError::Encoding(_)
            | VcError::Key(_) => StatusCode::BAD_REQUEST,
            VcError::DuplicateIdentifier(_) => StatusCode::CONFLICT,
            VcError::UnresolvableDid { .. } => StatusCode::BAD_GATEWAY,
            VcError::IssuerNotConfigured
            | VcError::StoreIo(_)
            | VcError::ContentStore(_)
            | VcError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = ErrorResponse {
            error: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// API server state containing all service dependencies
#[derive(Clone)]
pub struct ApiServer {
    /// Service for issuing and listing credentials
    credential_issuer: Arc<CredentialIssuer>,

    /// Service for verifying credentials
    verifier: Arc<Verifier>,

    /// Registry of revoked credentials
    revocations: Arc<RevocationRegistry>,

    /// Storage for uploaded documents
    content_store: Arc<dyn ContentStore>,
}

impl ApiServer {
    /// Creates a new instance of the API server
    ///
    /// # Arguments
    /// * `credential_issuer` - Service for credential issuance
    /// * `verifier` - Service for credential verification
    /// * `revocations` - Registry shared with the verifier
    /// * `content_store` - Backend for document uploads
    pub fn new(
        credential_issuer: CredentialIssuer,
        verifier: Verifier,
        revocations: Arc<RevocationRegistry>,
        content_store: Arc<dyn ContentStore>,
    ) -> Self {
        ApiServer {
            credential_issuer: Arc::new(credential_issuer),
            verifier: Arc::new(verifier),
            revocations,
            content_store,
        }
    }

    /// Builds the router with every endpoint mounted.
    pub fn router(self) -> Router {
        Router::new()
            .route("/api/issue", post(Self::issue_handler))
            .route("/api/verify", post(Self::verify_handler))
            .route("/api/revoke", post(Self::revoke_handler))
            .route("/api/vcs", get(Self::list_handler))
            .route("/api/upload", post(Self::upload_handler))
            .layer(CorsLayer::permissive())
            .with_state(Arc::new(self))
    }

    /// Starts the API server and serves requests until the process exits
    ///
    /// # Arguments
    /// * `addr` - Socket address to bind to (e.g., "127.0.0.1:3000")
    ///
    /// # Errors
    /// Returns [`VcError::Config`] if the address cannot be bound.
    pub async fn run(self, addr: SocketAddr) -> VcResult<()> {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| VcError::Config(format!("cannot bind {}: {}", addr, e)))?;
        info!("API server listening on http://{}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| VcError::Config(format!("server error: {}", e)))
    }

    // =====================
    // Credential Handlers
    // =====================

    /// Issues a signed credential
    ///
    /// # Endpoint
    /// POST /api/issue
    ///
    /// # Responses
    /// - 200 OK: `{ "jwt", "vc" }`
    /// - 500 Internal Server Error: no issuer key configured, or the store failed
    async fn issue_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<IssueRequest>,
    ) -> Result<Json<IssueResponse>, VcError> {
        let issued = state.credential_issuer.issue(payload).await?;
        Ok(Json(IssueResponse {
            jwt: issued.token,
            vc: issued.record.raw,
        }))
    }

    /// Verifies a token or a detached-signature credential
    ///
    /// # Endpoint
    /// POST /api/verify
    ///
    /// # Responses
    /// - 200 OK: verdict with `valid` and `revoked`
    /// - 400 Bad Request: malformed token or missing signature
    async fn verify_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<VerifyRequest>,
    ) -> Result<Response, VcError> {
        let response = match payload {
            VerifyRequest::Token { jwt } => {
                Json(state.verifier.verify_token(&jwt).await?).into_response()
            }
            VerifyRequest::Detached { vc, signature } => Json(
                state
                    .verifier
                    .verify_detached(&vc, signature.as_deref())
                    .await?,
            )
            .into_response(),
        };
        Ok(response)
    }

    /// Revokes a credential
    ///
    /// # Endpoint
    /// POST /api/revoke
    ///
    /// # Responses
    /// - 200 OK: `{ "acknowledged": id }`
    /// - 400 Bad Request: no identifier given
    async fn revoke_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<RevokeRequest>,
    ) -> Result<Json<RevocationAck>, VcError> {
        Ok(Json(state.revocations.revoke(&payload.id).await?))
    }

    /// Lists issued credentials, newest first
    ///
    /// # Endpoint
    /// GET /api/vcs
    async fn list_handler(
        State(state): State<Arc<ApiServer>>,
    ) -> Result<Json<Vec<CredentialRecord>>, VcError> {
        Ok(Json(state.credential_issuer.list_credentials().await?))
    }

    // =====================
    // Document Handlers
    // =====================

    /// Stores an uploaded document
    ///
    /// # Endpoint
    /// POST /api/upload
    ///
    /// # Request Body
    /// Raw document bytes
    async fn upload_handler(
        State(state): State<Arc<ApiServer>>,
        body: Bytes,
    ) -> Result<Json<UploadResponse>, VcError> {
        let size = body.len();
        let cid = state.content_store.store(body.to_vec()).await?;
        Ok(Json(UploadResponse { cid, size }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::did_resolver::EthrResolver;
    use crate::models::revocation::RevocationEntry;
    use crate::storage::ipfs_client::{local_cid, LocalContentStore};
    use crate::storage::record_store::MemoryStore;
    use crate::wallet::key_management::IssuerKey;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    const TEST_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn app(key: Option<&str>) -> Router {
        let revocations = Arc::new(RevocationRegistry::new(Arc::new(
            MemoryStore::<RevocationEntry>::new(),
        )));
        let issuer = CredentialIssuer::new(
            key.map(|k| IssuerKey::from_hex(k).unwrap()),
            "ethr",
            Arc::new(MemoryStore::<CredentialRecord>::new()),
        )
        .with_revocations(revocations.clone());
        let verifier = Verifier::new(
            Arc::new(EthrResolver),
            revocations.clone(),
            Duration::from_secs(5),
        );
        let uploads = std::env::temp_dir().join(format!(
            "vc-service-api-{}",
            crate::utils::crypto::random_hex(4)
        ));
        ApiServer::new(issuer, verifier, revocations, Arc::new(LocalContentStore::new(uploads)))
            .router()
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_issue_verify_revoke_flow() {
        let app = app(Some(TEST_KEY));

        let (status, issued) = call(
            &app,
            Method::POST,
            "/api/issue",
            Some(json!({
                "subject": "did:example:abc123",
                "type": "IdentityCredential",
                "claim": { "name": "Alice" }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(issued["vc"]["vc"]["credentialSubject"]["name"], "Alice");
        let jwt = issued["jwt"].as_str().unwrap().to_string();
        let id = issued["vc"]["vc"]["id"].as_str().unwrap().to_string();

        let (status, verdict) =
            call(&app, Method::POST, "/api/verify", Some(json!({ "jwt": jwt }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(verdict["valid"], true);
        assert_eq!(verdict["revoked"], false);

        let (status, ack) = call(&app, Method::POST, "/api/revoke", Some(json!({ "id": id }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["acknowledged"], id.as_str());

        let (_, verdict) =
            call(&app, Method::POST, "/api/verify", Some(json!({ "jwt": jwt }))).await;
        assert_eq!(verdict["valid"], true);
        assert_eq!(verdict["revoked"], true);

        let (status, listed) = call(&app, Method::GET, "/api/vcs", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["id"], id.as_str());
        assert_eq!(listed[0]["jwt"], jwt.as_str());
    }

    #[tokio::test]
    async fn test_issue_without_key_is_server_error() {
        let app = app(None);
        let (status, body) = call(&app, Method::POST, "/api/issue", Some(json!({}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "IssuerNotConfigured");

        let (_, listed) = call(&app, Method::GET, "/api/vcs", None).await;
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn test_caller_errors_are_bad_requests() {
        let app = app(Some(TEST_KEY));

        let (status, body) =
            call(&app, Method::POST, "/api/verify", Some(json!({ "jwt": "a.b" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "MalformedTokenError");

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/verify",
            Some(json!({ "vc": { "id": "vc-1", "issuer": "did:ethr:0x01" } })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "MissingSignatureError");

        let (status, body) = call(&app, Method::POST, "/api/revoke", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "MissingIdentifier");
    }

    #[tokio::test]
    async fn test_reused_id_is_conflict() {
        let app = app(Some(TEST_KEY));
        let request = json!({ "id": "vc-fixed", "subject": "did:example:abc123" });

        let (status, _) = call(&app, Method::POST, "/api/issue", Some(request.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&app, Method::POST, "/api/issue", Some(request)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "DuplicateIdentifier");

        call(&app, Method::POST, "/api/revoke", Some(json!({ "id": "vc-revoked" }))).await;
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/issue",
            Some(json!({ "id": "vc-revoked" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_upload_returns_content_identifier() {
        let app = app(None);
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/upload")
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(Body::from("diploma scan"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["cid"], local_cid(b"diploma scan").as_str());
        assert_eq!(body["size"], 12);
    }
}
