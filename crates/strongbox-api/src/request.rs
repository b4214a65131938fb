//! Wire types for the server API
//!
//! Every call is a `POST {api_url}{ROUTE}` whose body is a
//! [`RequestWrapper`]: the request value, signed by the account, plus the
//! client version. Success responses carry the route's response type as
//! JSON; failures carry an [`ErrorWrapper`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strongbox_core::domain::{
    Account, Chunk, ChunkHash, DocumentHash, DocumentManifest, FileId, ServerMeta, SignedMeta,
    Username,
};
use strongbox_core::ports::{DocumentUpload, EndpointError, FileDiff, ServerUsage, UpdatesResponse};
use strongbox_crypto::{verify_signature, CryptoError, PublicKeys, SIGNATURE_SIZE};

/// Version string sent with every request
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A typed API call
pub trait Request: Serialize + Send + Sync {
    /// Path appended to the API URL
    const ROUTE: &'static str;
    type Response: DeserializeOwned + Send;
}

// ============================================================================
// Envelope
// ============================================================================

/// A request value signed by the caller's account key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedRequest<T> {
    pub value: T,
    pub timestamp: i64,
    pub public_key: PublicKeys,
    #[serde(with = "strongbox_crypto::hex_serde")]
    pub signature: [u8; SIGNATURE_SIZE],
}

impl<T: Serialize> SignedRequest<T> {
    fn signing_bytes(value: &T, timestamp: i64) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&(value, timestamp))
    }

    pub fn sign(account: &Account, value: T) -> Result<Self, serde_json::Error> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let signature = account.sign(&Self::signing_bytes(&value, timestamp)?);
        Ok(Self {
            value,
            timestamp,
            public_key: account.public_keys(),
            signature,
        })
    }

    pub fn verify(&self) -> Result<(), CryptoError> {
        let bytes = Self::signing_bytes(&self.value, self.timestamp)
            .map_err(|e| CryptoError::Decoding(e.to_string()))?;
        verify_signature(&self.public_key, &bytes, &self.signature)
    }
}

/// Body of every API call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestWrapper<T> {
    pub signed_request: SignedRequest<T>,
    pub client_version: String,
}

/// Body of every failed API call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorWrapper {
    Endpoint(EndpointError),
    ClientUpdateRequired,
    InvalidAuth,
    ExpiredAuth,
    InternalError,
    BadRequest,
}

// ============================================================================
// Routes
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccountRequest {
    pub username: Username,
    pub public_key: PublicKeys,
    pub root_folder: SignedMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccountResponse {
    pub root: ServerMeta,
}

impl Request for NewAccountRequest {
    const ROUTE: &'static str = "/new-account";
    type Response = NewAccountResponse;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPublicKeyRequest {
    pub username: Username,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPublicKeyResponse {
    pub key: PublicKeys,
}

impl Request for GetPublicKeyRequest {
    const ROUTE: &'static str = "/get-public-key";
    type Response = GetPublicKeyResponse;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetUpdatesRequest {
    pub since_metadata_version: u64,
}

impl Request for GetUpdatesRequest {
    const ROUTE: &'static str = "/get-updates";
    type Response = UpdatesResponse;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetFileIdsRequest {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetFileIdsResponse {
    pub ids: Vec<FileId>,
}

impl Request for GetFileIdsRequest {
    const ROUTE: &'static str = "/get-file-ids";
    type Response = GetFileIdsResponse;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetDocumentRequest {
    pub id: FileId,
    pub hash: DocumentHash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetDocumentResponse {
    pub manifest: DocumentManifest,
}

impl Request for GetDocumentRequest {
    const ROUTE: &'static str = "/get-document";
    type Response = GetDocumentResponse;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingChunksRequest {
    pub hashes: Vec<ChunkHash>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingChunksResponse {
    pub missing: Vec<ChunkHash>,
}

impl Request for MissingChunksRequest {
    const ROUTE: &'static str = "/missing-chunks";
    type Response = MissingChunksResponse;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutChunksRequest {
    pub chunks: Vec<Chunk>,
}

impl Request for PutChunksRequest {
    const ROUTE: &'static str = "/put-chunks";
    type Response = ();
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetChunksRequest {
    pub hashes: Vec<ChunkHash>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetChunksResponse {
    pub chunks: Vec<Chunk>,
}

impl Request for GetChunksRequest {
    const ROUTE: &'static str = "/get-chunks";
    type Response = GetChunksResponse;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertRequest {
    pub updates: Vec<FileDiff>,
    pub documents: Vec<DocumentUpload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertResponse {
    pub files: Vec<ServerMeta>,
}

impl Request for UpsertRequest {
    const ROUTE: &'static str = "/upsert";
    type Response = UpsertResponse;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetUsageRequest {}

impl Request for GetUsageRequest {
    const ROUTE: &'static str = "/get-usage";
    type Response = ServerUsage;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteAccountRequest {}

impl Request for DeleteAccountRequest {
    const ROUTE: &'static str = "/delete-account";
    type Response = ();
}
