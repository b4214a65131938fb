//! Strongbox API - HTTP client for the Strongbox server
//!
//! Provides an async client for:
//! - Account registration and public key lookup
//! - Pulling metadata updates and pushing signed changes
//! - Content-addressed chunk transfer
//! - Usage queries
//!
//! ## Modules
//!
//! - [`request`] - Request/response types and the signed request envelope
//! - [`client`] - HTTP client implementing the `IServerApi` port
//! - [`rate_limit`] - Client-side request throttling

pub mod client;
pub mod rate_limit;
pub mod request;

use reqwest::StatusCode;
use strongbox_core::ports::ServerError;
use thiserror::Error;

pub use client::{ApiClient, RetryPolicy};
pub use rate_limit::ApiRateLimiter;
pub use request::{ErrorWrapper, Request, RequestWrapper, SignedRequest, CLIENT_VERSION};

/// Errors that can occur when talking to the server over HTTP
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never got a response (connect failure, timeout, reset)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The server answered with a structured error
    #[error("Server returned {status}: {error:?}")]
    Rejected {
        status: StatusCode,
        error: ErrorWrapper,
    },

    /// The server answered with something that is not a known error body
    #[error("Unexpected response {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    /// The request or response body could not be (de)serialized
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<ApiError> for ServerError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Network(_) => ServerError::Unreachable,
            ApiError::Rejected { error, .. } => match error {
                ErrorWrapper::Endpoint(e) => ServerError::Endpoint(e),
                ErrorWrapper::ClientUpdateRequired => ServerError::ClientUpdateRequired,
                ErrorWrapper::InvalidAuth | ErrorWrapper::ExpiredAuth => ServerError::InvalidAuth,
                ErrorWrapper::InternalError => {
                    ServerError::Unexpected("internal server error".to_string())
                }
                ErrorWrapper::BadRequest => ServerError::Unexpected("bad request".to_string()),
            },
            ApiError::UnexpectedStatus { status, .. } if status == StatusCode::UPGRADE_REQUIRED => {
                ServerError::ClientUpdateRequired
            }
            ApiError::UnexpectedStatus { status, body } => {
                ServerError::Unexpected(format!("{status}: {body}"))
            }
            ApiError::InvalidResponse(msg) => ServerError::Unexpected(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strongbox_core::ports::EndpointError;

    #[test]
    fn test_rejections_map_to_server_errors() {
        let err: ServerError = ApiError::Rejected {
            status: StatusCode::CONFLICT,
            error: ErrorWrapper::Endpoint(EndpointError::OldVersionIncorrect),
        }
        .into();
        assert_eq!(
            err,
            ServerError::Endpoint(EndpointError::OldVersionIncorrect)
        );

        let err: ServerError = ApiError::Rejected {
            status: StatusCode::UNAUTHORIZED,
            error: ErrorWrapper::ExpiredAuth,
        }
        .into();
        assert_eq!(err, ServerError::InvalidAuth);
    }

    #[test]
    fn test_upgrade_required_status() {
        let err: ServerError = ApiError::UnexpectedStatus {
            status: StatusCode::UPGRADE_REQUIRED,
            body: String::new(),
        }
        .into();
        assert_eq!(err, ServerError::ClientUpdateRequired);
    }

    #[test]
    fn test_unknown_status_is_unexpected() {
        let err: ServerError = ApiError::UnexpectedStatus {
            status: StatusCode::IM_A_TEAPOT,
            body: "short and stout".to_string(),
        }
        .into();
        assert!(matches!(err, ServerError::Unexpected(msg) if msg.contains("short and stout")));
    }
}
