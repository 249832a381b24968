//! Mapping from domain errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use recruitr_core::error::{Error, ProviderError};
use serde::{Deserialize, Serialize};
use tracing::error;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An error returned from a gateway handler.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Domain(Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Domain(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Domain(Error::Provider(e)) => match e {
                ProviderError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                ProviderError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::BAD_GATEWAY,
            },
            Self::Domain(Error::Store(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Domain(Error::AccessDenied(_)) => StatusCode::FORBIDDEN,
            Self::Domain(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::BadRequest(message) | Self::Unauthorized(message) => message,
            Self::Domain(err) => {
                error!(error = %err, status = status.as_u16(), "Request failed");
                err.to_string()
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recruitr_core::error::StoreError;

    #[test]
    fn provider_errors_map_to_gateway_statuses() {
        let rate_limited = ApiError::from(Error::Provider(ProviderError::RateLimited {
            retry_after_secs: 5,
        }));
        assert_eq!(rate_limited.status(), StatusCode::TOO_MANY_REQUESTS);

        let network = ApiError::from(Error::Provider(ProviderError::Network("reset".into())));
        assert_eq!(network.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn access_denied_is_forbidden() {
        let err = ApiError::from(Error::AccessDenied("session s1 belongs to another caller".into()));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn store_errors_are_unavailable() {
        let err = ApiError::from(Error::Store(StoreError::Connection("refused".into())));
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
