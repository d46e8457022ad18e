use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OAuthError {
    #[error("no code provided")]
    MissingCode,

    #[error("no state provided")]
    MissingState,

    #[error("GitHub Enterprise flow is not supported")]
    UnsupportedFlow,

    #[error("state is invalid or expired")]
    InvalidOrExpiredState,

    #[error("state was issued for a different host")]
    HostMismatch,

    #[error("state store failure: {0}")]
    Storage(eyre::Report),

    #[error("token exchange failed: {0}")]
    UpstreamExchange(String),
}

impl From<eyre::Report> for OAuthError {
    fn from(err: eyre::Report) -> Self {
        OAuthError::Storage(err)
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            OAuthError::MissingCode
            | OAuthError::MissingState
            | OAuthError::UnsupportedFlow
            | OAuthError::InvalidOrExpiredState => StatusCode::BAD_REQUEST,
            OAuthError::HostMismatch => StatusCode::FORBIDDEN,
            OAuthError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            OAuthError::UpstreamExchange(_) => StatusCode::BAD_GATEWAY,
        };

        (status, self.to_string()).into_response()
    }
}
