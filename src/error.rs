use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Errors surfaced to the proposer or raised at process boot.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unable to parse relay URL `{0}`: {1}")]
    InvalidRelayUrl(String, #[source] url::ParseError),
    #[error("unable to parse relay public key from URL `{0}`: {1}")]
    InvalidRelayPublicKey(Url, String),
    #[error("invalid genesis fork version `{0}`")]
    InvalidForkVersion(String),
    #[error("no relays provided")]
    NoRelays,
    #[error("server already running")]
    ServerAlreadyRunning(#[source] hyper::Error),
    #[error("could not build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("invalid slot")]
    InvalidSlot,
    #[error("invalid hash")]
    InvalidHash,
    #[error("invalid pubkey")]
    InvalidPubkey,
    #[error("{0}")]
    InvalidRequest(String),
    #[error("no successful relay response")]
    NoSuccessfulRelayResponse,
    #[error("all relays are unavailable")]
    AllRelaysUnavailable,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidSlot
            | Self::InvalidHash
            | Self::InvalidPubkey
            | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NoSuccessfulRelayResponse => StatusCode::BAD_GATEWAY,
            Self::AllRelaysUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorMessage {
    code: u16,
    message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let code = self.status_code();
        let message = ErrorMessage { code: code.as_u16(), message: self.to_string() };
        (code, Json(message)).into_response()
    }
}

/// Failures local to a single relay request; logged and swallowed by the
/// fan-out engine, never aborting the aggregate.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("relay responded with HTTP status {code}")]
    HttpStatus { code: u16 },
    #[error("unable to decode relay response: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("request canceled")]
    Canceled,
    #[error("bid signature failed verification")]
    BidSignatureInvalid,
    #[error("bid public key does not match relay public key")]
    BidPubkeyMismatch,
    #[error("bid parent hash does not match request parent hash")]
    BidParentHashMismatch,
    #[error("bid is empty")]
    BidEmpty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_expected_status_codes() {
        assert_eq!(Error::InvalidSlot.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::InvalidHash.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::InvalidPubkey.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::NoSuccessfulRelayResponse.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(Error::AllRelaysUnavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(Error::NoRelays.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
