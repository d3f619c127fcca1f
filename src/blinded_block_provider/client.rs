use crate::{
    bls::PublicKey,
    error::RelayError,
    relay::RelayEndpoint,
    types::{
        AuctionRequest, GetHeaderResponse, GetPayloadResponse, SignedBlindedBeaconBlock,
        SignedValidatorRegistration,
    },
};
use reqwest::{header, Client as HttpClient, Method, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use tokio_util::sync::CancellationToken;

pub const PATH_STATUS: &str = "/eth/v1/builder/status";
pub const PATH_REGISTER_VALIDATORS: &str = "/eth/v1/builder/validators";
pub const PATH_GET_PAYLOAD: &str = "/eth/v1/builder/blinded_blocks";

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NO_PAYLOAD: Option<&()> = None;

fn full_user_agent(forwarded: &str) -> String {
    format!("mev-boost/{VERSION} {forwarded}").trim_end().to_string()
}

/// A client for one configured relay. All requests share the service-wide
/// `reqwest::Client`, which carries the relay request timeout and leaves
/// redirects unfollowed.
#[derive(Clone)]
pub struct Client {
    endpoint: RelayEndpoint,
    http: HttpClient,
}

impl Client {
    pub fn new(endpoint: RelayEndpoint, http: HttpClient) -> Self {
        Self { endpoint, http }
    }

    pub fn endpoint(&self) -> &RelayEndpoint {
        &self.endpoint
    }

    pub fn public_key(&self) -> &PublicKey {
        self.endpoint.public_key()
    }

    pub async fn check_status(
        &self,
        user_agent: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<(), RelayError> {
        self.send(Method::GET, self.endpoint.uri(PATH_STATUS), user_agent, NO_PAYLOAD, cancel)
            .await
            .map(|_| ())
    }

    pub async fn register_validators(
        &self,
        registrations: &[SignedValidatorRegistration],
        user_agent: &str,
    ) -> Result<(), RelayError> {
        self.send(
            Method::POST,
            self.endpoint.uri(PATH_REGISTER_VALIDATORS),
            user_agent,
            Some(registrations),
            None,
        )
        .await
        .map(|_| ())
    }

    /// Solicits a bid for the given auction. `Ok(None)` is a well-behaved
    /// relay with nothing to offer (`204 No Content`).
    pub async fn fetch_best_bid(
        &self,
        auction_request: &AuctionRequest,
        user_agent: &str,
    ) -> Result<Option<GetHeaderResponse>, RelayError> {
        let path = format!(
            "/eth/v1/builder/header/{}/{}/{}",
            auction_request.slot, auction_request.parent_hash, auction_request.public_key
        );
        let (status, response) = self
            .send_json::<GetHeaderResponse, ()>(
                Method::GET,
                self.endpoint.uri(&path),
                user_agent,
                NO_PAYLOAD,
                None,
            )
            .await?;

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        response.ok_or(RelayError::BidEmpty).map(Some)
    }

    pub async fn open_bid(
        &self,
        signed_block: &SignedBlindedBeaconBlock,
        user_agent: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<GetPayloadResponse, RelayError> {
        let (_, response) = self
            .send_json::<GetPayloadResponse, _>(
                Method::POST,
                self.endpoint.uri(PATH_GET_PAYLOAD),
                user_agent,
                Some(signed_block),
                cancel,
            )
            .await?;
        response.ok_or(RelayError::BidEmpty)
    }

    /// Dispatches a request, mapping the response status; the body is ignored.
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        user_agent: &str,
        payload: Option<&B>,
        cancel: Option<&CancellationToken>,
    ) -> Result<StatusCode, RelayError> {
        let call = async {
            let response = self.dispatch(method, url, user_agent, payload).await?;
            Ok(response.status())
        };
        with_cancellation(call, cancel).await
    }

    /// Dispatches a request and decodes a non-empty `2xx` body as JSON.
    async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        user_agent: &str,
        payload: Option<&B>,
        cancel: Option<&CancellationToken>,
    ) -> Result<(StatusCode, Option<T>), RelayError> {
        let call = async {
            let response = self.dispatch(method, url, user_agent, payload).await?;
            let status = response.status();
            if status == StatusCode::NO_CONTENT {
                return Ok((status, None));
            }

            let body = response.bytes().await.map_err(into_transport_error)?;
            if body.is_empty() {
                return Ok((status, None));
            }
            let value = serde_json::from_slice(&body).map_err(RelayError::Decode)?;
            Ok((status, Some(value)))
        };
        with_cancellation(call, cancel).await
    }

    async fn dispatch<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        user_agent: &str,
        payload: Option<&B>,
    ) -> Result<reqwest::Response, RelayError> {
        let mut request =
            self.http.request(method, url).header(header::USER_AGENT, full_user_agent(user_agent));
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let response = request.send().await.map_err(into_transport_error)?;

        let status = response.status();
        if status != StatusCode::NO_CONTENT && !status.is_success() {
            return Err(RelayError::HttpStatus { code: status.as_u16() });
        }
        Ok(response)
    }
}

fn into_transport_error(err: reqwest::Error) -> RelayError {
    if err.is_timeout() {
        RelayError::Timeout
    } else {
        RelayError::Network(err)
    }
}

async fn with_cancellation<T>(
    call: impl std::future::Future<Output = Result<T, RelayError>>,
    cancel: Option<&CancellationToken>,
) -> Result<T, RelayError> {
    match cancel {
        Some(token) => tokio::select! {
            _ = token.cancelled() => Err(RelayError::Canceled),
            result = call => result,
        },
        None => call.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_carries_version_and_forwarded_agent() {
        let ua = full_user_agent("lighthouse/v4.5.0");
        assert_eq!(ua, format!("mev-boost/{VERSION} lighthouse/v4.5.0"));

        let bare = full_user_agent("");
        assert_eq!(bare, format!("mev-boost/{VERSION}"));
    }
}
