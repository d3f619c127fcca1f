use crate::{
    blinded_block_provider::BlindedBlockProvider,
    config,
    error::Error,
    types::{AuctionRequest, SignedBlindedBeaconBlock, SignedValidatorRegistration},
};
use alloy_primitives::B256;
use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, IntoMakeService},
    Router,
};
use hyper::server::conn::AddrIncoming;
use serde_json::{json, Value};
use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};
use tokio::task::JoinHandle;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Type alias for the configured axum server
pub type BlockProviderServer = axum::Server<AddrIncoming, IntoMakeService<Router>>;

fn forwarded_user_agent(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn handle_root() -> impl IntoResponse {
    Json(json!({}))
}

async fn handle_status_check<B: BlindedBlockProvider>(
    State(builder): State<B>,
    headers: HeaderMap,
) -> Result<Json<Value>, Error> {
    let user_agent = forwarded_user_agent(&headers);
    builder.check_status(&user_agent).await?;
    Ok(Json(json!({})))
}

async fn handle_validator_registration<B: BlindedBlockProvider>(
    State(builder): State<B>,
    headers: HeaderMap,
    registrations: Result<Json<Vec<SignedValidatorRegistration>>, JsonRejection>,
) -> Result<Json<Value>, Error> {
    let Json(registrations) =
        registrations.map_err(|err| Error::InvalidRequest(err.to_string()))?;
    tracing::debug!(count = registrations.len(), "processing validator registrations");
    let user_agent = forwarded_user_agent(&headers);
    builder.register_validators(&registrations, &user_agent).await?;
    Ok(Json(json!({})))
}

async fn handle_fetch_bid<B: BlindedBlockProvider>(
    State(builder): State<B>,
    Path((slot, parent_hash, public_key)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, Error> {
    let auction_request = parse_auction_request(&slot, &parent_hash, &public_key)?;
    let user_agent = forwarded_user_agent(&headers);
    match builder.fetch_best_bid(&auction_request, &user_agent).await? {
        Some(response) => Ok(Json(response).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn handle_open_bid<B: BlindedBlockProvider>(
    State(builder): State<B>,
    headers: HeaderMap,
    signed_block: Result<Json<SignedBlindedBeaconBlock>, JsonRejection>,
) -> Result<Response, Error> {
    let Json(signed_block) = signed_block.map_err(|err| Error::InvalidRequest(err.to_string()))?;
    let user_agent = forwarded_user_agent(&headers);
    let response = builder.open_bid(signed_block, &user_agent).await?;
    Ok(Json(response).into_response())
}

fn parse_auction_request(
    slot: &str,
    parent_hash: &str,
    public_key: &str,
) -> Result<AuctionRequest, Error> {
    let slot = slot.parse::<u64>().map_err(|_| Error::InvalidSlot)?;

    if parent_hash.len() != 66 {
        return Err(Error::InvalidHash);
    }
    let parent_hash = parent_hash.parse::<B256>().map_err(|_| Error::InvalidHash)?;

    if public_key.len() != 98 {
        return Err(Error::InvalidPubkey);
    }
    let public_key = public_key.parse().map_err(|_| Error::InvalidPubkey)?;

    Ok(AuctionRequest { slot, parent_hash, public_key })
}

pub struct Server<B: BlindedBlockProvider> {
    host: Ipv4Addr,
    port: u16,
    builder: B,
}

impl<B: BlindedBlockProvider + Clone + Send + Sync + 'static> Server<B> {
    pub fn new(host: Ipv4Addr, port: u16, builder: B) -> Self {
        Self { host, port, builder }
    }

    /// Configures and binds the axum server
    pub fn serve(&self) -> Result<BlockProviderServer, Error> {
        let router = Router::new()
            .route("/", get(handle_root))
            .route("/eth/v1/builder/status", get(handle_status_check::<B>))
            .route("/eth/v1/builder/validators", post(handle_validator_registration::<B>))
            .route(
                "/eth/v1/builder/header/:slot/:parent_hash/:pubkey",
                get(handle_fetch_bid::<B>),
            )
            .route("/eth/v1/builder/blinded_blocks", post(handle_open_bid::<B>))
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(Duration::from_millis(config::SERVER_WRITE_TIMEOUT_MS)))
            .with_state(self.builder.clone());
        let addr = SocketAddr::from((self.host, self.port));
        let server = axum::Server::try_bind(&addr)
            .map_err(Error::ServerAlreadyRunning)?
            .http1_header_read_timeout(Duration::from_millis(config::SERVER_READ_HEADER_TIMEOUT_MS))
            .serve(router.into_make_service());
        Ok(server)
    }

    /// Spawns the server on a new task returning the handle for it
    pub fn spawn(&self) -> Result<JoinHandle<()>, Error> {
        let server = self.serve()?;
        let address = server.local_addr();
        Ok(tokio::spawn(async move {
            tracing::info!("listening at {address}...");
            if let Err(err) = server.await {
                tracing::error!(%err, "error while listening for incoming connections");
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARENT_HASH: &str =
        "0xe28385e7bd68df656cd0042b74b69c3104b5356ed1f20eb69f1f925df47a3ab7";
    const PUBLIC_KEY: &str = "0x8a1d7b8dd64e0aafe7ea7b6c95065c9364cf99d38470c12ee807d55f7de1529ad29ce2c422e0b65e3d5a05c02caca249";

    #[test]
    fn parses_well_formed_auction_request() {
        let request = parse_auction_request("123", PARENT_HASH, PUBLIC_KEY).unwrap();
        assert_eq!(request.slot, 123);
        assert_eq!(request.parent_hash, PARENT_HASH.parse::<B256>().unwrap());
    }

    #[test]
    fn rejects_malformed_slots() {
        for slot in ["", "abc", "-1", "1.5", "18446744073709551616"] {
            assert!(matches!(
                parse_auction_request(slot, PARENT_HASH, PUBLIC_KEY),
                Err(Error::InvalidSlot)
            ));
        }
    }

    #[test]
    fn rejects_malformed_hashes() {
        let truncated = &PARENT_HASH[..65];
        let extended = format!("{PARENT_HASH}0");
        let non_hex = format!("0x{}", "zz".repeat(32));
        for parent_hash in [truncated, &extended, &non_hex] {
            assert!(matches!(
                parse_auction_request("1", parent_hash, PUBLIC_KEY),
                Err(Error::InvalidHash)
            ));
        }
    }

    #[test]
    fn rejects_malformed_public_keys() {
        let truncated = &PUBLIC_KEY[..97];
        let extended = format!("{PUBLIC_KEY}0");
        let non_hex = format!("0x{}", "zz".repeat(48));
        for public_key in [truncated, &extended, &non_hex] {
            assert!(matches!(
                parse_auction_request("1", PARENT_HASH, public_key),
                Err(Error::InvalidPubkey)
            ));
        }
    }
}
