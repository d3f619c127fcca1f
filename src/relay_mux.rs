use crate::{
    bid_cache::{BidCache, BidKey, BidRecord},
    blinded_block_provider::{BlindedBlockProvider, Client as Relay},
    error::{Error, RelayError},
    signing::verify_signed_builder_message,
    types::{
        AuctionRequest, GetHeaderResponse, GetPayloadResponse, SignedBlindedBeaconBlock,
        SignedValidatorRegistration,
    },
};
use alloy_primitives::{b256, B256, U256};
use async_trait::async_trait;
use futures::future::join_all;
use std::{
    collections::HashMap,
    ops::Deref,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex,
    },
};
use tokio_util::sync::CancellationToken;

/// Transactions root of a payload carrying no transactions. Bids advertising
/// it pay nothing for inclusion and are treated like zero-value bids.
const EMPTY_TRANSACTIONS_ROOT: B256 =
    b256!("7ffe241ea60187fdb0187bfa22de35d1f9bed7ab061d9401fd47e34a54fbede1");

#[derive(Clone)]
pub struct RelayMux(Arc<RelayMuxInner>);

impl Deref for RelayMux {
    type Target = RelayMuxInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub struct RelayMuxInner {
    relays: Vec<Relay>,
    signing_domain: B256,
    relay_check: bool,
    bids: BidCache,
}

/// Shared aggregation state for one auction; lives only as long as the
/// request that created it.
#[derive(Default)]
struct AuctionState {
    // relays per block hash; multiple relays may deliver the top bid
    relays_by_hash: HashMap<B256, Vec<String>>,
    best: Option<GetHeaderResponse>,
}

impl RelayMux {
    pub fn new(relays: impl Iterator<Item = Relay>, signing_domain: B256, relay_check: bool) -> Self {
        let inner = RelayMuxInner {
            relays: relays.collect(),
            signing_domain,
            relay_check,
            bids: BidCache::default(),
        };
        Self(Arc::new(inner))
    }

    /// Long-lived maintenance loop: periodically sweeps expired entries out
    /// of the bid cache.
    pub async fn run(&self) {
        loop {
            tokio::time::sleep(self.bids.sweep_period()).await;
            self.bids.sweep();
        }
    }
}

#[async_trait]
impl BlindedBlockProvider for RelayMux {
    async fn check_status(&self, user_agent: &str) -> Result<(), Error> {
        if !self.relay_check {
            return Ok(());
        }

        // Make sure at least one relay returns success; the first success
        // cancels the requests still in flight.
        let token = CancellationToken::new();
        let successes = Arc::new(AtomicU32::new(0));
        let mut tasks = Vec::with_capacity(self.relays.len());
        for relay in &self.relays {
            let relay = relay.clone();
            let token = token.clone();
            let successes = successes.clone();
            let user_agent = user_agent.to_string();
            tasks.push(tokio::spawn(async move {
                tracing::debug!(relay = %relay.endpoint(), "checking relay status");
                match relay.check_status(&user_agent, Some(&token)).await {
                    Ok(()) => {
                        successes.fetch_add(1, Ordering::SeqCst);
                        token.cancel();
                    }
                    Err(RelayError::Canceled) => {}
                    Err(err) => {
                        tracing::error!(relay = %relay.endpoint(), %err, "failed to retrieve relay status")
                    }
                }
            }));
        }

        join_all(tasks).await;

        if successes.load(Ordering::SeqCst) > 0 {
            Ok(())
        } else {
            Err(Error::AllRelaysUnavailable)
        }
    }

    async fn register_validators(
        &self,
        registrations: &[SignedValidatorRegistration],
        user_agent: &str,
    ) -> Result<(), Error> {
        let registrations = Arc::new(registrations.to_vec());
        // sized so every task can report even after the handler has replied
        let (response_tx, mut response_rx) = tokio::sync::mpsc::channel(self.relays.len());
        for relay in &self.relays {
            let relay = relay.clone();
            let registrations = registrations.clone();
            let user_agent = user_agent.to_string();
            let response_tx = response_tx.clone();
            tokio::spawn(async move {
                let result = relay.register_validators(&registrations, &user_agent).await;
                if let Err(ref err) = result {
                    tracing::warn!(relay = %relay.endpoint(), %err, "error calling register validator on relay");
                }
                let _ = response_tx.send(result).await;
            });
        }
        drop(response_tx);

        // registrations must reach every relay, so pending requests are not
        // cancelled when the first one succeeds
        while let Some(result) = response_rx.recv().await {
            if result.is_ok() {
                return Ok(());
            }
        }
        Err(Error::NoSuccessfulRelayResponse)
    }

    async fn fetch_best_bid(
        &self,
        auction_request: &AuctionRequest,
        user_agent: &str,
    ) -> Result<Option<GetHeaderResponse>, Error> {
        tracing::debug!(%auction_request, "fetching best bid");

        let state = Arc::new(Mutex::new(AuctionState::default()));
        let mut tasks = Vec::with_capacity(self.relays.len());
        for relay in &self.relays {
            let relay = relay.clone();
            let auction_request = auction_request.clone();
            let user_agent = user_agent.to_string();
            let signing_domain = self.signing_domain;
            let state = state.clone();
            // each request runs to completion on its own; a slow relay only
            // loses the auction, it does not poison it
            tasks.push(tokio::spawn(async move {
                let response = match relay.fetch_best_bid(&auction_request, &user_agent).await {
                    Ok(Some(response)) => response,
                    Ok(None) => {
                        tracing::debug!(relay = %relay.endpoint(), "no-content response");
                        return;
                    }
                    Err(err) => {
                        tracing::warn!(relay = %relay.endpoint(), %err, "error making request to relay");
                        return;
                    }
                };

                let bid = &response.data.message;
                let block_hash = bid.header.block_hash;
                let block_number = bid.header.block_number;
                match validate_bid(&response, &relay, &auction_request, signing_domain) {
                    Ok(()) => {}
                    Err(err @ RelayError::BidEmpty) => {
                        tracing::warn!(relay = %relay.endpoint(), %block_hash, %err, "ignoring bid");
                        return;
                    }
                    Err(err) => {
                        tracing::error!(relay = %relay.endpoint(), %block_hash, %err, "invalid bid");
                        return;
                    }
                }

                tracing::debug!(
                    relay = %relay.endpoint(),
                    %block_hash,
                    block_number,
                    value = %bid.value,
                    "received a good bid"
                );

                let mut state = state.lock().unwrap();
                state
                    .relays_by_hash
                    .entry(block_hash)
                    .or_default()
                    .push(relay.endpoint().to_string());

                // strictly greater wins; an equal-value later arrival does
                // not displace the earlier one
                let displaces = match &state.best {
                    Some(best) => bid.value > best.data.message.value,
                    None => true,
                };
                if displaces {
                    state.best = Some(response);
                }
            }));
        }

        // the auction needs every bid to pick the best one
        join_all(tasks).await;

        let (response, relays) = {
            let mut state = state.lock().unwrap();
            let Some(response) = state.best.take() else {
                tracing::info!(%auction_request, "no bid received");
                return Ok(None);
            };
            let block_hash = response.data.message.header.block_hash;
            let relays = state.relays_by_hash.remove(&block_hash).unwrap_or_default();
            (response, relays)
        };

        let bid = &response.data.message;
        let block_hash = bid.header.block_hash;
        tracing::info!(
            %block_hash,
            block_number = bid.header.block_number,
            value = %bid.value,
            relays = relays.join(", "),
            "best bid"
        );

        // remember the bid to name the responsible relays if the payload is
        // later withheld
        self.bids.store(
            BidKey { slot: auction_request.slot, block_hash },
            BidRecord { response: response.clone(), block_hash, relays },
        );

        Ok(Some(response))
    }

    async fn open_bid(
        &self,
        signed_block: SignedBlindedBeaconBlock,
        user_agent: &str,
    ) -> Result<GetPayloadResponse, Error> {
        let expected_block_hash = signed_block.message.body.execution_payload_header.block_hash;
        let slot = signed_block.message.slot;
        tracing::debug!(block_hash = %expected_block_hash, slot, "opening bid");

        let signed_block = Arc::new(signed_block);
        let token = CancellationToken::new();
        let result: Arc<Mutex<Option<GetPayloadResponse>>> = Arc::new(Mutex::new(None));
        let mut tasks = Vec::with_capacity(self.relays.len());
        for relay in &self.relays {
            let relay = relay.clone();
            let signed_block = signed_block.clone();
            let user_agent = user_agent.to_string();
            let token = token.clone();
            let result = result.clone();
            tasks.push(tokio::spawn(async move {
                let response = match relay.open_bid(&signed_block, &user_agent, Some(&token)).await
                {
                    Ok(response) => response,
                    Err(RelayError::Canceled) => return,
                    Err(err) => {
                        tracing::error!(relay = %relay.endpoint(), %err, "error making request to relay");
                        return;
                    }
                };

                if response.data.block_hash == B256::ZERO {
                    tracing::error!(relay = %relay.endpoint(), "response with empty data");
                    return;
                }
                if response.data.block_hash != expected_block_hash {
                    tracing::error!(
                        relay = %relay.endpoint(),
                        response_block_hash = %response.data.block_hash,
                        "requested block hash does not equal response block hash"
                    );
                    return;
                }

                let mut result = result.lock().unwrap();
                // a concurrent task may have won the race while this one was
                // validating; do not overwrite its payload
                if token.is_cancelled() {
                    return;
                }
                token.cancel();
                *result = Some(response);
                tracing::info!(relay = %relay.endpoint(), block_hash = %expected_block_hash, "received payload from relay");
            }));
        }

        // wait for every task so the cancellations are observed before the
        // handler returns
        join_all(tasks).await;

        let payload = result.lock().unwrap().take();
        match payload {
            Some(response) => Ok(response),
            None => {
                let record = self.bids.load(&BidKey { slot, block_hash: expected_block_hash });
                tracing::error!(
                    slot,
                    block_hash = %expected_block_hash,
                    relays = record.relays.join(", "),
                    "no payload received from relay; withholding or network error"
                );
                Err(Error::NoSuccessfulRelayResponse)
            }
        }
    }
}

fn validate_bid(
    response: &GetHeaderResponse,
    relay: &Relay,
    auction_request: &AuctionRequest,
    signing_domain: B256,
) -> Result<(), RelayError> {
    let bid = &response.data.message;
    if bid.header.block_hash == B256::ZERO {
        return Err(RelayError::BidEmpty);
    }
    if &bid.public_key != relay.public_key() {
        return Err(RelayError::BidPubkeyMismatch);
    }
    match verify_signed_builder_message(bid, &response.data.signature, relay.public_key(), signing_domain)
    {
        Ok(true) => {}
        Ok(false) | Err(_) => return Err(RelayError::BidSignatureInvalid),
    }
    if bid.header.parent_hash != auction_request.parent_hash {
        return Err(RelayError::BidParentHashMismatch);
    }
    if bid.value == U256::ZERO || bid.header.transactions_root == EMPTY_TRANSACTIONS_ROOT {
        return Err(RelayError::BidEmpty);
    }
    Ok(())
}
