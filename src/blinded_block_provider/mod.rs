mod client;
mod server;

use crate::{
    error::Error,
    types::{
        AuctionRequest, GetHeaderResponse, GetPayloadResponse, SignedBlindedBeaconBlock,
        SignedValidatorRegistration,
    },
};
use async_trait::async_trait;

pub use client::Client;
pub use server::Server;

/// The builder API surface served to the proposer. `user_agent` is the
/// proposer's own user agent, forwarded on every outbound relay call.
#[async_trait]
pub trait BlindedBlockProvider: Send + Sync {
    async fn check_status(&self, user_agent: &str) -> Result<(), Error>;

    async fn register_validators(
        &self,
        registrations: &[SignedValidatorRegistration],
        user_agent: &str,
    ) -> Result<(), Error>;

    /// Runs the auction; `None` means no relay produced a usable bid.
    async fn fetch_best_bid(
        &self,
        auction_request: &AuctionRequest,
        user_agent: &str,
    ) -> Result<Option<GetHeaderResponse>, Error>;

    async fn open_bid(
        &self,
        signed_block: SignedBlindedBeaconBlock,
        user_agent: &str,
    ) -> Result<GetPayloadResponse, Error>;
}
