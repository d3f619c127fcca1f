use crate::bls::PublicKey;
use alloy_primitives::B256;

/// Describes a single unique auction.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AuctionRequest {
    /// Slot for the proposal
    pub slot: u64,
    /// Hash of the parent block for the proposal
    pub parent_hash: B256,
    /// Public key of the proposer for the proposal
    pub public_key: PublicKey,
}

impl std::fmt::Display for AuctionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.slot;
        let parent_hash = &self.parent_hash;
        let public_key = &self.public_key;
        write!(f, "slot {slot}, parent hash {parent_hash} and proposer {public_key}")
    }
}
