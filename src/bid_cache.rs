use crate::types::GetHeaderResponse;
use alloy_primitives::B256;
use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

pub const SWEEP_PERIOD: Duration = Duration::from_secs(60);
pub const RETENTION: Duration = Duration::from_secs(3 * 60);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BidKey {
    pub slot: u64,
    pub block_hash: B256,
}

/// The outcome of one auction: the response returned to the proposer and the
/// relays that advertised the winning block hash, kept around so a later
/// missing payload can be attributed.
#[derive(Clone, Debug, Default)]
pub struct BidRecord {
    pub response: GetHeaderResponse,
    pub block_hash: B256,
    pub relays: Vec<String>,
}

struct StoredBid {
    record: BidRecord,
    stored_at: Instant,
}

/// Time-bounded map from `(slot, block hash)` to the winning bid.
pub struct BidCache {
    bids: Mutex<HashMap<BidKey, StoredBid>>,
    retention: Duration,
    sweep_period: Duration,
}

impl Default for BidCache {
    fn default() -> Self {
        Self::new(RETENTION, SWEEP_PERIOD)
    }
}

impl BidCache {
    pub fn new(retention: Duration, sweep_period: Duration) -> Self {
        Self { bids: Mutex::new(HashMap::new()), retention, sweep_period }
    }

    pub fn store(&self, key: BidKey, record: BidRecord) {
        let mut bids = self.bids.lock().unwrap();
        bids.insert(key, StoredBid { record, stored_at: Instant::now() });
    }

    /// Looks up a bid; an unknown key yields a neutral empty record.
    pub fn load(&self, key: &BidKey) -> BidRecord {
        let bids = self.bids.lock().unwrap();
        bids.get(key).map(|stored| stored.record.clone()).unwrap_or_default()
    }

    /// Drops every entry older than the retention window.
    pub fn sweep(&self) {
        let mut bids = self.bids.lock().unwrap();
        bids.retain(|_, stored| stored.stored_at.elapsed() <= self.retention);
    }

    pub fn sweep_period(&self) -> Duration {
        self.sweep_period
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.bids.lock().unwrap().len()
    }
}
