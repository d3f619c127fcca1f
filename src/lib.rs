mod bid_cache;
pub mod blinded_block_provider;
pub mod bls;
pub mod config;
mod error;
mod relay;
mod relay_mux;
mod service;
pub mod signing;
pub mod types;

pub use blinded_block_provider::BlindedBlockProvider;
pub use config::Config;
pub use error::{Error, RelayError};
pub use relay::RelayEndpoint;
pub use relay_mux::RelayMux;
pub use service::Service;
