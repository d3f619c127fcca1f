use crate::{
    blinded_block_provider::{Client as Relay, Server},
    config::Config,
    error::Error,
    relay::RelayEndpoint,
    relay_mux::RelayMux,
    signing::{compute_domain, DOMAIN_APPLICATION_BUILDER},
};
use alloy_primitives::B256;
use futures::future::join_all;
use std::time::Duration;

pub struct Service {
    config: Config,
}

impl Service {
    pub fn from(config: Config) -> Self {
        Self { config }
    }

    pub async fn run(&self) -> Result<(), Error> {
        let config = &self.config;

        if config.relays.is_empty() {
            return Err(Error::NoRelays);
        }
        let relays = config
            .relays
            .iter()
            .map(|input| input.parse::<RelayEndpoint>())
            .collect::<Result<Vec<_>, _>>()?;
        for relay in &relays {
            tracing::info!(%relay, "configured with relay");
        }

        // derived once; every bid in every auction verifies under it
        let signing_domain =
            compute_domain(DOMAIN_APPLICATION_BUILDER, &config.genesis_fork_version, B256::ZERO)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.relay_request_timeout_ms))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(Error::HttpClient)?;

        let relay_mux = RelayMux::new(
            relays.into_iter().map(|endpoint| Relay::new(endpoint, http.clone())),
            signing_domain,
            config.relay_check,
        );

        let mut tasks = vec![];

        let relay_mux_clone = relay_mux.clone();
        tasks.push(tokio::spawn(async move {
            relay_mux_clone.run().await;
        }));

        let builder_api = Server::new(config.host, config.port, relay_mux);
        tasks.push(builder_api.spawn()?);

        join_all(tasks).await;
        Ok(())
    }
}
