use clap::Parser;
use mev_boost_mux::{Config, Service};
use std::net::Ipv4Addr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_HOST: Ipv4Addr = Ipv4Addr::UNSPECIFIED;
const DEFAULT_PORT: u16 = 18550;

#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
struct Args {
    #[clap(long, default_value_t = DEFAULT_HOST)]
    host: Ipv4Addr,

    #[clap(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// a comma-separated list of relay endpoints
    #[clap(long, env, default_value = "")]
    relays: String,

    /// genesis fork version of the target chain, as 0x-prefixed hex
    #[clap(long, env, default_value = "0x00000000")]
    genesis_fork_version: String,

    /// timeout for each request made to a relay, in milliseconds
    #[clap(long, default_value_t = 2000)]
    request_timeout_ms: u64,

    /// require at least one reachable relay when reporting status
    #[clap(long)]
    relay_check: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = Config {
        host: args.host,
        port: args.port,
        relays: args
            .relays
            .split(',')
            .filter(|input| !input.is_empty())
            .map(String::from)
            .collect(),
        genesis_fork_version: args.genesis_fork_version,
        relay_request_timeout_ms: args.request_timeout_ms,
        relay_check: args.relay_check,
    };

    let service = Service::from(config);
    if let Err(err) = service.run().await {
        tracing::error!(%err, "service stopped");
        std::process::exit(1);
    }
}
