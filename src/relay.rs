use crate::{bls::PublicKey, error::Error};
use std::{fmt, str::FromStr};
use url::Url;

/// An entry in the set of relays the proxy multiplexes over: the relay's
/// endpoint with its BLS public key embedded in the URL userinfo, e.g.
/// `https://0x845c...e1f0@relay.example.com`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayEndpoint {
    url: Url,
    public_key: PublicKey,
}

impl RelayEndpoint {
    /// Returns this relay's URL with `path` appended to any configured base
    /// path.
    pub fn uri(&self, path: &str) -> Url {
        let mut url = self.url.clone();
        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base}{path}"));
        url
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

impl fmt::Display for RelayEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

impl TryFrom<Url> for RelayEndpoint {
    type Error = Error;

    fn try_from(url: Url) -> Result<Self, Self::Error> {
        let username = url.username().to_string();
        if username.is_empty() || username.len() != 98 {
            return Err(Error::InvalidRelayPublicKey(
                url,
                "public key field of relay URL must be 48 0x-prefixed hex bytes".to_string(),
            ));
        }

        match username.parse::<PublicKey>() {
            Ok(public_key) => Ok(Self { url, public_key }),
            Err(err) => Err(Error::InvalidRelayPublicKey(
                url,
                format!("unable to parse hex data to public key: {err}"),
            )),
        }
    }
}

impl FromStr for RelayEndpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Url::parse(s) {
            Ok(url) => RelayEndpoint::try_from(url),
            Err(err) => Err(Error::InvalidRelayUrl(s.to_string(), err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUBLIC_KEY: &str = "0x845cf16b370112ebfa7d421028e7eff69d85b99e8f6e250bed0a15b4425ad33cc5e9d7f3d4b4b4f6e6b2e3c97e0ce1f0";

    #[test]
    fn parse_relay_endpoint() {
        let input = format!("https://{PUBLIC_KEY}@relay.example.com");
        let endpoint = input.parse::<RelayEndpoint>().unwrap();

        assert_eq!(endpoint.public_key(), &PUBLIC_KEY.parse().unwrap());
        assert_eq!(endpoint.to_string(), format!("{input}/"));
        assert_eq!(
            endpoint.uri("/eth/v1/builder/status").as_str(),
            format!("https://{PUBLIC_KEY}@relay.example.com/eth/v1/builder/status"),
        );
    }

    #[test]
    fn parse_relay_endpoint_with_port() {
        let input = format!("http://{PUBLIC_KEY}@127.0.0.1:5555");
        let endpoint = input.parse::<RelayEndpoint>().unwrap();
        assert_eq!(
            endpoint.uri("/eth/v1/builder/status").as_str(),
            format!("http://{PUBLIC_KEY}@127.0.0.1:5555/eth/v1/builder/status"),
        );
    }

    #[test]
    fn uri_preserves_a_configured_base_path() {
        let input = format!("https://{PUBLIC_KEY}@relay.example.com/boost");
        let endpoint = input.parse::<RelayEndpoint>().unwrap();
        assert_eq!(
            endpoint.uri("/eth/v1/builder/status").as_str(),
            format!("https://{PUBLIC_KEY}@relay.example.com/boost/eth/v1/builder/status"),
        );
    }

    #[test]
    fn parse_relay_endpoint_errors() {
        let long_public_key = format!("{PUBLIC_KEY}1");
        let short_public_key = &PUBLIC_KEY[..97];
        let non_hex_public_key = format!("0x{}", "zz".repeat(48));
        let host = "@relay.example.com";

        let inputs = [
            String::new(),
            format!("https://{host}"),
            format!("https://relay.example.com"),
            format!("https://{PUBLIC_KEY}"),
            format!("{PUBLIC_KEY}{host}"),
            format!("https://{long_public_key}{host}"),
            format!("https://{short_public_key}{host}"),
            format!("https://{non_hex_public_key}{host}"),
        ];

        for input in &inputs {
            assert!(input.parse::<RelayEndpoint>().is_err(), "expected error for `{input}`");
        }
    }
}
