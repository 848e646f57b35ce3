//! Client identity for rate limiting.
//!
//! Turns the proxy headers and transport address of a request into the key
//! the admission engine buckets counters by. Resolution never fails: when
//! nothing usable is found the request is attributed to the loopback client.

use geogate_common::RateLimitConfig;
use http::{HeaderMap, HeaderName};
use tracing::{debug, warn};

/// Address used when neither headers nor the socket yield anything usable.
pub const LOOPBACK_V4: &str = "127.0.0.1";

/// Key shared by all loopback traffic.
pub const LOCALHOST_KEY: &str = "localhost";

const IPV6_LOOPBACK_LITERALS: [&str; 2] = ["0:0:0:0:0:0:0:1", "::1"];
const IPV4_MAPPED_PREFIX: &str = "::ffff:";
const MIN_ADDRESS_LEN: usize = 7;

/// Resolves client keys from request headers.
///
/// Headers are consulted in the order given; the first one carrying a
/// plausible address wins.
#[derive(Debug, Clone)]
pub struct ClientKeyResolver {
    headers: Vec<HeaderName>,
}

impl ClientKeyResolver {
    /// Build a resolver from header names in priority order.
    ///
    /// Names that are not valid HTTP header names are skipped.
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let headers = headers
            .into_iter()
            .filter_map(|name| {
                let name = name.as_ref();
                match HeaderName::from_bytes(name.as_bytes()) {
                    Ok(header) => Some(header),
                    Err(_) => {
                        warn!(header = name, "ignoring invalid client address header name");
                        None
                    }
                }
            })
            .collect();
        Self { headers }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(&config.trusted_headers)
    }

    /// Header names consulted, highest priority first.
    pub fn headers(&self) -> &[HeaderName] {
        &self.headers
    }

    /// Best guess at the originating client address.
    ///
    /// `remote_addr` is the transport peer address without port, if known.
    pub fn client_address(&self, headers: &HeaderMap, remote_addr: Option<&str>) -> String {
        let from_header = self.headers.iter().find_map(|name| {
            let value = headers.get(name)?.to_str().ok()?;
            if is_valid_address(value) {
                debug!(client_ip = value, header = %name, "client address found in header");
                Some(value)
            } else {
                None
            }
        });

        let mut address = match from_header {
            Some(value) => value.to_string(),
            None => {
                let remote = remote_addr.unwrap_or_default();
                debug!(client_ip = remote, "using remote address as client address");
                remote.to_string()
            }
        };

        // "client, proxy1, proxy2": the first hop is the original client.
        if let Some((first, _)) = address.split_once(',') {
            address = first.trim().to_string();
            debug!(client_ip = %address, "took first entry of forwarding chain");
        }

        if let Some(mapped) = unwrap_ipv4_mapped(&address) {
            debug!(client_ip = mapped, "unwrapped IPv4-mapped IPv6 address");
            address = mapped.to_string();
        }

        if !is_valid_address(&address) {
            debug!("no usable client address, defaulting to loopback");
            address = LOOPBACK_V4.to_string();
        }

        address
    }

    /// The rate-limit key for a request.
    pub fn client_key(&self, headers: &HeaderMap, remote_addr: Option<&str>) -> String {
        normalize_key(&self.client_address(headers, remote_addr))
    }
}

impl Default for ClientKeyResolver {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}

/// `true` if `address` looks like a real address rather than a placeholder.
pub fn is_valid_address(address: &str) -> bool {
    !address.is_empty()
        && !address.eq_ignore_ascii_case("unknown")
        && !address.eq_ignore_ascii_case(LOCALHOST_KEY)
        && !IPV6_LOOPBACK_LITERALS.contains(&address)
        && address.len() >= MIN_ADDRESS_LEN
}

/// `true` for four dot-separated decimal octets, each 0-255.
pub fn is_ipv4_dotted_quad(address: &str) -> bool {
    let mut octets = 0;
    for part in address.split('.') {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        if part.parse::<u8>().is_err() {
            return false;
        }
        octets += 1;
    }
    octets == 4
}

/// Collapse loopback addresses into a single key. Everything else is its own key.
pub fn normalize_key(address: &str) -> String {
    if address == LOOPBACK_V4 || IPV6_LOOPBACK_LITERALS.contains(&address) {
        LOCALHOST_KEY.to_string()
    } else {
        address.to_string()
    }
}

fn unwrap_ipv4_mapped(address: &str) -> Option<&str> {
    let prefix = address.get(..IPV4_MAPPED_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(IPV4_MAPPED_PREFIX) {
        return None;
    }
    let mapped = &address[IPV4_MAPPED_PREFIX.len()..];
    is_ipv4_dotted_quad(mapped).then_some(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(*value));
        }
        map
    }

    #[test]
    fn forwarding_chain_yields_first_hop() {
        let resolver = ClientKeyResolver::default();
        let map = headers(&[("x-forwarded-for", "203.0.113.5, 10.0.0.1")]);
        assert_eq!(resolver.client_key(&map, Some("10.0.0.254")), "203.0.113.5");
    }

    #[test]
    fn mapped_ipv4_remote_is_unwrapped() {
        let resolver = ClientKeyResolver::default();
        let key = resolver.client_key(&HeaderMap::new(), Some("::ffff:192.168.1.10"));
        assert_eq!(key, "192.168.1.10");
    }

    #[test]
    fn mapped_prefix_with_non_ipv4_is_kept() {
        let resolver = ClientKeyResolver::default();
        let key = resolver.client_key(&HeaderMap::new(), Some("::ffff:abcd:1"));
        assert_eq!(key, "::ffff:abcd:1");
    }

    #[test]
    fn loopback_remotes_collapse_to_localhost() {
        let resolver = ClientKeyResolver::default();
        for remote in ["127.0.0.1", "0:0:0:0:0:0:0:1", "::1"] {
            assert_eq!(
                resolver.client_key(&HeaderMap::new(), Some(remote)),
                LOCALHOST_KEY,
                "remote {}",
                remote
            );
        }
    }

    #[test]
    fn missing_everything_falls_back_to_localhost() {
        let resolver = ClientKeyResolver::default();
        assert_eq!(resolver.client_address(&HeaderMap::new(), None), LOOPBACK_V4);
        assert_eq!(resolver.client_key(&HeaderMap::new(), None), LOCALHOST_KEY);
    }

    #[test]
    fn placeholder_headers_are_skipped() {
        let resolver = ClientKeyResolver::default();
        let map = headers(&[
            ("x-forwarded-for", "unknown"),
            ("x-real-ip", "localhost"),
            ("proxy-client-ip", "1.2.3"),
            ("wl-proxy-client-ip", "198.51.100.20"),
        ]);
        assert_eq!(resolver.client_key(&map, Some("10.0.0.1")), "198.51.100.20");
    }

    #[test]
    fn header_priority_is_respected() {
        let resolver = ClientKeyResolver::default();
        let map = headers(&[
            ("x-real-ip", "198.51.100.1"),
            ("x-forwarded-for", "203.0.113.9"),
        ]);
        assert_eq!(resolver.client_key(&map, None), "203.0.113.9");
    }

    #[test]
    fn custom_header_list() {
        let resolver = ClientKeyResolver::new(["CF-Connecting-IP"]);
        let map = headers(&[
            ("x-forwarded-for", "203.0.113.9"),
            ("cf-connecting-ip", "198.51.100.77"),
        ]);
        assert_eq!(resolver.client_key(&map, None), "198.51.100.77");

        let ignored = ClientKeyResolver::new(["bad header", "X-Real-IP"]);
        assert_eq!(ignored.headers().len(), 1);
    }

    #[test]
    fn falls_back_to_remote_address() {
        let resolver = ClientKeyResolver::default();
        let map = headers(&[("x-forwarded-for", "unknown")]);
        assert_eq!(resolver.client_key(&map, Some("198.51.100.3")), "198.51.100.3");
    }

    #[test]
    fn chain_with_placeholder_first_hop_falls_back() {
        let resolver = ClientKeyResolver::default();
        let map = headers(&[("x-forwarded-for", "unknown, 10.0.0.1")]);
        assert_eq!(resolver.client_key(&map, None), LOCALHOST_KEY);
    }

    #[test]
    fn non_loopback_addresses_pass_through() {
        assert_eq!(normalize_key("2001:db8::1"), "2001:db8::1");
        assert_eq!(normalize_key("10.1.2.3"), "10.1.2.3");
    }

    #[test]
    fn dotted_quad_validation() {
        assert!(is_ipv4_dotted_quad("192.168.1.10"));
        assert!(is_ipv4_dotted_quad("0.0.0.0"));
        assert!(!is_ipv4_dotted_quad("256.1.1.1"));
        assert!(!is_ipv4_dotted_quad("1.2.3"));
        assert!(!is_ipv4_dotted_quad("1.2.3.4.5"));
        assert!(!is_ipv4_dotted_quad("a.b.c.d"));
        assert!(!is_ipv4_dotted_quad("1..2.3"));
    }

    #[test]
    fn address_validity() {
        assert!(is_valid_address("1.2.3.4"));
        assert!(!is_valid_address(""));
        assert!(!is_valid_address("UNKNOWN"));
        assert!(!is_valid_address("LocalHost"));
        assert!(!is_valid_address("0:0:0:0:0:0:0:1"));
        assert!(!is_valid_address("1.2.3"));
    }
}
