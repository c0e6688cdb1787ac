use dashmap::DashMap;
use serde::Deserialize;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

// ── Types ──────────────────────────────────────────────────────────────────

/// Resolves a visitor IP to a country name.
///
/// Disabled locators answer `None` for everything, which lands every click in
/// the "Unknown" country bucket. Enabled ones ask ip-api.com and remember the
/// answer (including misses) for the lifetime of the process.
#[derive(Clone, Debug, Default)]
pub struct GeoLocator {
    client: Option<reqwest::Client>,
    cache: Arc<DashMap<String, Option<String>>>,
}

impl GeoLocator {
    /// Build a locator; only an enabled one owns an HTTP client.
    pub fn new(enabled: bool) -> reqwest::Result<Self> {
        if !enabled {
            return Ok(Self::disabled());
        }

        // Lookups sit on the redirect path
        let client = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .build()?;

        Ok(Self {
            client: Some(client),
            cache: Arc::new(DashMap::new()),
        })
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    #[cfg(test)]
    pub(crate) fn cached_lookups(&self) -> usize {
        self.cache.len()
    }

    /// Country for `ip`, or `None` when lookups are off, the address is
    /// private, or the service had no answer.
    pub async fn country(&self, ip: &str) -> Option<String> {
        let client = self.client.as_ref()?;
        if is_private(ip) {
            return None;
        }

        if let Some(entry) = self.cache.get(ip) {
            return entry.clone();
        }

        let result = fetch_country(client, ip).await;

        // Cache misses too so a failing IP isn't retried on every click
        self.cache.insert(ip.to_owned(), result.clone());

        result
    }
}

// ── ip-api.com response shape ──────────────────────────────────────────────

#[derive(Deserialize)]
struct IpApiResponse {
    status: String,
    country: Option<String>,
}

// ── Internal helpers ───────────────────────────────────────────────────────

async fn fetch_country(client: &reqwest::Client, ip: &str) -> Option<String> {
    let url = format!("http://ip-api.com/json/{}?fields=status,country", ip);

    let resp = client
        .get(&url)
        .send()
        .await
        .map_err(|e| tracing::debug!("geo lookup network error for {}: {}", ip, e))
        .ok()?;

    let body: IpApiResponse = resp
        .json()
        .await
        .map_err(|e| tracing::debug!("geo lookup parse error for {}: {}", ip, e))
        .ok()?;

    if body.status != "success" {
        tracing::debug!("geo lookup returned non-success status for {}", ip);
        return None;
    }

    body.country.filter(|s| !s.is_empty())
}

/// Return `true` for addresses that should never be sent to a public
/// geolocation API: loopback, link-local, private ranges, and IPv6 special
/// addresses.
fn is_private(ip_str: &str) -> bool {
    // Strip IPv6-mapped IPv4 prefix: "::ffff:1.2.3.4" → "1.2.3.4"
    let ip_str = ip_str.strip_prefix("::ffff:").unwrap_or(ip_str);

    match IpAddr::from_str(ip_str) {
        Ok(IpAddr::V4(addr)) => {
            let octets = addr.octets();
            addr.is_loopback()
                || addr.is_link_local()
                || addr.is_unspecified()
                || addr.is_broadcast()
                || octets[0] == 10
                || (octets[0] == 172 && (16..=31).contains(&octets[1]))
                || (octets[0] == 192 && octets[1] == 168)
        }
        Ok(IpAddr::V6(addr)) => {
            addr.is_loopback()
                || addr.is_unspecified()
                // fe80::/10
                || (addr.segments()[0] & 0xffc0) == 0xfe80
                // fc00::/7
                || (addr.segments()[0] & 0xfe00) == 0xfc00
        }
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_ranges_are_detected() {
        for ip in [
            "127.0.0.1",
            "10.1.2.3",
            "172.16.0.1",
            "172.31.255.255",
            "192.168.1.1",
            "169.254.0.1",
            "::1",
            "fe80::1",
            "fd00::1",
            "::ffff:192.168.0.1",
            "not-an-ip",
        ] {
            assert!(is_private(ip), "{ip} should be private");
        }
    }

    #[test]
    fn public_addresses_are_not_private() {
        for ip in ["8.8.8.8", "172.32.0.1", "2001:4860:4860::8888"] {
            assert!(!is_private(ip), "{ip} should be public");
        }
    }

    #[tokio::test]
    async fn disabled_locator_never_resolves() {
        let geo = GeoLocator::new(false).unwrap();
        assert!(!geo.is_enabled());
        assert_eq!(geo.country("8.8.8.8").await, None);
    }

    #[tokio::test]
    async fn private_ip_is_skipped_even_when_enabled() {
        let geo = GeoLocator::new(true).unwrap();
        assert!(geo.is_enabled());
        assert_eq!(geo.country("192.168.1.10").await, None);
        assert_eq!(geo.cached_lookups(), 0);
    }
}
