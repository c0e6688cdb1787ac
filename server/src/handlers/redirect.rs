use crate::{error::Error, models::NewClick, shortener, AppState};
use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap},
    response::Redirect,
};
use std::{net::SocketAddr, sync::Arc};

/// GET /:code and GET /api/urls/:code
///
/// 1. Capture the visitor's IP, user agent and referrer.
/// 2. Look up the active link, then its visitor's country when geo lookups
///    are enabled.
/// 3. Record the click in one transaction.
/// 4. Return a 307 redirect to the original URL.
pub async fn redirect(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Redirect, Error> {
    let ip = extract_ip(&headers, addr);
    let user_agent = header_value(&headers, header::USER_AGENT.as_str());
    let referrer = header_value(&headers, header::REFERER.as_str());

    let visit = NewClick {
        ip_address: ip,
        user_agent,
        referrer,
        country: None,
    };

    match shortener::resolve(&state.db, &state.geo, &code, visit).await {
        Ok((link, _)) => Ok(Redirect::temporary(&link.original_url)),
        Err(Error::NotFound) => {
            tracing::debug!("No active link for short code '{}'", code);
            Err(Error::NotFound)
        }
        Err(e) => {
            tracing::error!("Failed to resolve short code '{}': {:?}", code, e);
            Err(e)
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

/// Determine the real client IP, preferring common proxy headers.
fn extract_ip(headers: &HeaderMap, addr: SocketAddr) -> Option<String> {
    // X-Forwarded-For can be a comma-separated list; take the first entry.
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(ip) = xff.split(',').next().map(str::trim) {
            if !ip.is_empty() {
                return Some(ip.to_owned());
            }
        }
    }

    if let Some(real_ip) = header_value(headers, "x-real-ip") {
        return Some(real_ip);
    }

    Some(addr.ip().to_string())
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> SocketAddr {
        "10.0.0.1:5555".parse().unwrap()
    }

    #[test]
    fn forwarded_for_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.5, 10.0.0.2"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.1"));

        assert_eq!(
            extract_ip(&headers, peer()).as_deref(),
            Some("203.0.113.5")
        );
    }

    #[test]
    fn real_ip_is_second_choice() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.1"));

        assert_eq!(
            extract_ip(&headers, peer()).as_deref(),
            Some("198.51.100.1")
        );
    }

    #[test]
    fn socket_address_is_the_fallback() {
        assert_eq!(
            extract_ip(&HeaderMap::new(), peer()).as_deref(),
            Some("10.0.0.1")
        );
    }

    #[test]
    fn blank_headers_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::REFERER, HeaderValue::from_static("   "));
        assert_eq!(header_value(&headers, header::REFERER.as_str()), None);
    }
}
