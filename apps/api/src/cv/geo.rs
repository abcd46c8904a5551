//! Best-effort city lookup from the caller's IP via ipapi.co.
//! Failures of any kind (no IP, timeout, bad payload) yield `None` and
//! never fail the upload.

use axum::http::HeaderMap;
use serde::Deserialize;
use tracing::debug;

const GEO_LOOKUP_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Deserialize)]
struct GeoResponse {
    city: Option<String>,
}

/// Pulls the client IP from `X-Forwarded-For` (first hop).
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

/// Resolves an IP to a city name. Private and loopback addresses are not
/// resolvable and short-circuit to `None`.
pub async fn detect_city(client: &reqwest::Client, ip: &str) -> Option<String> {
    if is_private(ip) {
        return None;
    }

    let url = format!("https://ipapi.co/{ip}/json/");

    let response = client
        .get(&url)
        .timeout(std::time::Duration::from_secs(GEO_LOOKUP_TIMEOUT_SECS))
        .send()
        .await;

    match response {
        Ok(r) if r.status().is_success() => match r.json::<GeoResponse>().await {
            Ok(geo) => geo.city.filter(|c| !c.is_empty()),
            Err(e) => {
                debug!("Geo lookup returned unparseable payload: {e}");
                None
            }
        },
        Ok(r) => {
            debug!("Geo lookup returned status {}", r.status());
            None
        }
        Err(e) => {
            debug!("Geo lookup failed: {e}");
            None
        }
    }
}

fn is_private(ip: &str) -> bool {
    ip == "127.0.0.1"
        || ip == "::1"
        || ip.starts_with("10.")
        || ip.starts_with("192.168.")
        || ip.starts_with("172.16.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_takes_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), Some("203.0.113.9".to_string()));
    }

    #[test]
    fn test_client_ip_absent_header() {
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }

    #[test]
    fn test_private_addresses_are_skipped() {
        assert!(is_private("127.0.0.1"));
        assert!(is_private("192.168.1.4"));
        assert!(!is_private("203.0.113.9"));
    }
}
