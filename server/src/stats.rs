//! Folding raw click events into per-dimension counts.

use std::collections::{BTreeMap, HashSet};

use woothee::parser::Parser;

use crate::models::{Click, ClickBreakdown};

pub const MOBILE: &str = "Mobile";
pub const DESKTOP: &str = "Desktop";
pub const DIRECT: &str = "Direct";
pub const UNKNOWN: &str = "Unknown";

/// Aggregate a link's click history.
///
/// Unique clicks count distinct IP addresses; clicks recorded without an IP
/// are left out of that figure (they still count everywhere else).
pub fn summarize(clicks: &[Click]) -> ClickBreakdown {
    let parser = Parser::new();
    let mut breakdown = ClickBreakdown::default();
    let mut ips: HashSet<&str> = HashSet::new();

    for click in clicks {
        if let Some(ip) = click.ip_address.as_deref().filter(|ip| !ip.is_empty()) {
            ips.insert(ip);
        }

        let ua = click.user_agent.as_deref();
        bump(&mut breakdown.devices, device_category(ua));
        bump(&mut breakdown.referrers, referrer_bucket(click.referrer.as_deref()));

        let (browser, os) = parse_user_agent(&parser, ua);
        bump(&mut breakdown.browsers, browser.unwrap_or(UNKNOWN));
        bump(&mut breakdown.operating_systems, os.unwrap_or(UNKNOWN));

        let country = click
            .country
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(UNKNOWN);
        bump(&mut breakdown.countries, country);
    }

    breakdown.unique_clicks = ips.len() as i64;
    breakdown
}

/// "Mobile" when the user agent mentions it, otherwise "Desktop". A missing
/// user agent counts as desktop.
pub fn device_category(user_agent: Option<&str>) -> &'static str {
    match user_agent {
        Some(ua) if ua.contains(MOBILE) => MOBILE,
        _ => DESKTOP,
    }
}

/// The referrer itself, or "Direct" when there was none.
pub fn referrer_bucket(referrer: Option<&str>) -> &str {
    referrer
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DIRECT)
}

/// Browser and OS names from woothee, `None` where it can't tell.
fn parse_user_agent<'a>(
    parser: &Parser,
    ua: Option<&'a str>,
) -> (Option<&'a str>, Option<&'a str>) {
    let ua = match ua {
        Some(s) if !s.is_empty() => s,
        _ => return (None, None),
    };

    match parser.parse(ua) {
        Some(result) => {
            let known = |s: &'a str| !s.is_empty() && s != "UNKNOWN";
            let browser = Some(result.name).filter(|s| known(*s));
            let os = Some(result.os).filter(|s| known(*s));
            (browser, os)
        }
        None => (None, None),
    }
}

fn bump(counts: &mut BTreeMap<String, i64>, key: &str) {
    *counts.entry(key.to_owned()).or_insert(0) += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const CHROME_MAC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    fn click(ip: Option<&str>, ua: Option<&str>, referrer: Option<&str>) -> Click {
        Click {
            id: 0,
            url_id: 1,
            ip_address: ip.map(str::to_owned),
            user_agent: ua.map(str::to_owned),
            referrer: referrer.map(str::to_owned),
            country: None,
            clicked_at: Utc::now(),
        }
    }

    #[test]
    fn no_clicks_means_empty_maps() {
        let breakdown = summarize(&[]);
        assert_eq!(breakdown, ClickBreakdown::default());
        assert_eq!(breakdown.unique_clicks, 0);
        assert!(breakdown.devices.is_empty());
        assert!(breakdown.referrers.is_empty());
        assert!(breakdown.countries.is_empty());
    }

    #[test]
    fn devices_split_on_mobile_marker() {
        let clicks = [
            click(None, Some("iPhone Mobile Safari"), None),
            click(None, Some("Mozilla/5.0 Desktop"), None),
            click(None, None, None),
        ];

        let breakdown = summarize(&clicks);

        assert_eq!(breakdown.devices.len(), 2);
        assert_eq!(breakdown.devices[MOBILE], 1);
        assert_eq!(breakdown.devices[DESKTOP], 2);
    }

    #[test]
    fn missing_or_blank_referrer_is_direct() {
        let clicks = [
            click(None, None, Some("https://news.example/")),
            click(None, None, Some("")),
            click(None, None, None),
        ];

        let breakdown = summarize(&clicks);

        assert_eq!(breakdown.referrers[DIRECT], 2);
        assert_eq!(breakdown.referrers["https://news.example/"], 1);
    }

    #[test]
    fn unique_clicks_ignore_missing_ips() {
        let clicks = [
            click(Some("203.0.113.1"), None, None),
            click(Some("203.0.113.1"), None, None),
            click(Some("203.0.113.2"), None, None),
            click(None, None, None),
        ];

        assert_eq!(summarize(&clicks).unique_clicks, 2);
    }

    #[test]
    fn countries_default_to_unknown() {
        let mut known = click(None, None, None);
        known.country = Some("Japan".into());
        let clicks = [known, click(None, None, None)];

        let breakdown = summarize(&clicks);

        assert_eq!(breakdown.countries["Japan"], 1);
        assert_eq!(breakdown.countries[UNKNOWN], 1);
    }

    #[test]
    fn browsers_and_os_come_from_user_agent() {
        let clicks = [click(None, Some(CHROME_MAC), None), click(None, None, None)];

        let breakdown = summarize(&clicks);

        assert_eq!(breakdown.browsers["Chrome"], 1);
        assert_eq!(breakdown.browsers[UNKNOWN], 1);
        assert_eq!(breakdown.operating_systems["Mac OSX"], 1);
        assert_eq!(breakdown.operating_systems[UNKNOWN], 1);
    }

    #[test]
    fn device_category_is_case_sensitive() {
        assert_eq!(device_category(Some("mobile")), DESKTOP);
        assert_eq!(device_category(Some("Android Mobile")), MOBILE);
    }
}
