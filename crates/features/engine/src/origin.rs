//! Origin-list sanitizing for values that end up on the command line.
//!
//! The result is security relevant: it must contain no whitespace, origins
//! are comma separated, and each one is a serialized `scheme://host[:port]`.

use std::collections::BTreeSet;

pub const ORIGIN_LIST_SEPARATOR: &str = ",";

/// Normalizes one token into an origin, or `None` if it is not an
/// `http`/`https`/`ws`/`wss` URL.
#[must_use]
pub fn normalize_origin(token: &str) -> Option<String> {
    let (scheme, rest) = token.split_once("://")?;
    let scheme = scheme.to_ascii_lowercase();
    let default_port = match scheme.as_str() {
        "http" | "ws" => 80,
        "https" | "wss" => 443,
        _ => return None,
    };

    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);
    let (host, port) = split_host_port(host_port)?;

    let host = host.to_ascii_lowercase();
    if !is_valid_host(&host) {
        return None;
    }

    let origin = match port {
        Some(port) if port != default_port => format!("{scheme}://{host}:{port}"),
        _ => format!("{scheme}://{host}"),
    };
    is_safe_value(&origin).then_some(origin)
}

fn split_host_port(host_port: &str) -> Option<(&str, Option<u16>)> {
    if host_port.starts_with('[') {
        let end = host_port.find(']')?;
        let host = &host_port[..=end];
        return match &host_port[end + 1..] {
            "" => Some((host, None)),
            rest => Some((host, Some(rest.strip_prefix(':')?.parse().ok()?))),
        };
    }
    match host_port.rsplit_once(':') {
        Some((host, "")) => Some((host, None)),
        Some((host, port)) => Some((host, Some(port.parse().ok()?))),
        None => Some((host_port, None)),
    }
}

fn is_valid_host(host: &str) -> bool {
    if let Some(inner) = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        return !inner.is_empty() && inner.chars().all(|c| c.is_ascii_hexdigit() || c == ':' || c == '.');
    }
    !host.is_empty()
        && !host.starts_with('.')
        && !host.contains("..")
        && host.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

/// Characters allowed in a `--switch=value` origin list.
fn is_safe_value(value: &str) -> bool {
    value.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | ':' | '/' | ',' | '[' | ']'))
}

/// Splits on whitespace and commas and keeps the valid origins in input order.
#[must_use]
pub fn tokenize_origin_list(value: &str) -> Vec<String> {
    value
        .split(|c: char| c.is_ascii_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .filter_map(normalize_origin)
        .collect()
}

/// Concatenates both lists, dropping invalid and duplicate origins.
#[must_use]
pub fn combine_and_sanitize(first: &str, second: &str) -> String {
    let mut seen = BTreeSet::new();
    let origins: Vec<String> = tokenize_origin_list(first)
        .into_iter()
        .chain(tokenize_origin_list(second))
        .filter(|origin| seen.insert(origin.clone()))
        .collect();
    origins.join(ORIGIN_LIST_SEPARATOR)
}

/// Sanitizes a single list.
#[must_use]
pub fn sanitize(value: &str) -> String {
    combine_and_sanitize("", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_web_schemes_only() {
        assert_eq!(normalize_origin("https://Example.TEST/path?q"), Some("https://example.test".into()));
        assert_eq!(normalize_origin("ws://a.test:8080"), Some("ws://a.test:8080".into()));
        assert_eq!(normalize_origin("ftp://a.test"), None);
        assert_eq!(normalize_origin("a.test"), None);
        assert_eq!(normalize_origin("javascript://alert(1)"), None);
    }

    #[test]
    fn drops_default_ports_and_userinfo() {
        assert_eq!(normalize_origin("http://a.test:80"), Some("http://a.test".into()));
        assert_eq!(normalize_origin("wss://a.test:443/x"), Some("wss://a.test".into()));
        assert_eq!(normalize_origin("https://user:pw@a.test"), Some("https://a.test".into()));
        assert_eq!(normalize_origin("https://a.test:99999"), None);
    }

    #[test]
    fn rejects_unsafe_hosts() {
        assert_eq!(normalize_origin("https://a b.test"), None);
        assert_eq!(normalize_origin("https://a.test;rm"), None);
        assert_eq!(normalize_origin("https://"), None);
        assert_eq!(normalize_origin("http://[::1]:8000"), Some("http://[::1]:8000".into()));
    }

    #[test]
    fn combine_concatenates_dedupes_and_preserves_order() {
        let combined = combine_and_sanitize(
            "http://b.test,  http://a.test",
            "http://a.test https://c.test,invalid",
        );
        assert_eq!(combined, "http://b.test,http://a.test,https://c.test");
        assert_eq!(sanitize("  "), "");
    }
}
