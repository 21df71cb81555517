//! URL utility functions for destination keys

use crate::error::ConnectionError;
use url::Url;

/// Parse URL and extract components
pub fn parse_url(url_str: &str) -> Result<Url, url::ParseError> {
    Url::parse(url_str)
}

/// Resolve a destination key (a URL) to the host and port a socket should dial
pub fn resolve_target(key: &str) -> Result<(String, u16), ConnectionError> {
    let url = parse_url(key)?;
    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| ConnectionError::InvalidDestination(key.to_string()))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| ConnectionError::InvalidDestination(key.to_string()))?;

    // IPv6 literals come back bracketed
    let host = host.trim_start_matches('[').trim_end_matches(']').to_string();
    Ok((host, port))
}

/// Reduce a URL to `scheme://host:port` so every path on one origin shares a key
pub fn destination_key(url_str: &str) -> Result<String, ConnectionError> {
    let url = parse_url(url_str)?;
    let host = url
        .host_str()
        .ok_or_else(|| ConnectionError::InvalidDestination(url_str.to_string()))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| ConnectionError::InvalidDestination(url_str.to_string()))?;
    Ok(format!("{}://{}:{}", url.scheme(), host.to_lowercase(), port))
}
