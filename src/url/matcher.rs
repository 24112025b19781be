use url::Url;

/// Checks whether the host of `url` matches a domain pattern
///
/// Patterns are either exact (`example.com`) or wildcards (`*.example.com`),
/// the latter matching the bare domain and any subdomain depth. Comparison is
/// case-insensitive and ignores the port.
///
/// # Arguments
///
/// * `pattern` - Domain pattern, exact or `*.`-prefixed
/// * `url` - The URL whose host is checked
///
/// # Returns
///
/// `true` if the host matches; URLs without a host never match
///
/// # Examples
///
/// ```
/// use url::Url;
/// use wardscan::url::host_matches;
///
/// let url = Url::parse("https://api.v2.Example.com:8443/x").unwrap();
/// assert!(host_matches("*.example.com", &url));
/// assert!(!host_matches("example.com", &url));
/// ```
pub fn host_matches(pattern: &str, url: &Url) -> bool {
    match url.host_str() {
        Some(host) => matches_wildcard(&pattern.to_lowercase(), &host.to_lowercase()),
        None => false,
    }
}

/// Wildcard comparison of an already-lowercased pattern and host
///
/// # Arguments
///
/// * `pattern` - Lowercased domain pattern
/// * `host` - Lowercased host name
pub fn matches_wildcard(pattern: &str, host: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        host == base
            || host
                .strip_suffix(base)
                .is_some_and(|prefix| prefix.ends_with('.'))
    } else {
        host == pattern
    }
}
