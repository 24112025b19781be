//! URL handling module
//!
//! Normalization for deduplication, resolution of relative references against
//! a base, wildcard domain matching and the stable keys used by the retry
//! tracker.

mod matcher;
mod normalize;

use sha2::{Digest, Sha256};
use url::Url;

pub use matcher::{host_matches, matches_wildcard};
pub use normalize::normalize_url;

/// Resolves `reference` against `base` and normalizes the result
///
/// # Arguments
///
/// * `reference` - An absolute URL or a reference relative to `base`
/// * `base` - The URL the reference appeared on
///
/// # Returns
///
/// * `Some(Url)` - The resolved, normalized URL
/// * `None` - The reference cannot be resolved or does not resolve to an
///   HTTP(S) URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use wardscan::url::to_absolute;
///
/// let base = Url::parse("https://t/dir/page").unwrap();
/// assert_eq!(to_absolute("/a", &base).unwrap().as_str(), "https://t/a");
/// assert_eq!(to_absolute("b", &base).unwrap().as_str(), "https://t/dir/b");
/// assert!(to_absolute("mailto:x@t", &base).is_none());
/// ```
pub fn to_absolute(reference: &str, base: &Url) -> Option<Url> {
    let joined = base.join(reference.trim()).ok()?;
    normalize_url(joined.as_str()).ok()
}

/// Stable hex key for a URL, independent of process and hasher seeds
///
/// # Arguments
///
/// * `url` - The URL to key, normally already normalized
///
/// # Returns
///
/// The hex-encoded SHA-256 of the URL's serialization
pub fn url_key(url: &Url) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_str().as_bytes());
    hex::encode(hasher.finalize())
}
