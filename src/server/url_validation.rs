//! Allow-list for source URLs accepted by `/start`.

use url::Url;

const CANONICAL_HOST: &str = "instagram.com";
const CONTENT_PATH_MARKERS: [&str; 4] = ["/reel/", "/reels/", "/p/", "/tv/"];

/// True if `candidate` is an http(s) URL on the canonical host (or one of its
/// subdomains) pointing at a recognized content path.
pub fn is_supported_url(candidate: &str) -> bool {
    let Ok(url) = Url::parse(candidate.trim()) else {
        return false;
    };

    // `port()` is None for the scheme's default port.
    if !matches!(url.scheme(), "http" | "https") || url.port().is_some() {
        return false;
    }

    let host = match url.host_str() {
        Some(host) => host.to_ascii_lowercase(),
        None => return false,
    };
    let host = host.trim_end_matches('.');
    let on_canonical_host =
        host == CANONICAL_HOST || host.ends_with(&format!(".{}", CANONICAL_HOST));
    if !on_canonical_host {
        return false;
    }

    let path = url.path().to_ascii_lowercase();
    CONTENT_PATH_MARKERS
        .iter()
        .any(|marker| path.contains(marker))
}
