use crate::UrlError;
use url::Url;

/// Scheme assumed for inputs such as `example.com/page`
const DEFAULT_SCHEME: &str = "https://";

/// Normalizes a URL into its canonical form
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace; reject empty input
/// 2. Prepend `https://` if the input carries no scheme
/// 3. Parse the URL; reject if malformed or hostless
/// 4. Lowercase the whole URL
/// 5. Remove the `www.` prefix from the host
/// 6. Remove trailing slashes from the path (except for root `/`)
///
/// The scheme is kept as given, so `http://` stays `http://`. Fragments are
/// kept; callers decide whether a fragment makes a link unsuitable.
///
/// Normalization is idempotent: normalizing an already normalized URL
/// returns it unchanged.
///
/// # Arguments
///
/// * `raw` - The URL string to normalize
///
/// # Returns
///
/// * `Ok(Url)` - Normalized URL
/// * `Err(UrlError)` - Failed to parse or normalize the URL
///
/// # Examples
///
/// ```
/// use site_gleaner::url::try_normalize_url;
///
/// let url = try_normalize_url("WWW.Example.COM/Blog/").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/blog");
/// ```
pub fn try_normalize_url(raw: &str) -> Result<Url, UrlError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Parse("empty URL".to_string()));
    }

    let with_scheme = if has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("{}{}", DEFAULT_SCHEME, trimmed)
    };

    let parsed = Url::parse(&with_scheme).map_err(|e| UrlError::Parse(e.to_string()))?;

    // Lowercase everything, then re-parse so the serialization stays canonical
    let mut url = Url::parse(&parsed.as_str().to_lowercase())
        .map_err(|e| UrlError::Malformed(e.to_string()))?;

    let host = url.host_str().ok_or(UrlError::MissingDomain)?.to_string();
    if let Some(stripped) = host.strip_prefix("www.") {
        if !stripped.is_empty() {
            url.set_host(Some(stripped))
                .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;
        }
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed_path = path.trim_end_matches('/');
        url.set_path(if trimmed_path.is_empty() {
            "/"
        } else {
            trimmed_path
        });
    }

    Ok(url)
}

/// Normalizes a URL, returning `None` when it cannot be parsed
///
/// See [`try_normalize_url`] for the normalization rules.
pub fn normalize_url(raw: &str) -> Option<Url> {
    try_normalize_url(raw).ok()
}

/// Returns true if the URL normalizes and uses the HTTP or HTTPS scheme
pub fn is_valid_url(raw: &str) -> bool {
    normalize_url(raw)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Returns true if both URLs share scheme, host and port
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

/// Checks for an explicit `scheme://` prefix
fn has_scheme(raw: &str) -> bool {
    match raw.find("://") {
        Some(idx) if idx > 0 => raw[..idx]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.'),
        _ => false,
    }
}
