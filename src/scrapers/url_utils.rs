//! URL helpers for frontier management.

use url::Url;

/// Substrings that mark a link as a logout action.
const LOGOUT_MARKERS: &[&str] = &["logout", "log_out", "log-out", "signout", "sign_out", "sign-out"];

/// Normalize a URL for visited-set membership.
///
/// Drops the fragment; scheme and host come back lower-cased from the parser.
/// Returns `None` for unparseable input.
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    url.set_fragment(None);
    Some(url.to_string())
}

/// Resolve an href found on `page_url` to an absolute URL.
pub fn resolve_link(page_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }
    let base = Url::parse(page_url).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}

/// Host of a URL, lower-cased.
pub fn host_of(raw: &str) -> Option<String> {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

/// Check that a URL is http(s) and on `allowed_host`.
pub fn is_same_domain(raw: &str, allowed_host: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url
                    .host_str()
                    .is_some_and(|h| h.eq_ignore_ascii_case(allowed_host))
        }
        Err(_) => false,
    }
}

/// Check if following this link would likely end the authenticated session.
pub fn is_logout_url(raw: &str) -> bool {
    let lower = raw.to_lowercase();
    LOGOUT_MARKERS.iter().any(|m| lower.contains(m))
}
