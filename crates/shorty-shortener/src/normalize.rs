//! Canonical form of long URLs and the acceptance check applied to it.
//!
//! The canonical form is what gets stored, compared for deduplication and
//! used as the acceleration-index key. One pass of the rules:
//!
//! 1. lower-case the whole string
//! 2. strip a leading `http://` or `https://`
//! 3. strip a leading `www.`
//! 4. strip one trailing `/`
//! 5. prepend `http://`
//!
//! ```ignore
//! assert_eq!(normalize("https://www.Example.com/"), "http://example.com");
//! assert_eq!(normalize("example.com"), "http://example.com");
//! ```

use url::Url;

const CANONICAL_SCHEME: &str = "http://";

/// Maps a raw long URL to its canonical form.
///
/// Pure and total: no network access, no failure mode. Surrounding
/// whitespace is ignored. The pass is repeated until the output is stable so
/// that `normalize(normalize(x)) == normalize(x)` holds even for inputs
/// such as `www.www.a.com` or `a.com//`.
pub fn normalize(raw: &str) -> String {
    let mut current = normalize_once(raw.trim());
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_once(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let rest = lowered.as_str();
    let rest = rest
        .strip_prefix("https://")
        .or_else(|| rest.strip_prefix("http://"))
        .unwrap_or(rest);
    let rest = rest.strip_prefix("www.").unwrap_or(rest);
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    format!("{CANONICAL_SCHEME}{rest}")
}

/// Decides whether a canonical URL is well-formed enough to accept.
///
/// Requires an `http` or `https` scheme and a non-empty host; path and
/// query are optional. Never panics.
pub fn is_valid(candidate: &str) -> bool {
    match Url::parse(candidate) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some_and(|host| !host.is_empty())
        }
        Err(_) => false,
    }
}
