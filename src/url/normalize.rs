use crate::UrlError;
use url::Url;

/// Query parameters stripped during canonicalisation because they carry no
/// identity information for the resource itself (attribution/tracking/session).
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
    "ref",
    "source",
    "yclid",
    "_ga",
];

/// Single-use session-token-shaped keys, matched case-insensitively.
const SESSION_PARAMS: &[&str] = &["phpsessid", "jsessionid", "sid", "sessionid"];

/// Path extensions that mark a non-HTML resource; such URLs never enter the frontier.
const BINARY_EXTENSIONS: &[&str] = &[
    // images
    "jpg", "jpeg", "png", "gif", "bmp", "svg", "webp", "ico", "tiff", "tif", "avif",
    // archives
    "zip", "tar", "gz", "tgz", "rar", "7z", "bz2", "xz",
    // media
    "mp3", "mp4", "avi", "mov", "wmv", "flv", "wav", "ogg", "webm", "mkv", "m4a", "m4v",
    // fonts
    "woff", "woff2", "ttf", "otf", "eot",
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "rtf",
];

/// Canonicalises a URL, optionally resolved against a base URL first.
///
/// Per the crawler's canonical-form contract: scheme is preserved as given
/// (never coerced to https), host is lowercased, the path has repeated `/`
/// collapsed and dot-segments resolved, the fragment is dropped, tracking
/// query parameters are stripped and the rest sorted by key. Canonicalise is
/// idempotent: `canonicalise(canonicalise(u)) == canonicalise(u)`.
///
/// # Examples
///
/// ```
/// use sumi_ripple::url::normalize_url;
///
/// let url = normalize_url("HTTPS://WWW.Example.com:443/a//b/?utm_source=x&z=1&a=2#frag", None).unwrap();
/// assert_eq!(url.as_str(), "https://www.example.com/a/b/?a=2&z=1");
/// ```
pub fn normalize_url(url_str: &str, base: Option<&Url>) -> Result<Url, UrlError> {
    let parsed = match base {
        Some(base) => base
            .join(url_str)
            .map_err(|e| UrlError::Parse(e.to_string()))?,
        None => Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?,
    };

    canonicalize_parsed(parsed)
}

fn canonicalize_parsed(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "only http and https schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url.host_str().ok_or(UrlError::MissingDomain)?.to_lowercase();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("failed to set host: {}", e)))?;

    if has_binary_extension(url.path()) {
        return Err(UrlError::BinaryExtension(url.path().to_string()));
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let filtered_params = filter_and_sort_query_params(&url);
        if filtered_params.is_empty() {
            url.set_query(None);
        } else {
            let query_string = filtered_params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query_string));
        }
    }

    Ok(url)
}

/// Collapses repeated `/` and resolves `.`/`..` segments. The presence or
/// absence of a trailing slash in the input is preserved: `/a/b` and `/a/b/`
/// are treated as distinct resources by this function (dedup tolerance for
/// that distinction is left to the bloom filter's probabilistic contract).
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let had_trailing_slash = path.ends_with('/') && path.len() > 1;

    let mut normalized_segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                normalized_segments.pop();
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments.is_empty() {
        return "/".to_string();
    }

    let mut result = format!("/{}", normalized_segments.join("/"));
    if had_trailing_slash {
        result.push('/');
    }
    result
}

fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort_by(|a, b| a.0.cmp(&b.0));
    params
}

fn is_tracking_param(key: &str) -> bool {
    let lower = key.to_lowercase();
    TRACKING_PARAMS.contains(&lower.as_str())
        || SESSION_PARAMS.contains(&lower.as_str())
        || lower.starts_with("utm_")
}

fn has_binary_extension(path: &str) -> bool {
    let last_segment = path.rsplit('/').next().unwrap_or("");
    match last_segment.rsplit_once('.') {
        Some((_, ext)) => BINARY_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(u: &str) -> String {
        normalize_url(u, None).unwrap().to_string()
    }

    #[test]
    fn test_preserves_http_scheme() {
        assert_eq!(norm("http://example.com/page"), "http://example.com/page");
    }

    #[test]
    fn test_preserves_https_scheme() {
        assert_eq!(norm("https://example.com/page"), "https://example.com/page");
    }

    #[test]
    fn test_keeps_www_prefix() {
        assert_eq!(norm("https://www.example.com/"), "https://www.example.com/");
    }

    #[test]
    fn test_keeps_trailing_slash_when_present() {
        assert_eq!(norm("https://example.com/page/"), "https://example.com/page/");
    }

    #[test]
    fn test_keeps_no_trailing_slash_when_absent() {
        assert_eq!(norm("https://example.com/page"), "https://example.com/page");
    }

    #[test]
    fn test_keep_root_slash() {
        assert_eq!(norm("https://example.com/"), "https://example.com/");
    }

    #[test]
    fn test_remove_fragment() {
        assert_eq!(norm("https://example.com/page#section"), "https://example.com/page");
    }

    #[test]
    fn test_remove_tracking_params() {
        assert_eq!(
            norm("https://example.com/page?utm_source=twitter"),
            "https://example.com/page"
        );
    }

    #[test]
    fn test_sort_query_params() {
        assert_eq!(norm("https://example.com/page?b=2&a=1"), "https://example.com/page?a=1&b=2");
    }

    #[test]
    fn test_normalize_path_with_dots() {
        assert_eq!(norm("https://example.com/a/../b/./c"), "https://example.com/b/c");
    }

    #[test]
    fn test_lowercase_domain() {
        assert_eq!(norm("https://EXAMPLE.COM/Page"), "https://example.com/Page");
    }

    #[test]
    fn test_mixed_query_params() {
        assert_eq!(
            norm("https://example.com/page?keep=yes&utm_medium=email&another=value&fbclid=123"),
            "https://example.com/page?another=value&keep=yes"
        );
    }

    #[test]
    fn test_session_param_removed() {
        assert_eq!(
            norm("https://example.com/page?PHPSESSID=abc123&keep=1"),
            "https://example.com/page?keep=1"
        );
    }

    #[test]
    fn test_invalid_scheme() {
        let result = normalize_url("ftp://example.com/page", None);
        assert!(matches!(result.unwrap_err(), UrlError::InvalidScheme(_)));
    }

    #[test]
    fn test_malformed_url() {
        assert!(normalize_url("not a url", None).is_err());
    }

    #[test]
    fn test_empty_path_becomes_root() {
        assert_eq!(norm("https://example.com"), "https://example.com/");
    }

    #[test]
    fn test_multiple_slashes() {
        assert_eq!(
            norm("https://example.com///path//to///page"),
            "https://example.com/path/to/page"
        );
    }

    #[test]
    fn test_parent_directory_at_root() {
        assert_eq!(norm("https://example.com/../page"), "https://example.com/page");
    }

    #[test]
    fn test_binary_extension_rejected() {
        let result = normalize_url("https://example.com/file.pdf", None);
        assert!(matches!(result.unwrap_err(), UrlError::BinaryExtension(_)));
    }

    #[test]
    fn test_binary_extension_case_insensitive() {
        let result = normalize_url("https://example.com/image.PNG", None);
        assert!(matches!(result.unwrap_err(), UrlError::BinaryExtension(_)));
    }

    #[test]
    fn test_non_binary_extension_allowed() {
        assert!(normalize_url("https://example.com/page.html", None).is_ok());
    }

    #[test]
    fn test_relative_resolution_against_base() {
        let base = Url::parse("https://example.com/dir/page").unwrap();
        let result = normalize_url("../other", Some(&base)).unwrap();
        assert_eq!(result.as_str(), "https://example.com/other");
    }

    #[test]
    fn test_idempotent() {
        let once = norm("HTTPS://WWW.Example.com:443/a//b/?utm_source=x&z=1&a=2#frag");
        let twice = normalize_url(&once, None).unwrap().to_string();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_s1_scenario() {
        assert_eq!(
            norm("HTTPS://WWW.Example.com:443/a//b/?utm_source=x&z=1&a=2#frag"),
            "https://www.example.com/a/b/?a=2&z=1"
        );
    }
}
