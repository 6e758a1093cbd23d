use url::Url;

const CANONICAL_HOST: &str = "x.com";

/// Normalize a post href to `https://x.com/{handle}/status/{id}`.
///
/// Accepts absolute URLs on x.com or twitter.com (any `www.`/`mobile.`
/// prefix) and site-relative hrefs. Query strings, fragments and trailing
/// sub-paths such as `/photo/1` or `/analytics` are dropped. The handle is
/// lowercased because X handles are case-insensitive.
pub fn canonical_post_url(href: &str) -> Option<String> {
    let href = href.trim();
    let absolute = if href.starts_with('/') {
        format!("https://{CANONICAL_HOST}{href}")
    } else {
        href.to_string()
    };

    let parsed = Url::parse(&absolute).ok()?;
    let host = parsed.host_str()?;
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("mobile."))
        .unwrap_or(host);
    if host != "x.com" && host != "twitter.com" {
        return None;
    }

    let mut segments = parsed.path_segments()?;
    let handle = segments.next().filter(|h| !h.is_empty())?;
    if segments.next()? != "status" {
        return None;
    }
    let id = segments
        .next()
        .filter(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))?;

    Some(format!(
        "https://{CANONICAL_HOST}/{}/status/{id}",
        handle.to_ascii_lowercase()
    ))
}

/// Numeric post id from a status URL.
pub fn post_id(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("/status/")?;
    let id = rest.split(['/', '?', '#']).next()?;
    (!id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())).then_some(id)
}
