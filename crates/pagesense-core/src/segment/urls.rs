//! Compact link and media URLs.

use url::Url;

/// Shorten a link or media URL relative to the page it was found on.
///
/// Same-origin URLs keep only path, query and fragment. Other http(s)
/// URLs drop the scheme and keep host onward. `data:` URLs are reduced to
/// their media type. Anything unparseable is returned trimmed.
pub(crate) fn compact_url(raw: &str, base: Option<&Url>) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }
    if let Some(rest) = raw.strip_prefix("data:") {
        let media = rest.split([';', ',']).next().unwrap_or_default();
        return format!("data:{}", media);
    }

    let parsed = match base {
        Some(base) => base.join(raw),
        None => Url::parse(raw),
    };
    let Ok(url) = parsed else {
        return raw.to_string();
    };
    if !matches!(url.scheme(), "http" | "https") {
        return url.to_string();
    }

    let mut tail = url.path().to_string();
    if let Some(query) = url.query() {
        tail.push('?');
        tail.push_str(query);
    }
    if let Some(fragment) = url.fragment() {
        tail.push('#');
        tail.push_str(fragment);
    }

    if base.is_some_and(|b| b.origin() == url.origin()) {
        return tail;
    }

    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}{}", host, port, tail),
        None => format!("{}{}", host, tail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://shop.example.com/catalog/list?page=2").unwrap()
    }

    #[test]
    fn test_same_origin_keeps_path() {
        let base = base();
        assert_eq!(compact_url("/item/42?ref=x", Some(&base)), "/item/42?ref=x");
        assert_eq!(compact_url("item/7", Some(&base)), "/catalog/item/7");
        assert_eq!(compact_url("https://shop.example.com/#top", Some(&base)), "/#top");
    }

    #[test]
    fn test_other_hosts_drop_scheme() {
        let base = base();
        assert_eq!(
            compact_url("//cdn.example.net/img/a.png", Some(&base)),
            "cdn.example.net/img/a.png"
        );
        assert_eq!(
            compact_url("http://static.test:8080/x.js", Some(&base)),
            "static.test:8080/x.js"
        );
    }

    #[test]
    fn test_data_and_special_schemes() {
        assert_eq!(compact_url("data:image/png;base64,AAAA", None), "data:image/png");
        assert_eq!(compact_url("mailto:a@b.c", None), "mailto:a@b.c");
        assert_eq!(compact_url("  ", None), "");
    }

    #[test]
    fn test_relative_without_base_is_kept() {
        assert_eq!(compact_url("/relative/path", None), "/relative/path");
    }
}
