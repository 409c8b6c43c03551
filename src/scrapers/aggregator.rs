//! Resolution of aggregator redirect URLs (`news.google.com/rss/articles/…`).

use base64::{engine::general_purpose::URL_SAFE, engine::general_purpose::URL_SAFE_NO_PAD, Engine};

const AGGREGATOR_MARKER: &str = "news.google.com/rss/articles/";

/// True if `url` matches the known aggregator pattern and needs resolution.
pub fn is_aggregator_url(url: &str) -> bool {
    url.contains(AGGREGATOR_MARKER)
}

/// Attempt structural decoding of the base64 segment following the
/// aggregator marker. Returns the embedded `http(s)://…` substring if the
/// decoded bytes contain one, without any network I/O.
pub fn try_decode(url: &str) -> Option<String> {
    let idx = url.find(AGGREGATOR_MARKER)?;
    let rest = &url[idx + AGGREGATOR_MARKER.len()..];
    let segment = rest.split(['?', '#', '/']).next()?;
    if segment.is_empty() {
        return None;
    }

    let decoded = URL_SAFE
        .decode(segment)
        .or_else(|_| URL_SAFE_NO_PAD.decode(segment))
        .ok()?;
    let text = String::from_utf8_lossy(&decoded);

    extract_embedded_url(&text)
}

fn extract_embedded_url(text: &str) -> Option<String> {
    for scheme in ["https://", "http://"] {
        if let Some(start) = text.find(scheme) {
            let candidate = &text[start..];
            let end = candidate
                .find(|c: char| c.is_control() || c == '\u{0}')
                .unwrap_or(candidate.len());
            let url = candidate[..end]
                .trim_end_matches(|c: char| !(c.is_ascii_graphic()))
                .to_string();
            if url::Url::parse(&url).is_ok() {
                return Some(url);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_aggregator_pattern() {
        assert!(is_aggregator_url(
            "https://news.google.com/rss/articles/CBMiXg"
        ));
        assert!(!is_aggregator_url("https://site.example/a"));
    }

    #[test]
    fn decodes_embedded_url_when_present() {
        let b64 = URL_SAFE_NO_PAD.encode(b"garbage\x01https://site.example/a\x02trailer");
        let url = format!("https://news.google.com/rss/articles/{b64}");
        assert_eq!(try_decode(&url).as_deref(), Some("https://site.example/a"));
    }

    #[test]
    fn returns_none_when_no_embedded_url() {
        let b64 = URL_SAFE_NO_PAD.encode(b"no url in here at all");
        let url = format!("https://news.google.com/rss/articles/{b64}");
        assert_eq!(try_decode(&url), None);
    }
}
