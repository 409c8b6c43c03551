//! PDF extraction: text via `pdf-extract`, title from PDF metadata or the
//! URL basename.

use super::{ExtractError, Extracted};

pub fn extract(bytes: &[u8], final_url: &str) -> Result<Extracted, ExtractError> {
    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|_| ExtractError::ReadabilityFailed)?;
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(ExtractError::ReadabilityFailed);
    }

    let title = pdf_title_from_metadata(bytes)
        .or_else(|| basename_title(final_url))
        .ok_or(ExtractError::ReadabilityFailed)?;

    Ok(Extracted {
        title,
        text,
        image_url: None,
    })
}

/// `pdf-extract` does not surface the document info dictionary through its
/// plain-text API, so the `/Title` entry is read directly off the raw
/// bytes: find the key, then parse the literal-string or hex-string value
/// that follows it (handling the UTF-16BE-with-BOM encoding PDF writers use
/// for non-ASCII titles).
fn pdf_title_from_metadata(bytes: &[u8]) -> Option<String> {
    let idx = find_subsequence(bytes, b"/Title")?;
    let mut pos = idx + b"/Title".len();
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }

    let raw = match bytes.get(pos)? {
        b'(' => parse_literal_string(&bytes[pos + 1..])?,
        b'<' => parse_hex_string(&bytes[pos + 1..])?,
        _ => return None,
    };

    let decoded = decode_pdf_string(&raw);
    let trimmed = decoded.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Parses a PDF literal string `(...)` starting just after the opening
/// paren, respecting backslash escapes and balanced nested parens.
fn parse_literal_string(rest: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut i = 0;
    while i < rest.len() {
        match rest[i] {
            b'\\' if i + 1 < rest.len() => {
                out.push(rest[i + 1]);
                i += 2;
            }
            b'(' => {
                depth += 1;
                out.push(b'(');
                i += 1;
            }
            b')' => {
                if depth == 0 {
                    return Some(out);
                }
                depth -= 1;
                out.push(b')');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    None
}

/// Parses a PDF hex string `<...>` starting just after the opening angle
/// bracket.
fn parse_hex_string(rest: &[u8]) -> Option<Vec<u8>> {
    let end = rest.iter().position(|&b| b == b'>')?;
    let hex: Vec<u8> = rest[..end].iter().copied().filter(|b| !b.is_ascii_whitespace()).collect();
    let mut out = Vec::with_capacity(hex.len() / 2);
    let mut chunks = hex.chunks(2);
    for chunk in &mut chunks {
        let pair = if chunk.len() == 2 {
            [chunk[0], chunk[1]]
        } else {
            [chunk[0], b'0']
        };
        let hi = (pair[0] as char).to_digit(16)?;
        let lo = (pair[1] as char).to_digit(16)?;
        out.push(((hi << 4) | lo) as u8);
    }
    Some(out)
}

/// PDF strings are either UTF-16BE with a leading `FE FF` BOM, or
/// PDFDocEncoding (treated here as Latin-1, close enough for titles).
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks(2)
            .filter(|c| c.len() == 2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

fn basename_title(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segments: Vec<&str> = parsed.path_segments()?.collect();
    let last = segments.iter().rev().find(|s| !s.is_empty())?;
    let stem = last.trim_end_matches(".pdf");
    if stem.is_empty() {
        None
    } else {
        Some(stem.replace(['-', '_'], " "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basename_title_strips_extension_and_separators() {
        let title = basename_title("https://example.com/reports/annual-report_2025.pdf").unwrap();
        assert_eq!(title, "annual report 2025");
    }

    #[test]
    fn basename_title_none_for_empty_path() {
        assert!(basename_title("https://example.com/").is_none());
    }

    #[test]
    fn extract_fails_readability_on_garbage_bytes() {
        let result = extract(b"not a pdf at all", "https://example.com/x.pdf");
        assert_eq!(result, Err(ExtractError::ReadabilityFailed));
    }

    #[test]
    fn metadata_title_reads_a_literal_string() {
        let bytes = b"1 0 obj << /Title (Annual Report) /Author (Someone) >> endobj";
        assert_eq!(
            pdf_title_from_metadata(bytes).as_deref(),
            Some("Annual Report")
        );
    }

    #[test]
    fn metadata_title_reads_a_hex_string() {
        // "<48656c6c6f>" is the hex encoding of "Hello".
        let bytes = b"1 0 obj << /Title <48656c6c6f> >> endobj";
        assert_eq!(pdf_title_from_metadata(bytes).as_deref(), Some("Hello"));
    }

    #[test]
    fn metadata_title_is_none_when_absent() {
        let bytes = b"1 0 obj << /Author (Someone) >> endobj";
        assert_eq!(pdf_title_from_metadata(bytes), None);
    }

    #[test]
    fn metadata_title_wins_over_basename_fallback_in_the_precedence_chain() {
        let bytes = b"1 0 obj << /Title (From Metadata) >> endobj";
        let url = "https://example.com/reports/annual-report_2025.pdf";

        let title = pdf_title_from_metadata(bytes)
            .or_else(|| basename_title(url))
            .unwrap();

        assert_eq!(title, "From Metadata");
    }
}
