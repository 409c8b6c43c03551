//! Extractor: turns a fetched payload into `{title, text, image_url}`,
//! dispatching on content-type and URL shape.

mod html;
mod pdf;
mod video;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractError {
    #[error("Could not extract readable text from page")]
    ReadabilityFailed,
}

/// The result of a successful extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub title: String,
    pub text: String,
    pub image_url: Option<String>,
}

const MIN_TEXT_CHARS: usize = 50;
const VIDEO_HOSTS: &[&str] = &["youtube.com", "www.youtube.com", "youtu.be"];

/// Dispatches on content-type and URL shape, per the extractor contract.
pub fn extract(
    bytes: &[u8],
    content_type: Option<&str>,
    final_url: &str,
) -> Result<Extracted, ExtractError> {
    let is_pdf = content_type
        .map(|ct| ct.contains("application/pdf"))
        .unwrap_or(false)
        || final_url.to_ascii_lowercase().ends_with(".pdf");

    if is_pdf {
        return pdf::extract(bytes, final_url);
    }

    let html = String::from_utf8_lossy(bytes).into_owned();

    let host = url::Url::parse(final_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();
    if VIDEO_HOSTS.contains(&host.as_str()) {
        if let Some(extracted) = video::extract(&html) {
            return Ok(extracted);
        }
    }

    html::extract(&html)
}

pub(crate) fn reject_if_too_short(title: &str, text: &str) -> Result<(), ExtractError> {
    if title.trim().is_empty() || text.chars().count() < MIN_TEXT_CHARS {
        return Err(ExtractError::ReadabilityFailed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_video_host_to_synthetic_extraction() {
        let html = r#"
            <html><head>
                <title>My Video</title>
                <meta name="description" content="A description of the video content here.">
            </head><body></body></html>
        "#;
        let result = extract(html.as_bytes(), Some("text/html"), "https://youtube.com/watch?v=x").unwrap();
        assert!(result.text.contains("A description of the video content here."));
    }

    #[test]
    fn dispatches_pdf_by_content_type() {
        let result = extract(b"%PDF-1.4 not really a pdf", Some("application/pdf"), "https://example.com/doc");
        assert!(result.is_err());
    }
}
