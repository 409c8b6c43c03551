//! Synthetic content for known video hosts: `{title}\n\nDescription:\n{description}`.

use scraper::{Html, Selector};

use super::Extracted;

pub fn extract(html: &str) -> Option<Extracted> {
    let document = Html::parse_document(html);

    let title_selector = Selector::parse("title").ok()?;
    let title = document
        .select(&title_selector)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    if title.is_empty() {
        return None;
    }

    let description_selector = Selector::parse("meta[name='description']").ok()?;
    let description = document
        .select(&description_selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(str::trim)
        .filter(|s| !s.is_empty())?;

    Some(Extracted {
        title: title.clone(),
        text: format!("{title}\n\nDescription:\n{description}"),
        image_url: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_synthetic_content_from_title_and_description() {
        let html = r#"
            <html><head>
                <title>Rust in 100 Seconds</title>
                <meta name="description" content="A whirlwind tour of the Rust language.">
            </head></html>
        "#;
        let extracted = extract(html).unwrap();
        assert_eq!(
            extracted.text,
            "Rust in 100 Seconds\n\nDescription:\nA whirlwind tour of the Rust language."
        );
    }

    #[test]
    fn returns_none_when_description_missing() {
        let html = "<html><head><title>No Description</title></head></html>";
        assert!(extract(html).is_none());
    }
}
