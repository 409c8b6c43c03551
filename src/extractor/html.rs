//! Readable-content extraction: a small main-article heuristic over
//! `scraper`'s parsed DOM, no dedicated readability crate in the stack.

use scraper::{Html, Selector};

use super::{reject_if_too_short, ExtractError, Extracted};

const NOISE_SELECTORS: &[&str] = &["script", "style", "nav", "header", "footer", "aside", "noscript"];
const MAIN_CANDIDATES: &[&str] = &["article", "[role=main]", "main"];

pub fn extract(html: &str) -> Result<Extracted, ExtractError> {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let image_url = extract_image(&document);
    let text = extract_main_text(&document);

    reject_if_too_short(&title, &text)?;

    Ok(Extracted {
        title,
        text,
        image_url,
    })
}

fn extract_title(document: &Html) -> String {
    if let Ok(selector) = Selector::parse("title") {
        if let Some(el) = document.select(&selector).next() {
            let text = el.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return text;
            }
        }
    }
    if let Ok(selector) = Selector::parse("h1") {
        if let Some(el) = document.select(&selector).next() {
            return el.text().collect::<String>().trim().to_string();
        }
    }
    String::new()
}

fn extract_image(document: &Html) -> Option<String> {
    for selector_str in ["meta[property='og:image']", "meta[name='twitter:image']"] {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(el) = document.select(&selector).next() {
                if let Some(content) = el.value().attr("content") {
                    if !content.trim().is_empty() {
                        return Some(content.trim().to_string());
                    }
                }
            }
        }
    }
    None
}

/// Strips boilerplate noise, then prefers an `article`/`[role=main]`/`main`
/// element; falls back to the largest text-bearing `div` in the document.
fn extract_main_text(document: &Html) -> String {
    for selector_str in MAIN_CANDIDATES {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(el) = document.select(&selector).next() {
                let text = collect_text_excluding_noise(&el);
                if !text.trim().is_empty() {
                    return text;
                }
            }
        }
    }

    if let Ok(div_selector) = Selector::parse("div") {
        let mut best = String::new();
        for el in document.select(&div_selector) {
            let text = collect_text_excluding_noise(&el);
            if text.len() > best.len() {
                best = text;
            }
        }
        if !best.trim().is_empty() {
            return best;
        }
    }

    collect_text_excluding_noise(&document.root_element())
}

fn collect_text_excluding_noise(el: &scraper::ElementRef) -> String {
    let mut out = String::new();
    for node in el.children() {
        if let Some(child_el) = scraper::ElementRef::wrap(node) {
            let name = child_el.value().name();
            if NOISE_SELECTORS.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                continue;
            }
            out.push_str(&collect_text_excluding_noise(&child_el));
            out.push(' ');
        } else if let Some(text) = node.value().as_text() {
            out.push_str(text);
            out.push(' ');
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
