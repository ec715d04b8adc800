//! HTML parser: body decoding, subtree removal, field extraction, raw-HTML
//! compression (§4.7).
//!
//! `parse_html` is a pure function over bytes; the fetch-queue backpressure
//! check that drops discovered links under load (§4.7 "drop if backpressure
//! is high") is applied by the caller (the parser pool loop in
//! [`crate::crawler::coordinator`]), which is the only place that knows the
//! current fetch queue depth.

use crate::url::normalize_url;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use scraper::{Html, Selector};
use std::io::{Read, Write};
use url::Url;

/// Subtrees stripped before any text extraction: navigation chrome and
/// script/style payloads contribute no meaningful page content.
const REMOVED_TAGS: &[&str] = &["script", "style", "nav", "footer", "header", "noscript", "iframe", "svg"];

/// Fields extracted from a fetched page (§3's search-index row plus the
/// discovered outlinks used to grow the frontier).
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    pub title: Option<String>,
    pub description: String,
    pub h1: String,
    pub h2: String,
    pub important_text: String,
    pub content: String,
    pub links: Vec<String>,
}

/// Decodes `body` as UTF-8, falling back to Latin-1 (every byte maps 1:1 to
/// the matching Unicode scalar, so this never fails) for pages that declare
/// no charset or lie about it.
fn decode_body(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(s) => s.to_string(),
        Err(_) => body.iter().map(|&b| b as char).collect(),
    }
}

/// Parses a fetched HTML body into its structured fields.
///
/// `page_url` is used to resolve and canonicalise relative links;
/// `max_text_chars` truncates the extracted `content` field (MAX_TEXT_CHARS).
pub fn parse_html(body: &[u8], page_url: &Url, max_text_chars: usize) -> ParsedPage {
    let decoded = decode_body(body);
    let document = Html::parse_document(&decoded);

    let title = extract_title(&document);
    let description = extract_description(&document);
    let h1 = extract_headings(&document, "h1");
    let h2 = extract_headings(&document, "h2, h3");
    let important_text = extract_concatenated(&document, "b, strong, em");
    let content = extract_content(&document, max_text_chars);
    let links = extract_links(&document, page_url);

    ParsedPage {
        title,
        description,
        h1,
        h2,
        important_text,
        content,
        links,
    }
}

/// Collects the visible text under `el`, skipping any descendant whose tag
/// is in [`REMOVED_TAGS`].
fn collect_text(el: scraper::ElementRef, out: &mut String) {
    use scraper::Node;

    if REMOVED_TAGS.contains(&el.value().name()) {
        return;
    }
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(_) => {
                if let Some(child_el) = scraper::ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

/// Collects the visible text of `document`, skipping any element (and its
/// descendants) whose tag is in [`REMOVED_TAGS`].
fn visible_text(document: &Html) -> String {
    let mut out = String::new();
    collect_text(document.root_element(), &mut out);
    out
}

fn extract_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_description(document: &Html) -> String {
    let Ok(selector) = Selector::parse(r#"meta[name="description"]"#) else {
        return String::new();
    };
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .unwrap_or("")
        .trim()
        .to_string()
}

fn extract_headings(document: &Html, selector_str: &str) -> String {
    let Ok(selector) = Selector::parse(selector_str) else {
        return String::new();
    };
    let mut parts = Vec::new();
    for el in document.select(&selector) {
        let text = el.text().collect::<String>();
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed.to_string());
        }
    }
    parts.join(" ")
}

fn extract_concatenated(document: &Html, selector_str: &str) -> String {
    extract_headings(document, selector_str)
}

fn extract_content(document: &Html, max_chars: usize) -> String {
    let raw = visible_text(document);
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > max_chars {
        collapsed.chars().take(max_chars).collect()
    } else {
        collapsed
    }
}

fn extract_links(document: &Html, page_url: &Url) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut links = Vec::new();
    for el in document.select(&selector) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        if href.starts_with("javascript:") || href.starts_with("mailto:") || href.starts_with("tel:") || href.starts_with("data:") {
            continue;
        }
        if let Ok(canonical) = normalize_url(href, Some(page_url)) {
            links.push(canonical.to_string());
        }
    }
    links
}

/// Compresses raw HTML bytes with deflate (§3 "compressed raw HTML bytes").
pub fn compress_html(raw: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw)?;
    encoder.finish()
}

/// Inverse of [`compress_html`].
pub fn decompress_html(compressed: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(compressed);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
