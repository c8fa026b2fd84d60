//! Documentation-path signature extraction
//!
//! Rendered documentation pages mark declarations with two conventions this
//! extractor understands: fenced code blocks (`<pre><code>` holding the raw
//! signature) and headings whose text is itself a signature. The first
//! paragraph following the marker becomes the description. The output is
//! approximate by nature; exactness comes from the code path.

use crate::extract::{parse_param_list, Provenance, SignatureRecord, SourceLocator};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

/// Matches function/method declarations across the supported syntaxes:
/// `fn name(...) -> Ret`, `def name(...) -> ret:`, `function name(...)`,
/// `func name(...) ret`
fn signature_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?x)
            \b(?:pub\s+)?(?:async\s+)?(?:fn|def|function|func)\s+
            (?P<name>[A-Za-z_][A-Za-z0-9_.:]*)\s*
            \((?P<params>[^)]*)\)\s*
            (?:->\s*(?P<ret>[^:{\n]+)|(?P<goret>[A-Za-z_*\[\]][^{:\n]*))?
            ",
        )
        .expect("signature pattern is valid")
    })
}

/// Extracts every recognizable signature from one documentation page
pub fn extract_page(html: &str, page_url: &str) -> Vec<SignatureRecord> {
    let document = Html::parse_document(html);
    let mut records = Vec::new();

    let pre_selector = Selector::parse("pre").expect("valid selector");
    for pre in document.select(&pre_selector) {
        let text = element_text(&pre);
        // Only the first line of a block is a candidate declaration; the
        // rest is usually an example body.
        if let Some(first_line) = text.lines().find(|l| !l.trim().is_empty()) {
            if let Some(mut record) = parse_signature_line(first_line, page_url) {
                record.description = following_paragraph(&pre).unwrap_or_default();
                records.push(record);
            }
        }
    }

    let heading_selector = Selector::parse("h1, h2, h3, h4").expect("valid selector");
    for heading in document.select(&heading_selector) {
        let text = element_text(&heading);
        if let Some(mut record) = parse_signature_line(&text, page_url) {
            record.description = following_paragraph(&heading).unwrap_or_default();
            records.push(record);
        }
    }

    records
}

/// Attempts to read one line of text as a declaration
fn parse_signature_line(line: &str, page_url: &str) -> Option<SignatureRecord> {
    let captures = signature_pattern().captures(line.trim())?;

    let name = captures.name("name")?.as_str().to_string();
    let params = parse_param_list(captures.name("params").map_or("", |m| m.as_str()));
    let return_type = captures
        .name("ret")
        .or_else(|| captures.name("goret"))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty());

    Some(SignatureRecord {
        name,
        params,
        return_type,
        description: String::new(),
        provenance: Provenance::Docs,
        locator: SourceLocator::Url(page_url.to_string()),
    })
}

/// Text of the nearest `<p>` sibling after the marker element
fn following_paragraph(element: &ElementRef<'_>) -> Option<String> {
    element
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "p")
        .map(|p| collapse_whitespace(&element_text(&p)))
        .filter(|s| !s.is_empty())
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join("")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
