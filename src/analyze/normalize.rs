// src/analyze/normalize.rs
//! Text normalization shared by the analyzer and the mention detector.
//!
//! - `normalize_text`: markup, entities and URLs removed, whitespace folded.
//! - `strip_markup`: same as above but URLs are kept (mention classification needs them).
//! - `extract_links`: http(s) URLs found in the raw text, in order of appearance.

use once_cell::sync::OnceCell;
use regex::Regex;

fn re_tags() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap())
}

fn re_urls() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r#"(?i)https?://[^\s<>"']+"#).unwrap())
}

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Strip tags + decode entities + fold whitespace. URLs survive.
pub fn strip_markup(s: &str) -> String {
    // 1) Strip HTML tags
    let out = re_tags().replace_all(s, " ");

    // 2) HTML entity decode (after tags, so escaped markup stays as text)
    let out = html_escape::decode_html_entities(&out).to_string();

    // 3) Normalize “ ” ‘ ’ to ASCII quotes
    let out = out
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    fold_ws(&out)
}

/// Full normalization used before sentiment/entity/topic analysis.
/// Never fails; may return an empty string.
pub fn normalize_text(s: &str) -> String {
    let out = strip_markup(s);
    let out = re_urls().replace_all(&out, " ");
    fold_ws(&out)
}

/// All http(s) links in `s`, trailing sentence punctuation trimmed.
pub fn extract_links(s: &str) -> Vec<String> {
    re_urls()
        .find_iter(s)
        .map(|m| {
            m.as_str()
                .trim_end_matches(['.', ',', ';', ':', ')', '!', '?'])
                .to_string()
        })
        .filter(|l| l.len() > "http://".len())
        .collect()
}

/// True if the text carries at least one http(s) URL.
pub fn contains_url(s: &str) -> bool {
    re_urls().is_match(s)
}

fn fold_ws(s: &str) -> String {
    re_ws().replace_all(s, " ").trim().to_string()
}
