//! HTML to text stripping and plausibility checks
//!
//! Document hosts answer failed exports with login pages, "loading" shells
//! or access-request screens, usually with a 200 status. The predicates
//! here let the resolver tell those apart from real document text.

use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_STYLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(script|style|noscript|template)\b[^>]*>.*?</(script|style|noscript|template)\s*>")
        .expect("valid static regex")
});

static COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid static regex"));

static BLOCK_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|li|tr|h[1-6]|table|section|article|blockquote|pre)\s*>")
        .expect("valid static regex")
});

static CELL_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</t[dh]\s*>").expect("valid static regex"));

static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid static regex"));

static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});")
        .expect("valid static regex")
});

static INLINE_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \u{a0}]+").expect("valid static regex"));

static BLANK_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("valid static regex"));

static TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title\s*>").expect("valid static regex")
});

/// Lowercased markers of host shells that are never document content
const SHELL_MARKERS: &[&str] = &[
    "accounts.google.com/servicelogin",
    "accounts.google.com/v3/signin",
    "_docs_flag_initialdata",
    "you need access",
    "request access",
    "javascript isn't enabled in your browser",
    "javascript is not enabled",
    "please enable javascript",
    "sign in to continue",
    "this file is too large for google to scan",
    "sorry, the file you have requested does not exist",
];

/// Lowercased placeholder texts produced by hosts or by relays
const PLACEHOLDERS: &[&str] = &[
    "loading...",
    "loading…",
    "page not found",
    "404 not found",
    "access denied",
    "forbidden",
    "error 403",
    "error 404",
    "too many requests",
    "rate limit exceeded",
    "null",
    "undefined",
];

fn decode_entity(entity: &str) -> Option<String> {
    if let Some(num) = entity.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    let decoded = match entity {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        "ndash" => "–",
        "mdash" => "—",
        "hellip" => "…",
        "lsquo" => "‘",
        "rsquo" => "’",
        "ldquo" => "“",
        "rdquo" => "”",
        "middot" => "·",
        _ => return None,
    };
    Some(decoded.to_string())
}

/// Decode HTML character references
#[must_use]
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures<'_>| {
            decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Strip markup and return readable text
///
/// Scripts, styles and comments are dropped, block-level closers become
/// line breaks, table cells become tab-separated, and whitespace runs are
/// collapsed. Text without any tags passes through with only whitespace
/// normalisation.
#[must_use]
pub fn html_to_text(html: &str) -> String {
    let text = SCRIPT_STYLE.replace_all(html, "");
    let text = COMMENT.replace_all(&text, "");
    let text = BLOCK_BREAK.replace_all(&text, "\n");
    let text = CELL_BREAK.replace_all(&text, "\t");
    let text = TAG.replace_all(&text, "");
    let text = decode_entities(&text);
    let text = text.replace("\r\n", "\n");

    let lines: Vec<String> = text
        .lines()
        .map(|line| INLINE_SPACE.replace_all(line, " ").trim().to_string())
        .collect();
    let joined = lines.join("\n");
    BLANK_RUN.replace_all(joined.trim(), "\n\n").into_owned()
}

/// Contents of the `<title>` element, if any
#[must_use]
pub fn extract_title(html: &str) -> Option<String> {
    TITLE
        .captures(html)
        .map(|caps| decode_entities(caps[1].trim()))
        .filter(|t| !t.is_empty())
}

/// True if the body is an HTML document or a known host shell rather
/// than document text
#[must_use]
pub fn looks_like_html_shell(text: &str) -> bool {
    let head: String = text.trim_start().chars().take(512).collect::<String>().to_lowercase();
    if head.starts_with("<!doctype html") || head.starts_with("<html") || head.starts_with("<?xml") {
        return true;
    }
    let lower = text.to_lowercase();
    SHELL_MARKERS.iter().any(|m| lower.contains(m))
}

/// True if the whole text is a known placeholder
#[must_use]
pub fn is_placeholder(text: &str) -> bool {
    let trimmed = text.trim().to_lowercase();
    trimmed.is_empty() || PLACEHOLDERS.iter().any(|p| trimmed == *p)
}

/// Non-empty, longer than `min_len` characters, and not a shell or
/// placeholder
#[must_use]
pub fn is_plausible(text: &str, min_len: usize) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty()
        && trimmed.chars().count() > min_len
        && !is_placeholder(trimmed)
        && !looks_like_html_shell(trimmed)
}
