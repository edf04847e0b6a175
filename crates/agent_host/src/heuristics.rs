//! Reply clean-up and implicit command detection.
//!
//! Models do not always follow the marker syntax: they show the arithmetic
//! instead of calling `--calc`, or announce a picture without writing
//! `--image`. The detectors here guess those cases and synthesize a marker
//! line. This is deliberately kept apart from the extractor so the marker
//! contract stays exact; everything here is a guess and can misfire.

use regex::Regex;
use shared::agent::CommandInvocation;
use std::sync::LazyLock;

use crate::extractor::has_marker_for;

static THINK_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*?</think>").expect("think pattern is valid"));

static THINK_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*$").expect("think pattern is valid"));

static IMAGE_MARKDOWN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("image pattern is valid"));

/// A whole line that is nothing but arithmetic, optionally ending in `=` or `?`
static BARE_EXPRESSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([-+(\s]*\d[\d\s.+\-*/()xX×]*?)\s*[=?]?\s*$")
        .expect("expression pattern is valid")
});

static CALC_REQUEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:calculate|compute|calcule[rz]?|calcul)\s*:?\s+([-+(]*\d[\d\s.+\-*/()xX×]*)",
    )
    .expect("calc request pattern is valid")
});

/// Two operands joined by a binary operator
static BINARY_OP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\d.)]\s*(?:\*\*|[+\-*/xX×])\s*[-+(]*\s*[\d.(]")
        .expect("operator pattern is valid")
});

/// Digits glued to a hyphen or slash: dates, phone numbers, ranges
static DASHED_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d-\d|^\s*\d{1,4}/\d{1,2}/\d{1,4}\s*$")
        .expect("dashed number pattern is valid")
});

static IMAGE_REQUEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:generate|create|draw|make|render|paint)\s+(?:me\s+)?(?:an?\s+|the\s+)?(?:image|picture|drawing|illustration)\s+(?:of|showing|with)\s+([^\n.!?]+)",
    )
    .expect("image request pattern is valid")
});

static IMAGE_REQUEST_FR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:génère|génèrer|générer|genere|generer|crée|créer|cree|creer|dessine|dessiner)\s+(?:moi\s+|-moi\s+)?(?:une?\s+)?(?:image|illustration|dessin|photo)\s+(?:d'|de\s+|du\s+|des\s+)([^\n.!?]+)",
    )
    .expect("image request pattern is valid")
});

/// Remove `<think>…</think>` sections, including an unterminated trailing one
pub fn strip_reasoning(text: &str) -> String {
    if !THINK_OPEN_RE.is_match(text) {
        return text.to_string();
    }
    let closed = THINK_BLOCK_RE.replace_all(text, "");
    THINK_OPEN_RE.replace(&closed, "").trim().to_string()
}

/// Text with embedded markdown images removed, for detection only
pub fn strip_generated_images(text: &str) -> String {
    IMAGE_MARKDOWN_RE.replace_all(text, "").into_owned()
}

fn has_binary_operator(expression: &str) -> bool {
    BINARY_OP_RE.is_match(expression)
}

/// An arithmetic expression the reply shows but did not hand to `--calc`
pub fn detect_implicit_calc(view: &str) -> Option<String> {
    if let Some(cap) = CALC_REQUEST_RE.captures(view) {
        let expression = cap[1].trim();
        if has_binary_operator(expression) {
            return Some(expression.to_string());
        }
    }

    view.lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .filter_map(|line| BARE_EXPRESSION_RE.captures(line))
        .map(|cap| cap[1].trim().to_string())
        .filter(|expression| !DASHED_NUMBER_RE.is_match(expression))
        .find(|expression| has_binary_operator(expression))
}

/// The subject of an image the reply talks about creating
pub fn detect_implicit_image(view: &str) -> Option<String> {
    IMAGE_REQUEST_RE
        .captures(view)
        .or_else(|| IMAGE_REQUEST_FR_RE.captures(view))
        .map(|cap| cap[1].trim().to_string())
        .filter(|subject| subject.chars().filter(|c| c.is_alphanumeric()).count() >= 2)
}

/// Append synthesized `--calc` / `--image` lines to `reply`.
///
/// A marker is only synthesized for an agent that `allowed` accepts and that
/// has no explicit marker among `explicit`.
pub fn augment_with_implicit_markers(
    reply: &str,
    view: &str,
    explicit: &[CommandInvocation],
    allowed: impl Fn(&str) -> bool,
) -> String {
    let mut augmented = reply.to_string();

    if allowed("calc") && !has_marker_for(explicit, "calc") {
        if let Some(expression) = detect_implicit_calc(view) {
            tracing::debug!("Implicit calculation detected: {}", expression);
            augmented.push_str(&format!("\n--calc {}", expression));
        }
    }

    if allowed("image") && !has_marker_for(explicit, "image") {
        if let Some(subject) = detect_implicit_image(view) {
            tracing::debug!("Implicit image request detected: {}", subject);
            augmented.push_str(&format!("\n--image {}", subject));
        }
    }

    augmented
}
