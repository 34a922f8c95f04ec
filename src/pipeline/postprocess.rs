//! Post-processing: deterministic clean-up of the raw model reply.
//!
//! The prompt asks for three bracket-labelled sections and nothing else, but
//! models drift:
//!
//! - reasoning models prepend a `<think>…</think>` block, and some distilled
//!   variants emit only the closing tag after their reasoning
//! - the whole reply may come back wrapped in a code fence
//! - Windows line endings and zero-width characters leak into section bodies
//!
//! These rules run before [`crate::answer::parse_reply`] so the section
//! grammar only ever sees the answer itself. Each rule is a pure
//! `&str → String` pass and is tested on its own.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so later patterns only deal with `\n`.
//! Reasoning blocks are removed before fence stripping because a fence inside
//! the reasoning must not be mistaken for the outer fence.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all clean-up rules to a raw reply.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Remove reasoning blocks (`<think>…</think>`, or everything up to a lone `</think>`)
/// 3. Strip an outer code fence around the whole reply
/// 4. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 5. Trim surrounding whitespace
pub fn clean_reply(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_reasoning(&s);
    let s = strip_outer_fence(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove reasoning blocks ──────────────────────────────────────────

static RE_THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?si)<think>.*?</think>").unwrap());

static RE_UNOPENED_THINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?si)^.*?</think>").unwrap());

fn remove_reasoning(input: &str) -> String {
    let s = RE_THINK_BLOCK.replace_all(input, "").into_owned();
    // An unterminated `<think>` means the reply was cut off mid-reasoning;
    // nothing after it is answer text.
    let s = match s.to_ascii_lowercase().find("<think>") {
        Some(pos) => s[..pos].to_string(),
        None => s,
    };
    RE_UNOPENED_THINK.replace(&s, "").into_owned()
}

// ── Rule 3: Strip outer code fence ───────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\n(.*)\n```\s*$").unwrap());

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 4: Strip invisible characters ───────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    )
}
