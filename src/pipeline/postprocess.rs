//! Post-processing: deterministic cleanup of raw model text before JSON parsing.
//!
//! Even when asked for "only the JSON array", chat-style models sometimes
//! wrap it in a ```` ```json ```` fence, emit Windows line endings, or lead
//! with a byte-order mark. `serde_json` rejects all three. These rules remove
//! the wrapping without touching the payload, so a response is either valid
//! JSON after cleanup or a genuine format error.
//!
//! Rules (applied in order):
//! 1. Trim invisible Unicode (BOM, zero-width spaces/joiners, word joiner)
//!    and whitespace from both ends. Inside the text they are left alone:
//!    ZWJ/ZWNJ are part of the spelling of many Indic names.
//! 2. Normalise line endings (CRLF → LF)
//! 3. Strip one outer Markdown fence, with or without a language tag

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to the raw model output.
pub fn clean_response(input: &str) -> String {
    let s = trim_invisible_edges(input);
    let s = normalise_line_endings(s);
    strip_code_fences(&s)
}

// ── Rule 1: Trim invisible Unicode at the edges ─────────────────────────────

fn is_invisible(c: char) -> bool {
    matches!(c, '\u{FEFF}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}')
}

fn trim_invisible_edges(input: &str) -> &str {
    input.trim_matches(|c: char| c.is_whitespace() || is_invisible(c))
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\n(.*?)\n?```\s*$").expect("static fence regex")
});

fn strip_code_fences(input: &str) -> String {
    let trimmed = trim_invisible_edges(input);
    match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => trim_invisible_edges(&caps[1]).to_string(),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fence() {
        let input = "```json\n[{\"slNo\":\"1\"}]\n```";
        assert_eq!(clean_response(input), "[{\"slNo\":\"1\"}]");
    }

    #[test]
    fn test_strip_bare_fence() {
        let input = "```\n[]\n```\n";
        assert_eq!(clean_response(input), "[]");
    }

    #[test]
    fn test_unfenced_is_only_trimmed() {
        assert_eq!(clean_response("  [1, 2]\n"), "[1, 2]");
    }

    #[test]
    fn test_bom_and_crlf_removed() {
        let input = "\u{FEFF}```json\r\n[]\r\n```";
        assert_eq!(clean_response(input), "[]");
    }

    #[test]
    fn test_invisible_run_inside_fence_trimmed() {
        let input = "```json\n\u{200B}[]\u{FEFF}\n```";
        assert_eq!(clean_response(input), "[]");
    }

    #[test]
    fn test_joiners_inside_values_kept() {
        let input = "[{\"studentName\":\"\u{0915}\u{094D}\u{200D}\u{0937}\",\"subjectName\":\"A\u{200C}B\u{2060}\"}]";
        assert_eq!(clean_response(input), input);
    }

    #[test]
    fn test_inner_backticks_kept() {
        let input = "[{\"subjectName\":\"Use of `code`\"}]";
        assert_eq!(clean_response(input), input);
    }
}
