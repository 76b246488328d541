use regex::Regex;
use std::sync::OnceLock;

fn vs_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s+VS\s+").unwrap())
}

fn v_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s+V\s+").unwrap())
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Clean a raw fixture line: tabs become spaces, standalone "VS"/"V"
/// tokens become the canonical " vs " separator, whitespace runs
/// collapse to single spaces. Total function, input comes back trimmed
/// and otherwise unchanged when nothing matches.
pub fn normalize_text(text: &str) -> String {
    let text = text.replace('\t', " ");
    let text = vs_token_re().replace_all(&text, " vs ");
    let text = v_token_re().replace_all(&text, " vs ");
    whitespace_re().replace_all(text.trim(), " ").to_string()
}
