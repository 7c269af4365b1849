use std::sync::OnceLock;

use regex::Regex;

// Leading "12." / "3)" style numbering on canned questions, plus any
// whitespace separating it from the question proper.
const QUESTION_PREFIX_PATTERN: &str = r"^[0-9]{1,2}\w*[.)\-]*\w*\s*";

fn question_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(QUESTION_PREFIX_PATTERN).expect("static pattern compiles"))
}

/// Strip a numeric/bullet prefix from a question before further
/// processing.
///
/// Only a matching leading run is removed; the remainder is left
/// untouched and unprefixed input comes back unmodified. Idempotent.
pub fn strip_question_prefix(question: &str) -> String {
    match question_prefix().find(question) {
        Some(matched) => question[matched.end()..].to_string(),
        None => question.to_string(),
    }
}
