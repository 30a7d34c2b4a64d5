//! Classifies captured screen text and builds the completion request.
//!
//! The kind of question on screen decides which system prompt the model
//! gets: coding questions ask for code in the detected language, multiple
//! choice asks for a letter, anything else asks for a concise explanation.
//! Every variant requests the strict JSON shape the normalizer's first step
//! expects.

use crate::completion::ChatMessage;
use regex::Regex;
use std::sync::LazyLock;

/// Appended to every system prompt so well-behaved models hit the
/// normalizer's strict-parse fast path.
const FORMAT_INSTRUCTION: &str = r#"Respond with a JSON object with exactly two string fields: "explanation" and "python_code". Put all code in "python_code" (empty string if none)."#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    Coding,
    Choice,
    Text,
}

static CODING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)write.*(function|program|code)",
        r"(?i)implement.*(function|algorithm)",
        r"(?i)create.*(function|class)",
        r"(?i)solve.*(problem|code)",
        r"def\s+\w+\s*\(|class\s+\w+\s*:",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("coding pattern"))
    .collect()
});

static CHOICE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\(a\).*\(b\)",
        r"(?i)\ba\)\s*.*\bb\)",
        r"(?i)select.*correct.*option",
        r"(?i)which.*following.*options?",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("choice pattern"))
    .collect()
});

/// Language keyword patterns, most specific first so "javascript" is not
/// claimed by "java".
static LANGUAGES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("javascript", r"(?i)\b(javascript|js|node)\b"),
        ("typescript", r"(?i)\b(typescript|ts)\b"),
        ("python", r"(?i)\b(python|py)\b"),
        ("java", r"(?i)\bjava\b"),
        ("cpp", r"(?i)\bc\+\+|\bcpp\b"),
        ("rust", r"(?i)\brust\b"),
        ("go", r"(?i)\b(go|golang)\b"),
    ]
    .iter()
    .map(|(name, p)| (*name, Regex::new(p).expect("language pattern")))
    .collect()
});

/// Detects what kind of question the captured text contains. Short or empty
/// captures default to plain text.
pub fn analyze_kind(text: &str) -> QuestionKind {
    if text.trim().len() < 10 {
        return QuestionKind::Text;
    }
    if CODING_PATTERNS.iter().any(|p| p.is_match(text)) {
        return QuestionKind::Coding;
    }
    if CHOICE_PATTERNS.iter().any(|p| p.is_match(text)) {
        return QuestionKind::Choice;
    }
    QuestionKind::Text
}

/// Detects the programming language the question asks for, defaulting to
/// Python when nothing is named.
pub fn detect_language(text: &str) -> &'static str {
    LANGUAGES
        .iter()
        .find(|(_, pattern)| pattern.is_match(text))
        .map(|(name, _)| *name)
        .unwrap_or("python")
}

/// Builds the system and user messages for one completion call from the
/// captured screen and audio text.
pub fn build_messages(screen_text: &str, audio_text: &str) -> Vec<ChatMessage> {
    let audio_ctx = match audio_text.trim() {
        "" => "No audio",
        t => t,
    };

    let (system, user) = match analyze_kind(screen_text) {
        QuestionKind::Coding => {
            let language = detect_language(screen_text).to_uppercase();
            (
                format!("Generate {language} code. Code only with inline comments. {FORMAT_INSTRUCTION}"),
                format!("PROBLEM:\n{screen_text}\n\nAUDIO:{audio_ctx}"),
            )
        }
        QuestionKind::Choice => (
            format!("Answer the multiple-choice question. State the letter first. {FORMAT_INSTRUCTION}"),
            format!("QUESTION:\n{screen_text}\n\nAUDIO:{audio_ctx}"),
        ),
        QuestionKind::Text => (
            format!("Explain concisely with bullet points. {FORMAT_INSTRUCTION}"),
            format!("QUESTION:\n{screen_text}\n\nAUDIO:{audio_ctx}"),
        ),
    };

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}
