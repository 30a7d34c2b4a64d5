//! Normalizes free-form model output into a structured answer.
//!
//! Models are asked for a strict JSON shape but routinely answer with fenced
//! markdown, bare prose, or a mix. Normalization runs a fixed precedence
//! pipeline, first match wins:
//!
//! 1. strict JSON parse of `{explanation, python_code|code}`
//! 2. first fenced code block, surrounding prose becomes the explanation
//! 3. keyword/indentation line classification
//! 4. whole text as explanation, no code
//!
//! Each step is a pure function returning `Option<Answer>` so the precedence
//! is explicit and each step is testable in isolation. Normalization never
//! fails; ambiguity resolves to a best-effort answer.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Substituted when code was recovered but no explanation text remained.
const CODE_LEAD_IN: &str = "Here's the solution:";

/// Returned when the model output yields neither explanation nor code.
const UNINTERPRETABLE: &str =
    "The model output could not be interpreted and no content could be extracted.";

/// The structured result of one completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub explanation: String,
    pub code: String,
}

/// Lines that indicate the text contains code at all (step 3 gate).
static CODE_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:def |class |function |fn |import |from \S+ import )")
        .expect("code marker pattern")
});

/// Unindented lines that still classify as code.
static CODE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:def|class|function|fn|import|from|return|if|elif|else|for|while|try|except|with)\b")
        .expect("code line pattern")
});

/// Turns raw model text into an [`Answer`]. Total: always produces a
/// presentable result.
pub fn normalize(raw: &str) -> Answer {
    let mut answer = parse_structured(raw)
        .or_else(|| extract_fenced_block(raw))
        .or_else(|| classify_lines(raw))
        .unwrap_or_else(|| Answer {
            explanation: raw.trim().to_string(),
            code: String::new(),
        });

    if answer.explanation.is_empty() {
        answer.explanation = if answer.code.is_empty() {
            UNINTERPRETABLE.to_string()
        } else {
            CODE_LEAD_IN.to_string()
        };
    }
    answer
}

/// Step 1: the model followed instructions and returned the strict JSON
/// object. Requires exactly `explanation` plus one code field, both strings.
fn parse_structured(raw: &str) -> Option<Answer> {
    let value: serde_json::Value = serde_json::from_str(raw.trim()).ok()?;
    let object = value.as_object()?;
    if object.len() != 2 {
        return None;
    }
    let explanation = object.get("explanation")?.as_str()?;
    let code = object
        .get("python_code")
        .or_else(|| object.get("code"))?
        .as_str()?;
    Some(Answer {
        explanation: explanation.to_string(),
        code: strip_code_fences(code),
    })
}

/// Step 2: the first triple-backtick block becomes the code; everything
/// before and after it becomes the explanation, joined with a blank line.
fn extract_fenced_block(raw: &str) -> Option<Answer> {
    let open = raw.find("```")?;
    let after_open = &raw[open + 3..];
    let close = after_open.find("```")?;

    let inner = &after_open[..close];
    // The rest of the opening fence line is a language tag, not code.
    let code = match inner.find('\n') {
        Some(tag_end) => &inner[tag_end + 1..],
        None => inner,
    };

    let before = raw[..open].trim();
    let after = after_open[close + 3..].trim();
    let explanation = match (before.is_empty(), after.is_empty()) {
        (false, false) => format!("{before}\n\n{after}"),
        (false, true) => before.to_string(),
        (true, false) => after.to_string(),
        (true, true) => String::new(),
    };

    Some(Answer {
        explanation,
        code: code.trim().to_string(),
    })
}

/// Step 3: no fence, but the text contains definition keywords. Indented
/// lines and keyword-led lines are code, the rest is explanation, both in
/// original order.
fn classify_lines(raw: &str) -> Option<Answer> {
    if !CODE_MARKERS.is_match(raw) {
        return None;
    }

    let mut code_lines = Vec::new();
    let mut prose_lines = Vec::new();
    for line in raw.lines() {
        let indented = line.starts_with(' ') || line.starts_with('\t');
        if !line.trim().is_empty() && (indented || CODE_LINE.is_match(line)) {
            code_lines.push(line);
        } else {
            prose_lines.push(line);
        }
    }
    if code_lines.is_empty() {
        return None;
    }

    Some(Answer {
        explanation: prose_lines.join("\n").trim().to_string(),
        code: code_lines.join("\n").trim_end().to_string(),
    })
}

/// Removes a surrounding triple-backtick fence from a code string: the
/// leading fence line (with optional language tag) and the trailing fence.
fn strip_code_fences(code: &str) -> String {
    let mut s = code.trim();
    if let Some(rest) = s.strip_prefix("```") {
        s = match rest.find('\n') {
            Some(nl) => &rest[nl + 1..],
            None => rest,
        };
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_json_passes_through_verbatim() {
        let raw = r#"{"explanation":"Sorts list","python_code":"def f(x):\n  return sorted(x)"}"#;
        let answer = normalize(raw);
        assert_eq!(answer.explanation, "Sorts list");
        assert_eq!(answer.code, "def f(x):\n  return sorted(x)");
    }

    #[test]
    fn strict_json_accepts_a_plain_code_field() {
        let raw = r#"{"explanation":"Adds","code":"a + b"}"#;
        let answer = normalize(raw);
        assert_eq!(answer.explanation, "Adds");
        assert_eq!(answer.code, "a + b");
    }

    #[test]
    fn strict_json_strips_fences_from_the_code_field_only() {
        let raw = r#"{"explanation":"Prints","python_code":"```python\nprint(1)\n```"}"#;
        let answer = normalize(raw);
        assert_eq!(answer.explanation, "Prints");
        assert_eq!(answer.code, "print(1)");
    }

    #[test]
    fn json_with_extra_fields_is_not_a_strict_match() {
        // Falls through to the fallback step: the whole text is explanation.
        let raw = r#"{"explanation":"x","python_code":"y","confidence":1}"#;
        let answer = normalize(raw);
        assert_eq!(answer.explanation, raw);
        assert_eq!(answer.code, "");
    }

    #[test]
    fn json_with_non_string_code_is_not_a_strict_match() {
        let raw = r#"{"explanation":"x","python_code":42}"#;
        assert!(parse_structured(raw).is_none());
    }

    #[test]
    fn fenced_block_is_extracted_with_surrounding_prose() {
        let raw = "Use this:\n```python\nprint(1)\n```\nDone.";
        let answer = normalize(raw);
        assert_eq!(answer.explanation, "Use this:\n\nDone.");
        assert_eq!(answer.code, "print(1)");
    }

    #[test]
    fn untagged_fence_works_too() {
        let raw = "Try:\n```\nx = 1\n```";
        let answer = normalize(raw);
        assert_eq!(answer.explanation, "Try:");
        assert_eq!(answer.code, "x = 1");
    }

    #[test]
    fn code_only_fence_gets_the_lead_in_explanation() {
        let raw = "```python\nprint(1)\n```";
        let answer = normalize(raw);
        assert_eq!(answer.explanation, CODE_LEAD_IN);
        assert_eq!(answer.code, "print(1)");
    }

    #[test]
    fn unclosed_fence_does_not_match_step_two() {
        assert!(extract_fenced_block("text ```python\nprint(1)").is_none());
    }

    #[test]
    fn keyword_lines_classify_as_code_without_a_fence() {
        let raw = "This reverses a string.\ndef rev(s):\n    return s[::-1]";
        let answer = normalize(raw);
        assert_eq!(answer.explanation, "This reverses a string.");
        assert_eq!(answer.code, "def rev(s):\n    return s[::-1]");
    }

    #[test]
    fn prose_without_code_markers_is_all_explanation() {
        let raw = "  The answer is B, because of associativity.  ";
        let answer = normalize(raw);
        assert_eq!(answer.explanation, "The answer is B, because of associativity.");
        assert_eq!(answer.code, "");
    }

    #[test]
    fn empty_output_yields_the_sentinel() {
        let answer = normalize("   \n  ");
        assert_eq!(answer.explanation, UNINTERPRETABLE);
        assert_eq!(answer.code, "");
    }

    #[test]
    fn strip_code_fences_handles_all_shapes() {
        assert_eq!(strip_code_fences("```python\nx\n```"), "x");
        assert_eq!(strip_code_fences("```\nx\n```"), "x");
        assert_eq!(strip_code_fences("```x```"), "x");
        assert_eq!(strip_code_fences("x"), "x");
    }
}
