//! Four-level JSON recovery for LLM responses (§4.8, §9)
//!
//! Robust parsing is part of this adapter's contract, not general-purpose
//! utility code, and is independently testable without a network call.
//!
//! Levels, in order: direct parse → strip markdown code fences → extract
//! the first balanced `{...}` span → give up (caller falls back to an
//! empty shell and marks the extraction as failed).

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryLevel {
    Direct,
    CodeFenceStripped,
    BalancedBraceExtraction,
}

pub struct Recovered {
    pub value: Value,
    pub level: RecoveryLevel,
}

/// Strip ```json ... ``` or ``` ... ``` fences, keeping only the interior.
fn strip_code_fences(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return None;
    }
    let without_open = trimmed.strip_prefix("```")?;
    let without_lang = without_open
        .strip_prefix("json")
        .or_else(|| without_open.strip_prefix("JSON"))
        .unwrap_or(without_open);
    let body = without_lang.strip_suffix("```").unwrap_or(without_lang);
    Some(body.trim().to_string())
}

/// Find the first balanced `{...}` span, respecting nested braces and
/// string literals (so a brace inside a quoted string doesn't unbalance
/// the scan).
fn extract_balanced_braces(text: &str) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    let start = chars.iter().position(|&c| c == '{')?;

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(chars[start..=i].iter().collect());
                }
            }
            _ => {}
        }
    }
    None
}

/// Run the four-level recovery strategy against a raw LLM text response.
/// Returns `None` only when every level fails — the caller marks the
/// extraction as failed and falls back to an empty shell.
pub fn recover(raw: &str) -> Option<Recovered> {
    if let Ok(value) = serde_json::from_str::<Value>(raw.trim()) {
        return Some(Recovered {
            value,
            level: RecoveryLevel::Direct,
        });
    }

    if let Some(stripped) = strip_code_fences(raw) {
        if let Ok(value) = serde_json::from_str::<Value>(&stripped) {
            return Some(Recovered {
                value,
                level: RecoveryLevel::CodeFenceStripped,
            });
        }
        // Fences were present but the interior still wasn't a clean
        // object; fall through to the balanced-brace scan over the
        // stripped text, which may carry trailing prose.
        if let Some(braces) = extract_balanced_braces(&stripped) {
            if let Ok(value) = serde_json::from_str::<Value>(&braces) {
                return Some(Recovered {
                    value,
                    level: RecoveryLevel::BalancedBraceExtraction,
                });
            }
        }
    }

    if let Some(braces) = extract_balanced_braces(raw) {
        if let Ok(value) = serde_json::from_str::<Value>(&braces) {
            return Some(Recovered {
                value,
                level: RecoveryLevel::BalancedBraceExtraction,
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_parse_succeeds_on_clean_json() {
        let recovered = recover(r#"{"patient_name": "John"}"#).unwrap();
        assert_eq!(recovered.level, RecoveryLevel::Direct);
    }

    #[test]
    fn strips_markdown_code_fences() {
        let raw = "```json\n{\"patient_name\": \"John\"}\n```";
        let recovered = recover(raw).unwrap();
        assert_eq!(recovered.level, RecoveryLevel::CodeFenceStripped);
        assert_eq!(recovered.value["patient_name"], "John");
    }

    #[test]
    fn extracts_first_balanced_object_from_surrounding_prose() {
        let raw = "Sure, here is the result: {\"patient_name\": \"John\"} Let me know if you need anything else.";
        let recovered = recover(raw).unwrap();
        assert_eq!(recovered.level, RecoveryLevel::BalancedBraceExtraction);
        assert_eq!(recovered.value["patient_name"], "John");
    }

    #[test]
    fn braces_inside_string_values_do_not_unbalance_the_scan() {
        let raw = r#"{"patient_name": "John {weird} name"}"#;
        let recovered = recover(raw).unwrap();
        assert_eq!(recovered.value["patient_name"], "John {weird} name");
    }

    #[test]
    fn gives_up_cleanly_on_non_json_prose() {
        assert!(recover("I'm sorry, I cannot help with that.").is_none());
    }

    #[test]
    fn nested_objects_remain_balanced() {
        let raw = r#"noise {"a": {"b": 1}, "c": [1,2,3]} trailing"#;
        let recovered = recover(raw).unwrap();
        assert_eq!(recovered.value["a"]["b"], 1);
    }
}
