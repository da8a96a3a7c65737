//! Response normalization
//!
//! Turns a raw provider body into a clean [`Analysis`]: extract the model
//! output, drop reasoning blocks and control characters, then (in structured
//! mode) parse the JSON object.

use super::{Analysis, AnalysisError};
use crate::config::ResponseFormat;
use crate::models::AiProvider;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

type Pattern = Lazy<Result<Regex, regex::Error>>;

/// Complete reasoning blocks
static REASONING_BLOCK: Pattern = Lazy::new(|| {
    Regex::new(r"(?is)<think>.*?</think>|<thinking>.*?</thinking>|<reasoning>.*?</reasoning>")
});

/// Any opening or closing reasoning tag
static REASONING_TAG: Pattern = Lazy::new(|| Regex::new(r"(?i)</?(?:think|thinking|reasoning)>"));

/// Closing tag left over once complete blocks are gone
static STRAY_CLOSE: Pattern = Lazy::new(|| Regex::new(r"(?i)</(?:think|thinking|reasoning)>"));

/// Opening tag that is never closed
static DANGLING_OPEN: Pattern = Lazy::new(|| Regex::new(r"(?is)<(?:think|thinking|reasoning)>.*$"));

/// Markdown code fence around a JSON payload
static CODE_FENCE: Pattern = Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\s*(.*?)\s*```$"));

fn pattern(re: &'static Pattern) -> Result<&'static Regex, AnalysisError> {
    Lazy::force(re)
        .as_ref()
        .map_err(|e| AnalysisError::Internal(anyhow::anyhow!("Invalid pattern: {}", e)))
}

/// Normalize a raw response body from `provider`
pub fn normalize(
    provider: AiProvider,
    raw: &str,
    format: ResponseFormat,
) -> Result<Analysis, AnalysisError> {
    let output = match provider {
        AiProvider::Ollama => extract_ollama(raw)?,
        AiProvider::External => extract_external(raw)?,
    };

    let cleaned = clean_text(&output)?;
    if cleaned.is_empty() {
        return Err(AnalysisError::Parse("the model returned an empty response".to_string()));
    }

    match format {
        ResponseFormat::Text => Ok(Analysis::Text(cleaned)),
        ResponseFormat::Json => parse_structured(&cleaned).map(Analysis::Structured),
    }
}

/// Pull `response` out of the last non-empty line of an Ollama body
pub fn extract_ollama(raw: &str) -> Result<String, AnalysisError> {
    let line = raw
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| AnalysisError::Parse("empty response body".to_string()))?;

    let value: Value =
        serde_json::from_str(line).map_err(|e| AnalysisError::Parse(e.to_string()))?;

    if let Some(response) = value.get("response").and_then(Value::as_str) {
        return Ok(response.to_string());
    }
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(AnalysisError::Parse(format!("model server reported: {}", error)));
    }
    Err(AnalysisError::Parse("missing \"response\" field".to_string()))
}

/// Pull `choices[0].message.content` out of a chat completions body
pub fn extract_external(raw: &str) -> Result<String, AnalysisError> {
    let value: Value =
        serde_json::from_str(raw.trim()).map_err(|e| AnalysisError::Parse(e.to_string()))?;

    value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            let detail = value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(|m| format!("API reported: {}", m))
                .unwrap_or_else(|| "missing choices[0].message.content".to_string());
            AnalysisError::Parse(detail)
        })
}

/// Drop reasoning blocks and control characters, then trim
///
/// Output that opens with a closing tag started inside reasoning, so
/// everything up to that tag goes. A closing tag anywhere else is removed
/// on its own and the prose around it is kept.
pub fn clean_text(text: &str) -> Result<String, AnalysisError> {
    let text = match pattern(&REASONING_TAG)?.find(text) {
        Some(tag) if tag.as_str().starts_with("</") => &text[tag.end()..],
        _ => text,
    };
    let text = pattern(&REASONING_BLOCK)?.replace_all(text, "");
    let text = pattern(&DANGLING_OPEN)?.replace(&text, "");
    let text = pattern(&STRAY_CLOSE)?.replace_all(&text, "");

    Ok(text
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect::<String>()
        .trim()
        .to_string())
}

fn parse_structured(text: &str) -> Result<serde_json::Map<String, Value>, AnalysisError> {
    let payload = pattern(&CODE_FENCE)?
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or(text, |m| m.as_str());

    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AnalysisError::Parse("expected a JSON object".to_string())),
        Err(e) => Err(AnalysisError::Parse(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ollama_single_object() {
        let raw = r#"{"model":"llama3","response":"Calm.","done":true}"#;
        assert_eq!(extract_ollama(raw).unwrap(), "Calm.");
    }

    #[test]
    fn test_ollama_uses_last_line() {
        let raw = "{\"response\":\"partial\",\"done\":false}\n{\"response\":\"final\",\"done\":true}\n\n";
        assert_eq!(extract_ollama(raw).unwrap(), "final");
    }

    #[test]
    fn test_ollama_error_field() {
        let raw = r#"{"error":"model 'nope' not found"}"#;
        match extract_ollama(raw) {
            Err(AnalysisError::Parse(msg)) => assert!(msg.contains("not found")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_ollama_garbage() {
        assert!(matches!(extract_ollama("<html>"), Err(AnalysisError::Parse(_))));
        assert!(matches!(extract_ollama("  \n "), Err(AnalysisError::Parse(_))));
    }

    #[test]
    fn test_external_content() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"Hopeful."}}]}"#;
        assert_eq!(extract_external(raw).unwrap(), "Hopeful.");
        assert!(matches!(
            extract_external(r#"{"choices":[]}"#),
            Err(AnalysisError::Parse(_))
        ));
    }

    #[test]
    fn test_external_error_message_surfaces() {
        let raw = r#"{"error":{"message":"Incorrect API key provided"}}"#;
        match extract_external(raw) {
            Err(AnalysisError::Parse(msg)) => assert!(msg.contains("Incorrect API key")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_clean_text_strips_reasoning() {
        assert_eq!(clean_text("<think>hmm\nok</think>\nAnswer").unwrap(), "Answer");
        assert_eq!(clean_text("<Thinking>x</Thinking>A <reasoning>y</reasoning>B").unwrap(), "A B");
        assert_eq!(clean_text("cut-off reasoning</think>Answer").unwrap(), "Answer");
        assert_eq!(clean_text("Answer<think>never closed").unwrap(), "Answer");
    }

    #[test]
    fn test_clean_text_keeps_prose_around_stray_close_tag() {
        let cleaned =
            clean_text("<think>a</think>Tone: wistful.\nThemes: loss </think> and keys.").unwrap();
        assert_eq!(cleaned, "Tone: wistful.\nThemes: loss  and keys.");

        let cleaned = clean_text("early</think>Tone: calm. <think>b</think>Done.").unwrap();
        assert_eq!(cleaned, "Tone: calm. Done.");
    }

    #[test]
    fn test_clean_text_control_characters() {
        assert_eq!(clean_text("  a\u{0}b\r\n\tc\u{7} ").unwrap(), "ab\n\tc");
    }

    #[test]
    fn test_structured_with_code_fence() {
        let text = "```json\n{\"emotional_tone\":\"wistful\"}\n```";
        let result = normalize(
            AiProvider::External,
            &serde_json::json!({ "choices": [{ "message": { "content": text } }] }).to_string(),
            ResponseFormat::Json,
        )
        .unwrap();
        assert_eq!(
            result,
            Analysis::Structured(
                serde_json::from_str(r#"{"emotional_tone":"wistful"}"#).unwrap()
            )
        );
    }

    #[test]
    fn test_structured_rejects_non_object() {
        assert!(matches!(parse_structured("[1,2]"), Err(AnalysisError::Parse(_))));
        assert!(matches!(parse_structured("plain words"), Err(AnalysisError::Parse(_))));
    }

    #[test]
    fn test_empty_after_cleaning() {
        let raw = r#"{"response":"<think>only thoughts</think>"}"#;
        assert!(matches!(
            normalize(AiProvider::Ollama, raw, ResponseFormat::Text),
            Err(AnalysisError::Parse(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_reasoning_never_survives(
            before in "[a-zA-Z .,]{0,40}",
            inner in "[a-zA-Z .,\n]{0,40}",
            after in "[a-zA-Z .,]{0,40}",
        ) {
            let text = format!("{}<think>{}</think>{}", before, inner, after);
            let cleaned = clean_text(&text).unwrap();
            prop_assert!(!cleaned.contains("<think>"));
            prop_assert!(!cleaned.contains("</think>"));
            prop_assert_eq!(cleaned, format!("{}{}", before, after).trim().to_string());
        }

        #[test]
        fn prop_clean_text_has_no_stray_controls(text in "(?s).{0,80}") {
            let cleaned = clean_text(&text).unwrap();
            prop_assert!(cleaned.chars().all(|c| !c.is_control() || c == '\n' || c == '\t'));
            prop_assert_eq!(cleaned.trim(), cleaned.as_str());
        }
    }
}
