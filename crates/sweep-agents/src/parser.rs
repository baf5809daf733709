use sweep_models::AnalysisResult;

use crate::error::AgentError;

/// Reduce a model reply to its JSON object.
///
/// Code-fence lines are dropped, then everything from the first `{` to the
/// last `}` is kept. Handles:
/// - Clean JSON: `{"key": "value"}`
/// - Markdown-wrapped: ```json\n{"key": "value"}\n```
/// - Prefix text: `Here is the analysis:\n{"key": "value"}`
pub fn clean_json(text: &str) -> Result<String, AgentError> {
    let unfenced = strip_code_fences(text);
    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(unfenced[start..=end].to_string()),
        _ => Err(AgentError::Parse(format!(
            "No JSON object found in response (length={})",
            text.len()
        ))),
    }
}

fn strip_code_fences(text: &str) -> String {
    text.trim()
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse an [`AnalysisResult`] from a raw model reply.
pub fn parse_analysis(raw: &str) -> Result<AnalysisResult, AgentError> {
    let json = clean_json(raw)?;
    serde_json::from_str(&json)
        .map_err(|e| AgentError::Parse(format!("Failed to parse analysis: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_plain_json() {
        let input = r#"{"outlook": "bullish", "levels": []}"#;
        assert_eq!(clean_json(input).unwrap(), input);
    }

    #[test]
    fn clean_from_markdown() {
        let input = "```json\n{\"outlook\": \"neutral\"}\n```";
        assert_eq!(clean_json(input).unwrap(), r#"{"outlook": "neutral"}"#);
    }

    #[test]
    fn clean_with_surrounding_text() {
        let input = "Here is the analysis:\n{\"outlook\": \"bearish\"}\nLet me know if you need more.";
        assert_eq!(clean_json(input).unwrap(), r#"{"outlook": "bearish"}"#);
    }

    #[test]
    fn clean_keeps_nested_objects() {
        let input = r#"{"outlook": {"bias": "up"}, "levels": [{"price": 470.0}]}"#;
        let parsed = parse_analysis(input).unwrap();
        assert_eq!(parsed.outlook["bias"], "up");
        assert_eq!(parsed.levels.len(), 1);
    }

    #[test]
    fn no_object_is_parse_error() {
        assert!(matches!(
            clean_json("Sorry, I cannot help with that."),
            Err(AgentError::Parse(_))
        ));
        assert!(matches!(clean_json("} backwards {"), Err(AgentError::Parse(_))));
    }

    #[test]
    fn truncated_object_is_parse_error() {
        let result = parse_analysis("```json\n{\"outlook\": \"bull\", \"levels\": [}\n```");
        assert!(matches!(result, Err(AgentError::Parse(_))));
    }
}
