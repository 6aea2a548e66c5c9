// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt templates for page generation.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

/// Template used when neither the job nor the configuration supplies one.
///
/// Placeholders: `{predicted_need}`, `{query}`, `{context}`, `{now}`.
pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"You are Ambia's ambient intelligence engine. You generate contextual information before the user asks for it.

The user does not know this page exists yet. You are pre-generating it for a predicted need, so make it feel timely and specific to their situation.

CURRENT TIME:
{now}

USER CONTEXT:
{context}

PREDICTED NEED:
{predicted_need}

QUERY:
{query}

Return ONLY valid JSON of the form {"components": [...]}. Each component is
{"type": one of "weather" | "calendar" | "tasks" | "movies" | "books" | "news" | "recipes" | "sports",
 "title": "Component title", "priority": "high" | "medium" | "low", "data": { component-specific fields }}."#;

/// Values substituted into a template.
#[derive(Debug, Clone, Copy)]
pub struct PromptVars<'a> {
    pub predicted_need: &'a str,
    pub query: &'a str,
    pub context: &'a Value,
    pub now: DateTime<Utc>,
}

/// Substitutes every known placeholder in `template`. Other braces are left alone.
pub fn render_prompt(template: &str, vars: &PromptVars<'_>) -> String {
    let context =
        serde_json::to_string_pretty(vars.context).unwrap_or_else(|_| vars.context.to_string());
    template
        .replace("{predicted_need}", vars.predicted_need)
        .replace("{query}", vars.query)
        .replace("{context}", &context)
        .replace("{now}", &vars.now.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn default_template_fills_every_placeholder() {
        let context = json!({"recent_queries": ["weather"]});
        let prompt = render_prompt(
            DEFAULT_PROMPT_TEMPLATE,
            &PromptVars {
                predicted_need: "morning weather check",
                query: "weather today",
                context: &context,
                now: Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap(),
            },
        );
        assert!(prompt.contains("morning weather check"));
        assert!(prompt.contains("weather today"));
        assert!(prompt.contains("\"recent_queries\""));
        assert!(prompt.contains("2026-03-02T08:00:00Z"));
        assert!(!prompt.contains("{predicted_need}"));
        assert!(prompt.contains(r#"{"components": [...]}"#));
    }
}
