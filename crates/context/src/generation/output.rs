//! Output cleaning and validation
//!
//! Raw completions often carry reasoning sections, markup, control tokens
//! or runaway repetition. Cleaning strips the artifacts; validation rejects
//! what is left if it is not a usable answer.

use pestwise_common::errors::{AppError, Result};
use regex_lite::Regex;
use std::collections::HashMap;

/// Compiled cleaning patterns
#[derive(Debug, Clone)]
pub struct OutputCleaner {
    think: Regex,
    control_tokens: Regex,
    tags: Regex,
    headings: Regex,
    emphasis: Regex,
    answer_label: Regex,
    blank_runs: Regex,
    min_chars: usize,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| AppError::Internal {
        message: format!("invalid output pattern {}: {}", pattern, e),
    })
}

impl OutputCleaner {
    pub fn new(min_chars: usize) -> Result<Self> {
        Ok(Self {
            think: compile(r"(?is)<think>.*?(</think>|$)")?,
            control_tokens: compile(r"<\|[^|>]*\|>")?,
            // Known markup names only; attributes must look like name="value"
            tags: compile(
                r#"(?i)</?(?:p|br|hr|b|i|u|s|em|strong|code|pre|span|div|ul|ol|li|h[1-6]|a|table|thead|tbody|tr|td|th|blockquote|sup|sub|answer|response|output|reasoning)(?:\s+[A-Za-z_:][-A-Za-z0-9_:.]*\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'<>]+))*\s*/?>"#,
            )?,
            headings: compile(r"(?m)^[ \t]*#{1,6}[ \t]+")?,
            emphasis: compile(r"\*\*|__|`")?,
            answer_label: compile(r"(?i)^\s*answer\s*:\s*")?,
            blank_runs: compile(r"\n{3,}")?,
            min_chars,
        })
    }

    /// Strip artifacts and normalize whitespace
    pub fn clean(&self, raw: &str) -> String {
        let text = raw.replace("\r\n", "\n");
        let text = self.think.replace_all(&text, "");
        let text = self.control_tokens.replace_all(&text, "");
        let text = self.tags.replace_all(&text, "");
        let text = self.headings.replace_all(&text, "");
        let text = self.emphasis.replace_all(&text, "");

        let text = text
            .lines()
            .map(str::trim_end)
            .collect::<Vec<_>>()
            .join("\n");
        let text = self.answer_label.replace(&text, "");
        let text = self.blank_runs.replace_all(&text, "\n\n");
        text.trim().to_string()
    }

    /// Reject degenerate output
    pub fn validate(&self, cleaned: &str) -> Result<()> {
        let invalid = |reason: &str| {
            Err(AppError::GenerationInvalidOutput {
                reason: reason.to_string(),
            })
        };

        if cleaned.chars().count() < self.min_chars {
            return invalid("response too short");
        }
        if !cleaned.chars().any(char::is_alphanumeric) {
            return invalid("response has no words");
        }

        let lines: Vec<&str> = cleaned
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if lines.len() >= 3 {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for line in &lines {
                *counts.entry(line).or_insert(0) += 1;
            }
            let most = counts.values().copied().max().unwrap_or(0);
            if most * 2 > lines.len() {
                return invalid("response is dominated by a repeated line");
            }
        }
        Ok(())
    }

    /// Clean, then validate
    pub fn process(&self, raw: &str) -> Result<String> {
        let cleaned = self.clean(raw);
        self.validate(&cleaned)?;
        Ok(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cleaner() -> OutputCleaner {
        OutputCleaner::new(12).unwrap()
    }

    #[test]
    fn test_strips_reasoning_and_markup() {
        let raw = "<think>the user wants aphid help</think>\n\
                   ## Answer: \n\
                   **Spray** neem oil <b>weekly</b>.<|eot_id|>";
        assert_eq!(cleaner().clean(raw), "Spray neem oil weekly.");
        assert_eq!(
            cleaner().clean("Answer: Spray neem oil weekly."),
            "Spray neem oil weekly."
        );
    }

    #[test]
    fn test_collapses_blank_runs_and_trailing_space() {
        let raw = "First line.   \n\n\n\n\nSecond line.\t\n";
        assert_eq!(cleaner().clean(raw), "First line.\n\nSecond line.");
    }

    #[test]
    fn test_keeps_comparisons() {
        let raw = "Keep soil pH < 7 and > 6 for tomatoes.";
        assert_eq!(cleaner().clean(raw), raw);
    }

    #[test]
    fn test_keeps_angle_brackets_in_prose() {
        let raw = "Spray when x<y and z>w, or when mites<threshold>zero.";
        assert_eq!(cleaner().clean(raw), raw);
        assert_eq!(
            cleaner().clean(r#"See <a href="https://example.org/ipm">the guide</a> and <br/>rotate."#),
            "See the guide and rotate."
        );
    }

    #[test]
    fn test_rejects_degenerate_output() {
        let c = cleaner();
        assert!(c.process("ok").is_err());
        assert!(c.process("... --- !!! ??? ...").is_err());
        assert!(c.process("Use soap.\nUse soap.\nUse soap.\nRinse leaves.").is_err());
        assert!(c.process("<think>only thinking here, nothing else").is_err());
    }

    #[test]
    fn test_accepts_normal_answer() {
        let text = "Use insecticidal soap.";
        let cleaned = tokio_test::assert_ok!(cleaner().process(text));
        assert_eq!(cleaned, text);
    }
}
