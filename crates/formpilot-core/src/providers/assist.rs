//! Application-assist helpers layered on the router.
//!
//! Thin wrappers: build a prompt, call [`LlmRouter::generate`], parse the raw
//! text into a structured result. The parsers are free functions so they stay
//! unit-testable without a client.

use anyhow::Result;

use crate::prompts;

use super::router::LlmRouter;
use super::types::GenerateOptions;

/// Options for short deterministic answers (field matches, scores)
fn short_answer_options() -> GenerateOptions {
    GenerateOptions {
        max_tokens: Some(16),
        temperature: Some(0.0),
        ..Default::default()
    }
}

impl LlmRouter {
    /// Map a form-field label to one of the profile keys; None when the
    /// model answers "null" or with an unknown key.
    pub async fn match_field(
        &self,
        label: &str,
        profile_fields: &[&str],
    ) -> Result<Option<String>> {
        let prompt = prompts::field_match_prompt(label, profile_fields);
        let response = self.generate(&prompt, &short_answer_options()).await?;
        Ok(parse_field_match(&response.text).filter(|m| profile_fields.contains(&m.as_str())))
    }

    /// Draft an answer to a free-text application question
    pub async fn generate_form_response(
        &self,
        question: &str,
        profile: &str,
        job: &str,
    ) -> Result<String> {
        let prompt = prompts::form_response_prompt(question, profile, job);
        let response = self.generate(&prompt, &GenerateOptions::default()).await?;
        Ok(response.text.trim().to_string())
    }

    /// Summarize a job description
    pub async fn summarize_job(&self, description: &str) -> Result<String> {
        let prompt = prompts::job_summary_prompt(description);
        let response = self.generate(&prompt, &GenerateOptions::default()).await?;
        Ok(response.text.trim().to_string())
    }

    /// Extract the technology keywords from a job description
    pub async fn extract_tech_stack(&self, description: &str) -> Result<Vec<String>> {
        let prompt = prompts::tech_stack_prompt(description);
        let response = self.generate(&prompt, &GenerateOptions::default()).await?;
        Ok(parse_list(&response.text))
    }

    /// Score profile-to-job fit on 0-100; unparsable answers default to 50
    pub async fn relevance_score(&self, job: &str, profile: &str) -> Result<u8> {
        let prompt = prompts::relevance_prompt(job, profile);
        let response = self.generate(&prompt, &short_answer_options()).await?;
        Ok(parse_relevance_score(&response.text))
    }
}

/// Interpret a raw field-match answer; the literal "null" means no match
pub fn parse_field_match(raw: &str) -> Option<String> {
    let cleaned = raw.trim().trim_matches(['"', '\'', '`']).trim();
    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("null") {
        return None;
    }
    Some(cleaned.to_string())
}

/// Split a comma-separated answer, trimming entries and dropping empties
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_matches(['"', '\'']).to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Pull the first integer out of a raw score answer and clamp it into
/// 0..=100; anything unparsable defaults to 50.
pub fn parse_relevance_score(raw: &str) -> u8 {
    let digits: String = raw
        .trim()
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    match digits.parse::<u32>() {
        Ok(n) => n.min(100) as u8,
        Err(_) => 50,
    }
}
