use ai_client::openai::{OpenAi, StructuredOutput};
use ai_client::util::{json_array_slice, strip_code_blocks};
use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use locus_common::Source;

use crate::admission::AdmissionGate;
use crate::traits::{CandidateList, CandidateLocation, ExtractionHint, LocationExtractor};

const SYSTEM_PROMPT: &str = "You extract physical business locations from text. \
Return every office, headquarters, branch, store, plant or facility that belongs to the \
named company and has at least a city. Use null for unknown fields. Never invent \
addresses and never return placeholder or example locations. \
Respond with JSON: {\"locations\": [{\"name\", \"street_address\", \"city\", \"state\", \
\"country\", \"postal_code\", \"phone\"}]}.";

/// Language-model location extraction behind the credential's admission gate.
pub struct LlmExtractor {
    client: OpenAi,
    gate: AdmissionGate,
}

impl LlmExtractor {
    pub fn new(client: OpenAi, gate: AdmissionGate) -> Self {
        Self { client, gate }
    }
}

#[async_trait]
impl LocationExtractor for LlmExtractor {
    async fn extract_locations(
        &self,
        text: &str,
        hint: &ExtractionHint,
    ) -> Result<Vec<CandidateLocation>> {
        let user_prompt = build_user_prompt(text, hint);

        let raw = {
            let _permit = self.gate.admit().await?;
            self.client
                .structured_output(SYSTEM_PROMPT, &user_prompt, CandidateList::openai_schema())
                .await?
        };

        let candidates = parse_candidates(&raw);
        info!(
            company = hint.company.as_str(),
            source = %hint.source,
            count = candidates.len(),
            "Language backend extraction complete"
        );
        Ok(candidates)
    }
}

fn build_user_prompt(text: &str, hint: &ExtractionHint) -> String {
    let origin = match hint.source {
        Source::Website => "a page of the company's own website",
        Source::SecFiling => "an SEC EDGAR company search feed",
        Source::Search => "a web search result",
        Source::GoogleMaps => "a map listing",
    };
    let url_line = hint
        .source_url
        .as_deref()
        .map(|u| format!("Source URL: {u}\n"))
        .unwrap_or_default();
    format!(
        "Company: {company}\nThe text below comes from {origin}.\n{url_line}\n\
Extract all physical locations of {company}.\n\n---\n\n{text}",
        company = hint.company,
    )
}

/// Tolerant parsing of model output: code fences are stripped, then an
/// object with a `locations` array, a bare array, or the first `[...]`
/// slice is accepted. Anything else is zero candidates.
pub fn parse_candidates(raw: &str) -> Vec<CandidateLocation> {
    let cleaned = strip_code_blocks(raw);

    // Only an object that actually carries `locations`; any other object
    // falls through to the array recovery below.
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(cleaned) {
        if value.get("locations").is_some() {
            if let Ok(list) = serde_json::from_value::<CandidateList>(value) {
                return list.locations;
            }
        }
    }
    if let Ok(items) = serde_json::from_str::<Vec<CandidateLocation>>(cleaned) {
        return items;
    }
    if let Some(slice) = json_array_slice(cleaned) {
        if let Ok(items) = serde_json::from_str::<Vec<CandidateLocation>>(slice) {
            return items;
        }
    }

    warn!(
        preview = ai_client::util::truncate_to_char_boundary(cleaned, 200),
        "Unparseable language backend output, treating as zero candidates"
    );
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_locations_object() {
        let raw = r#"{"locations": [{"name": "HQ", "city": "Springfield"}]}"#;
        let parsed = parse_candidates(raw);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].city.as_deref(), Some("Springfield"));
    }

    #[test]
    fn parses_fenced_bare_array() {
        let raw = "```json\n[{\"city\": \"Austin\"}, {\"city\": \"Denver\"}]\n```";
        assert_eq!(parse_candidates(raw).len(), 2);
    }

    #[test]
    fn recovers_array_from_prose() {
        let raw = "Here are the offices I found: [{\"city\": \"Boston\"}] Hope that helps.";
        let parsed = parse_candidates(raw);
        assert_eq!(parsed[0].city.as_deref(), Some("Boston"));
    }

    #[test]
    fn object_without_locations_key_falls_back_to_array() {
        let raw = r#"{"results": [{"name": "Acme Boston", "city": "Boston"}]}"#;
        let parsed = parse_candidates(raw);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].city.as_deref(), Some("Boston"));
    }

    #[test]
    fn empty_locations_object_is_zero_candidates() {
        assert!(parse_candidates(r#"{"locations": []}"#).is_empty());
    }

    #[test]
    fn malformed_output_is_empty() {
        assert!(parse_candidates("I could not find any locations.").is_empty());
        assert!(parse_candidates("[{\"city\": ").is_empty());
        assert!(parse_candidates("").is_empty());
    }

    #[test]
    fn prompt_names_company_and_origin() {
        let hint = ExtractionHint::new("Acme Corp", Source::SecFiling)
            .with_source_url("https://www.sec.gov/x");
        let prompt = build_user_prompt("some text", &hint);
        assert!(prompt.contains("Acme Corp"));
        assert!(prompt.contains("SEC EDGAR"));
        assert!(prompt.contains("https://www.sec.gov/x"));
    }
}
