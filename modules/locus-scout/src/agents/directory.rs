use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

use locus_common::{LocationRecord, Source};

use super::{AgentRequest, Readiness, SourceAgent};
use crate::infra::util::char_prefix;
use crate::traits::{PlaceHit, PlaceSearch};

/// Query templates; `{}` is the company name.
const QUERY_PATTERNS: &[&str] = &["{}", "{} office"];
const PLACES_PER_QUERY: usize = 10;
/// Address prefix length used to spot the same place across queries.
const ADDRESS_KEY_CHARS: usize = 50;

/// Place-directory agent: text search plus per-place contact lookup.
pub struct DirectoryAgent;

impl DirectoryAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DirectoryAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAgent for DirectoryAgent {
    fn source(&self) -> Source {
        Source::GoogleMaps
    }

    fn readiness(&self, request: &AgentRequest) -> Readiness {
        if request.toolkit.places.is_none() {
            return Readiness::MissingBackend("Google Maps API key not provided".into());
        }
        Readiness::Ready
    }

    async fn try_extract(&self, request: &AgentRequest) -> Result<Vec<LocationRecord>> {
        let Some(places) = request.toolkit.places.as_ref() else {
            return Ok(Vec::new());
        };

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        let mut failures = 0;
        let mut last_error = None;

        for pattern in QUERY_PATTERNS {
            let query = pattern.replace("{}", &request.company);
            let hits = match places.search(&query).await {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(query = query.as_str(), error = %e, "Place search failed");
                    failures += 1;
                    last_error = Some(e);
                    continue;
                }
            };

            for hit in hits.into_iter().take(PLACES_PER_QUERY) {
                let key = char_prefix(&hit.formatted_address.to_lowercase(), ADDRESS_KEY_CHARS)
                    .to_string();
                if key.trim().is_empty() || !seen.insert(key) {
                    continue;
                }
                records.push(place_to_record(places.as_ref(), hit).await);
            }
        }

        if failures == QUERY_PATTERNS.len() {
            if let Some(e) = last_error {
                return Err(e.context("every place search failed"));
            }
        }

        Ok(records)
    }
}

async fn place_to_record(places: &dyn PlaceSearch, hit: PlaceHit) -> LocationRecord {
    let parts = decompose_address(&hit.formatted_address);
    let mut record = LocationRecord::new(Source::GoogleMaps).with_name(hit.name.as_str());
    record.street_address = parts.street;
    record.city = parts.city;
    record.state = parts.state;
    record.postal_code = parts.postal_code;
    record.country = parts.country;

    if let (Some(lat), Some(lng)) = (hit.latitude, hit.longitude) {
        record = record.with_coordinates(lat, lng);
    }

    if let Some(place_id) = hit.place_id.as_deref() {
        record = record.with_source_url(format!(
            "https://www.google.com/maps/place/?q=place_id:{place_id}"
        ));
        match places.details(place_id).await {
            Ok(contact) => {
                record.phone = contact.phone;
                record.website = contact.website;
            }
            Err(e) => debug!(place_id, error = %e, "Place details lookup failed"),
        }
    }

    record
}

/// Components recovered from a comma-separated formatted address.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct AddressParts {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// "123 Main St, Springfield, IL 62701, USA": the last component is the
/// country, the one before it "STATE POSTAL", the third from the end the
/// city and everything earlier the street. Short addresses keep the whole
/// string as the street line.
pub(crate) fn decompose_address(formatted: &str) -> AddressParts {
    let parts: Vec<&str> = formatted
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let n = parts.len();
    let owned = |s: &str| Some(s.to_string());

    if n < 3 {
        return AddressParts {
            street: (!formatted.trim().is_empty()).then(|| formatted.trim().to_string()),
            country: if n == 2 { owned(parts[1]) } else { None },
            ..Default::default()
        };
    }

    let (state, postal_code) = split_state_postal(parts[n - 2]);
    AddressParts {
        street: (n >= 4).then(|| parts[..n - 3].join(", ")),
        city: owned(parts[n - 3]),
        state,
        postal_code,
        country: owned(parts[n - 1]),
    }
}

/// "IL 62701" → ("IL", "62701"); "Ontario" → ("Ontario", None).
fn split_state_postal(segment: &str) -> (Option<String>, Option<String>) {
    let tokens: Vec<&str> = segment.split_whitespace().collect();
    match tokens.split_last() {
        Some((last, rest)) if last.chars().any(|c| c.is_ascii_digit()) => {
            let state = (!rest.is_empty()).then(|| rest.join(" "));
            (state, Some(last.to_string()))
        }
        Some(_) => (Some(tokens.join(" ")), None),
        None => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{toolkit, MockPlaces};
    use crate::traits::PlaceContact;
    use std::sync::Arc;

    fn hit(id: &str, name: &str, address: &str) -> PlaceHit {
        PlaceHit {
            place_id: Some(id.into()),
            name: name.into(),
            formatted_address: address.into(),
            latitude: Some(39.78),
            longitude: Some(-89.65),
        }
    }

    #[test]
    fn decomposes_us_address() {
        let parts = decompose_address("123 Main St, Suite 4, Springfield, IL 62701, USA");
        assert_eq!(parts.street.as_deref(), Some("123 Main St, Suite 4"));
        assert_eq!(parts.city.as_deref(), Some("Springfield"));
        assert_eq!(parts.state.as_deref(), Some("IL"));
        assert_eq!(parts.postal_code.as_deref(), Some("62701"));
        assert_eq!(parts.country.as_deref(), Some("USA"));
    }

    #[test]
    fn decomposes_address_without_street_or_postal() {
        let parts = decompose_address("Toronto, Ontario, Canada");
        assert!(parts.street.is_none());
        assert_eq!(parts.city.as_deref(), Some("Toronto"));
        assert_eq!(parts.state.as_deref(), Some("Ontario"));
        assert!(parts.postal_code.is_none());
    }

    #[test]
    fn short_address_is_kept_as_street() {
        let parts = decompose_address("Springfield, USA");
        assert_eq!(parts.street.as_deref(), Some("Springfield, USA"));
        assert_eq!(parts.country.as_deref(), Some("USA"));
        assert!(parts.city.is_none());
    }

    #[tokio::test]
    async fn missing_places_backend_is_reported() {
        let request = AgentRequest {
            company: "Acme Corp".into(),
            url: None,
            toolkit: toolkit(),
        };
        let output = DirectoryAgent::new().extract(&request).await;
        assert!(output.records.is_empty());
        assert_eq!(output.errors.len(), 1);
        assert!(output.messages[0].contains("skipped"));
    }

    #[tokio::test]
    async fn duplicate_addresses_across_queries_are_collapsed() {
        let address = "1 Main St, Springfield, IL 62701, USA";
        let places = MockPlaces::new()
            .on_search("Acme Corp", vec![hit("p1", "Acme Corp", address)])
            .on_search(
                "Acme Corp office",
                vec![
                    hit("p1", "Acme Corp HQ", address),
                    hit("p2", "Acme Corp Denver", "9 Elm St, Denver, CO 80202, USA"),
                ],
            )
            .on_details(
                "p1",
                PlaceContact {
                    phone: Some("(217) 555-0100".into()),
                    website: Some("https://acme.com".into()),
                },
            );
        let request = AgentRequest {
            company: "Acme Corp".into(),
            url: None,
            toolkit: toolkit().with_places(Arc::new(places)),
        };

        let output = DirectoryAgent::new().extract(&request).await;
        assert!(output.errors.is_empty());
        assert_eq!(output.records.len(), 2);

        let hq = &output.records[0];
        assert_eq!(hq.city.as_deref(), Some("Springfield"));
        assert_eq!(hq.phone.as_deref(), Some("(217) 555-0100"));
        assert_eq!(hq.latitude, Some(39.78));
        assert_eq!(hq.source_confidence, 0.9);

        // Details for p2 are unregistered: the record survives without contact info.
        assert!(output.records[1].phone.is_none());
    }

    #[tokio::test]
    async fn all_queries_failing_is_an_agent_error() {
        let request = AgentRequest {
            company: "Acme Corp".into(),
            url: None,
            toolkit: toolkit().with_places(Arc::new(MockPlaces::new().failing())),
        };
        let output = DirectoryAgent::new().extract(&request).await;
        assert!(output.records.is_empty());
        assert_eq!(output.errors.len(), 1);
        assert!(output.errors[0].contains("failed"));
    }
}
