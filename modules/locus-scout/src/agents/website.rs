use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use locus_common::{LocationRecord, Source};

use super::{records_from_candidates, AgentRequest, Readiness, SourceAgent};
use crate::infra::fetcher::{extract_links, PageLink};
use crate::infra::util::truncate_to_char_boundary;
use crate::traits::{ExtractionHint, FetchedPage, LocationExtractor};

/// Href or anchor-text vocabulary that marks a page worth scraping.
const LINK_KEYWORDS: &[&str] = &[
    "location", "office", "contact", "about", "global", "branch", "store", "address", "where",
    "find-us", "presence", "worldwide", "regional", "facilities", "locations", "offices",
    "contacts", "branches",
];

/// Paragraph vocabulary that suggests an address is nearby.
const SECTION_INDICATORS: &[&str] = &[
    "office", "location", "address", "headquarters", "hq", "branch", "store", "facility",
    "campus", "center", "centre", "suite", "floor", "street", "avenue", "road", "drive",
    "boulevard", "plaza", "building", "phone", "tel",
];

const MAX_CANDIDATE_PAGES: usize = 10;
const MAX_SCRAPED_PAGES: usize = 5;
const MAX_SECTION_CHARS: usize = 10_000;
const MAX_PROMPT_CHARS: usize = 8_000;
const MIN_TEXT_CHARS: usize = 100;

/// Company-website agent: finds contact and location pages on the
/// company's own site and has the language backend read them.
pub struct WebsiteAgent;

impl WebsiteAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WebsiteAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAgent for WebsiteAgent {
    fn source(&self) -> Source {
        Source::Website
    }

    fn readiness(&self, request: &AgentRequest) -> Readiness {
        if request.url.is_none() {
            return Readiness::NotApplicable("no URL provided".into());
        }
        if request.toolkit.language.is_none() {
            return Readiness::MissingBackend("OpenAI API key not provided".into());
        }
        Readiness::Ready
    }

    async fn try_extract(&self, request: &AgentRequest) -> Result<Vec<LocationRecord>> {
        let (Some(url), Some(language)) = (request.url.as_deref(), request.toolkit.language.as_ref())
        else {
            return Ok(Vec::new());
        };

        let landing = request.toolkit.fetcher.fetch(url).await?;
        let links = location_links(&landing.body, &landing.url);
        info!(url, candidates = links.len(), "Discovered location page candidates");

        let mut records = Vec::new();
        for link in links.iter().take(MAX_SCRAPED_PAGES) {
            let page = match request.toolkit.fetcher.fetch(&link.url).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(url = link.url.as_str(), error = %e, "Location page fetch failed");
                    continue;
                }
            };
            match read_page(language.as_ref(), &request.company, &page).await {
                Ok(found) => records.extend(found),
                Err(e) => warn!(url = page.url.as_str(), error = %e, "Page extraction failed"),
            }
        }

        if records.is_empty() {
            debug!(url, "No locations on sub-pages, reading landing page");
            records = read_page(language.as_ref(), &request.company, &landing).await?;
        }

        Ok(records)
    }
}

async fn read_page(
    language: &dyn LocationExtractor,
    company: &str,
    page: &FetchedPage,
) -> Result<Vec<LocationRecord>> {
    let sections = relevant_sections(&page.text);
    if sections.chars().count() < MIN_TEXT_CHARS {
        debug!(url = page.url.as_str(), "Too little text to extract from");
        return Ok(Vec::new());
    }

    let hint = ExtractionHint::new(company, Source::Website).with_source_url(page.url.as_str());
    let prompt_text = truncate_to_char_boundary(&sections, MAX_PROMPT_CHARS);
    let candidates = language.extract_locations(prompt_text, &hint).await?;
    Ok(records_from_candidates(
        candidates,
        Source::Website,
        company,
        Some(&page.url),
    ))
}

/// Same-host links whose href or anchor text uses location vocabulary.
pub(crate) fn location_links(html: &str, base_url: &str) -> Vec<PageLink> {
    let base = url::Url::parse(base_url).ok();
    let base_host = base.as_ref().and_then(|u| u.host_str()).map(strip_www);
    let base_trimmed = base_url.trim_end_matches('/');

    extract_links(html, base_url)
        .into_iter()
        .filter(|link| {
            let host = url::Url::parse(&link.url)
                .ok()
                .and_then(|u| u.host_str().map(|h| strip_www(h).to_string()));
            host.as_deref().is_some() && host.as_deref() == base_host
        })
        .filter(|link| link.url.trim_end_matches('/') != base_trimmed)
        .filter(|link| {
            let href = link.url.to_lowercase();
            let text = link.text.to_lowercase();
            LINK_KEYWORDS
                .iter()
                .any(|kw| href.contains(kw) || text.contains(kw))
        })
        .take(MAX_CANDIDATE_PAGES)
        .collect()
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Paragraphs mentioning address vocabulary, capped in length. Falls back
/// to the leading text when no paragraph qualifies.
pub(crate) fn relevant_sections(text: &str) -> String {
    let relevant: Vec<&str> = text
        .split("\n\n")
        .map(str::trim)
        .filter(|para| !para.is_empty())
        .filter(|para| {
            let lower = para.to_lowercase();
            SECTION_INDICATORS.iter().any(|ind| lower.contains(ind))
        })
        .collect();

    let joined = if relevant.is_empty() {
        text.trim().to_string()
    } else {
        relevant.join("\n\n")
    };
    truncate_to_char_boundary(&joined, MAX_SECTION_CHARS).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{toolkit, MockExtractor, MockFetcher};
    use crate::traits::CandidateLocation;
    use std::sync::Arc;

    const LANDING_HTML: &str = r#"
        <nav>
          <a href="/about">About Us</a>
          <a href="/careers">Careers</a>
          <a href="https://other.com/locations">Partner locations</a>
          <a href="/where-we-are">Find us</a>
        </nav>
    "#;

    fn office_text(city: &str) -> String {
        format!(
            "Our {city} office is located at 100 Main Street, Suite 200. \
             Visit our headquarters building or call our phone line for directions.\n\n\
             Unrelated marketing copy."
        )
    }

    fn candidate(city: &str) -> CandidateLocation {
        CandidateLocation {
            city: Some(city.into()),
            street_address: Some("100 Main Street".into()),
            ..Default::default()
        }
    }

    #[test]
    fn location_links_keep_same_host_keyword_matches() {
        let links = location_links(LANDING_HTML, "https://www.acme.com/");
        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://www.acme.com/about", "https://www.acme.com/where-we-are"]
        );
    }

    #[test]
    fn anchor_text_can_qualify_a_link() {
        let html = r#"<a href="/visit">Our Offices</a>"#;
        let links = location_links(html, "https://acme.com");
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn relevant_sections_filter_paragraphs() {
        let text = "Welcome to Acme!\n\nOur office is at 1 Main Street.\n\nWe love widgets.";
        assert_eq!(relevant_sections(text), "Our office is at 1 Main Street.");
    }

    #[test]
    fn relevant_sections_fall_back_to_text() {
        assert_eq!(relevant_sections("  just prose  "), "just prose");
    }

    #[tokio::test]
    async fn no_url_is_not_an_error() {
        let request = AgentRequest {
            company: "Acme Corp".into(),
            url: None,
            toolkit: toolkit().with_language(Arc::new(MockExtractor::new())),
        };
        let output = WebsiteAgent::new().extract(&request).await;
        assert!(output.errors.is_empty());
        assert_eq!(output.messages, vec!["Website scraper skipped - no URL provided"]);
    }

    #[tokio::test]
    async fn extracts_from_location_pages() {
        let about = office_text("Chicago");
        let fetcher = MockFetcher::new()
            .on_page(FetchedPage::new("https://acme.com/", LANDING_HTML).with_text("Hi"))
            .on_page(FetchedPage::new("https://acme.com/about", "<p/>").with_text(&about));
        let extractor = MockExtractor::new().on_text_containing("Chicago", vec![candidate("Chicago")]);
        let request = AgentRequest {
            company: "Acme Corp".into(),
            url: Some("https://acme.com/".into()),
            toolkit: toolkit()
                .with_fetcher(Arc::new(fetcher))
                .with_language(Arc::new(extractor)),
        };

        let output = WebsiteAgent::new().extract(&request).await;
        assert!(output.errors.is_empty(), "{:?}", output.errors);
        assert_eq!(output.records.len(), 1);
        let record = &output.records[0];
        assert_eq!(record.city.as_deref(), Some("Chicago"));
        assert_eq!(record.name.as_deref(), Some("Acme Corp - Chicago"));
        assert_eq!(record.source_url.as_deref(), Some("https://acme.com/about"));
    }

    #[tokio::test]
    async fn falls_back_to_landing_page() {
        let landing_text = office_text("Denver");
        let fetcher = MockFetcher::new().on_page(
            FetchedPage::new("https://acme.com/", "<p>no links</p>").with_text(&landing_text),
        );
        let extractor = MockExtractor::new().on_text_containing("Denver", vec![candidate("Denver")]);
        let request = AgentRequest {
            company: "Acme Corp".into(),
            url: Some("https://acme.com/".into()),
            toolkit: toolkit()
                .with_fetcher(Arc::new(fetcher))
                .with_language(Arc::new(extractor)),
        };

        let output = WebsiteAgent::new().extract(&request).await;
        assert_eq!(output.records.len(), 1);
        assert_eq!(output.records[0].source_url.as_deref(), Some("https://acme.com/"));
    }

    #[tokio::test]
    async fn unreachable_site_is_an_agent_error() {
        let request = AgentRequest {
            company: "Acme Corp".into(),
            url: Some("https://acme.com/".into()),
            toolkit: toolkit().with_language(Arc::new(MockExtractor::new())),
        };
        let output = WebsiteAgent::new().extract(&request).await;
        assert!(output.records.is_empty());
        assert_eq!(output.errors.len(), 1);
    }
}
