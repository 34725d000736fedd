use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tracing::{info, warn};

use crate::traits::{FetchedPage, PageFetcher};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Plain HTTP fetcher. HTML bodies are rendered to markdown with
/// spider_transformations; anything else is passed through as text.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let parsed = url::Url::parse(url).context("Invalid URL")?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            anyhow::bail!("Only http/https URLs are allowed, got: {}", parsed.scheme());
        }

        info!(url, "Fetching page");
        let resp = self
            .client
            .get(parsed)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("GET {url} returned {status}");
        }

        let final_url = resp.url().to_string();
        let is_html = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("html"))
            .unwrap_or(false);
        let body = resp.text().await.context("Failed to read response body")?;

        let page = if is_html {
            let text = html_to_markdown(&body, &final_url);
            if text.trim().is_empty() {
                warn!(url, "Empty content after HTML transformation");
            }
            FetchedPage::new(final_url, body).with_text(text)
        } else {
            FetchedPage::new(final_url, body)
        };

        info!(url, bytes = page.body.len(), "Fetched successfully");
        Ok(page)
    }
}

/// Render HTML to readable markdown.
pub fn html_to_markdown(html: &str, url: &str) -> String {
    let parsed_url = url::Url::parse(url).ok();
    let config = TransformConfig {
        readability: false,
        main_content: false,
        return_format: ReturnFormat::Markdown,
        filter_images: true,
        filter_svg: true,
        clean_html: true,
    };
    let input = TransformInput {
        url: parsed_url.as_ref(),
        content: html.as_bytes(),
        screenshot_bytes: None,
        encoding: None,
        selector_config: None,
        ignore_tags: None,
    };
    transform_content_input(input, &config)
}

/// An anchor found in raw HTML.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLink {
    /// Absolute URL without fragment.
    pub url: String,
    /// Anchor text with tags stripped.
    pub text: String,
}

/// Extract anchors from raw HTML, resolving relative hrefs against
/// `base_url`. Non-navigational schemes are skipped; results are unique
/// in document order.
pub fn extract_links(html: &str, base_url: &str) -> Vec<PageLink> {
    static ANCHOR: OnceLock<Regex> = OnceLock::new();
    static TAG: OnceLock<Regex> = OnceLock::new();
    let anchor_re = ANCHOR.get_or_init(|| {
        Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#)
            .expect("valid regex")
    });
    let tag_re = TAG.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));

    let Ok(base) = url::Url::parse(base_url) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for cap in anchor_re.captures_iter(html) {
        let raw = cap[1].trim();
        let lower = raw.to_lowercase();
        if raw.starts_with('#')
            || lower.starts_with("mailto:")
            || lower.starts_with("tel:")
            || lower.starts_with("javascript:")
        {
            continue;
        }

        let Ok(mut resolved) = base.join(raw) else {
            continue;
        };
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            continue;
        }
        resolved.set_fragment(None);
        let resolved = resolved.to_string();

        if seen.insert(resolved.clone()) {
            let text = tag_re.replace_all(&cap[2], " ");
            links.push(PageLink {
                url: resolved,
                text: text.split_whitespace().collect::<Vec<_>>().join(" "),
            });
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_are_resolved_and_deduplicated() {
        let html = r##"
            <a href="/contact">Contact <b>us</b></a>
            <a class="nav" href="https://acme.com/contact#map">Contact again</a>
            <a href="mailto:hi@acme.com">Email</a>
            <a href="#top">Top</a>
            <a href='locations/'>Our Offices</a>
        "##;
        let links = extract_links(html, "https://acme.com/about/");
        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://acme.com/contact",
                "https://acme.com/about/locations/"
            ]
        );
        assert_eq!(links[0].text, "Contact us");
    }

    #[test]
    fn invalid_base_yields_nothing() {
        assert!(extract_links("<a href=\"/x\">x</a>", "not a url").is_empty());
    }
}
