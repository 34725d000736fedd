pub mod error;
pub mod types;

pub use error::{PlacesError, Result};
pub use types::{Geometry, LatLng, Place, PlaceDetails};

use std::time::Duration;

use tracing::debug;
use types::{DetailsResponse, SearchResponse};

const BASE_URL: &str = "https://maps.googleapis.com/maps/api/place";

/// Fields requested from the details endpoint. Billing is per field group.
const DETAIL_FIELDS: &str = "formatted_phone_number,international_phone_number,website";

pub struct PlacesClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl PlacesClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self::with_http_client(api_key, client))
    }

    /// Share a connection pool (and its timeouts) with the caller.
    pub fn with_http_client(api_key: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Free-text place search. `ZERO_RESULTS` is an empty list, not an error.
    pub async fn text_search(&self, query: &str) -> Result<Vec<Place>> {
        let url = format!("{}/textsearch/json", self.base_url);
        debug!(query, "Places text search");

        let resp = self
            .client
            .get(&url)
            .query(&[("query", query), ("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PlacesError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: SearchResponse = resp.json().await?;
        match body.status.as_str() {
            "OK" => Ok(body.results),
            "ZERO_RESULTS" => Ok(Vec::new()),
            other => Err(PlacesError::Rejected {
                status: other.to_string(),
                message: body.error_message.unwrap_or_default(),
            }),
        }
    }

    /// Contact details for one place.
    pub async fn details(&self, place_id: &str) -> Result<PlaceDetails> {
        let url = format!("{}/details/json", self.base_url);
        debug!(place_id, "Places details lookup");

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("place_id", place_id),
                ("fields", DETAIL_FIELDS),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PlacesError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: DetailsResponse = resp.json().await?;
        if body.status != "OK" {
            return Err(PlacesError::Rejected {
                status: body.status,
                message: body.error_message.unwrap_or_default(),
            });
        }
        Ok(body.result.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_client_uses_default_endpoint() {
        let client = PlacesClient::with_http_client("maps-key", reqwest::Client::new());
        assert_eq!(client.base_url, BASE_URL);
        assert_eq!(client.api_key, "maps-key");

        let local = client.with_base_url("http://localhost:8080/");
        assert_eq!(local.base_url, "http://localhost:8080");
    }
}
