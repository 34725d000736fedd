use anyhow::Result;
use async_trait::async_trait;
use places_client::PlacesClient;

use crate::admission::AdmissionGate;
use crate::traits::{PlaceContact, PlaceHit, PlaceSearch};

/// Google Places behind the credential's admission gate.
pub struct GooglePlaces {
    client: PlacesClient,
    gate: AdmissionGate,
}

impl GooglePlaces {
    pub fn new(client: PlacesClient, gate: AdmissionGate) -> Self {
        Self { client, gate }
    }
}

#[async_trait]
impl PlaceSearch for GooglePlaces {
    async fn search(&self, query: &str) -> Result<Vec<PlaceHit>> {
        let _permit = self.gate.admit().await?;
        let places = self.client.text_search(query).await?;
        Ok(places
            .into_iter()
            .map(|place| {
                let coords = place.lat_lng();
                PlaceHit {
                    place_id: place.place_id,
                    name: place.name,
                    formatted_address: place.formatted_address,
                    latitude: coords.map(|(lat, _)| lat),
                    longitude: coords.map(|(_, lng)| lng),
                }
            })
            .collect())
    }

    async fn details(&self, place_id: &str) -> Result<PlaceContact> {
        let _permit = self.gate.admit().await?;
        let details = self.client.details(place_id).await?;
        Ok(PlaceContact {
            phone: details
                .formatted_phone_number
                .or(details.international_phone_number),
            website: details.website,
        })
    }
}
