use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Sources ---

/// The agent that produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    GoogleMaps,
    Website,
    SecFiling,
    Search,
}

impl Source {
    pub const ALL: [Source; 4] = [
        Source::GoogleMaps,
        Source::Website,
        Source::SecFiling,
        Source::Search,
    ];

    /// Reliability prior for records from this source.
    pub fn base_confidence(self) -> f64 {
        match self {
            Source::GoogleMaps => 0.9,
            Source::Website => 0.8,
            Source::SecFiling => 0.75,
            Source::Search => 0.7,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Source::GoogleMaps => "Google Maps",
            Source::Website => "Website scraper",
            Source::SecFiling => "SEC EDGAR",
            Source::Search => "Web search",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::GoogleMaps => write!(f, "google_maps"),
            Source::Website => write!(f, "website"),
            Source::SecFiling => write!(f, "sec_filing"),
            Source::Search => write!(f, "search"),
        }
    }
}

// --- Location records ---

/// Text fields of a record that take part in conflict resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationField {
    Name,
    StreetAddress,
    City,
    State,
    Country,
    PostalCode,
    Phone,
    Website,
    SourceUrl,
}

impl LocationField {
    pub const ALL: [LocationField; 9] = [
        LocationField::Name,
        LocationField::StreetAddress,
        LocationField::City,
        LocationField::State,
        LocationField::Country,
        LocationField::PostalCode,
        LocationField::Phone,
        LocationField::Website,
        LocationField::SourceUrl,
    ];
}

impl fmt::Display for LocationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LocationField::Name => "name",
            LocationField::StreetAddress => "street_address",
            LocationField::City => "city",
            LocationField::State => "state",
            LocationField::Country => "country",
            LocationField::PostalCode => "postal_code",
            LocationField::Phone => "phone",
            LocationField::Website => "website",
            LocationField::SourceUrl => "source_url",
        };
        f.write_str(name)
    }
}

/// One candidate or merged physical-location observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub name: Option<String>,
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub source: Source,
    pub source_confidence: f64,
    pub source_url: Option<String>,
    pub discovered_at: DateTime<Utc>,
}

impl LocationRecord {
    /// Empty record stamped with its source's default confidence.
    pub fn new(source: Source) -> Self {
        Self {
            name: None,
            street_address: None,
            city: None,
            state: None,
            country: None,
            postal_code: None,
            phone: None,
            website: None,
            latitude: None,
            longitude: None,
            source,
            source_confidence: source.base_confidence(),
            source_url: None,
            discovered_at: Utc::now(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = non_empty(name.into());
        self
    }

    pub fn with_street_address(mut self, street: impl Into<String>) -> Self {
        self.street_address = non_empty(street.into());
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = non_empty(city.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = non_empty(state.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = non_empty(country.into());
        self
    }

    pub fn with_postal_code(mut self, postal_code: impl Into<String>) -> Self {
        self.postal_code = non_empty(postal_code.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = non_empty(phone.into());
        self
    }

    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = non_empty(website.into());
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = non_empty(url.into());
        self
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.source_confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// A record must say where something is: a city or a street address.
    pub fn has_location_info(&self) -> bool {
        is_present(&self.city) || is_present(&self.street_address)
    }

    pub fn field(&self, field: LocationField) -> Option<&str> {
        let value = match field {
            LocationField::Name => &self.name,
            LocationField::StreetAddress => &self.street_address,
            LocationField::City => &self.city,
            LocationField::State => &self.state,
            LocationField::Country => &self.country,
            LocationField::PostalCode => &self.postal_code,
            LocationField::Phone => &self.phone,
            LocationField::Website => &self.website,
            LocationField::SourceUrl => &self.source_url,
        };
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn set_field(&mut self, field: LocationField, value: Option<String>) {
        let slot = match field {
            LocationField::Name => &mut self.name,
            LocationField::StreetAddress => &mut self.street_address,
            LocationField::City => &mut self.city,
            LocationField::State => &mut self.state,
            LocationField::Country => &mut self.country,
            LocationField::PostalCode => &mut self.postal_code,
            LocationField::Phone => &mut self.phone,
            LocationField::Website => &mut self.website,
            LocationField::SourceUrl => &mut self.source_url,
        };
        *slot = value.and_then(non_empty);
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}

fn is_present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

// --- Report ---

/// A merged location with its cross-validated confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredLocation {
    #[serde(flatten)]
    pub record: LocationRecord,
    pub confidence: f64,
    /// Distinct contributing sources, first-seen order.
    pub sources: Vec<Source>,
    pub member_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Records each source contributed after aggregation filtering.
    pub records_per_source: BTreeMap<Source, usize>,
    pub total_locations: usize,
    pub url_supplied: bool,
    pub url_processed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub company: String,
    pub url: Option<String>,
    pub locations: Vec<ScoredLocation>,
    pub summary: Summary,
    pub messages: Vec<String>,
    pub errors: Vec<String>,
}

impl Report {
    pub fn new(company: impl Into<String>, url: Option<String>) -> Self {
        Self {
            company: company.into(),
            url,
            locations: Vec::new(),
            summary: Summary::default(),
            messages: Vec::new(),
            errors: Vec::new(),
        }
    }
}

// --- Requests ---

/// Caller-supplied API keys. Any of them may be absent.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub openai_api_key: Option<String>,
    pub google_maps_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
}

impl Credentials {
    /// Fill gaps from another set (typically server-side config).
    pub fn or(self, fallback: &Credentials) -> Credentials {
        let pick = |own: Option<String>, other: &Option<String>| {
            own.and_then(non_empty).or_else(|| other.clone().and_then(non_empty))
        };
        Credentials {
            openai_api_key: pick(self.openai_api_key, &fallback.openai_api_key),
            google_maps_api_key: pick(self.google_maps_api_key, &fallback.google_maps_api_key),
            tavily_api_key: pick(self.tavily_api_key, &fallback.tavily_api_key),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("openai_api_key", &mask(&self.openai_api_key))
            .field("google_maps_api_key", &mask(&self.google_maps_api_key))
            .field("tavily_api_key", &mask(&self.tavily_api_key))
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryRequest {
    pub company: String,
    pub url: Option<String>,
    #[serde(default)]
    pub credentials: Credentials,
}

impl DiscoveryRequest {
    pub fn new(company: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            url: None,
            credentials: Credentials::default(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }
}
