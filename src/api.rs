//! HTTP plumbing and geocoding
//!
//! [`ApiClient`] wraps `reqwest` with timing logs and uniform status-code
//! mapping; it is shared by the geocoder and the NWS forecast client.
//! [`GeocodingClient`] talks to the Open-Meteo geocoding API (no key
//! required), and [`LocationParser`] classifies raw location text.

use crate::config::GeocodingConfig;
use crate::models::Location;
use crate::{ErrorCode, TravelPackError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Thin async HTTP client with status mapping and timing logs
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
}

impl ApiClient {
    /// Create a client with the given timeout and User-Agent
    pub fn new(timeout_seconds: u32, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds.into()))
            .user_agent(user_agent)
            .build()
            .with_context(|| "Failed to create HTTP client")?;
        Ok(Self { client })
    }

    /// GET `url` and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.make_request(url).await?;

        let parse_start = Instant::now();
        let body = response.json::<T>().await.map_err(|e| {
            error!("Failed to parse response from {}: {}", url, e);
            TravelPackError::api_with_context(
                format!("Invalid response body: {e}"),
                ErrorCode::ApiInvalidResponse,
                HashMap::from([("url".to_string(), url.to_string())]),
            )
        })?;
        debug!("Parsed response in {:.3}s", parse_start.elapsed().as_secs_f64());

        Ok(body)
    }

    /// Single-attempt GET with status-code mapping
    #[instrument(level = "debug", skip(self))]
    async fn make_request(&self, url: &str) -> Result<Response> {
        let request_start = Instant::now();

        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(
                "Network error after {:.3}s: {}",
                request_start.elapsed().as_secs_f64(),
                e
            );
            TravelPackError::api_with_context(
                format!("Network error: {e}"),
                ErrorCode::ApiNetworkError,
                HashMap::from([
                    ("url".to_string(), url.to_string()),
                    ("timeout".to_string(), e.is_timeout().to_string()),
                ]),
            )
        })?;

        let status = response.status();
        let elapsed = request_start.elapsed();
        debug!(
            "HTTP response received: {} in {:.3}s",
            status,
            elapsed.as_secs_f64()
        );

        if elapsed.as_secs() > 5 {
            warn!("Slow API response detected: {:.3}s", elapsed.as_secs_f64());
        }

        if status.is_success() {
            return Ok(response);
        }

        let context = HashMap::from([
            ("url".to_string(), url.to_string()),
            ("status_code".to_string(), status.as_u16().to_string()),
        ]);

        let err = match status.as_u16() {
            401 | 403 => {
                error!("API authentication failed (HTTP {})", status.as_u16());
                TravelPackError::api_with_context(
                    "Request was not authorized by the remote service.",
                    ErrorCode::ApiUnauthorized,
                    context,
                )
            }
            404 => {
                warn!("Resource not found (HTTP 404)");
                TravelPackError::api_with_context(
                    "Location not found. The service has no data for these coordinates.",
                    ErrorCode::ApiLocationNotFound,
                    context,
                )
            }
            429 => {
                warn!("Server rate limit exceeded (HTTP 429)");
                TravelPackError::api_with_context(
                    "Rate limit exceeded. Please try again shortly.",
                    ErrorCode::ApiRateLimit,
                    context,
                )
            }
            _ => {
                let message = format!(
                    "API request failed with status: {} - {}",
                    status,
                    status.canonical_reason().unwrap_or("Unknown error")
                );
                warn!("{}", message);
                TravelPackError::api_with_context(message, ErrorCode::ApiNetworkError, context)
            }
        };
        Err(err.into())
    }
}

/// Place-name search returning candidates in the provider's ranking order
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn search(&self, query: &str, country_code: Option<&str>) -> Result<Vec<Location>>;
}

/// Open-Meteo geocoding API client
pub struct GeocodingClient {
    api: ApiClient,
    base_url: String,
    max_results: u32,
}

impl GeocodingClient {
    pub fn new(config: &GeocodingConfig, user_agent: &str) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(config.timeout_seconds, user_agent)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_results: config.max_results,
        })
    }

    fn search_url(&self, query: &str, country_code: Option<&str>) -> String {
        let mut url = format!(
            "{}/search?name={}&count={}&language=en&format=json",
            self.base_url,
            urlencoding::encode(query),
            self.max_results
        );
        if let Some(code) = country_code {
            url.push_str(&format!("&countryCode={}", urlencoding::encode(code)));
        }
        url
    }
}

#[async_trait]
impl Geocoder for GeocodingClient {
    #[instrument(skip(self), fields(location = query))]
    async fn search(&self, query: &str, country_code: Option<&str>) -> Result<Vec<Location>> {
        info!("Geocoding location: '{}'", query);
        let start_time = Instant::now();

        let response: GeocodingResponse = self
            .api
            .get_json(&self.search_url(query, country_code))
            .await
            .with_context(|| format!("Geocoding request for '{query}' failed"))?;

        let locations: Vec<Location> = response
            .results
            .unwrap_or_default()
            .into_iter()
            .map(Location::from)
            .collect();

        if locations.is_empty() {
            warn!("No results found for location '{}'", query);
        } else {
            info!(
                "Found {} geocoding results for '{}' in {:.3}s",
                locations.len(),
                query,
                start_time.elapsed().as_secs_f64()
            );
            debug!(
                "Geocoding results: {:?}",
                locations
                    .iter()
                    .map(|l| format!(
                        "{} [{}] ({:.4}, {:.4})",
                        l.display_name(),
                        l.country_code.as_deref().unwrap_or("?"),
                        l.latitude,
                        l.longitude
                    ))
                    .collect::<Vec<_>>()
            );
        }

        Ok(locations)
    }
}

/// Open-Meteo search response; `results` is absent when nothing matched
#[derive(Debug, Deserialize)]
pub struct GeocodingResponse {
    pub results: Option<Vec<GeocodingResult>>,
}

/// A single Open-Meteo geocoding candidate
#[derive(Debug, Deserialize, Clone)]
pub struct GeocodingResult {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Country name
    pub country: Option<String>,
    /// ISO 3166-1 alpha-2 code
    pub country_code: Option<String>,
    /// First-level administrative area (state)
    pub admin1: Option<String>,
}

impl From<GeocodingResult> for Location {
    fn from(geocoding: GeocodingResult) -> Self {
        Location {
            latitude: geocoding.latitude,
            longitude: geocoding.longitude,
            name: geocoding.name,
            country: geocoding.country,
            country_code: geocoding.country_code.map(|c| c.to_ascii_uppercase()),
            admin_area: geocoding.admin1,
        }
    }
}

/// Location parsing utilities
pub struct LocationParser;

impl LocationParser {
    /// Parse location input (coordinates, ZIP codes, place names)
    #[must_use]
    pub fn parse(input: &str) -> LocationInput {
        let input = input.trim().trim_end_matches(['?', '!', '.']).trim();

        if let Ok((lat, lon)) = Self::parse_coordinates(input) {
            return LocationInput::Coordinates(lat, lon);
        }

        if Self::is_postal_code(input) {
            // The five-digit prefix is what the geocoder indexes
            let zip: String = input.chars().filter(char::is_ascii_digit).take(5).collect();
            return LocationInput::PostalCode(zip);
        }

        match input.split_once(',') {
            Some((name, region)) if !name.trim().is_empty() && !region.trim().is_empty() => {
                LocationInput::Name {
                    name: name.trim().to_string(),
                    region: Some(region.trim().to_string()),
                }
            }
            _ => LocationInput::Name {
                name: input.trim_end_matches(',').trim().to_string(),
                region: None,
            },
        }
    }

    /// Parse coordinates from string like "41.88,-87.63" or "41.88 -87.63"
    fn parse_coordinates(input: &str) -> Result<(f64, f64)> {
        let parts: Vec<&str> = input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();

        if parts.len() != 2 {
            return Err(
                TravelPackError::validation("Coordinates must be in format 'lat,lon'").into(),
            );
        }

        let lat = parts[0]
            .parse::<f64>()
            .with_context(|| format!("Invalid latitude: {}", parts[0]))?;
        let lon = parts[1]
            .parse::<f64>()
            .with_context(|| format!("Invalid longitude: {}", parts[1]))?;

        if !(-90.0..=90.0).contains(&lat) {
            return Err(TravelPackError::validation(format!(
                "Latitude must be between -90 and 90, got: {lat}"
            ))
            .into());
        }

        if !(-180.0..=180.0).contains(&lon) {
            return Err(TravelPackError::validation(format!(
                "Longitude must be between -180 and 180, got: {lon}"
            ))
            .into());
        }

        Ok((lat, lon))
    }

    /// US ZIP or ZIP+4
    fn is_postal_code(input: &str) -> bool {
        let bytes = input.as_bytes();
        match bytes.len() {
            5 => bytes.iter().all(u8::is_ascii_digit),
            10 => {
                bytes[5] == b'-'
                    && bytes[..5].iter().all(u8::is_ascii_digit)
                    && bytes[6..].iter().all(u8::is_ascii_digit)
            }
            _ => false,
        }
    }
}

/// Types of location input
#[derive(Debug, Clone, PartialEq)]
pub enum LocationInput {
    /// Coordinates (latitude, longitude)
    Coordinates(f64, f64),
    /// Place name with an optional state/region qualifier ("Portland, ME")
    Name {
        name: String,
        region: Option<String>,
    },
    /// US ZIP code
    PostalCode(String),
}

/// US states and DC as (postal abbreviation, name)
pub const US_STATES: [(&str, &str); 51] = [
    ("AL", "Alabama"),
    ("AK", "Alaska"),
    ("AZ", "Arizona"),
    ("AR", "Arkansas"),
    ("CA", "California"),
    ("CO", "Colorado"),
    ("CT", "Connecticut"),
    ("DE", "Delaware"),
    ("DC", "District of Columbia"),
    ("FL", "Florida"),
    ("GA", "Georgia"),
    ("HI", "Hawaii"),
    ("ID", "Idaho"),
    ("IL", "Illinois"),
    ("IN", "Indiana"),
    ("IA", "Iowa"),
    ("KS", "Kansas"),
    ("KY", "Kentucky"),
    ("LA", "Louisiana"),
    ("ME", "Maine"),
    ("MD", "Maryland"),
    ("MA", "Massachusetts"),
    ("MI", "Michigan"),
    ("MN", "Minnesota"),
    ("MS", "Mississippi"),
    ("MO", "Missouri"),
    ("MT", "Montana"),
    ("NE", "Nebraska"),
    ("NV", "Nevada"),
    ("NH", "New Hampshire"),
    ("NJ", "New Jersey"),
    ("NM", "New Mexico"),
    ("NY", "New York"),
    ("NC", "North Carolina"),
    ("ND", "North Dakota"),
    ("OH", "Ohio"),
    ("OK", "Oklahoma"),
    ("OR", "Oregon"),
    ("PA", "Pennsylvania"),
    ("RI", "Rhode Island"),
    ("SC", "South Carolina"),
    ("SD", "South Dakota"),
    ("TN", "Tennessee"),
    ("TX", "Texas"),
    ("UT", "Utah"),
    ("VT", "Vermont"),
    ("VA", "Virginia"),
    ("WA", "Washington"),
    ("WV", "West Virginia"),
    ("WI", "Wisconsin"),
    ("WY", "Wyoming"),
];

/// Full state name for an abbreviation or name, case-insensitive
#[must_use]
pub fn us_state_name(region: &str) -> Option<&'static str> {
    let region = region.trim().trim_end_matches('.');
    US_STATES
        .iter()
        .find(|(abbr, name)| abbr.eq_ignore_ascii_case(region) || name.eq_ignore_ascii_case(region))
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_location_parser_coordinates() {
        assert_eq!(
            LocationParser::parse("41.88,-87.63"),
            LocationInput::Coordinates(41.88, -87.63)
        );
        assert_eq!(
            LocationParser::parse("41.88 -87.63"),
            LocationInput::Coordinates(41.88, -87.63)
        );
    }

    #[test]
    fn test_location_parser_invalid_coordinates_fall_back_to_name() {
        assert!(matches!(
            LocationParser::parse("91.0,8.0"),
            LocationInput::Name { .. }
        ));
        assert!(matches!(
            LocationParser::parse("46.0,-181.0"),
            LocationInput::Name { .. }
        ));
    }

    #[test]
    fn test_location_parser_postal_codes() {
        assert_eq!(
            LocationParser::parse("60601"),
            LocationInput::PostalCode("60601".to_string())
        );
        assert_eq!(
            LocationParser::parse("60601-1234"),
            LocationInput::PostalCode("60601".to_string())
        );
        assert!(!LocationParser::is_postal_code("1234"));
        assert!(!LocationParser::is_postal_code("SW1A 1AA"));
    }

    #[test]
    fn test_location_parser_names() {
        assert_eq!(
            LocationParser::parse("San Francisco"),
            LocationInput::Name {
                name: "San Francisco".to_string(),
                region: None
            }
        );
        assert_eq!(
            LocationParser::parse("Portland, ME"),
            LocationInput::Name {
                name: "Portland".to_string(),
                region: Some("ME".to_string())
            }
        );
        assert_eq!(
            LocationParser::parse("Chicago?"),
            LocationInput::Name {
                name: "Chicago".to_string(),
                region: None
            }
        );
    }

    #[test]
    fn test_us_state_lookup() {
        assert_eq!(us_state_name("il"), Some("Illinois"));
        assert_eq!(us_state_name("New York"), Some("New York"));
        assert_eq!(us_state_name("Île-de-France"), None);
    }

    #[test]
    fn test_geocoding_result_to_location() {
        let geocoding = GeocodingResult {
            name: "Chicago".to_string(),
            latitude: 41.85003,
            longitude: -87.65005,
            country: Some("United States".to_string()),
            country_code: Some("us".to_string()),
            admin1: Some("Illinois".to_string()),
        };

        let location: Location = geocoding.into();
        assert_eq!(location.display_name(), "Chicago, Illinois");
        assert_eq!(location.country_code.as_deref(), Some("US"));
    }

    #[tokio::test]
    async fn test_geocoding_client_search() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/search")
                    .query_param("name", "Chicago")
                    .query_param("count", "5");
                then.status(200).json_body(serde_json::json!({
                    "results": [{
                        "id": 4887398,
                        "name": "Chicago",
                        "latitude": 41.85003,
                        "longitude": -87.65005,
                        "country_code": "US",
                        "country": "United States",
                        "admin1": "Illinois"
                    }],
                    "generationtime_ms": 0.5
                }));
            })
            .await;

        let config = GeocodingConfig {
            base_url: server.url(""),
            ..GeocodingConfig::default()
        };
        let client = GeocodingClient::new(&config, "travelpack-test").unwrap();
        let results = client.search("Chicago", None).await.unwrap();

        mock.assert_async().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].admin_area.as_deref(), Some("Illinois"));
    }

    #[tokio::test]
    async fn test_geocoding_client_no_results() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/search");
                then.status(200)
                    .json_body(serde_json::json!({ "generationtime_ms": 0.3 }));
            })
            .await;

        let config = GeocodingConfig {
            base_url: server.url(""),
            ..GeocodingConfig::default()
        };
        let client = GeocodingClient::new(&config, "travelpack-test").unwrap();
        assert!(client.search("Xyzzyville", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_server_error_maps_to_network_code() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/broken");
                then.status(503);
            })
            .await;

        let api = ApiClient::new(5, "travelpack-test").unwrap();
        let err = api
            .get_json::<serde_json::Value>(&server.url("/broken"))
            .await
            .unwrap_err();
        let err = err.downcast_ref::<TravelPackError>().unwrap();
        assert_eq!(err.code(), Some(ErrorCode::ApiNetworkError));
    }

    #[tokio::test]
    async fn test_not_found_maps_to_location_code() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/missing");
                then.status(404);
            })
            .await;

        let api = ApiClient::new(5, "travelpack-test").unwrap();
        let err = api
            .get_json::<serde_json::Value>(&server.url("/missing"))
            .await
            .unwrap_err();
        let err = err.downcast_ref::<TravelPackError>().unwrap();
        assert_eq!(err.code(), Some(ErrorCode::ApiLocationNotFound));
    }
}
