//! Location Resolution Module
//!
//! Resolves free-text location inputs (coordinates, names, ZIP codes) into
//! structured [`Location`]s and enforces the supported-country boundary.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::PipelineError;
use crate::api::{Geocoder, LocationInput, LocationParser, us_state_name};
use crate::models::Location;

/// Rough (lat_min, lat_max, lon_min, lon_max) boxes for US territory with NWS coverage
const US_BOUNDING_BOXES: [(f64, f64, f64, f64); 4] = [
    // contiguous states
    (24.4, 49.5, -125.0, -66.9),
    // Alaska
    (51.2, 71.5, -180.0, -129.9),
    // western Aleutians past the antimeridian
    (51.2, 53.1, 172.0, 180.0),
    // Hawaii
    (18.9, 22.3, -160.3, -154.8),
];

/// Service for resolving location inputs
pub struct LocationResolver {
    geocoder: Arc<dyn Geocoder>,
    supported_country_codes: Vec<String>,
}

impl LocationResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>, supported_country_codes: &[String]) -> Self {
        Self {
            geocoder,
            supported_country_codes: supported_country_codes
                .iter()
                .map(|c| c.to_ascii_uppercase())
                .collect(),
        }
    }

    /// Resolve a location description into a supported [`Location`]
    pub async fn resolve_location(&self, text: &str) -> Result<Location, PipelineError> {
        let location_input = LocationParser::parse(text);
        debug!("Resolving location input: {:?}", location_input);

        let location = match location_input {
            LocationInput::Coordinates(lat, lon) => {
                Location::new(lat, lon, format!("{lat:.4}, {lon:.4}"))
            }
            LocationInput::Name { name, region } => {
                self.resolve_name(text, &name, region.as_deref()).await?
            }
            LocationInput::PostalCode(zip) => self.resolve_postal_code(&zip).await?,
        };

        self.check_supported(&location)?;

        info!(
            "Resolved location: {} at ({:.4}, {:.4})",
            location.display_name(),
            location.latitude,
            location.longitude
        );
        Ok(location)
    }

    async fn resolve_name(
        &self,
        original: &str,
        name: &str,
        region: Option<&str>,
    ) -> Result<Location, PipelineError> {
        debug!("Geocoding location name: {} (region: {:?})", name, region);

        let mut candidates = self
            .geocoder
            .search(name, None)
            .await
            .map_err(|e| PipelineError::reasoning(format!("location lookup failed: {e:#}")))?;

        if candidates.is_empty() {
            return Err(PipelineError::AmbiguousLocation {
                candidate: Some(original.trim().to_string()),
            });
        }

        let chosen = region
            .and_then(|region| {
                candidates
                    .iter()
                    .position(|c| Self::matches_region(c, region))
            })
            .unwrap_or(0);

        Ok(candidates.swap_remove(chosen))
    }

    async fn resolve_postal_code(&self, zip: &str) -> Result<Location, PipelineError> {
        debug!("Geocoding postal code: {}", zip);

        let candidates = self
            .geocoder
            .search(zip, Some("US"))
            .await
            .map_err(|e| PipelineError::reasoning(format!("postal code lookup failed: {e:#}")))?;

        candidates
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::AmbiguousLocation {
                candidate: Some(zip.to_string()),
            })
    }

    /// Whether a candidate's state or country matches a "City, Region" qualifier
    fn matches_region(candidate: &Location, region: &str) -> bool {
        let region = region.trim();
        let state = us_state_name(region).unwrap_or(region);

        let admin_matches = candidate
            .admin_area
            .as_deref()
            .is_some_and(|a| a.eq_ignore_ascii_case(state));
        let country_matches = candidate
            .country
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(region))
            || candidate
                .country_code
                .as_deref()
                .is_some_and(|c| c.eq_ignore_ascii_case(region));

        admin_matches || country_matches
    }

    fn check_supported(&self, location: &Location) -> Result<(), PipelineError> {
        let supported = match location.country_code.as_deref() {
            Some(code) => self
                .supported_country_codes
                .iter()
                .any(|c| c.eq_ignore_ascii_case(code)),
            None => {
                self.supported_country_codes.iter().any(|c| c == "US")
                    && within_us_bounds(location.latitude, location.longitude)
            }
        };

        if supported {
            Ok(())
        } else {
            warn!(
                "Location {} ({:?}) is outside the supported region",
                location.display_name(),
                location.country_code
            );
            Err(PipelineError::UnsupportedRegion {
                location: location.display_name(),
            })
        }
    }
}

/// Approximate US coverage test for coordinates without a country code
#[must_use]
pub fn within_us_bounds(latitude: f64, longitude: f64) -> bool {
    US_BOUNDING_BOXES
        .iter()
        .any(|(lat_min, lat_max, lon_min, lon_max)| {
            (*lat_min..=*lat_max).contains(&latitude) && (*lon_min..=*lon_max).contains(&longitude)
        })
}
