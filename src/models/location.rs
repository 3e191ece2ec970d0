//! Location model for geographic coordinates and metadata

use serde::{Deserialize, Serialize};

/// Location coordinates
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Location {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Location name (city, town, etc.)
    pub name: String,
    /// Country name as reported by the geocoder
    pub country: Option<String>,
    /// Country code (ISO 3166-1 alpha-2)
    pub country_code: Option<String>,
    /// First-level administrative area (US state)
    pub admin_area: Option<String>,
}

impl Location {
    /// Create a new location without country metadata
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, name: String) -> Self {
        Self {
            latitude,
            longitude,
            name,
            country: None,
            country_code: None,
            admin_area: None,
        }
    }

    /// Create location with an ISO country code
    #[must_use]
    pub fn with_country_code(latitude: f64, longitude: f64, name: String, code: &str) -> Self {
        Self {
            country_code: Some(code.to_ascii_uppercase()),
            ..Self::new(latitude, longitude, name)
        }
    }

    /// Name qualified by admin area, e.g. "Chicago, Illinois"
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.admin_area {
            Some(area) if !area.is_empty() && area != &self.name => {
                format!("{}, {}", self.name, area)
            }
            _ => self.name.clone(),
        }
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    /// Round coordinates to the given number of decimals
    #[must_use]
    pub fn rounded_coordinates(&self, precision: u32) -> (f64, f64) {
        let multiplier = 10_f64.powi(i32::try_from(precision).unwrap_or(4));
        let lat = (self.latitude * multiplier).round() / multiplier;
        let lon = (self.longitude * multiplier).round() / multiplier;
        (lat, lon)
    }
}
