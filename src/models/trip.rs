//! A destination and target date ready for forecasting

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Location;

/// Output of date and location resolution. Lives for a single query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTrip {
    pub location_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub target_date: NaiveDate,
}

impl ResolvedTrip {
    #[must_use]
    pub fn new(location: &Location, target_date: NaiveDate) -> Self {
        Self {
            location_name: location.display_name(),
            latitude: location.latitude,
            longitude: location.longitude,
            target_date,
        }
    }
}
