//! Data models for the `TravelPack` application
//!
//! This module contains the core domain models organized by concern:
//! - Location: Geographic coordinates and metadata
//! - Forecast: NWS forecast periods and the summary built from them
//! - Trip: A destination and date ready for forecasting
//! - Recommendation: The final packing list returned to the user

pub mod forecast;
pub mod location;
pub mod recommendation;
pub mod trip;

// Re-export all public types for convenient access
pub use forecast::{ForecastPeriod, ForecastSummary};
pub use location::Location;
pub use recommendation::{PackingCategory, Recommendation};
pub use trip::ResolvedTrip;
