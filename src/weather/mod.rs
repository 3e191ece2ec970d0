//! Short-range forecasts for a resolved trip

use anyhow::Result;
use async_trait::async_trait;
use chrono::Days;
use tracing::{info, warn};

use crate::PipelineError;
use crate::models::{ForecastPeriod, ForecastSummary, ResolvedTrip};

pub mod nws;

pub use nws::NwsClient;

/// Source of forecast periods for a coordinate pair
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    async fn forecast_periods(&self, latitude: f64, longitude: f64) -> Result<Vec<ForecastPeriod>>;
}

/// Fetch the forecast for `trip` and summarize the `window_days` starting at its target date.
///
/// Transport failures, malformed responses and dates outside the forecast
/// horizon all surface as [`PipelineError::ForecastUnavailable`].
pub async fn fetch_forecast_summary(
    provider: &dyn ForecastProvider,
    trip: &ResolvedTrip,
    window_days: u32,
) -> Result<ForecastSummary, PipelineError> {
    let unavailable = |reason: String| PipelineError::ForecastUnavailable {
        location: trip.location_name.clone(),
        date: trip.target_date,
        reason,
    };

    let periods = provider
        .forecast_periods(trip.latitude, trip.longitude)
        .await
        .map_err(|e| {
            warn!("Forecast fetch for {} failed: {:#}", trip.location_name, e);
            unavailable(format!("{e:#}"))
        })?;

    let end_date = trip
        .target_date
        .checked_add_days(Days::new(u64::from(window_days.max(1) - 1)))
        .unwrap_or(trip.target_date);

    let summary = ForecastSummary::from_periods(&periods, trip.target_date, end_date)
        .ok_or_else(|| {
            let horizon = periods
                .last()
                .map(|p| p.local_date().to_string())
                .unwrap_or_else(|| "none".to_string());
            warn!(
                "No forecast periods between {} and {} (forecast ends {})",
                trip.target_date, end_date, horizon
            );
            unavailable(format!("date is outside the forecast horizon (ends {horizon})"))
        })?;

    info!(
        "Forecast for {}: {:.0}-{:.0}°{} over {} periods",
        trip.location_name,
        summary.temperature_low,
        summary.temperature_high,
        summary.temperature_unit,
        summary.periods.len()
    );
    Ok(summary)
}
