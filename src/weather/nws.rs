//! US National Weather Service API client
//!
//! Two requests per forecast: `/points/{lat},{lon}` yields the gridpoint
//! forecast URL, which in turn yields the 12-hour periods.

use std::collections::HashMap;
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::ForecastProvider;
use crate::api::ApiClient;
use crate::config::WeatherConfig;
use crate::models::ForecastPeriod;
use crate::{ErrorCode, TravelPackError};

/// NWS forecast client
pub struct NwsClient {
    api: ApiClient,
    base_url: String,
}

impl NwsClient {
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(config.timeout_seconds, &config.user_agent)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolve the gridpoint forecast URL for a coordinate pair
    async fn forecast_url(&self, latitude: f64, longitude: f64) -> Result<String> {
        // NWS redirects requests with more than four decimals
        let url = format!("{}/points/{latitude:.4},{longitude:.4}", self.base_url);
        let points: PointsResponse = self
            .api
            .get_json(&url)
            .await
            .with_context(|| format!("NWS points lookup failed for {latitude:.4},{longitude:.4}"))?;

        points.properties.forecast.ok_or_else(|| {
            TravelPackError::api_with_context(
                "NWS points response has no forecast URL",
                ErrorCode::ApiInvalidResponse,
                HashMap::from([(
                    "coordinates".to_string(),
                    format!("{latitude:.4},{longitude:.4}"),
                )]),
            )
            .into()
        })
    }
}

#[async_trait]
impl ForecastProvider for NwsClient {
    #[instrument(skip(self))]
    async fn forecast_periods(&self, latitude: f64, longitude: f64) -> Result<Vec<ForecastPeriod>> {
        info!(
            "Getting NWS forecast for coordinates: {:.4}, {:.4}",
            latitude, longitude
        );
        let start_time = Instant::now();

        let forecast_url = self.forecast_url(latitude, longitude).await?;
        debug!("NWS forecast URL: {}", forecast_url);

        let forecast: ForecastResponse = self
            .api
            .get_json(&forecast_url)
            .await
            .with_context(|| "NWS forecast request failed")?;

        let periods: Vec<ForecastPeriod> = forecast
            .properties
            .periods
            .into_iter()
            .map(ForecastPeriod::from)
            .collect();

        info!(
            "Retrieved {} forecast periods in {:.3}s",
            periods.len(),
            start_time.elapsed().as_secs_f64()
        );
        Ok(periods)
    }
}

#[derive(Debug, Deserialize)]
struct PointsResponse {
    properties: PointsProperties,
}

#[derive(Debug, Deserialize)]
struct PointsProperties {
    forecast: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    properties: ForecastProperties,
}

#[derive(Debug, Deserialize)]
struct ForecastProperties {
    periods: Vec<NwsPeriod>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NwsPeriod {
    name: String,
    start_time: DateTime<FixedOffset>,
    end_time: DateTime<FixedOffset>,
    is_daytime: bool,
    temperature: f64,
    temperature_unit: String,
    #[serde(default)]
    wind_speed: Option<String>,
    #[serde(default)]
    wind_direction: Option<String>,
    short_forecast: String,
    #[serde(default)]
    probability_of_precipitation: Option<QuantitativeValue>,
}

#[derive(Debug, Deserialize)]
struct QuantitativeValue {
    value: Option<f64>,
}

impl From<NwsPeriod> for ForecastPeriod {
    fn from(period: NwsPeriod) -> Self {
        ForecastPeriod {
            name: period.name,
            start_time: period.start_time,
            end_time: period.end_time,
            is_daytime: period.is_daytime,
            temperature: period.temperature,
            temperature_unit: period.temperature_unit,
            wind_speed: period.wind_speed.unwrap_or_default(),
            wind_direction: period.wind_direction.unwrap_or_default(),
            short_forecast: period.short_forecast,
            precipitation_probability: period
                .probability_of_precipitation
                .and_then(|p| p.value)
                .map(|v| v.clamp(0.0, 100.0).round() as u8),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn config_for(server: &MockServer) -> WeatherConfig {
        WeatherConfig {
            base_url: server.url(""),
            ..WeatherConfig::default()
        }
    }

    #[tokio::test]
    async fn test_points_then_forecast() {
        let server = MockServer::start_async().await;
        let points = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/points/41.8500,-87.6500")
                    .header_exists("user-agent");
                then.status(200).json_body(json!({
                    "properties": { "forecast": server.url("/gridpoints/LOT/76,73/forecast") }
                }));
            })
            .await;
        let forecast = server
            .mock_async(|when, then| {
                when.method(GET).path("/gridpoints/LOT/76,73/forecast");
                then.status(200).json_body(json!({
                    "properties": { "periods": [
                        {
                            "number": 1,
                            "name": "Friday",
                            "startTime": "2025-10-17T06:00:00-05:00",
                            "endTime": "2025-10-17T18:00:00-05:00",
                            "isDaytime": true,
                            "temperature": 58,
                            "temperatureUnit": "F",
                            "windSpeed": "10 to 15 mph",
                            "windDirection": "NW",
                            "shortForecast": "Partly Sunny",
                            "probabilityOfPrecipitation": { "unitCode": "wmoUnit:percent", "value": 20 }
                        },
                        {
                            "number": 2,
                            "name": "Friday Night",
                            "startTime": "2025-10-17T18:00:00-05:00",
                            "endTime": "2025-10-18T06:00:00-05:00",
                            "isDaytime": false,
                            "temperature": 44,
                            "temperatureUnit": "F",
                            "windSpeed": "5 mph",
                            "windDirection": "W",
                            "shortForecast": "Mostly Clear",
                            "probabilityOfPrecipitation": { "unitCode": "wmoUnit:percent", "value": null }
                        }
                    ]}
                }));
            })
            .await;

        let client = NwsClient::new(&config_for(&server)).unwrap();
        let periods = client.forecast_periods(41.85, -87.65).await.unwrap();

        points.assert_async().await;
        forecast.assert_async().await;
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].name, "Friday");
        assert_eq!(periods[0].temperature, 58.0);
        assert_eq!(periods[0].precipitation_probability, Some(20));
        assert_eq!(periods[1].precipitation_probability, None);
        assert!(!periods[1].is_daytime);
    }

    #[tokio::test]
    async fn test_points_outside_coverage_fails() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/points/48.8566,2.3522");
                then.status(404).json_body(json!({
                    "title": "Data Unavailable For Requested Point",
                    "status": 404
                }));
            })
            .await;

        let client = NwsClient::new(&config_for(&server)).unwrap();
        let err = client.forecast_periods(48.8566, 2.3522).await.unwrap_err();
        let api_err = err.downcast_ref::<TravelPackError>().unwrap();
        assert_eq!(api_err.code(), Some(ErrorCode::ApiLocationNotFound));
    }

    #[tokio::test]
    async fn test_malformed_forecast_fails() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/points/41.8500,-87.6500");
                then.status(200).json_body(json!({
                    "properties": { "forecast": server.url("/bad") }
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/bad");
                then.status(200).body("<html>maintenance</html>");
            })
            .await;

        let client = NwsClient::new(&config_for(&server)).unwrap();
        assert!(client.forecast_periods(41.85, -87.65).await.is_err());
    }
}
