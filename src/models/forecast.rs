//! Forecast periods and the per-trip summary built from them

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of periods listed when a summary is displayed
const MAX_DISPLAYED_PERIODS: usize = 7;

/// One NWS forecast period (typically a 12-hour day or night block)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ForecastPeriod {
    /// Period label, e.g. "Tonight" or "Friday"
    pub name: String,
    /// Period start in the forecast office's local offset
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    pub is_daytime: bool,
    pub temperature: f64,
    /// "F" or "C"
    pub temperature_unit: String,
    pub wind_speed: String,
    pub wind_direction: String,
    pub short_forecast: String,
    /// Probability of precipitation in percent
    pub precipitation_probability: Option<u8>,
}

impl ForecastPeriod {
    /// Calendar date of the period start, local to the forecast location
    #[must_use]
    pub fn local_date(&self) -> NaiveDate {
        self.start_time.date_naive()
    }
}

/// Temperature range and conditions over the trip window
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ForecastSummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub temperature_low: f64,
    pub temperature_high: f64,
    pub temperature_unit: String,
    /// Distinct short forecasts in chronological order
    pub conditions: String,
    pub max_precipitation_probability: Option<u8>,
    /// Periods the summary was built from
    pub periods: Vec<ForecastPeriod>,
}

impl ForecastSummary {
    /// Summarize the periods starting within `[start_date, end_date]`.
    /// Returns `None` when no period falls in the window.
    #[must_use]
    pub fn from_periods(
        periods: &[ForecastPeriod],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Option<Self> {
        let selected: Vec<ForecastPeriod> = periods
            .iter()
            .filter(|p| {
                let date = p.local_date();
                date >= start_date && date <= end_date
            })
            .cloned()
            .collect();

        let first = selected.first()?;
        let temperature_unit = first.temperature_unit.clone();

        let (low, high) = selected.iter().fold((f64::MAX, f64::MIN), |(lo, hi), p| {
            (lo.min(p.temperature), hi.max(p.temperature))
        });

        let mut conditions: Vec<&str> = Vec::new();
        for period in &selected {
            let text = period.short_forecast.trim();
            if !text.is_empty() && !conditions.iter().any(|c| c.eq_ignore_ascii_case(text)) {
                conditions.push(text);
            }
        }
        let conditions = conditions.join("; ");

        let max_precipitation_probability = selected
            .iter()
            .filter_map(|p| p.precipitation_probability)
            .max();

        Some(Self {
            start_date,
            end_date,
            temperature_low: low,
            temperature_high: high,
            temperature_unit,
            conditions,
            max_precipitation_probability,
            periods: selected,
        })
    }

    /// Human-readable date range, e.g. "Friday, October 17, 2025"
    #[must_use]
    pub fn date_range_text(&self) -> String {
        if self.start_date == self.end_date {
            self.start_date.format("%A, %B %-d, %Y").to_string()
        } else {
            format!(
                "{} to {}",
                self.start_date.format("%A, %B %-d"),
                self.end_date.format("%A, %B %-d, %Y")
            )
        }
    }

    /// Coarse band for the daytime high, used to steer retrieval
    #[must_use]
    pub fn temperature_band(&self) -> &'static str {
        let high_f = if self.temperature_unit.eq_ignore_ascii_case("C") {
            self.temperature_high * 9.0 / 5.0 + 32.0
        } else {
            self.temperature_high
        };

        match high_f {
            t if t < 40.0 => "cold",
            t if t < 55.0 => "cool",
            t if t < 70.0 => "mild",
            t if t < 85.0 => "warm",
            _ => "hot",
        }
    }

    /// One-paragraph description fed to knowledge retrieval
    #[must_use]
    pub fn describe(&self) -> String {
        let mut text = format!(
            "{} weather: temperatures between {:.0}°{unit} and {:.0}°{unit}. Conditions: {}.",
            capitalize(self.temperature_band()),
            self.temperature_low,
            self.temperature_high,
            self.conditions,
            unit = self.temperature_unit,
        );
        if let Some(pop) = self.max_precipitation_probability.filter(|p| *p > 0) {
            text.push_str(&format!(" Up to {pop}% chance of precipitation."));
        }
        text
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl fmt::Display for ForecastSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Temperatures: {:.0}°{unit} to {:.0}°{unit} ({})",
            self.temperature_low,
            self.temperature_high,
            self.temperature_band(),
            unit = self.temperature_unit,
        )?;
        writeln!(f, "Conditions: {}", self.conditions)?;
        if let Some(pop) = self.max_precipitation_probability {
            writeln!(f, "Chance of precipitation: up to {pop}%")?;
        }
        for period in self.periods.iter().take(MAX_DISPLAYED_PERIODS) {
            write!(
                f,
                "  - {}: {:.0}°{}, {}",
                period.name, period.temperature, period.temperature_unit, period.short_forecast
            )?;
            if !period.wind_speed.is_empty() {
                write!(f, ", wind {} {}", period.wind_speed, period.wind_direction)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(name: &str, start: &str, temp: f64, forecast: &str, pop: Option<u8>) -> ForecastPeriod {
        let start_time = DateTime::parse_from_rfc3339(start).unwrap();
        ForecastPeriod {
            name: name.to_string(),
            start_time,
            end_time: start_time + chrono::Duration::hours(12),
            is_daytime: start_time.format("%H").to_string() == "06",
            temperature: temp,
            temperature_unit: "F".to_string(),
            wind_speed: "10 mph".to_string(),
            wind_direction: "NW".to_string(),
            short_forecast: forecast.to_string(),
            precipitation_probability: pop,
        }
    }

    fn sample_periods() -> Vec<ForecastPeriod> {
        vec![
            period("Thursday", "2025-10-16T06:00:00-05:00", 70.0, "Sunny", Some(0)),
            period("Friday", "2025-10-17T06:00:00-05:00", 58.0, "Partly Sunny", Some(10)),
            period("Friday Night", "2025-10-17T18:00:00-05:00", 44.0, "Chance Showers", Some(40)),
            period("Saturday", "2025-10-18T06:00:00-05:00", 55.0, "Partly Sunny", None),
            period("Sunday", "2025-10-19T06:00:00-05:00", 61.0, "Sunny", None),
        ]
    }

    #[test]
    fn test_summary_covers_window_only() {
        let start = NaiveDate::from_ymd_opt(2025, 10, 17).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 10, 18).unwrap();
        let summary = ForecastSummary::from_periods(&sample_periods(), start, end).unwrap();

        assert_eq!(summary.periods.len(), 3);
        assert_eq!(summary.temperature_low, 44.0);
        assert_eq!(summary.temperature_high, 58.0);
        assert_eq!(summary.conditions, "Partly Sunny; Chance Showers");
        assert_eq!(summary.max_precipitation_probability, Some(40));
        assert_eq!(summary.temperature_band(), "mild");
    }

    #[test]
    fn test_summary_outside_horizon_is_none() {
        let start = NaiveDate::from_ymd_opt(2025, 10, 30).unwrap();
        assert!(ForecastSummary::from_periods(&sample_periods(), start, start).is_none());
    }

    #[test]
    fn test_date_range_text() {
        let start = NaiveDate::from_ymd_opt(2025, 10, 17).unwrap();
        let summary = ForecastSummary::from_periods(&sample_periods(), start, start).unwrap();
        assert_eq!(summary.date_range_text(), "Friday, October 17, 2025");

        let end = NaiveDate::from_ymd_opt(2025, 10, 18).unwrap();
        let summary = ForecastSummary::from_periods(&sample_periods(), start, end).unwrap();
        assert_eq!(
            summary.date_range_text(),
            "Friday, October 17 to Saturday, October 18, 2025"
        );
    }

    #[test]
    fn test_describe_and_display() {
        let start = NaiveDate::from_ymd_opt(2025, 10, 17).unwrap();
        let summary = ForecastSummary::from_periods(&sample_periods(), start, start).unwrap();

        let description = summary.describe();
        assert!(description.starts_with("Mild weather"));
        assert!(description.contains("40%"));

        let rendered = summary.to_string();
        assert!(rendered.contains("Temperatures: 44°F to 58°F"));
        assert!(rendered.contains("  - Friday Night: 44°F, Chance Showers, wind 10 mph NW"));
    }

    #[test]
    fn test_celsius_band() {
        let mut p = period("Today", "2025-01-10T06:00:00+00:00", 2.0, "Snow", Some(80));
        p.temperature_unit = "C".to_string();
        let date = p.local_date();
        let summary = ForecastSummary::from_periods(&[p], date, date).unwrap();
        assert_eq!(summary.temperature_band(), "cold");
    }
}
