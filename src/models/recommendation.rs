//! The packing recommendation returned for a completed query

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ForecastSummary;

/// Named group of items, e.g. "Outerwear"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackingCategory {
    pub name: String,
    pub items: Vec<String>,
}

/// Final packing advice for one trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub destination: String,
    pub target_date: NaiveDate,
    pub weather: ForecastSummary,
    /// Never empty once built by the composer
    pub categories: Vec<PackingCategory>,
    pub tips: Vec<String>,
}

impl Recommendation {
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.categories.iter().map(|c| c.items.len()).sum()
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## Destination & Dates")?;
        writeln!(f, "{}", self.destination)?;
        writeln!(f, "{}", self.weather.date_range_text())?;
        writeln!(f)?;

        writeln!(f, "## Weather Summary")?;
        write!(f, "{}", self.weather)?;
        writeln!(f)?;

        writeln!(f, "## Packing Recommendations")?;
        for category in &self.categories {
            writeln!(f, "### {}", category.name)?;
            for item in &category.items {
                writeln!(f, "- {item}")?;
            }
        }

        if !self.tips.is_empty() {
            writeln!(f)?;
            writeln!(f, "## Additional Tips")?;
            for tip in &self.tips {
                writeln!(f, "- {tip}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ForecastPeriod;
    use chrono::DateTime;

    fn summary() -> ForecastSummary {
        let start_time = DateTime::parse_from_rfc3339("2025-10-17T06:00:00-05:00").unwrap();
        let period = ForecastPeriod {
            name: "Friday".to_string(),
            start_time,
            end_time: start_time + chrono::Duration::hours(12),
            is_daytime: true,
            temperature: 52.0,
            temperature_unit: "F".to_string(),
            wind_speed: "15 mph".to_string(),
            wind_direction: "W".to_string(),
            short_forecast: "Breezy".to_string(),
            precipitation_probability: None,
        };
        let date = period.local_date();
        ForecastSummary::from_periods(&[period], date, date).unwrap()
    }

    #[test]
    fn test_display_sections() {
        let recommendation = Recommendation {
            destination: "Chicago, Illinois".to_string(),
            target_date: NaiveDate::from_ymd_opt(2025, 10, 17).unwrap(),
            weather: summary(),
            categories: vec![PackingCategory {
                name: "Outerwear".to_string(),
                items: vec!["Windproof jacket".to_string(), "Light scarf".to_string()],
            }],
            tips: vec!["Layer up for the lakefront wind.".to_string()],
        };

        let text = recommendation.to_string();
        assert!(text.contains("## Destination & Dates\nChicago, Illinois"));
        assert!(text.contains("## Weather Summary"));
        assert!(text.contains("### Outerwear\n- Windproof jacket\n- Light scarf"));
        assert!(text.contains("## Additional Tips"));
        assert_eq!(recommendation.item_count(), 2);
    }

    #[test]
    fn test_display_omits_empty_tips() {
        let recommendation = Recommendation {
            destination: "Denver, Colorado".to_string(),
            target_date: NaiveDate::from_ymd_opt(2025, 10, 17).unwrap(),
            weather: summary(),
            categories: vec![PackingCategory {
                name: "Recommended Items".to_string(),
                items: vec!["Fleece".to_string()],
            }],
            tips: Vec::new(),
        };
        assert!(!recommendation.to_string().contains("Additional Tips"));
    }
}
