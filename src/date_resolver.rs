//! Relative and absolute date expressions
//!
//! Turns phrases such as "in 7 days", "next weekend" or "Oct 20th" into a
//! calendar date relative to a reference day. Anything that cannot be read
//! without guessing is reported as [`PipelineError::AmbiguousDate`].

use std::sync::LazyLock;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use regex::Regex;
use tracing::debug;

use crate::PipelineError;

const NUMBER: &str = r"(\d+|a couple of|couple of|a|an|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve|thirteen|fourteen)";
const MONTH: &str = r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sept?(?:ember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("valid regex"));

static IN_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\bin\s+{NUMBER}\s+(day|week)s?\b")).expect("valid regex")
});

static COUNT_FROM_NOW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b{NUMBER}\s+(day|week)s?\s+(?:from\s+(?:now|today)|later|out)\b"
    ))
    .expect("valid regex")
});

static WEEKEND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:(this|next|coming)\s+)?weekend\b").expect("valid regex"));

static NEXT_WEEK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bnext\s+week\b").expect("valid regex"));

static WEEKDAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b")
        .expect("valid regex")
});

static MONTH_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b{MONTH}\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\b")).expect("valid regex")
});

static DAY_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?{MONTH}\b"))
        .expect("valid regex")
});

static SLASH_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})\b").expect("valid regex"));

/// Offset `reference` by a signed number of days.
///
/// Negative offsets produce past dates. Returns `None` only when the
/// result falls outside chrono's representable range.
#[must_use]
pub fn calculate_future_date(reference: NaiveDate, days: i64) -> Option<NaiveDate> {
    let magnitude = Days::new(days.unsigned_abs());
    if days >= 0 {
        reference.checked_add_days(magnitude)
    } else {
        reference.checked_sub_days(magnitude)
    }
}

/// Resolves date expressions against a fixed reference day
#[derive(Debug, Clone, Copy)]
pub struct DateResolver {
    reference: NaiveDate,
}

impl DateResolver {
    #[must_use]
    pub fn new(reference: NaiveDate) -> Self {
        Self { reference }
    }

    #[must_use]
    pub fn reference(&self) -> NaiveDate {
        self.reference
    }

    /// Resolve a free-text expression to an absolute date
    pub fn resolve(&self, expression: &str) -> Result<NaiveDate, PipelineError> {
        let text = expression.trim().to_lowercase();
        if text.is_empty() {
            return Err(PipelineError::AmbiguousDate { expression: None });
        }

        let ambiguous = || PipelineError::AmbiguousDate {
            expression: Some(expression.trim().to_string()),
        };

        let (date, rule) = self.match_expression(&text).ok_or_else(ambiguous)?;
        let date = date.ok_or_else(ambiguous)?;

        debug!(
            "Resolved date expression '{}' via {} to {} (reference {})",
            expression, rule, date, self.reference
        );
        Ok(date)
    }

    /// Rule that matched, with its result. An inner `None` means the rule
    /// matched but produced an impossible date such as February 30.
    fn match_expression(&self, text: &str) -> Option<(Option<NaiveDate>, &'static str)> {
        if let Some(caps) = ISO_DATE.captures(text) {
            let date = parse_ymd(&caps[1], &caps[2], &caps[3]);
            return Some((date, "iso date"));
        }

        if let Some(caps) = IN_COUNT.captures(text).or_else(|| COUNT_FROM_NOW.captures(text)) {
            let per_unit = if &caps[2] == "week" { 7 } else { 1 };
            let date = number_value(&caps[1])
                .and_then(|count| count.checked_mul(per_unit))
                .and_then(|days| self.reference.checked_add_days(Days::new(days)));
            return Some((date, "day offset"));
        }

        if text.contains("day after tomorrow") {
            return Some((calculate_future_date(self.reference, 2), "day after tomorrow"));
        }
        if text.contains("tomorrow") {
            return Some((calculate_future_date(self.reference, 1), "tomorrow"));
        }
        if contains_word(text, "today") || contains_word(text, "tonight") || text.contains("this evening")
        {
            return Some((Some(self.reference), "today"));
        }

        if let Some(caps) = WEEKEND.captures(text) {
            let date = match caps.get(1).map(|m| m.as_str()) {
                Some("next") => next_weekday(self.reference, Weekday::Sat),
                _ => self.this_weekend(),
            };
            return Some((Some(date), "weekend"));
        }

        if NEXT_WEEK.is_match(text) {
            return Some((calculate_future_date(self.reference, 7), "next week"));
        }

        if let Some(caps) = WEEKDAY.captures(text) {
            let weekday: Weekday = caps[1].parse().ok()?;
            return Some((Some(next_weekday(self.reference, weekday)), "weekday"));
        }

        if let Some(caps) = MONTH_DAY.captures(text) {
            return Some((self.month_day(&caps[1], &caps[2]), "month day"));
        }
        if let Some(caps) = DAY_MONTH.captures(text) {
            return Some((self.month_day(&caps[2], &caps[1]), "day month"));
        }
        if let Some(caps) = SLASH_DATE.captures(text) {
            let month: u32 = caps[1].parse().ok()?;
            let day: u32 = caps[2].parse().ok()?;
            return Some((self.upcoming(month, day), "month/day"));
        }

        None
    }

    /// Today on Saturday or Sunday, otherwise the coming Saturday
    fn this_weekend(&self) -> NaiveDate {
        match self.reference.weekday() {
            Weekday::Sat | Weekday::Sun => self.reference,
            _ => next_weekday(self.reference, Weekday::Sat),
        }
    }

    fn month_day(&self, month: &str, day: &str) -> Option<NaiveDate> {
        let month = month_number(month)?;
        let day: u32 = day.parse().ok()?;
        self.upcoming(month, day)
    }

    /// Month/day in the reference year, or the next year if already past
    fn upcoming(&self, month: u32, day: u32) -> Option<NaiveDate> {
        let this_year = NaiveDate::from_ymd_opt(self.reference.year(), month, day)?;
        if this_year >= self.reference {
            Some(this_year)
        } else {
            NaiveDate::from_ymd_opt(self.reference.year() + 1, month, day)
        }
    }
}

/// First `weekday` strictly after `reference`
fn next_weekday(reference: NaiveDate, weekday: Weekday) -> NaiveDate {
    let current = reference.weekday().num_days_from_monday();
    let target = weekday.num_days_from_monday();
    let ahead = match (target + 7 - current) % 7 {
        0 => 7,
        n => n,
    };
    reference + Days::new(u64::from(ahead))
}

fn parse_ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn contains_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|token| token == word)
}

fn number_value(word: &str) -> Option<u64> {
    let value = match word {
        "a" | "an" | "one" => 1,
        "a couple of" | "couple of" | "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        "thirteen" => 13,
        "fourteen" => 14,
        digits => return digits.parse().ok(),
    };
    Some(value)
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}
