//! Recommendation composer
//!
//! The destination header and weather summary come straight from the
//! resolved trip and forecast. Only the packing list and tips are written by
//! the chat model, which is asked for JSON; prose replies are salvaged line by
//! line so the result is always categorised.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::PipelineError;
use crate::knowledge::ScoredSnippet;
use crate::llm::{CompletionRequest, LlmClient, Message};
use crate::models::{ForecastSummary, PackingCategory, Recommendation, ResolvedTrip};
use crate::prompts::{COMPOSER_SYSTEM_PROMPT, composer_user_prompt};

/// Category used when the reply is not the requested JSON
pub const FALLBACK_CATEGORY: &str = "Recommended Items";

static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•+]|\d{1,2}[.)])\s+(.+)$").expect("valid list marker regex")
});

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("valid code fence regex")
});

#[derive(Debug, Deserialize)]
struct PackingReply {
    #[serde(default)]
    categories: Vec<PackingCategory>,
    #[serde(default)]
    tips: Vec<String>,
}

/// Categories and tips pulled out of a model reply
#[derive(Debug, Clone, PartialEq)]
pub struct PackingList {
    pub categories: Vec<PackingCategory>,
    pub tips: Vec<String>,
}

impl PackingList {
    /// Parse a model reply; `None` when nothing usable is in it
    #[must_use]
    pub fn from_reply(reply: &str) -> Option<Self> {
        Self::from_json(reply).or_else(|| Self::from_lines(reply))
    }

    fn from_json(reply: &str) -> Option<Self> {
        let body = CODE_FENCE
            .captures(reply)
            .and_then(|c| c.get(1))
            .map_or(reply, |m| m.as_str());
        let start = body.find('{')?;
        let end = body.rfind('}')?;
        if end < start {
            return None;
        }

        let parsed: PackingReply = match serde_json::from_str(&body[start..=end]) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Packing reply is not valid JSON: {}", e);
                return None;
            }
        };

        let categories: Vec<PackingCategory> = parsed
            .categories
            .into_iter()
            .map(|c| PackingCategory {
                name: c.name.trim().to_string(),
                items: clean_lines(c.items),
            })
            .filter(|c| !c.name.is_empty() && !c.items.is_empty())
            .collect();

        (!categories.is_empty()).then(|| Self {
            categories,
            tips: clean_lines(parsed.tips),
        })
    }

    /// Bullet or numbered lines, else every non-heading line
    fn from_lines(reply: &str) -> Option<Self> {
        let bullets: Vec<String> = reply
            .lines()
            .filter_map(|line| LIST_MARKER.captures(line))
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect();

        let items = if bullets.is_empty() {
            reply
                .lines()
                .map(str::trim)
                .filter(|line| !line.starts_with('#') && !line.starts_with("```"))
                .map(str::to_string)
                .collect()
        } else {
            bullets
        };

        let items = clean_lines(items);
        (!items.is_empty()).then(|| Self {
            categories: vec![PackingCategory {
                name: FALLBACK_CATEGORY.to_string(),
                items,
            }],
            tips: Vec::new(),
        })
    }
}

fn clean_lines(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| line.trim().trim_matches('*').trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Turns a trip, its forecast and retrieved guidelines into a [`Recommendation`]
pub struct Composer {
    client: Arc<dyn LlmClient>,
    max_tokens: u32,
}

impl Composer {
    pub fn new(client: Arc<dyn LlmClient>, max_tokens: u32) -> Self {
        Self { client, max_tokens }
    }

    #[instrument(skip_all, fields(destination = %trip.location_name))]
    pub async fn compose(
        &self,
        query: &str,
        trip: &ResolvedTrip,
        forecast: &ForecastSummary,
        snippets: &[ScoredSnippet],
    ) -> Result<Recommendation, PipelineError> {
        let request = CompletionRequest {
            system_prompt: COMPOSER_SYSTEM_PROMPT.to_string(),
            messages: vec![Message::user(composer_user_prompt(
                query, trip, forecast, snippets,
            ))],
            tools: Vec::new(),
            tool_choice: None,
            max_tokens: self.max_tokens,
        };

        let response = self.client.complete(request).await.map_err(|e| {
            warn!("Composer call to {} failed: {}", self.client.model(), e);
            PipelineError::reasoning(format!("composer call failed: {e}"))
        })?;

        let reply = response.content.unwrap_or_default();
        let list = PackingList::from_reply(&reply)
            .ok_or_else(|| PipelineError::reasoning("composer returned an empty reply"))?;

        let recommendation = Recommendation {
            destination: trip.location_name.clone(),
            target_date: trip.target_date,
            weather: forecast.clone(),
            categories: list.categories,
            tips: list.tips,
        };
        info!(
            "Composed {} items in {} categories",
            recommendation.item_count(),
            recommendation.categories.len()
        );
        Ok(recommendation)
    }
}
