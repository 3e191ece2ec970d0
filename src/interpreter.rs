//! Query interpretation
//!
//! Pulls the destination and the time expression out of a free-text request.
//! Date arithmetic never happens here; [`crate::date_resolver`] owns it.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::PipelineError;
use crate::llm::{CompletionRequest, LlmClient, Message};
use crate::prompts::{INTERPRETER_SYSTEM_PROMPT, TRIP_TOOL_NAME, trip_request_tool};

/// What a query asks about, before any resolution
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TripRequest {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default)]
    pub days_from_now: Option<i64>,
}

impl TripRequest {
    /// Drop blank strings and placeholder values models like to emit
    fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .filter(|v| {
                    !matches!(
                        v.to_ascii_lowercase().as_str(),
                        "null" | "none" | "unknown" | "n/a"
                    )
                })
        }

        Self {
            location: clean(self.location),
            when: clean(self.when),
            days_from_now: self.days_from_now,
        }
    }
}

#[async_trait]
pub trait QueryInterpreter: Send + Sync {
    async fn interpret(&self, query: &str) -> Result<TripRequest, PipelineError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Build the interpreter selected by `agent.interpreter`
pub fn create_interpreter(
    kind: &str,
    client: Arc<dyn LlmClient>,
    max_tokens: u32,
) -> anyhow::Result<Arc<dyn QueryInterpreter>> {
    match kind {
        "llm" => Ok(Arc::new(LlmInterpreter::new(client, max_tokens))),
        "heuristic" => Ok(Arc::new(HeuristicInterpreter)),
        other => anyhow::bail!("Unknown interpreter: '{other}'. Supported: llm, heuristic"),
    }
}

/// Extraction through a single forced tool call
pub struct LlmInterpreter {
    client: Arc<dyn LlmClient>,
    max_tokens: u32,
}

impl LlmInterpreter {
    pub fn new(client: Arc<dyn LlmClient>, max_tokens: u32) -> Self {
        Self { client, max_tokens }
    }
}

#[async_trait]
impl QueryInterpreter for LlmInterpreter {
    #[instrument(skip(self))]
    async fn interpret(&self, query: &str) -> Result<TripRequest, PipelineError> {
        let request = CompletionRequest {
            system_prompt: INTERPRETER_SYSTEM_PROMPT.to_string(),
            messages: vec![Message::user(query)],
            tools: vec![trip_request_tool()],
            tool_choice: Some(TRIP_TOOL_NAME.to_string()),
            max_tokens: self.max_tokens.min(300),
        };

        let response = self.client.complete(request).await.map_err(|e| {
            warn!("Interpreter call to {} failed: {}", self.client.model(), e);
            PipelineError::reasoning(format!("interpreter call failed: {e}"))
        })?;

        let parsed = if let Some(call) = response.tool_call(TRIP_TOOL_NAME) {
            serde_json::from_value::<TripRequest>(call.input.clone())
        } else if let Some(content) = response.content.as_deref() {
            // some compatible endpoints ignore tool_choice and answer in text
            serde_json::from_str::<TripRequest>(content.trim())
        } else {
            return Err(PipelineError::reasoning(
                "interpreter returned neither a tool call nor text",
            ));
        };

        let trip = parsed
            .map_err(|e| PipelineError::reasoning(format!("malformed trip request: {e}")))?
            .normalized();
        debug!("Interpreted query: {:?}", trip);
        Ok(trip)
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

/// Rule-based extraction that needs no credentials.
///
/// The location is the run of capitalised words after the first travel
/// preposition, optionally followed by a `, ST` qualifier. The whole query
/// is handed on as the time expression.
pub struct HeuristicInterpreter;

const PREPOSITIONS: [&str; 8] = ["to", "for", "in", "at", "visiting", "visit", "near", "around"];

/// Capitalised words that are never part of a place name
const NON_PLACE_WORDS: &[&str] = &[
    "i", "i'm", "im", "i'll", "we", "we're", "my", "it", "is", "can", "will", "do", "does", "any",
    "the", "a", "hi", "hello", "hey", "please", "what", "where", "when", "how", "help", "should",
    "going", "trip", "weather", "pack", "packing", "wear", "next", "this", "today", "tomorrow",
    "tonight", "weekend", "week", "monday", "tuesday", "wednesday", "thursday", "friday",
    "saturday", "sunday", "january", "february", "march", "april", "june", "july", "august",
    "september", "october", "november", "december",
];

fn is_non_place_word(word: &str) -> bool {
    NON_PLACE_WORDS.contains(&word.to_lowercase().as_str())
}

fn strip_punctuation(token: &str) -> &str {
    token.trim_matches(|c: char| matches!(c, '?' | '!' | '.' | '"' | '\'' | '(' | ')' | ';' | ':'))
}

fn is_capitalised(word: &str) -> bool {
    word.chars().next().is_some_and(char::is_uppercase)
}

fn looks_like_coordinates(word: &str) -> bool {
    let mut parts = word.split(',');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(lat), Some(lon), None)
            if lat.trim().parse::<f64>().is_ok() && lon.trim().parse::<f64>().is_ok()
    )
}

fn looks_like_zip(word: &str) -> bool {
    let digits = word.split('-').next().unwrap_or(word);
    digits.len() == 5 && digits.chars().all(|c| c.is_ascii_digit())
}

impl HeuristicInterpreter {
    /// Place name starting at `tokens[start]`, if one begins there
    fn place_at(tokens: &[&str], start: usize) -> Option<String> {
        let first = strip_punctuation(tokens.get(start)?);
        if looks_like_coordinates(first) || looks_like_zip(first) {
            return Some(first.trim_end_matches(',').to_string());
        }

        let mut words: Vec<String> = Vec::new();
        let mut qualifier_next = false;
        for raw in &tokens[start..] {
            let word = strip_punctuation(raw);
            let ends_clause = raw.ends_with(',');
            let word = word.trim_end_matches(',');

            if word.is_empty() || !is_capitalised(word) || is_non_place_word(word) {
                break;
            }

            if qualifier_next {
                // "Portland, ME" or "Portland, Maine"
                let last = words.len() - 1;
                words[last].push(',');
                words.push(word.to_string());
                break;
            }

            words.push(word.to_string());
            if ends_clause {
                qualifier_next = true;
            }
        }

        (!words.is_empty()).then(|| words.join(" "))
    }

    fn extract_location(query: &str) -> Option<String> {
        let tokens: Vec<&str> = query.split_whitespace().collect();

        let after_preposition = tokens.iter().enumerate().find_map(|(i, token)| {
            let word = strip_punctuation(token).to_lowercase();
            if PREPOSITIONS.contains(&word.as_str()) {
                Self::place_at(&tokens, i + 1)
            } else {
                None
            }
        });
        if after_preposition.is_some() {
            return after_preposition;
        }

        // "Chicago in 7 days?" with no preposition before the place
        (0..tokens.len()).find_map(|i| Self::place_at(&tokens, i))
    }
}

#[async_trait]
impl QueryInterpreter for HeuristicInterpreter {
    async fn interpret(&self, query: &str) -> Result<TripRequest, PipelineError> {
        let trip = TripRequest {
            location: Self::extract_location(query),
            when: Some(query.to_string()),
            days_from_now: None,
        }
        .normalized();
        debug!("Heuristically interpreted query: {:?}", trip);
        Ok(trip)
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}
