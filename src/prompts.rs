//! Prompt text and tool schemas sent to the chat model

use serde_json::json;

use crate::knowledge::ScoredSnippet;
use crate::llm::ToolDefinition;
use crate::models::{ForecastSummary, ResolvedTrip};

/// Name of the forced extraction tool
pub const TRIP_TOOL_NAME: &str = "record_trip_request";

pub const INTERPRETER_SYSTEM_PROMPT: &str = "\
You extract travel details from a single message sent to a packing assistant.

Call the record_trip_request tool exactly once.
- location: the destination exactly as the user wrote it, including any state or \
country qualifier (\"Portland, Maine\", \"Paris\"). Use null if no destination is named.
- when: the time expression exactly as written (\"in 7 days\", \"next weekend\", \
\"October 20\"). Use null if the user gives no timing.
- days_from_now: an integer only when the user states an explicit count of days or \
weeks from today; otherwise null.

Never invent a destination or a date, and never convert expressions into calendar dates.";

pub const COMPOSER_SYSTEM_PROMPT: &str = "\
You are TravelPack, an expert wardrobe consultant and packing advisor.

You receive a confirmed destination, travel dates, a weather forecast from the US \
National Weather Service and a set of packing guidelines. Recommend what to pack \
for the forecast conditions.

Be specific and practical: name concrete clothing items (\"waterproof shell jacket\", \
\"light merino sweater\"), describe layering when temperatures vary, and include \
footwear and accessories such as umbrellas, sunglasses or hats where the weather \
calls for them. Base every suggestion on the forecast provided; do not assume \
conditions that are not in it.

Reply with a single JSON object and nothing else:
{\"categories\": [{\"name\": \"Clothing\", \"items\": [\"...\"]}], \"tips\": [\"...\"]}
Use three to six categories such as Clothing, Outerwear, Footwear, Accessories and \
Essentials. Tips are short sentences of travel advice for these conditions.";

/// Parameters schema for [`TRIP_TOOL_NAME`]
#[must_use]
pub fn trip_request_tool() -> ToolDefinition {
    ToolDefinition::new(
        TRIP_TOOL_NAME,
        "Record the destination and timing mentioned in the user's travel request.",
        json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": ["string", "null"],
                    "description": "Destination as written by the user, or null"
                },
                "when": {
                    "type": ["string", "null"],
                    "description": "Time expression as written by the user, or null"
                },
                "days_from_now": {
                    "type": ["integer", "null"],
                    "description": "Explicit number of days from today, or null"
                }
            },
            "required": ["location", "when", "days_from_now"],
            "additionalProperties": false
        }),
    )
}

/// User message for the composer: weather, retrieved guidelines, then the question
#[must_use]
pub fn composer_user_prompt(
    query: &str,
    trip: &ResolvedTrip,
    forecast: &ForecastSummary,
    snippets: &[ScoredSnippet],
) -> String {
    let guidelines = if snippets.is_empty() {
        "(no specific guidelines retrieved)".to_string()
    } else {
        snippets
            .iter()
            .map(|s| format!("[{}]\n{}", s.snippet.section, s.snippet.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    format!(
        "Destination: {destination}\nDates: {dates}\n\nWeather Information:\n{forecast}\n\
         Relevant Wardrobe Guidelines:\n{guidelines}\n\nUser Query: {query}",
        destination = trip.location_name,
        dates = forecast.date_range_text(),
    )
}
