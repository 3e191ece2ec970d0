//! Query pipeline
//!
//! One query moves through interpretation, location and date resolution,
//! forecast fetch, knowledge retrieval and composition. Each step either
//! hands its output to the next or stops the query with a [`PipelineError`].
//! Ambiguous input ends in a clarification request; everything else that
//! stops early ends with a fixed message. The session continues either way.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use crate::composer::Composer;
use crate::date_resolver::{DateResolver, calculate_future_date};
use crate::interpreter::{QueryInterpreter, TripRequest};
use crate::knowledge::Retriever;
use crate::location_resolver::LocationResolver;
use crate::models::{Recommendation, ResolvedTrip};
use crate::weather::{ForecastProvider, fetch_forecast_summary};
use crate::{ErrorKind, PipelineError};

/// Pipeline states, recorded in visiting order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingInput,
    Interpreting,
    ResolvingLocation,
    ResolvingDate,
    FetchingForecast,
    RetrievingKnowledge,
    Composing,
    Done,
    /// Ambiguous input; the user is asked for more detail
    Clarifying,
    /// Stopped with a fixed message before a recommendation
    Declined,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::AwaitingInput => "awaiting input",
            Stage::Interpreting => "interpreting",
            Stage::ResolvingLocation => "resolving location",
            Stage::ResolvingDate => "resolving date",
            Stage::FetchingForecast => "fetching forecast",
            Stage::RetrievingKnowledge => "retrieving knowledge",
            Stage::Composing => "composing",
            Stage::Done => "done",
            Stage::Clarifying => "clarifying",
            Stage::Declined => "declined",
        };
        f.write_str(name)
    }
}

/// How a query ended
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Recommendation(Box<Recommendation>),
    /// Ambiguous date or location
    Clarification(PipelineError),
    /// Unsupported region, unavailable forecast or reasoning failure
    Declined(PipelineError),
}

impl Outcome {
    fn from_error(error: PipelineError) -> Self {
        if error.kind().needs_clarification() {
            Outcome::Clarification(error)
        } else {
            Outcome::Declined(error)
        }
    }

    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Outcome::Recommendation(_) => None,
            Outcome::Clarification(e) | Outcome::Declined(e) => Some(e.kind()),
        }
    }

    /// Text shown to the user
    #[must_use]
    pub fn response_text(&self) -> String {
        match self {
            Outcome::Recommendation(recommendation) => recommendation.to_string(),
            Outcome::Clarification(e) | Outcome::Declined(e) => e.user_message(),
        }
    }

    fn terminal_stage(&self) -> Stage {
        match self {
            Outcome::Recommendation(_) => Stage::Done,
            Outcome::Clarification(_) => Stage::Clarifying,
            Outcome::Declined(_) => Stage::Declined,
        }
    }
}

/// Result of one query plus the stages it passed through
#[derive(Debug, Clone)]
pub struct QueryReport {
    pub outcome: Outcome,
    pub trace: Vec<Stage>,
    /// Set once both location and date were resolved
    pub trip: Option<ResolvedTrip>,
}

impl QueryReport {
    #[must_use]
    pub fn visited(&self, stage: Stage) -> bool {
        self.trace.contains(&stage)
    }

    #[must_use]
    pub fn response_text(&self) -> String {
        self.outcome.response_text()
    }
}

/// Sequences the pipeline for one query at a time
pub struct Orchestrator {
    interpreter: Arc<dyn QueryInterpreter>,
    locations: LocationResolver,
    forecasts: Arc<dyn ForecastProvider>,
    retriever: Retriever,
    composer: Composer,
    window_days: u32,
}

impl Orchestrator {
    pub fn new(
        interpreter: Arc<dyn QueryInterpreter>,
        locations: LocationResolver,
        forecasts: Arc<dyn ForecastProvider>,
        retriever: Retriever,
        composer: Composer,
        window_days: u32,
    ) -> Self {
        Self {
            interpreter,
            locations,
            forecasts,
            retriever,
            composer,
            window_days,
        }
    }

    /// Answer one query, resolving relative dates against `today`
    #[instrument(skip(self))]
    pub async fn handle_query(&self, query: &str, today: NaiveDate) -> QueryReport {
        let start_time = Instant::now();
        let mut trace = vec![Stage::AwaitingInput];
        let mut trip = None;

        let outcome = match self.run(query, today, &mut trace, &mut trip).await {
            Ok(recommendation) => Outcome::Recommendation(Box::new(recommendation)),
            Err(error) => {
                warn!(
                    "Query stopped at {} with {:?}: {}",
                    trace.last().copied().unwrap_or(Stage::AwaitingInput),
                    error.kind(),
                    error
                );
                Outcome::from_error(error)
            }
        };
        trace.push(outcome.terminal_stage());

        info!(
            "Query finished ({}) in {:.3}s",
            outcome.terminal_stage(),
            start_time.elapsed().as_secs_f64()
        );
        QueryReport {
            outcome,
            trace,
            trip,
        }
    }

    async fn run(
        &self,
        query: &str,
        today: NaiveDate,
        trace: &mut Vec<Stage>,
        resolved: &mut Option<ResolvedTrip>,
    ) -> Result<Recommendation, PipelineError> {
        if query.trim().is_empty() {
            return Err(PipelineError::AmbiguousLocation { candidate: None });
        }

        trace.push(Stage::Interpreting);
        let request = self.interpreter.interpret(query).await?;
        debug!("{} interpreter produced {:?}", self.interpreter.name(), request);

        trace.push(Stage::ResolvingLocation);
        let location_text = request
            .location
            .as_deref()
            .ok_or(PipelineError::AmbiguousLocation { candidate: None })?;
        let location = self.locations.resolve_location(location_text).await?;

        trace.push(Stage::ResolvingDate);
        let target_date = resolve_date(&request, query, today)?;
        let trip = ResolvedTrip::new(&location, target_date);
        info!(
            "Resolved trip: {} on {} ({:.4}, {:.4})",
            trip.location_name, trip.target_date, trip.latitude, trip.longitude
        );
        *resolved = Some(trip.clone());

        trace.push(Stage::FetchingForecast);
        let forecast =
            fetch_forecast_summary(self.forecasts.as_ref(), &trip, self.window_days).await?;

        trace.push(Stage::RetrievingKnowledge);
        let snippets = self
            .retriever
            .retrieve(&forecast.describe())
            .await
            .map_err(|e| PipelineError::reasoning(format!("knowledge retrieval failed: {e}")))?;

        trace.push(Stage::Composing);
        self.composer
            .compose(query, &trip, &forecast, &snippets)
            .await
    }
}

/// The interpreter's time expression wins, then an explicit day count, then
/// the raw query text.
fn resolve_date(
    request: &TripRequest,
    query: &str,
    today: NaiveDate,
) -> Result<NaiveDate, PipelineError> {
    let resolver = DateResolver::new(today);

    if let Some(when) = request.when.as_deref() {
        match resolver.resolve(when) {
            Ok(date) => return Ok(date),
            Err(e) if request.days_from_now.is_none() => return Err(e),
            Err(_) => {}
        }
    }

    if let Some(days) = request.days_from_now {
        return calculate_future_date(today, days).ok_or_else(|| PipelineError::AmbiguousDate {
            expression: Some(format!("{days} days from now")),
        });
    }

    resolver.resolve(query)
}
