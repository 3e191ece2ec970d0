//! `TravelPack` - weather-aware packing advice for US trips
//!
//! A query such as "What should I pack for Chicago in 7 days?" is
//! interpreted, resolved to a place and a date, checked against the
//! supported region, forecast through the National Weather Service, matched
//! against a packing-guideline corpus and finally turned into a categorised
//! packing list.

pub mod api;
pub mod cache;
pub mod cli;
pub mod composer;
pub mod config;
pub mod date_resolver;
pub mod error;
pub mod interpreter;
pub mod knowledge;
pub mod llm;
pub mod location_resolver;
pub mod models;
pub mod orchestrator;
pub mod prompts;
pub mod weather;

// Re-export core types for public API
pub use api::{GeocodingClient, GeocodingResult, LocationInput, LocationParser};
pub use cache::PersistentCache;
pub use config::TravelPackConfig;
pub use date_resolver::{DateResolver, calculate_future_date};
pub use error::{ErrorCode, ErrorKind, PipelineError, TravelPackError};
pub use interpreter::{HeuristicInterpreter, LlmInterpreter, QueryInterpreter, TripRequest};
pub use location_resolver::LocationResolver;
pub use models::{ForecastSummary, Location, Recommendation, ResolvedTrip};
pub use orchestrator::{Orchestrator, Outcome, QueryReport, Stage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, TravelPackError>;
