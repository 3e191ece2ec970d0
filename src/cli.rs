//! Command-line surface: argument parsing, pipeline assembly and the
//! interactive loop

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, info, warn};

use crate::api::GeocodingClient;
use crate::cache::PersistentCache;
use crate::composer::Composer;
use crate::config::TravelPackConfig;
use crate::interpreter::create_interpreter;
use crate::knowledge::{Corpus, Retriever};
use crate::llm::{create_client, create_embedder};
use crate::location_resolver::LocationResolver;
use crate::orchestrator::Orchestrator;
use crate::weather::NwsClient;

/// Weather-aware packing advice for trips within the United States
#[derive(Debug, Parser)]
#[command(name = "travelpack", version, about, long_about = None)]
pub struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// How queries are interpreted (overrides agent.interpreter)
    #[arg(long, value_parser = ["llm", "heuristic"])]
    pub interpreter: Option<String>,

    /// Treat this date as today when resolving relative dates
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub date: Option<NaiveDate>,

    /// Answer a single query and exit; starts the interactive loop when omitted
    #[arg(trailing_var_arg = true, value_name = "QUERY")]
    pub query: Vec<String>,
}

impl Args {
    /// The one-shot query, if any words were given
    #[must_use]
    pub fn one_shot_query(&self) -> Option<String> {
        let query = self.query.join(" ");
        let query = query.trim();
        (!query.is_empty()).then(|| query.to_string())
    }
}

pub const BANNER: &str = "\
==============================================
  TravelPack - weather-aware packing advice
==============================================";

pub const HELP_TEXT: &str = "\
Ask what to pack for a trip, naming a destination and when you travel.

Examples:
  What should I pack for Chicago in 7 days?
  I'm going to Miami next weekend, what should I wear?
  Help me pack for San Francisco 10 days from now

Dates: 'tomorrow', 'in 5 days', 'next weekend', 'Friday', 'October 20', 2025-10-20.
Forecasts come from the US National Weather Service, so US locations only,
up to about a week ahead.

Commands:
  help         Show this message
  quit, exit   Leave TravelPack";

pub const GOODBYE: &str = "Thanks for using TravelPack! Safe travels!";

/// Wire the pipeline from configuration.
///
/// Nothing here talks to the network; a missing API key only surfaces when
/// a query first needs the model.
pub fn build_orchestrator(
    config: &TravelPackConfig,
    interpreter_override: Option<&str>,
) -> Result<Orchestrator> {
    let geocoder = Arc::new(
        GeocodingClient::new(&config.geocoding, &config.weather.user_agent)
            .context("Failed to create geocoding client")?,
    );
    let locations = LocationResolver::new(geocoder, &config.geocoding.supported_country_codes);
    let forecasts = Arc::new(NwsClient::new(&config.weather).context("Failed to create NWS client")?);

    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    let embedder = create_embedder(&config.llm, &config.embedding)
        .context("Failed to create embedding client")?;

    let interpreter_kind = interpreter_override.unwrap_or(&config.agent.interpreter);
    let interpreter = create_interpreter(interpreter_kind, llm.clone(), config.llm.max_tokens)?;
    info!("Using {} query interpreter", interpreter.name());

    let corpus_path = config.knowledge.corpus_path.as_deref().map(PathBuf::from);
    let corpus = Arc::new(Corpus::load(corpus_path.as_deref())?);

    let cache = if config.cache.enabled {
        let location = config.cache.resolved_location();
        match PersistentCache::open(&location) {
            Ok(cache) => {
                debug!("Embedding cache at {}", location.display());
                Some(Arc::new(cache))
            }
            Err(e) => {
                warn!(
                    "Embedding cache unavailable at {}: {:#}",
                    location.display(),
                    e
                );
                None
            }
        }
    } else {
        None
    };

    let retriever = Retriever::new(
        corpus,
        embedder,
        cache,
        Duration::from_secs(u64::from(config.cache.ttl_hours) * 3600),
        config.knowledge.top_k as usize,
    );
    let composer = Composer::new(llm, config.llm.max_tokens);

    Ok(Orchestrator::new(
        interpreter,
        locations,
        forecasts,
        retriever,
        composer,
        config.weather.window_days,
    ))
}

/// A conversation with the pipeline, one query at a time
pub struct Session {
    orchestrator: Orchestrator,
    reference_date: Option<NaiveDate>,
}

impl Session {
    pub fn new(orchestrator: Orchestrator, reference_date: Option<NaiveDate>) -> Self {
        Self {
            orchestrator,
            reference_date,
        }
    }

    fn today(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| Local::now().date_naive())
    }

    /// Response text for one query
    pub async fn respond(&self, query: &str) -> String {
        let report = self.orchestrator.handle_query(query, self.today()).await;
        debug!("Stages visited: {:?}", report.trace);
        report.response_text()
    }

    /// Answer a single query on stdout
    pub async fn run_once(&self, query: &str) {
        println!("{}", self.respond(query).await);
    }

    /// Read-evaluate-respond loop until quit, Ctrl-C or Ctrl-D
    pub async fn run_interactive(&self) -> Result<()> {
        println!("{BANNER}");
        println!("{HELP_TEXT}");
        println!();

        let mut editor = DefaultEditor::new().context("Failed to initialise line editor")?;

        loop {
            match editor.readline("You: ") {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = editor.add_history_entry(input);

                    match input.to_ascii_lowercase().as_str() {
                        "quit" | "exit" => break,
                        "help" => {
                            println!("{HELP_TEXT}\n");
                            continue;
                        }
                        _ => {}
                    }

                    let response = self.respond(input).await;
                    println!("\nTravelPack:\n{response}\n");
                }
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(e) => return Err(e).context("Failed to read input"),
            }
        }

        println!("{GOODBYE}");
        Ok(())
    }
}
