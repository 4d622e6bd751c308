//! Binary entry point for crimegraph.
//!
//! Asks questions of the crime-investigation graph from the command line.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use crimegraph::config::CrimeGraphConfig;
use crimegraph::llm::build_llm_provider;
use crimegraph::models::{Answer, Conversation};
use crimegraph::observability;
use crimegraph::services::{GraphRagService, Overview, OverviewService};
use crimegraph::storage::{GraphDatastore, InMemoryDatastore, Neo4jHttpDatastore, ResilientDatastore};
use std::io::{BufRead, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

/// Crimegraph - question answering over a crime-investigation knowledge graph.
#[derive(Parser)]
#[command(name = "crimegraph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Run against an empty in-memory graph instead of Neo4j.
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Ask a single question.
    Ask {
        /// The question.
        question: String,
    },

    /// Start an interactive session that remembers earlier turns.
    Chat,

    /// Show graph totals, hotspots, crime types, recent crimes and activity patterns.
    Overview,

    /// Manage configuration.
    Config {
        /// Show current configuration (secrets redacted).
        #[arg(long)]
        show: bool,
    },
}

/// Turns passed to the service as history in chat mode.
const CHAT_HISTORY_WINDOW: usize = 10;

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize observability: {e}");
        return ExitCode::FAILURE;
    }

    // Overrides warn about bad values, so they run once a subscriber exists.
    let config = config.with_env_overrides();

    match run_command(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(cli: Cli, config: CrimeGraphConfig) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Ask { question } => cmd_ask(&config, cli.offline, &question),
        Commands::Chat => cmd_chat(&config, cli.offline),
        Commands::Overview => cmd_overview(&config, cli.offline),
        Commands::Config { show } => cmd_config(&config, show),
    }
}

/// Loads configuration.
fn load_config(path: Option<&str>) -> Result<CrimeGraphConfig, Box<dyn std::error::Error>> {
    if let Some(config_path) = path {
        return CrimeGraphConfig::load_from_file(Path::new(config_path))
            .map_err(std::convert::Into::into);
    }
    Ok(CrimeGraphConfig::load_default())
}

/// Builds the datastore: Neo4j behind a circuit breaker, or an empty graph offline.
fn build_datastore(
    config: &CrimeGraphConfig,
    offline: bool,
) -> Result<Arc<dyn GraphDatastore>, Box<dyn std::error::Error>> {
    if offline {
        tracing::info!("Offline mode, using an empty in-memory graph");
        return Ok(Arc::new(InMemoryDatastore::new()));
    }
    let neo4j = Neo4jHttpDatastore::new(&config.datastore)?;
    Ok(Arc::new(ResilientDatastore::new(neo4j, config.datastore.breaker())))
}

fn build_service(
    config: &CrimeGraphConfig,
    offline: bool,
) -> Result<GraphRagService, Box<dyn std::error::Error>> {
    let datastore = build_datastore(config, offline)?;
    let llm = build_llm_provider(&config.llm);
    Ok(GraphRagService::new(datastore, llm, config.retrieval.clone()))
}

/// Answers one question.
fn cmd_ask(
    config: &CrimeGraphConfig,
    offline: bool,
    question: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = build_service(config, offline)?;
    let answer = service.answer(question, &[]);
    print_answer(&answer);
    Ok(())
}

/// Runs the interactive session.
fn cmd_chat(config: &CrimeGraphConfig, offline: bool) -> Result<(), Box<dyn std::error::Error>> {
    let service = build_service(config, offline)?;
    let mut conversation = Conversation::new();
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    println!("Ask about crimes, suspects, organizations or locations. Type 'exit' to quit.");
    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }

        let answer = service.answer(question, conversation.window(CHAT_HISTORY_WINDOW));
        print_answer(&answer);
        println!();

        conversation.push_user(question);
        conversation.push_assistant(answer.answer);
    }
    Ok(())
}

/// Prints the overview report.
fn cmd_overview(config: &CrimeGraphConfig, offline: bool) -> Result<(), Box<dyn std::error::Error>> {
    let datastore = build_datastore(config, offline)?;
    let overview = OverviewService::new(datastore).overview()?;
    print_overview(&overview);
    Ok(())
}

/// Shows configuration.
fn cmd_config(config: &CrimeGraphConfig, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        print!("{}", config.to_redacted_toml()?);
    } else {
        match CrimeGraphConfig::default_path() {
            Some(path) => println!("Config file: {}", path.display()),
            None => println!("No config directory available on this platform"),
        }
        println!("Use --show to print the effective configuration");
    }
    Ok(())
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.answer);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources: {}", answer.sources.join(", "));
    }
}

fn print_overview(overview: &Overview) {
    let totals = &overview.totals;
    println!("Graph totals");
    println!("  Crimes:      {}", totals.crimes);
    println!("  Persons:     {}", totals.persons);
    println!("  Locations:   {}", totals.locations);
    println!("  Connections: {}", totals.connections);

    println!();
    println!("Crime hotspots");
    for hotspot in &overview.hotspots {
        println!("  {:<30} {}", hotspot.location, hotspot.crimes);
    }

    println!();
    println!("Crime types");
    for crime_type in &overview.crime_types {
        println!("  {:<30} {}", crime_type.crime_type, crime_type.count);
    }

    println!();
    println!("Recent activity");
    for crime in &overview.recent_crimes {
        println!(
            "  {} {} {} at {}",
            crime.date.as_deref().unwrap_or("-"),
            crime.time.as_deref().unwrap_or("-"),
            crime.crime_type,
            crime.location.as_deref().unwrap_or("unknown location")
        );
    }

    println!();
    println!("Crimes by hour");
    for hour in &overview.hourly_pattern {
        println!("  {}:00  {}", hour.hour, hour.count);
    }

    println!();
    println!("Crime types sharing offenders");
    for pair in &overview.type_correlation {
        println!("  {} + {}  {}", pair.type1, pair.type2, pair.correlation);
    }
}
