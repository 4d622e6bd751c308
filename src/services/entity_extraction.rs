//! Lexical entity extraction.
//!
//! Finds the graph entities a question talks about without any model in the
//! loop:
//!
//! - **Locations** and **organizations** are matched against the names that
//!   actually exist in the graph (case-insensitive substring).
//! - **Person names** are guessed from pairs of adjacent capitalized tokens, or,
//!   in [`PersonNameMode::Validated`], kept only when the pair is a known
//!   `Person` name.
//! - **Crime types** come from a closed list of labels.
//!
//! The name universes are fetched once per question through
//! [`EntityExtractorService::fetch_universe`] and reused for the question and
//! every carried-over turn.
//!
//! # Example
//!
//! ```rust,ignore
//! use crimegraph::services::EntityExtractorService;
//!
//! let extractor = EntityExtractorService::new(datastore, PersonNameMode::Heuristic);
//! let universe = extractor.fetch_universe();
//! let entities = extractor.extract("Who operates in the Loop?", &universe);
//! assert_eq!(entities.locations, vec!["Loop"]);
//! ```

use crate::config::PersonNameMode;
use crate::models::CrimeType;
use crate::storage::{GraphDatastore, Params, Record};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Lists every location name.
pub const LOCATION_NAMES_STATEMENT: &str = "MATCH (l:Location) RETURN l.name AS name";

/// Lists every organization name.
pub const ORGANIZATION_NAMES_STATEMENT: &str = "MATCH (o:Organization) RETURN o.name AS name";

/// Lists every person name (validated person mode only).
pub const PERSON_NAMES_STATEMENT: &str = "MATCH (p:Person) RETURN DISTINCT p.name AS name";

/// Lowercased first tokens that never start a person name.
static PERSON_STOPLIST: &[&str] = &["i", "chicago", "det", "detective"];

// ============================================================================
// Name Universes
// ============================================================================

/// Outcome of fetching one name universe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameLookup {
    /// Names known to the graph.
    Found(Vec<String>),
    /// The lookup failed; matching against it yields nothing.
    Unavailable(String),
}

impl NameLookup {
    /// Returns the known names (empty when unavailable).
    #[must_use]
    pub fn names(&self) -> &[String] {
        match self {
            Self::Found(names) => names,
            Self::Unavailable(_) => &[],
        }
    }
}

/// The entity names fetched for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameUniverse {
    /// `Location` names.
    pub locations: NameLookup,
    /// `Organization` names.
    pub organizations: NameLookup,
    /// `Person` names, fetched only in validated person mode.
    pub persons: Option<NameLookup>,
}

impl NameUniverse {
    /// Builds a universe from in-memory name lists.
    #[must_use]
    pub fn from_names(locations: Vec<String>, organizations: Vec<String>) -> Self {
        Self {
            locations: NameLookup::Found(locations),
            organizations: NameLookup::Found(organizations),
            persons: None,
        }
    }

    /// Adds a known-person list.
    #[must_use]
    pub fn with_persons(mut self, persons: Vec<String>) -> Self {
        self.persons = Some(NameLookup::Found(persons));
        self
    }
}

// ============================================================================
// Extraction Result
// ============================================================================

/// Entities found in a piece of text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedEntities {
    /// Known location names mentioned in the text.
    pub locations: Vec<String>,
    /// Known organization names mentioned in the text.
    pub organizations: Vec<String>,
    /// Person-name candidates.
    pub persons: Vec<String>,
    /// Crime categories mentioned in the text.
    pub crime_types: Vec<CrimeType>,
}

impl ExtractedEntities {
    /// Appends another extraction, dropping names already present.
    ///
    /// Earlier entries keep their position, so merging the current question
    /// first gives it precedence over carried-over turns.
    pub fn merge(&mut self, other: Self) {
        merge_unique(&mut self.locations, other.locations);
        merge_unique(&mut self.organizations, other.organizations);
        merge_unique(&mut self.persons, other.persons);
        for crime_type in other.crime_types {
            if !self.crime_types.contains(&crime_type) {
                self.crime_types.push(crime_type);
            }
        }
    }

    /// Keeps at most `max` entries per category.
    pub fn truncate(&mut self, max: usize) {
        self.locations.truncate(max);
        self.organizations.truncate(max);
        self.persons.truncate(max);
        self.crime_types.truncate(max);
    }

    /// Returns whether nothing was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
            && self.organizations.is_empty()
            && self.persons.is_empty()
            && self.crime_types.is_empty()
    }
}

fn merge_unique(target: &mut Vec<String>, items: Vec<String>) {
    for item in items {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}

// ============================================================================
// Service
// ============================================================================

/// Extracts graph entities from questions and conversation turns.
pub struct EntityExtractorService {
    datastore: Arc<dyn GraphDatastore>,
    mode: PersonNameMode,
}

impl EntityExtractorService {
    /// Creates an extractor over a datastore.
    #[must_use]
    pub fn new(datastore: Arc<dyn GraphDatastore>, mode: PersonNameMode) -> Self {
        Self { datastore, mode }
    }

    /// Returns the person-name mode.
    #[must_use]
    pub const fn mode(&self) -> PersonNameMode {
        self.mode
    }

    /// Fetches the location and organization names (and person names in
    /// validated mode).
    ///
    /// A failed fetch degrades to [`NameLookup::Unavailable`] and is logged;
    /// it never fails the question.
    #[instrument(skip(self), fields(operation = "fetch_name_universe", mode = self.mode.as_str()))]
    pub fn fetch_universe(&self) -> NameUniverse {
        let persons = match self.mode {
            PersonNameMode::Validated => Some(self.fetch_names("person", PERSON_NAMES_STATEMENT)),
            PersonNameMode::Heuristic => None,
        };
        NameUniverse {
            locations: self.fetch_names("location", LOCATION_NAMES_STATEMENT),
            organizations: self.fetch_names("organization", ORGANIZATION_NAMES_STATEMENT),
            persons,
        }
    }

    fn fetch_names(&self, universe: &'static str, statement: &str) -> NameLookup {
        let start = Instant::now();
        let result = self.datastore.query(statement, &Params::new());

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!(
            "graph_name_universe_total",
            "universe" => universe,
            "status" => status
        )
        .increment(1);
        metrics::histogram!("graph_name_universe_duration_ms", "universe" => universe)
            .record(start.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(records) => NameLookup::Found(collect_names(&records)),
            Err(e) => {
                tracing::warn!(universe, error = %e, "Name lookup failed, matching nothing");
                NameLookup::Unavailable(e.to_string())
            },
        }
    }

    /// Extracts entities from one piece of text.
    #[must_use]
    pub fn extract(&self, text: &str, universe: &NameUniverse) -> ExtractedEntities {
        let candidates = person_candidates(text);
        let persons = match (self.mode, &universe.persons) {
            (PersonNameMode::Heuristic, _) => candidates,
            (PersonNameMode::Validated, Some(known)) => validate_persons(candidates, known.names()),
            (PersonNameMode::Validated, None) => Vec::new(),
        };

        ExtractedEntities {
            locations: match_known_names(text, universe.locations.names()),
            organizations: match_known_names(text, universe.organizations.names()),
            persons,
            crime_types: extract_crime_types(text),
        }
    }
}

/// Pulls the `name` column out of name-universe records, skipping blanks and
/// non-string values.
fn collect_names(records: &[Record]) -> Vec<String> {
    let mut names = Vec::with_capacity(records.len());
    for record in records {
        if let Some(Value::String(name)) = record.get("name")
            && !name.trim().is_empty()
            && !names.contains(name)
        {
            names.push(name.clone());
        }
    }
    names
}

/// Returns every known name that appears in `text`, ignoring case.
#[must_use]
pub fn match_known_names(text: &str, names: &[String]) -> Vec<String> {
    let haystack = text.to_lowercase();
    let mut found: Vec<String> = Vec::new();
    for name in names {
        let needle = name.trim().to_lowercase();
        if !needle.is_empty() && haystack.contains(&needle) && !found.contains(name) {
            found.push(name.clone());
        }
    }
    found
}

/// Returns the crime categories whose label appears in `text`, ignoring case.
#[must_use]
pub fn extract_crime_types(text: &str) -> Vec<CrimeType> {
    let haystack = text.to_lowercase();
    CrimeType::EXTRACTABLE
        .into_iter()
        .filter(|crime_type| haystack.contains(&crime_type.label().to_lowercase()))
        .collect()
}

/// Returns every pair of adjacent capitalized tokens, joined by a space.
///
/// Tokens are split on whitespace and stripped of surrounding punctuation and
/// of a possessive `'s`.
/// A pair is dropped when its first token is a stoplisted word.
#[must_use]
pub fn person_candidates(text: &str) -> Vec<String> {
    let tokens: Vec<&str> = text.split_whitespace().map(trim_token).collect();
    let mut candidates: Vec<String> = Vec::new();

    for pair in tokens.windows(2) {
        let (first, second) = (pair[0], pair[1]);
        if !starts_uppercase(first) || !starts_uppercase(second) {
            continue;
        }
        if PERSON_STOPLIST.contains(&first.to_lowercase().as_str()) {
            continue;
        }
        let candidate = format!("{first} {second}");
        if !candidates.contains(&candidate) {
            candidates.push(candidate);
        }
    }
    candidates
}

fn trim_token(token: &str) -> &str {
    let token = token.trim_matches(|c: char| !c.is_alphanumeric());
    token
        .strip_suffix("'s")
        .or_else(|| token.strip_suffix("\u{2019}s"))
        .unwrap_or(token)
}

fn starts_uppercase(token: &str) -> bool {
    token.chars().next().is_some_and(char::is_uppercase)
}

/// Keeps candidates that name a known person, using the stored spelling.
fn validate_persons(candidates: Vec<String>, known: &[String]) -> Vec<String> {
    candidates
        .into_iter()
        .filter_map(|candidate| {
            known
                .iter()
                .find(|name| name.eq_ignore_ascii_case(&candidate))
                .cloned()
        })
        .collect()
}
