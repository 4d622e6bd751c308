//! Context assembly.
//!
//! Turns a question plus recent history into a [`ContextMapping`]:
//!
//! ```text
//! question + history
//!        │
//!        ▼
//! ┌──────────────────┐   name universes (once per question)
//! │ entity resolution│◄──────────────────────────────── datastore
//! │ question first,  │
//! │ then carry-over  │
//! └────────┬─────────┘
//!          │ ≤ N entities per category
//!          ▼
//! ┌──────────────────┐
//! │ stats lookup     │  always; failure leaves a placeholder
//! ├──────────────────┤
//! │ dispatch order   │  keyword rules interleaved with per-entity lookups
//! └────────┬─────────┘
//!          ▼
//!    ContextMapping
//! ```
//!
//! Every lookup is isolated: a datastore or decode failure is logged, counted
//! and leaves its topic out, without affecting the other lookups.

use super::entity_extraction::{EntityExtractorService, ExtractedEntities};
use super::query_registry::{
    DISPATCH_ORDER, DispatchStage, LOCATION_LOOKUPS, LookupId, ORGANIZATION_LOOKUPS,
    PERSON_LOOKUPS, STATS_STATEMENT, decode_stats, rule,
};
use crate::config::RetrievalConfig;
use crate::models::{ChatTurn, ContextMapping, STATS_TOPIC, TopicData, recent};
use crate::storage::{GraphDatastore, Params, params};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Placeholder text stored when the statistics lookup fails.
pub const STATS_UNAVAILABLE: &str = "Could not fetch stats";

/// Builds the context mapping for a question.
pub struct ContextAssembler {
    datastore: Arc<dyn GraphDatastore>,
    extractor: EntityExtractorService,
    config: RetrievalConfig,
}

impl ContextAssembler {
    /// Creates an assembler over a datastore.
    #[must_use]
    pub fn new(datastore: Arc<dyn GraphDatastore>, config: RetrievalConfig) -> Self {
        let extractor = EntityExtractorService::new(Arc::clone(&datastore), config.person_name_mode);
        Self {
            datastore,
            extractor,
            config,
        }
    }

    /// Returns the retrieval limits.
    #[must_use]
    pub const fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Resolves the entities a question refers to, including ones carried over
    /// from the last turns of history.
    ///
    /// The question's own entities come first; duplicates keep their first
    /// position. Each category is capped at the configured maximum.
    #[must_use]
    pub fn resolve_entities(&self, question: &str, history: &[ChatTurn]) -> ExtractedEntities {
        let universe = self.extractor.fetch_universe();
        let mut entities = self.extractor.extract(question, &universe);
        for turn in recent(history, self.config.carry_over_window) {
            entities.merge(self.extractor.extract(&turn.content, &universe));
        }
        entities.truncate(self.config.max_entities_per_category);

        tracing::debug!(
            locations = ?entities.locations,
            organizations = ?entities.organizations,
            persons = ?entities.persons,
            crime_types = ?entities.crime_types,
            "Resolved entities"
        );
        entities
    }

    /// Assembles the context mapping for a question.
    ///
    /// Never fails: the statistics topic is always present (as a placeholder
    /// when its lookup fails) and every other lookup failure just omits its
    /// topic.
    #[instrument(
        skip(self, question, history),
        fields(operation = "assemble_context", history_len = history.len(), topics = tracing::field::Empty)
    )]
    pub fn assemble(&self, question: &str, history: &[ChatTurn]) -> ContextMapping {
        let mut mapping = ContextMapping::new();
        mapping.insert(STATS_TOPIC, self.fetch_stats());

        let entities = self.resolve_entities(question, history);
        let lowered = question.to_lowercase();
        let has_organizations = !entities.organizations.is_empty();

        for stage in DISPATCH_ORDER {
            match stage {
                DispatchStage::Rule(category) => {
                    if let Some(rule) = rule(*category)
                        && rule.fires(&lowered, has_organizations)
                    {
                        for lookup in rule.lookups {
                            self.run_into(&mut mapping, *lookup, None, true);
                        }
                    }
                },
                DispatchStage::Organizations => {
                    for organization in &entities.organizations {
                        for lookup in ORGANIZATION_LOOKUPS {
                            // organization crime topics are only kept when non-empty
                            self.run_into(&mut mapping, *lookup, Some(organization), false);
                        }
                    }
                },
                DispatchStage::Locations => {
                    for location in &entities.locations {
                        for lookup in LOCATION_LOOKUPS {
                            self.run_into(&mut mapping, *lookup, Some(location), true);
                        }
                    }
                },
                DispatchStage::Persons => {
                    for person in &entities.persons {
                        for lookup in PERSON_LOOKUPS {
                            self.run_into(&mut mapping, *lookup, Some(person), true);
                        }
                    }
                },
            }
        }

        tracing::Span::current().record("topics", mapping.len());
        mapping
    }

    fn fetch_stats(&self) -> TopicData {
        let start = Instant::now();
        let result = self
            .datastore
            .query(STATS_STATEMENT, &Params::new())
            .and_then(decode_stats);
        record_lookup_metrics(STATS_TOPIC, status_of(&result), start);

        match result {
            Ok(stats) => TopicData::Stats(stats),
            Err(e) => {
                tracing::warn!(error = %e, "Statistics lookup failed, using placeholder");
                TopicData::Unavailable {
                    error: STATS_UNAVAILABLE.to_string(),
                }
            },
        }
    }

    fn run_into(
        &self,
        mapping: &mut ContextMapping,
        lookup: LookupId,
        entity: Option<&str>,
        keep_empty: bool,
    ) {
        let topic = lookup.topic_key(entity);
        match self.run_lookup(lookup, &topic, entity) {
            Ok(data) if keep_empty || !data.is_empty() => mapping.insert(topic, data),
            Ok(_) => tracing::debug!(topic = %topic, "Lookup returned no rows, topic omitted"),
            Err(e) => {
                tracing::warn!(lookup = lookup.name(), topic = %topic, error = %e, "Lookup failed, topic omitted");
            },
        }
    }

    /// Runs one lookup and decodes its records.
    ///
    /// # Errors
    ///
    /// Returns the datastore or decode error.
    pub fn run_lookup(&self, lookup: LookupId, topic: &str, entity: Option<&str>) -> Result<TopicData> {
        let start = Instant::now();
        let bound = match (lookup.entity_param(), entity) {
            (Some(name), Some(value)) => params([(name, value)]),
            (Some(name), None) => {
                return Err(Error::InvalidInput(format!(
                    "lookup '{}' requires a ${name} parameter",
                    lookup.name()
                )));
            },
            (None, _) => Params::new(),
        };

        let result = self
            .datastore
            .query(lookup.statement(), &bound)
            .and_then(|records| lookup.decode(topic, records));
        record_lookup_metrics(lookup.name(), status_of(&result), start);
        result
    }
}

const fn status_of<T>(result: &Result<T>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(Error::Decode { .. }) => "decode_error",
        Err(_) => "datastore_error",
    }
}

fn record_lookup_metrics(lookup: &'static str, status: &'static str, start: Instant) {
    metrics::counter!(
        "graph_lookups_total",
        "lookup" => lookup,
        "status" => status
    )
    .increment(1);
    metrics::histogram!("graph_lookup_duration_ms", "lookup" => lookup)
        .record(start.elapsed().as_secs_f64() * 1000.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::entity_extraction::{LOCATION_NAMES_STATEMENT, ORGANIZATION_NAMES_STATEMENT};
    use crate::storage::{InMemoryDatastore, records};
    use serde_json::json;

    fn graph() -> InMemoryDatastore {
        InMemoryDatastore::new()
            .with_response(
                LOCATION_NAMES_STATEMENT,
                records(json!([{"name": "Loop"}, {"name": "Pilsen"}, {"name": "Hyde Park"}, {"name": "Austin"}])),
            )
            .with_response(
                ORGANIZATION_NAMES_STATEMENT,
                records(json!([{"name": "West Side Crew"}])),
            )
    }

    fn assembler(datastore: InMemoryDatastore) -> (Arc<InMemoryDatastore>, ContextAssembler) {
        let datastore = Arc::new(datastore);
        let assembler = ContextAssembler::new(
            Arc::clone(&datastore) as Arc<dyn GraphDatastore>,
            RetrievalConfig::default(),
        );
        (datastore, assembler)
    }

    #[test]
    fn test_stats_always_first() {
        let (_, assembler) = assembler(graph());
        let mapping = assembler.assemble("hello there", &[]);
        assert_eq!(mapping.keys(), vec![STATS_TOPIC]);
        assert_eq!(mapping.stats().copied(), Some(Default::default()));
    }

    #[test]
    fn test_stats_failure_leaves_placeholder() {
        let (_, assembler) = assembler(graph().with_failure(STATS_STATEMENT, "down"));
        let mapping = assembler.assemble("hello there", &[]);
        assert_eq!(
            mapping.get(STATS_TOPIC),
            Some(&TopicData::Unavailable {
                error: STATS_UNAVAILABLE.to_string()
            })
        );
    }

    #[test]
    fn test_carry_over_adds_location_lookups() {
        let (datastore, assembler) = assembler(graph());
        let history = vec![
            ChatTurn::user("What happened in the Loop?"),
            ChatTurn::assistant("Several thefts."),
        ];
        let mapping = assembler.assemble("And who was involved?", &history);
        assert!(mapping.contains_key("crimes_in_Loop"));
        assert!(mapping.contains_key("suspects_in_Loop"));

        let calls = datastore.calls_for(LookupId::LocationCrimes.statement());
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].params["location"], "Loop");
    }

    #[test]
    fn test_carry_over_window_is_bounded() {
        let (_, assembler) = assembler(graph());
        let mut history = vec![ChatTurn::user("Tell me about Pilsen")];
        for i in 0..6 {
            history.push(ChatTurn::assistant(format!("filler {i}")));
        }
        let mapping = assembler.assemble("anything else?", &history);
        assert!(!mapping.contains_key("crimes_in_Pilsen"));
    }

    #[test]
    fn test_entities_capped_per_category() {
        let (datastore, assembler) = assembler(graph());
        let mapping = assembler.assemble("Compare Loop, Pilsen, Hyde Park and Austin", &[]);
        assert!(mapping.contains_key("crimes_in_Hyde Park"));
        assert!(!mapping.contains_key("crimes_in_Austin"));
        assert_eq!(datastore.calls_for(LookupId::LocationSuspects.statement()).len(), 3);
    }

    #[test]
    fn test_empty_organization_crimes_omitted() {
        let (_, assembler) = assembler(graph());
        let mapping = assembler.assemble("Tell me about West Side Crew", &[]);
        assert!(mapping.contains_key("all_organizations"));
        assert!(mapping.contains_key("organization_members"));
        assert!(!mapping.contains_key("org_West Side Crew_crimes"));
    }

    #[test]
    fn test_failing_lookup_is_isolated() {
        let (_, assembler) = assembler(
            graph().with_failure(LookupId::LocationCrimes.statement(), "timeout"),
        );
        let mapping = assembler.assemble("What about the Loop hotspots?", &[]);
        assert!(!mapping.contains_key("crimes_in_Loop"));
        assert!(mapping.contains_key("suspects_in_Loop"));
        assert!(mapping.contains_key("hotspots"));
    }

    #[test]
    fn test_decode_failure_omits_topic() {
        let (_, assembler) = assembler(graph().with_response(
            LookupId::Hotspots.statement(),
            records(json!([{"district": "Central"}])),
        ));
        let mapping = assembler.assemble("show hotspots", &[]);
        assert!(!mapping.contains_key("hotspots"));
    }

    #[test]
    fn test_entity_lookup_without_entity_rejected() {
        let (_, assembler) = assembler(graph());
        let err = assembler
            .run_lookup(LookupId::LocationCrimes, "crimes_in_", None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_resolve_entities_question_first() {
        let (_, assembler) = assembler(graph());
        let history = vec![ChatTurn::user("Pilsen and the Loop")];
        let entities = assembler.resolve_entities("What about the Loop?", &history);
        assert_eq!(entities.locations, vec!["Loop", "Pilsen"]);
    }
}
