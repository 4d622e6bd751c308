//! Property-based tests for retrieval and answer formatting.
//!
//! Uses proptest to verify invariants across random inputs:
//! - The fallback formatter is total and never returns empty text
//! - Person-name candidates are always capitalized pairs
//! - Known-name matching only returns names from the universe
//! - Assembled mappings always start with the stats topic and respect entity caps
//! - History windows never exceed their bound

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use crimegraph::config::RetrievalConfig;
use crimegraph::models::{
    ChatTurn, ContextMapping, DatabaseStats, HotspotRow, OrganizationRow, STATS_TOPIC, SuspectRow,
    TopicData, recent,
};
use crimegraph::services::entity_extraction::{
    LOCATION_NAMES_STATEMENT, match_known_names, person_candidates,
};
use crimegraph::services::{ContextAssembler, FallbackFormatter, title_case_key};
use crimegraph::storage::{GraphDatastore, InMemoryDatastore, records};
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;

const LOCATIONS: &[&str] = &["Loop", "Pilsen", "Hyde Park", "Austin", "Englewood", "Uptown"];

fn organization_rows() -> impl Strategy<Value = Vec<OrganizationRow>> {
    prop::collection::vec(("[A-Za-z ]{0,20}", 0i64..500), 0..20).prop_map(|rows| {
        rows.into_iter()
            .map(|(name, members)| OrganizationRow {
                name,
                org_type: None,
                territory: None,
                members,
                activity: None,
            })
            .collect()
    })
}

fn hotspot_rows() -> impl Strategy<Value = Vec<HotspotRow>> {
    prop::collection::vec(("[A-Za-z]{0,12}", 0i64..1000), 0..20).prop_map(|rows| {
        rows.into_iter()
            .map(|(location, crimes)| HotspotRow {
                location,
                district: None,
                crimes,
            })
            .collect()
    })
}

fn suspect_rows() -> impl Strategy<Value = Vec<SuspectRow>> {
    prop::collection::vec(("[A-Za-z ]{0,16}", 0i64..20), 0..15).prop_map(|rows| {
        rows.into_iter()
            .map(|(name, crime_count)| SuspectRow {
                name,
                age: None,
                risk_score: None,
                crime_count,
            })
            .collect()
    })
}

proptest! {
    /// Property: the fallback formatter returns non-empty text for any mapping.
    #[test]
    fn prop_fallback_is_total(
        with_stats in any::<bool>(),
        orgs in proptest::option::of(organization_rows()),
        hotspots in proptest::option::of(hotspot_rows()),
        suspects in proptest::option::of(("[A-Za-z ]{0,10}", suspect_rows())),
    ) {
        let mut mapping = ContextMapping::new();
        if with_stats {
            mapping.insert(STATS_TOPIC, TopicData::Stats(DatabaseStats::default()));
        }
        if let Some(rows) = orgs {
            mapping.insert("all_organizations", TopicData::Organizations(rows));
        }
        if let Some(rows) = hotspots {
            mapping.insert("hotspots", TopicData::Hotspots(rows));
        }
        if let Some((location, rows)) = suspects {
            mapping.insert(format!("suspects_in_{location}"), TopicData::LocationSuspects(rows));
        }

        let text = FallbackFormatter::format(&mapping);
        prop_assert!(!text.is_empty());
        prop_assert!(text.chars().count() >= 50 || text.starts_with("**📊 Database Overview:**"));
        prop_assert!(text.matches(" crimes\n").count() <= 10);
    }

    /// Property: every person candidate is two capitalized tokens.
    #[test]
    fn prop_person_candidates_are_capitalized_pairs(text in "[A-Za-z,.'? ]{0,80}") {
        for candidate in person_candidates(&text) {
            let tokens: Vec<&str> = candidate.split(' ').collect();
            prop_assert_eq!(tokens.len(), 2);
            for token in &tokens {
                prop_assert!(token.chars().next().is_some_and(char::is_uppercase));
            }
            let first = tokens[0].to_lowercase();
            prop_assert!(!["i", "chicago", "det", "detective"].contains(&first.as_str()));
        }
    }

    /// Property: matched names always come from the universe, once each.
    #[test]
    fn prop_matched_names_come_from_universe(text in "[A-Za-z ]{0,60}") {
        let names: Vec<String> = LOCATIONS.iter().map(ToString::to_string).collect();
        let found = match_known_names(&text, &names);
        for name in &found {
            prop_assert!(names.contains(name));
            prop_assert!(text.to_lowercase().contains(&name.to_lowercase()));
        }
        let mut deduped = found.clone();
        deduped.dedup();
        prop_assert_eq!(deduped.len(), found.len());
    }

    /// Property: headings never keep underscores.
    #[test]
    fn prop_title_case_drops_underscores(key in "[a-zA-Z_ ]{0,40}") {
        let title = title_case_key(&key);
        prop_assert!(!title.contains('_'));
        prop_assert_eq!(title.chars().count(), key.chars().count());
    }

    /// Property: the recent window is bounded by both `n` and the history length.
    #[test]
    fn prop_recent_window_bounded(len in 0usize..30, n in 0usize..15) {
        let history: Vec<ChatTurn> = (0..len).map(|i| ChatTurn::user(format!("q{i}"))).collect();
        prop_assert_eq!(recent(&history, n).len(), len.min(n));
    }

    /// Property: mappings start with stats and hold at most three location lookups.
    #[test]
    fn prop_assembled_mapping_respects_caps(
        picks in prop::collection::vec(0usize..LOCATIONS.len(), 0..6),
        history_picks in prop::collection::vec(0usize..LOCATIONS.len(), 0..6),
    ) {
        let universe: Vec<_> = LOCATIONS.iter().map(|name| json!({"name": name})).collect();
        let datastore: Arc<dyn GraphDatastore> = Arc::new(
            InMemoryDatastore::new().with_response(LOCATION_NAMES_STATEMENT, records(json!(universe))),
        );
        let assembler = ContextAssembler::new(datastore, RetrievalConfig::default());

        let question = picks.iter().map(|&i| LOCATIONS[i]).collect::<Vec<_>>().join(" and ");
        let history: Vec<ChatTurn> = history_picks
            .iter()
            .map(|&i| ChatTurn::user(format!("what about {}", LOCATIONS[i])))
            .collect();

        let mapping = assembler.assemble(&question, &history);
        let keys = mapping.keys();
        prop_assert_eq!(keys[0].as_str(), STATS_TOPIC);
        let crimes_in = keys.iter().filter(|key| key.starts_with("crimes_in_")).count();
        prop_assert!(crimes_in <= 3);
        let suspects_in = keys.iter().filter(|key| key.starts_with("suspects_in_")).count();
        prop_assert_eq!(crimes_in, suspects_in);
    }
}
