//! `GraphRagService` integration tests.
//!
//! Runs whole questions against a scripted in-memory graph:
//! - Stats-only mappings and the default summary
//! - Keyword-triggered lookups and their ordering
//! - Entity carry-over from conversation history
//! - Per-entity caps and bound parameters
//! - Generative answers and fallback on backend failure

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use crimegraph::config::RetrievalConfig;
use crimegraph::llm::{ChatMessage, CompletionOptions, LlmProvider};
use crimegraph::models::{ChatTurn, Conversation, STATS_TOPIC, TopicData};
use crimegraph::services::entity_extraction::{
    LOCATION_NAMES_STATEMENT, ORGANIZATION_NAMES_STATEMENT,
};
use crimegraph::services::query_registry::STATS_STATEMENT;
use crimegraph::services::{GraphRagService, LookupId, STATS_UNAVAILABLE};
use crimegraph::storage::{GraphDatastore, InMemoryDatastore, records};
use crimegraph::{Error, Result};
use serde_json::json;
use std::sync::{Arc, Mutex};

// ============================================================================
// Test Helpers
// ============================================================================

/// A small Chicago graph.
fn chicago_graph() -> InMemoryDatastore {
    InMemoryDatastore::new()
        .with_response(
            STATS_STATEMENT,
            records(json!([{
                "total_crimes": 500, "total_persons": 150, "total_locations": 50,
                "total_organizations": 8, "total_evidence": 200
            }])),
        )
        .with_response(
            LOCATION_NAMES_STATEMENT,
            records(json!([
                {"name": "Loop"}, {"name": "Pilsen"}, {"name": "Hyde Park"},
                {"name": "Austin"}, {"name": "O'Hare"}
            ])),
        )
        .with_response(
            ORGANIZATION_NAMES_STATEMENT,
            records(json!([{"name": "West Side Crew"}, {"name": "South Side Syndicate"}])),
        )
        .with_response(
            LookupId::AllOrganizations.statement(),
            // deliberately out of order
            records(json!([
                {"name": "West Side Crew", "type": "street_gang", "territory": "West", "members": 25, "activity": "high"},
                {"name": "South Side Syndicate", "type": "organized_crime", "territory": "South", "members": 40, "activity": "high"}
            ])),
        )
        .with_response(
            LookupId::OrganizationMembers.statement(),
            records(json!([
                {"organization": "West Side Crew", "member": "Marcus Johnson", "age": 31, "rank": "leader"},
                {"organization": "West Side Crew", "member": "Tyrone Hill", "age": 24, "rank": "soldier"}
            ])),
        )
        .with_responder(LookupId::OrganizationCrimes.statement(), |params| {
            if params["name"] == "West Side Crew" {
                Ok(records(json!([
                    {"crime_type": "Robbery", "date": "2024-03-01", "location": "Austin", "member": "Marcus Johnson"}
                ])))
            } else {
                Ok(Vec::new())
            }
        })
        .with_responder(LookupId::LocationSuspects.statement(), |params| {
            let location = params["location"].as_str().unwrap_or_default().to_string();
            Ok(records(json!([
                {"name": format!("Suspect of {location}"), "age": 29, "risk_score": 0.7, "crime_count": 3}
            ])))
        })
}

/// A backend that replays a fixed reply and remembers the prompt.
struct ScriptedLlm {
    reply: Option<String>,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        })
    }
}

impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn complete_chat(
        &self,
        messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> Result<String> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        self.reply.clone().ok_or_else(|| Error::Backend {
            provider: "scripted".to_string(),
            cause: "connection refused".to_string(),
        })
    }
}

fn service_over(datastore: &Arc<InMemoryDatastore>, llm: Option<Arc<dyn LlmProvider>>) -> GraphRagService {
    GraphRagService::new(
        Arc::clone(datastore) as Arc<dyn GraphDatastore>,
        llm,
        RetrievalConfig::default(),
    )
}

// ============================================================================
// Retrieval
// ============================================================================

#[test]
fn test_no_triggers_no_entities_gives_stats_only() {
    let datastore = Arc::new(chicago_graph());
    let service = service_over(&datastore, None);

    let answer = service.answer("hello, how are you today?", &[]);
    assert_eq!(answer.sources, vec![STATS_TOPIC]);
    assert_eq!(
        answer.answer,
        "**📊 Database Overview:**\n\n- Crimes: 500\n- Suspects: 150\n- Organizations: 8\n"
    );
}

#[test]
fn test_organizations_question_end_to_end() {
    let datastore = Arc::new(chicago_graph());
    let service = service_over(&datastore, None);

    let mapping = service.retrieve("Which criminal organizations operate in Chicago?", &[]);
    let Some(TopicData::Organizations(orgs)) = mapping.get("all_organizations") else {
        panic!("all_organizations missing");
    };
    assert_eq!(orgs[0].name, "South Side Syndicate");
    assert_eq!(orgs[0].members, 40);
    assert_eq!(orgs[1].name, "West Side Crew");
    assert!(mapping.contains_key("organization_members"));

    let answer = service.answer("Which criminal organizations operate in Chicago?", &[]);
    assert!(answer.answer.contains("**🏢 Criminal Organizations:**"));
    assert!(answer.answer.contains("Territory: South | Members: 40"));
    assert!(answer.answer.contains("Territory: West | Members: 25"));
    assert!(
        answer.answer.find("South Side Syndicate").unwrap()
            < answer.answer.find("West Side Crew").unwrap()
    );
}

#[test]
fn test_named_organization_gets_crime_topic() {
    let datastore = Arc::new(chicago_graph());
    let service = service_over(&datastore, None);

    let answer = service.answer("Tell me more about West Side Crew", &[]);
    assert!(answer.sources.contains(&"org_West Side Crew_crimes".to_string()));
    assert!(answer.sources.contains(&"all_organizations".to_string()));

    let calls = datastore.calls_for(LookupId::OrganizationCrimes.statement());
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].params["name"], "West Side Crew");
}

#[test]
fn test_follow_up_carries_location_over() {
    let datastore = Arc::new(chicago_graph());
    let service = service_over(&datastore, None);

    let mut conversation = Conversation::new();
    conversation.push_user("What happened in the Loop last week?");
    conversation.push_assistant("There were several thefts near the train stations.");

    let answer = service.answer("Who was involved?", conversation.window(10));
    assert!(answer.sources.contains(&"crimes_in_Loop".to_string()));
    assert!(answer.sources.contains(&"suspects_in_Loop".to_string()));
    assert!(answer.answer.contains("**🔍 Suspects in Loop:**"));
    assert!(answer.answer.contains("- Suspect of Loop (Age: 29, Crimes: 3)"));
}

#[test]
fn test_retrieval_is_idempotent() {
    let datastore = Arc::new(chicago_graph());
    let service = service_over(&datastore, None);
    let history = vec![ChatTurn::user("Anything in Pilsen?")];

    let first = service.retrieve("Which gangs are active there?", &history);
    let second = service.retrieve("Which gangs are active there?", &history);
    assert_eq!(first.keys(), second.keys());
    assert_eq!(first, second);
}

#[test]
fn test_at_most_three_entities_per_category() {
    let datastore = Arc::new(chicago_graph());
    let service = service_over(&datastore, None);

    let mapping = service.retrieve("Compare Loop, Pilsen, Hyde Park, Austin and O'Hare", &[]);
    let location_topics = mapping
        .keys()
        .into_iter()
        .filter(|key| key.starts_with("crimes_in_"))
        .count();
    assert_eq!(location_topics, 3);
    assert_eq!(
        datastore
            .calls_for(LookupId::LocationSuspects.statement())
            .len(),
        3
    );
}

#[test]
fn test_entity_names_travel_as_parameters() {
    let datastore = Arc::new(chicago_graph());
    let service = service_over(&datastore, None);

    let _ = service.answer("What's going on at O'Hare?", &[]);
    let calls = datastore.calls_for(LookupId::LocationCrimes.statement());
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].params["location"], "O'Hare");
    assert!(!calls[0].statement.contains("O'Hare"));
}

#[test]
fn test_empty_datastore_gives_zero_summary() {
    let datastore = Arc::new(InMemoryDatastore::new());
    let service = service_over(&datastore, None);

    let mapping = service.retrieve("", &[]);
    assert_eq!(mapping.stats().map(|s| s.total_crimes), Some(0));

    let answer = service.answer("", &[]);
    assert_eq!(
        answer.answer,
        "**📊 Database Overview:**\n\n- Crimes: 0\n- Suspects: 0\n- Organizations: 0\n"
    );
}

#[test]
fn test_unreachable_datastore_still_answers() {
    let datastore = Arc::new(
        InMemoryDatastore::new()
            .with_failure(STATS_STATEMENT, "connection refused")
            .with_failure(LOCATION_NAMES_STATEMENT, "connection refused")
            .with_failure(ORGANIZATION_NAMES_STATEMENT, "connection refused")
            .with_failure(LookupId::AllOrganizations.statement(), "connection refused")
            .with_failure(LookupId::OrganizationMembers.statement(), "connection refused"),
    );
    let service = service_over(&datastore, None);

    let mapping = service.retrieve("Which gangs are there?", &[]);
    assert_eq!(
        mapping.get(STATS_TOPIC),
        Some(&TopicData::Unavailable {
            error: STATS_UNAVAILABLE.to_string()
        })
    );
    assert!(!mapping.contains_key("all_organizations"));

    let answer = service.answer("Which gangs are there?", &[]);
    assert!(answer.answer.contains("- Crimes: 0"));
}

// ============================================================================
// Answer Strategies
// ============================================================================

#[test]
fn test_generative_answer_is_verbatim() {
    let datastore = Arc::new(chicago_graph());
    let llm = ScriptedLlm::replying("**South Side Syndicate** is the largest. Want their members?");
    let service = service_over(&datastore, Some(llm.clone() as Arc<dyn LlmProvider>));

    let history = vec![
        ChatTurn::user("Hi"),
        ChatTurn::assistant("Hello detective."),
    ];
    let answer = service.answer("Which gangs are the biggest?", &history);
    assert_eq!(
        answer.answer,
        "**South Side Syndicate** is the largest. Want their members?"
    );
    assert!(answer.sources.contains(&"all_organizations".to_string()));

    let prompts = llm.prompts.lock().unwrap();
    let messages = &prompts[0];
    assert_eq!(messages.len(), 4);
    let last = &messages[3].content;
    assert!(last.starts_with("Which gangs are the biggest?"));
    assert!(last.contains("**All Organizations:**"));
    assert!(last.contains("South Side Syndicate"));
}

#[test]
fn test_backend_failure_falls_back() {
    let datastore = Arc::new(chicago_graph());
    let llm = ScriptedLlm::failing();
    let service = service_over(&datastore, Some(llm.clone() as Arc<dyn LlmProvider>));

    let answer = service.answer("Which criminal organizations operate in Chicago?", &[]);
    assert!(answer.answer.contains("**🏢 Criminal Organizations:**"));
    assert_eq!(llm.prompts.lock().unwrap().len(), 1);
}

#[test]
fn test_fallback_caps_members_block() {
    let members: Vec<_> = (0..20)
        .map(|i| json!({"organization": "West Side Crew", "member": format!("Member {i:02}"), "rank": "soldier"}))
        .collect();
    let datastore = Arc::new(
        chicago_graph().with_response(LookupId::OrganizationMembers.statement(), records(json!(members))),
    );
    let service = service_over(&datastore, None);

    let answer = service.answer("Who is in the gang?", &[]);
    assert_eq!(answer.answer.matches("(soldier) - West Side Crew").count(), 10);
}
