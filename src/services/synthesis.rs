//! Answer strategies.
//!
//! Both strategies consume the same [`ContextMapping`]:
//!
//! - [`GenerativeComposer`] prompts a backend with the investigator persona, the
//!   recent conversation and the serialized graph data.
//! - [`FallbackFormatter`] renders the recognized topics as titled bullet blocks
//!   without any backend. It is pure and total.

use crate::config::RetrievalConfig;
use crate::llm::{
    CONTEXT_HEADING, ChatMessage, CompletionOptions, INVESTIGATOR_SYSTEM_PROMPT, LlmProvider,
    RESPONSE_STYLE_REMINDER,
};
use crate::models::{ChatTurn, ContextMapping, TopicData, recent};
use crate::{Error, Result};
use std::fmt::Write as _;
use std::sync::Arc;

/// Items rendered per fallback block.
pub const FALLBACK_BLOCK_ITEMS: usize = 10;

/// Fallback answers shorter than this are replaced by the statistics summary.
pub const FALLBACK_MIN_CHARS: usize = 50;

const SUSPECTS_PREFIX: &str = "suspects_in_";
const UNKNOWN: &str = "unknown";

// ============================================================================
// Generative Composer
// ============================================================================

/// Composes conversational answers with a generative backend.
pub struct GenerativeComposer {
    provider: Arc<dyn LlmProvider>,
    options: CompletionOptions,
    prompt_window: usize,
    chars_per_topic: usize,
}

impl GenerativeComposer {
    /// Creates a composer with default sampling options.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, config: &RetrievalConfig) -> Self {
        Self {
            provider,
            options: CompletionOptions::default(),
            prompt_window: config.prompt_window,
            chars_per_topic: config.prompt_chars_per_topic,
        }
    }

    /// Overrides the sampling options.
    #[must_use]
    pub const fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the backend name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Builds the message sequence: persona, recent history, then the question
    /// with the serialized context and the style reminder.
    #[must_use]
    pub fn build_messages(
        &self,
        question: &str,
        mapping: &ContextMapping,
        history: &[ChatTurn],
    ) -> Vec<ChatMessage> {
        let window = recent(history, self.prompt_window);
        let mut messages = Vec::with_capacity(window.len() + 2);
        messages.push(ChatMessage::system(INVESTIGATOR_SYSTEM_PROMPT));
        messages.extend(window.iter().map(ChatMessage::from));

        let context = render_context(mapping, self.chars_per_topic);
        messages.push(ChatMessage::user(format!(
            "{question}\n\n{context}\n\n{RESPONSE_STYLE_REMINDER}"
        )));
        messages
    }

    /// Generates an answer.
    ///
    /// # Errors
    ///
    /// Returns the backend error, or [`Error::Backend`] when the backend
    /// answers with blank text.
    pub fn compose(
        &self,
        question: &str,
        mapping: &ContextMapping,
        history: &[ChatTurn],
    ) -> Result<String> {
        let messages = self.build_messages(question, mapping, history);
        let text = self.provider.complete_chat(&messages, &self.options)?;
        if text.trim().is_empty() {
            return Err(Error::Backend {
                provider: self.provider.name().to_string(),
                cause: "empty completion".to_string(),
            });
        }
        Ok(text)
    }
}

/// Serializes every non-empty topic as pretty JSON under a title-cased heading,
/// keeping at most `chars_per_topic` characters of each.
///
/// Placeholders for failed lookups are kept so the model knows the data is missing.
#[must_use]
pub fn render_context(mapping: &ContextMapping, chars_per_topic: usize) -> String {
    let mut out = format!("\n{CONTEXT_HEADING}\n\n");
    for (key, topic) in mapping.iter() {
        if topic.is_empty() && !matches!(topic, TopicData::Unavailable { .. }) {
            continue;
        }
        let json = match serde_json::to_string_pretty(topic) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(topic = key, error = %e, "Could not serialize topic");
                continue;
            },
        };
        let _ = write!(
            out,
            "\n**{}:**\n{}\n",
            title_case_key(key),
            truncate_chars(&json, chars_per_topic)
        );
    }
    out
}

/// Turns a topic key into a heading: underscores become spaces and each word
/// is capitalized (`crimes_in_Hyde Park` → `Crimes In Hyde Park`).
#[must_use]
pub fn title_case_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut previous_is_letter = false;
    for c in key.chars().map(|c| if c == '_' { ' ' } else { c }) {
        if previous_is_letter {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        previous_is_letter = c.is_alphabetic();
    }
    out
}

/// Returns the first `max` characters of `s`.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ============================================================================
// Fallback Formatter
// ============================================================================

/// Deterministic answers built from recognized topics.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackFormatter;

impl FallbackFormatter {
    /// Renders a fallback answer. Always returns non-empty text.
    #[must_use]
    pub fn format(mapping: &ContextMapping) -> String {
        let mut out = String::new();

        if let Some(TopicData::Organizations(rows)) = mapping.get("all_organizations")
            && !rows.is_empty()
        {
            out.push_str("**🏢 Criminal Organizations:**\n\n");
            for org in rows.iter().take(FALLBACK_BLOCK_ITEMS) {
                let _ = writeln!(out, "- **{}** ({})", org.name, or_unknown(org.org_type.as_ref()));
                let _ = writeln!(
                    out,
                    "  Territory: {} | Members: {}",
                    or_unknown(org.territory.as_ref()),
                    org.members
                );
            }
            out.push('\n');
        }

        if let Some(TopicData::OrganizationMembers(rows)) = mapping.get("organization_members")
            && !rows.is_empty()
        {
            out.push_str("**👥 Key Members:**\n\n");
            for member in rows.iter().take(FALLBACK_BLOCK_ITEMS) {
                let _ = writeln!(
                    out,
                    "- {} ({}) - {}",
                    member.member,
                    or_unknown(member.rank.as_ref()),
                    member.organization
                );
            }
            out.push('\n');
        }

        if let Some(TopicData::Evidence(rows)) = mapping.get("all_evidence")
            && !rows.is_empty()
        {
            out.push_str("**🔍 Evidence:**\n\n");
            for evidence in rows.iter().take(FALLBACK_BLOCK_ITEMS) {
                let _ = writeln!(
                    out,
                    "- **{}**: {} ({})",
                    evidence.id,
                    evidence.description,
                    or_unknown(evidence.significance.as_ref())
                );
            }
            out.push('\n');
        }

        for (key, topic) in mapping.iter() {
            let Some(location) = key.strip_prefix(SUSPECTS_PREFIX) else {
                continue;
            };
            let TopicData::LocationSuspects(rows) = topic else {
                continue;
            };
            if rows.is_empty() {
                continue;
            }
            let _ = write!(out, "**🔍 Suspects in {location}:**\n\n");
            for suspect in rows.iter().take(FALLBACK_BLOCK_ITEMS) {
                let _ = writeln!(
                    out,
                    "- {} (Age: {}, Crimes: {})",
                    suspect.name,
                    or_unknown(suspect.age.as_ref()),
                    suspect.crime_count
                );
            }
            out.push('\n');
        }

        if let Some(TopicData::Hotspots(rows)) = mapping.get("hotspots")
            && !rows.is_empty()
        {
            out.push_str("**🔥 Crime Hotspots:**\n\n");
            for hotspot in rows.iter().take(FALLBACK_BLOCK_ITEMS) {
                let _ = writeln!(out, "- {}: {} crimes", hotspot.location, hotspot.crimes);
            }
            out.push('\n');
        }

        if out.chars().count() < FALLBACK_MIN_CHARS {
            return Self::stats_summary(mapping);
        }
        out
    }

    /// Renders the statistics summary, with zero for anything unavailable.
    #[must_use]
    pub fn stats_summary(mapping: &ContextMapping) -> String {
        let stats = mapping.stats().copied().unwrap_or_default();
        format!(
            "**📊 Database Overview:**\n\n- Crimes: {}\n- Suspects: {}\n- Organizations: {}\n",
            stats.total_crimes, stats.total_persons, stats.total_organizations
        )
    }
}

fn or_unknown<T: ToString>(value: Option<&T>) -> String {
    value.map_or_else(|| UNKNOWN.to_string(), ToString::to_string)
}
