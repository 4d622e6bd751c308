//! Business logic services.
//!
//! Services sit between the datastore and generative backends and the
//! callers: extraction and retrieval build the context for a question,
//! synthesis turns it into an answer, and [`GraphRagService`] ties them
//! together.

pub mod entity_extraction;
mod graph_rag;
mod overview;
pub mod query_registry;
mod retrieval;
mod synthesis;

pub use entity_extraction::{EntityExtractorService, ExtractedEntities, NameLookup, NameUniverse};
pub use graph_rag::{APOLOGY, AnswerStrategy, GraphRagService};
pub use overview::{
    CrimeTypeCount, HourlyCount, LocationCount, Overview, OverviewService, OverviewTotals,
    RecentCrime, TypeCorrelation,
};
pub use query_registry::{LookupId, TRIGGER_RULES, TriggerCategory, TriggerRule};
pub use retrieval::{ContextAssembler, STATS_UNAVAILABLE};
pub use synthesis::{FallbackFormatter, GenerativeComposer, render_context, title_case_key};
