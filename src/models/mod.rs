//! Data models for crimegraph.
//!
//! Graph vocabulary (labels, crime categories, id namespaces), conversation
//! turns and the per-question context mapping.

mod context;
mod conversation;
pub mod graph;

pub use context::{
    Answer, ConnectionRow, ContextMapping, CrimeByMoRow, DatabaseStats, EvidenceLinkRow,
    EvidenceRow, HotspotRow, InvestigatorRow, LocationCrimeRow, MemberRow, MoPatternRow,
    NetworkRow, OrgCrimeRow, OrganizationRow, RepeatOffenderRow, STATS_TOPIC, SuspectRow,
    TopicData, VehicleRow, WeaponRow,
};
pub use conversation::{ChatTurn, Conversation, Role, recent};
pub use graph::{CrimeType, Severity, Significance};
