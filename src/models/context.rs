//! Context mapping and per-topic record shapes.
//!
//! A [`ContextMapping`] is created fresh for every question, filled by the
//! retrieval step and consumed immediately by an answer strategy. Each value is
//! a [`TopicData`] variant whose rows are decoded from datastore records, so
//! formatters access typed fields instead of probing dynamic maps.
//!
//! Row field names follow the column aliases returned by the lookups, and
//! serialize back under the same names when the mapping is rendered for a
//! generative prompt.

use crate::models::Severity;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Topic key of the always-present statistics lookup.
pub const STATS_TOPIC: &str = "database_stats";

// ============================================================================
// Row Shapes
// ============================================================================

/// Entity counts returned by the statistics lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseStats {
    /// Number of `Crime` nodes.
    pub total_crimes: u64,
    /// Number of `Person` nodes.
    pub total_persons: u64,
    /// Number of `Location` nodes.
    pub total_locations: u64,
    /// Number of `Organization` nodes.
    pub total_organizations: u64,
    /// Number of `Evidence` nodes.
    pub total_evidence: u64,
}

/// One organization in `all_organizations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationRow {
    /// Organization name.
    pub name: String,
    /// Organization type (gang, drug ring, ...).
    #[serde(rename = "type")]
    pub org_type: Option<String>,
    /// Territory (district).
    pub territory: Option<String>,
    /// Member count.
    pub members: i64,
    /// Activity level.
    pub activity: Option<String>,
}

/// One membership in `organization_members`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRow {
    /// Organization name.
    pub organization: String,
    /// Member name.
    pub member: String,
    /// Member age.
    pub age: Option<i64>,
    /// Rank within the organization.
    pub rank: Option<String>,
}

/// One crime committed by a member of an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgCrimeRow {
    /// Crime category.
    pub crime_type: String,
    /// Crime date (`YYYY-MM-DD`).
    pub date: Option<String>,
    /// Location name.
    pub location: Option<String>,
    /// Member who was party to the crime.
    pub member: String,
}

/// One evidence item in `all_evidence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRow {
    /// Evidence id (`E###`).
    pub id: String,
    /// Evidence type.
    #[serde(rename = "type")]
    pub evidence_type: Option<String>,
    /// Free-text description.
    pub description: String,
    /// Significance (`critical`, `high`, `medium`, `low`).
    pub significance: Option<String>,
    /// Whether the evidence was verified.
    pub verified: Option<bool>,
}

/// One evidence → person link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceLinkRow {
    /// Evidence id.
    pub evidence_id: String,
    /// Evidence description.
    pub evidence: Option<String>,
    /// Linked person.
    pub suspect: String,
    /// Link confidence.
    pub confidence: Option<f64>,
}

/// One investigator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestigatorRow {
    /// Investigator name.
    pub name: String,
    /// Badge number.
    pub badge: Option<String>,
    /// Department.
    pub department: Option<String>,
    /// Specialization.
    pub specialization: Option<String>,
    /// Cases solved.
    pub solved: i64,
    /// Active cases.
    pub active: Option<i64>,
}

/// One modus-operandi pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoPatternRow {
    /// Pattern id (`MO###`).
    pub id: String,
    /// Description.
    pub description: String,
    /// Signature element.
    pub signature: Option<String>,
    /// How often the pattern was observed.
    pub frequency: Option<f64>,
}

/// One crime matched to a pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrimeByMoRow {
    /// Pattern description.
    pub mo: String,
    /// Crime id.
    pub crime_id: String,
    /// Crime category.
    pub crime_type: Option<String>,
    /// Match similarity.
    pub similarity: Option<f64>,
}

/// One vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleRow {
    /// Vehicle id.
    pub id: String,
    /// Make.
    pub make: Option<String>,
    /// Model.
    pub model: Option<String>,
    /// Model year.
    pub year: Option<i64>,
    /// Color.
    pub color: Option<String>,
    /// License plate.
    pub plate: Option<String>,
    /// Whether the vehicle was reported stolen.
    pub stolen: Option<bool>,
}

/// One weapon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponRow {
    /// Weapon id.
    pub id: String,
    /// Weapon type.
    #[serde(rename = "type")]
    pub weapon_type: Option<String>,
    /// Make.
    pub make: Option<String>,
    /// Model.
    pub model: Option<String>,
    /// Whether the weapon was recovered.
    pub recovered: Option<bool>,
}

/// One crime at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationCrimeRow {
    /// Crime id.
    pub crime_id: String,
    /// Crime category.
    pub crime_type: String,
    /// Crime date.
    pub date: Option<String>,
    /// Severity; unrecognized values decode as `None`.
    #[serde(default, deserialize_with = "Severity::deserialize_lenient")]
    pub severity: Option<Severity>,
}

/// One suspect active at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspectRow {
    /// Person name.
    pub name: String,
    /// Age.
    pub age: Option<i64>,
    /// Risk score in `[0, 1]`.
    pub risk_score: Option<f64>,
    /// Distinct crimes at the location.
    pub crime_count: i64,
}

/// One person within two `KNOWS` hops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRow {
    /// Connected person.
    pub name: String,
    /// Age.
    pub age: Option<i64>,
    /// Whether the person has a criminal record.
    pub has_record: Option<bool>,
}

/// One crime hotspot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotspotRow {
    /// Location name.
    pub location: String,
    /// District.
    pub district: Option<String>,
    /// Crimes at the location.
    pub crimes: i64,
}

/// One repeat offender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatOffenderRow {
    /// Person name.
    pub name: String,
    /// Age.
    pub age: Option<i64>,
    /// Crimes the person was party to.
    pub crimes: i64,
    /// Organization, if a member of one.
    pub organization: Option<String>,
}

/// One pair of acquainted offenders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRow {
    /// First person.
    pub person1: String,
    /// Second person.
    pub person2: String,
}

// ============================================================================
// Topic Data
// ============================================================================

/// The decoded result of one lookup.
///
/// Serializes untagged so a rendered topic looks like the records it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TopicData {
    /// Entity counts.
    Stats(DatabaseStats),
    /// Placeholder for a lookup whose failure is recorded rather than omitted.
    Unavailable {
        /// Why the data is missing.
        error: String,
    },
    /// `all_organizations`
    Organizations(Vec<OrganizationRow>),
    /// `organization_members`
    OrganizationMembers(Vec<MemberRow>),
    /// `org_<name>_crimes`
    OrganizationCrimes(Vec<OrgCrimeRow>),
    /// `all_evidence`
    Evidence(Vec<EvidenceRow>),
    /// `evidence_person_links`
    EvidenceLinks(Vec<EvidenceLinkRow>),
    /// `all_investigators`
    Investigators(Vec<InvestigatorRow>),
    /// `all_mo_patterns`
    MoPatterns(Vec<MoPatternRow>),
    /// `crimes_by_mo`
    CrimesByMo(Vec<CrimeByMoRow>),
    /// `all_vehicles`
    Vehicles(Vec<VehicleRow>),
    /// `all_weapons`
    Weapons(Vec<WeaponRow>),
    /// `crimes_in_<location>`
    LocationCrimes(Vec<LocationCrimeRow>),
    /// `suspects_in_<location>`
    LocationSuspects(Vec<SuspectRow>),
    /// `<name>_connections`
    Connections(Vec<ConnectionRow>),
    /// `hotspots`
    Hotspots(Vec<HotspotRow>),
    /// `repeat_offenders`
    RepeatOffenders(Vec<RepeatOffenderRow>),
    /// `criminal_networks`
    Networks(Vec<NetworkRow>),
}

impl TopicData {
    /// Returns the number of rows (stats count as one, placeholders as zero).
    #[must_use]
    pub const fn len(&self) -> usize {
        match self {
            Self::Stats(_) => 1,
            Self::Unavailable { .. } => 0,
            Self::Organizations(rows) => rows.len(),
            Self::OrganizationMembers(rows) => rows.len(),
            Self::OrganizationCrimes(rows) => rows.len(),
            Self::Evidence(rows) => rows.len(),
            Self::EvidenceLinks(rows) => rows.len(),
            Self::Investigators(rows) => rows.len(),
            Self::MoPatterns(rows) => rows.len(),
            Self::CrimesByMo(rows) => rows.len(),
            Self::Vehicles(rows) => rows.len(),
            Self::Weapons(rows) => rows.len(),
            Self::LocationCrimes(rows) => rows.len(),
            Self::LocationSuspects(rows) => rows.len(),
            Self::Connections(rows) => rows.len(),
            Self::Hotspots(rows) => rows.len(),
            Self::RepeatOffenders(rows) => rows.len(),
            Self::Networks(rows) => rows.len(),
        }
    }

    /// Returns whether the topic carries no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Context Mapping
// ============================================================================

/// Insertion-ordered mapping from topic key to retrieved data.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ContextMapping {
    topics: IndexMap<String, TopicData>,
}

impl ContextMapping {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a topic. Re-inserting a key replaces its data but keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, data: TopicData) {
        self.topics.insert(key.into(), data);
    }

    /// Returns a topic by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&TopicData> {
        self.topics.get(key)
    }

    /// Returns whether a topic is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.topics.contains_key(key)
    }

    /// Returns the topic keys in insertion order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.topics.keys().cloned().collect()
    }

    /// Iterates topics in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TopicData)> {
        self.topics.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Returns whether the mapping holds no topics.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Returns the statistics topic, if it was fetched successfully.
    #[must_use]
    pub fn stats(&self) -> Option<&DatabaseStats> {
        match self.topics.get(STATS_TOPIC) {
            Some(TopicData::Stats(stats)) => Some(stats),
            _ => None,
        }
    }
}

/// The result of answering one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// Answer text.
    pub answer: String,
    /// Topic keys present in the context mapping, in insertion order.
    pub sources: Vec<String>,
}
