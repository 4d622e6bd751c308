//! Lookup catalogue and trigger table.
//!
//! Every graph query the retrieval step can issue is a [`LookupId`]. Each one
//! owns a parameterized statement, a row cap and a decoder that turns raw
//! records into a typed [`TopicData`]. Decoders also re-apply the ordering and
//! cap the statement asks for, so a misbehaving backend cannot hand the answer
//! strategies more rows than expected.
//!
//! Which lookups run for a question is decided by [`TRIGGER_RULES`], a static
//! table of keyword groups, and by [`DISPATCH_ORDER`], which interleaves those
//! groups with the per-entity lookups.
//!
//! Entity names are always bound as parameters (`$name`, `$location`), never
//! spliced into statement text.

use crate::models::{
    ConnectionRow, CrimeByMoRow, DatabaseStats, EvidenceLinkRow, EvidenceRow, HotspotRow,
    InvestigatorRow, LocationCrimeRow, MemberRow, MoPatternRow, NetworkRow, OrgCrimeRow,
    OrganizationRow, RepeatOffenderRow, STATS_TOPIC, Significance, SuspectRow, TopicData,
    VehicleRow, WeaponRow,
};
use crate::storage::Record;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cmp::Ordering;

// ============================================================================
// Statements
// ============================================================================

/// Entity counts in a single row.
pub const STATS_STATEMENT: &str = "\
RETURN COUNT { (:Crime) } AS total_crimes, \
COUNT { (:Person) } AS total_persons, \
COUNT { (:Location) } AS total_locations, \
COUNT { (:Organization) } AS total_organizations, \
COUNT { (:Evidence) } AS total_evidence";

const ALL_ORGANIZATIONS: &str = "\
MATCH (o:Organization) \
RETURN o.name AS name, o.type AS type, o.territory AS territory, \
o.members_count AS members, o.activity_level AS activity \
ORDER BY o.members_count DESC LIMIT 30";

const ORGANIZATION_MEMBERS: &str = "\
MATCH (p:Person)-[r:MEMBER_OF]->(o:Organization) \
RETURN o.name AS organization, p.name AS member, p.age AS age, r.rank AS rank \
ORDER BY o.name, r.rank LIMIT 50";

const ORGANIZATION_CRIMES: &str = "\
MATCH (p:Person)-[:MEMBER_OF]->(o:Organization {name: $name}) \
MATCH (p)-[:PARTY_TO]->(c:Crime)-[:OCCURRED_AT]->(l:Location) \
RETURN c.type AS crime_type, c.date AS date, l.name AS location, p.name AS member \
ORDER BY c.date DESC LIMIT 30";

const ALL_EVIDENCE: &str = "\
MATCH (e:Evidence) \
RETURN e.id AS id, e.type AS type, e.description AS description, \
e.significance AS significance, e.verified AS verified \
ORDER BY CASE e.significance WHEN 'critical' THEN 1 WHEN 'high' THEN 2 WHEN 'medium' THEN 3 ELSE 4 END \
LIMIT 30";

const EVIDENCE_PERSON_LINKS: &str = "\
MATCH (e:Evidence)-[r:LINKS_TO]->(p:Person) \
RETURN e.id AS evidence_id, e.description AS evidence, p.name AS suspect, r.confidence AS confidence \
ORDER BY r.confidence DESC LIMIT 30";

const ALL_INVESTIGATORS: &str = "\
MATCH (i:Investigator) \
RETURN i.name AS name, i.badge_number AS badge, i.department AS department, \
i.specialization AS specialization, i.cases_solved AS solved, i.active_cases AS active \
ORDER BY i.cases_solved DESC LIMIT 30";

const ALL_MO_PATTERNS: &str = "\
MATCH (m:ModusOperandi) \
RETURN m.id AS id, m.description AS description, m.signature_element AS signature, \
m.frequency AS frequency \
ORDER BY m.frequency DESC LIMIT 30";

const CRIMES_BY_MO: &str = "\
MATCH (c:Crime)-[r:MATCHES_MO]->(m:ModusOperandi) \
RETURN m.description AS mo, c.id AS crime_id, c.type AS crime_type, r.similarity AS similarity \
ORDER BY r.similarity DESC LIMIT 40";

const ALL_VEHICLES: &str = "\
MATCH (v:Vehicle) \
RETURN v.id AS id, v.make AS make, v.model AS model, v.year AS year, v.color AS color, \
v.license_plate AS plate, v.reported_stolen AS stolen \
ORDER BY v.reported_stolen DESC LIMIT 30";

const ALL_WEAPONS: &str = "\
MATCH (w:Weapon) \
RETURN w.id AS id, w.type AS type, w.make AS make, w.model AS model, w.recovered AS recovered \
LIMIT 30";

const LOCATION_CRIMES: &str = "\
MATCH (c:Crime)-[:OCCURRED_AT]->(l:Location) \
WHERE toLower(l.name) CONTAINS toLower($location) \
RETURN c.id AS crime_id, c.type AS crime_type, c.date AS date, c.severity AS severity \
ORDER BY c.date DESC LIMIT 30";

const LOCATION_SUSPECTS: &str = "\
MATCH (p:Person)-[:PARTY_TO]->(c:Crime)-[:OCCURRED_AT]->(l:Location) \
WHERE toLower(l.name) CONTAINS toLower($location) \
WITH p, count(DISTINCT c) AS crime_count \
RETURN p.name AS name, p.age AS age, p.risk_score AS risk_score, crime_count \
ORDER BY crime_count DESC LIMIT 20";

const PERSON_CONNECTIONS: &str = "\
MATCH (p:Person)-[:KNOWS*1..2]-(connected:Person) \
WHERE toLower(p.name) CONTAINS toLower($name) \
RETURN DISTINCT connected.name AS name, connected.age AS age, connected.criminal_record AS has_record \
LIMIT 30";

const HOTSPOTS: &str = "\
MATCH (c:Crime)-[:OCCURRED_AT]->(l:Location) \
RETURN l.name AS location, l.district AS district, count(c) AS crimes \
ORDER BY crimes DESC LIMIT 15";

const REPEAT_OFFENDERS: &str = "\
MATCH (p:Person)-[:PARTY_TO]->(c:Crime) \
WITH p, count(c) AS crimes WHERE crimes >= 2 \
OPTIONAL MATCH (p)-[:MEMBER_OF]->(o:Organization) \
RETURN p.name AS name, p.age AS age, crimes, o.name AS organization \
ORDER BY crimes DESC LIMIT 20";

const CRIMINAL_NETWORKS: &str = "\
MATCH (p1:Person)-[:KNOWS]-(p2:Person) \
WHERE EXISTS { (p1)-[:PARTY_TO]->(:Crime) } \
AND EXISTS { (p2)-[:PARTY_TO]->(:Crime) } \
RETURN p1.name AS person1, p2.name AS person2 \
LIMIT 30";

// ============================================================================
// Lookups
// ============================================================================

/// A graph lookup the retrieval step can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupId {
    /// Every organization, largest first.
    AllOrganizations,
    /// Organization memberships.
    OrganizationMembers,
    /// Crimes committed by members of one organization.
    OrganizationCrimes,
    /// Evidence, most significant first.
    AllEvidence,
    /// Evidence linked to persons.
    EvidencePersonLinks,
    /// Investigators, most cases solved first.
    AllInvestigators,
    /// Modus-operandi patterns.
    AllMoPatterns,
    /// Crimes matched to patterns.
    CrimesByMo,
    /// Vehicles, stolen first.
    AllVehicles,
    /// Weapons.
    AllWeapons,
    /// Crimes at a location.
    LocationCrimes,
    /// Suspects active at a location.
    LocationSuspects,
    /// People within two `KNOWS` hops of a person.
    PersonConnections,
    /// Locations with the most crimes.
    Hotspots,
    /// People party to at least two crimes.
    RepeatOffenders,
    /// Acquainted pairs of offenders.
    CriminalNetworks,
}

impl LookupId {
    /// Returns the lookup name used in logs and metrics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AllOrganizations => "all_organizations",
            Self::OrganizationMembers => "organization_members",
            Self::OrganizationCrimes => "organization_crimes",
            Self::AllEvidence => "all_evidence",
            Self::EvidencePersonLinks => "evidence_person_links",
            Self::AllInvestigators => "all_investigators",
            Self::AllMoPatterns => "all_mo_patterns",
            Self::CrimesByMo => "crimes_by_mo",
            Self::AllVehicles => "all_vehicles",
            Self::AllWeapons => "all_weapons",
            Self::LocationCrimes => "location_crimes",
            Self::LocationSuspects => "location_suspects",
            Self::PersonConnections => "person_connections",
            Self::Hotspots => "hotspots",
            Self::RepeatOffenders => "repeat_offenders",
            Self::CriminalNetworks => "criminal_networks",
        }
    }

    /// Returns the statement text.
    #[must_use]
    pub const fn statement(&self) -> &'static str {
        match self {
            Self::AllOrganizations => ALL_ORGANIZATIONS,
            Self::OrganizationMembers => ORGANIZATION_MEMBERS,
            Self::OrganizationCrimes => ORGANIZATION_CRIMES,
            Self::AllEvidence => ALL_EVIDENCE,
            Self::EvidencePersonLinks => EVIDENCE_PERSON_LINKS,
            Self::AllInvestigators => ALL_INVESTIGATORS,
            Self::AllMoPatterns => ALL_MO_PATTERNS,
            Self::CrimesByMo => CRIMES_BY_MO,
            Self::AllVehicles => ALL_VEHICLES,
            Self::AllWeapons => ALL_WEAPONS,
            Self::LocationCrimes => LOCATION_CRIMES,
            Self::LocationSuspects => LOCATION_SUSPECTS,
            Self::PersonConnections => PERSON_CONNECTIONS,
            Self::Hotspots => HOTSPOTS,
            Self::RepeatOffenders => REPEAT_OFFENDERS,
            Self::CriminalNetworks => CRIMINAL_NETWORKS,
        }
    }

    /// Returns the maximum number of rows kept.
    #[must_use]
    pub const fn cap(&self) -> usize {
        match self {
            Self::OrganizationMembers => 50,
            Self::CrimesByMo => 40,
            Self::LocationSuspects | Self::RepeatOffenders => 20,
            Self::Hotspots => 15,
            _ => 30,
        }
    }

    /// Returns the parameter name the entity is bound to, for entity-scoped lookups.
    #[must_use]
    pub const fn entity_param(&self) -> Option<&'static str> {
        match self {
            Self::OrganizationCrimes | Self::PersonConnections => Some("name"),
            Self::LocationCrimes | Self::LocationSuspects => Some("location"),
            _ => None,
        }
    }

    /// Returns the topic key the result is stored under.
    ///
    /// Entity-scoped lookups embed the entity name verbatim.
    #[must_use]
    pub fn topic_key(&self, entity: Option<&str>) -> String {
        let entity = entity.unwrap_or_default();
        match self {
            Self::OrganizationCrimes => format!("org_{entity}_crimes"),
            Self::LocationCrimes => format!("crimes_in_{entity}"),
            Self::LocationSuspects => format!("suspects_in_{entity}"),
            Self::PersonConnections => format!("{entity}_connections"),
            _ => self.name().to_string(),
        }
    }

    /// Decodes records into topic data, re-sorting and capping them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if a record lacks a field the topic requires.
    pub fn decode(&self, topic: &str, records: Vec<Record>) -> Result<TopicData> {
        let cap = self.cap();
        let data = match self {
            Self::AllOrganizations => {
                let mut rows: Vec<OrganizationRow> = decode_rows(topic, records)?;
                rows.sort_by(|a, b| b.members.cmp(&a.members));
                TopicData::Organizations(capped(rows, cap))
            },
            Self::OrganizationMembers => {
                let mut rows: Vec<MemberRow> = decode_rows(topic, records)?;
                rows.sort_by(|a, b| {
                    a.organization
                        .cmp(&b.organization)
                        .then_with(|| nulls_last(a.rank.as_ref(), b.rank.as_ref(), Ord::cmp))
                });
                TopicData::OrganizationMembers(capped(rows, cap))
            },
            Self::OrganizationCrimes => {
                let mut rows: Vec<OrgCrimeRow> = decode_rows(topic, records)?;
                rows.sort_by(|a, b| nulls_last(b.date.as_ref(), a.date.as_ref(), Ord::cmp));
                TopicData::OrganizationCrimes(capped(rows, cap))
            },
            Self::AllEvidence => {
                let mut rows: Vec<EvidenceRow> = decode_rows(topic, records)?;
                rows.sort_by_key(|row| {
                    Significance::parse(row.significance.as_deref().unwrap_or_default())
                });
                TopicData::Evidence(capped(rows, cap))
            },
            Self::EvidencePersonLinks => {
                let mut rows: Vec<EvidenceLinkRow> = decode_rows(topic, records)?;
                rows.sort_by(|a, b| descending_f64(a.confidence, b.confidence));
                TopicData::EvidenceLinks(capped(rows, cap))
            },
            Self::AllInvestigators => {
                let mut rows: Vec<InvestigatorRow> = decode_rows(topic, records)?;
                rows.sort_by(|a, b| b.solved.cmp(&a.solved));
                TopicData::Investigators(capped(rows, cap))
            },
            Self::AllMoPatterns => {
                let mut rows: Vec<MoPatternRow> = decode_rows(topic, records)?;
                rows.sort_by(|a, b| descending_f64(a.frequency, b.frequency));
                TopicData::MoPatterns(capped(rows, cap))
            },
            Self::CrimesByMo => {
                let mut rows: Vec<CrimeByMoRow> = decode_rows(topic, records)?;
                rows.sort_by(|a, b| descending_f64(a.similarity, b.similarity));
                TopicData::CrimesByMo(capped(rows, cap))
            },
            Self::AllVehicles => {
                let mut rows: Vec<VehicleRow> = decode_rows(topic, records)?;
                // stolen, then not stolen, then unknown
                rows.sort_by_key(|row| match row.stolen {
                    Some(true) => 0,
                    Some(false) => 1,
                    None => 2,
                });
                TopicData::Vehicles(capped(rows, cap))
            },
            Self::AllWeapons => TopicData::Weapons(capped(decode_rows(topic, records)?, cap)),
            Self::LocationCrimes => {
                let mut rows: Vec<LocationCrimeRow> = decode_rows(topic, records)?;
                rows.sort_by(|a, b| nulls_last(b.date.as_ref(), a.date.as_ref(), Ord::cmp));
                TopicData::LocationCrimes(capped(rows, cap))
            },
            Self::LocationSuspects => {
                let mut rows: Vec<SuspectRow> = decode_rows(topic, records)?;
                rows.sort_by(|a, b| b.crime_count.cmp(&a.crime_count));
                TopicData::LocationSuspects(capped(rows, cap))
            },
            Self::PersonConnections => {
                let rows: Vec<ConnectionRow> = decode_rows(topic, records)?;
                let mut distinct: Vec<ConnectionRow> = Vec::with_capacity(rows.len());
                for row in rows {
                    if !distinct.contains(&row) {
                        distinct.push(row);
                    }
                }
                TopicData::Connections(capped(distinct, cap))
            },
            Self::Hotspots => {
                let mut rows: Vec<HotspotRow> = decode_rows(topic, records)?;
                rows.sort_by(|a, b| b.crimes.cmp(&a.crimes));
                TopicData::Hotspots(capped(rows, cap))
            },
            Self::RepeatOffenders => {
                let mut rows: Vec<RepeatOffenderRow> = decode_rows(topic, records)?;
                rows.retain(|row| row.crimes >= 2);
                rows.sort_by(|a, b| b.crimes.cmp(&a.crimes));
                TopicData::RepeatOffenders(capped(rows, cap))
            },
            Self::CriminalNetworks => {
                let rows: Vec<NetworkRow> = decode_rows(topic, records)?;
                TopicData::Networks(capped(rows, cap))
            },
        };
        Ok(data)
    }
}

/// Decodes the statistics row. No rows at all means an empty graph.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the row lacks a count.
pub fn decode_stats(records: Vec<Record>) -> Result<DatabaseStats> {
    match records.into_iter().next() {
        None => Ok(DatabaseStats::default()),
        Some(record) => {
            serde_json::from_value(Value::Object(record)).map_err(|e| Error::Decode {
                topic: STATS_TOPIC.to_string(),
                cause: e.to_string(),
            })
        },
    }
}

fn decode_rows<T: DeserializeOwned>(topic: &str, records: Vec<Record>) -> Result<Vec<T>> {
    records
        .into_iter()
        .map(|record| {
            serde_json::from_value(Value::Object(record)).map_err(|e| Error::Decode {
                topic: topic.to_string(),
                cause: e.to_string(),
            })
        })
        .collect()
}

fn capped<T>(mut rows: Vec<T>, cap: usize) -> Vec<T> {
    rows.truncate(cap);
    rows
}

/// Orders present values with `cmp` and puts missing ones last.
fn nulls_last<T>(a: Option<&T>, b: Option<&T>, cmp: impl Fn(&T, &T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => cmp(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn descending_f64(a: Option<f64>, b: Option<f64>) -> Ordering {
    nulls_last(a.as_ref(), b.as_ref(), |a, b| b.total_cmp(a))
}

// ============================================================================
// Trigger Table
// ============================================================================

/// A keyword group that activates a set of lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerCategory {
    /// Gangs, crews, cartels.
    Organizations,
    /// Evidence and forensics.
    Evidence,
    /// Detectives and case load.
    Investigators,
    /// Modus operandi.
    ModusOperandi,
    /// Cars and plates.
    Vehicles,
    /// Guns and knives.
    Weapons,
    /// Where crime concentrates.
    Hotspots,
    /// Repeat and dangerous offenders.
    RepeatOffenders,
    /// Who knows whom.
    SocialNetworks,
}

/// One row of the trigger table.
#[derive(Debug, Clone, Copy)]
pub struct TriggerRule {
    /// The keyword group.
    pub category: TriggerCategory,
    /// Lowercase keywords, matched as substrings of the lowercased question.
    pub keywords: &'static [&'static str],
    /// Lookups to run when the rule fires, in order.
    pub lookups: &'static [LookupId],
    /// Whether any extracted organization also fires the rule.
    pub fires_on_organizations: bool,
}

impl TriggerRule {
    /// Returns whether the rule fires for a lowercased question.
    #[must_use]
    pub fn fires(&self, lowered_question: &str, has_organizations: bool) -> bool {
        (self.fires_on_organizations && has_organizations)
            || self
                .keywords
                .iter()
                .any(|keyword| lowered_question.contains(keyword))
    }
}

/// The keyword trigger table.
pub static TRIGGER_RULES: &[TriggerRule] = &[
    TriggerRule {
        category: TriggerCategory::Organizations,
        keywords: &["organization", "gang", "crew", "syndicate", "cartel", "ring"],
        lookups: &[LookupId::AllOrganizations, LookupId::OrganizationMembers],
        fires_on_organizations: true,
    },
    TriggerRule {
        category: TriggerCategory::Evidence,
        keywords: &["evidence", "proof", "forensic", "dna", "fingerprint"],
        lookups: &[LookupId::AllEvidence, LookupId::EvidencePersonLinks],
        fires_on_organizations: false,
    },
    TriggerRule {
        category: TriggerCategory::Investigators,
        keywords: &["investigator", "detective", "officer", "assigned"],
        lookups: &[LookupId::AllInvestigators],
        fires_on_organizations: false,
    },
    TriggerRule {
        category: TriggerCategory::ModusOperandi,
        keywords: &["modus operandi", "mo", "pattern", "method", "signature", "similar"],
        lookups: &[LookupId::AllMoPatterns, LookupId::CrimesByMo],
        fires_on_organizations: false,
    },
    TriggerRule {
        category: TriggerCategory::Vehicles,
        keywords: &["vehicle", "car", "truck", "getaway", "stolen"],
        lookups: &[LookupId::AllVehicles],
        fires_on_organizations: false,
    },
    TriggerRule {
        category: TriggerCategory::Weapons,
        keywords: &["weapon", "gun", "firearm", "knife", "armed"],
        lookups: &[LookupId::AllWeapons],
        fires_on_organizations: false,
    },
    TriggerRule {
        category: TriggerCategory::Hotspots,
        keywords: &["hotspot", "dangerous", "where", "most crime"],
        lookups: &[LookupId::Hotspots],
        fires_on_organizations: false,
    },
    TriggerRule {
        category: TriggerCategory::RepeatOffenders,
        keywords: &["repeat", "offender", "criminal", "suspect"],
        lookups: &[LookupId::RepeatOffenders],
        fires_on_organizations: false,
    },
    TriggerRule {
        category: TriggerCategory::SocialNetworks,
        keywords: &["network", "connected", "know", "associate"],
        lookups: &[LookupId::CriminalNetworks],
        fires_on_organizations: false,
    },
];

/// Returns the rule for a category.
#[must_use]
pub fn rule(category: TriggerCategory) -> Option<&'static TriggerRule> {
    TRIGGER_RULES.iter().find(|rule| rule.category == category)
}

/// Returns the categories whose rule fires for a question.
#[must_use]
pub fn fired_categories(question: &str, has_organizations: bool) -> Vec<TriggerCategory> {
    let lowered = question.to_lowercase();
    TRIGGER_RULES
        .iter()
        .filter(|rule| rule.fires(&lowered, has_organizations))
        .map(|rule| rule.category)
        .collect()
}

// ============================================================================
// Dispatch Order
// ============================================================================

/// One step of retrieval, in the order topics are inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStage {
    /// Run a keyword rule's lookups if it fires.
    Rule(TriggerCategory),
    /// Per extracted organization.
    Organizations,
    /// Per extracted location.
    Locations,
    /// Per extracted person.
    Persons,
}

/// Retrieval order after the statistics lookup.
pub static DISPATCH_ORDER: &[DispatchStage] = &[
    DispatchStage::Rule(TriggerCategory::Organizations),
    DispatchStage::Organizations,
    DispatchStage::Rule(TriggerCategory::Evidence),
    DispatchStage::Rule(TriggerCategory::Investigators),
    DispatchStage::Rule(TriggerCategory::ModusOperandi),
    DispatchStage::Rule(TriggerCategory::Vehicles),
    DispatchStage::Rule(TriggerCategory::Weapons),
    DispatchStage::Locations,
    DispatchStage::Persons,
    DispatchStage::Rule(TriggerCategory::Hotspots),
    DispatchStage::Rule(TriggerCategory::RepeatOffenders),
    DispatchStage::Rule(TriggerCategory::SocialNetworks),
];

/// Lookups issued once per extracted location.
pub static LOCATION_LOOKUPS: &[LookupId] = &[LookupId::LocationCrimes, LookupId::LocationSuspects];

/// Lookups issued once per extracted organization.
pub static ORGANIZATION_LOOKUPS: &[LookupId] = &[LookupId::OrganizationCrimes];

/// Lookups issued once per extracted person.
pub static PERSON_LOOKUPS: &[LookupId] = &[LookupId::PersonConnections];
