//! Investigation overview.
//!
//! The at-a-glance numbers an investigator sees before asking anything:
//! graph totals, the busiest locations, the crime-type distribution and the
//! latest crimes, plus two analytics sections: crimes per hour of day and the
//! crime categories that share offenders.

use crate::storage::{GraphDatastore, Params, Record};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

/// Totals in a single row.
pub const TOTALS_STATEMENT: &str = "\
RETURN COUNT { (:Crime) } AS crimes, \
COUNT { (:Person) } AS persons, \
COUNT { (:Location) } AS locations, \
COUNT { ()-[:PARTY_TO]->() } AS connections";

/// Locations with the most crimes.
pub const TOP_HOTSPOTS_STATEMENT: &str = "\
MATCH (c:Crime)-[:OCCURRED_AT]->(l:Location) \
RETURN l.name AS location, count(c) AS crimes \
ORDER BY crimes DESC LIMIT 10";

/// Crime counts per category.
pub const CRIME_TYPES_STATEMENT: &str = "\
MATCH (c:Crime) \
RETURN c.type AS type, count(*) AS count \
ORDER BY count DESC LIMIT 10";

/// The latest crimes.
pub const RECENT_CRIMES_STATEMENT: &str = "\
MATCH (c:Crime)-[:OCCURRED_AT]->(l:Location) \
RETURN c.type AS type, c.date AS date, c.time AS time, l.name AS location \
ORDER BY c.date DESC, c.time DESC LIMIT 5";

/// Crimes per hour of day, from the `HH` prefix of `Crime.time`.
pub const HOURLY_PATTERN_STATEMENT: &str = "\
MATCH (c:Crime) WHERE c.time IS NOT NULL \
WITH substring(c.time, 0, 2) AS hour, count(*) AS count \
RETURN hour, count \
ORDER BY hour";

/// Pairs of crime categories committed by the same person.
pub const TYPE_CORRELATION_STATEMENT: &str = "\
MATCH (p:Person)-[:PARTY_TO]->(c1:Crime) \
MATCH (p)-[:PARTY_TO]->(c2:Crime) \
WHERE c1 <> c2 \
RETURN c1.type AS type1, c2.type AS type2, count(*) AS correlation \
ORDER BY correlation DESC LIMIT 10";

const TOP_HOTSPOTS: usize = 10;
const TOP_CORRELATIONS: usize = 10;
const TOP_CRIME_TYPES: usize = 10;
const RECENT_CRIMES: usize = 5;

/// Graph totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverviewTotals {
    /// `Crime` nodes.
    pub crimes: u64,
    /// `Person` nodes.
    pub persons: u64,
    /// `Location` nodes.
    pub locations: u64,
    /// `PARTY_TO` relationships.
    pub connections: u64,
}

/// Crimes at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationCount {
    /// Location name.
    pub location: String,
    /// Crimes recorded there.
    pub crimes: u64,
}

/// Crimes of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrimeTypeCount {
    /// Crime category.
    #[serde(rename = "type")]
    pub crime_type: String,
    /// Number of crimes.
    pub count: u64,
}

/// One recent crime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentCrime {
    /// Crime category.
    #[serde(rename = "type")]
    pub crime_type: String,
    /// Date (`YYYY-MM-DD`).
    pub date: Option<String>,
    /// Time (`HH:MM`).
    pub time: Option<String>,
    /// Location name.
    pub location: Option<String>,
}

/// Crimes recorded in one hour of the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyCount {
    /// Two-digit hour (`00`-`23`).
    pub hour: String,
    /// Crimes in that hour.
    pub count: u64,
}

/// Two crime categories committed by the same offenders.
///
/// Pairs are ordered, so `(Theft, Robbery)` and `(Robbery, Theft)` are counted
/// separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCorrelation {
    /// First category.
    pub type1: String,
    /// Second category.
    pub type2: String,
    /// Crime pairs sharing a person.
    pub correlation: u64,
}

/// The overview report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Overview {
    /// Graph totals.
    pub totals: OverviewTotals,
    /// Busiest locations, most crimes first.
    pub hotspots: Vec<LocationCount>,
    /// Crime-type distribution, largest first.
    pub crime_types: Vec<CrimeTypeCount>,
    /// Latest crimes, newest first.
    pub recent_crimes: Vec<RecentCrime>,
    /// Crimes per hour, earliest hour first.
    pub hourly_pattern: Vec<HourlyCount>,
    /// Most frequent category pairs, strongest first.
    pub type_correlation: Vec<TypeCorrelation>,
}

/// Builds the overview report.
pub struct OverviewService {
    datastore: Arc<dyn GraphDatastore>,
}

impl OverviewService {
    /// Creates the service.
    #[must_use]
    pub fn new(datastore: Arc<dyn GraphDatastore>) -> Self {
        Self { datastore }
    }

    /// Runs the overview queries.
    ///
    /// # Errors
    ///
    /// Returns the first datastore or decode error.
    #[instrument(skip(self), fields(operation = "overview"))]
    pub fn overview(&self) -> Result<Overview> {
        let totals = self
            .fetch::<OverviewTotals>("totals", TOTALS_STATEMENT)?
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut hotspots: Vec<LocationCount> = self.fetch("hotspots", TOP_HOTSPOTS_STATEMENT)?;
        hotspots.sort_by(|a, b| b.crimes.cmp(&a.crimes));
        hotspots.truncate(TOP_HOTSPOTS);

        let mut crime_types: Vec<CrimeTypeCount> =
            self.fetch("crime_types", CRIME_TYPES_STATEMENT)?;
        crime_types.sort_by(|a, b| b.count.cmp(&a.count));
        crime_types.truncate(TOP_CRIME_TYPES);

        let mut recent_crimes: Vec<RecentCrime> =
            self.fetch("recent_crimes", RECENT_CRIMES_STATEMENT)?;
        recent_crimes.sort_by(|a, b| (&b.date, &b.time).cmp(&(&a.date, &a.time)));
        recent_crimes.truncate(RECENT_CRIMES);

        let mut hourly_pattern: Vec<HourlyCount> =
            self.fetch("hourly_pattern", HOURLY_PATTERN_STATEMENT)?;
        hourly_pattern.sort_by(|a, b| a.hour.cmp(&b.hour));

        let mut type_correlation: Vec<TypeCorrelation> =
            self.fetch("type_correlation", TYPE_CORRELATION_STATEMENT)?;
        type_correlation.sort_by(|a, b| b.correlation.cmp(&a.correlation));
        type_correlation.truncate(TOP_CORRELATIONS);

        Ok(Overview {
            totals,
            hotspots,
            crime_types,
            recent_crimes,
            hourly_pattern,
            type_correlation,
        })
    }

    fn fetch<T: DeserializeOwned>(&self, section: &str, statement: &str) -> Result<Vec<T>> {
        let records = self.datastore.query(statement, &Params::new())?;
        records.into_iter().map(|record| decode(section, record)).collect()
    }
}

fn decode<T: DeserializeOwned>(section: &str, record: Record) -> Result<T> {
    serde_json::from_value(Value::Object(record)).map_err(|e| Error::Decode {
        topic: format!("overview.{section}"),
        cause: e.to_string(),
    })
}
