//! Crime-investigation graph vocabulary.
//!
//! Crime categories plus the severity and significance ordinals stored on
//! crime and evidence nodes. The retrieval core treats the graph as
//! read-only; these types exist so lookups and formatters can reason about
//! values instead of comparing raw strings.

use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::fmt;

// ============================================================================
// Crime Types
// ============================================================================

/// Crime categories the entity extractor recognizes in questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrimeType {
    /// Theft.
    Theft,
    /// Battery.
    Battery,
    /// Criminal damage.
    CriminalDamage,
    /// Assault.
    Assault,
    /// Burglary.
    Burglary,
    /// Motor vehicle theft.
    MotorVehicleTheft,
    /// Robbery.
    Robbery,
    /// Deceptive practice (fraud).
    DeceptivePractice,
    /// Criminal trespass.
    CriminalTrespass,
    /// Narcotics.
    Narcotics,
    /// Weapons violation.
    WeaponsViolation,
}

impl CrimeType {
    /// The closed list of labels the entity extractor recognizes.
    ///
    /// Order matters: extraction reports matches in this order.
    pub const EXTRACTABLE: [Self; 11] = [
        Self::Theft,
        Self::Battery,
        Self::CriminalDamage,
        Self::Assault,
        Self::Burglary,
        Self::MotorVehicleTheft,
        Self::Robbery,
        Self::DeceptivePractice,
        Self::CriminalTrespass,
        Self::Narcotics,
        Self::WeaponsViolation,
    ];

    /// Returns the canonical label stored on `Crime.type`.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Theft => "Theft",
            Self::Battery => "Battery",
            Self::CriminalDamage => "Criminal Damage",
            Self::Assault => "Assault",
            Self::Burglary => "Burglary",
            Self::MotorVehicleTheft => "Motor Vehicle Theft",
            Self::Robbery => "Robbery",
            Self::DeceptivePractice => "Deceptive Practice",
            Self::CriminalTrespass => "Criminal Trespass",
            Self::Narcotics => "Narcotics",
            Self::WeaponsViolation => "Weapons Violation",
        }
    }
}

impl fmt::Display for CrimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ============================================================================
// Ordinals
// ============================================================================

/// Crime severity, ordered `Minor < Moderate < Severe < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Minor.
    Minor,
    /// Moderate.
    Moderate,
    /// Severe.
    Severe,
    /// Critical.
    Critical,
}

impl Severity {
    /// Returns the stored string value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
            Self::Critical => "critical",
        }
    }

    /// Parses a stored severity value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "minor" => Some(Self::Minor),
            "moderate" => Some(Self::Moderate),
            "severe" => Some(Self::Severe),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Deserializes an optional stored value, mapping unrecognized strings to `None`.
    ///
    /// One odd severity must not fail a whole topic.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is neither null nor a string.
    pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<Self>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(Self::parse))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Evidence significance ranking: `critical` > `high` > `medium` > anything else.
///
/// This is a fixed ordinal used to order evidence lists, not a numeric score.
/// Unknown or missing values rank last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Significance {
    /// Critical evidence.
    Critical,
    /// High significance.
    High,
    /// Medium significance.
    Medium,
    /// Low or unrecognized significance.
    Other,
}

impl Significance {
    /// Classifies a stored significance value.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" => Self::Medium,
            _ => Self::Other,
        }
    }

    /// Returns the sort rank (1 sorts first).
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Critical => 1,
            Self::High => 2,
            Self::Medium => 3,
            Self::Other => 4,
        }
    }
}

impl PartialOrd for Significance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Significance {
    /// More significant evidence compares as *less*, so ascending sorts put it first.
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Row {
        #[serde(default, deserialize_with = "Severity::deserialize_lenient")]
        severity: Option<Severity>,
    }

    #[test]
    fn test_extractable_labels_are_distinct() {
        let mut labels: Vec<_> = CrimeType::EXTRACTABLE.iter().map(CrimeType::label).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), CrimeType::EXTRACTABLE.len());
        assert_eq!(CrimeType::MotorVehicleTheft.to_string(), "Motor Vehicle Theft");
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Minor < Severity::Moderate);
        assert!(Severity::Moderate < Severity::Severe);
        assert!(Severity::Severe < Severity::Critical);
        assert_eq!(Severity::parse("CRITICAL"), Some(Severity::Critical));
    }

    #[test]
    fn test_severity_lenient_decode() {
        let row: Row = serde_json::from_str(r#"{"severity": "severe"}"#).unwrap();
        assert_eq!(row.severity, Some(Severity::Severe));
        let row: Row = serde_json::from_str(r#"{"severity": "catastrophic"}"#).unwrap();
        assert_eq!(row.severity, None);
        let row: Row = serde_json::from_str(r#"{"severity": null}"#).unwrap();
        assert_eq!(row.severity, None);
        let row: Row = serde_json::from_str("{}").unwrap();
        assert_eq!(row.severity, None);
        assert!(serde_json::from_str::<Row>(r#"{"severity": 3}"#).is_err());
    }

    #[test]
    fn test_significance_sorts_critical_first() {
        let mut values = vec![
            Significance::parse("low"),
            Significance::parse("critical"),
            Significance::parse("medium"),
            Significance::parse("high"),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Significance::Critical,
                Significance::High,
                Significance::Medium,
                Significance::Other
            ]
        );
    }
}
