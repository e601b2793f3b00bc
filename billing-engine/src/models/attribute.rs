//! Job attribute (EAV) model for billing-engine.
//!
//! Each job type defines its own form fields, so job facts are stored as
//! `(job_id, field_key, field_value)` rows instead of fixed columns. Field
//! names are normalized once at write time ([`canonical_key`]); lookups
//! normalize the query the same way, so `"No of CAC"`, `no_of_cac` and
//! `noofcac` all resolve to the same entry.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::utils::money::{parse_money, parse_money_opt};
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

/// Canonical form of a field name: lowercase, alphanumerics only.
pub fn canonical_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// One stored attribute row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobAttribute {
    pub attribute_id: Uuid,
    pub job_id: Uuid,
    /// Canonical lookup key, unique per job.
    pub field_key: String,
    /// Field name as the operator's form defined it, kept for display.
    pub field_name: String,
    pub field_value: String,
    pub created_utc: DateTime<Utc>,
}

/// Input pair for replacing a job's attribute set.
#[derive(Debug, Clone)]
pub struct SetAttribute {
    pub field_name: String,
    pub field_value: String,
}

#[derive(Debug, Clone, Default)]
struct Entry {
    name: String,
    value: String,
}

/// All attributes of one job, keyed canonically.
///
/// Iteration order is stable (sorted by canonical key), which is what the
/// invoice layout relies on for display.
#[derive(Debug, Clone, Default)]
pub struct AttributeMap {
    entries: BTreeMap<String, Entry>,
}

impl AttributeMap {
    pub fn from_rows(rows: Vec<JobAttribute>) -> Self {
        let mut entries = BTreeMap::new();
        for row in rows {
            entries.insert(
                row.field_key,
                Entry {
                    name: row.field_name,
                    value: row.field_value,
                },
            );
        }
        Self { entries }
    }

    /// Build from display-name/value pairs, canonicalizing the keys.
    /// Later pairs win on key collision, matching the store's unique
    /// `(job_id, field_key)` constraint.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut entries = BTreeMap::new();
        for (name, value) in pairs {
            let name = name.into();
            entries.insert(
                canonical_key(&name),
                Entry {
                    name,
                    value: value.into(),
                },
            );
        }
        Self { entries }
    }

    /// Tolerant lookup: the requested name is canonicalized before the match.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&canonical_key(name))
            .map(|e| e.value.as_str())
    }

    /// Monetary value of a field, zero when absent or unparsable.
    pub fn money(&self, name: &str) -> Decimal {
        parse_money(self.value(name))
    }

    /// Monetary value of a field, `None` when absent or unparsable.
    pub fn money_opt(&self, name: &str) -> Option<Decimal> {
        parse_money_opt(self.value(name))
    }

    /// Integer count of a field, zero when absent or unparsable. A decimal
    /// entry truncates, matching how operators key "3.0" certificates.
    pub fn count(&self, name: &str) -> i64 {
        let Some(raw) = self.value(name) else { return 0 };
        let trimmed = raw.trim();
        if let Ok(n) = i64::from_str(trimmed) {
            return n;
        }
        Decimal::from_str(trimmed)
            .ok()
            .and_then(|d| d.trunc().to_i64())
            .unwrap_or(0)
    }

    /// `(display_name, value)` pairs in stable key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|e| (e.name.as_str(), e.value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn canonical_key_collapses_variants() {
        assert_eq!(canonical_key("No of CAC"), "noofcac");
        assert_eq!(canonical_key("no_of_cac"), "noofcac");
        assert_eq!(canonical_key("noofcac"), "noofcac");
        assert_eq!(canonical_key("FOB Value"), "fobvalue");
        assert_eq!(canonical_key("FOB-Value (USD)"), "fobvalueusd");
    }

    #[test]
    fn lookup_is_tolerant_to_naming_variants() {
        let attrs = AttributeMap::from_pairs([("no_of_cac", "3")]);
        assert_eq!(attrs.value("No of CAC"), Some("3"));
        assert_eq!(attrs.value("NOOFCAC"), Some("3"));
        assert_eq!(attrs.count("No of CAC"), 3);
    }

    #[test]
    fn money_defaults_to_zero() {
        let attrs = AttributeMap::from_pairs([("Application Fee", "abc")]);
        assert_eq!(attrs.money("Application Fee"), Decimal::ZERO);
        assert_eq!(attrs.money("Missing Field"), Decimal::ZERO);
        assert_eq!(attrs.money_opt("Application Fee"), None);
    }

    #[test]
    fn count_truncates_decimal_entries() {
        let attrs = AttributeMap::from_pairs([("No of COO", "2.0"), ("No of CAC", "x")]);
        assert_eq!(attrs.count("No of COO"), 2);
        assert_eq!(attrs.count("No of CAC"), 0);
    }

    #[test]
    fn replacement_semantics_drop_prior_fields() {
        let before = AttributeMap::from_pairs([("FOB Value", "1000"), ("Port", "INMAA")]);
        assert_eq!(before.value("Port"), Some("INMAA"));

        // A replace builds a fresh map from the new set only.
        let after = AttributeMap::from_pairs([("FOB Value", "2000")]);
        assert_eq!(after.money_opt("FOB Value"), Some(dec!(2000)));
        assert_eq!(after.value("Port"), None);
        assert_eq!(after.len(), 1);
    }

    #[test]
    fn iteration_is_stable_by_key() {
        let attrs =
            AttributeMap::from_pairs([("Port", "INMAA"), ("FOB Value", "10"), ("No of CAC", "1")]);
        let names: Vec<&str> = attrs.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["FOB Value", "No of CAC", "Port"]);
    }
}
