//! Deterministic names of a tenant's remote resources.

use crate::{Partitioning, TenantKey};
use chrono::NaiveDate;

/// Date format embedded in daily partition names.
const PARTITION_DATE_FORMAT: &str = "%Y.%m.%d";

/// Suffix of the first physical index under sequence partitioning.
const FIRST_SEQUENCE_SUFFIX: &str = "000001";

/// Separates a write alias from its partition suffix. Canonical tenant keys
/// and validated prefixes never contain it, so one tenant's index pattern
/// cannot match another tenant's indices.
const PARTITION_SEPARATOR: char = '.';

/// Names of the policy, template, index pattern and write alias that make
/// up one tenant's resource set.
///
/// The template references the policy by name and matches indices through
/// `index_pattern`; every physical index is reached through `write_alias`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    pub policy: String,
    pub template: String,
    pub index_pattern: String,
    pub write_alias: String,
}

impl ResourceNames {
    /// Derive names from the configured prefix and a tenant key.
    ///
    /// Keys are already canonical, so distinct keys never share names.
    pub fn for_key(prefix: &str, key: &TenantKey) -> Self {
        let base = format!("{}-{}", prefix, key.as_str());
        Self {
            policy: format!("{}-policy", base),
            template: format!("{}-template", base),
            index_pattern: format!("{}{}*", base, PARTITION_SEPARATOR),
            write_alias: base,
        }
    }

    /// Name of the physical index created when the tenant is first
    /// provisioned.
    pub fn initial_index(&self, partitioning: Partitioning, today: NaiveDate) -> String {
        match partitioning {
            Partitioning::Sequence => format!(
                "{}{}{}",
                self.write_alias, PARTITION_SEPARATOR, FIRST_SEQUENCE_SUFFIX
            ),
            Partitioning::Daily => self.daily_index(today),
        }
    }

    /// Name of the daily partition for `date`.
    pub fn daily_index(&self, date: NaiveDate) -> String {
        format!(
            "{}{}{}",
            self.write_alias,
            PARTITION_SEPARATOR,
            date.format(PARTITION_DATE_FORMAT)
        )
    }

    /// Parse the partition date back out of a daily index name.
    ///
    /// Returns `None` for names that do not belong to this alias or do not
    /// end in a date.
    pub fn partition_date(&self, index_name: &str) -> Option<NaiveDate> {
        let suffix = index_name
            .strip_prefix(self.write_alias.as_str())?
            .strip_prefix(PARTITION_SEPARATOR)?;
        NaiveDate::parse_from_str(suffix, PARTITION_DATE_FORMAT).ok()
    }
}
