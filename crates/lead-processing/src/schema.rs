//! Declarative column schema shared by every stage.
//!
//! All column names the pipeline refers to live here, along with the role each
//! column plays, whether it is dropped during selection, forced into the
//! categorical family, or expanded into indicator columns at feature
//! construction. Stages read these lists instead of carrying their own.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Role of a column in the lead dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    /// Row or customer key; never reaches the model
    Identifier,
    /// Supervised target
    Label,
    /// Event date used for range filtering
    Date,
    /// Acquisition channel
    Source,
    /// Regular model input
    Feature,
}

/// One entry of the declarative schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub role: ColumnRole,
    /// Removed by column selection, before any cleaning.
    #[serde(default)]
    pub dropped: bool,
    /// Cast to the categorical family regardless of raw dtype.
    #[serde(default)]
    pub force_categorical: bool,
    /// Expanded into drop-first indicator columns at feature construction.
    #[serde(default)]
    pub expand: bool,
}

impl ColumnSpec {
    fn new(name: &str, role: ColumnRole) -> Self {
        Self {
            name: name.to_string(),
            role,
            dropped: false,
            force_categorical: false,
            expand: false,
        }
    }

    fn dropped(mut self) -> Self {
        self.dropped = true;
        self
    }

    fn categorical(mut self) -> Self {
        self.force_categorical = true;
        self
    }

    fn expanded(mut self) -> Self {
        self.expand = true;
        self
    }
}

/// Mapping of one source value onto its group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceGroup {
    pub source: String,
    pub group: String,
}

/// Column layout of the lead dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSchema {
    pub lead_id: String,
    pub customer_code: String,
    pub label: String,
    pub date: String,
    pub source: String,
    /// Column derived from `source` after the drift snapshot.
    pub derived_group: String,
    /// The only source value kept by row cleaning.
    pub signup_source: String,
    /// Value stored for a missing customer code (a non-customer, not a gap).
    pub missing_customer_code: String,
    /// Group used for unmapped sources under the "Others" policy.
    pub others_group: String,
    pub source_groups: Vec<SourceGroup>,
    pub columns: Vec<ColumnSpec>,
}

/// The lead schema used when none is supplied.
pub static DEFAULT_SCHEMA: Lazy<LeadSchema> = Lazy::new(LeadSchema::lead_default);

impl Default for LeadSchema {
    fn default() -> Self {
        DEFAULT_SCHEMA.clone()
    }
}

impl LeadSchema {
    /// The schema of the lead-generation export.
    pub fn lead_default() -> Self {
        use ColumnRole::*;

        let mut columns = vec![
            ColumnSpec::new("lead_id", Identifier).categorical(),
            ColumnSpec::new("customer_code", Identifier).categorical(),
            ColumnSpec::new("date_part", Date),
            ColumnSpec::new("lead_indicator", Label).categorical(),
            ColumnSpec::new("customer_group", Feature).categorical().expanded(),
            ColumnSpec::new("onboarding", Feature).categorical().expanded(),
            ColumnSpec::new("bin_source", Feature).expanded(),
            // expanded last, after the derived group
            ColumnSpec::new("source", Source).categorical().expanded(),
        ];

        // behavioural flags, then demographic/tracking fields
        for name in [
            "is_active",
            "marketing_consent",
            "first_booking",
            "existing_customer",
            "last_seen",
            "domain",
            "country",
            "visited_learn_more_before_booking",
            "visited_faq",
        ] {
            columns.push(ColumnSpec::new(name, Feature).dropped());
        }

        let source_groups = [
            ("li", "socials"),
            ("fb", "socials"),
            ("organic", "group1"),
            ("signup", "group1"),
        ]
        .into_iter()
        .map(|(source, group)| SourceGroup {
            source: source.to_string(),
            group: group.to_string(),
        })
        .collect();

        Self {
            lead_id: "lead_id".to_string(),
            customer_code: "customer_code".to_string(),
            label: "lead_indicator".to_string(),
            date: "date_part".to_string(),
            source: "source".to_string(),
            derived_group: "bin_source".to_string(),
            signup_source: "signup".to_string(),
            missing_customer_code: "None".to_string(),
            others_group: "Others".to_string(),
            source_groups,
            columns,
        }
    }

    /// Columns removed by column selection.
    pub fn dropped_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.dropped)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Columns cast to the categorical family by type fixing.
    pub fn forced_categorical(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.force_categorical && !c.dropped)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Columns removed before feature construction (identifiers and the date).
    pub fn non_feature_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| matches!(c.role, ColumnRole::Identifier | ColumnRole::Date) && !c.dropped)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Columns expanded into indicators, in schema order.
    pub fn expanded_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.expand && !c.dropped)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Look up the spec of a column by name.
    pub fn spec(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Group of a source value, if the mapping covers it.
    pub fn group_for(&self, source: &str) -> Option<&str> {
        self.source_groups
            .iter()
            .find(|g| g.source == source)
            .map(|g| g.group.as_str())
    }
}
