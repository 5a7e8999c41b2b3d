//! Derived source grouping.

use crate::config::UnmappedSourcePolicy;
use crate::error::{PipelineError, Result};
use crate::schema::LeadSchema;
use crate::utils::string_values;
use polars::prelude::*;
use tracing::{debug, warn};

/// Add the grouped-source column derived from the source column.
///
/// Known sources map through the schema's grouping table. Unknown ones are
/// left missing or put in the "Others" group depending on `policy`.
pub fn derive_source_group(
    df: DataFrame,
    schema: &LeadSchema,
    policy: UnmappedSourcePolicy,
) -> Result<DataFrame> {
    let source = df
        .column(&schema.source)
        .map_err(|_| PipelineError::ColumnNotFound(schema.source.clone()))?;

    let mut unmapped = 0usize;
    let groups: Vec<Option<String>> = string_values(source.as_materialized_series())?
        .into_iter()
        .map(|value| {
            let value = value?;
            match schema.group_for(&value) {
                Some(group) => Some(group.to_string()),
                None => {
                    unmapped += 1;
                    match policy {
                        UnmappedSourcePolicy::Missing => None,
                        UnmappedSourcePolicy::Others => Some(schema.others_group.clone()),
                    }
                }
            }
        })
        .collect();

    if unmapped > 0 {
        warn!(
            "{} rows have a '{}' value outside the grouping map ({:?})",
            unmapped, schema.source, policy
        );
    }
    debug!("Derived '{}' from '{}'", schema.derived_group, schema.source);

    let mut df = df;
    df.with_column(Series::new(schema.derived_group.as_str().into(), groups))?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn groups(df: &DataFrame) -> Vec<Option<String>> {
        string_values(df.column("bin_source").unwrap().as_materialized_series()).unwrap()
    }

    fn frame() -> DataFrame {
        df!["source" => [Some("li"), Some("fb"), Some("organic"), Some("signup"), Some("tiktok"), None]]
            .unwrap()
    }

    #[test]
    fn test_known_sources_map_to_groups() {
        let schema = LeadSchema::default();
        let out = derive_source_group(frame(), &schema, UnmappedSourcePolicy::Missing).unwrap();
        let g = groups(&out);
        assert_eq!(g[0].as_deref(), Some("socials"));
        assert_eq!(g[1].as_deref(), Some("socials"));
        assert_eq!(g[2].as_deref(), Some("group1"));
        assert_eq!(g[3].as_deref(), Some("group1"));
    }

    #[test]
    fn test_unmapped_source_stays_missing() {
        let schema = LeadSchema::default();
        let out = derive_source_group(frame(), &schema, UnmappedSourcePolicy::Missing).unwrap();
        assert_eq!(groups(&out)[4], None);
        assert_eq!(groups(&out)[5], None);
    }

    #[test]
    fn test_unmapped_source_goes_to_others() {
        let schema = LeadSchema::default();
        let out = derive_source_group(frame(), &schema, UnmappedSourcePolicy::Others).unwrap();
        assert_eq!(groups(&out)[4].as_deref(), Some("Others"));
        // a missing source has nothing to group
        assert_eq!(groups(&out)[5], None);
    }

    #[test]
    fn test_missing_source_column() {
        let schema = LeadSchema::default();
        let df = df!["lead_id" => ["a"]].unwrap();
        let err = derive_source_group(df, &schema, UnmappedSourcePolicy::Missing).unwrap_err();
        assert!(err.is_schema_error());
    }
}
