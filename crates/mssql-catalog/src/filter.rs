//! Visibility filters for schema and table names.
//!
//! Filters only *hide* names from enumeration and lookup; they never cause a
//! query against a hidden name to silently return empty. A name that fails
//! the filter resolves as "not found" at bind time instead.

use regex::Regex;

use crate::error::CatalogError;

/// Compiled, case-insensitive schema/table visibility filters, built once at
/// attach time from user-supplied pattern strings.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    schema_pattern: Option<Regex>,
    table_pattern: Option<Regex>,
}

impl CatalogFilter {
    /// Compile a filter from optional schema/table regex source strings.
    /// Both patterns are compiled case-insensitively regardless of how the
    /// caller wrote them.
    pub fn new(
        schema_pattern: Option<&str>,
        table_pattern: Option<&str>,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            schema_pattern: schema_pattern.map(Self::compile).transpose()?,
            table_pattern: table_pattern.map(Self::compile).transpose()?,
        })
    }

    fn compile(pattern: &str) -> Result<Regex, CatalogError> {
        regex::RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(CatalogError::from)
    }

    /// Whether a schema name passes the schema filter (or there is none).
    #[must_use]
    pub fn schema_visible(&self, name: &str) -> bool {
        self.schema_pattern
            .as_ref()
            .is_none_or(|re| re.is_match(name))
    }

    /// Whether a table/view name passes the table filter (or there is none).
    #[must_use]
    pub fn table_visible(&self, name: &str) -> bool {
        self.table_pattern
            .as_ref()
            .is_none_or(|re| re.is_match(name))
    }

    /// Whether `(schema, table)` passes both filters.
    #[must_use]
    pub fn is_visible(&self, schema: &str, table: &str) -> bool {
        self.schema_visible(schema) && self.table_visible(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_admits_everything() {
        let f = CatalogFilter::default();
        assert!(f.is_visible("dbo", "orders"));
    }

    #[test]
    fn schema_filter_is_case_insensitive() {
        let f = CatalogFilter::new(Some("^dbo$"), None).unwrap();
        assert!(f.schema_visible("DBO"));
        assert!(!f.schema_visible("sales"));
    }

    #[test]
    fn table_filter_hides_non_matching_tables() {
        let f = CatalogFilter::new(None, Some("^customer")).unwrap();
        assert!(f.table_visible("customers"));
        assert!(!f.table_visible("orders"));
    }

    #[test]
    fn invalid_pattern_is_rejected_at_construction() {
        assert!(CatalogFilter::new(Some("("), None).is_err());
    }
}
