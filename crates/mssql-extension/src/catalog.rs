//! Plan-time surface: wires [`mssql_catalog`], [`mssql_pushdown`], and
//! [`mssql_writer`] together behind a single handle a host engine's planner
//! can call against.

use std::sync::Arc;
use std::time::Duration;

use mssql_client::{Client, Ready};
use mssql_catalog::{CatalogFilter, ColumnInfo, MetadataCache, ObjectKind, PrimaryKeyInfo};
use mssql_pushdown::{translate_filter_set, ColumnResolver, TableFilterSet};
use mssql_types::bracket_identifier;
use mssql_writer::{
    ColumnDef, CreateTableAsSelect, DeleteBatch, InsertBatch, UpdateBatch, WriterConfig,
};

use crate::error::ExtError;

/// A planned table scan, ready to execute as-is or (if
/// `needs_local_refilter` is set) with the original predicate re-applied to
/// returned rows.
#[derive(Debug, Clone)]
pub struct TableScanPlan {
    /// The full `SELECT ... FROM ... [WHERE ...]` text.
    pub sql: String,
    /// Whether the pushed-down `WHERE` clause alone is equivalent to the
    /// requested filter set.
    pub needs_local_refilter: bool,
}

/// Plan-time and catalog-lookup entry point for a single attached database.
pub struct CatalogHandle {
    cache: Arc<MetadataCache>,
    writer_config: WriterConfig,
}

impl CatalogHandle {
    /// Build a handle over a fresh metadata cache with the given TTL and
    /// visibility filter.
    #[must_use]
    pub fn new(ttl: Duration, filter: CatalogFilter) -> Self {
        Self {
            cache: MetadataCache::new_shared(ttl, filter),
            writer_config: WriterConfig::default(),
        }
    }

    /// The underlying shared cache, for callers (e.g. a cache-refresh
    /// scalar function) that need direct access.
    #[must_use]
    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    /// List visible schemas.
    pub async fn list_schemas(&self, conn: &mut Client<Ready>) -> Result<Vec<String>, ExtError> {
        Ok(self.cache.list_schemas(conn).await?)
    }

    /// List visible tables/views in a schema.
    pub async fn list_tables(
        &self,
        conn: &mut Client<Ready>,
        schema: &str,
    ) -> Result<Vec<String>, ExtError> {
        Ok(self.cache.list_tables(conn, schema).await?)
    }

    /// Describe a table's columns and object kind.
    pub async fn describe_table(
        &self,
        conn: &mut Client<Ready>,
        schema: &str,
        table: &str,
    ) -> Result<(ObjectKind, Vec<ColumnInfo>), ExtError> {
        Ok(self.cache.describe_table(conn, schema, table).await?)
    }

    /// Fetch primary-key metadata for a table.
    pub async fn primary_key(
        &self,
        conn: &mut Client<Ready>,
        schema: &str,
        table: &str,
    ) -> Result<PrimaryKeyInfo, ExtError> {
        Ok(self.cache.primary_key(conn, schema, table).await?)
    }

    /// Build a `SELECT` plan for a scan over `projection` (column names, in
    /// the scan's order) with pushed-down filters.
    ///
    /// `in_active_transaction` rejects the scan outright when `true`: a
    /// catalog scan opens a second streaming result set on the same
    /// logical connection a pinned write is using, which this driver
    /// cannot support without MARS. Callers that need to read inside a
    /// transaction must go through an explicit SQL function instead.
    pub async fn plan_table_scan(
        &self,
        conn: &mut Client<Ready>,
        schema: &str,
        table: &str,
        projection: &[String],
        filters: &TableFilterSet,
        in_active_transaction: bool,
    ) -> Result<TableScanPlan, ExtError> {
        if in_active_transaction {
            return Err(ExtError::PlanTime(format!(
                "cannot scan {schema}.{table} by name inside an active transaction; \
                 use an explicit SQL function instead (no MARS support)"
            )));
        }
        let (_, all_columns) = self.describe_table(conn, schema, table).await?;
        let all_column_names: Vec<String> = all_columns.iter().map(|c| c.name.clone()).collect();
        let projection_indices: Vec<usize> = projection
            .iter()
            .map(|name| {
                all_column_names
                    .iter()
                    .position(|c| c.eq_ignore_ascii_case(name))
                    .ok_or_else(|| {
                        ExtError::PlanTime(format!("column {name} not found on {schema}.{table}"))
                    })
            })
            .collect::<Result<_, _>>()?;

        // Reject scans that would read a deprecated/unsupported wire type:
        // `*` implicitly covers every column, an explicit projection only
        // the ones actually requested.
        let columns_to_check: Vec<&mssql_catalog::ColumnInfo> = if projection.is_empty() {
            all_columns.iter().collect()
        } else {
            projection_indices.iter().map(|&i| &all_columns[i]).collect()
        };
        for col in columns_to_check {
            if let Some(type_name) = col.unsupported_read_type() {
                return Err(ExtError::PlanTime(format!(
                    "column {}.{}.{} has unsupported type {type_name}; \
                     XML, SQL_VARIANT, IMAGE, TEXT, NTEXT, and user-defined types cannot be read",
                    schema, table, col.name
                )));
            }
        }

        let resolver = ColumnResolver::new(&all_column_names, &projection_indices);
        let translated = translate_filter_set(filters, &resolver);

        let select_list = if projection.is_empty() {
            "*".to_string()
        } else {
            projection_indices
                .iter()
                .map(|&i| select_expr_for_column(&all_columns[i]))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut sql = format!(
            "SELECT {select_list} FROM {}.{}",
            bracket_identifier(schema),
            bracket_identifier(table)
        );
        if let Some(where_clause) = &translated.sql_fragment {
            sql.push_str(" WHERE ");
            sql.push_str(where_clause);
        }
        sql.push(';');

        Ok(TableScanPlan {
            sql,
            needs_local_refilter: !translated.fully_supported,
        })
    }

    /// Build an insert batch. `identity_column`, when present, is dropped
    /// from the generated statement by the writer.
    #[must_use]
    pub fn plan_insert(
        &self,
        schema: &str,
        table: &str,
        columns: Vec<String>,
        identity_column: Option<String>,
        rows: Vec<Vec<mssql_types::SqlValue>>,
        returning: Vec<String>,
    ) -> InsertBatch {
        InsertBatch {
            schema: schema.to_string(),
            table: table.to_string(),
            columns,
            identity_column,
            rows,
            returning,
        }
    }

    /// Build an update batch, resolving the primary key from the catalog.
    pub async fn plan_update(
        &self,
        conn: &mut Client<Ready>,
        schema: &str,
        table: &str,
        set_columns: Vec<String>,
        rows: Vec<(Vec<mssql_types::SqlValue>, Vec<mssql_types::SqlValue>)>,
    ) -> Result<UpdateBatch, ExtError> {
        let pk = self.primary_key(conn, schema, table).await?;
        if !pk.exists {
            return Err(ExtError::PlanTime(format!(
                "{schema}.{table} has no primary key; cannot plan row-targeted update"
            )));
        }
        let pk_columns = pk.columns.into_iter().map(|c| c.name).collect();
        Ok(UpdateBatch {
            schema: schema.to_string(),
            table: table.to_string(),
            pk_columns,
            set_columns,
            rows,
        })
    }

    /// Build a delete batch, resolving the primary key from the catalog.
    pub async fn plan_delete(
        &self,
        conn: &mut Client<Ready>,
        schema: &str,
        table: &str,
        rows: Vec<Vec<mssql_types::SqlValue>>,
    ) -> Result<DeleteBatch, ExtError> {
        let pk = self.primary_key(conn, schema, table).await?;
        if !pk.exists {
            return Err(ExtError::PlanTime(format!(
                "{schema}.{table} has no primary key; cannot plan row-targeted delete"
            )));
        }
        let pk_columns = pk.columns.into_iter().map(|c| c.name).collect();
        Ok(DeleteBatch {
            schema: schema.to_string(),
            table: table.to_string(),
            pk_columns,
            rows,
        })
    }

    /// Build a `CREATE TABLE AS SELECT` request.
    #[must_use]
    pub fn plan_create_table_as(
        &self,
        schema: &str,
        table: &str,
        columns: Vec<ColumnDef>,
        or_replace: bool,
    ) -> CreateTableAsSelect {
        CreateTableAsSelect {
            schema: schema.to_string(),
            table: table.to_string(),
            columns,
            or_replace,
        }
    }

    /// The writer configuration used by this handle's plan-execution
    /// helpers.
    #[must_use]
    pub fn writer_config(&self) -> &WriterConfig {
        &self.writer_config
    }

    /// Drop all cached catalog state, forcing the next lookup to re-query
    /// the server.
    pub fn invalidate_cache(&self) {
        self.cache.invalidate_all();
    }

    /// Eagerly load the entire catalog in one round trip.
    pub async fn preload_catalog(&self, conn: &mut Client<Ready>) -> Result<(), ExtError> {
        Ok(self.cache.preload(conn).await?)
    }
}

/// Build the `SELECT`-list expression for one projected column.
///
/// A `CHAR`/`VARCHAR` column exposed with a non-UTF-8 collation is wrapped
/// in `CAST(col AS NVARCHAR(n))` so the server returns
/// UTF-16LE, which the decoder always handles correctly — plain `VARCHAR`
/// bytes would otherwise be interpreted assuming the wrong code page for
/// non-Latin1 collations, corrupting the decoded string silently.
fn select_expr_for_column(col: &mssql_catalog::ColumnInfo) -> String {
    let needs_nvarchar_cast = matches!(col.type_name.to_ascii_lowercase().as_str(), "char" | "varchar")
        && col
            .collation
            .as_deref()
            .is_some_and(|c| !c.to_ascii_uppercase().ends_with("_UTF8"));

    if !needs_nvarchar_cast {
        return bracket_identifier(&col.name);
    }

    let len = match col.max_length {
        Some(n) if n > 0 => n.to_string(),
        _ => "MAX".to_string(),
    };
    format!(
        "CAST({} AS NVARCHAR({len})) AS {}",
        bracket_identifier(&col.name),
        bracket_identifier(&col.name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_construction_does_not_panic() {
        let handle = CatalogHandle::new(Duration::from_secs(60), CatalogFilter::new(None, None).unwrap());
        assert!(Arc::strong_count(handle.cache()) >= 1);
    }

    fn col(name: &str, type_name: &str, collation: Option<&str>) -> mssql_catalog::ColumnInfo {
        mssql_catalog::ColumnInfo {
            name: name.to_string(),
            ordinal: 1,
            type_name: type_name.to_string(),
            max_length: Some(50),
            precision: None,
            scale: None,
            nullable: true,
            collation: collation.map(str::to_string),
            is_user_defined: false,
        }
    }

    #[test]
    fn non_utf8_varchar_is_cast_to_nvarchar() {
        let c = col("name", "varchar", Some("SQL_Latin1_General_CP1_CI_AS"));
        assert_eq!(
            select_expr_for_column(&c),
            "CAST([name] AS NVARCHAR(50)) AS [name]"
        );
    }

    #[test]
    fn utf8_collation_varchar_is_not_cast() {
        let c = col("name", "varchar", Some("Latin1_General_100_CI_AS_SC_UTF8"));
        assert_eq!(select_expr_for_column(&c), "[name]");
    }

    #[test]
    fn nvarchar_column_is_never_cast() {
        let c = col("name", "nvarchar", Some("SQL_Latin1_General_CP1_CI_AS"));
        assert_eq!(select_expr_for_column(&c), "[name]");
    }

    #[test]
    fn xml_column_is_rejected_as_unsupported_read_type() {
        let c = col("payload", "xml", None);
        assert_eq!(c.unsupported_read_type(), Some("xml"));
    }

    #[test]
    fn user_defined_type_is_rejected() {
        let mut c = col("geo", "geography", None);
        c.is_user_defined = true;
        assert_eq!(c.unsupported_read_type(), Some("geography"));
    }

    #[test]
    fn ordinary_int_column_is_supported() {
        let c = col("id", "int", None);
        assert_eq!(c.unsupported_read_type(), None);
    }
}
