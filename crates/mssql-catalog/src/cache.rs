//! Three-level, TTL-backed metadata cache: schemas -> tables/views -> columns.
//!
//! Each level is loaded on demand with double-checked locking: a cheap state
//! check, a per-level mutex acquisition, a re-check (in case a concurrent
//! loader already finished), then the load and publish. This keeps readers
//! of an already-`Loaded` level lock-free on the fast path.
//!
//! The crucial property this cache preserves: enumerating a schema's tables
//! never eagerly loads their columns. Catalog enumeration and
//! binder-error-diagnosis paths consume only names; columns for a given
//! table load on first real access to that table. Without this split, a
//! large catalog would issue one column-discovery query per table just to
//! list the schema.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use mssql_client::{Client, Ready};

use crate::error::CatalogError;
use crate::filter::CatalogFilter;
use crate::primary_key::{PrimaryKeyColumn, PrimaryKeyInfo};
use crate::queries;

/// Load state for one cache level. Transitions are monotonic within a TTL
/// window: `NotLoaded -> Loading -> Loaded`; only explicit invalidation or
/// TTL expiry moves a `Loaded` level back to `NotLoaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Never loaded, or invalidated since the last load.
    NotLoaded,
    /// A loader is currently fetching this level; other callers should wait.
    Loading,
    /// Populated and valid until its TTL timestamp.
    Loaded,
}

/// Whether an object is a table or a view. Only tables support DML; views
/// are read-only and have no rowid concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// A base table (`sys.objects.type = 'U'`).
    Table,
    /// A view (`sys.objects.type = 'V'`).
    View,
}

/// A single discovered column.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// 1-based ordinal position.
    pub ordinal: u32,
    /// Declared SQL type name (e.g. `"NVARCHAR"`, `"INT"`).
    pub type_name: String,
    /// Declared max length in bytes (meaning depends on type).
    pub max_length: Option<i16>,
    /// Numeric precision, if applicable.
    pub precision: Option<u8>,
    /// Numeric scale, if applicable.
    pub scale: Option<u8>,
    /// Whether the column allows NULL.
    pub nullable: bool,
    /// Collation name, for non-Unicode string columns.
    pub collation: Option<String>,
    /// Whether `type_name` names a CLR user-defined type rather than a
    /// built-in SQL Server type (`sys.types.is_user_defined`).
    pub is_user_defined: bool,
}

impl ColumnInfo {
    /// If this column's declared type is one this driver deliberately does
    /// not support reading (deprecated wire types per spec §1/§4.12 —
    /// `XML`, UDT, `SQL_VARIANT`, `IMAGE`, `TEXT`, `NTEXT`), return the
    /// exact type name to use in the scan-time error. `None` means the
    /// column can be read normally.
    #[must_use]
    pub fn unsupported_read_type(&self) -> Option<&str> {
        if self.is_user_defined {
            return Some(&self.type_name);
        }
        const UNSUPPORTED: &[&str] = &["xml", "sql_variant", "image", "text", "ntext"];
        if UNSUPPORTED
            .iter()
            .any(|t| self.type_name.eq_ignore_ascii_case(t))
        {
            Some(&self.type_name)
        } else {
            None
        }
    }
}

struct TableEntry {
    object_type: ObjectKind,
    approx_rows: u64,
    col_load_state: LoadState,
    columns: Vec<ColumnInfo>,
    primary_key: PrimaryKeyInfo,
    ttl_ts: Option<Instant>,
}

struct SchemaEntry {
    load_state: LoadState,
    tables: HashMap<String, TableEntry>,
    ttl_ts: Option<Instant>,
}

struct CacheInner {
    schemas_load_state: LoadState,
    schemas: HashMap<String, SchemaEntry>,
    schemas_ttl: Option<Instant>,
}

impl Default for CacheInner {
    fn default() -> Self {
        Self {
            schemas_load_state: LoadState::NotLoaded,
            schemas: HashMap::new(),
            schemas_ttl: None,
        }
    }
}

/// A row from a table/view discovery query, already lowered to owned data.
struct DiscoveredObject {
    name: String,
    kind: ObjectKind,
    approx_rows: u64,
}

/// Per-attached-database metadata cache.
pub struct MetadataCache {
    inner: Mutex<CacheInner>,
    ttl: Duration,
    filter: CatalogFilter,
}

impl MetadataCache {
    /// Create an empty cache with the given TTL and visibility filters.
    #[must_use]
    pub fn new(ttl: Duration, filter: CatalogFilter) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            ttl,
            filter,
        }
    }

    fn is_expired(&self, ttl_ts: Option<Instant>) -> bool {
        match ttl_ts {
            Some(ts) => Instant::now() >= ts,
            None => true,
        }
    }

    /// List visible schema names, loading them from the server on first call
    /// or after invalidation/TTL expiry.
    pub async fn list_schemas(
        &self,
        conn: &mut Client<Ready>,
    ) -> Result<Vec<String>, CatalogError> {
        self.ensure_schemas_loaded(conn).await?;
        let guard = self.inner.lock();
        Ok(guard
            .schemas
            .keys()
            .filter(|name| self.filter.schema_visible(name))
            .cloned()
            .collect())
    }

    /// List visible table/view names within a schema (names only — does not
    /// load column metadata for any of them).
    pub async fn list_tables(
        &self,
        conn: &mut Client<Ready>,
        schema: &str,
    ) -> Result<Vec<String>, CatalogError> {
        if !self.filter.schema_visible(schema) {
            return Err(CatalogError::NotFound {
                kind: "schema",
                name: schema.to_string(),
            });
        }
        self.ensure_tables_loaded(conn, schema).await?;
        let guard = self.inner.lock();
        let entry = guard
            .schemas
            .get(schema)
            .ok_or_else(|| CatalogError::NotFound {
                kind: "schema",
                name: schema.to_string(),
            })?;
        Ok(entry
            .tables
            .keys()
            .filter(|name| self.filter.table_visible(name))
            .cloned()
            .collect())
    }

    /// Describe a table/view's columns, loading them on first access to this
    /// specific table.
    pub async fn describe_table(
        &self,
        conn: &mut Client<Ready>,
        schema: &str,
        table: &str,
    ) -> Result<(ObjectKind, Vec<ColumnInfo>), CatalogError> {
        self.ensure_table_visible(schema, table)?;
        self.ensure_tables_loaded(conn, schema).await?;
        self.ensure_columns_loaded(conn, schema, table).await?;

        let guard = self.inner.lock();
        let schema_entry = guard
            .schemas
            .get(schema)
            .ok_or_else(|| CatalogError::NotFound {
                kind: "schema",
                name: schema.to_string(),
            })?;
        let table_entry = schema_entry
            .tables
            .get(table)
            .ok_or_else(|| CatalogError::NotFound {
                kind: "table",
                name: format!("{schema}.{table}"),
            })?;
        Ok((table_entry.object_type, table_entry.columns.clone()))
    }

    /// Primary-key info for a table, loading it lazily on first access.
    /// Rejects views outright since they have no rowid concept.
    pub async fn primary_key(
        &self,
        conn: &mut Client<Ready>,
        schema: &str,
        table: &str,
    ) -> Result<PrimaryKeyInfo, CatalogError> {
        self.ensure_table_visible(schema, table)?;
        self.ensure_tables_loaded(conn, schema).await?;

        {
            let guard = self.inner.lock();
            if let Some(entry) = guard
                .schemas
                .get(schema)
                .and_then(|s| s.tables.get(table))
            {
                if entry.object_type == ObjectKind::View {
                    return Err(CatalogError::RowidOnView);
                }
                if entry.primary_key.loaded {
                    return Ok(entry.primary_key.clone());
                }
            }
        }

        let sql = queries::primary_key_for_table(schema, table);
        let mut stream = conn.query(&sql, &[]).await?;
        let rows = stream.collect_all().await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row.get_by_name("column_name").map_err(|e| {
                CatalogError::MalformedResult(format!("primary key column_name: {e}"))
            })?;
            let ordinal: i32 = row
                .get_by_name("ordinal")
                .map_err(|e| CatalogError::MalformedResult(format!("primary key ordinal: {e}")))?;
            let type_name: String = row.get_by_name("type_name").map_err(|e| {
                CatalogError::MalformedResult(format!("primary key type_name: {e}"))
            })?;
            columns.push(PrimaryKeyColumn {
                name,
                ordinal: ordinal as u32,
                logical_type: type_name,
            });
        }

        let pk = PrimaryKeyInfo::with_columns(columns);

        let mut guard = self.inner.lock();
        if let Some(entry) = guard
            .schemas
            .get_mut(schema)
            .and_then(|s| s.tables.get_mut(table))
        {
            entry.primary_key = pk.clone();
        }
        Ok(pk)
    }

    fn ensure_table_visible(&self, schema: &str, table: &str) -> Result<(), CatalogError> {
        if !self.filter.is_visible(schema, table) {
            return Err(CatalogError::NotFound {
                kind: "table",
                name: format!("{schema}.{table}"),
            });
        }
        Ok(())
    }

    async fn ensure_schemas_loaded(
        &self,
        conn: &mut Client<Ready>,
    ) -> Result<(), CatalogError> {
        // Fast path: already loaded and not expired.
        {
            let guard = self.inner.lock();
            if guard.schemas_load_state == LoadState::Loaded
                && !self.is_expired(guard.schemas_ttl)
            {
                return Ok(());
            }
        }

        // Slow path: claim the Loading state under the lock so a concurrent
        // caller sees it and can't start a second load.
        {
            let mut guard = self.inner.lock();
            if guard.schemas_load_state == LoadState::Loaded && !self.is_expired(guard.schemas_ttl)
            {
                return Ok(());
            }
            guard.schemas_load_state = LoadState::Loading;
        }

        tracing::debug!("loading schema list from server");
        let mut stream = conn.query(queries::SCHEMAS, &[]).await?;
        let rows = stream.collect_all().await?;

        let mut names = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row
                .get_by_name("schema_name")
                .map_err(|e| CatalogError::MalformedResult(format!("schema_name: {e}")))?;
            names.push(name);
        }

        let mut guard = self.inner.lock();
        for name in names {
            guard.schemas.entry(name).or_insert_with(|| SchemaEntry {
                load_state: LoadState::NotLoaded,
                tables: HashMap::new(),
                ttl_ts: None,
            });
        }
        guard.schemas_load_state = LoadState::Loaded;
        guard.schemas_ttl = Some(Instant::now() + self.ttl);
        Ok(())
    }

    async fn ensure_tables_loaded(
        &self,
        conn: &mut Client<Ready>,
        schema: &str,
    ) -> Result<(), CatalogError> {
        self.ensure_schemas_loaded(conn).await?;

        {
            let guard = self.inner.lock();
            let entry = guard
                .schemas
                .get(schema)
                .ok_or_else(|| CatalogError::NotFound {
                    kind: "schema",
                    name: schema.to_string(),
                })?;
            if entry.load_state == LoadState::Loaded && !self.is_expired(entry.ttl_ts) {
                return Ok(());
            }
        }

        {
            let mut guard = self.inner.lock();
            if let Some(entry) = guard.schemas.get_mut(schema) {
                if entry.load_state == LoadState::Loaded && !self.is_expired(entry.ttl_ts) {
                    return Ok(());
                }
                entry.load_state = LoadState::Loading;
            }
        }

        tracing::debug!(schema, "loading table list for schema");
        let sql = queries::tables_for_schema(schema);
        let mut stream = conn.query(&sql, &[]).await?;
        let rows = stream.collect_all().await?;

        let mut discovered = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: String = row
                .get_by_name("object_name")
                .map_err(|e| CatalogError::MalformedResult(format!("object_name: {e}")))?;
            let kind: String = row
                .get_by_name("object_type")
                .map_err(|e| CatalogError::MalformedResult(format!("object_type: {e}")))?;
            let approx_rows: i64 = row
                .get_by_name("approx_rows")
                .map_err(|e| CatalogError::MalformedResult(format!("approx_rows: {e}")))?;
            let kind = match kind.trim() {
                "U" => ObjectKind::Table,
                "V" => ObjectKind::View,
                other => {
                    return Err(CatalogError::MalformedResult(format!(
                        "unexpected object_type '{other}'"
                    )));
                }
            };
            discovered.push(DiscoveredObject {
                name,
                kind,
                approx_rows: approx_rows.max(0) as u64,
            });
        }

        let mut guard = self.inner.lock();
        if let Some(entry) = guard.schemas.get_mut(schema) {
            for obj in discovered {
                entry
                    .tables
                    .entry(obj.name)
                    .and_modify(|t| {
                        t.object_type = obj.kind;
                        t.approx_rows = obj.approx_rows;
                    })
                    .or_insert_with(|| TableEntry {
                        object_type: obj.kind,
                        approx_rows: obj.approx_rows,
                        col_load_state: LoadState::NotLoaded,
                        columns: Vec::new(),
                        primary_key: PrimaryKeyInfo::not_loaded(),
                        ttl_ts: None,
                    });
            }
            entry.load_state = LoadState::Loaded;
            entry.ttl_ts = Some(Instant::now() + self.ttl);
        }
        Ok(())
    }

    async fn ensure_columns_loaded(
        &self,
        conn: &mut Client<Ready>,
        schema: &str,
        table: &str,
    ) -> Result<(), CatalogError> {
        {
            let guard = self.inner.lock();
            let table_entry = guard
                .schemas
                .get(schema)
                .and_then(|s| s.tables.get(table))
                .ok_or_else(|| CatalogError::NotFound {
                    kind: "table",
                    name: format!("{schema}.{table}"),
                })?;
            if table_entry.col_load_state == LoadState::Loaded && !self.is_expired(table_entry.ttl_ts)
            {
                return Ok(());
            }
        }

        {
            let mut guard = self.inner.lock();
            if let Some(entry) = guard
                .schemas
                .get_mut(schema)
                .and_then(|s| s.tables.get_mut(table))
            {
                if entry.col_load_state == LoadState::Loaded && !self.is_expired(entry.ttl_ts) {
                    return Ok(());
                }
                entry.col_load_state = LoadState::Loading;
            }
        }

        tracing::debug!(schema, table, "loading columns for table");
        let sql = queries::columns_for_table(schema, table);
        let mut stream = conn.query(&sql, &[]).await?;
        let rows = stream.collect_all().await?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            columns.push(row_to_column_info(row)?);
        }

        let mut guard = self.inner.lock();
        if let Some(entry) = guard
            .schemas
            .get_mut(schema)
            .and_then(|s| s.tables.get_mut(table))
        {
            entry.columns = columns;
            entry.col_load_state = LoadState::Loaded;
            entry.ttl_ts = Some(Instant::now() + self.ttl);
        }
        Ok(())
    }

    /// Materialize every visible schema, table/view, and column with the
    /// single bulk-preload JOIN, streaming rows into the cache grouped by
    /// `(schema, table)`. Preferred for catalogs with thousands of tables,
    /// where the per-table discovery path would issue one round-trip per
    /// table.
    pub async fn preload(&self, conn: &mut Client<Ready>) -> Result<(), CatalogError> {
        tracing::info!("bulk-preloading catalog metadata");
        let mut stream = conn.query(queries::BULK_PRELOAD, &[]).await?;
        let rows = stream.collect_all().await?;

        let mut guard = self.inner.lock();
        guard.schemas.clear();
        let now = Instant::now();

        for row in &rows {
            let schema_name: String = row
                .get_by_name("schema_name")
                .map_err(|e| CatalogError::MalformedResult(format!("schema_name: {e}")))?;
            let object_name: String = row
                .get_by_name("object_name")
                .map_err(|e| CatalogError::MalformedResult(format!("object_name: {e}")))?;
            let object_type: String = row
                .get_by_name("object_type")
                .map_err(|e| CatalogError::MalformedResult(format!("object_type: {e}")))?;
            let kind = match object_type.trim() {
                "U" => ObjectKind::Table,
                "V" => ObjectKind::View,
                other => {
                    return Err(CatalogError::MalformedResult(format!(
                        "unexpected object_type '{other}'"
                    )));
                }
            };

            let schema_entry = guard
                .schemas
                .entry(schema_name)
                .or_insert_with(|| SchemaEntry {
                    load_state: LoadState::Loaded,
                    tables: HashMap::new(),
                    ttl_ts: Some(now + self.ttl),
                });

            let table_entry = schema_entry
                .tables
                .entry(object_name)
                .or_insert_with(|| TableEntry {
                    object_type: kind,
                    approx_rows: 0,
                    col_load_state: LoadState::Loaded,
                    columns: Vec::new(),
                    primary_key: PrimaryKeyInfo::not_loaded(),
                    ttl_ts: Some(now + self.ttl),
                });

            table_entry.columns.push(row_to_column_info(row)?);
        }

        guard.schemas_load_state = LoadState::Loaded;
        guard.schemas_ttl = Some(now + self.ttl);
        Ok(())
    }

    /// Invalidate the entire cache (all levels).
    pub fn invalidate_all(&self) {
        let mut guard = self.inner.lock();
        *guard = CacheInner::default();
    }

    /// Invalidate one schema's table list and all of its tables' columns.
    pub fn invalidate_schema(&self, schema: &str) {
        let mut guard = self.inner.lock();
        guard.schemas.remove(schema);
    }

    /// Invalidate a single table's column cache (and primary key), leaving
    /// the rest of the schema's table list intact.
    pub fn invalidate_table(&self, schema: &str, table: &str) {
        let mut guard = self.inner.lock();
        if let Some(entry) = guard.schemas.get_mut(schema) {
            entry.tables.remove(table);
        }
    }
}

fn row_to_column_info(row: &mssql_client::Row) -> Result<ColumnInfo, CatalogError> {
    let name: String = row
        .get_by_name("column_name")
        .map_err(|e| CatalogError::MalformedResult(format!("column_name: {e}")))?;
    let ordinal: i32 = row
        .get_by_name("ordinal")
        .map_err(|e| CatalogError::MalformedResult(format!("ordinal: {e}")))?;
    let type_name: String = row
        .get_by_name("type_name")
        .map_err(|e| CatalogError::MalformedResult(format!("type_name: {e}")))?;
    let is_user_defined: bool = row.try_get_by_name("is_user_defined").unwrap_or(false);
    let max_length: Option<i16> = row.try_get_by_name("max_length");
    let precision: Option<u8> = row.try_get_by_name("precision");
    let scale: Option<u8> = row.try_get_by_name("scale");
    let nullable: bool = row
        .get_by_name("is_nullable")
        .map_err(|e| CatalogError::MalformedResult(format!("is_nullable: {e}")))?;
    let collation: Option<String> = row.try_get_by_name("collation_name");

    Ok(ColumnInfo {
        name,
        ordinal: ordinal as u32,
        type_name,
        max_length,
        precision,
        scale,
        nullable,
        collation,
        is_user_defined,
    })
}

impl MetadataCache {
    /// Convenience constructor matching [`MetadataCache::new`], for callers
    /// that want to share one cache across multiple catalog handles.
    #[must_use]
    pub fn new_shared(ttl: Duration, filter: CatalogFilter) -> Arc<Self> {
        Arc::new(Self::new(ttl, filter))
    }
}
