//! Primary-key discovery and rowid derivation.
//!
//! Row addresses are never physical locators; they are derived exclusively
//! from a table's declared primary key. A single-column key yields a scalar
//! rowid, a composite key yields an ordered record of its columns.

use mssql_types::SqlValue;

/// One column of a primary key, in key-ordinal order.
#[derive(Debug, Clone)]
pub struct PrimaryKeyColumn {
    /// Column name.
    pub name: String,
    /// 1-based position within the key.
    pub ordinal: u32,
    /// The column's declared SQL type name (e.g. `"INT"`, `"UNIQUEIDENTIFIER"`).
    pub logical_type: String,
}

/// Primary-key metadata for a table, loaded lazily on first access and
/// invalidated together with the owning table entry.
#[derive(Debug, Clone, Default)]
pub struct PrimaryKeyInfo {
    /// Whether this info has been loaded from the server yet.
    pub loaded: bool,
    /// Whether the table actually has a primary key.
    pub exists: bool,
    /// Key columns in ordinal order. Empty when `exists` is false.
    pub columns: Vec<PrimaryKeyColumn>,
}

impl PrimaryKeyInfo {
    /// An unloaded, keyless placeholder.
    #[must_use]
    pub fn not_loaded() -> Self {
        Self::default()
    }

    /// Construct loaded info for a table with no primary key.
    #[must_use]
    pub fn none() -> Self {
        Self {
            loaded: true,
            exists: false,
            columns: Vec::new(),
        }
    }

    /// Construct loaded info from discovered key columns (already in
    /// ordinal order).
    #[must_use]
    pub fn with_columns(columns: Vec<PrimaryKeyColumn>) -> Self {
        Self {
            loaded: true,
            exists: !columns.is_empty(),
            columns,
        }
    }

    /// Whether this key is composite (more than one column).
    #[must_use]
    pub fn is_composite(&self) -> bool {
        self.columns.len() > 1
    }

    /// Build a [`RowId`] from key values in ordinal order.
    ///
    /// Per the invariant that primary-key columns are never nullable, a NULL
    /// found in a key position is a fatal decode error — callers should
    /// already have this guaranteed by the server's key constraint, so this
    /// only defends against a caller assembling values out of band.
    pub fn rowid_from_values(&self, values: Vec<SqlValue>) -> Result<RowId, RowIdError> {
        if values.len() != self.columns.len() {
            return Err(RowIdError::ArityMismatch {
                expected: self.columns.len(),
                actual: values.len(),
            });
        }
        if values.iter().any(SqlValue::is_null) {
            return Err(RowIdError::NullInKeyPosition);
        }
        match values.len() {
            0 => Err(RowIdError::NoPrimaryKey),
            1 => Ok(RowId::Scalar(values.into_iter().next().expect("len == 1"))),
            _ => Ok(RowId::Composite(values)),
        }
    }
}

/// A row's logical identity, derived from its primary key.
#[derive(Debug, Clone, PartialEq)]
pub enum RowId {
    /// Single-column primary key.
    Scalar(SqlValue),
    /// Composite primary key; fields in key-ordinal order.
    Composite(Vec<SqlValue>),
}

impl RowId {
    /// The values making up this rowid, in key-ordinal order.
    #[must_use]
    pub fn values(&self) -> Vec<&SqlValue> {
        match self {
            RowId::Scalar(v) => vec![v],
            RowId::Composite(vs) => vs.iter().collect(),
        }
    }
}

/// Errors constructing a [`RowId`].
#[derive(Debug, thiserror::Error)]
pub enum RowIdError {
    /// The table has no primary key at all.
    #[error("table has no primary key")]
    NoPrimaryKey,
    /// A value was supplied for every key column except one, or too many.
    #[error("expected {expected} key values, got {actual}")]
    ArityMismatch {
        /// Number of declared key columns.
        expected: usize,
        /// Number of values supplied.
        actual: usize,
    },
    /// A NULL value occupied a primary-key position.
    #[error("NULL encountered in primary key position")]
    NullInKeyPosition,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, ordinal: u32) -> PrimaryKeyColumn {
        PrimaryKeyColumn {
            name: name.to_string(),
            ordinal,
            logical_type: "INT".to_string(),
        }
    }

    #[test]
    fn scalar_key_yields_scalar_rowid() {
        let pk = PrimaryKeyInfo::with_columns(vec![col("id", 1)]);
        let rowid = pk.rowid_from_values(vec![SqlValue::Int(42)]).unwrap();
        assert_eq!(rowid, RowId::Scalar(SqlValue::Int(42)));
    }

    #[test]
    fn composite_key_yields_composite_rowid_in_ordinal_order() {
        let pk = PrimaryKeyInfo::with_columns(vec![col("tenant_id", 1), col("id", 2)]);
        let rowid = pk
            .rowid_from_values(vec![SqlValue::Int(1), SqlValue::BigInt(100)])
            .unwrap();
        assert_eq!(
            rowid,
            RowId::Composite(vec![SqlValue::Int(1), SqlValue::BigInt(100)])
        );
    }

    #[test]
    fn null_in_key_position_is_rejected() {
        let pk = PrimaryKeyInfo::with_columns(vec![col("id", 1)]);
        assert!(matches!(
            pk.rowid_from_values(vec![SqlValue::Null]),
            Err(RowIdError::NullInKeyPosition)
        ));
    }

    #[test]
    fn no_primary_key_rejects_rowid_construction() {
        let pk = PrimaryKeyInfo::none();
        assert!(matches!(
            pk.rowid_from_values(vec![]),
            Err(RowIdError::NoPrimaryKey)
        ));
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let pk = PrimaryKeyInfo::with_columns(vec![col("id", 1)]);
        assert!(matches!(
            pk.rowid_from_values(vec![SqlValue::Int(1), SqlValue::Int(2)]),
            Err(RowIdError::ArityMismatch { expected: 1, actual: 2 })
        ));
    }
}
