//! Bound expression tree the host engine hands the translator.
//!
//! Column references are positions into the scan's *projection*, not the
//! table's full column list — [`ColumnResolver`] is what turns a projection
//! index into the actual `[schema].[table]` column name via the
//! projection-index -> all-columns-index -> name indirection described in
//! the component design.

use mssql_types::SqlValue;

/// Comparison operators supported by structured constant comparisons and by
/// the general `Compare` expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
}

impl CompareOp {
    /// The T-SQL operator token.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }
}

/// Arithmetic operators. Always rendered parenthesized to force the
/// evaluation order the host engine computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
}

impl ArithOp {
    /// The T-SQL operator token.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        }
    }
}

/// A bound expression node. Built by the host engine from its own typed
/// expression tree; the translator only ever reads this shape.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A reference to a column by *projection* index (see [`ColumnResolver`]).
    Column(usize),
    /// A constant value.
    Literal(SqlValue),
    /// `left OP right`.
    Compare {
        /// The comparison operator.
        op: CompareOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `expr IS NULL`.
    IsNull(Box<Expr>),
    /// `expr IS NOT NULL`.
    IsNotNull(Box<Expr>),
    /// `expr IN (values...)`.
    In {
        /// The expression being tested.
        expr: Box<Expr>,
        /// The constant candidate list.
        values: Vec<SqlValue>,
    },
    /// Conjunction. Partial pushdown is allowed: any unsupported child is
    /// simply omitted and re-evaluated locally.
    And(Vec<Expr>),
    /// Disjunction. Must be all-or-nothing: if any child is not fully
    /// supported, the whole OR is rejected.
    Or(Vec<Expr>),
    /// `left OP right` arithmetic, always parenthesized on render.
    Arithmetic {
        /// The arithmetic operator.
        op: ArithOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Searched `CASE WHEN cond THEN result ... [ELSE else_] END`.
    Case {
        /// `(condition, result)` pairs, in order.
        branches: Vec<(Expr, Expr)>,
        /// Optional `ELSE` result.
        or_else: Option<Box<Expr>>,
    },
    /// A function call against the whitelist in [`crate::functions`].
    Call {
        /// Lowercase function name as the host engine spells it.
        name: String,
        /// Positional arguments.
        args: Vec<Expr>,
    },
}

/// A set of filters the host engine wants applied to a scan, implicitly
/// ANDed together (each entry may itself be an arbitrarily nested `OR`/`AND`
/// tree).
#[derive(Debug, Clone, Default)]
pub struct TableFilterSet {
    /// The individual filter expressions, ANDed.
    pub filters: Vec<Expr>,
}

impl TableFilterSet {
    /// An empty filter set (matches everything).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter set from a list of expressions, implicitly ANDed.
    #[must_use]
    pub fn from_filters(filters: Vec<Expr>) -> Self {
        Self { filters }
    }
}

/// Resolves a scan's projection index to the table's declared column name.
///
/// `all_columns[i]` is the name of column `i` in the table's full schema;
/// `projection[p]` is the index into `all_columns` that projection position
/// `p` refers to.
pub struct ColumnResolver<'a> {
    all_columns: &'a [String],
    projection: &'a [usize],
}

impl<'a> ColumnResolver<'a> {
    /// Build a resolver over a table's full column list and a scan's
    /// projection.
    #[must_use]
    pub fn new(all_columns: &'a [String], projection: &'a [usize]) -> Self {
        Self {
            all_columns,
            projection,
        }
    }

    /// Resolve a projection index to the underlying column name.
    #[must_use]
    pub fn resolve(&self, projection_index: usize) -> Option<&'a str> {
        let all_columns_index = *self.projection.get(projection_index)?;
        self.all_columns
            .get(all_columns_index)
            .map(String::as_str)
    }
}
