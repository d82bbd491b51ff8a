//! Translation never fails in the sense of returning an error to the caller
//! — an expression that cannot be pushed down is simply reported as
//! unsupported via [`crate::translate::Translated`] and re-evaluated
//! locally. [`PushdownError`] exists for the narrower case of a caller
//! constructing a malformed filter set (e.g. a dangling projection index)
//! and wanting a hard failure rather than silent "not pushable".

use thiserror::Error;

/// Errors constructing or resolving a pushdown request.
#[derive(Debug, Error)]
pub enum PushdownError {
    /// A [`crate::expr::Expr::Column`] referenced a projection index with no
    /// corresponding entry.
    #[error("projection index {0} has no corresponding column")]
    UnresolvedColumn(usize),
}
