//! Error types.

use thiserror::Error;

/// Misuse of the harness that cannot be coerced into a valid state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarnessError {
    /// `begin` was called while another function was still running.
    #[error("cannot begin `{requested}`: `{active}` has not ended")]
    NestedBegin {
        /// Function whose begin/end sequence is still open.
        active: String,
        /// Function passed to the rejected `begin`.
        requested: String,
    },
}

/// Errors from the debug dump printers.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Row/column counts disagree with the buffer length.
    #[error("{rows}x{cols} matrix does not fit a buffer of {len} values")]
    ShapeMismatch {
        /// Requested rows.
        rows: usize,
        /// Requested columns.
        cols: usize,
        /// Actual buffer length.
        len: usize,
    },
    /// The output writer failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
