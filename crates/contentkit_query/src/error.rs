//! Error types for query building.

use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors recorded by a builder and reported when it is snapshotted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A filter or projection method received a missing key or value.
    #[error("invalid argument to {operation}: {reason}")]
    InvalidArgument {
        /// Builder method that received the argument.
        operation: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// A boolean combinator received no sibling queries.
    #[error("{operation} requires at least one query")]
    EmptyCombinator {
        /// `and` or `or`.
        operation: &'static str,
    },
}

impl QueryError {
    /// Name of the builder method that put the builder in the invalid state.
    pub fn operation(&self) -> &'static str {
        match self {
            QueryError::InvalidArgument { operation, .. } => operation,
            QueryError::EmptyCombinator { operation } => operation,
        }
    }
}
