//! Database abstraction layer
//!
//! This module provides a database-agnostic interface for statement execution
//! and catalog introspection.

use crate::schema::Statement;
use std::time::Instant;

pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

// Re-export the main trait
pub use traits::{quote_identifier, DatabaseError, DatabaseProvider};

/// Milliseconds elapsed since `start_time`, with sub-millisecond precision
pub(crate) fn elapsed_milliseconds(start_time: Instant) -> f64 {
    start_time.elapsed().as_secs_f64() * 1000.0
}

/// Whether a script opens its own transaction (`BEGIN`, `START TRANSACTION`, `SAVEPOINT`)
pub(crate) fn opens_transaction(statements: &[Statement]) -> bool {
    statements.iter().any(|statement| {
        matches!(
            statement.leading_keyword().as_str(),
            "BEGIN" | "START" | "SAVEPOINT"
        )
    })
}
