//! Server handle abstraction
//!
//! The engine never owns a connection. Callers pass something implementing
//! [`ServerHandle`]; the binary backs it with a TDS client, tests with an
//! in-memory recorder.

use crate::command::Statement;
use thiserror::Error;

/// Error text returned by the server driver, passed through verbatim
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A single column value in a result row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// First row of a query result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    cells: Vec<Cell>,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    /// String column, `None` for NULL or a missing column
    pub fn get_str(&self, index: usize) -> Option<&str> {
        match self.cells.get(index) {
            Some(Cell::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_int(&self, index: usize) -> Option<i64> {
        match self.cells.get(index) {
            Some(Cell::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl FromIterator<Cell> for Row {
    fn from_iter<I: IntoIterator<Item = Cell>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Handle used to run statements against the target server
///
/// Implementations must be safe to share between concurrent lifecycle calls.
/// No retry, pooling or timeout is expected of them: a failed statement is
/// returned immediately.
pub trait ServerHandle: Send + Sync {
    /// Run a statement that returns no rows
    fn execute(&self, statement: &Statement) -> Result<(), RemoteError>;

    /// Run a query and return its first row, or `None` when it has no rows
    fn query_row(&self, statement: &Statement) -> Result<Option<Row>, RemoteError>;

    /// Whether a query returns at least one row
    fn exists(&self, statement: &Statement) -> Result<bool, RemoteError> {
        Ok(self.query_row(statement)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_accessors() {
        let row: Row = [Cell::from("app"), Cell::Null, Cell::Int(150)]
            .into_iter()
            .collect();
        assert_eq!(row.get_str(0), Some("app"));
        assert_eq!(row.get_str(1), None);
        assert_eq!(row.get_int(2), Some(150));
        assert_eq!(row.get_int(9), None);
        assert_eq!(row.len(), 3);
    }
}
