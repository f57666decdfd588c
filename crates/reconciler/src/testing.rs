//! In-memory server double for tests

use crate::command::Statement;
use crate::server::{Cell, RemoteError, Row, ServerHandle};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Records every statement and answers queries from a script
///
/// Queries pop responses in order; once the script is empty every query
/// returns no rows. Statements whose text contains a registered pattern fail
/// with the registered message.
#[derive(Default)]
pub struct RecordingServer {
    executed: Mutex<Vec<Statement>>,
    queried: Mutex<Vec<Statement>>,
    responses: Mutex<VecDeque<Result<Option<Row>, RemoteError>>>,
    failures: Mutex<Vec<(String, String)>>,
}

impl RecordingServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a query answer with one row
    pub fn respond(self, cells: Vec<Cell>) -> Self {
        self.push_response(Ok(Some(Row::new(cells))));
        self
    }

    /// Queue a query answer with no rows
    pub fn respond_empty(self) -> Self {
        self.push_response(Ok(None));
        self
    }

    /// Queue a failing query
    pub fn respond_error(self, message: &str) -> Self {
        self.push_response(Err(RemoteError::new(message)));
        self
    }

    /// Fail any executed statement whose text contains `pattern`
    pub fn fail_when(self, pattern: &str, message: &str) -> Self {
        self.failures
            .lock()
            .unwrap()
            .push((pattern.to_string(), message.to_string()));
        self
    }

    fn push_response(&self, response: Result<Option<Row>, RemoteError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Full text of every executed statement, in order
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().iter().map(Statement::sql).collect()
    }

    pub fn executed_statements(&self) -> Vec<Statement> {
        self.executed.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<Statement> {
        self.queried.lock().unwrap().clone()
    }
}

impl ServerHandle for RecordingServer {
    fn execute(&self, statement: &Statement) -> Result<(), RemoteError> {
        self.executed.lock().unwrap().push(statement.clone());
        let sql = statement.sql();
        let failures = self.failures.lock().unwrap();
        match failures.iter().find(|(pattern, _)| sql.contains(pattern.as_str())) {
            Some((_, message)) => Err(RemoteError::new(message.as_str())),
            None => Ok(()),
        }
    }

    fn query_row(&self, statement: &Statement) -> Result<Option<Row>, RemoteError> {
        self.queried.lock().unwrap().push(statement.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(None))
    }
}
