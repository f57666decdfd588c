//! Read-only server probe

use crate::command::Statement;
use crate::server::Row;
use crate::types::AttributeBag;

/// Fixed identifier of the probe; there is one server per handle
pub const SERVER_INFO_ID: &str = "mssql_server";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub version: String,
}

impl ServerInfo {
    pub fn query() -> Statement {
        Statement::server("SELECT @@VERSION;")
    }

    pub fn from_row(row: &Row) -> Self {
        Self {
            version: row.get_str(0).unwrap_or_default().to_string(),
        }
    }

    pub fn to_bag(&self) -> AttributeBag {
        AttributeBag::new()
            .with("version", self.version.as_str())
            .with(crate::descriptor::ID, SERVER_INFO_ID)
    }
}
