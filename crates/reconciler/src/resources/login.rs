//! Server login resource

use crate::codec::Fields;
use crate::command::{Statement, Step, quote_ident, quote_literal};
use crate::descriptor::DEFAULT_LOGIN_DATABASE;
use crate::diagnostics::Diagnostic;
use crate::diff::Diff;
use crate::error::Result;
use crate::resource::{ManagedResource, split_identifier};
use crate::server::Row;
use crate::types::{AttributeBag, Identifier, ResourceKind};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginType {
    Sql,
    Windows,
}

impl LoginType {
    pub const ALL: [&'static str; 2] = ["sql", "windows"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sql => "sql",
            Self::Windows => "windows",
        }
    }

    /// Map `sys.server_principals.type_desc`
    fn from_type_desc(desc: &str) -> Self {
        if desc == "SQL_LOGIN" {
            Self::Sql
        } else {
            Self::Windows
        }
    }
}

impl fmt::Display for LoginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Login {
    pub name: String,
    pub login_type: LoginType,
    pub password: Option<String>,
    pub default_database: String,
}

impl fmt::Debug for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Login")
            .field("name", &self.name)
            .field("login_type", &self.login_type)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("default_database", &self.default_database)
            .finish()
    }
}

impl ManagedResource for Login {
    const KIND: ResourceKind = ResourceKind::Login;

    fn from_bag(bag: &AttributeBag) -> Result<Self> {
        let fields = Fields::new(Self::KIND, bag);
        let login_type = match fields.one_of("type", &LoginType::ALL)?.as_str() {
            "sql" => LoginType::Sql,
            _ => LoginType::Windows,
        };
        Ok(Self {
            name: fields.string("name")?,
            login_type,
            password: fields.opt_string("password")?,
            default_database: fields
                .opt_string("default_database")?
                .unwrap_or_else(|| DEFAULT_LOGIN_DATABASE.to_string()),
        })
    }

    /// The real type is filled in by the read that follows
    fn from_identifier(identifier: &str) -> Result<Self> {
        let mut parts = split_identifier(Self::KIND, identifier, 1)?;
        Ok(Self {
            name: parts.remove(0),
            login_type: LoginType::Sql,
            password: None,
            default_database: DEFAULT_LOGIN_DATABASE.to_string(),
        })
    }

    fn to_bag(&self) -> AttributeBag {
        let mut bag = AttributeBag::new()
            .with("name", self.name.as_str())
            .with("type", self.login_type.as_str())
            .with("default_database", self.default_database.as_str());
        if let Some(password) = &self.password {
            bag.insert("password", password.as_str());
        }
        bag
    }

    fn identifier(&self) -> Identifier {
        Identifier::new(self.name.as_str())
    }

    fn validate(&self) -> Vec<Diagnostic> {
        match (self.login_type, &self.password) {
            (LoginType::Sql, None) => vec![
                Diagnostic::error(
                    "Invalid resource attributes",
                    "a password is required for sql logins",
                )
                .for_kind(Self::KIND)
                .for_attribute("password"),
            ],
            (LoginType::Windows, Some(_)) => vec![
                Diagnostic::warning(
                    "Password ignored",
                    "windows logins authenticate through the domain; the password is not used",
                )
                .for_kind(Self::KIND)
                .for_identifier(self.name.as_str())
                .for_attribute("password"),
            ],
            _ => Vec::new(),
        }
    }

    fn create(&self) -> Vec<Step> {
        let name = quote_ident(&self.name);
        let default_db = quote_ident(&self.default_database);
        let statement = match (self.login_type, &self.password) {
            (LoginType::Sql, Some(password)) => Statement::server(format!(
                "CREATE LOGIN {name} WITH PASSWORD = {}, DEFAULT_DATABASE = {default_db};",
                quote_literal(password)
            ))
            .sensitive(),
            _ => Statement::server(format!(
                "CREATE LOGIN {name} FROM WINDOWS WITH DEFAULT_DATABASE = {default_db};"
            )),
        };
        vec![Step::new("create login", statement)]
    }

    fn lookup(&self) -> Statement {
        Statement::server(
            "SELECT name, type_desc, default_database_name FROM sys.server_principals \
             WHERE name = @P1 AND type IN ('S', 'U', 'G');",
        )
        .bind(self.name.as_str())
    }

    fn refresh(&self, row: &Row) -> Self {
        Self {
            name: row.get_str(0).unwrap_or(&self.name).to_string(),
            login_type: row
                .get_str(1)
                .map_or(self.login_type, LoginType::from_type_desc),
            password: self.password.clone(),
            default_database: row
                .get_str(2)
                .unwrap_or(&self.default_database)
                .to_string(),
        }
    }

    /// Windows logins take no password and keep their default database
    fn diff(&self, observed: &AttributeBag) -> Diff {
        let mut diff = Diff::compute(
            crate::descriptor::describe(Self::KIND),
            &self.to_bag(),
            observed,
        );
        if self.login_type == LoginType::Windows {
            diff.escalate(&["password", "default_database"]);
        }
        diff
    }

    fn rename(&self, observed: &Self) -> Option<Step> {
        Some(Step::new(
            "rename login",
            Statement::server(format!(
                "ALTER LOGIN {} WITH NAME = {};",
                quote_ident(&observed.name),
                quote_ident(&self.name)
            )),
        ))
    }

    fn alter(&self, _observed: &Self, diff: &Diff) -> Vec<Step> {
        let mut clauses = Vec::new();
        let mut sensitive = false;
        if diff.changed("password")
            && let Some(password) = &self.password
        {
            clauses.push(format!("PASSWORD = {}", quote_literal(password)));
            sensitive = true;
        }
        if diff.changed("default_database") {
            clauses.push(format!(
                "DEFAULT_DATABASE = {}",
                quote_ident(&self.default_database)
            ));
        }
        if clauses.is_empty() {
            return Vec::new();
        }

        let mut statement = Statement::server(format!(
            "ALTER LOGIN {} WITH {};",
            quote_ident(&self.name),
            clauses.join(", ")
        ));
        if sensitive {
            statement = statement.sensitive();
        }
        vec![Step::new("alter login", statement)]
    }

    fn delete(&self) -> Vec<Statement> {
        vec![Statement::server(format!(
            "DROP LOGIN {};",
            quote_ident(&self.name)
        ))]
    }
}
