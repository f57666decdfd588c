//! Database user resource

use crate::codec::Fields;
use crate::command::{Statement, Step, quote_ident};
use crate::error::Result;
use crate::resource::{ManagedResource, join_identifier, split_identifier};
use crate::server::Row;
use crate::types::{AttributeBag, Identifier, ResourceKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub database: String,
    pub name: String,
    /// Server login the user maps to; `None` for a user without login
    pub login: Option<String>,
}

impl User {
    fn statement(&self, body: String) -> Statement {
        Statement::in_database(&self.database, body)
    }
}

impl ManagedResource for User {
    const KIND: ResourceKind = ResourceKind::User;

    fn from_bag(bag: &AttributeBag) -> Result<Self> {
        let fields = Fields::new(Self::KIND, bag);
        Ok(Self {
            database: fields.string("database")?,
            name: fields.string("name")?,
            login: fields.opt_string("login")?,
        })
    }

    fn from_identifier(identifier: &str) -> Result<Self> {
        let mut parts = split_identifier(Self::KIND, identifier, 2)?;
        let name = parts.remove(1);
        Ok(Self {
            database: parts.remove(0),
            name,
            login: None,
        })
    }

    fn to_bag(&self) -> AttributeBag {
        let mut bag = AttributeBag::new()
            .with("database", self.database.as_str())
            .with("name", self.name.as_str());
        if let Some(login) = &self.login {
            bag.insert("login", login.as_str());
        }
        bag
    }

    fn identifier(&self) -> Identifier {
        join_identifier(&[&self.database, &self.name])
    }

    fn create(&self) -> Vec<Step> {
        let body = match &self.login {
            Some(login) => format!(
                "CREATE USER {} FOR LOGIN {};",
                quote_ident(&self.name),
                quote_ident(login)
            ),
            None => format!("CREATE USER {} WITHOUT LOGIN;", quote_ident(&self.name)),
        };
        vec![Step::new("create user", self.statement(body))]
    }

    fn lookup(&self) -> Statement {
        self.statement(
            "SELECT dp.name, sp.name FROM sys.database_principals dp \
             LEFT JOIN sys.server_principals sp ON dp.sid = sp.sid \
             WHERE dp.name = @P1 AND dp.type IN ('S', 'U', 'G');"
                .to_string(),
        )
        .bind(self.name.as_str())
    }

    fn refresh(&self, row: &Row) -> Self {
        Self {
            database: self.database.clone(),
            name: row.get_str(0).unwrap_or(&self.name).to_string(),
            login: row.get_str(1).map(str::to_string),
        }
    }

    fn rename(&self, observed: &Self) -> Option<Step> {
        Some(Step::new(
            "rename user",
            self.statement(format!(
                "ALTER USER {} WITH NAME = {};",
                quote_ident(&observed.name),
                quote_ident(&self.name)
            )),
        ))
    }

    fn delete(&self) -> Vec<Statement> {
        vec![self.statement(format!("DROP USER {};", quote_ident(&self.name)))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::Cell;

    fn bob() -> User {
        User {
            database: "app".into(),
            name: "bob".into(),
            login: Some("bob_login".into()),
        }
    }

    #[test]
    fn test_create_for_login() {
        assert_eq!(
            bob().create()[0].statement.sql(),
            "USE [app];\nCREATE USER [bob] FOR LOGIN [bob_login];"
        );
    }

    #[test]
    fn test_create_without_login() {
        let user = User {
            login: None,
            ..bob()
        };
        assert_eq!(
            user.create()[0].statement.body(),
            "CREATE USER [bob] WITHOUT LOGIN;"
        );
    }

    #[test]
    fn test_from_identifier() {
        let user = User::from_identifier("app.bob").unwrap();
        assert_eq!(user.database, "app");
        assert_eq!(user.name, "bob");
        assert_eq!(user.identifier().as_str(), "app.bob");
    }

    #[test]
    fn test_refresh_reads_login_mapping() {
        let user = bob().refresh(&Row::new(vec![Cell::from("bob"), Cell::Null]));
        assert_eq!(user.login, None);
    }

    #[test]
    fn test_every_statement_switches_database() {
        let user = bob();
        let renamed = User {
            name: "robert".into(),
            ..bob()
        };
        let mut statements: Vec<Statement> =
            user.create().into_iter().map(|s| s.statement).collect();
        statements.extend(renamed.rename(&user).map(|s| s.statement));
        statements.extend(user.delete());
        assert!(
            statements
                .iter()
                .all(|s| s.sql().starts_with("USE [app];\n"))
        );
    }
}
