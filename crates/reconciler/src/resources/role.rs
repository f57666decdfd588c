//! Database role resource

use crate::codec::Fields;
use crate::command::{Statement, Step, quote_ident};
use crate::error::Result;
use crate::resource::{ManagedResource, join_identifier, split_identifier};
use crate::types::{AttributeBag, Identifier, ResourceKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub database: String,
    pub name: String,
}

impl ManagedResource for Role {
    const KIND: ResourceKind = ResourceKind::Role;

    fn from_bag(bag: &AttributeBag) -> Result<Self> {
        let fields = Fields::new(Self::KIND, bag);
        Ok(Self {
            database: fields.string("database")?,
            name: fields.string("name")?,
        })
    }

    fn from_identifier(identifier: &str) -> Result<Self> {
        let mut parts = split_identifier(Self::KIND, identifier, 2)?;
        let name = parts.remove(1);
        Ok(Self {
            database: parts.remove(0),
            name,
        })
    }

    fn to_bag(&self) -> AttributeBag {
        AttributeBag::new()
            .with("database", self.database.as_str())
            .with("name", self.name.as_str())
    }

    fn identifier(&self) -> Identifier {
        join_identifier(&[&self.database, &self.name])
    }

    fn create(&self) -> Vec<Step> {
        vec![Step::new(
            "create role",
            Statement::in_database(
                &self.database,
                format!("CREATE ROLE {};", quote_ident(&self.name)),
            ),
        )]
    }

    fn lookup(&self) -> Statement {
        Statement::in_database(
            &self.database,
            "SELECT name FROM sys.database_principals WHERE type = 'R' AND name = @P1;",
        )
        .bind(self.name.as_str())
    }

    fn delete(&self) -> Vec<Statement> {
        vec![Statement::in_database(
            &self.database,
            format!("DROP ROLE {};", quote_ident(&self.name)),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements() {
        let role = Role::from_identifier("app.readers").unwrap();
        assert_eq!(
            role.create()[0].statement.sql(),
            "USE [app];\nCREATE ROLE [readers];"
        );
        assert_eq!(role.delete()[0].sql(), "USE [app];\nDROP ROLE [readers];");
        assert_eq!(role.lookup().context(), Some("app"));
    }

    #[test]
    fn test_identifier_includes_database() {
        let a = Role::from_identifier("app.readers").unwrap();
        let b = Role::from_identifier("audit.readers").unwrap();
        assert_ne!(a.identifier(), b.identifier());
    }
}
