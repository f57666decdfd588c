//! Role membership resource

use crate::codec::Fields;
use crate::command::{Statement, Step, quote_ident};
use crate::error::Result;
use crate::resource::{ManagedResource, join_identifier, split_identifier};
use crate::types::{AttributeBag, Identifier, ResourceKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    pub database: String,
    pub role: String,
    pub member: String,
}

impl RoleAssignment {
    fn statement(&self, verb: &str) -> Statement {
        Statement::in_database(
            &self.database,
            format!(
                "ALTER ROLE {} {verb} MEMBER {};",
                quote_ident(&self.role),
                quote_ident(&self.member)
            ),
        )
    }
}

impl ManagedResource for RoleAssignment {
    const KIND: ResourceKind = ResourceKind::RoleAssignment;

    fn from_bag(bag: &AttributeBag) -> Result<Self> {
        let fields = Fields::new(Self::KIND, bag);
        Ok(Self {
            database: fields.string("database")?,
            role: fields.string("role")?,
            member: fields.string("member")?,
        })
    }

    /// `<database>.<role>.<member>`; dots after the role belong to the member
    fn from_identifier(identifier: &str) -> Result<Self> {
        let mut parts = split_identifier(Self::KIND, identifier, 3)?;
        let member = parts.remove(2);
        let role = parts.remove(1);
        Ok(Self {
            database: parts.remove(0),
            role,
            member,
        })
    }

    fn to_bag(&self) -> AttributeBag {
        AttributeBag::new()
            .with("database", self.database.as_str())
            .with("role", self.role.as_str())
            .with("member", self.member.as_str())
    }

    fn identifier(&self) -> Identifier {
        join_identifier(&[&self.database, &self.role, &self.member])
    }

    fn create(&self) -> Vec<Step> {
        vec![Step::new("add member", self.statement("ADD"))]
    }

    fn lookup(&self) -> Statement {
        Statement::in_database(
            &self.database,
            "SELECT r.name, m.name FROM sys.database_role_members rm \
             JOIN sys.database_principals r ON rm.role_principal_id = r.principal_id \
             JOIN sys.database_principals m ON rm.member_principal_id = m.principal_id \
             WHERE r.name = @P1 AND m.name = @P2;",
        )
        .bind(self.role.as_str())
        .bind(self.member.as_str())
    }

    fn delete(&self) -> Vec<Statement> {
        vec![self.statement("DROP")]
    }
}
