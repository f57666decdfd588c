//! Database resource

use crate::codec::Fields;
use crate::command::{Precondition, Statement, Step, quote_ident};
use crate::descriptor::{DEFAULT_COLLATION, DEFAULT_COMPATIBILITY_LEVEL};
use crate::diff::Diff;
use crate::error::{Error, Result};
use crate::resource::{ManagedResource, split_identifier};
use crate::server::Row;
use crate::types::{AttributeBag, Identifier, ResourceKind};
use regex::Regex;
use std::sync::LazyLock;

/// Server-level statements for a database run from `master`
const CONTEXT: &str = "master";

/// Compatibility levels accepted by supported server versions
pub const COMPATIBILITY_LEVELS: [i64; 9] = [80, 90, 100, 110, 120, 130, 140, 150, 160];

static COLLATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("collation pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
    pub name: String,
    pub collation: String,
    pub compatibility_level: i64,
    pub owner: Option<String>,
}

impl Database {
    fn statement(body: String) -> Statement {
        Statement::in_database(CONTEXT, body)
    }

    fn set_owner(&self, owner: &str) -> Step {
        Step::new(
            "set owner",
            Self::statement(format!(
                "ALTER AUTHORIZATION ON DATABASE::{} TO {};",
                quote_ident(&self.name),
                quote_ident(owner)
            )),
        )
    }

    fn owner_exists(owner: &str) -> Precondition {
        Precondition {
            attribute: "owner",
            query: Statement::server("SELECT 1 FROM sys.server_principals WHERE name = @P1;")
                .bind(owner),
            message: format!("owner '{owner}' does not exist"),
        }
    }
}

impl ManagedResource for Database {
    const KIND: ResourceKind = ResourceKind::Database;

    fn from_bag(bag: &AttributeBag) -> Result<Self> {
        let fields = Fields::new(Self::KIND, bag);

        let collation = fields
            .opt_string("collation")?
            .unwrap_or_else(|| DEFAULT_COLLATION.to_string());
        if !COLLATION_RE.is_match(&collation) {
            return Err(Error::validation(
                Self::KIND,
                "collation",
                format!("'{collation}' is not a collation name"),
            ));
        }

        let compatibility_level = fields
            .opt_int("compatibility_level")?
            .unwrap_or(DEFAULT_COMPATIBILITY_LEVEL);
        if !COMPATIBILITY_LEVELS.contains(&compatibility_level) {
            return Err(Error::validation(
                Self::KIND,
                "compatibility_level",
                format!("{compatibility_level} is not a supported compatibility level"),
            ));
        }

        Ok(Self {
            name: fields.string("name")?,
            collation,
            compatibility_level,
            owner: fields.opt_string("owner")?,
        })
    }

    fn from_identifier(identifier: &str) -> Result<Self> {
        let mut parts = split_identifier(Self::KIND, identifier, 1)?;
        Ok(Self {
            name: parts.remove(0),
            collation: DEFAULT_COLLATION.to_string(),
            compatibility_level: DEFAULT_COMPATIBILITY_LEVEL,
            owner: None,
        })
    }

    fn to_bag(&self) -> AttributeBag {
        let mut bag = AttributeBag::new()
            .with("name", self.name.as_str())
            .with("collation", self.collation.as_str())
            .with("compatibility_level", self.compatibility_level);
        if let Some(owner) = &self.owner {
            bag.insert("owner", owner.as_str());
        }
        bag
    }

    fn identifier(&self) -> Identifier {
        Identifier::new(self.name.as_str())
    }

    fn preconditions(&self) -> Vec<Precondition> {
        self.owner.as_deref().map(Self::owner_exists).into_iter().collect()
    }

    fn create(&self) -> Vec<Step> {
        let mut steps = vec![
            Step::new(
                "create database",
                Self::statement(format!(
                    "CREATE DATABASE {} COLLATE {};",
                    quote_ident(&self.name),
                    self.collation
                )),
            ),
            Step::new(
                "set compatibility level",
                Self::statement(format!(
                    "ALTER DATABASE {} SET COMPATIBILITY_LEVEL = {};",
                    quote_ident(&self.name),
                    self.compatibility_level
                )),
            ),
        ];
        if let Some(owner) = &self.owner {
            steps.push(self.set_owner(owner));
        }
        steps
    }

    fn lookup(&self) -> Statement {
        Self::statement(
            "SELECT name, collation_name, compatibility_level, SUSER_SNAME(owner_sid) \
             FROM sys.databases WHERE name = @P1;"
                .to_string(),
        )
        .bind(self.name.as_str())
    }

    fn refresh(&self, row: &Row) -> Self {
        Self {
            name: row.get_str(0).unwrap_or(&self.name).to_string(),
            collation: row.get_str(1).unwrap_or(&self.collation).to_string(),
            compatibility_level: row.get_int(2).unwrap_or(self.compatibility_level),
            owner: row.get_str(3).map(str::to_string).or_else(|| self.owner.clone()),
        }
    }

    fn rename(&self, observed: &Self) -> Option<Step> {
        Some(Step::new(
            "rename database",
            Self::statement(format!(
                "ALTER DATABASE {} MODIFY NAME = {};",
                quote_ident(&observed.name),
                quote_ident(&self.name)
            )),
        ))
    }

    fn alter(&self, _observed: &Self, diff: &Diff) -> Vec<Step> {
        match &self.owner {
            Some(owner) if diff.changed("owner") => vec![self.set_owner(owner)],
            _ => Vec::new(),
        }
    }

    fn update_preconditions(&self, diff: &Diff) -> Vec<Precondition> {
        if diff.changed("owner") {
            self.preconditions()
        } else {
            Vec::new()
        }
    }

    fn delete(&self) -> Vec<Statement> {
        vec![Self::statement(format!(
            "DROP DATABASE {};",
            quote_ident(&self.name)
        ))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::Cell;

    fn app() -> Database {
        Database {
            name: "app".into(),
            collation: DEFAULT_COLLATION.into(),
            compatibility_level: 150,
            owner: None,
        }
    }

    #[test]
    fn test_create_sequence_runs_in_master() {
        let steps = app().create();
        assert_eq!(steps.len(), 2);
        assert_eq!(
            steps[0].statement.sql(),
            "USE [master];\nCREATE DATABASE [app] COLLATE SQL_Latin1_General_CP1_CI_AS;"
        );
        assert!(steps.iter().all(|s| s.statement.context() == Some("master")));
    }

    #[test]
    fn test_owner_adds_step_and_precondition() {
        let db = Database {
            owner: Some("svc".into()),
            ..app()
        };
        let steps = db.create();
        assert_eq!(steps.last().map(|s| s.label), Some("set owner"));
        assert!(
            steps[2]
                .statement
                .body()
                .ends_with("DATABASE::[app] TO [svc];")
        );

        let checks = db.preconditions();
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].query.params(), [crate::command::Param::from("svc")]);
    }

    #[test]
    fn test_invalid_collation_rejected() {
        let bag = AttributeBag::new()
            .with("name", "app")
            .with("collation", "Latin1; DROP DATABASE x");
        let err = Database::from_bag(&bag).unwrap_err();
        assert_eq!(err.attribute(), Some("collation"));
    }

    #[test]
    fn test_invalid_compatibility_level_rejected() {
        let bag = AttributeBag::new()
            .with("name", "app")
            .with("compatibility_level", 155_i64);
        let err = Database::from_bag(&bag).unwrap_err();
        assert_eq!(err.attribute(), Some("compatibility_level"));
    }

    #[test]
    fn test_refresh_keeps_unread_attributes() {
        let row = Row::new(vec![
            Cell::from("app"),
            Cell::from("Latin1_General_CI_AS"),
            Cell::Int(140),
            Cell::Null,
        ]);
        let db = Database {
            owner: Some("svc".into()),
            ..app()
        }
        .refresh(&row);
        assert_eq!(db.collation, "Latin1_General_CI_AS");
        assert_eq!(db.compatibility_level, 140);
        assert_eq!(db.owner.as_deref(), Some("svc"));
    }

    #[test]
    fn test_rename_statement() {
        let renamed = Database {
            name: "app2".into(),
            ..app()
        };
        let step = renamed.rename(&app()).unwrap();
        assert_eq!(step.statement.body(), "ALTER DATABASE [app] MODIFY NAME = [app2];");
    }
}
