//! ManagedResource trait - the capability set every resource kind implements
//!
//! Each kind is a typed record decoded from an attribute bag. The record
//! knows its identity and renders its own statements; the
//! [`Reconciler`](crate::Reconciler) drives them through the lifecycle.

use crate::command::{Precondition, Statement, Step};
use crate::descriptor::describe;
use crate::diagnostics::Diagnostic;
use crate::diff::Diff;
use crate::error::Result;
use crate::server::Row;
use crate::types::{AttributeBag, Identifier, ResourceKind};
use std::fmt;

/// Core trait for managed resource kinds
///
/// # Example
///
/// ```ignore
/// impl ManagedResource for Role {
///     const KIND: ResourceKind = ResourceKind::Role;
///
///     fn from_bag(bag: &AttributeBag) -> Result<Self> { ... }
///     fn to_bag(&self) -> AttributeBag { ... }
///     fn identifier(&self) -> Identifier {
///         Identifier::new(format!("{}.{}", self.database, self.name))
///     }
///     fn create(&self) -> Vec<Step> { ... }
///     fn lookup(&self) -> Statement { ... }
///     fn delete(&self) -> Vec<Statement> { ... }
/// }
/// ```
pub trait ManagedResource: Clone + fmt::Debug + Send + Sync + Sized {
    const KIND: ResourceKind;

    /// Decode a bag (defaults already applied) into a typed record
    ///
    /// Only identity attributes are mandatory here; desired-state
    /// requirements are enforced separately so that observed records
    /// restored from an import can be decoded too.
    fn from_bag(bag: &AttributeBag) -> Result<Self>;

    /// Inverse of [`identifier`](Self::identifier), used by import
    fn from_identifier(identifier: &str) -> Result<Self>;

    /// Encode every known attribute, without the identifier
    fn to_bag(&self) -> AttributeBag;

    /// Identifier derived from identity attributes only
    fn identifier(&self) -> Identifier;

    /// Extra checks on a desired record, beyond the attribute set
    fn validate(&self) -> Vec<Diagnostic> {
        Vec::new()
    }

    /// Existence checks run before any DDL on create
    fn preconditions(&self) -> Vec<Precondition> {
        Vec::new()
    }

    /// Creation sequence; the first step creates the primary object
    fn create(&self) -> Vec<Step>;

    /// Query that returns a row while the object exists
    fn lookup(&self) -> Statement;

    /// Apply columns returned by [`lookup`](Self::lookup)
    fn refresh(&self, _row: &Row) -> Self {
        self.clone()
    }

    /// Diff this desired record against an observed bag
    fn diff(&self, observed: &AttributeBag) -> Diff {
        Diff::compute(describe(Self::KIND), &self.to_bag(), observed)
    }

    /// Rename command from `observed` to this record, if the kind has one
    fn rename(&self, _observed: &Self) -> Option<Step> {
        None
    }

    /// Alter commands for in-place changes, issued after any rename
    fn alter(&self, _observed: &Self, _diff: &Diff) -> Vec<Step> {
        Vec::new()
    }

    /// Preconditions for an update, given the diff
    fn update_preconditions(&self, _diff: &Diff) -> Vec<Precondition> {
        Vec::new()
    }

    /// Removal sequence
    fn delete(&self) -> Vec<Statement>;
}

/// Join identity pieces into a composite identifier
///
/// `.` separates pieces; a `.` or `\` inside a piece is escaped with `\`.
pub(crate) fn join_identifier(pieces: &[&str]) -> Identifier {
    let escaped: Vec<String> = pieces
        .iter()
        .map(|piece| piece.replace('\\', "\\\\").replace('.', "\\."))
        .collect();
    Identifier::new(escaped.join("."))
}

/// Split an identifier into exactly `parts` non-empty pieces
///
/// Escapes written by [`join_identifier`] are undone. Unescaped dots past
/// the last separator stay in the last piece.
pub(crate) fn split_identifier(
    kind: ResourceKind,
    identifier: &str,
    parts: usize,
) -> Result<Vec<String>> {
    let mut pieces = Vec::with_capacity(parts);
    let mut current = String::new();
    let mut chars = identifier.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => current.push(chars.next().unwrap_or('\\')),
            '.' if pieces.len() + 1 < parts => pieces.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    pieces.push(current);

    if pieces.len() != parts || pieces.iter().any(String::is_empty) {
        let expected = match parts {
            1 => "<name>",
            2 => "<database>.<name>",
            _ => "<database>.<role>.<member>",
        };
        return Err(crate::error::Error::validation(
            kind,
            crate::descriptor::ID,
            format!("'{identifier}' does not match {expected}"),
        ));
    }
    Ok(pieces)
}
