//! # Reconciler
//!
//! Converges the administrative state of a SQL Server instance (databases,
//! logins, users, roles and role memberships) onto a declared desired state.
//!
//! ## Core Concepts
//!
//! - **AttributeBag**: wire-level attributes of one resource, as declared or as observed
//! - **Descriptor**: per-kind attribute set, identity and update policy
//! - **ManagedResource**: typed record per kind that renders its own statements
//! - **Reconciler**: Create / Read / Update / Delete / Import against a [`ServerHandle`]
//! - **ExecutionPlan**: declared vs. tracked resources, turned into ordered actions
//! - **Executor**: applies a plan in dependency stages with bounded parallelism
//!
//! ## Example
//!
//! ```ignore
//! use reconciler::{AttributeBag, Reconciler, ResourceKind};
//!
//! let server = connect()?; // anything implementing ServerHandle
//! let reconciler = Reconciler::new(&server);
//!
//! let desired = AttributeBag::new()
//!     .with("name", "app")
//!     .with("type", "sql")
//!     .with("password", "s3cret");
//!
//! let response = reconciler.create(ResourceKind::Login, &desired);
//! for diagnostic in &response.diagnostics {
//!     eprintln!("{diagnostic}");
//! }
//! if let Some(observed) = response.state {
//!     assert_eq!(observed.get_str("id"), Some("app"));
//! }
//! ```
//!
//! ## Provider Traits
//!
//! - [`ServerHandle`]: executes statements; the engine never owns a connection
//! - [`ProgressCallback`]: receives progress updates
//! - [`ConfirmCallback`]: handles user confirmations

pub mod codec;
pub mod command;
pub mod context;
pub mod descriptor;
pub mod diagnostics;
pub mod diff;
pub mod error;
pub mod executor;
pub mod planner;
pub mod reconciler;
pub mod resource;
pub mod resources;
pub mod server;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use command::{Param, Statement, quote_ident, quote_literal};
pub use context::{AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback};
pub use descriptor::{AttributeSpec, Descriptor, UpdatePolicy, describe};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use diff::{AttributeChange, Change, Diff};
pub use error::{Error, ErrorCategory, Result};
pub use executor::{ExecuteReport, Outcome, StateChange, execute};
pub use planner::{Action, ExecutionPlan, PlannedChange, Stage};
pub use reconciler::{Reconciler, Response, identify, validate};
pub use resource::ManagedResource;
pub use server::{Cell, RemoteError, Row, ServerHandle};
pub use types::{
    Address, ApplyResult, AttrValue, AttributeBag, ExecuteOptions, ExecuteSummary, Identifier,
    ResourceKind,
};
