//! Terminal side of the execution engine
//!
//! Planning and execution live in the `reconciler` crate; this module
//! renders plans and reports progress.

pub mod differ;
pub mod progress;

pub use differ::{display_diagnostics, display_plan, plan_json, print_summary};
pub use progress::{PromptConfirm, TerminalProgress};
