//! Progress and confirmation hooks
//!
//! These traits let the executor report to a terminal (or nothing) without
//! depending on any particular UI crate.

use crate::planner::Action;
use crate::types::{Address, ApplyResult, ResourceKind};
use std::io;

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called when a dependency stage begins
    fn on_stage_start(&mut self, kind: ResourceKind, count: usize, deleting: bool);

    /// Called before a change is applied (sequential runs only)
    fn on_change_start(&mut self, address: &Address, action: Action);

    /// Called when a change completes
    fn on_change_complete(&mut self, address: &Address, result: &ApplyResult);

    /// Called when a stage completes
    fn on_stage_complete(&mut self);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    ///
    /// # Returns
    /// `true` if the user confirmed, `false` otherwise
    fn confirm(&mut self, prompt: &str) -> io::Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_stage_start(&mut self, _kind: ResourceKind, _count: usize, _deleting: bool) {}
    fn on_change_start(&mut self, _address: &Address, _action: Action) {}
    fn on_change_complete(&mut self, _address: &Address, _result: &ApplyResult) {}
    fn on_stage_complete(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> io::Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> io::Result<bool> {
        Ok(false)
    }
}
