//! Terminal progress and confirmation for the executor

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use reconciler::{Action, Address, ApplyResult, ConfirmCallback, ProgressCallback, ResourceKind};
use std::io;

/// Progress bar per dependency stage, one line per finished change
pub struct TerminalProgress {
    bar: Option<ProgressBar>,
    quiet: bool,
}

impl TerminalProgress {
    pub fn new(quiet: bool) -> Self {
        Self { bar: None, quiet }
    }

    fn println(&self, line: String) {
        match &self.bar {
            Some(bar) => bar.println(line),
            None => println!("{line}"),
        }
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_stage_start(&mut self, kind: ResourceKind, count: usize, deleting: bool) {
        if self.quiet {
            return;
        }
        let verb = if deleting { "Deleting" } else { "Applying" };
        println!();
        println!("  {} {verb} {count} {kind} resource(s)...", "→".cyan());

        let bar = ProgressBar::new(count as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        self.bar = Some(bar);
    }

    fn on_change_start(&mut self, address: &Address, action: Action) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("{action} {address}"));
        }
    }

    fn on_change_complete(&mut self, address: &Address, result: &ApplyResult) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
        if self.quiet {
            return;
        }
        let line = match result {
            ApplyResult::NoChange => format!("    {} {address}", "○".dimmed()),
            ApplyResult::Created => format!("    {} {address} created", "✓".green()),
            ApplyResult::Modified => format!("    {} {address} updated", "✓".green()),
            ApplyResult::Replaced => format!("    {} {address} replaced", "✓".green()),
            ApplyResult::Removed => format!("    {} {address} deleted", "✓".green()),
            ApplyResult::Failed { error } => {
                format!("    {} {address}: {}", "✗".red(), error.red())
            }
            ApplyResult::Skipped { reason } => {
                format!("    {} {address} ({reason})", "⊘".dimmed())
            }
        };
        self.println(line);
    }

    fn on_stage_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

/// Interactive yes/no prompt
pub struct PromptConfirm;

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(io::Error::other)
    }
}
