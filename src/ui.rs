use colored::Colorize;
use reconciler::{Diagnostic, Severity};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a diagnostic with its severity marker
pub fn diagnostic(diagnostic: &Diagnostic) {
    let mut subject = diagnostic.summary.clone();
    if let Some(id) = &diagnostic.identifier {
        subject = format!("{id}: {subject}");
    }
    if let Some(attribute) = &diagnostic.attribute {
        subject = format!("{subject} [{attribute}]");
    }

    match diagnostic.severity {
        Severity::Error => error(&subject),
        Severity::Warning => warn(&subject),
    }
    dim(&diagnostic.detail);
}

/// Print every diagnostic
pub fn diagnostics<'a>(items: impl IntoIterator<Item = &'a Diagnostic>) {
    for item in items {
        diagnostic(item);
    }
}
