//! Console rendering of build log entries

use chrono::Local;
use colored::Colorize;
use deploy_api::{LogEntry, LogKind};

/// One printable line, or `None` for entries without text
pub fn format_entry(entry: &LogEntry) -> Option<String> {
    let text = entry.text.as_deref()?.trim_end();
    if text.is_empty() && entry.kind != LogKind::Delimiter {
        return None;
    }

    let time = entry
        .created_at()
        .map(|at| at.with_timezone(&Local).format("%H:%M:%S%.3f").to_string())
        .unwrap_or_default();
    let text = match entry.kind {
        LogKind::Stderr => text.red().to_string(),
        LogKind::Command => text.bold().to_string(),
        LogKind::Delimiter | LogKind::DeploymentState => text.dimmed().to_string(),
        _ => text.to_string(),
    };
    Some(format!("{} {}", time.dimmed(), text))
}

/// Print `entry` to stdout
pub fn print_entry(entry: &LogEntry) {
    if let Some(line) = format_entry(entry) {
        println!("{}", line);
    }
}
