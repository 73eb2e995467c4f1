//! Output helpers for the `emdx` CLI.
//!
//! Human rendering stays deliberately thin (compact rows and small
//! tables); anything richer belongs to external formatters. JSON output is
//! the machine contract and every command supports it.

use std::io::{self, Write};

use serde::Serialize;

use emdx_core::document::Document;
use emdx_core::execution::Execution;
use emdx_core::task::Task;

/// Prints a value as pretty JSON on stdout.
pub fn output_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            // Ignore broken pipes (e.g. piped into `head`).
            let _ = writeln!(handle, "{json}");
        }
        Err(e) => {
            eprintln!("Error: failed to serialize JSON: {e}");
            std::process::exit(1);
        }
    }
}

/// Prints a simple aligned table.
pub fn output_table(headers: &[&str], rows: &[Vec<String>]) {
    if rows.is_empty() {
        return;
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    for (i, header) in headers.iter().enumerate() {
        if i > 0 {
            let _ = write!(handle, "  ");
        }
        let _ = write!(handle, "{:<width$}", header, width = widths[i]);
    }
    let _ = writeln!(handle);
    for (i, width) in widths.iter().enumerate() {
        if i > 0 {
            let _ = write!(handle, "  ");
        }
        let _ = write!(handle, "{}", "-".repeat(*width));
    }
    let _ = writeln!(handle);
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i > 0 {
                let _ = write!(handle, "  ");
            }
            if i < widths.len() {
                let _ = write!(handle, "{:<width$}", cell, width = widths[i]);
            } else {
                let _ = write!(handle, "{cell}");
            }
        }
        let _ = writeln!(handle);
    }
}

/// One-line document summary: `#id title [project] (tags)`.
pub fn format_document_compact(doc: &Document) -> String {
    let project = doc
        .project
        .as_deref()
        .map(|p| format!(" [{p}]"))
        .unwrap_or_default();
    let tags = if doc.tags.is_empty() {
        String::new()
    } else {
        format!(" ({})", doc.tags.join(", "))
    };
    format!("#{} {}{}{}", doc.id, doc.title, project, tags)
}

/// Multi-line document view.
pub fn format_document_detail(doc: &Document) -> String {
    let mut lines = Vec::new();
    lines.push(format!("#{} {}", doc.id, doc.title));
    if let Some(ref project) = doc.project {
        lines.push(format!("Project: {project}"));
    }
    lines.push(format!(
        "Created: {}  Updated: {}",
        doc.created_at.format("%Y-%m-%d %H:%M"),
        doc.updated_at.format("%Y-%m-%d %H:%M")
    ));
    if let Some(ref archived_at) = doc.archived_at {
        lines.push(format!("Archived: {}", archived_at.format("%Y-%m-%d %H:%M")));
    }
    if let Some(ref deleted_at) = doc.deleted_at {
        lines.push(format!("Trashed: {}", deleted_at.format("%Y-%m-%d %H:%M")));
    }
    if !doc.tags.is_empty() {
        lines.push(format!("Tags: {}", doc.tags.join(", ")));
    }
    lines.push(format!("Views: {}", doc.access_count));
    lines.push(String::new());
    lines.push(doc.content.clone());
    lines.join("\n")
}

/// Table row for a task.
pub fn format_task_row(task: &Task) -> Vec<String> {
    vec![
        task.id.to_string(),
        format!("P{}", task.priority),
        task.status.to_string(),
        task.category
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_default(),
        task.epic_key.clone().unwrap_or_default(),
        task.title.clone(),
    ]
}

/// Table row for an execution.
pub fn format_execution_row(exec: &Execution) -> Vec<String> {
    vec![
        exec.id.clone(),
        exec.status.to_string(),
        exec.pid.map(|p| p.to_string()).unwrap_or_default(),
        exec.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        exec.exit_code.map(|c| c.to_string()).unwrap_or_default(),
        truncate(&exec.task, 48),
    ]
}

/// Truncates for table cells, appending an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    } else {
        s.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emdx_core::document::DocumentBuilder;
    use emdx_core::task::TaskBuilder;

    #[test]
    fn compact_includes_id_title_tags() {
        let mut doc = DocumentBuilder::new("Async Patterns")
            .content("x".repeat(10))
            .project("emdx")
            .tag("gameplan")
            .build();
        doc.id = 7;
        let line = format_document_compact(&doc);
        assert!(line.contains("#7"));
        assert!(line.contains("Async Patterns"));
        assert!(line.contains("[emdx]"));
        assert!(line.contains("gameplan"));
    }

    #[test]
    fn detail_includes_content() {
        let doc = DocumentBuilder::new("T").content("body text here").build();
        let detail = format_document_detail(&doc);
        assert!(detail.contains("body text here"));
        assert!(detail.contains("Views: 0"));
    }

    #[test]
    fn task_row_columns() {
        let task = TaskBuilder::new("Fix it").priority(1).build();
        let row = format_task_row(&task);
        assert_eq!(row[1], "P1");
        assert_eq!(row[2], "open");
        assert_eq!(row[5], "Fix it");
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        let long = truncate(&"é".repeat(20), 10);
        assert!(long.ends_with('…'));
    }
}
