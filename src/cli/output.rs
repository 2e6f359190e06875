//! Output formatting utilities for the CLI.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

use crate::domain::models::{Checklist, FieldChange, Task, TaskStatus};

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Truncate a string to a maximum number of characters, appending "..." if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// First eight characters of an id, the way ids are shown in tables.
pub fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|l| Cell::new(l).add_attribute(Attribute::Bold))
        .collect()
}

const fn status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::New | TaskStatus::ToDo => Color::Grey,
        TaskStatus::InProgress => Color::Blue,
        TaskStatus::InReview | TaskStatus::InReEdit => Color::Yellow,
        TaskStatus::Completed => Color::Green,
    }
}

/// Render checklists as a table.
pub fn checklist_table(checklists: &[Checklist]) -> String {
    let mut table = base_table();
    table.set_header(header(&["ID", "Name", "Done"]));
    for checklist in checklists {
        table.add_row(vec![
            Cell::new(short_id(&checklist.id)),
            Cell::new(truncate(&checklist.name, 48)),
            Cell::new(if checklist.is_completed { "yes" } else { "no" }),
        ]);
    }
    table.to_string()
}

/// Render tasks (typically a review chain) as a table.
pub fn task_table(tasks: &[Task]) -> String {
    let mut table = base_table();
    table.set_header(header(&["ID", "Name", "Type", "Status", "Reviewed"]));
    for task in tasks {
        table.add_row(vec![
            Cell::new(short_id(&task.id)),
            Cell::new(truncate(&task.name, 40)),
            Cell::new(task.task_type.as_str()),
            Cell::new(task.status.as_str()).fg(status_color(task.status)),
            Cell::new(if task.is_reviewed { "yes" } else { "-" }),
        ]);
    }
    table.to_string()
}

/// Render audit records, oldest first.
pub fn audit_table(changes: &[FieldChange]) -> String {
    let mut table = base_table();
    table.set_header(header(&["When", "Field", "Old", "New", "Actor"]));
    for change in changes {
        table.add_row(vec![
            Cell::new(change.changed_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::new(change.field.as_str()),
            Cell::new(change.old_value.as_deref().unwrap_or("-")),
            Cell::new(change.new_value.as_deref().unwrap_or("-")),
            Cell::new(change.actor.as_str()),
        ]);
    }
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ActorId;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer name here", 10), "a longe...");
        assert_eq!(truncate("ééééééééééé", 6), "ééé...");
    }

    #[test]
    fn test_tables_include_rows() {
        let actor = ActorId::new("dana");
        let checklist = Checklist::new("Write docs", actor.clone());
        let rendered = checklist_table(std::slice::from_ref(&checklist));
        assert!(rendered.contains("Write docs"));
        assert!(rendered.contains(&short_id(&checklist.id)));

        let task = Task::new("Ship it", actor);
        let rendered = task_table(&[task]);
        assert!(rendered.contains("Ship it"));
        assert!(rendered.contains("to_do"));
    }
}
