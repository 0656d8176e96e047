//! The `tasks.json` document: one JSON array holding every task.

use super::files::{atomic_write, backup_file, read_file};
use crate::domain::Task;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

/// Tasks read from `tasks.json`
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoadedTasks {
    pub tasks: Vec<Task>,
    /// Records stored without an id that were given a fresh one
    pub assigned_ids: usize,
}

/// Serialize tasks as a pretty-printed JSON array
pub fn serialize_tasks(tasks: &[Task]) -> Result<String> {
    serde_json::to_string_pretty(tasks).context("Failed to serialize tasks")
}

/// Parse a JSON array of tasks. Any bad element fails the whole document.
pub fn parse_tasks(content: &str) -> Result<LoadedTasks> {
    let records: Vec<Value> = serde_json::from_str(content).context("Task file is not a JSON array")?;
    let assigned_ids = records.iter().filter(|record| lacks_id(record)).count();
    let tasks = serde_json::from_value(Value::Array(records)).context("Task file is not a valid task array")?;
    Ok(LoadedTasks { tasks, assigned_ids })
}

fn lacks_id(record: &Value) -> bool {
    match record.get("id") {
        None | Some(Value::Null) => true,
        Some(Value::String(id)) => id.trim().is_empty(),
        Some(_) => false,
    }
}

/// Load tasks, treating a missing, unreadable or corrupt file as "no saved data".
///
/// A file that can't be parsed is copied aside first so the next save doesn't lose it.
pub fn load_tasks<P: AsRef<Path>>(path: P) -> LoadedTasks {
    let path = path.as_ref();
    let content = match read_file(path) {
        Ok(Some(content)) => content,
        Ok(None) => {
            tracing::debug!(path = %path.display(), "no saved tasks");
            return LoadedTasks::default();
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read tasks, starting empty");
            return LoadedTasks::default();
        }
    };

    if content.trim().is_empty() {
        return LoadedTasks::default();
    }

    match parse_tasks(&content) {
        Ok(loaded) => {
            tracing::debug!(
                path = %path.display(),
                count = loaded.tasks.len(),
                assigned_ids = loaded.assigned_ids,
                "tasks loaded"
            );
            loaded
        }
        Err(e) => {
            match backup_file(path) {
                Ok(backup) => tracing::warn!(
                    path = %path.display(),
                    backup = %backup.display(),
                    error = format!("{e:#}"),
                    "could not parse tasks, starting empty"
                ),
                Err(backup_err) => tracing::warn!(
                    path = %path.display(),
                    error = format!("{e:#}"),
                    backup_error = %backup_err,
                    "could not parse tasks or back them up, starting empty"
                ),
            }
            LoadedTasks::default()
        }
    }
}

/// Overwrite the task file with the full task list
pub fn save_tasks<P: AsRef<Path>>(path: P, tasks: &[Task]) -> Result<()> {
    let json = serialize_tasks(tasks)?;
    atomic_write(path, &json)?;
    Ok(())
}
