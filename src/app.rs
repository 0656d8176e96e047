use crate::domain::{
    default_due_date, parse_timestamp, FlatRow, OrphanPolicy, Priority, StoreChange, StoreError, StoreObserver, Task, TaskDraft,
    TaskFilter, TaskId, TaskStore, TaskView,
};
use crate::persistence::{config_file, ensure_data_dir, load_config, load_tasks, save_config, save_tasks, tasks_file, AppConfig};
use anyhow::Result;
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Shortest id prefix accepted as a task reference
const MIN_ID_PREFIX: usize = 4;

/// Rejected user input. State is left untouched when one of these is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppError {
    #[error("task title cannot be empty")]
    EmptyTitle,
    #[error("no task matches '{0}'")]
    UnknownTask(String),
    #[error("'{reference}' matches {count} tasks, use the task id instead")]
    AmbiguousTask { reference: String, count: usize },
    #[error("could not understand due date '{0}' (try today, tomorrow, in 3d, YYYY-MM-DD or \"YYYY-MM-DD HH:MM\")")]
    InvalidDue(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fields for a new task
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    /// Defaults to this time tomorrow
    pub due_date: Option<DateTime<Local>>,
    pub priority: Priority,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            due_date: None,
            priority: Priority::default(),
        }
    }
}

/// Partial edit; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct TaskEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Local>>,
    pub priority: Option<Priority>,
}

/// Main application state
pub struct AppState {
    store: TaskStore,
    view: TaskView,
    config: AppConfig,
    data_dir: PathBuf,
    pub needs_save: bool,
}

impl AppState {
    pub fn new(data_dir: PathBuf, config: AppConfig) -> Self {
        Self {
            store: TaskStore::new(config.orphan_policy),
            view: TaskView::new(config.filter()),
            config,
            data_dir,
            needs_save: false,
        }
    }

    /// Open the data directory, creating it if needed, and load config and tasks
    pub fn open(data_dir: PathBuf) -> Result<Self> {
        ensure_data_dir(&data_dir)?;
        let config = match load_config(config_file(&data_dir)) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = format!("{e:#}"), "could not load config, using defaults");
                AppConfig::default()
            }
        };

        let mut app = Self::new(data_dir, config);
        app.load();
        Ok(app)
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn filter(&self) -> TaskFilter {
        self.view.filter()
    }

    /// Replace the store with whatever tasks.json holds.
    ///
    /// Marks the state dirty when ids had to be assigned or links repaired, so
    /// the next save writes the settled form back.
    pub fn load(&mut self) {
        let loaded = load_tasks(tasks_file(&self.data_dir));
        let assigned_ids = loaded.assigned_ids;
        let change = self.store.set_all_tasks(loaded.tasks);
        let repaired = matches!(change, StoreChange::Replaced { repaired: true });
        if assigned_ids > 0 || repaired {
            tracing::info!(assigned_ids, repaired, "task file needs rewriting");
        }
        self.view.store_changed(&self.store, &change);
        self.needs_save = assigned_ids > 0 || repaired;
    }

    /// Write every task to tasks.json
    pub fn save(&mut self) -> Result<()> {
        save_tasks(tasks_file(&self.data_dir), &self.store.all_tasks())?;
        self.needs_save = false;
        Ok(())
    }

    /// Save if anything changed. A failure is logged and the in-memory state kept.
    pub fn save_if_needed(&mut self) {
        if !self.needs_save {
            return;
        }
        if let Err(e) = self.save() {
            tracing::warn!(error = format!("{e:#}"), "could not save tasks");
        }
    }

    /// Change and persist the stored settings
    pub fn update_config(&mut self, orphan_policy: Option<OrphanPolicy>, default_filter: Option<TaskFilter>) -> Result<()> {
        if let Some(policy) = orphan_policy {
            self.config.orphan_policy = policy;
            self.store.set_orphan_policy(policy);
        }
        if let Some(filter) = default_filter {
            self.config.default_filter = filter.name().to_string();
        }
        save_config(config_file(&self.data_dir), &self.config)
    }

    /// Add a root task, or a subtask when `parent` is given
    pub fn add_task(&mut self, new: NewTask, parent: Option<&TaskId>) -> Result<TaskId, AppError> {
        let mut task = build_task(new)?;
        let id = task.id.clone();
        task.parent_id = parent.cloned();

        let change = self.store.add_task(task)?;
        tracing::debug!(task = %id, parent = ?parent, "task added");
        self.commit(change);
        Ok(id)
    }

    /// Add a subtask. Returns `Ok(None)` and changes nothing if the parent is gone.
    pub fn add_subtask(&mut self, parent: &TaskId, new: NewTask) -> Result<Option<TaskId>, AppError> {
        let task = build_task(new)?;
        let id = task.id.clone();
        match self.store.add_subtask(parent, task)? {
            Some(change) => {
                tracing::debug!(task = %id, parent = %parent, "subtask added");
                self.commit(change);
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// Apply a partial edit. Completion, parent and children are kept.
    pub fn edit_task(&mut self, id: &TaskId, edit: TaskEdit) -> Result<bool, AppError> {
        let Some(task) = self.store.get(id) else {
            return Ok(false);
        };
        let mut draft: TaskDraft = task.draft();
        if let Some(title) = edit.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(AppError::EmptyTitle);
            }
            draft.title = title.to_string();
        }
        if let Some(description) = edit.description {
            draft.description = description;
        }
        if let Some(due) = edit.due_date {
            draft.due_date = due;
        }
        if let Some(priority) = edit.priority {
            draft.priority = priority;
        }

        match self.store.update_task(id, draft) {
            Some(change) => {
                self.commit(change);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Delete a task and its subtree, returning every removed id
    pub fn delete_task(&mut self, id: &TaskId) -> Vec<TaskId> {
        let Some(change) = self.store.remove_task(id) else {
            return Vec::new();
        };
        let removed = match &change {
            StoreChange::Removed(ids) => ids.clone(),
            _ => Vec::new(),
        };
        tracing::debug!(task = %id, removed = removed.len(), "task deleted");
        self.commit(change);
        removed
    }

    /// Mark a task done or not done and carry the result up to its ancestors.
    ///
    /// Returns the ids whose flag changed, the task itself first.
    pub fn set_completed(&mut self, id: &TaskId, completed: bool) -> Vec<TaskId> {
        let Some(change) = self.store.toggle_completion(id, completed) else {
            return Vec::new();
        };
        let changed = match &change {
            StoreChange::CompletionChanged(ids) => ids.clone(),
            _ => Vec::new(),
        };
        self.commit(change);
        changed
    }

    pub fn set_filter(&mut self, filter: TaskFilter) {
        self.view.set_filter(&self.store, filter);
    }

    pub fn progress(&self, id: &TaskId) -> u8 {
        self.store.task_progress(id)
    }

    /// Rows of the filtered tree, in display order
    pub fn visible_rows(&mut self) -> Vec<FlatRow> {
        self.view.rows(&self.store)
    }

    /// Resolve a task reference.
    ///
    /// Tried in order: the exact id, a case-insensitive title, then a
    /// case-insensitive id prefix of at least four characters. A title or
    /// prefix that fits several tasks is an error.
    pub fn resolve_task_ref(&self, reference: &str) -> Result<TaskId, AppError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(AppError::UnknownTask(String::new()));
        }

        let exact = TaskId::from(reference);
        if self.store.contains(&exact) {
            return Ok(exact);
        }

        let lowered = reference.to_lowercase();
        let by_title: Vec<&TaskId> = self
            .store
            .iter()
            .filter(|t| t.title.to_lowercase() == lowered)
            .map(|t| &t.id)
            .collect();
        if let Some(id) = single_match(reference, &by_title)? {
            return Ok(id);
        }

        if lowered.chars().count() >= MIN_ID_PREFIX {
            let by_prefix: Vec<&TaskId> = self
                .store
                .iter()
                .filter(|t| t.id.as_str().to_lowercase().starts_with(&lowered))
                .map(|t| &t.id)
                .collect();
            if let Some(id) = single_match(reference, &by_prefix)? {
                return Ok(id);
            }
        }

        Err(AppError::UnknownTask(reference.to_string()))
    }

    fn commit(&mut self, change: StoreChange) {
        self.view.store_changed(&self.store, &change);
        self.needs_save = true;
    }
}

fn single_match(reference: &str, candidates: &[&TaskId]) -> Result<Option<TaskId>, AppError> {
    match candidates {
        [] => Ok(None),
        [id] => Ok(Some((*id).clone())),
        many => Err(AppError::AmbiguousTask {
            reference: reference.to_string(),
            count: many.len(),
        }),
    }
}

fn build_task(new: NewTask) -> Result<Task, AppError> {
    let title = new.title.trim();
    if title.is_empty() {
        return Err(AppError::EmptyTitle);
    }
    let due = new.due_date.unwrap_or_else(default_due_date);
    Ok(Task::new(title, new.description, due, new.priority))
}

/// Parse a due date typed by the user.
///
/// Accepts:
/// - "today", "tomorrow"
/// - "in 3d"
/// - "YYYY-MM-DD" (keeps the current time of day)
/// - "YYYY-MM-DD HH:MM"
/// - a full ISO timestamp
pub fn parse_due_input(input: &str, now: DateTime<Local>) -> Result<DateTime<Local>, AppError> {
    let raw = input.trim();
    let s = raw.to_lowercase();
    let invalid = || AppError::InvalidDue(raw.to_string());

    let days = match s.as_str() {
        "today" => Some(0),
        "tomorrow" => Some(1),
        _ => s
            .strip_prefix("in ")
            .and_then(|rest| rest.strip_suffix('d'))
            .and_then(|n| n.trim().parse::<i64>().ok()),
    };
    if let Some(days) = days {
        return Duration::try_days(days)
            .and_then(|delta| now.checked_add_signed(delta))
            .ok_or_else(invalid);
    }

    if let Ok(ts) = NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M") {
        return ts.and_local_timezone(Local).earliest().ok_or_else(invalid);
    }
    if let Ok(date) = NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
        return date.and_time(now.time()).and_local_timezone(Local).earliest().ok_or_else(invalid);
    }

    parse_timestamp(raw).ok_or_else(invalid)
}
