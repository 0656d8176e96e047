use super::enums::Priority;
use chrono::{DateTime, Duration, Local, NaiveDateTime, SecondsFormat, Timelike};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identifier of a task.
///
/// New tasks get a UUID, but any non-empty string read from disk is kept as is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }
}

/// A blank or null id on disk is treated like a missing one and replaced by a fresh id
impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) if !raw.trim().is_empty() => Ok(Self::from(raw.as_str())),
            _ => Ok(Self::new()),
        }
    }
}

/// A task or subtask.
///
/// The serialized form is one element of the `tasks.json` array. Files written
/// by the flat-list version carry no `id`, `parentId`, `level` or `subtaskIds`;
/// those load as root tasks with fresh ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique ID, never changes after construction
    #[serde(default)]
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "iso_timestamp")]
    pub due_date: DateTime<Local>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
    /// Set once at construction
    #[serde(with = "iso_timestamp")]
    pub created_date: DateTime<Local>,
    /// None for root tasks, written as "" on disk
    #[serde(default, with = "parent_link")]
    pub parent_id: Option<TaskId>,
    /// Depth in the tree (0 = root)
    #[serde(default)]
    pub level: u32,
    /// Direct children in insertion order
    #[serde(default)]
    pub subtask_ids: Vec<TaskId>,
}

impl Task {
    pub fn new(title: impl Into<String>, description: impl Into<String>, due_date: DateTime<Local>, priority: Priority) -> Self {
        Self {
            id: TaskId::new(),
            title: title.into(),
            description: description.into(),
            due_date: truncate_to_seconds(due_date),
            priority,
            completed: false,
            created_date: truncate_to_seconds(Local::now()),
            parent_id: None,
            level: 0,
            subtask_ids: Vec::new(),
        }
    }

    /// A task due one day from now with medium priority
    pub fn with_title(title: impl Into<String>) -> Self {
        Self::new(title, String::new(), default_due_date(), Priority::Medium)
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn has_subtasks(&self) -> bool {
        !self.subtask_ids.is_empty()
    }

    /// Snapshot of the editable fields
    pub fn draft(&self) -> TaskDraft {
        TaskDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            due_date: self.due_date,
            priority: self.priority,
            completed: self.completed,
        }
    }

    /// Overwrite the editable fields. Identity, hierarchy and creation time stay.
    pub fn apply(&mut self, draft: TaskDraft) {
        self.title = draft.title;
        self.description = draft.description;
        self.due_date = truncate_to_seconds(draft.due_date);
        self.priority = draft.priority;
        self.completed = draft.completed;
    }
}

/// The fields an update may replace
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub due_date: DateTime<Local>,
    pub priority: Priority,
    pub completed: bool,
}

/// Default due date for new tasks: this time tomorrow
pub fn default_due_date() -> DateTime<Local> {
    Local::now() + Duration::days(1)
}

fn truncate_to_seconds(ts: DateTime<Local>) -> DateTime<Local> {
    ts.with_nanosecond(0).unwrap_or(ts)
}

/// Parse an ISO-8601 timestamp. Values without an offset are local time.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Local>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Local));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .ok()?;
    naive.and_local_timezone(Local).earliest()
}

mod iso_timestamp {
    use super::{parse_timestamp, SecondsFormat};
    use chrono::{DateTime, Local};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Local>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, false))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Local>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("invalid ISO-8601 timestamp: {raw:?}")))
    }
}

mod parent_link {
    use super::TaskId;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(parent: &Option<TaskId>, serializer: S) -> Result<S::Ok, S::Error> {
        match parent {
            Some(id) => serializer.serialize_str(id.as_str()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<TaskId>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        if raw.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(TaskId::from(raw.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_task_new() {
        let task = Task::with_title("Groceries");
        assert_eq!(task.title, "Groceries");
        assert_eq!(task.priority, Priority::Medium);
        assert!(!task.completed);
        assert!(task.is_root());
        assert!(!task.has_subtasks());
        assert_eq!(task.level, 0);
        assert!(task.due_date > task.created_date);
    }

    #[test]
    fn test_task_ids_are_unique() {
        let a = Task::with_title("A");
        let b = Task::with_title("A");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_apply_keeps_identity_and_hierarchy() {
        let parent = TaskId::new();
        let child = TaskId::new();
        let mut task = Task::with_title("Old");
        task.parent_id = Some(parent.clone());
        task.level = 2;
        task.subtask_ids.push(child.clone());
        let id = task.id.clone();
        let created = task.created_date;

        let mut draft = task.draft();
        draft.title = "New".to_string();
        draft.priority = Priority::High;
        draft.completed = true;
        task.apply(draft);

        assert_eq!(task.title, "New");
        assert_eq!(task.priority, Priority::High);
        assert!(task.completed);
        assert_eq!(task.id, id);
        assert_eq!(task.parent_id, Some(parent));
        assert_eq!(task.level, 2);
        assert_eq!(task.subtask_ids, vec![child]);
        assert_eq!(task.created_date, created);
    }

    #[test]
    fn test_task_json_field_names() {
        let mut task = Task::with_title("Milk");
        task.parent_id = Some(TaskId::new());
        task.level = 1;
        let value = serde_json::to_value(&task).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "id", "title", "description", "dueDate", "priority", "completed", "createdDate", "parentId", "level",
            "subtaskIds",
        ] {
            assert!(obj.contains_key(key), "missing key {key}");
        }
        assert_eq!(obj["priority"], "Medium");
    }

    #[test]
    fn test_root_parent_serializes_as_empty_string() {
        let task = Task::with_title("Root");
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["parentId"], "");

        let back: Task = serde_json::from_value(value).unwrap();
        assert_eq!(back.parent_id, None);
        assert_eq!(back, task);
    }

    #[test]
    fn test_flat_list_record_loads_as_root() {
        let json = r#"{
            "title": "Call mom",
            "description": "Sunday",
            "dueDate": "2024-03-10T18:00:00",
            "priority": "High",
            "completed": false,
            "createdDate": "2024-03-09T09:30:00"
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.title, "Call mom");
        assert_eq!(task.priority, Priority::High);
        assert!(task.is_root());
        assert_eq!(task.level, 0);
        assert!(task.subtask_ids.is_empty());
        assert_eq!(task.due_date.day(), 10);
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let local = parse_timestamp("2024-05-01T08:15:00").unwrap();
        assert_eq!(local, Local.with_ymd_and_hms(2024, 5, 1, 8, 15, 0).unwrap());

        let offset = parse_timestamp("2024-05-01T08:15:00+00:00").unwrap();
        assert_eq!(offset.naive_utc().to_string(), "2024-05-01 08:15:00");

        assert!(parse_timestamp("tomorrow").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_plain_string_ids_load() {
        let json = r#"[
            {"id": "t1", "title": "Groceries", "dueDate": "2024-03-10T18:00:00",
             "createdDate": "2024-03-09T09:30:00", "parentId": "", "subtaskIds": ["t2"]},
            {"id": "t2", "title": "Milk", "dueDate": "2024-03-10T18:00:00",
             "createdDate": "2024-03-09T09:30:00", "parentId": "t1", "level": 1}
        ]"#;
        let tasks: Vec<Task> = serde_json::from_str(json).unwrap();
        assert_eq!(tasks[0].id, TaskId::from("t1"));
        assert_eq!(tasks[0].subtask_ids, vec![TaskId::from("t2")]);
        assert_eq!(tasks[1].parent_id, Some(TaskId::from("t1")));

        let value = serde_json::to_value(&tasks[1]).unwrap();
        assert_eq!(value["id"], "t2");
        assert_eq!(value["parentId"], "t1");
    }

    #[test]
    fn test_blank_id_gets_a_fresh_one() {
        let mut value = serde_json::to_value(Task::with_title("x")).unwrap();
        value["id"] = serde_json::Value::String("  ".to_string());
        let task: Task = serde_json::from_value(value).unwrap();
        assert!(!task.id.as_str().trim().is_empty());
    }
}
