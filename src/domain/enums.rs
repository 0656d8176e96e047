use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Task priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum Priority {
    #[serde(alias = "low")]
    Low,
    #[default]
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "high")]
    High,
}

impl Priority {
    /// Label as stored on disk and shown in the task list
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

/// Named filter selecting which tasks are visible in the tree view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum TaskFilter {
    #[default]
    AllTasks,
    Pending,
    Completed,
    HighPriority,
    DueToday,
    MainTasksOnly,
}

impl TaskFilter {
    /// Parse a display name like "High Priority"
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|f| f.name() == name.trim())
    }

    /// Parse a display name, falling back to `AllTasks` for anything unknown.
    ///
    /// An unrecognized filter matches every task, so the fallback is the
    /// filter with the same behavior.
    pub fn from_name_lenient(name: &str) -> Self {
        match Self::from_name(name) {
            Some(filter) => filter,
            None => {
                tracing::debug!(filter = name, "unknown filter name, showing all tasks");
                Self::AllTasks
            }
        }
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::AllTasks => "All Tasks",
            Self::Pending => "Pending",
            Self::Completed => "Completed",
            Self::HighPriority => "High Priority",
            Self::DueToday => "Due Today",
            Self::MainTasksOnly => "Main Tasks Only",
        }
    }

    /// Get all filters in menu order
    pub fn all() -> &'static [TaskFilter] {
        &[
            TaskFilter::AllTasks,
            TaskFilter::Pending,
            TaskFilter::Completed,
            TaskFilter::HighPriority,
            TaskFilter::DueToday,
            TaskFilter::MainTasksOnly,
        ]
    }
}

/// What `add_task` does with a task whose parent is not in the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OrphanPolicy {
    /// Refuse the insert
    #[default]
    Reject,
    /// Clear the parent link and insert as a root task
    PromoteToRoot,
    /// Store the task without linking it anywhere
    Detach,
}

impl OrphanPolicy {
    /// Name as written in config.json
    pub fn label(&self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::PromoteToRoot => "promote-to-root",
            Self::Detach => "detach",
        }
    }
}
