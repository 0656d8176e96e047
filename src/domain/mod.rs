pub mod enums;
pub mod filter;
pub mod progress;
pub mod store;
pub mod task;
pub mod views;

pub use enums::{OrphanPolicy, Priority, TaskFilter};
pub use store::{StoreChange, StoreError, StoreObserver, TaskStore};
pub use task::{default_due_date, parse_timestamp, Task, TaskDraft, TaskId};
pub use views::{
    flatten_view, project_tasks, status_badge, title_with_progress, tree_connector, tree_guides, FlatRow,
    TaskView, ViewNode,
};
