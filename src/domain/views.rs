use super::enums::TaskFilter;
use super::filter::matches_filter_on;
use super::store::{StoreChange, StoreObserver, TaskStore};
use super::task::{Task, TaskId};
use chrono::{Local, NaiveDate};

/// One visible task in the projected tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewNode {
    pub id: TaskId,
    /// Depth in the visible tree (0 = root)
    pub depth: usize,
    /// Nodes with children are shown expanded
    pub expanded: bool,
    pub children: Vec<ViewNode>,
}

/// Build the visible tree from scratch.
///
/// A task is shown only if it passes the filter and its parent is shown.
pub fn project_tasks(store: &TaskStore, filter: TaskFilter, today: NaiveDate) -> Vec<ViewNode> {
    store
        .root_ids()
        .iter()
        .filter_map(|id| store.get(id))
        .filter(|task| matches_filter_on(task, filter, today))
        .map(|task| project_node(store, task, filter, today, 0))
        .collect()
}

fn project_node(store: &TaskStore, task: &Task, filter: TaskFilter, today: NaiveDate, depth: usize) -> ViewNode {
    let children: Vec<ViewNode> = store
        .children(&task.id)
        .filter(|child| matches_filter_on(child, filter, today))
        .map(|child| project_node(store, child, filter, today, depth + 1))
        .collect();

    ViewNode {
        id: task.id.clone(),
        depth,
        expanded: !children.is_empty(),
        children,
    }
}

/// A flattened row for rendering the task tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRow {
    /// Index in the flattened list
    pub index: usize,
    pub id: TaskId,
    pub depth: usize,
    /// Whether this is the last visible child of its parent
    pub is_last: bool,
    /// For each ancestor level, whether that ancestor was a last child (drives the │ guides)
    pub ancestors_last: Vec<bool>,
}

/// Flatten the visible tree into rows, depth first
pub fn flatten_view(nodes: &[ViewNode]) -> Vec<FlatRow> {
    let mut rows = Vec::new();
    let mut trail = Vec::new();
    flatten_into(nodes, &mut trail, &mut rows);
    rows
}

fn flatten_into(nodes: &[ViewNode], trail: &mut Vec<bool>, rows: &mut Vec<FlatRow>) {
    let count = nodes.len();
    for (i, node) in nodes.iter().enumerate() {
        let is_last = i + 1 == count;
        rows.push(FlatRow {
            index: rows.len(),
            id: node.id.clone(),
            depth: node.depth,
            is_last,
            ancestors_last: trail.clone(),
        });
        if node.expanded {
            trail.push(is_last);
            flatten_into(&node.children, trail, rows);
            trail.pop();
        }
    }
}

/// Filtered tree view that rebuilds itself whenever the store changes
#[derive(Debug, Clone)]
pub struct TaskView {
    filter: TaskFilter,
    nodes: Vec<ViewNode>,
    built_from: Option<u64>,
}

impl TaskView {
    pub fn new(filter: TaskFilter) -> Self {
        Self {
            filter,
            nodes: Vec::new(),
            built_from: None,
        }
    }

    pub fn filter(&self) -> TaskFilter {
        self.filter
    }

    /// Change the active filter and rebuild
    pub fn set_filter(&mut self, store: &TaskStore, filter: TaskFilter) {
        self.filter = filter;
        self.rebuild(store);
    }

    /// Visible roots, rebuilding first if the store moved on since the last build
    pub fn nodes(&mut self, store: &TaskStore) -> &[ViewNode] {
        if self.is_stale(store) {
            self.rebuild(store);
        }
        &self.nodes
    }

    pub fn rows(&mut self, store: &TaskStore) -> Vec<FlatRow> {
        flatten_view(self.nodes(store))
    }

    pub fn is_stale(&self, store: &TaskStore) -> bool {
        self.built_from != Some(store.revision())
    }

    pub fn rebuild(&mut self, store: &TaskStore) {
        self.rebuild_on(store, Local::now().date_naive());
    }

    pub fn rebuild_on(&mut self, store: &TaskStore, today: NaiveDate) {
        self.nodes = project_tasks(store, self.filter, today);
        self.built_from = Some(store.revision());
        tracing::debug!(filter = self.filter.name(), roots = self.nodes.len(), "view rebuilt");
    }
}

impl StoreObserver for TaskView {
    fn store_changed(&mut self, store: &TaskStore, _change: &StoreChange) {
        self.rebuild(store);
    }
}

/// Checkbox for the completion column
pub fn status_badge(task: &Task) -> &'static str {
    if task.completed {
        "[x]"
    } else {
        "[ ]"
    }
}

/// Get tree connector for a row
pub fn tree_connector(is_last: bool) -> &'static str {
    if is_last {
        "└─"
    } else {
        "├─"
    }
}

/// Indentation guides for the ancestors of a row
pub fn tree_guides(ancestors_last: &[bool]) -> String {
    // Roots have no connector, so their level contributes no guide
    ancestors_last
        .iter()
        .skip(1)
        .map(|last| if *last { "   " } else { "│  " })
        .collect()
}

/// Title plus " (NN%)" for tasks that have subtasks
pub fn title_with_progress(store: &TaskStore, task: &Task) -> String {
    if task.has_subtasks() {
        format!("{} ({}%)", task.title, store.task_progress(&task.id))
    } else {
        task.title.clone()
    }
}
