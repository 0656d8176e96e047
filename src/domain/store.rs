use super::enums::OrphanPolicy;
use super::task::{Task, TaskDraft, TaskId};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

/// Errors raised by store mutations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("parent task {parent} does not exist")]
    OrphanRejected { task: TaskId, parent: TaskId },
    #[error("task {task} cannot be placed under its own descendant {parent}")]
    CycleRejected { task: TaskId, parent: TaskId },
}

/// What an effective mutation changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Added(TaskId),
    Removed(Vec<TaskId>),
    Updated(TaskId),
    /// Completion flags rewritten, toggled task first then each ancestor that flipped
    CompletionChanged(Vec<TaskId>),
    /// Whole store replaced; `repaired` is set when links or levels had to be fixed
    Replaced { repaired: bool },
}

/// Anything that re-derives state from the store when it changes
pub trait StoreObserver {
    fn store_changed(&mut self, store: &TaskStore, change: &StoreChange);
}

/// All tasks keyed by id, plus the ordered list of root tasks.
///
/// The store owns the parent/child links: a task's id sits either in `root_ids`
/// (no parent) or in exactly one parent's `subtask_ids`.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: IndexMap<TaskId, Task>,
    root_ids: Vec<TaskId>,
    orphan_policy: OrphanPolicy,
    revision: u64,
}

impl TaskStore {
    pub fn new(orphan_policy: OrphanPolicy) -> Self {
        Self {
            orphan_policy,
            ..Self::default()
        }
    }

    pub fn orphan_policy(&self) -> OrphanPolicy {
        self.orphan_policy
    }

    pub fn set_orphan_policy(&mut self, policy: OrphanPolicy) {
        self.orphan_policy = policy;
    }

    /// Bumped on every effective mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn root_ids(&self) -> &[TaskId] {
        &self.root_ids
    }

    /// Iterate tasks in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// Direct children of a task, skipping any id no longer stored
    pub fn children<'a>(&'a self, id: &TaskId) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks
            .get(id)
            .map(|t| t.subtask_ids.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|child| self.tasks.get(child))
    }

    /// Ancestors of a task, nearest first
    pub fn parent_chain(&self, id: &TaskId) -> Vec<TaskId> {
        let mut chain: Vec<TaskId> = Vec::new();
        let mut current = self.tasks.get(id).and_then(|t| t.parent_id.as_ref());
        while let Some(parent) = current {
            if chain.contains(parent) || !self.tasks.contains_key(parent) {
                break;
            }
            chain.push(parent.clone());
            current = self.tasks.get(parent).and_then(|t| t.parent_id.as_ref());
        }
        chain
    }

    /// Insert or overwrite a task and link it under its parent (or as a root).
    ///
    /// Overwriting keeps the stored child list. A parent that is not in the
    /// store is handled by the orphan policy.
    pub fn add_task(&mut self, mut task: Task) -> Result<StoreChange, StoreError> {
        let id = task.id.clone();
        match task.parent_id.clone() {
            None => task.level = 0,
            Some(parent) => match self.tasks.get(&parent).map(|p| p.level) {
                Some(parent_level) => {
                    if parent == id || self.parent_chain(&parent).contains(&id) {
                        return Err(StoreError::CycleRejected { task: id, parent });
                    }
                    task.level = parent_level + 1;
                }
                None => match self.orphan_policy {
                    OrphanPolicy::Reject => return Err(StoreError::OrphanRejected { task: id, parent }),
                    OrphanPolicy::PromoteToRoot => {
                        tracing::debug!(task = %id, %parent, "parent missing, promoting to root");
                        task.parent_id = None;
                        task.level = 0;
                    }
                    OrphanPolicy::Detach => {
                        tracing::debug!(task = %id, %parent, "parent missing, storing detached task");
                    }
                },
            },
        }

        let mut moved = false;
        match self.tasks.get(&id) {
            Some(existing) => {
                task.subtask_ids = existing.subtask_ids.clone();
                if existing.parent_id != task.parent_id {
                    let old_parent = existing.parent_id.clone();
                    self.unlink(&id, old_parent.as_ref());
                    moved = true;
                }
            }
            None => {
                let tasks = &self.tasks;
                task.subtask_ids
                    .retain(|c| tasks.get(c).is_some_and(|t| t.parent_id.as_ref() == Some(&id)));
            }
        }

        let parent_id = task.parent_id.clone();
        self.tasks.insert(id.clone(), task);

        match parent_id {
            None => {
                if !self.root_ids.contains(&id) {
                    self.root_ids.push(id.clone());
                }
            }
            Some(parent) => {
                if let Some(parent_task) = self.tasks.get_mut(&parent) {
                    if !parent_task.subtask_ids.contains(&id) {
                        parent_task.subtask_ids.push(id.clone());
                    }
                }
            }
        }
        if moved {
            self.relevel_subtree(&id);
        }

        self.revision += 1;
        Ok(StoreChange::Added(id))
    }

    /// Add `task` beneath `parent_id`. Returns `Ok(None)` when the parent is absent.
    pub fn add_subtask(&mut self, parent_id: &TaskId, mut task: Task) -> Result<Option<StoreChange>, StoreError> {
        let Some(parent) = self.tasks.get(parent_id) else {
            return Ok(None);
        };
        task.level = parent.level + 1;
        task.parent_id = Some(parent_id.clone());
        self.add_task(task).map(Some)
    }

    /// Remove a task and its whole subtree
    pub fn remove_task(&mut self, id: &TaskId) -> Option<StoreChange> {
        if !self.tasks.contains_key(id) {
            return None;
        }

        let mut closure = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([id.clone()]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(task) = self.tasks.get(&current) {
                queue.extend(task.subtask_ids.iter().cloned());
            }
            closure.push(current);
        }

        let mut removed = Vec::with_capacity(closure.len());
        for current in closure {
            let Some(task) = self.tasks.shift_remove(&current) else {
                continue;
            };
            if let Some(parent) = task.parent_id.as_ref().and_then(|p| self.tasks.get_mut(p)) {
                parent.subtask_ids.retain(|c| *c != current);
            }
            self.root_ids.retain(|r| *r != current);
            removed.push(current);
        }

        self.revision += 1;
        Some(StoreChange::Removed(removed))
    }

    /// Replace the editable fields of a task
    pub fn update_task(&mut self, id: &TaskId, draft: TaskDraft) -> Option<StoreChange> {
        let task = self.tasks.get_mut(id)?;
        task.apply(draft);
        self.revision += 1;
        Some(StoreChange::Updated(id.clone()))
    }

    /// Set one task's completion flag without touching its ancestors.
    ///
    /// Returns `None` when the task is absent or already has that value.
    pub fn set_completed(&mut self, id: &TaskId, completed: bool) -> Option<StoreChange> {
        let task = self.tasks.get_mut(id)?;
        if task.completed == completed {
            return None;
        }
        task.completed = completed;
        self.revision += 1;
        Some(StoreChange::CompletionChanged(vec![id.clone()]))
    }

    /// Snapshot of every task: tree pre-order first, then unreachable tasks
    pub fn all_tasks(&self) -> Vec<Task> {
        let mut out = Vec::with_capacity(self.tasks.len());
        let mut seen: HashSet<&TaskId> = HashSet::with_capacity(self.tasks.len());
        let mut stack: Vec<&TaskId> = self.root_ids.iter().rev().collect();

        while let Some(id) = stack.pop() {
            let Some(task) = self.tasks.get(id) else {
                continue;
            };
            if !seen.insert(id) {
                continue;
            }
            out.push(task.clone());
            stack.extend(task.subtask_ids.iter().rev());
        }

        out.extend(self.tasks.values().filter(|t| !seen.contains(&t.id)).cloned());
        out
    }

    /// Replace the whole store with `tasks`, rebuilding roots, child lists and levels.
    ///
    /// A task whose declared parent is missing stays in the map but is linked
    /// nowhere. Stored child order is kept for children that really point back
    /// at the parent; the rest are appended in input order.
    pub fn set_all_tasks(&mut self, tasks: Vec<Task>) -> StoreChange {
        let incoming: Vec<(TaskId, Vec<TaskId>, u32)> =
            tasks.iter().map(|t| (t.id.clone(), t.subtask_ids.clone(), t.level)).collect();

        self.tasks.clear();
        self.root_ids.clear();

        for task in tasks {
            if task.is_root() && !self.root_ids.contains(&task.id) {
                self.root_ids.push(task.id.clone());
            }
            self.tasks.insert(task.id.clone(), task);
        }
        // A duplicate id may have been re-inserted as a child after first being a root
        let tasks = &self.tasks;
        self.root_ids.retain(|id| tasks.get(id).is_some_and(Task::is_root));

        let declared: Vec<(TaskId, Option<TaskId>)> =
            self.tasks.values().map(|t| (t.id.clone(), t.parent_id.clone())).collect();
        let parent_of: HashMap<TaskId, Option<TaskId>> = declared.iter().cloned().collect();
        for task in self.tasks.values_mut() {
            let own = Some(task.id.clone());
            let mut seen = HashSet::new();
            task.subtask_ids
                .retain(|child| parent_of.get(child) == Some(&own) && seen.insert(child.clone()));
        }
        for (id, parent) in &declared {
            let Some(parent) = parent else { continue };
            match self.tasks.get_mut(parent) {
                Some(parent_task) => {
                    if !parent_task.subtask_ids.contains(id) {
                        parent_task.subtask_ids.push(id.clone());
                    }
                }
                None => tracing::debug!(task = %id, %parent, "imported task references a missing parent"),
            }
        }

        self.recompute_levels();

        let repaired = incoming.len() != self.tasks.len()
            || incoming.iter().any(|(id, children, level)| {
                self.tasks
                    .get(id)
                    .map_or(true, |t| t.subtask_ids != *children || t.level != *level)
            });
        if repaired {
            tracing::debug!("imported tasks needed link or level repairs");
        }

        self.revision += 1;
        StoreChange::Replaced { repaired }
    }

    fn recompute_levels(&mut self) {
        let roots: Vec<TaskId> = self.root_ids.clone();
        for root in roots {
            if let Some(task) = self.tasks.get_mut(&root) {
                task.level = 0;
            }
            self.relevel_subtree(&root);
        }
    }

    /// Reset levels below `id` from its own level downward
    fn relevel_subtree(&mut self, id: &TaskId) {
        let Some(start) = self.tasks.get(id).map(|t| t.level) else {
            return;
        };
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([(id.clone(), start)]);
        while let Some((current, level)) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(task) = self.tasks.get_mut(&current) {
                task.level = level;
                queue.extend(task.subtask_ids.iter().map(|c| (c.clone(), level + 1)));
            }
        }
    }

    /// Drop `id` from wherever it is currently listed
    fn unlink(&mut self, id: &TaskId, parent: Option<&TaskId>) {
        match parent.and_then(|p| self.tasks.get_mut(p)) {
            Some(parent_task) => parent_task.subtask_ids.retain(|c| c != id),
            None => self.root_ids.retain(|r| r != id),
        }
    }

    pub(crate) fn get_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(id)
    }

    pub(crate) fn bump_revision(&mut self) {
        self.revision += 1;
    }
}
