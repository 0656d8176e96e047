use super::store::{StoreChange, TaskStore};
use super::task::TaskId;

impl TaskStore {
    /// Percentage of direct children completed, rounded down.
    ///
    /// A leaf reports 100 when completed and 0 otherwise; an unknown id reports 0.
    pub fn task_progress(&self, id: &TaskId) -> u8 {
        let Some(task) = self.get(id) else {
            return 0;
        };
        if !task.has_subtasks() {
            return if task.completed { 100 } else { 0 };
        }

        let total = task.subtask_ids.len();
        let completed = task
            .subtask_ids
            .iter()
            .filter(|child| self.get(child).is_some_and(|c| c.completed))
            .count();
        (completed * 100 / total) as u8
    }

    /// Bring ancestors' completion flags in line with their children after `id` changed.
    ///
    /// Walks the parent chain and stops at the first parent whose flag already
    /// matches "all direct children completed". Returns the ancestors that flipped.
    pub fn propagate_completion(&mut self, id: &TaskId) -> Vec<TaskId> {
        let mut flipped = Vec::new();
        let mut current = id.clone();

        // Each step flips a distinct flag, so the walk never exceeds the store size
        for _ in 0..self.len() {
            let Some(parent_id) = self.get(&current).and_then(|t| t.parent_id.clone()) else {
                break;
            };
            let Some(parent) = self.get(&parent_id) else {
                break;
            };
            let all_done = self.children(&parent_id).all(|child| child.completed);
            if parent.completed == all_done {
                break;
            }
            if let Some(parent) = self.get_mut(&parent_id) {
                parent.completed = all_done;
            }
            flipped.push(parent_id.clone());
            current = parent_id;
        }

        if !flipped.is_empty() {
            tracing::debug!(task = %id, ancestors = flipped.len(), "completion propagated");
            self.bump_revision();
        }
        flipped
    }

    /// Set a task's completion flag and propagate the result upward.
    ///
    /// Propagation runs even when the flag already had that value, so a stale
    /// ancestor gets repaired. Returns `None` when nothing changed.
    pub fn toggle_completion(&mut self, id: &TaskId, completed: bool) -> Option<StoreChange> {
        if !self.contains(id) {
            return None;
        }
        let mut changed = match self.set_completed(id, completed) {
            Some(StoreChange::CompletionChanged(ids)) => ids,
            _ => Vec::new(),
        };
        changed.extend(self.propagate_completion(id));

        if changed.is_empty() {
            None
        } else {
            Some(StoreChange::CompletionChanged(changed))
        }
    }
}
