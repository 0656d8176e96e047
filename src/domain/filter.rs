use super::enums::{Priority, TaskFilter};
use super::task::Task;
use chrono::NaiveDate;

/// Check a task against a filter, with `today` as the reference day for "Due Today"
pub fn matches_filter_on(task: &Task, filter: TaskFilter, today: NaiveDate) -> bool {
    match filter {
        TaskFilter::AllTasks => true,
        TaskFilter::Pending => !task.completed,
        TaskFilter::Completed => task.completed,
        TaskFilter::HighPriority => task.priority == Priority::High,
        TaskFilter::DueToday => task.due_date.date_naive() == today,
        TaskFilter::MainTasksOnly => task.is_root(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskId;
    use chrono::{Duration, Local, TimeZone};
    use pretty_assertions::assert_eq;

    fn task(title: &str, priority: Priority) -> Task {
        let due = Local.with_ymd_and_hms(2024, 6, 14, 17, 30, 0).unwrap();
        Task::new(title, "", due, priority)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()
    }

    #[test]
    fn test_all_tasks_matches_everything() {
        let mut t = task("a", Priority::Low);
        assert!(matches_filter_on(&t, TaskFilter::AllTasks, today()));
        t.completed = true;
        t.parent_id = Some(TaskId::new());
        assert!(matches_filter_on(&t, TaskFilter::AllTasks, today()));
    }

    #[test]
    fn test_pending_and_completed() {
        let mut t = task("a", Priority::Low);
        assert!(matches_filter_on(&t, TaskFilter::Pending, today()));
        assert!(!matches_filter_on(&t, TaskFilter::Completed, today()));
        t.completed = true;
        assert!(!matches_filter_on(&t, TaskFilter::Pending, today()));
        assert!(matches_filter_on(&t, TaskFilter::Completed, today()));
    }

    #[test]
    fn test_high_priority_subset() {
        let tasks = vec![
            task("high", Priority::High),
            task("medium", Priority::Medium),
            task("low", Priority::Low),
            task("also high", Priority::High),
        ];
        let selected: Vec<&str> = tasks
            .iter()
            .filter(|t| matches_filter_on(t, TaskFilter::HighPriority, today()))
            .map(|t| t.title.as_str())
            .collect();
        assert_eq!(selected, vec!["high", "also high"]);
    }

    #[test]
    fn test_due_today_compares_calendar_day() {
        let mut early = task("early", Priority::Low);
        early.due_date = Local.with_ymd_and_hms(2024, 6, 14, 0, 5, 0).unwrap();
        let mut late = task("late", Priority::Low);
        late.due_date = Local.with_ymd_and_hms(2024, 6, 14, 23, 55, 0).unwrap();
        let mut tomorrow = task("tomorrow", Priority::Low);
        tomorrow.due_date = late.due_date + Duration::hours(1);
        let mut yesterday = task("yesterday", Priority::Low);
        yesterday.due_date = early.due_date - Duration::hours(1);

        let tasks = [early, late, tomorrow, yesterday];
        let selected: Vec<&str> = tasks
            .iter()
            .filter(|t| matches_filter_on(t, TaskFilter::DueToday, today()))
            .map(|t| t.title.as_str())
            .collect();
        assert_eq!(selected, vec!["early", "late"]);
    }

    #[test]
    fn test_main_tasks_only() {
        let root = task("root", Priority::Medium);
        let mut sub = task("sub", Priority::Medium);
        sub.parent_id = Some(root.id.clone());
        assert!(matches_filter_on(&root, TaskFilter::MainTasksOnly, today()));
        assert!(!matches_filter_on(&sub, TaskFilter::MainTasksOnly, today()));
    }

    #[test]
    fn test_filter_from_stored_name() {
        let mut t = task("a", Priority::Low);
        t.completed = true;
        assert!(matches_filter_on(&t, TaskFilter::from_name_lenient("Completed"), today()));
        assert!(!matches_filter_on(&t, TaskFilter::from_name_lenient("Pending"), today()));
        assert!(matches_filter_on(&t, TaskFilter::from_name_lenient("Something Else"), today()));
    }

    #[test]
    fn test_due_today_ignores_completion_and_depth() {
        let mut t = task("done sub", Priority::Low);
        t.completed = true;
        t.parent_id = Some(TaskId::new());
        assert!(matches_filter_on(&t, TaskFilter::DueToday, today()));
        assert!(!matches_filter_on(&t, TaskFilter::DueToday, today() + Duration::days(2)));
    }
}
