use crate::models::{Task, TaskStatus};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct CategoryStats {
    pub tasks: u32,
    pub minutes: u32,
}

#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct SummaryStats {
    pub total_minutes: u32,
    pub today_minutes: u32,
    pub open_count: u32,
    pub done_count: u32,
    pub running_count: u32,
    pub overdue_count: u32,
    pub by_category: BTreeMap<String, CategoryStats>,
    /// Task with the most banked minutes, if any has time.
    pub top_task: Option<(String, u32)>,
}

const UNCATEGORIZED: &str = "(none)";

pub fn calculate_summary(tasks: &[Task], now: DateTime<Utc>) -> SummaryStats {
    let today = now.date_naive();
    let mut summary = SummaryStats::default();

    for task in tasks {
        summary.total_minutes += task.time_spent;
        summary.today_minutes += task.minutes_on(today);

        match task.status {
            TaskStatus::Open => summary.open_count += 1,
            TaskStatus::Done => summary.done_count += 1,
        }
        if task.is_running() {
            summary.running_count += 1;
        }
        if task.is_overdue(now) {
            summary.overdue_count += 1;
        }

        let key = if task.category.is_empty() {
            UNCATEGORIZED
        } else {
            task.category.as_str()
        };
        let stats = summary.by_category.entry(key.to_string()).or_default();
        stats.tasks += 1;
        stats.minutes += task.time_spent;

        if task.time_spent > 0
            && summary
                .top_task
                .as_ref()
                .map_or(true, |(_, best)| task.time_spent > *best)
        {
            summary.top_task = Some((task.title.clone(), task.time_spent));
        }
    }

    summary
}
