use crate::models::Task;
use crate::stats::calculate_summary;
use crate::utils::format_minutes;
use chrono::{DateTime, Utc};

pub struct Reporter<'a> {
    tasks: &'a [Task],
}

impl<'a> Reporter<'a> {
    pub fn new(tasks: &'a [Task]) -> Self {
        Self { tasks }
    }

    pub fn render(&self, now: DateTime<Utc>) -> String {
        let mut out = String::new();
        if self.tasks.is_empty() {
            out.push_str("No tasks recorded yet.\n");
            return out;
        }

        let summary = calculate_summary(self.tasks, now);

        out.push_str("Taskclock Report\n");
        out.push_str("================\n");
        out.push_str(&format!(
            "Tasks:          {} open, {} done\n",
            summary.open_count, summary.done_count
        ));
        out.push_str(&format!("Active Timers:  {}\n", summary.running_count));
        out.push_str(&format!("Overdue:        {}\n", summary.overdue_count));
        out.push_str(&format!(
            "Total Time:     {}\n",
            format_minutes(summary.total_minutes)
        ));
        out.push_str(&format!(
            "Logged Today:   {}\n",
            format_minutes(summary.today_minutes)
        ));
        if let Some((title, minutes)) = &summary.top_task {
            out.push_str(&format!(
                "Most Time:      {} ({})\n",
                title,
                format_minutes(*minutes)
            ));
        }

        out.push_str("\nBy Category\n");
        out.push_str("-----------\n");
        for (category, stats) in &summary.by_category {
            out.push_str(&format!(
                "  {:<16} {:>3} tasks  {}\n",
                category,
                stats.tasks,
                format_minutes(stats.minutes)
            ));
        }

        out
    }

    pub fn report(&self, now: DateTime<Utc>) {
        print!("{}", self.render(now));
    }
}
