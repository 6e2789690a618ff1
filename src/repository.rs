use crate::models::{Task, TaskId, TaskStatus};
use chrono::{DateTime, Utc};

/// Fields supplied when creating a task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub category: String,
    pub color: String,
    pub deadline: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// A partial edit. `None` leaves the field as is; `deadline: Some(None)`
/// clears the deadline.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub color: Option<String>,
    pub deadline: Option<Option<DateTime<Utc>>>,
    pub status: Option<TaskStatus>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.color.is_none()
            && self.deadline.is_none()
            && self.status.is_none()
    }

    pub(crate) fn apply_to(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(category) = self.category {
            task.category = category;
        }
        if let Some(color) = self.color {
            task.color = color;
        }
        if let Some(deadline) = self.deadline {
            task.deadline = deadline;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
    }
}

/// The application-wide task list, in insertion order.
#[derive(Debug, Default, Clone)]
pub struct TaskRepository {
    tasks: Vec<Task>,
}

impl TaskRepository {
    /// Builds a repository from stored records, repairing any whose tracking
    /// fields disagree.
    pub fn from_tasks(mut tasks: Vec<Task>) -> Self {
        for task in &mut tasks {
            if task.normalize() {
                log::warn!(
                    "Task {} had inconsistent tracking state; marked idle",
                    task.id
                );
            }
        }
        Self { tasks }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| &t.id == id)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Task> {
        self.tasks.iter_mut()
    }

    pub(crate) fn insert(&mut self, task: Task) {
        self.tasks.push(task);
    }

    pub(crate) fn remove(&mut self, id: &TaskId) -> Option<Task> {
        let idx = self.tasks.iter().position(|t| &t.id == id)?;
        Some(self.tasks.remove(idx))
    }

    pub fn running(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.is_running())
    }

    pub fn running_ids(&self) -> Vec<TaskId> {
        self.running().map(|t| t.id.clone()).collect()
    }

    pub fn in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks.iter().filter(move |t| t.category == category)
    }

    /// Non-empty categories in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for task in &self.tasks {
            if !task.category.is_empty() && !seen.contains(&task.category.as_str()) {
                seen.push(&task.category);
            }
        }
        seen
    }

    pub fn overdue(&self, now: DateTime<Utc>) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.is_overdue(now))
    }

    /// Finds a task by exact id or by an unambiguous id prefix.
    pub fn resolve(&self, needle: &str) -> Option<TaskId> {
        if let Some(task) = self.tasks.iter().find(|t| t.id.as_str() == needle) {
            return Some(task.id.clone());
        }
        if needle.is_empty() {
            return None;
        }
        let mut matches = self
            .tasks
            .iter()
            .filter(|t| t.id.as_str().starts_with(needle));
        match (matches.next(), matches.next()) {
            (Some(task), None) => Some(task.id.clone()),
            _ => None,
        }
    }
}
