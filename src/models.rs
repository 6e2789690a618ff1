use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque task identifier, stored as a UUID string.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Open,
    Done,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Start,
    Stop,
    Auto,
}

/// One journal record. Never mutated once appended.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TimeLogEntry {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub minutes: u32,
    pub date: NaiveDate,
}

impl TimeLogEntry {
    pub fn new_at(kind: LogKind, minutes: u32, at: DateTime<Utc>) -> Self {
        Self {
            timestamp: at,
            kind,
            minutes,
            date: at.date_naive(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_spent: u32,
    #[serde(default)]
    pub is_tracking: bool,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub tracking_start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub time_logs: Vec<TimeLogEntry>,
    #[serde(default, with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new_at(id: TaskId, title: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            description: String::new(),
            category: String::new(),
            color: String::new(),
            status: TaskStatus::Open,
            deadline: None,
            time_spent: 0,
            is_tracking: false,
            tracking_start_time: None,
            time_logs: Vec::new(),
            created_at: at,
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_tracking && self.tracking_start_time.is_some()
    }

    /// Whole minutes between the session start and `now`. Zero when idle or
    /// when `now` precedes the start.
    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> u32 {
        match self.tracking_start_time {
            Some(start) if self.is_tracking => {
                let mins = (now - start).num_minutes();
                u32::try_from(mins.max(0)).unwrap_or(u32::MAX)
            }
            _ => 0,
        }
    }

    pub(crate) fn open_session(&mut self, now: DateTime<Utc>) {
        self.is_tracking = true;
        self.tracking_start_time = Some(now);
        self.time_logs
            .push(TimeLogEntry::new_at(LogKind::Start, 0, now));
    }

    pub(crate) fn close_session(&mut self) {
        self.is_tracking = false;
        self.tracking_start_time = None;
    }

    /// Moves the session start forward by whole minutes so the sub-minute
    /// remainder keeps counting toward the next minute.
    pub(crate) fn bank_minutes(&mut self, minutes: u32) {
        self.time_spent = self.time_spent.saturating_add(minutes);
        if let Some(start) = self.tracking_start_time.as_mut() {
            *start += Duration::minutes(i64::from(minutes));
        }
    }

    /// Repairs records where `is_tracking` and `tracking_start_time` disagree.
    /// Returns true if anything changed.
    pub(crate) fn normalize(&mut self) -> bool {
        match (self.is_tracking, self.tracking_start_time) {
            (true, None) => {
                self.is_tracking = false;
                true
            }
            (false, Some(_)) => {
                self.tracking_start_time = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Open && self.deadline.is_some_and(|d| d < now)
    }

    /// Journaled minutes recorded on `date`.
    pub fn minutes_on(&self, date: NaiveDate) -> u32 {
        self.time_logs
            .iter()
            .filter(|log| log.date == date)
            .map(|log| log.minutes)
            .sum()
    }
}

/// Elapsed time of the open session, for live display.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveElapsed {
    pub minutes: u64,
    pub seconds: u8,
}

impl LiveElapsed {
    pub fn from_seconds(total: i64) -> Self {
        let total = total.max(0) as u64;
        Self {
            minutes: total / 60,
            seconds: (total % 60) as u8,
        }
    }
}
