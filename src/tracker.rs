use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::error::{PersistenceError, TrackerError};
use crate::models::{LiveElapsed, LogKind, Task, TaskId, TaskStatus, TimeLogEntry};
use crate::repository::{NewTask, TaskRepository, TaskUpdate};
use crate::storage::Persistence;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;

pub type Result<T> = std::result::Result<T, TrackerError>;

/// Fired after every state-changing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    TaskAdded(TaskId),
    TaskUpdated(TaskId),
    TaskDeleted(TaskId),
    Started(TaskId),
    /// `minutes` is what the stop itself credited to `timeSpent`.
    Stopped { id: TaskId, minutes: u32 },
    Reset(TaskId),
    Reconciled(Vec<TaskId>),
}

type Listener = Box<dyn FnMut(&TrackerEvent)>;

pub struct TimeTracker<P: Persistence, C: Clock> {
    repo: TaskRepository,
    storage: P,
    clock: C,
    config: TrackerConfig,
    /// Minutes banked by reconciliation since the last `start` or `auto`
    /// entry, per running task. Drives auto-logging only.
    unlogged: HashMap<TaskId, u32>,
    listeners: Vec<Listener>,
}

impl<P: Persistence, C: Clock> TimeTracker<P, C> {
    /// Loads the task list from `storage`. A failed load is logged and the
    /// tracker starts empty.
    pub fn open(storage: P, clock: C, config: TrackerConfig) -> Self {
        let tasks = match storage.load() {
            Ok(tasks) => tasks,
            Err(e) => {
                log::error!("Failed to load tasks, starting empty: {}", e);
                Vec::new()
            }
        };
        log::debug!("Loaded {} tasks", tasks.len());
        Self {
            repo: TaskRepository::from_tasks(tasks),
            storage,
            clock,
            config,
            unlogged: HashMap::new(),
            listeners: Vec::new(),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn repository(&self) -> &TaskRepository {
        &self.repo
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&TrackerEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    // --- tracking ---

    /// Opens a session. A task that is already running is left untouched.
    pub fn start(&mut self, id: &TaskId) -> Result<()> {
        let task = self.require(id)?;
        if task.is_running() {
            log::debug!("Task {} is already running", id);
            return Ok(());
        }

        let now = self.clock.now();
        let mut events = Vec::new();
        if self.config.exclusive_tracking {
            for other in self.repo.running_ids() {
                if let Some(minutes) = self.close_session(&other, now) {
                    events.push(TrackerEvent::Stopped { id: other, minutes });
                }
            }
        }

        if let Some(task) = self.repo.get_mut(id) {
            task.open_session(now);
        }
        self.unlogged.insert(id.clone(), 0);
        log::info!("Started timer for task {}", id);

        events.push(TrackerEvent::Started(id.clone()));
        self.commit(events);
        Ok(())
    }

    /// Closes the session, crediting whole elapsed minutes. Stopping an idle
    /// task is a no-op.
    pub fn stop(&mut self, id: &TaskId) -> Result<()> {
        self.require(id)?;
        let now = self.clock.now();
        if let Some(minutes) = self.close_session(id, now) {
            self.commit(vec![TrackerEvent::Stopped {
                id: id.clone(),
                minutes,
            }]);
        }
        Ok(())
    }

    pub fn toggle(&mut self, id: &TaskId) -> Result<()> {
        if self.require(id)?.is_running() {
            self.stop(id)
        } else {
            self.start(id)
        }
    }

    /// Stops the task if needed, then zeroes `timeSpent` and clears the
    /// journal.
    pub fn reset(&mut self, id: &TaskId) -> Result<()> {
        self.require(id)?;
        let now = self.clock.now();
        let mut events = Vec::new();
        if let Some(minutes) = self.close_session(id, now) {
            events.push(TrackerEvent::Stopped {
                id: id.clone(),
                minutes,
            });
        }

        if let Some(task) = self.repo.get_mut(id) {
            task.time_spent = 0;
            task.time_logs.clear();
        }
        self.unlogged.remove(id);
        log::info!("Reset timer for task {}", id);

        events.push(TrackerEvent::Reset(id.clone()));
        self.commit(events);
        Ok(())
    }

    /// Banks whole elapsed minutes of every running task and moves each
    /// session start forward by the same amount. Returns the ids that were
    /// credited; a second call within the same minute credits nothing.
    pub fn reconcile_tick(&mut self, now: DateTime<Utc>) -> Vec<TaskId> {
        let threshold = self.config.auto_log_threshold_mins;
        let mut credited = Vec::new();

        for task in self.repo.iter_mut().filter(|t| t.is_running()) {
            let minutes = task.elapsed_minutes(now);
            if minutes == 0 {
                continue;
            }
            task.bank_minutes(minutes);

            let pending = self.unlogged.entry(task.id.clone()).or_insert(0);
            *pending += minutes;
            if threshold > 0 && *pending >= threshold {
                task.time_logs
                    .push(TimeLogEntry::new_at(LogKind::Auto, *pending, now));
                log::info!("Auto-logged {} minutes for task {}", *pending, task.id);
                *pending = 0;
            }
            credited.push(task.id.clone());
        }

        if !credited.is_empty() {
            log::debug!("Reconciled {} running tasks", credited.len());
            self.commit(vec![TrackerEvent::Reconciled(credited.clone())]);
        }
        credited
    }

    /// Elapsed time of the open session. `None` for unknown or idle tasks.
    pub fn live_elapsed(&self, id: &TaskId, now: DateTime<Utc>) -> Option<LiveElapsed> {
        let task = self.repo.get(id)?;
        if !task.is_running() {
            return None;
        }
        let started = session_started_at(task)?;
        Some(LiveElapsed::from_seconds((now - started).num_seconds()))
    }

    pub fn active_timers(&self) -> usize {
        self.repo.running().count()
    }

    // --- task management ---

    pub fn add_task(&mut self, new: NewTask) -> TaskId {
        let now = self.clock.now();
        let id = TaskId::generate();
        let mut task = Task::new_at(id.clone(), new.title.trim(), now);
        task.description = new.description;
        task.category = new.category;
        task.color = new.color;
        task.deadline = new.deadline;
        self.repo.insert(task);
        log::info!("Added task {}", id);

        self.commit(vec![TrackerEvent::TaskAdded(id.clone())]);
        id
    }

    /// Applies a partial edit. Marking a running task done stops its timer
    /// first.
    pub fn update_task(&mut self, id: &TaskId, update: TaskUpdate) -> Result<()> {
        self.require(id)?;
        let now = self.clock.now();
        let mut events = Vec::new();
        if update.status == Some(TaskStatus::Done) {
            if let Some(minutes) = self.close_session(id, now) {
                events.push(TrackerEvent::Stopped {
                    id: id.clone(),
                    minutes,
                });
            }
        }

        if let Some(task) = self.repo.get_mut(id) {
            update.apply_to(task);
        }

        events.push(TrackerEvent::TaskUpdated(id.clone()));
        self.commit(events);
        Ok(())
    }

    pub fn toggle_status(&mut self, id: &TaskId) -> Result<TaskStatus> {
        let status = match self.require(id)?.status {
            TaskStatus::Open => TaskStatus::Done,
            TaskStatus::Done => TaskStatus::Open,
        };
        self.update_task(
            id,
            TaskUpdate {
                status: Some(status),
                ..TaskUpdate::default()
            },
        )?;
        Ok(status)
    }

    /// Removes the task and its journal, stopping it first if running.
    pub fn delete_task(&mut self, id: &TaskId) -> Result<Task> {
        self.require(id)?;
        let now = self.clock.now();
        let mut events = Vec::new();
        if let Some(minutes) = self.close_session(id, now) {
            events.push(TrackerEvent::Stopped {
                id: id.clone(),
                minutes,
            });
        }

        let removed = self
            .repo
            .remove(id)
            .ok_or_else(|| TrackerError::NotFound(id.clone()))?;
        self.unlogged.remove(id);
        log::info!("Deleted task {}", id);

        events.push(TrackerEvent::TaskDeleted(id.clone()));
        self.commit(events);
        Ok(removed)
    }

    // --- queries ---

    pub fn get_task(&self, id: &TaskId) -> Option<&Task> {
        self.repo.get(id)
    }

    pub fn list_tasks(&self) -> &[Task] {
        self.repo.tasks()
    }

    pub fn tasks_in_category<'a>(&'a self, category: &'a str) -> Vec<&'a Task> {
        self.repo.in_category(category).collect()
    }

    pub fn categories(&self) -> Vec<&str> {
        self.repo.categories()
    }

    pub fn overdue(&self, now: DateTime<Utc>) -> Vec<&Task> {
        self.repo.overdue(now).collect()
    }

    pub fn resolve(&self, needle: &str) -> Option<TaskId> {
        self.repo.resolve(needle)
    }

    /// Journaled minutes for the task on `date`.
    pub fn time_spent_on(&self, id: &TaskId, date: NaiveDate) -> Result<u32> {
        Ok(self.require(id)?.minutes_on(date))
    }

    // --- persistence ---

    /// Writes the task list, returning the failure so the caller can retry.
    pub fn save(&self) -> std::result::Result<(), PersistenceError> {
        self.storage.save(self.repo.tasks())
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            log::error!("Failed to save tasks: {}", e);
        }
    }

    fn commit(&mut self, events: Vec<TrackerEvent>) {
        self.persist();
        for event in &events {
            for listener in self.listeners.iter_mut() {
                listener(event);
            }
        }
    }

    fn require(&self, id: &TaskId) -> Result<&Task> {
        self.repo
            .get(id)
            .ok_or_else(|| TrackerError::NotFound(id.clone()))
    }

    /// Ends the session of a running task without persisting. Returns the
    /// minutes credited by the stop, or `None` if the task was not running.
    fn close_session(&mut self, id: &TaskId, now: DateTime<Utc>) -> Option<u32> {
        let task = self.repo.get_mut(id)?;
        if !task.is_running() {
            return None;
        }

        let elapsed = task.elapsed_minutes(now);
        if elapsed > 0 {
            task.time_spent = task.time_spent.saturating_add(elapsed);
            task.time_logs
                .push(TimeLogEntry::new_at(LogKind::Stop, elapsed, now));
        }
        self.unlogged.remove(id);
        task.close_session();
        log::info!("Stopped timer for task {} (+{} min)", id, elapsed);
        Some(elapsed)
    }
}

/// Start of the open session: the latest `start` entry, or the tracking
/// start time when the journal has none.
fn session_started_at(task: &Task) -> Option<DateTime<Utc>> {
    let tracking = task.tracking_start_time?;
    let logged = task
        .time_logs
        .iter()
        .rev()
        .find(|log| log.kind == LogKind::Start)
        .map(|log| log.timestamp);
    Some(logged.map_or(tracking, |at| at.min(tracking)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStorage;
    use chrono::{Duration, TimeZone};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 2, 9, 0, 0).unwrap()
    }

    fn config(exclusive: bool) -> TrackerConfig {
        TrackerConfig {
            exclusive_tracking: exclusive,
            auto_log_threshold_mins: 15,
        }
    }

    fn setup(
        storage: &MemoryStorage,
        exclusive: bool,
    ) -> (TimeTracker<&MemoryStorage, ManualClock>, ManualClock) {
        let clock = ManualClock::new(t0());
        let tracker = TimeTracker::open(storage, clock.clone(), config(exclusive));
        (tracker, clock)
    }

    fn assert_tracking_invariant<P: Persistence, C: Clock>(tracker: &TimeTracker<P, C>) {
        for task in tracker.list_tasks() {
            assert_eq!(
                task.is_tracking,
                task.tracking_start_time.is_some(),
                "task {}",
                task.id
            );
        }
    }

    fn kinds(task: &Task) -> Vec<LogKind> {
        task.time_logs.iter().map(|l| l.kind).collect()
    }

    #[test]
    fn test_new_task_is_idle_and_zeroed() {
        let storage = MemoryStorage::new();
        let (mut tracker, _) = setup(&storage, true);
        let id = tracker.add_task(NewTask::titled("  Write docs "));

        let task = tracker.get_task(&id).unwrap();
        assert_eq!(task.title, "Write docs");
        assert_eq!(task.time_spent, 0);
        assert!(!task.is_tracking);
        assert!(task.tracking_start_time.is_none());
        assert!(task.time_logs.is_empty());
        assert_eq!(storage.snapshot().len(), 1);
    }

    #[test]
    fn test_start_stop_credits_whole_minutes() {
        let storage = MemoryStorage::new();
        let (mut tracker, clock) = setup(&storage, true);
        let id = tracker.add_task(NewTask::titled("a"));

        tracker.start(&id).unwrap();
        assert_tracking_invariant(&tracker);
        assert_eq!(tracker.get_task(&id).unwrap().tracking_start_time, Some(t0()));

        clock.advance(Duration::minutes(7) + Duration::seconds(42));
        tracker.stop(&id).unwrap();
        assert_tracking_invariant(&tracker);

        let task = tracker.get_task(&id).unwrap();
        assert_eq!(task.time_spent, 7);
        assert_eq!(kinds(task), vec![LogKind::Start, LogKind::Stop]);
        assert_eq!(task.time_logs[0].minutes, 0);
        assert_eq!(task.time_logs[1].minutes, 7);
        assert!(!task.is_tracking);
    }

    #[test]
    fn test_sub_minute_session_closes_without_credit() {
        let storage = MemoryStorage::new();
        let (mut tracker, clock) = setup(&storage, true);
        let id = tracker.add_task(NewTask::titled("a"));

        tracker.start(&id).unwrap();
        clock.advance(Duration::seconds(45));
        tracker.stop(&id).unwrap();

        let task = tracker.get_task(&id).unwrap();
        assert_eq!(task.time_spent, 0);
        assert!(!task.is_tracking);
        assert_eq!(kinds(task), vec![LogKind::Start]);
    }

    #[test]
    fn test_stop_on_idle_is_noop() {
        let storage = MemoryStorage::new();
        let (mut tracker, _) = setup(&storage, true);
        let id = tracker.add_task(NewTask::titled("a"));
        let saves = storage.save_count();

        tracker.stop(&id).unwrap();
        assert_eq!(storage.save_count(), saves);
        assert!(tracker.get_task(&id).unwrap().time_logs.is_empty());
    }

    #[test]
    fn test_start_on_running_is_noop() {
        let storage = MemoryStorage::new();
        let (mut tracker, clock) = setup(&storage, true);
        let id = tracker.add_task(NewTask::titled("a"));

        tracker.start(&id).unwrap();
        clock.advance(Duration::minutes(3));
        tracker.start(&id).unwrap();

        let task = tracker.get_task(&id).unwrap();
        assert_eq!(task.tracking_start_time, Some(t0()));
        assert_eq!(task.time_logs.len(), 1);
        assert_eq!(task.time_spent, 0);
    }

    #[test]
    fn test_toggle_switches_state() {
        let storage = MemoryStorage::new();
        let (mut tracker, clock) = setup(&storage, true);
        let id = tracker.add_task(NewTask::titled("a"));

        tracker.toggle(&id).unwrap();
        assert!(tracker.get_task(&id).unwrap().is_tracking);

        clock.advance(Duration::minutes(2));
        tracker.toggle(&id).unwrap();
        let task = tracker.get_task(&id).unwrap();
        assert!(!task.is_tracking);
        assert_eq!(task.time_spent, 2);
    }

    #[test]
    fn test_reset_clears_regardless_of_state() {
        let storage = MemoryStorage::new();
        let (mut tracker, clock) = setup(&storage, true);
        let id = tracker.add_task(NewTask::titled("a"));

        tracker.start(&id).unwrap();
        clock.advance(Duration::minutes(20));
        tracker.reconcile_tick(clock.now());
        clock.advance(Duration::minutes(4));
        tracker.reset(&id).unwrap();

        let task = tracker.get_task(&id).unwrap();
        assert_eq!(task.time_spent, 0);
        assert!(task.time_logs.is_empty());
        assert!(!task.is_tracking);
        assert_tracking_invariant(&tracker);

        // idle reset
        tracker.reset(&id).unwrap();
        let task = tracker.get_task(&id).unwrap();
        assert_eq!(task.time_spent, 0);
        assert!(task.time_logs.is_empty());
    }

    #[test]
    fn test_reconcile_advances_start_by_whole_minutes() {
        let storage = MemoryStorage::new();
        let (mut tracker, clock) = setup(&storage, true);
        let id = tracker.add_task(NewTask::titled("a"));

        tracker.start(&id).unwrap();
        clock.set(t0() + Duration::seconds(90));
        let credited = tracker.reconcile_tick(clock.now());
        assert_eq!(credited, vec![id.clone()]);

        let task = tracker.get_task(&id).unwrap();
        assert_eq!(task.time_spent, 1);
        assert_eq!(task.tracking_start_time, Some(t0() + Duration::seconds(60)));

        clock.set(t0() + Duration::seconds(140));
        tracker.stop(&id).unwrap();

        let task = tracker.get_task(&id).unwrap();
        assert_eq!(task.time_spent, 2);
        assert_eq!(kinds(task), vec![LogKind::Start, LogKind::Stop]);
        assert_eq!(task.time_logs[1].minutes, 1);
        assert_tracking_invariant(&tracker);
    }

    #[test]
    fn test_stop_after_reconcile_with_no_new_minute_writes_no_stop_entry() {
        let storage = MemoryStorage::new();
        let (mut tracker, clock) = setup(&storage, true);
        let id = tracker.add_task(NewTask::titled("a"));

        tracker.start(&id).unwrap();
        clock.set(t0() + Duration::seconds(60));
        tracker.reconcile_tick(clock.now());
        clock.set(t0() + Duration::seconds(80));
        tracker.stop(&id).unwrap();

        let task = tracker.get_task(&id).unwrap();
        assert_eq!(task.time_spent, 1);
        assert!(!task.is_tracking);
        assert_eq!(kinds(task), vec![LogKind::Start]);
        assert_tracking_invariant(&tracker);
    }

    #[test]
    fn test_reconcile_twice_in_same_minute_does_not_double_count() {
        let storage = MemoryStorage::new();
        let (mut tracker, clock) = setup(&storage, true);
        let id = tracker.add_task(NewTask::titled("a"));

        tracker.start(&id).unwrap();
        clock.advance(Duration::seconds(150));
        tracker.reconcile_tick(clock.now());
        clock.advance(Duration::seconds(20));
        let credited = tracker.reconcile_tick(clock.now());

        assert!(credited.is_empty());
        assert_eq!(tracker.get_task(&id).unwrap().time_spent, 2);
    }

    #[test]
    fn test_reconcile_keeps_sub_minute_remainder() {
        let storage = MemoryStorage::new();
        let (mut tracker, clock) = setup(&storage, true);
        let id = tracker.add_task(NewTask::titled("a"));

        tracker.start(&id).unwrap();
        // 40s, 80s, 120s: the remainders add up to the second minute
        for _ in 0..3 {
            clock.advance(Duration::seconds(40));
            tracker.reconcile_tick(clock.now());
        }
        assert_eq!(tracker.get_task(&id).unwrap().time_spent, 2);
    }

    #[test]
    fn test_auto_log_after_threshold() {
        let storage = MemoryStorage::new();
        let (mut tracker, clock) = setup(&storage, true);
        let id = tracker.add_task(NewTask::titled("a"));

        tracker.start(&id).unwrap();
        for _ in 0..16 {
            clock.advance(Duration::minutes(1));
            tracker.reconcile_tick(clock.now());
        }
        let task = tracker.get_task(&id).unwrap();
        assert_eq!(task.time_spent, 16);
        assert_eq!(kinds(task), vec![LogKind::Start, LogKind::Auto]);
        assert_eq!(task.time_logs[1].minutes, 15);

        clock.advance(Duration::seconds(30));
        tracker.stop(&id).unwrap();
        let task = tracker.get_task(&id).unwrap();
        assert_eq!(task.time_spent, 16);
        assert_eq!(kinds(task), vec![LogKind::Start, LogKind::Auto]);

        tracker.start(&id).unwrap();
        clock.advance(Duration::minutes(3));
        tracker.stop(&id).unwrap();
        let task = tracker.get_task(&id).unwrap();
        assert_eq!(task.time_spent, 19);
        assert_eq!(
            task.time_logs.last().map(|l| (l.kind, l.minutes)),
            Some((LogKind::Stop, 3))
        );
    }

    #[test]
    fn test_auto_log_disabled_with_zero_threshold() {
        let storage = MemoryStorage::new();
        let clock = ManualClock::new(t0());
        let mut tracker = TimeTracker::open(
            &storage,
            clock.clone(),
            TrackerConfig {
                exclusive_tracking: true,
                auto_log_threshold_mins: 0,
            },
        );
        let id = tracker.add_task(NewTask::titled("a"));

        tracker.start(&id).unwrap();
        clock.advance(Duration::minutes(45));
        tracker.reconcile_tick(clock.now());

        let task = tracker.get_task(&id).unwrap();
        assert_eq!(task.time_spent, 45);
        assert_eq!(kinds(task), vec![LogKind::Start]);
    }

    #[test]
    fn test_exclusive_tracking_stops_other_task() {
        let storage = MemoryStorage::new();
        let (mut tracker, clock) = setup(&storage, true);
        let a = tracker.add_task(NewTask::titled("a"));
        let b = tracker.add_task(NewTask::titled("b"));

        tracker.start(&a).unwrap();
        clock.advance(Duration::minutes(5) + Duration::seconds(10));
        tracker.start(&b).unwrap();

        assert_eq!(tracker.active_timers(), 1);
        let task_a = tracker.get_task(&a).unwrap();
        assert!(!task_a.is_tracking);
        assert_eq!(task_a.time_spent, 5);
        assert_eq!(kinds(task_a), vec![LogKind::Start, LogKind::Stop]);
        assert!(tracker.get_task(&b).unwrap().is_tracking);
        assert_tracking_invariant(&tracker);
    }

    #[test]
    fn test_concurrent_tracking_accrues_independently() {
        let storage = MemoryStorage::new();
        let (mut tracker, clock) = setup(&storage, false);
        let a = tracker.add_task(NewTask::titled("a"));
        let b = tracker.add_task(NewTask::titled("b"));
        let c = tracker.add_task(NewTask::titled("c"));

        tracker.start(&a).unwrap();
        clock.advance(Duration::minutes(2));
        tracker.start(&b).unwrap();
        clock.advance(Duration::minutes(3));
        tracker.start(&c).unwrap();
        assert_eq!(tracker.active_timers(), 3);

        clock.advance(Duration::minutes(1));
        tracker.reconcile_tick(clock.now());

        assert_eq!(tracker.get_task(&a).unwrap().time_spent, 6);
        assert_eq!(tracker.get_task(&b).unwrap().time_spent, 4);
        assert_eq!(tracker.get_task(&c).unwrap().time_spent, 1);
        assert_tracking_invariant(&tracker);
    }

    #[test]
    fn test_unknown_id_is_not_found_and_changes_nothing() {
        let storage = MemoryStorage::new();
        let (mut tracker, _) = setup(&storage, true);
        let id = tracker.add_task(NewTask::titled("a"));
        tracker.start(&id).unwrap();
        let before = tracker.list_tasks().to_vec();
        let saves = storage.save_count();

        let ghost = TaskId::from("ghost");
        assert!(matches!(tracker.start(&ghost), Err(TrackerError::NotFound(_))));
        assert!(matches!(tracker.stop(&ghost), Err(TrackerError::NotFound(_))));
        assert!(matches!(tracker.reset(&ghost), Err(TrackerError::NotFound(_))));
        assert!(matches!(tracker.toggle(&ghost), Err(TrackerError::NotFound(_))));
        assert!(matches!(tracker.delete_task(&ghost), Err(TrackerError::NotFound(_))));
        assert!(tracker.live_elapsed(&ghost, t0()).is_none());

        assert_eq!(tracker.list_tasks(), before.as_slice());
        assert_eq!(storage.save_count(), saves);
    }

    #[test]
    fn test_live_elapsed_is_pure() {
        let storage = MemoryStorage::new();
        let (mut tracker, clock) = setup(&storage, true);
        let id = tracker.add_task(NewTask::titled("a"));
        assert!(tracker.live_elapsed(&id, t0()).is_none());

        tracker.start(&id).unwrap();
        clock.advance(Duration::seconds(90));
        tracker.reconcile_tick(clock.now());
        let before = tracker.get_task(&id).cloned();

        let live = tracker
            .live_elapsed(&id, t0() + Duration::seconds(125))
            .unwrap();
        assert_eq!(live, LiveElapsed { minutes: 2, seconds: 5 });
        assert_eq!(tracker.get_task(&id).cloned(), before);
    }

    #[test]
    fn test_done_status_stops_timer() {
        let storage = MemoryStorage::new();
        let (mut tracker, clock) = setup(&storage, true);
        let id = tracker.add_task(NewTask::titled("a"));

        tracker.start(&id).unwrap();
        clock.advance(Duration::minutes(3));
        assert_eq!(tracker.toggle_status(&id).unwrap(), TaskStatus::Done);

        let task = tracker.get_task(&id).unwrap();
        assert_eq!(task.status, TaskStatus::Done);
        assert!(!task.is_tracking);
        assert_eq!(task.time_spent, 3);

        assert_eq!(tracker.toggle_status(&id).unwrap(), TaskStatus::Open);
    }

    #[test]
    fn test_delete_running_task() {
        let storage = MemoryStorage::new();
        let (mut tracker, clock) = setup(&storage, true);
        let id = tracker.add_task(NewTask::titled("a"));

        tracker.start(&id).unwrap();
        clock.advance(Duration::minutes(2));
        let removed = tracker.delete_task(&id).unwrap();

        assert_eq!(removed.time_spent, 2);
        assert!(!removed.is_tracking);
        assert!(tracker.get_task(&id).is_none());
        assert_eq!(tracker.active_timers(), 0);
        assert!(storage.snapshot().is_empty());
    }

    #[test]
    fn test_category_and_overdue_queries() {
        let storage = MemoryStorage::new();
        let (mut tracker, _) = setup(&storage, true);
        let a = tracker.add_task(NewTask {
            category: "work".into(),
            deadline: Some(t0() - Duration::days(1)),
            ..NewTask::titled("a")
        });
        tracker.add_task(NewTask {
            category: "personal".into(),
            ..NewTask::titled("b")
        });
        tracker.add_task(NewTask {
            category: "work".into(),
            ..NewTask::titled("c")
        });

        let found = {
            let wanted = String::from("work");
            tracker
                .tasks_in_category(&wanted)
                .iter()
                .map(|t| t.title.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(found, vec!["a", "c"]);
        assert_eq!(tracker.categories(), vec!["work", "personal"]);
        let overdue: Vec<_> = tracker.overdue(t0()).iter().map(|t| t.id.clone()).collect();
        assert_eq!(overdue, vec![a]);
    }

    #[test]
    fn test_time_spent_on_sums_journal_for_date() {
        let storage = MemoryStorage::new();
        let (mut tracker, clock) = setup(&storage, true);
        let id = tracker.add_task(NewTask::titled("a"));

        tracker.start(&id).unwrap();
        clock.advance(Duration::minutes(10));
        tracker.stop(&id).unwrap();
        clock.advance(Duration::days(1));
        tracker.start(&id).unwrap();
        clock.advance(Duration::minutes(4));
        tracker.stop(&id).unwrap();

        assert_eq!(tracker.time_spent_on(&id, t0().date_naive()).unwrap(), 10);
        assert_eq!(tracker.time_spent_on(&id, clock.now().date_naive()).unwrap(), 4);
        assert!(tracker.time_spent_on(&TaskId::from("nope"), t0().date_naive()).is_err());
    }

    #[test]
    fn test_listeners_receive_events_in_order() {
        let storage = MemoryStorage::new();
        let (mut tracker, clock) = setup(&storage, true);
        let a = tracker.add_task(NewTask::titled("a"));
        let b = tracker.add_task(NewTask::titled("b"));

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        tracker.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        tracker.start(&a).unwrap();
        clock.advance(Duration::minutes(1));
        tracker.start(&b).unwrap();

        assert_eq!(
            seen.borrow().as_slice(),
            &[
                TrackerEvent::Started(a.clone()),
                TrackerEvent::Stopped { id: a, minutes: 1 },
                TrackerEvent::Started(b),
            ]
        );
    }

    #[test]
    fn test_save_failure_keeps_memory_state() {
        let storage = MemoryStorage::new();
        let (mut tracker, clock) = setup(&storage, true);
        let id = tracker.add_task(NewTask::titled("a"));

        storage.set_failing(true);
        tracker.start(&id).unwrap();
        clock.advance(Duration::minutes(2));
        tracker.stop(&id).unwrap();

        assert_eq!(tracker.get_task(&id).unwrap().time_spent, 2);
        assert!(tracker.save().is_err());
        assert_eq!(storage.snapshot()[0].time_spent, 0);

        storage.set_failing(false);
        tracker.save().unwrap();
        assert_eq!(storage.snapshot()[0].time_spent, 2);
    }

    #[test]
    fn test_open_restores_running_task() {
        let mut task = Task::new_at(TaskId::from("r"), "resume", t0());
        task.open_session(t0());
        let storage = MemoryStorage::with_tasks(vec![task]);
        let clock = ManualClock::new(t0() + Duration::minutes(3));
        let mut tracker = TimeTracker::open(&storage, clock.clone(), config(true));

        assert_eq!(tracker.active_timers(), 1);
        tracker.stop(&TaskId::from("r")).unwrap();
        assert_eq!(tracker.get_task(&TaskId::from("r")).unwrap().time_spent, 3);
    }

    #[test]
    fn test_open_survives_load_failure() {
        let storage = MemoryStorage::new();
        storage.set_failing(true);
        let tracker = TimeTracker::open(&storage, ManualClock::new(t0()), config(true));
        assert!(tracker.list_tasks().is_empty());
    }
}
