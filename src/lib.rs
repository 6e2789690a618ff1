pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod report;
pub mod repository;
pub mod scheduler;
pub mod stats;
pub mod storage;
pub mod tracker;
pub mod utils;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, TrackerConfig};
pub use error::{PersistenceError, TrackerError};
pub use models::{LiveElapsed, LogKind, Task, TaskId, TaskStatus, TimeLogEntry};
pub use repository::{NewTask, TaskRepository, TaskUpdate};
pub use scheduler::{Due, Scheduler};
pub use storage::{JsonStorage, MemoryStorage, Persistence};
pub use tracker::{TimeTracker, TrackerEvent};
