use crate::error::PersistenceError;
use crate::models::Task;
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, PersistenceError>;

pub const STORAGE_KEY: &str = "todo_portfolio_tasks_v1";

/// Key-value persistence for the whole task list.
pub trait Persistence {
    /// Returns an empty list when nothing has been stored yet.
    fn load(&self) -> Result<Vec<Task>>;

    fn save(&self, tasks: &[Task]) -> Result<()>;
}

impl<P: Persistence + ?Sized> Persistence for &P {
    fn load(&self) -> Result<Vec<Task>> {
        (**self).load()
    }

    fn save(&self, tasks: &[Task]) -> Result<()> {
        (**self).save(tasks)
    }
}

#[derive(Debug, Clone)]
pub struct JsonStorage {
    path: PathBuf,
}

impl JsonStorage {
    pub fn get_base_dir() -> Result<PathBuf> {
        let mut path = dirs::home_dir()
            .ok_or_else(|| PersistenceError::Other("Could not find home directory".into()))?;
        path.push(".taskclock");
        if !path.exists() {
            fs::create_dir_all(&path)?;
        }
        Ok(path)
    }

    pub fn new() -> Result<Self> {
        let path = Self::get_base_dir()?;
        Ok(Self::from_path(path.join(format!("{STORAGE_KEY}.json"))))
    }

    pub fn from_path(path: PathBuf) -> Self {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    log::warn!("Could not create {}: {}", parent.display(), e);
                }
            }
        }
        Self { path }
    }

    fn set_aside_corrupt(&self) {
        let backup = self.path.with_extension("corrupt");
        match fs::rename(&self.path, &backup) {
            Ok(()) => log::warn!("Moved unreadable task file to {}", backup.display()),
            Err(e) => log::warn!("Could not move unreadable task file aside: {}", e),
        }
    }
}

impl Persistence for JsonStorage {
    fn load(&self) -> Result<Vec<Task>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.path)?;
        match serde_json::from_str(&data) {
            Ok(tasks) => Ok(tasks),
            Err(e) => {
                self.set_aside_corrupt();
                Err(e.into())
            }
        }
    }

    fn save(&self, tasks: &[Task]) -> Result<()> {
        let data = serde_json::to_string_pretty(tasks)?;
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, &data)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// In-process storage. Can be told to fail, to exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tasks: RefCell<Vec<Task>>,
    saves: Cell<usize>,
    fail: Cell<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: RefCell::new(tasks),
            ..Self::default()
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.set(fail);
    }

    pub fn save_count(&self) -> usize {
        self.saves.get()
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.borrow().clone()
    }
}

impl Persistence for MemoryStorage {
    fn load(&self) -> Result<Vec<Task>> {
        if self.fail.get() {
            return Err(PersistenceError::Other("storage unavailable".into()));
        }
        Ok(self.tasks.borrow().clone())
    }

    fn save(&self, tasks: &[Task]) -> Result<()> {
        if self.fail.get() {
            return Err(PersistenceError::Other("storage unavailable".into()));
        }
        *self.tasks.borrow_mut() = tasks.to_vec();
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}
