use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use fd_lock::RwLock;
use std::cell::Cell;
use std::fs::OpenOptions;
use std::io::Write;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use taskclock::config::{self, Config};
use taskclock::report::Reporter;
use taskclock::utils::{format_live, format_minutes, parse_deadline};
use taskclock::{
    Clock, JsonStorage, NewTask, Scheduler, SystemClock, Task, TaskId, TaskStatus, TaskUpdate,
    TimeTracker, TrackerEvent,
};

type Tracker = TimeTracker<JsonStorage, SystemClock>;

#[derive(Parser)]
#[command(name = "taskclock")]
#[command(about = "Track time spent on your to-do tasks", long_about = None)]
struct Cli {
    /// Override whether starting a timer stops the others
    #[arg(long, global = true)]
    exclusive: Option<bool>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new task
    Add {
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(short, long, default_value = "")]
        category: String,
        #[arg(long, default_value = "work")]
        color: String,
        /// Deadline (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        deadline: Option<String>,
    },
    /// List tasks
    List {
        #[arg(short, long, conflicts_with = "overdue")]
        category: Option<String>,
        /// Only open tasks past their deadline
        #[arg(long)]
        overdue: bool,
    },
    /// List categories in use
    Categories,
    /// Show a task with its time log
    Show { id: String },
    /// Edit task fields
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long, conflicts_with = "clear_deadline")]
        deadline: Option<String>,
        #[arg(long)]
        clear_deadline: bool,
    },
    /// Toggle a task between open and done
    Done { id: String },
    /// Delete a task and its time log
    Delete { id: String },
    /// Start the timer of a task
    Start { id: String },
    /// Stop the timer of a task
    Stop { id: String },
    /// Start or stop the timer of a task
    Toggle { id: String },
    /// Clear the tracked time and log of a task
    Reset { id: String },
    /// Show running timers
    Status,
    /// Summarize tracked time
    Report,
    /// Keep running, banking time every minute and showing live timers
    Run,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let mut config = config::load_config()?;
    if let Some(exclusive) = cli.exclusive {
        config.exclusive_tracking = exclusive;
    }
    let storage = JsonStorage::new()?;
    let mut tracker = TimeTracker::open(storage, SystemClock, config.tracker());

    match cli.command {
        Commands::Add {
            title,
            description,
            category,
            color,
            deadline,
        } => {
            let deadline = deadline.as_deref().map(parse_deadline).transpose()?;
            let id = tracker.add_task(NewTask {
                title,
                description,
                category,
                color,
                deadline,
            });
            println!("Added task {}", short_id(&id));
        }
        Commands::List { category, overdue } => {
            let now = Utc::now();
            let tasks: Vec<&Task> = match &category {
                Some(category) => tracker.tasks_in_category(category),
                None if overdue => tracker.overdue(now),
                None => tracker.list_tasks().iter().collect(),
            };
            if tasks.is_empty() {
                println!("No tasks.");
            }
            for task in tasks {
                println!("{}", task_line(&tracker, task, now));
            }
        }
        Commands::Categories => {
            let categories = tracker.categories();
            if categories.is_empty() {
                println!("No categories.");
            }
            for category in categories {
                println!(
                    "{}  ({} tasks)",
                    category,
                    tracker.tasks_in_category(category).len()
                );
            }
        }
        Commands::Show { id } => {
            let id = resolve(&tracker, &id)?;
            show_task(&tracker, &id);
        }
        Commands::Edit {
            id,
            title,
            description,
            category,
            color,
            deadline,
            clear_deadline,
        } => {
            let id = resolve(&tracker, &id)?;
            let deadline = if clear_deadline {
                Some(None)
            } else {
                deadline.as_deref().map(parse_deadline).transpose()?.map(Some)
            };
            let update = TaskUpdate {
                title,
                description,
                category,
                color,
                deadline,
                status: None,
            };
            if update.is_empty() {
                println!("Nothing to change.");
            } else {
                tracker.update_task(&id, update)?;
                println!("Updated task {}", short_id(&id));
            }
        }
        Commands::Done { id } => {
            let id = resolve(&tracker, &id)?;
            let status = tracker.toggle_status(&id)?;
            println!("Task {} is now {}", short_id(&id), status_label(status));
        }
        Commands::Delete { id } => {
            let id = resolve(&tracker, &id)?;
            let task = tracker.delete_task(&id)?;
            println!("Deleted '{}'", task.title);
        }
        Commands::Start { id } => {
            let id = resolve(&tracker, &id)?;
            tracker.start(&id)?;
            println!("Timer started for {}", short_id(&id));
        }
        Commands::Stop { id } => {
            let id = resolve(&tracker, &id)?;
            tracker.stop(&id)?;
            print_time_spent(&tracker, &id);
        }
        Commands::Toggle { id } => {
            let id = resolve(&tracker, &id)?;
            tracker.toggle(&id)?;
            if tracker.get_task(&id).is_some_and(|t| t.is_running()) {
                println!("Timer started for {}", short_id(&id));
            } else {
                print_time_spent(&tracker, &id);
            }
        }
        Commands::Reset { id } => {
            let id = resolve(&tracker, &id)?;
            tracker.reset(&id)?;
            println!("Timer reset for {}", short_id(&id));
        }
        Commands::Status => {
            let now = Utc::now();
            println!("Active Timers: {}", tracker.active_timers());
            for task in tracker.repository().running() {
                println!("{}", task_line(&tracker, task, now));
            }
        }
        Commands::Report => {
            Reporter::new(tracker.list_tasks()).report(Utc::now());
        }
        Commands::Run => {
            let lock_path = JsonStorage::get_base_dir()?.join("taskclock.lock");
            let lock_file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(lock_path)?;

            let mut lock = RwLock::new(lock_file);
            let _guard = lock.try_write().map_err(|_| {
                anyhow!("Another taskclock host is already running. Please close it before starting a new one.")
            })?;

            run_host(&mut tracker, &config)?;
        }
    }

    Ok(())
}

fn run_host(tracker: &mut Tracker, config: &Config) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
        .context("Could not install Ctrl-C handler")?;

    let banked = Rc::new(Cell::new(0usize));
    let sink = banked.clone();
    tracker.subscribe(move |event| {
        if let TrackerEvent::Reconciled(ids) = event {
            sink.set(sink.get() + ids.len());
        }
    });

    let mut scheduler = Scheduler::from_config(config, tracker.clock().now())?;
    println!("Tracking {} timer(s). Press Ctrl-C to stop.", tracker.active_timers());

    while running.load(Ordering::SeqCst) {
        let now = tracker.clock().now();
        let due = scheduler.poll(now);
        if due.reconcile {
            tracker.reconcile_tick(now);
            let credited = banked.replace(0);
            if credited > 0 {
                log::info!("Banked elapsed minutes for {} task(s)", credited);
            }
        }
        if due.display {
            draw_live(tracker, now)?;
        }

        let wait = scheduler.until_next(tracker.clock().now());
        std::thread::sleep(wait.min(StdDuration::from_millis(200)));
    }

    println!();
    let now = tracker.clock().now();
    tracker.reconcile_tick(now);
    if let Err(e) = tracker.save() {
        log::error!("Final save failed: {}", e);
    }
    Ok(())
}

fn draw_live(tracker: &Tracker, now: chrono::DateTime<Utc>) -> Result<()> {
    let parts: Vec<String> = tracker
        .repository()
        .running()
        .filter_map(|task| {
            let live = tracker.live_elapsed(&task.id, now)?;
            Some(format!("{} {}", task.title, format_live(live)))
        })
        .collect();

    let line = if parts.is_empty() {
        "No active timers".to_string()
    } else {
        parts.join(" | ")
    };
    let mut stdout = std::io::stdout();
    write!(stdout, "\r\x1b[2K{}", line)?;
    stdout.flush()?;
    Ok(())
}

fn resolve(tracker: &Tracker, needle: &str) -> Result<TaskId> {
    tracker
        .resolve(needle)
        .ok_or_else(|| anyhow!("No single task matches '{}'", needle))
}

fn short_id(id: &TaskId) -> &str {
    let s = id.as_str();
    s.get(..8).unwrap_or(s)
}

fn status_label(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Open => "open",
        TaskStatus::Done => "done",
    }
}

fn task_line(tracker: &Tracker, task: &Task, now: chrono::DateTime<Utc>) -> String {
    let mut line = format!(
        "{}  [{}] {}  {}",
        short_id(&task.id),
        status_label(task.status),
        task.title,
        format_minutes(task.time_spent)
    );
    if let Some(live) = tracker.live_elapsed(&task.id, now) {
        line.push_str(&format!("  (running {})", format_live(live)));
    }
    if !task.category.is_empty() {
        line.push_str(&format!("  #{}", task.category));
    }
    if task.is_overdue(now) {
        line.push_str("  OVERDUE");
    }
    line
}

fn print_time_spent(tracker: &Tracker, id: &TaskId) {
    if let Some(task) = tracker.get_task(id) {
        println!(
            "Timer stopped for {} ({} total)",
            short_id(id),
            format_minutes(task.time_spent)
        );
    }
}

fn show_task(tracker: &Tracker, id: &TaskId) {
    let Some(task) = tracker.get_task(id) else {
        return;
    };
    let now = Utc::now();
    println!("{}", task.title);
    println!("  id:          {}", task.id);
    println!("  status:      {}", status_label(task.status));
    if !task.description.is_empty() {
        println!("  description: {}", task.description);
    }
    if !task.category.is_empty() {
        println!("  category:    {}", task.category);
    }
    println!("  color:       {}", task.color);
    match task.deadline {
        Some(deadline) => println!("  deadline:    {}", deadline.format("%Y-%m-%d %H:%M")),
        None => println!("  deadline:    none"),
    }
    println!("  time spent:  {}", format_minutes(task.time_spent));
    if let Ok(today) = tracker.time_spent_on(id, now.date_naive()) {
        println!("  today:       {}", format_minutes(today));
    }
    if let Some(live) = tracker.live_elapsed(id, now) {
        println!("  running:     {}", format_live(live));
    }
    if !task.time_logs.is_empty() {
        println!("  log:");
        for entry in &task.time_logs {
            println!(
                "    {}  {:?}  {} min",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.kind,
                entry.minutes
            );
        }
    }
}
