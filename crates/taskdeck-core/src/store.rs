use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::command::TASK_VERB;
use crate::gateway::{BackendGateway, GatewayFault};

const TASKS_FILE: &str = "tasks.data";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d:%H:%M:%S";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledTask {
    /// `YYYY-MM-DD:HH:MM`
    pub datetime: String,
    pub name: String,
    #[serde(default)]
    pub notified: bool,
}

#[derive(Debug)]
pub struct TaskStore {
    pub data_dir: PathBuf,
    pub tasks_path: PathBuf,
}

impl TaskStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let tasks_path = data_dir.join(TASKS_FILE);
        if !tasks_path.exists() {
            fs::write(&tasks_path, "")
                .with_context(|| format!("failed to create {}", tasks_path.display()))?;
        }

        info!(
            data_dir = %data_dir.display(),
            tasks = %tasks_path.display(),
            "opened task store"
        );

        Ok(Self {
            data_dir,
            tasks_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> anyhow::Result<Vec<ScheduledTask>> {
        load_jsonl(&self.tasks_path).with_context(|| format!("failed to load {TASKS_FILE}"))
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn save(&self, tasks: &[ScheduledTask]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.tasks_path, tasks)
            .with_context(|| format!("failed to save {TASKS_FILE}"))
    }

    #[tracing::instrument(skip(self, task), fields(datetime = %task.datetime))]
    pub fn add(&self, task: ScheduledTask) -> anyhow::Result<Vec<ScheduledTask>> {
        let mut tasks = self.load()?;
        tasks.push(task);
        self.save(&tasks)?;
        Ok(tasks)
    }
}

/// Parses the argument part of a `task` command.
///
/// The first three `:`-separated fields are date, hour and minute; everything
/// after the third separator is the name, so names may contain `:`.
pub fn parse_task_args(args: &str) -> anyhow::Result<ScheduledTask> {
    let parts: Vec<&str> = args.split(':').collect();
    if parts.len() < 4 {
        bail!("Invalid argument format. Use YYYY-MM-DD:HH:MM:Task Name.");
    }

    let (date, hour, minute) = (parts[0].trim(), parts[1], parts[2]);
    let name = parts[3..].join(":").trim().to_string();

    let candidate = format!("{date}:{hour}:{minute}:00");
    if NaiveDateTime::parse_from_str(&candidate, TIMESTAMP_FORMAT).is_err() {
        bail!("Invalid date/time format. Ensure date is YYYY-MM-DD and time is HH:MM.");
    }

    if name.is_empty() {
        bail!("Task name must not be empty.");
    }

    Ok(ScheduledTask {
        datetime: format!("{date}:{hour}:{minute}"),
        name,
        notified: false,
    })
}

pub fn render_schedule(tasks: &[ScheduledTask]) -> String {
    if tasks.is_empty() {
        return "No scheduled tasks.".to_string();
    }

    let mut out = String::from("--- Scheduled Tasks ---\n");
    for (idx, task) in tasks.iter().enumerate() {
        let status = if task.notified { "[DONE]" } else { "[PENDING]" };
        out.push_str(&format!(
            "{}. {} | {} {}\n",
            idx + 1,
            task.datetime,
            task.name,
            status
        ));
    }
    out.push_str("-----------------------");
    out
}

/// Gateway backed by a [`TaskStore`] on the local filesystem.
pub struct LocalGateway {
    store: Mutex<TaskStore>,
}

impl LocalGateway {
    pub fn new(store: TaskStore) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        Ok(Self::new(TaskStore::open(data_dir)?))
    }

    fn execute(&self, command: &str) -> anyhow::Result<String> {
        let command = command.trim();
        let (verb, args) = command.split_once(' ').unwrap_or((command, ""));

        if verb != TASK_VERB {
            return Err(anyhow!("Unknown command: {verb}"));
        }

        let task = parse_task_args(args)?;
        let reply = format!("Scheduled {} {}", task.datetime, task.name);
        let total = self.store.lock().add(task)?.len();
        debug!(total, "task appended to local store");
        Ok(reply)
    }
}

#[async_trait]
impl BackendGateway for LocalGateway {
    #[tracing::instrument(skip(self))]
    async fn list_tasks(&self) -> Result<String, GatewayFault> {
        let tasks = self.store.lock().load()?;
        Ok(render_schedule(&tasks))
    }

    #[tracing::instrument(skip(self))]
    async fn submit_command(&self, command: &str) -> Result<String, GatewayFault> {
        self.execute(command).map_err(GatewayFault::from)
    }
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<ScheduledTask>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let task: ScheduledTask = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(task);
    }

    debug!(count = out.len(), "loaded tasks from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, tasks))]
fn save_jsonl_atomic(path: &Path, tasks: &[ScheduledTask]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = tasks.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for task in tasks {
        let serialized = serde_json::to_string(task)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
