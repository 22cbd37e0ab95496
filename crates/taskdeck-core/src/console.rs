use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::page::TaskPage;
use crate::status::{self, StatusKind, StatusMessage};
use crate::submit::SubmitOutcome;
use crate::sync::SyncState;

const HELP: &str = "\
commands:
  date <YYYY-MM-DD>   set the date (empty clears it)
  time <HH:MM>        set the time (empty clears it)
  name <text>         set the task name
  submit              schedule the task
  refresh             reload the schedule now
  show                print form, status and schedule
  help                this text
  quit                leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Date(String),
    Time(String),
    Name(String),
    Submit,
    Refresh,
    Show,
    Help,
    Quit,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> anyhow::Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim().to_string();
        let cmd = match head.to_ascii_lowercase().as_str() {
            "date" => ConsoleCommand::Date(rest),
            "time" => ConsoleCommand::Time(rest),
            "name" => ConsoleCommand::Name(rest),
            "submit" | "add" => ConsoleCommand::Submit,
            "refresh" => ConsoleCommand::Refresh,
            "show" | "ls" => ConsoleCommand::Show,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" | "q" => ConsoleCommand::Quit,
            other => return Err(anyhow!("unknown command '{other}'; type 'help'")),
        };
        Ok(Some(cmd))
    }
}

/// Writes the projection to stdout, coloring status lines when allowed.
#[derive(Debug, Clone)]
pub struct Printer {
    color: bool,
}

impl Printer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }

    pub fn status(&self, message: &StatusMessage) -> anyhow::Result<()> {
        let code = match message.kind {
            StatusKind::Info => "36",
            StatusKind::Success => "32",
            StatusKind::Error => "31",
        };
        let mut out = io::stdout().lock();
        writeln!(out, "{}", self.paint(&message.text, code))?;
        Ok(())
    }

    pub fn note(&self, text: &str) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", self.paint(text, "33"))?;
        Ok(())
    }

    pub fn schedule(&self, state: &SyncState) -> anyhow::Result<()> {
        let view = status::project(state);
        let mut out = io::stdout().lock();
        writeln!(out, "{}", view.display)?;
        if let Some(err) = view.last_error {
            writeln!(out, "{}", self.paint(err, "31"))?;
        }
        Ok(())
    }

    pub fn form(&self, page: &TaskPage) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let date = page
            .form
            .date
            .map(|d| d.format(crate::command::DATE_FORMAT).to_string())
            .unwrap_or_else(|| "-".to_string());
        let time = page
            .form
            .time
            .map(|t| t.format(crate::command::TIME_FORMAT).to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(out, "date: {date}  time: {time}  name: {}", page.form.name)?;
        Ok(())
    }
}

/// Interactive loop over stdin. Reprints the schedule whenever the polled
/// text changes and returns on `quit`, end of input or Ctrl-C.
#[tracing::instrument(skip_all)]
pub async fn run(page: &mut TaskPage, printer: &Printer) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut updates = page.subscribe();
    let mut shown_display: Option<String> = None;

    printer.note("type 'help' for commands")?;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    debug!("sync state sender dropped");
                    break;
                }
                let state = updates.borrow_and_update().clone();
                let text = state.display.text().to_string();
                if shown_display.as_deref() != Some(text.as_str()) {
                    printer.schedule(&state)?;
                    shown_display = Some(text);
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("stdin closed");
                    break;
                };
                let cmd = match ConsoleCommand::parse(&line) {
                    Ok(Some(cmd)) => cmd,
                    Ok(None) => continue,
                    Err(err) => {
                        printer.note(&err.to_string())?;
                        continue;
                    }
                };
                if !handle(page, printer, cmd).await? {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    Ok(())
}

/// Returns `false` when the console should exit.
async fn handle(page: &mut TaskPage, printer: &Printer, cmd: ConsoleCommand) -> anyhow::Result<bool> {
    match cmd {
        ConsoleCommand::Date(raw) => {
            if let Err(err) = page.form.set_date(&raw) {
                printer.note(&err.to_string())?;
            }
        }
        ConsoleCommand::Time(raw) => {
            if let Err(err) = page.form.set_time(&raw) {
                printer.note(&err.to_string())?;
            }
        }
        ConsoleCommand::Name(raw) => page.form.set_name(raw),
        ConsoleCommand::Submit => {
            if !status::project(&page.state()).submit_enabled {
                printer.note("a submission is already in progress")?;
                return Ok(true);
            }
            let outcome = page.submit().await;
            if let SubmitOutcome::Busy = outcome {
                printer.note("a submission is already in progress")?;
            } else if let Some(message) = page.state().status {
                printer.status(&message)?;
            }
        }
        ConsoleCommand::Refresh => {
            page.refresh_now();
        }
        ConsoleCommand::Show => {
            let state = page.state();
            printer.form(page)?;
            if let Some(message) = state.status.as_ref() {
                printer.status(message)?;
            }
            printer.schedule(&state)?;
        }
        ConsoleCommand::Help => printer.note(HELP)?,
        ConsoleCommand::Quit => return Ok(false),
    }
    Ok(true)
}
