use std::fmt;

use chrono::{NaiveDate, NaiveTime};

pub const TASK_VERB: &str = "task";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

/// A single `task <YYYY-MM-DD>:<HH:MM>:<name>` line as sent to the backend.
///
/// The name is not escaped: a `:` inside it is passed through verbatim and the
/// backend treats everything after the third separator as the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandString(String);

impl CommandString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CommandString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CommandString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub fn timestamp_token(date: NaiveDate, time: NaiveTime) -> String {
    format!("{}:{}", date.format(DATE_FORMAT), time.format(TIME_FORMAT))
}

pub fn encode(date: NaiveDate, time: NaiveTime, name: &str) -> CommandString {
    CommandString(format!(
        "{TASK_VERB} {}:{}",
        timestamp_token(date, time),
        name.trim()
    ))
}
