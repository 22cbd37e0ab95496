use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use thiserror::Error;
use tracing::debug;

use crate::command::{self, CommandString};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("invalid time '{0}': expected HH:MM")]
    InvalidTime(String),

    #[error("Please enter a date, time, and task name.")]
    Incomplete,
}

/// The three editable inputs of the scheduling form.
///
/// `date` and `time` only ever hold well-formed values because the setters
/// parse them; `name` is free text and may be blank until submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub name: String,
}

/// Fields that passed validation, ready for encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedFields {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub name: String,
}

impl ValidatedFields {
    pub fn encode(&self) -> CommandString {
        command::encode(self.date, self.time, &self.name)
    }
}

impl FormFields {
    /// Form prefilled with today's date and the current minute.
    pub fn prefilled(now: NaiveDateTime) -> Self {
        let time = now
            .time()
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0));
        Self {
            date: Some(now.date()),
            time,
            name: String::new(),
        }
    }

    pub fn prefilled_now() -> Self {
        Self::prefilled(Local::now().naive_local())
    }

    pub fn set_date(&mut self, raw: &str) -> Result<(), FormError> {
        self.date = parse_date(raw)?;
        Ok(())
    }

    pub fn set_time(&mut self, raw: &str) -> Result<(), FormError> {
        self.time = parse_time(raw)?;
        Ok(())
    }

    pub fn set_name(&mut self, raw: impl Into<String>) {
        self.name = raw.into();
    }

    pub fn clear_name(&mut self) {
        self.name.clear();
    }

    pub fn validate(&self) -> Result<ValidatedFields, FormError> {
        let (Some(date), Some(time)) = (self.date, self.time) else {
            debug!(
                has_date = self.date.is_some(),
                has_time = self.time.is_some(),
                "form missing date or time"
            );
            return Err(FormError::Incomplete);
        };

        let name = self.name.trim();
        if name.is_empty() {
            debug!("form task name is blank");
            return Err(FormError::Incomplete);
        }

        Ok(ValidatedFields {
            date,
            time,
            name: name.to_string(),
        })
    }
}

/// Empty input clears the field.
pub fn parse_date(raw: &str) -> Result<Option<NaiveDate>, FormError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, command::DATE_FORMAT)
        .map(Some)
        .map_err(|_| FormError::InvalidDate(raw.to_string()))
}

/// Empty input clears the field.
pub fn parse_time(raw: &str) -> Result<Option<NaiveTime>, FormError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveTime::parse_from_str(raw, command::TIME_FORMAT)
        .map(Some)
        .map_err(|_| FormError::InvalidTime(raw.to_string()))
}
