use std::collections::HashSet;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow,
  bail
};
use tracing::{
  debug,
  info,
  warn
};

use crate::poller::DEFAULT_POLL_INTERVAL;

pub const CONFIG_ENV: &str =
  "TASKDECKRC";

const DEFAULT_DATA_DIR: &str =
  "~/.taskdeck";

/// Settings read from a
/// `taskdeckrc` file and `rc.`
/// overrides.
#[derive(Debug, Clone)]
pub struct Config {
  pub data_location: PathBuf,
  pub poll_interval: Duration,
  pub color:         bool,
  pub loaded_files:  Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      data_location: PathBuf::from(
        DEFAULT_DATA_DIR
      ),
      poll_interval:
        DEFAULT_POLL_INTERVAL,
      color:         true,
      loaded_files:  vec![]
    }
  }
}

enum RcLine<'a> {
  Include(&'a str),
  Set {
    key:   &'a str,
    value: &'a str
  }
}

fn parse_line(
  raw: &str
) -> anyhow::Result<Option<RcLine<'_>>>
{
  let line = raw
    .split('#')
    .next()
    .unwrap_or_default()
    .trim();
  if line.is_empty() {
    return Ok(None);
  }
  if let Some(target) =
    line.strip_prefix("include ")
  {
    let target = target.trim();
    if target.is_empty() {
      bail!(
        "include needs a path"
      );
    }
    return Ok(Some(RcLine::Include(
      target
    )));
  }
  let (key, value) = line
    .split_once('=')
    .ok_or_else(|| {
      anyhow!(
        "expected `key = value`, \
         got `{line}`"
      )
    })?;
  Ok(Some(RcLine::Set {
    key:   key.trim(),
    value: value.trim()
  }))
}

impl Config {
  /// Defaults overlaid with the rc
  /// file found by
  /// [`locate_rc_file`].
  #[tracing::instrument]
  pub fn load(
    explicit: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Self::default();
    match locate_rc_file(explicit) {
      | Some(path) => {
        info!(config = %path.display(), "reading taskdeckrc");
        let mut seen = HashSet::new();
        cfg.read_file(&path, &mut seen)?;
      }
      | None => {
        debug!(
          "no taskdeckrc; built-in \
           settings"
        );
      }
    }
    Ok(cfg)
  }

  /// Applies one setting. Unknown
  /// keys are logged and ignored.
  pub fn set(
    &mut self,
    key: &str,
    value: &str
  ) -> anyhow::Result<()> {
    let key = key
      .strip_prefix("rc.")
      .unwrap_or(key);
    match key {
      | "data.location" => {
        self.data_location =
          PathBuf::from(value);
      }
      | "poll.interval" => {
        self.poll_interval =
          parse_interval(value)?;
      }
      | "color" => {
        self.color =
          parse_switch(value)
            .ok_or_else(|| {
              anyhow!(
                "color expects on or \
                 off, got `{value}`"
              )
            })?;
      }
      | other => {
        warn!(key = other, "ignoring unknown setting");
      }
    }
    Ok(())
  }

  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (key, value) in overrides {
      debug!(key = %key, value = %value, "rc override");
      self
        .set(&key, &value)
        .with_context(|| {
          format!("override {key}")
        })?;
    }
    Ok(())
  }

  /// Resolves the store directory,
  /// creating it when missing.
  pub fn data_dir(
    &self,
    explicit: Option<&Path>
  ) -> anyhow::Result<PathBuf> {
    let dir = match explicit {
      | Some(path) => path.to_path_buf(),
      | None => {
        home_relative(
          &self.data_location
        )?
      }
    };
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
    Ok(dir)
  }

  fn read_file(
    &mut self,
    path: &Path,
    seen: &mut HashSet<PathBuf>
  ) -> anyhow::Result<()> {
    let path = home_relative(path)?;
    if !seen.insert(path.clone()) {
      warn!(file = %path.display(), "include cycle; skipping");
      return Ok(());
    }
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;
    self.loaded_files.push(path.clone());

    for (idx, raw) in
      text.lines().enumerate()
    {
      let at = || {
        format!(
          "{}:{}",
          path.display(),
          idx + 1
        )
      };
      match parse_line(raw)
        .with_context(at)?
      {
        | None => {}
        | Some(RcLine::Include(
          target
        )) => {
          let target = home_relative(
            Path::new(target)
          )?;
          let target =
            if target.is_relative() {
              path
                .parent()
                .unwrap_or(Path::new(
                  "."
                ))
                .join(target)
            } else {
              target
            };
          if target.is_file() {
            self
              .read_file(&target, seen)
              .with_context(at)?;
          } else {
            warn!(include = %target.display(), "missing include; skipping");
          }
        }
        | Some(RcLine::Set {
          key,
          value
        }) => {
          self
            .set(key, value)
            .with_context(at)?;
        }
      }
    }
    Ok(())
  }
}

/// `--config`, then `$TASKDECKRC`
/// (`/dev/null` disables), then
/// `~/.taskdeckrc` if it exists.
fn locate_rc_file(
  explicit: Option<&Path>
) -> Option<PathBuf> {
  if let Some(path) = explicit {
    return Some(path.to_path_buf());
  }
  if let Some(env) =
    std::env::var_os(CONFIG_ENV)
  {
    return (env != "/dev/null")
      .then(|| PathBuf::from(env));
  }
  dirs::home_dir()
    .map(|home| {
      home.join(".taskdeckrc")
    })
    .filter(|rc| rc.is_file())
}

fn home_relative(
  path: &Path
) -> anyhow::Result<PathBuf> {
  match path.strip_prefix("~") {
    | Ok(rest) => {
      let home = dirs::home_dir()
        .context(
          "cannot determine home \
           directory"
        )?;
      Ok(home.join(rest))
    }
    | Err(_) => Ok(path.to_path_buf())
  }
}

fn parse_interval(
  raw: &str
) -> anyhow::Result<Duration> {
  let secs: u64 =
    raw.parse().with_context(|| {
      format!(
        "poll.interval expects \
         seconds, got `{raw}`"
      )
    })?;
  if secs == 0 {
    bail!(
      "poll.interval must be \
       greater than zero"
    );
  }
  Ok(Duration::from_secs(secs))
}

fn parse_switch(
  raw: &str
) -> Option<bool> {
  match raw
    .to_ascii_lowercase()
    .as_str()
  {
    | "on" | "yes" | "true" | "1" => {
      Some(true)
    }
    | "off" | "no" | "false" | "0" => {
      Some(false)
    }
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use std::fs;
  use std::time::Duration;

  use tempfile::tempdir;

  use super::Config;

  #[test]
  fn defaults_poll_every_five_seconds()
  {
    let cfg = Config::default();
    assert_eq!(
      cfg.poll_interval,
      Duration::from_secs(5)
    );
    assert!(cfg.color);
    assert_eq!(
      cfg.data_location,
      std::path::PathBuf::from(
        "~/.taskdeck"
      )
    );
  }

  #[test]
  fn loads_file_with_include_and_comments()
  {
    let temp =
      tempdir().expect("tempdir");
    fs::write(
      temp.path().join("extra.rc"),
      "color = off\n"
    )
    .expect("write include");
    let rc = temp.path().join("main.rc");
    fs::write(
      &rc,
      "# taskdeck\n\
       poll.interval = 12 # seconds\n\
       include extra.rc\n\
       include missing.rc\n"
    )
    .expect("write rc");

    let cfg = Config::load(Some(
      rc.as_path()
    ))
    .expect("load config");
    assert_eq!(
      cfg.poll_interval,
      Duration::from_secs(12)
    );
    assert!(!cfg.color);
    assert_eq!(cfg.loaded_files.len(), 2);
  }

  #[test]
  fn self_include_is_read_once() {
    let temp =
      tempdir().expect("tempdir");
    let rc = temp.path().join("loop.rc");
    fs::write(
      &rc,
      "include loop.rc\ncolor = no\n"
    )
    .expect("write rc");

    let cfg = Config::load(Some(
      rc.as_path()
    ))
    .expect("load config");
    assert_eq!(cfg.loaded_files.len(), 1);
    assert!(!cfg.color);
  }

  #[test]
  fn bad_lines_name_file_and_line() {
    let temp =
      tempdir().expect("tempdir");
    let rc = temp.path().join("bad.rc");
    fs::write(
      &rc,
      "color = on\npoll.interval 5\n"
    )
    .expect("write rc");

    let err = Config::load(Some(
      rc.as_path()
    ))
    .expect_err("missing equals");
    assert!(
      format!("{err:#}")
        .contains("bad.rc:2")
    );
  }

  #[test]
  fn overrides_win_and_bad_values_fail()
  {
    let mut cfg = Config::default();
    cfg
      .apply_overrides([(
        "rc.poll.interval".to_string(),
        "2".to_string()
      )])
      .expect("valid override");
    assert_eq!(
      cfg.poll_interval,
      Duration::from_secs(2)
    );

    for (key, value) in [
      ("poll.interval", "0"),
      ("poll.interval", "soon"),
      ("color", "purple")
    ] {
      assert!(
        cfg
          .set(key, value)
          .is_err(),
        "{key}={value}"
      );
    }
    assert_eq!(
      cfg.poll_interval,
      Duration::from_secs(2)
    );
    cfg
      .set("some.other", "x")
      .expect("unknown key ignored");
  }

  #[test]
  fn data_dir_override_is_created() {
    let temp =
      tempdir().expect("tempdir");
    let target =
      temp.path().join("nested/data");
    let dir = Config::default()
      .data_dir(Some(target.as_path()))
      .expect("resolve data dir");
    assert_eq!(dir, target);
    assert!(dir.is_dir());
  }

  #[test]
  fn data_location_setting_is_used() {
    let temp =
      tempdir().expect("tempdir");
    let target = temp.path().join("store");
    let mut cfg = Config::default();
    cfg
      .set(
        "data.location",
        &target.to_string_lossy()
      )
      .expect("set location");
    assert_eq!(
      cfg
        .data_dir(None)
        .expect("data dir"),
      target
    );
  }
}
