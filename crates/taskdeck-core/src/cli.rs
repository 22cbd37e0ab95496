use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const ADD_SUBCOMMAND: &str = "add";

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskdeck",
    version,
    about = "Schedule tasks and watch the schedule refresh",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    /// Refresh period in seconds; overrides `poll.interval`.
    #[arg(long = "interval", global = true)]
    pub interval: Option<u64>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommand {
    /// Interactive form with an auto-refreshing schedule (default).
    Console,
    /// Submit one task and print the refreshed schedule.
    Add(AddArgs),
    /// Print the current schedule once.
    List,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// YYYY-MM-DD, defaults to today.
    #[arg(long)]
    pub date: Option<String>,

    /// HH:MM, defaults to the current minute.
    #[arg(long)]
    pub time: Option<String>,

    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub name: Vec<String>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` overrides out of the
/// argument list before clap sees it.
///
/// Capture stops at `--` or the `add` subcommand, whose trailing words are
/// the task name and may look like overrides.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    let mut capturing = true;
    for arg in iter {
        let s = arg.to_string_lossy();
        if s == "--" || s == ADD_SUBCOMMAND {
            capturing = false;
        }
        if !capturing {
            cleaned.push(arg);
            continue;
        }
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use clap::Parser;

    use super::{CliCommand, GlobalCli, preprocess_args};

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn extracts_positional_rc_overrides() {
        let pre = preprocess_args(&os(&["taskdeck", "rc.poll.interval=2", "list", "rc.color:off"]))
            .expect("preprocess");
        assert_eq!(pre.cleaned_args, os(&["taskdeck", "list"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.poll.interval".to_string(), "2".to_string()),
                ("rc.color".to_string(), "off".to_string()),
            ]
        );
    }

    #[test]
    fn parses_add_with_multiword_name() {
        let cli = GlobalCli::parse_from(os(&[
            "taskdeck", "-v", "add", "--date", "2025-06-01", "--time", "09:30", "water", "plants",
        ]));
        assert_eq!(cli.verbose, 1);
        let Some(CliCommand::Add(add)) = cli.command else {
            panic!("expected add subcommand");
        };
        assert_eq!(add.date.as_deref(), Some("2025-06-01"));
        assert_eq!(add.time.as_deref(), Some("09:30"));
        assert_eq!(add.name.join(" "), "water plants");
    }

    #[test]
    fn add_name_words_are_not_overrides() {
        let pre = preprocess_args(&os(&[
            "taskdeck",
            "rc.color=off",
            "add",
            "--date",
            "2025-06-01",
            "--time",
            "09:30",
            "buy",
            "rc.cola:2",
        ]))
        .expect("preprocess");
        assert_eq!(
            pre.rc_overrides,
            vec![("rc.color".to_string(), "off".to_string())]
        );

        let cli = GlobalCli::parse_from(pre.cleaned_args);
        let Some(CliCommand::Add(add)) = cli.command else {
            panic!("expected add subcommand");
        };
        assert_eq!(add.name.join(" "), "buy rc.cola:2");
    }

    #[test]
    fn double_dash_ends_override_capture() {
        let pre = preprocess_args(&os(&["taskdeck", "list", "--", "rc.color:off"]))
            .expect("preprocess");
        assert!(pre.rc_overrides.is_empty());
        assert_eq!(pre.cleaned_args, os(&["taskdeck", "list", "--", "rc.color:off"]));
    }

    #[test]
    fn no_subcommand_means_console() {
        let cli = GlobalCli::parse_from(os(&["taskdeck", "--interval", "3"]));
        assert!(cli.command.is_none());
        assert_eq!(cli.interval, Some(3));
    }
}
