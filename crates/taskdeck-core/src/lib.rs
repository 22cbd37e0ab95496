pub mod cli;
pub mod command;
pub mod config;
pub mod console;
pub mod form;
pub mod gateway;
pub mod page;
pub mod poller;
pub mod status;
pub mod store;
pub mod submit;
pub mod sync;

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::cli::{
  AddArgs,
  CliCommand
};
use crate::console::Printer;
use crate::form::FormFields;
use crate::gateway::BackendGateway;
use crate::page::TaskPage;
use crate::poller::Refresher;
use crate::store::LocalGateway;
use crate::sync::{
  Pane,
  SyncHandle
};

/// Entry point of the `taskdeck`
/// binary; returns the process exit
/// code.
#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<i32> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting taskdeck"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  )?;

  let period = match cli.interval {
    | Some(0) => {
      anyhow::bail!(
        "--interval must be greater \
         than zero"
      )
    }
    | Some(secs) => {
      Duration::from_secs(secs)
    }
    | None => cfg.poll_interval
  };

  let data_dir = cfg
    .data_dir(cli.data.as_deref())
    .context(
      "failed to resolve data \
       directory"
    )?;

  let gateway: Arc<dyn BackendGateway> =
    Arc::new(
      LocalGateway::open(&data_dir)
        .with_context(|| {
          format!(
            "failed to open task \
             store at {}",
            data_dir.display()
          )
        })?
    );
  let printer = Printer::new(cfg.color);
  let command = cli
    .command
    .unwrap_or(CliCommand::Console);

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to build async \
         runtime"
      )?;

  let code = runtime.block_on(
    async move {
      match command {
        | CliCommand::Console => {
          let mut page = TaskPage::open(
            gateway,
            period,
            FormFields::prefilled_now()
          );
          console::run(
            &mut page, &printer
          )
          .await?;
          page.close();
          Ok::<i32, anyhow::Error>(0)
        }
        | CliCommand::Add(args) => {
          add_once(
            gateway, period, args,
            &printer
          )
          .await
        }
        | CliCommand::List => {
          list_once(gateway, &printer)
            .await
        }
      }
    }
  )?;

  info!(code, "done");
  Ok(code)
}

#[tracing::instrument(skip_all)]
async fn add_once(
  gateway: Arc<dyn BackendGateway>,
  period: Duration,
  args: AddArgs,
  printer: &Printer
) -> anyhow::Result<i32> {
  let mut form =
    FormFields::prefilled_now();
  if let Some(date) =
    args.date.as_deref()
  {
    form.set_date(date)?;
  }
  if let Some(time) =
    args.time.as_deref()
  {
    form.set_time(time)?;
  }
  form.set_name(args.name.join(" "));

  let mut page =
    TaskPage::open(gateway, period, form);
  let outcome = page.submit().await;
  let added = outcome.is_added();

  // Awaited so the printout includes
  // the task just added.
  page.refresh_now().await.context(
    "schedule refresh task failed"
  )?;

  let state = page.state();
  if let Some(message) =
    state.status.as_ref()
  {
    printer.status(message)?;
  }
  printer.schedule(&state)?;
  page.close();

  Ok(if added { 0 } else { 1 })
}

#[tracing::instrument(skip_all)]
async fn list_once(
  gateway: Arc<dyn BackendGateway>,
  printer: &Printer
) -> anyhow::Result<i32> {
  let sync = SyncHandle::new();
  let refresher =
    Refresher::new(gateway, sync.clone());
  refresher.fetch_once().await;

  let state = sync.snapshot();
  printer.schedule(&state)?;
  Ok(
    if state.display == Pane::LoadFailed {
      1
    } else {
      0
    }
  )
}

#[cfg(test)]
mod tests {
  use std::fs;
  use std::sync::Arc;
  use std::time::Duration;

  use tempfile::tempdir;

  use super::{
    add_once,
    list_once
  };
  use crate::cli::AddArgs;
  use crate::console::Printer;
  use crate::store::LocalGateway;

  fn args(name: &str) -> AddArgs {
    AddArgs {
      date: Some(
        "2025-06-01".to_string()
      ),
      time: Some("09:30".to_string()),
      name: name
        .split_whitespace()
        .map(str::to_string)
        .collect()
    }
  }

  #[tokio::test(start_paused = true)]
  async fn add_exit_code_follows_outcome()
  {
    let temp =
      tempdir().expect("tempdir");
    let gateway = Arc::new(
      LocalGateway::open(temp.path())
        .expect("open gateway")
    );
    let printer = Printer::new(false);
    let period = Duration::from_secs(5);

    let code = add_once(
      gateway.clone(),
      period,
      args("water plants"),
      &printer
    )
    .await
    .expect("add");
    assert_eq!(code, 0);

    let code = add_once(
      gateway.clone(),
      period,
      args(""),
      &printer
    )
    .await
    .expect("blank add");
    assert_eq!(code, 1);

    fs::write(
      temp.path().join("tasks.data"),
      "{not json}\n"
    )
    .expect("corrupt store");
    let code = add_once(
      gateway,
      period,
      args("water plants"),
      &printer
    )
    .await
    .expect("rejected add");
    assert_eq!(code, 1);
  }

  #[tokio::test]
  async fn list_exit_code_follows_load()
  {
    let temp =
      tempdir().expect("tempdir");
    let gateway = Arc::new(
      LocalGateway::open(temp.path())
        .expect("open gateway")
    );
    let printer = Printer::new(false);

    assert_eq!(
      list_once(
        gateway.clone(),
        &printer
      )
      .await
      .expect("list"),
      0
    );

    fs::write(
      temp.path().join("tasks.data"),
      "{not json}\n"
    )
    .expect("corrupt store");
    assert_eq!(
      list_once(gateway, &printer)
        .await
        .expect("failed list"),
      1
    );
  }
}
