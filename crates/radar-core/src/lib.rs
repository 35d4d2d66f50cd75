pub mod cli;
pub mod commands;
pub mod config;
pub mod countdown;
pub mod datetime;
pub mod grid;
pub mod index;
pub mod ranking;
pub mod release;
pub mod render;
pub mod view;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
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
    "starting radar CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.radarrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let path =
    config::resolve_releases_path(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve release \
       payload path"
    )?;

  let index = if path.exists() {
    index::ReleaseIndex::load(
      &path,
      datetime::project_timezone()
    )
    .with_context(|| {
      format!(
        "failed to load releases from \
         {}",
        path.display()
      )
    })?
  } else {
    info!(path = %path.display(), "no release payload; starting empty");
    index::ReleaseIndex::empty()
  };

  let renderer =
    render::Renderer::new(&cfg)?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  commands::dispatch(
    &cfg, &renderer, index, inv
  )?;

  info!("done");
  Ok(())
}
