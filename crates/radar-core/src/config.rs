use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono::Duration;
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::grid::{
  DEFAULT_PRIMARY_LIMIT,
  GridOptions,
  week_start_from_name
};
use crate::ranking::DEFAULT_UPCOMING_LIMIT;
use crate::view::{
  ViewOptions,
  is_compact_width
};

const RELEASES_FILE: &str =
  "releases.json";

#[derive(Debug, Clone)]
pub struct Config {
  map:              HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    for (k, v) in [
      (
        "data.location",
        "~/.radar/releases.json"
      ),
      ("default.command", "dashboard"),
      ("color", "on"),
      ("calendar.weekstart", "sunday"),
      ("calendar.primary", "3"),
      ("upcoming.limit", "10"),
      ("hype.grace", "24"),
      ("layout.compact", "auto")
    ] {
      map.insert(
        k.to_string(),
        v.to_string()
      );
    }
    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    radarrc_override
  ))]
  pub fn load(
    radarrc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let radarrc = resolve_radarrc_path(
      radarrc_override
    )?;
    if let Some(path) = radarrc {
      info!(radarrc = %path.display(), "loading radarrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no radarrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_usize(
    &self,
    key: &str
  ) -> anyhow::Result<Option<usize>> {
    self
      .map
      .get(key)
      .map(|v| {
        v.trim().parse::<usize>().with_context(
          || {
            format!(
              "config key {key} \
               expects a \
               non-negative \
               integer, got {v}"
            )
          }
        )
      })
      .transpose()
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  /// Resolves `layout.compact`; `auto` asks for the terminal width.
  pub fn compact_layout(
    &self,
    columns: Option<usize>
  ) -> anyhow::Result<bool> {
    let raw = self
      .get("layout.compact")
      .unwrap_or_else(|| {
        "auto".to_string()
      });
    match raw
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "auto" => {
        Ok(columns
          .is_some_and(is_compact_width))
      }
      | other => {
        match other {
          | "1" | "y" | "yes" | "on"
          | "true" => Ok(true),
          | "0" | "n" | "no" | "off"
          | "false" => Ok(false),
          | _ => {
            Err(anyhow!(
              "invalid layout.compact \
               setting: {raw}"
            ))
          }
        }
      }
    }
  }

  #[tracing::instrument(skip(self))]
  pub fn view_options(
    &self,
    timezone: chrono_tz::Tz,
    columns: Option<usize>
  ) -> anyhow::Result<ViewOptions> {
    let week_start =
      week_start_from_name(
        &self
          .get("calendar.weekstart")
          .unwrap_or_default()
      );
    let primary_limit = self
      .get_usize("calendar.primary")?
      .filter(|n| *n > 0)
      .unwrap_or(DEFAULT_PRIMARY_LIMIT);
    let upcoming_limit = self
      .get_usize("upcoming.limit")?
      .unwrap_or(DEFAULT_UPCOMING_LIMIT);
    let grace_hours = self
      .get_usize("hype.grace")?
      .unwrap_or(24);
    let hype_grace = i64::try_from(
      grace_hours
    )
    .ok()
    .and_then(Duration::try_hours)
    .ok_or_else(|| {
      anyhow!(
        "hype.grace out of range: \
         {grace_hours} hours"
      )
    })?;

    Ok(ViewOptions {
      grid: GridOptions {
        week_start,
        compact: self
          .compact_layout(columns)?,
        primary_limit
      },
      upcoming_limit,
      hype_grace,
      timezone
    })
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

/// Path of the release payload. A directory resolves to its
/// `releases.json`.
#[tracing::instrument(skip(
  cfg,
  override_path
))]
pub fn resolve_releases_path(
  cfg: &Config,
  override_path: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let path = if let Some(path) =
    override_path
  {
    expand_tilde(path)
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_releases_path()?
  };

  if path.is_dir() {
    return Ok(path.join(RELEASES_FILE));
  }
  Ok(path)
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_radarrc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(radarrc_env) =
    std::env::var("RADARRC")
  {
    if radarrc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      radarrc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping radarrc"
    );
    return Ok(None);
  };
  let candidate = home.join(".radarrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_releases_path()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home
    .join(".radar")
    .join(RELEASES_FILE))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}
