use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  TimeZone,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "radar-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "RADAR_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "RADAR_TIME_CONFIG";
const DEFAULT_PROJECT_TIMEZONE: &str =
  "America/Sao_Paulo";

const GAP_STEP_MINUTES: i64 = 15;
const GAP_SEARCH_STEPS: usize = 4 * 24;

const OFFSET_DATETIME_FORMATS: [&str;
  2] = [
  "%Y-%m-%dT%H:%M%#z",
  "%Y-%m-%d %H:%M%#z"
];

const NAIVE_DATETIME_FORMATS: [&str;
  4] = [
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%dT%H:%M",
  "%Y-%m-%d %H:%M:%S%.f",
  "%Y-%m-%d %H:%M"
];

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

pub fn project_timezone() -> &'static Tz
{
  static PROJECT_TZ: OnceLock<Tz> =
    OnceLock::new();
  PROJECT_TZ.get_or_init(
    resolve_project_timezone
  )
}

#[must_use]
pub fn to_project_date(
  dt: DateTime<Utc>
) -> NaiveDate {
  dt.with_timezone(project_timezone())
    .date_naive()
}

#[must_use]
pub fn format_project_date(
  dt: DateTime<Utc>
) -> String {
  dt.with_timezone(project_timezone())
    .format("%Y-%m-%d")
    .to_string()
}

#[must_use]
pub fn format_project_datetime(
  dt: DateTime<Utc>
) -> String {
  dt.with_timezone(project_timezone())
    .format("%Y-%m-%d %H:%M")
    .to_string()
}

fn resolve_project_timezone() -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
  {
    if let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    ) {
      return tz;
    }
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  parse_timezone(
    DEFAULT_PROJECT_TIMEZONE,
    "DEFAULT_PROJECT_TIMEZONE"
  )
  .unwrap_or_else(|| {
    tracing::error!(
      "failed to parse fallback \
       timezone; using UTC"
    );
    chrono_tz::UTC
  })
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured project timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

fn to_utc_from_local(
  local_naive: NaiveDateTime,
  tz: &Tz,
  context: &str
) -> anyhow::Result<DateTime<Utc>> {
  match tz
    .from_local_datetime(&local_naive)
  {
    | LocalResult::Single(local_dt) => {
      Ok(local_dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::warn!(
        context,
        first = %first,
        second = %second,
        "ambiguous local datetime; using earliest"
      );
      let chosen = if first <= second {
        first
      } else {
        second
      };
      Ok(chosen.with_timezone(&Utc))
    }
    | LocalResult::None => {
      resolve_past_gap(
        local_naive,
        tz,
        context
      )
    }
  }
}

/// Wall-clock times skipped by a DST jump resolve to the first local
/// time after the gap.
fn resolve_past_gap(
  local_naive: NaiveDateTime,
  tz: &Tz,
  context: &str
) -> anyhow::Result<DateTime<Utc>> {
  let mut candidate = local_naive;
  for _ in 0..GAP_SEARCH_STEPS {
    candidate = candidate
      .checked_add_signed(
        Duration::minutes(
          GAP_STEP_MINUTES
        )
      )
      .ok_or_else(|| {
        anyhow!(
          "datetime out of range: \
           {context}"
        )
      })?;
    match tz
      .from_local_datetime(&candidate)
    {
      | LocalResult::Single(local_dt)
      | LocalResult::Ambiguous(
        local_dt,
        _
      ) => {
        tracing::debug!(
          context,
          resolved = %local_dt,
          "local datetime falls in a dst gap; moved forward"
        );
        return Ok(
          local_dt.with_timezone(&Utc)
        );
      }
      | LocalResult::None => {}
    }
  }

  Err(anyhow!(
    "local datetime does not exist \
     in timezone {tz}: {context}"
  ))
}

/// Parses a payload release date. Values carrying an offset are taken as
/// absolute; naive values are read as wall-clock time in `tz`.
#[tracing::instrument(skip(tz), fields(input = raw))]
pub fn parse_release_date(
  raw: &str,
  tz: &Tz
) -> anyhow::Result<DateTime<Utc>> {
  let token = raw.trim();
  if token.is_empty() {
    return Err(anyhow!(
      "empty release date"
    ));
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  for format in OFFSET_DATETIME_FORMATS {
    if let Ok(dt) =
      DateTime::parse_from_str(
        token, format
      )
    {
      return Ok(dt.with_timezone(&Utc));
    }
  }

  if let Some(stripped) = token
    .strip_suffix('Z')
    .or_else(|| token.strip_suffix('z'))
  {
    for format in NAIVE_DATETIME_FORMATS {
      if let Ok(naive) =
        NaiveDateTime::parse_from_str(
          stripped, format
        )
      {
        return Ok(naive.and_utc());
      }
    }
  }

  for format in NAIVE_DATETIME_FORMATS {
    if let Ok(naive) =
      NaiveDateTime::parse_from_str(
        token, format
      )
    {
      return to_utc_from_local(
        naive, tz, token
      );
    }
  }

  let date = NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .with_context(|| {
    format!(
      "unrecognized release date: \
       {token}"
    )
  })?;
  let midnight = date
    .and_hms_opt(0, 0, 0)
    .ok_or_else(|| {
      anyhow!(
        "failed to construct \
         midnight for {date}"
      )
    })?;
  to_utc_from_local(
    midnight, tz, token
  )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthExpr {
  Today,
  Offset(i32),
  Absolute {
    year:  i32,
    month: u32
  }
}

#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_month_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<MonthExpr> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" | "now" | "this" => {
      return Ok(MonthExpr::Today);
    }
    | "next" => {
      return Ok(MonthExpr::Offset(1));
    }
    | "prev" | "previous" | "last" => {
      return Ok(MonthExpr::Offset(-1));
    }
    | _ => {}
  }

  let offset_re = Regex::new(
    r"^(?P<sign>[+-])(?P<num>\d{1,4})$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;
  if let Some(caps) =
    offset_re.captures(token)
  {
    let num: i32 = caps["num"]
      .parse()
      .context("invalid month offset")?;
    let signed = if &caps["sign"] == "-"
    {
      -num
    } else {
      num
    };
    return Ok(MonthExpr::Offset(
      signed
    ));
  }

  let ym_re = Regex::new(
    r"^(?P<year>\d{4})-(?P<month>\d{1,2})$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;
  if let Some(caps) =
    ym_re.captures(token)
  {
    let year: i32 = caps["year"]
      .parse()
      .context("invalid year")?;
    let month: u32 = caps["month"]
      .parse()
      .context("invalid month")?;
    if !(1..=12).contains(&month) {
      return Err(anyhow!(
        "month out of range: {month}"
      ));
    }
    return Ok(MonthExpr::Absolute {
      year,
      month
    });
  }

  if let Some(month) =
    parse_month_name(&lower)
  {
    return Ok(MonthExpr::Absolute {
      year: today.year(),
      month
    });
  }

  Err(anyhow!(
    "unrecognized month expression: \
     {token}"
  ))
}

fn parse_month_name(
  token: &str
) -> Option<u32> {
  match token {
    | "january" | "jan" => Some(1),
    | "february" | "feb" => Some(2),
    | "march" | "mar" => Some(3),
    | "april" | "apr" => Some(4),
    | "may" => Some(5),
    | "june" | "jun" => Some(6),
    | "july" | "jul" => Some(7),
    | "august" | "aug" => Some(8),
    | "september" | "sep" | "sept" => {
      Some(9)
    }
    | "october" | "oct" => Some(10),
    | "november" | "nov" => Some(11),
    | "december" | "dec" => Some(12),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    MonthExpr,
    parse_month_expr,
    parse_release_date
  };

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(
      2026, 10, 16
    )
    .expect("valid date")
  }

  #[test]
  fn parses_offset_release_date() {
    let parsed = parse_release_date(
      "2026-11-13T18:00:00-03:00",
      &chrono_tz::UTC
    )
    .expect("parse rfc3339");
    assert_eq!(
      parsed,
      Utc
        .with_ymd_and_hms(
          2026, 11, 13, 21, 0, 0
        )
        .single()
        .expect("valid instant")
    );
  }

  #[test]
  fn naive_release_date_uses_timezone()
  {
    let parsed = parse_release_date(
      "2026-05-26T00:00:00",
      &chrono_tz::America::Sao_Paulo
    )
    .expect("parse naive");
    assert_eq!(
      parsed,
      Utc
        .with_ymd_and_hms(
          2026, 5, 26, 3, 0, 0
        )
        .single()
        .expect("valid instant")
    );
  }

  #[test]
  fn bare_date_is_local_midnight() {
    let parsed = parse_release_date(
      "2027-01-02",
      &chrono_tz::UTC
    )
    .expect("parse date");
    assert_eq!(
      parsed,
      Utc
        .with_ymd_and_hms(
          2027, 1, 2, 0, 0, 0
        )
        .single()
        .expect("valid instant")
    );
  }

  #[test]
  fn date_in_dst_gap_moves_forward() {
    let parsed = parse_release_date(
      "2018-11-04",
      &chrono_tz::America::Sao_Paulo
    )
    .expect("parse gap date");
    // Clocks jumped 00:00 -> 01:00 (-02:00).
    assert_eq!(
      parsed,
      Utc
        .with_ymd_and_hms(
          2018, 11, 4, 3, 0, 0
        )
        .single()
        .expect("valid instant")
    );
  }

  #[test]
  fn minute_precision_with_offset() {
    let utc = Utc
      .with_ymd_and_hms(
        2026, 11, 20, 0, 0, 0
      )
      .single()
      .expect("valid instant");
    assert_eq!(
      parse_release_date(
        "2026-11-20T00:00Z",
        &chrono_tz::America::Sao_Paulo
      )
      .expect("parse zulu minutes"),
      utc
    );
    assert_eq!(
      parse_release_date(
        "2026-11-19T21:00-03:00",
        &chrono_tz::UTC
      )
      .expect("parse offset minutes"),
      utc
    );
  }

  #[test]
  fn garbage_release_date_is_rejected()
  {
    assert!(
      parse_release_date(
        "soon",
        &chrono_tz::UTC
      )
      .is_err()
    );
    assert!(
      parse_release_date(
        "  ",
        &chrono_tz::UTC
      )
      .is_err()
    );
    assert!(
      parse_release_date(
        "2026-02-30",
        &chrono_tz::UTC
      )
      .is_err()
    );
  }

  #[test]
  fn parses_month_expressions() {
    assert_eq!(
      parse_month_expr("today", today())
        .expect("today"),
      MonthExpr::Today
    );
    assert_eq!(
      parse_month_expr("next", today())
        .expect("next"),
      MonthExpr::Offset(1)
    );
    assert_eq!(
      parse_month_expr("-3", today())
        .expect("offset"),
      MonthExpr::Offset(-3)
    );
    assert_eq!(
      parse_month_expr(
        "2027-02",
        today()
      )
      .expect("year-month"),
      MonthExpr::Absolute {
        year:  2027,
        month: 2
      }
    );
    assert_eq!(
      parse_month_expr("March", today())
        .expect("month name"),
      MonthExpr::Absolute {
        year:  2026,
        month: 3
      }
    );
  }

  #[test]
  fn rejects_bad_month_expressions() {
    assert!(
      parse_month_expr(
        "2026-13",
        today()
      )
      .is_err()
    );
    assert!(
      parse_month_expr(
        "someday",
        today()
      )
      .is_err()
    );
  }
}
