use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{
  Datelike,
  Duration,
  NaiveDate,
  Weekday
};

use crate::release::Release;

pub const DEFAULT_PRIMARY_LIMIT: usize =
  3;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord
)]
pub struct MonthAnchor {
  year:  i32,
  month: u32
}

impl MonthAnchor {
  pub fn new(
    year: i32,
    month: u32
  ) -> Option<Self> {
    (1..=12).contains(&month).then_some(
      Self {
        year,
        month
      }
    )
  }

  pub fn containing(
    date: NaiveDate
  ) -> Self {
    Self {
      year:  date.year(),
      month: date.month()
    }
  }

  pub fn year(&self) -> i32 {
    self.year
  }

  pub fn month(&self) -> u32 {
    self.month
  }

  pub fn first_day(&self) -> NaiveDate {
    NaiveDate::from_ymd_opt(
      self.year, self.month, 1
    )
    .unwrap_or(NaiveDate::MIN)
  }

  pub fn last_day(&self) -> NaiveDate {
    add_days(
      self.shift(1).first_day(),
      -1
    )
  }

  pub fn contains(
    &self,
    date: NaiveDate
  ) -> bool {
    date.year() == self.year
      && date.month() == self.month
  }

  #[must_use]
  pub fn shift(
    &self,
    months: i32
  ) -> Self {
    let index = i64::from(self.year)
      * 12
      + i64::from(self.month)
      - 1
      + i64::from(months);
    let year = index.div_euclid(12);
    let month =
      index.rem_euclid(12) as u32 + 1;
    Self {
      year: i32::try_from(year)
        .unwrap_or(self.year),
      month
    }
  }
}

impl fmt::Display for MonthAnchor {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "{:04}-{:02}",
      self.year, self.month
    )
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridOptions {
  pub week_start:    Weekday,
  pub compact:       bool,
  pub primary_limit: usize
}

impl Default for GridOptions {
  fn default() -> Self {
    Self {
      week_start:    Weekday::Sun,
      compact:       false,
      primary_limit:
        DEFAULT_PRIMARY_LIMIT
    }
  }
}

impl GridOptions {
  /// Columns per rendered week.
  pub fn columns(&self) -> usize {
    if self.compact { 5 } else { 7 }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarDay {
  pub date:           NaiveDate,
  pub in_anchor_month: bool,
  pub is_today:       bool,
  pub releases:       Vec<Release>,
  primary_limit:      usize
}

impl CalendarDay {
  pub fn primary(&self) -> &[Release] {
    let end = self
      .releases
      .len()
      .min(self.primary_limit);
    &self.releases[..end]
  }

  pub fn overflow(&self) -> usize {
    self
      .releases
      .len()
      .saturating_sub(
        self.primary_limit
      )
  }

  pub fn is_empty(&self) -> bool {
    self.releases.is_empty()
  }
}

pub fn week_start_from_name(
  raw: &str
) -> Weekday {
  match raw
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "monday" | "mon" => Weekday::Mon,
    | "saturday" | "sat" => {
      Weekday::Sat
    }
    | _ => Weekday::Sun
  }
}

pub fn is_weekend(
  date: NaiveDate
) -> bool {
  matches!(
    date.weekday(),
    Weekday::Sat | Weekday::Sun
  )
}

#[tracing::instrument(skip(
  releases, options, anchor
), fields(anchor = %anchor))]
pub fn build_grid(
  releases: &[Release],
  anchor: MonthAnchor,
  options: &GridOptions,
  today: NaiveDate
) -> Vec<CalendarDay> {
  let start = start_of_week(
    anchor.first_day(),
    options.week_start
  );
  let end = add_days(
    start_of_week(
      anchor.last_day(),
      options.week_start
    ),
    6
  );

  let mut buckets: BTreeMap<
    NaiveDate,
    Vec<Release>
  > = BTreeMap::new();
  for release in releases {
    if let Some(day) = release.day()
      && day >= start
      && day <= end
    {
      buckets
        .entry(day)
        .or_default()
        .push(release.clone());
    }
  }
  for bucket in buckets.values_mut() {
    bucket.sort_by(by_hype_desc);
  }

  let mut days = Vec::new();
  let mut cursor = start;
  while cursor <= end {
    if !(options.compact
      && is_weekend(cursor))
    {
      days.push(CalendarDay {
        date:            cursor,
        in_anchor_month: anchor
          .contains(cursor),
        is_today:        cursor == today,
        releases:        buckets
          .remove(&cursor)
          .unwrap_or_default(),
        primary_limit:   options
          .primary_limit
      });
    }
    cursor = add_days(cursor, 1);
  }

  tracing::debug!(
    start = %start,
    end = %end,
    days = days.len(),
    compact = options.compact,
    "calendar grid built"
  );
  days
}

/// Releases on a single day, ordered the same way as a grid bucket.
pub fn day_detail(
  releases: &[Release],
  day: NaiveDate
) -> Vec<Release> {
  let mut out: Vec<Release> = releases
    .iter()
    .filter(|release| {
      release.day() == Some(day)
    })
    .cloned()
    .collect();
  out.sort_by(by_hype_desc);
  out
}

pub(crate) fn by_hype_desc(
  a: &Release,
  b: &Release
) -> Ordering {
  b.hype_weight().cmp(&a.hype_weight())
}

fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

fn start_of_week(
  day: NaiveDate,
  week_start: Weekday
) -> NaiveDate {
  let day_idx = day
    .weekday()
    .num_days_from_monday()
    as i64;
  let start_idx = week_start
    .num_days_from_monday()
    as i64;
  let diff =
    (7 + day_idx - start_idx) % 7;
  add_days(day, -diff)
}
