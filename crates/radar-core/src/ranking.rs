use std::cmp::Ordering;

use chrono::{
  DateTime,
  Duration,
  Utc
};
use tracing::trace;

use crate::grid::by_hype_desc;
use crate::release::{
  HypeLevel,
  Release
};

pub const SEARCH_LIMIT: usize = 10;
pub const DEFAULT_UPCOMING_LIMIT:
  usize = 10;

pub fn default_hype_grace() -> Duration
{
  Duration::days(1)
}

#[tracing::instrument(skip(
  releases, now
))]
pub fn search(
  releases: &[Release],
  query: &str,
  now: DateTime<Utc>
) -> Vec<Release> {
  let needle = query.trim();
  if needle.is_empty() {
    return Vec::new();
  }
  let needle = needle.to_lowercase();

  let mut hits: Vec<Release> = releases
    .iter()
    .filter(|release| {
      release.matches_title(&needle)
    })
    .cloned()
    .collect();
  hits.sort_by(|a, b| {
    compare_search_hits(a, b, now)
  });
  hits.truncate(SEARCH_LIMIT);

  trace!(
    hits = hits.len(),
    "search ranked"
  );
  hits
}

#[tracing::instrument(skip(
  releases, now
))]
pub fn upcoming(
  releases: &[Release],
  now: DateTime<Utc>,
  limit: usize
) -> Vec<Release> {
  let mut out: Vec<Release> = releases
    .iter()
    .filter(|release| {
      release
        .instant()
        .is_some_and(|at| at > now)
    })
    .cloned()
    .collect();
  out.sort_by(by_date_asc);
  out.truncate(limit);
  out
}

#[tracing::instrument(skip(
  releases, now
))]
pub fn hype_future(
  releases: &[Release],
  now: DateTime<Utc>,
  grace: Duration
) -> Vec<Release> {
  let cutoff = now
    .checked_sub_signed(grace)
    .unwrap_or(DateTime::<Utc>::MIN_UTC);
  let mut out: Vec<Release> = releases
    .iter()
    .filter(|release| {
      release.hype == HypeLevel::VeryHigh
        && release
          .instant()
          .is_some_and(|at| at >= cutoff)
    })
    .cloned()
    .collect();
  out.sort_by(by_date_asc);
  out
}

#[tracing::instrument(skip(releases))]
pub fn undated(
  releases: &[Release]
) -> Vec<Release> {
  let mut out: Vec<Release> = releases
    .iter()
    .filter(|release| release.is_tba())
    .cloned()
    .collect();
  out.sort_by(by_hype_desc);
  out
}

fn compare_search_hits(
  a: &Release,
  b: &Release,
  now: DateTime<Utc>
) -> Ordering {
  let ordering = by_hype_desc(a, b);
  if ordering != Ordering::Equal {
    return ordering;
  }

  let a_future = future_instant(a, now);
  let b_future = future_instant(b, now);
  match (a_future, b_future) {
    | (Some(x), Some(y)) => x.cmp(&y),
    | (Some(_), None) => Ordering::Less,
    | (None, Some(_)) => {
      Ordering::Greater
    }
    | (None, None) => Ordering::Equal
  }
}

fn future_instant(
  release: &Release,
  now: DateTime<Utc>
) -> Option<DateTime<Utc>> {
  release
    .instant()
    .filter(|at| *at >= now)
}

fn by_date_asc(
  a: &Release,
  b: &Release
) -> Ordering {
  a.instant().cmp(&b.instant())
}

#[cfg(test)]
mod tests {
  use chrono::{
    DateTime,
    Duration,
    TimeZone,
    Utc
  };

  use super::*;
  use crate::release::{
    HypeLevel,
    Release,
    ReleaseDate
  };

  fn now() -> DateTime<Utc> {
    Utc
      .with_ymd_and_hms(
        2026, 10, 16, 12, 0, 0
      )
      .single()
      .expect("valid now")
  }

  fn release(
    id: &str,
    title: &str,
    offset: Option<Duration>,
    hype: HypeLevel
  ) -> Release {
    let mut r = Release::new(id, title);
    r.release_date = offset.map(|d| {
      ReleaseDate::utc(now() + d)
    });
    r.hype = hype;
    r
  }

  fn abc() -> Vec<Release> {
    vec![
      release(
        "A",
        "Radar Alpha",
        Some(Duration::days(5)),
        HypeLevel::VeryHigh
      ),
      release(
        "B",
        "Radar Beta",
        Some(Duration::days(-5)),
        HypeLevel::Normal
      ),
      release(
        "C",
        "Radar Gamma",
        None,
        HypeLevel::High
      ),
    ]
  }

  fn ids(
    releases: &[Release]
  ) -> Vec<&str> {
    releases
      .iter()
      .map(|r| r.id.as_str())
      .collect()
  }

  #[test]
  fn reference_feeds() {
    let releases = abc();
    assert_eq!(
      ids(&upcoming(
        &releases,
        now(),
        10
      )),
      vec!["A"]
    );
    assert_eq!(
      ids(&undated(&releases)),
      vec!["C"]
    );
    assert_eq!(
      ids(&hype_future(
        &releases,
        now(),
        default_hype_grace()
      )),
      vec!["A"]
    );
    assert!(
      search(&releases, "", now())
        .is_empty()
    );
    assert!(
      search(&releases, "   ", now())
        .is_empty()
    );
    assert_eq!(
      ids(&search(
        &releases,
        "radar",
        now()
      )),
      vec!["A", "C", "B"]
    );
  }

  #[test]
  fn search_prefers_future_then_soonest()
  {
    let releases = vec![
      release(
        "past",
        "Saga Past",
        Some(Duration::days(-2)),
        HypeLevel::High
      ),
      release(
        "tba",
        "Saga Unknown",
        None,
        HypeLevel::High
      ),
      release(
        "late",
        "Saga Late",
        Some(Duration::days(40)),
        HypeLevel::High
      ),
      release(
        "soon",
        "SAGA Soon",
        Some(Duration::days(2)),
        HypeLevel::High
      ),
      release(
        "now",
        "saga Now",
        Some(Duration::zero()),
        HypeLevel::High
      ),
    ];
    assert_eq!(
      ids(&search(
        &releases,
        "saga",
        now()
      )),
      vec![
        "now", "soon", "late", "past",
        "tba"
      ]
    );
  }

  #[test]
  fn search_caps_results_and_matches_query()
  {
    let releases: Vec<Release> = (0..25)
      .map(|i| {
        release(
          &format!("r{i}"),
          &if i % 2 == 0 {
            format!("Space Game {i}")
          } else {
            format!("Other {i}")
          },
          Some(Duration::days(i)),
          HypeLevel::Normal
        )
      })
      .collect();
    let hits =
      search(&releases, "SPACE", now());
    assert_eq!(hits.len(), SEARCH_LIMIT);
    assert!(hits.iter().all(|r| {
      r.title
        .to_lowercase()
        .contains("space")
    }));
  }

  #[test]
  fn upcoming_is_strict_and_limited() {
    let releases: Vec<Release> = (-3..15)
      .map(|i| {
        release(
          &format!("r{i}"),
          "x",
          Some(Duration::hours(i)),
          HypeLevel::Normal
        )
      })
      .collect();
    let feed =
      upcoming(&releases, now(), 8);
    assert_eq!(feed.len(), 8);
    assert_eq!(feed[0].id, "r1");
    assert!(feed.windows(2).all(|w| {
      w[0].instant() <= w[1].instant()
    }));
  }

  #[test]
  fn hype_future_keeps_release_day() {
    let releases = vec![
      release(
        "yesterday-ish",
        "x",
        Some(Duration::hours(-20)),
        HypeLevel::VeryHigh
      ),
      release(
        "long-gone",
        "x",
        Some(Duration::days(-3)),
        HypeLevel::VeryHigh
      ),
      release(
        "later",
        "x",
        Some(Duration::days(30)),
        HypeLevel::VeryHigh
      ),
      release(
        "merely-high",
        "x",
        Some(Duration::days(3)),
        HypeLevel::High
      ),
      release(
        "tba",
        "x",
        None,
        HypeLevel::VeryHigh
      ),
    ];
    assert_eq!(
      ids(&hype_future(
        &releases,
        now(),
        default_hype_grace()
      )),
      vec!["yesterday-ish", "later"]
    );
    assert_eq!(
      ids(&hype_future(
        &releases,
        now(),
        Duration::zero()
      )),
      vec!["later"]
    );
  }

  #[test]
  fn undated_orders_by_hype_stably() {
    let releases = vec![
      release(
        "n1",
        "x",
        None,
        HypeLevel::Normal
      ),
      release(
        "vh",
        "x",
        None,
        HypeLevel::VeryHigh
      ),
      release(
        "dated",
        "x",
        Some(Duration::days(1)),
        HypeLevel::VeryHigh
      ),
      release(
        "n2",
        "x",
        None,
        HypeLevel::Normal
      ),
    ];
    assert_eq!(
      ids(&undated(&releases)),
      vec!["vh", "n1", "n2"]
    );
  }

  #[test]
  fn empty_collection_gives_empty_feeds()
  {
    assert!(
      upcoming(&[], now(), 10)
        .is_empty()
    );
    assert!(
      hype_future(
        &[],
        now(),
        default_hype_grace()
      )
      .is_empty()
    );
    assert!(undated(&[]).is_empty());
    assert!(
      search(&[], "x", now())
        .is_empty()
    );
  }
}
