//! Session view state and the navigation surface the presentation layer
//! drives.
//!
//! The controller owns the only mutable state of a session. Grid and feeds
//! are derived from the release index plus [`ViewState`] and are never
//! edited directly.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument, trace};

use crate::countdown::{Countdown, remaining};
use crate::grid::{self, CalendarDay, GridOptions, MonthAnchor};
use crate::index::ReleaseIndex;
use crate::ranking::{self, DEFAULT_UPCOMING_LIMIT};
use crate::release::Release;

/// Terminal widths below this render the five-column grid.
pub const COMPACT_BREAKPOINT_COLUMNS: usize = 100;

pub fn is_compact_width(columns: usize) -> bool {
    columns < COMPACT_BREAKPOINT_COLUMNS
}

/// Orientation of the most recent month change. Has no ranking effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaginationDirection {
    Backward,
    #[default]
    Still,
    Forward,
}

impl PaginationDirection {
    pub fn between(from: MonthAnchor, to: MonthAnchor) -> Self {
        match to.cmp(&from) {
            Ordering::Less => Self::Backward,
            Ordering::Equal => Self::Still,
            Ordering::Greater => Self::Forward,
        }
    }

    pub fn signum(self) -> i8 {
        match self {
            Self::Backward => -1,
            Self::Still => 0,
            Self::Forward => 1,
        }
    }
}

/// External addressable state holding the selected release id, e.g. a URL
/// query parameter.
pub trait SelectionStore {
    fn selected_id(&self) -> Option<String>;
    fn set_selected_id(&mut self, id: Option<&str>);
}

/// [`SelectionStore`] backed by a URL-style query string. Parameters other
/// than `id` are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParamSelection {
    params: Vec<(String, String)>,
}

impl QueryParamSelection {
    const KEY: &'static str = "id";

    pub fn from_query(raw: &str) -> Self {
        let params = raw
            .trim_start_matches('?')
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                (percent_decode(k), percent_decode(v))
            })
            .collect();
        Self { params }
    }

    pub fn to_query(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl SelectionStore for QueryParamSelection {
    fn selected_id(&self) -> Option<String> {
        self.params
            .iter()
            .find(|(k, _)| k == Self::KEY)
            .map(|(_, v)| v.clone())
            .filter(|v| !v.is_empty())
    }

    fn set_selected_id(&mut self, id: Option<&str>) {
        self.params.retain(|(k, _)| k != Self::KEY);
        if let Some(id) = id {
            self.params.push((Self::KEY.to_string(), id.to_string()));
        }
    }
}

fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len()
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit() =>
            {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                        continue;
                    }
                    None => out.push(b'%'),
                }
            }
            other => out.push(other),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn percent_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct ViewOptions {
    pub grid: GridOptions,
    pub upcoming_limit: usize,
    pub hype_grace: Duration,
    pub timezone: Tz,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            grid: GridOptions::default(),
            upcoming_limit: DEFAULT_UPCOMING_LIMIT,
            hype_grace: ranking::default_hype_grace(),
            timezone: chrono_tz::UTC,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub anchor_month: MonthAnchor,
    pub pagination_direction: PaginationDirection,
    pub selected_release_id: Option<String>,
    pub selected_day: Option<NaiveDate>,
    pub search_query: String,
    pub is_compact_layout: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct GridKey {
    anchor: MonthAnchor,
    version: u64,
    compact: bool,
    today: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SearchKey {
    query: String,
    version: u64,
    now: DateTime<Utc>,
}

/// Owns [`ViewState`] for one session and answers every read the
/// presentation layer makes.
///
/// Transitions:
///
/// - `next_month` / `prev_month` / `jump_to_today` / `show_month` move the
///   anchor and record the pagination direction.
/// - `select_day` opens a day detail only when that day has releases.
/// - `select_release` opens a release detail, re-anchoring to its month.
///   It clears the search query and any day detail.
/// - `deselect` closes the release detail.
#[derive(Debug)]
pub struct ViewStateController<S: SelectionStore> {
    index: ReleaseIndex,
    releases_version: u64,
    state: ViewState,
    selection: S,
    options: ViewOptions,
    grid_cache: Option<(GridKey, Vec<CalendarDay>)>,
    search_cache: Option<(SearchKey, Vec<Release>)>,
}

impl<S: SelectionStore> ViewStateController<S> {
    #[instrument(skip_all)]
    pub fn new(index: ReleaseIndex, selection: S, options: ViewOptions, now: DateTime<Utc>) -> Self {
        let anchor_month = MonthAnchor::containing(local_day(now, &options.timezone));
        let selected_release_id = selection.selected_id();
        info!(
            releases = index.len(),
            anchor = %anchor_month,
            selected = ?selected_release_id,
            "view session started"
        );
        Self {
            index,
            releases_version: 0,
            state: ViewState {
                anchor_month,
                pagination_direction: PaginationDirection::Still,
                selected_release_id,
                selected_day: None,
                search_query: String::new(),
                is_compact_layout: options.grid.compact,
            },
            selection,
            options,
            grid_cache: None,
            search_cache: None,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn index(&self) -> &ReleaseIndex {
        &self.index
    }

    pub fn selection(&self) -> &S {
        &self.selection
    }

    pub fn options(&self) -> &ViewOptions {
        &self.options
    }

    pub fn releases_version(&self) -> u64 {
        self.releases_version
    }

    /// Replaces the collection wholesale.
    #[instrument(skip_all, fields(releases = index.len()))]
    pub fn reload(&mut self, index: ReleaseIndex) {
        self.index = index;
        self.releases_version += 1;
        if let Some(day) = self.state.selected_day
            && !self.index.has_releases_on(day)
        {
            self.state.selected_day = None;
        }
        debug!(version = self.releases_version, "release collection reloaded");
    }

    pub fn next_month(&mut self) {
        self.move_anchor(self.state.anchor_month.shift(1));
    }

    pub fn prev_month(&mut self) {
        self.move_anchor(self.state.anchor_month.shift(-1));
    }

    pub fn jump_to_today(&mut self, now: DateTime<Utc>) {
        let target = MonthAnchor::containing(self.today(now));
        self.move_anchor(target);
    }

    pub fn show_month(&mut self, target: MonthAnchor) {
        self.move_anchor(target);
    }

    fn move_anchor(&mut self, target: MonthAnchor) {
        self.state.pagination_direction = PaginationDirection::between(self.state.anchor_month, target);
        debug!(
            from = %self.state.anchor_month,
            to = %target,
            direction = self.state.pagination_direction.signum(),
            "anchor month changed"
        );
        self.state.anchor_month = target;
    }

    /// Opens the day detail. Days without releases are ignored.
    pub fn select_day(&mut self, day: NaiveDate) -> bool {
        if !self.index.has_releases_on(day) {
            debug!(%day, "day has no releases; selection unchanged");
            return false;
        }
        self.state.selected_day = Some(day);
        self.state.selected_release_id = None;
        self.selection.set_selected_id(None);
        debug!(%day, "day selected");
        true
    }

    pub fn select_release(&mut self, id: &str) -> bool {
        let Some(release) = self.index.get(id) else {
            debug!(id, "unknown release id; clearing selection");
            self.state.selected_release_id = None;
            self.selection.set_selected_id(None);
            return false;
        };
        let release_id = release.id.clone();
        let release_day = release.day();

        if let Some(day) = release_day {
            self.move_anchor(MonthAnchor::containing(day));
        }
        self.state.selected_release_id = Some(release_id.clone());
        self.state.selected_day = None;
        self.state.search_query.clear();
        self.selection.set_selected_id(Some(&release_id));
        debug!(id = %release_id, "release selected");
        true
    }

    pub fn deselect(&mut self) {
        self.state.selected_release_id = None;
        self.selection.set_selected_id(None);
        debug!("release deselected");
    }

    /// Picks up a selection changed outside the controller, e.g. an edited
    /// URL.
    pub fn sync_selection(&mut self) {
        self.state.selected_release_id = self.selection.selected_id();
    }

    pub fn set_search_query(&mut self, text: &str) {
        self.state.search_query = text.to_string();
    }

    pub fn set_compact_layout(&mut self, compact: bool) {
        self.state.is_compact_layout = compact;
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        local_day(now, &self.options.timezone)
    }

    pub fn grid(&mut self, now: DateTime<Utc>) -> &[CalendarDay] {
        let key = GridKey {
            anchor: self.state.anchor_month,
            version: self.releases_version,
            compact: self.state.is_compact_layout,
            today: self.today(now),
        };

        let fresh = matches!(&self.grid_cache, Some((cached, _)) if *cached == key);
        if fresh {
            trace!("grid cache hit");
        } else {
            let options = GridOptions {
                compact: key.compact,
                ..self.options.grid
            };
            let days = grid::build_grid(self.index.releases(), key.anchor, &options, key.today);
            self.grid_cache = Some((key, days));
        }

        self.grid_cache
            .as_ref()
            .map(|(_, days)| days.as_slice())
            .unwrap_or_default()
    }

    pub fn search_results(&mut self, now: DateTime<Utc>) -> &[Release] {
        let key = SearchKey {
            query: self.state.search_query.clone(),
            version: self.releases_version,
            now,
        };

        let fresh = matches!(&self.search_cache, Some((cached, _)) if *cached == key);
        if fresh {
            trace!("search cache hit");
        } else {
            let hits = ranking::search(self.index.releases(), &key.query, now);
            self.search_cache = Some((key, hits));
        }

        self.search_cache
            .as_ref()
            .map(|(_, hits)| hits.as_slice())
            .unwrap_or_default()
    }

    pub fn upcoming(&self, now: DateTime<Utc>) -> Vec<Release> {
        ranking::upcoming(self.index.releases(), now, self.options.upcoming_limit)
    }

    pub fn hype_future(&self, now: DateTime<Utc>) -> Vec<Release> {
        ranking::hype_future(self.index.releases(), now, self.options.hype_grace)
    }

    pub fn undated(&self) -> Vec<Release> {
        ranking::undated(self.index.releases())
    }

    pub fn selected_release(&self) -> Option<&Release> {
        let id = self.selection.selected_id()?;
        self.index.get(&id)
    }

    pub fn day_detail(&self) -> Vec<Release> {
        self.state
            .selected_day
            .map(|day| grid::day_detail(self.index.releases(), day))
            .unwrap_or_default()
    }

    pub fn active_countdown(&self, now: DateTime<Utc>) -> Option<Countdown> {
        remaining(self.selected_release()?.instant(), now)
    }
}

fn local_day(now: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    now.with_timezone(tz).date_naive()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::release::{HypeLevel, ReleaseDate};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0)
            .single()
            .expect("valid now")
    }

    fn month(y: i32, m: u32) -> MonthAnchor {
        MonthAnchor::new(y, m).expect("valid month")
    }

    fn fixture() -> ReleaseIndex {
        let mut a = Release::new("a", "Alpha Strike");
        a.release_date = Some(ReleaseDate::utc(now() + Duration::days(5)));
        a.hype = HypeLevel::VeryHigh;

        let mut b = Release::new("b", "Beta Saga");
        b.release_date = Some(ReleaseDate::utc(now() - Duration::days(5)));

        let mut c = Release::new("c", "Gamma Chronicles");
        c.hype = HypeLevel::High;

        let mut far = Release::new("far", "Far Horizon");
        far.release_date = Some(ReleaseDate::utc(
            Utc.with_ymd_and_hms(2027, 3, 9, 18, 0, 0)
                .single()
                .expect("valid instant"),
        ));

        ReleaseIndex::new(vec![a, b, c, far])
    }

    fn controller() -> ViewStateController<QueryParamSelection> {
        ViewStateController::new(
            fixture(),
            QueryParamSelection::default(),
            ViewOptions::default(),
            now(),
        )
    }

    #[test]
    fn starts_on_current_month_without_selection() {
        let view = controller();
        assert_eq!(view.state().anchor_month, month(2026, 10));
        assert_eq!(view.state().pagination_direction, PaginationDirection::Still);
        assert!(view.state().selected_release_id.is_none());
        assert!(view.state().selected_day.is_none());
        assert!(view.selected_release().is_none());
    }

    #[test]
    fn paging_records_direction() {
        let mut view = controller();
        view.next_month();
        assert_eq!(view.state().anchor_month, month(2026, 11));
        assert_eq!(view.state().pagination_direction.signum(), 1);

        view.prev_month();
        view.prev_month();
        assert_eq!(view.state().anchor_month, month(2026, 9));
        assert_eq!(view.state().pagination_direction.signum(), -1);

        view.jump_to_today(now());
        assert_eq!(view.state().anchor_month, month(2026, 10));
        assert_eq!(view.state().pagination_direction, PaginationDirection::Forward);

        view.jump_to_today(now());
        assert_eq!(view.state().pagination_direction, PaginationDirection::Still);
    }

    #[test]
    fn selecting_release_reanchors_and_clears() {
        let mut view = controller();
        view.set_search_query("far");
        let day = now().date_naive() + Duration::days(5);
        assert!(view.select_day(day));

        assert!(view.select_release("far"));
        let state = view.state();
        assert_eq!(state.anchor_month, month(2027, 3));
        assert_eq!(state.pagination_direction, PaginationDirection::Forward);
        assert_eq!(state.selected_release_id.as_deref(), Some("far"));
        assert!(state.selected_day.is_none());
        assert!(state.search_query.is_empty());
        assert_eq!(view.selection().to_query(), "id=far");

        assert!(view.select_release("b"));
        assert_eq!(view.state().anchor_month, month(2026, 10));
        assert_eq!(view.state().pagination_direction, PaginationDirection::Backward);
    }

    #[test]
    fn undated_selection_keeps_anchor() {
        let mut view = controller();
        view.next_month();
        assert!(view.select_release("c"));
        assert_eq!(view.state().anchor_month, month(2026, 11));
        assert!(view.active_countdown(now()).is_none());
        assert_eq!(view.selected_release().map(|r| r.id.as_str()), Some("c"));
    }

    #[test]
    fn unknown_ids_and_empty_days_are_noops() {
        let mut view = controller();
        assert!(view.select_release("a"));
        assert!(!view.select_release("missing"));
        assert!(view.state().selected_release_id.is_none());
        assert!(view.selected_release().is_none());

        let empty_day = NaiveDate::from_ymd_opt(2026, 10, 1).expect("valid date");
        assert!(!view.select_day(empty_day));
        assert!(view.state().selected_day.is_none());
        assert!(view.day_detail().is_empty());
    }

    #[test]
    fn selecting_day_clears_release() {
        let mut view = controller();
        assert!(view.select_release("a"));
        let day = now().date_naive() + Duration::days(5);
        assert!(view.select_day(day));
        assert!(view.state().selected_release_id.is_none());
        assert!(view.selection().selected_id().is_none());
        let detail = view.day_detail();
        assert_eq!(detail.len(), 1);
        assert_eq!(detail[0].id, "a");
    }

    #[test]
    fn countdown_tracks_selected_release() {
        let mut view = controller();
        assert!(view.select_release("a"));
        let left = view.active_countdown(now()).expect("a is in the future");
        assert_eq!(left.days, 5);
        assert!(view.active_countdown(now() + Duration::days(6)).is_none());
        view.deselect();
        assert!(view.active_countdown(now()).is_none());
        assert_eq!(view.selection().to_query(), "");
    }

    #[test]
    fn grid_cache_follows_reload_and_layout() {
        let mut view = controller();
        let populated = view.grid(now()).iter().filter(|d| !d.is_empty()).count();
        assert_eq!(populated, 2);
        assert_eq!(view.grid(now()).len(), 35);

        view.set_compact_layout(true);
        assert_eq!(view.grid(now()).len(), 25);

        view.reload(ReleaseIndex::empty());
        assert_eq!(view.releases_version(), 1);
        assert!(view.grid(now()).iter().all(CalendarDay::is_empty));
        assert!(view.upcoming(now()).is_empty());
        assert!(view.hype_future(now()).is_empty());
        assert!(view.undated().is_empty());
        view.set_search_query("a");
        assert!(view.search_results(now()).is_empty());
    }

    #[test]
    fn search_results_follow_query() {
        let mut view = controller();
        view.set_search_query("A");
        let ids: Vec<String> = view
            .search_results(now())
            .iter()
            .map(|r| r.id.clone())
            .collect();
        assert_eq!(ids, vec!["a", "c", "far", "b"]);

        view.set_search_query("  ");
        assert!(view.search_results(now()).is_empty());
    }

    #[test]
    fn deep_link_selection_is_resolved() {
        let view = ViewStateController::new(
            fixture(),
            QueryParamSelection::from_query("?ref=home&id=far"),
            ViewOptions::default(),
            now(),
        );
        assert_eq!(view.state().selected_release_id.as_deref(), Some("far"));
        assert_eq!(view.selected_release().map(|r| r.title.as_str()), Some("Far Horizon"));
        assert_eq!(view.state().anchor_month, month(2026, 10));
    }

    #[test]
    fn query_selection_preserves_other_params() {
        let mut store = QueryParamSelection::from_query("tab=hype&id=old%20one");
        assert_eq!(store.selected_id().as_deref(), Some("old one"));
        store.set_selected_id(Some("new/id"));
        assert_eq!(store.to_query(), "tab=hype&id=new%2Fid");
        store.set_selected_id(None);
        assert_eq!(store.to_query(), "tab=hype");
        assert!(QueryParamSelection::from_query("id=").selected_id().is_none());
    }

    #[test]
    fn malformed_escapes_stay_literal() {
        let store = QueryParamSelection::from_query("id=a%+5b");
        assert_eq!(store.selected_id().as_deref(), Some("a% 5b"));
        let store = QueryParamSelection::from_query("id=%zz%4");
        assert_eq!(store.selected_id().as_deref(), Some("%zz%4"));
    }

    #[test]
    fn compact_breakpoint() {
        assert!(is_compact_width(80));
        assert!(!is_compact_width(COMPACT_BREAKPOINT_COLUMNS));
    }
}
