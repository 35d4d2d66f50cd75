use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::datetime::parse_release_date;
use crate::release::{HypeLevel, Release, ReleaseDate};

const TITLE_KEYS: [&str; 2] = ["title", "titulo"];
const DATE_KEYS: [&str; 3] = ["releaseDate", "release_date", "data"];
const HYPE_KEYS: [&str; 3] = ["hypeLevel", "hype_level", "hype"];
const KIND_KEYS: [&str; 2] = ["kind", "tipo"];
const PLATFORM_KEYS: [&str; 2] = ["platforms", "plataformas"];

/// Validated, read-only release collection.
#[derive(Debug, Clone, Default)]
pub struct ReleaseIndex {
    releases: Vec<Release>,
}

impl ReleaseIndex {
    /// Builds an index from already-validated releases. Later duplicates of
    /// an id are dropped.
    pub fn new(releases: Vec<Release>) -> Self {
        let mut seen = HashSet::new();
        let releases = releases
            .into_iter()
            .filter(|release| {
                let fresh = seen.insert(release.id.clone());
                if !fresh {
                    warn!(id = %release.id, "duplicate release id; keeping first");
                }
                fresh
            })
            .collect();
        Self { releases }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    #[tracing::instrument(skip(tz))]
    pub fn load(path: &Path, tz: &Tz) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read releases from {}", path.display()))?;
        let index = Self::from_json_str(&raw, tz);
        info!(
            file = %path.display(),
            count = index.len(),
            "loaded release collection"
        );
        Ok(index)
    }

    #[tracing::instrument(skip(raw, tz))]
    pub fn from_json_str(raw: &str, tz: &Tz) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Self::from_value(&value, tz),
            Err(err) => {
                warn!(error = %err, "release payload is not valid json; treating as empty");
                Self::empty()
            }
        }
    }

    #[tracing::instrument(skip(value, tz))]
    pub fn from_value(value: &Value, tz: &Tz) -> Self {
        let Some(items) = value.as_array() else {
            warn!("release payload is not an array; treating as empty");
            return Self::empty();
        };

        let releases = items
            .iter()
            .enumerate()
            .filter_map(|(idx, item)| parse_release(idx, item, tz))
            .collect();
        let index = Self::new(releases);
        debug!(
            raw = items.len(),
            kept = index.len(),
            "normalized release payload"
        );
        index
    }

    pub fn releases(&self) -> &[Release] {
        &self.releases
    }

    pub fn get(&self, id: &str) -> Option<&Release> {
        self.releases.iter().find(|release| release.id == id)
    }

    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    pub fn has_releases_on(&self, day: NaiveDate) -> bool {
        self.releases.iter().any(|release| release.day() == Some(day))
    }
}

fn parse_release(idx: usize, item: &Value, tz: &Tz) -> Option<Release> {
    let Some(obj) = item.as_object() else {
        warn!(index = idx, "release entry is not an object; skipping");
        return None;
    };

    let id = match obj.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            warn!(index = idx, "release entry has no usable id; skipping");
            return None;
        }
    };

    let Some(title) = first_str(obj, &TITLE_KEYS)
        .map(str::trim)
        .filter(|title| !title.is_empty())
    else {
        warn!(index = idx, id = %id, "release entry has no title; skipping");
        return None;
    };

    let release_date = first_str(obj, &DATE_KEYS).and_then(|raw| {
        match parse_release_date(raw, tz) {
            Ok(instant) => Some(ReleaseDate::new(instant, tz)),
            Err(err) => {
                debug!(id = %id, error = %err, "release date unusable; treating as TBA");
                None
            }
        }
    });

    let hype = first_str(obj, &HYPE_KEYS)
        .map(HypeLevel::parse)
        .unwrap_or_default();

    let kind = first_str(obj, &KIND_KEYS).unwrap_or_default().to_string();

    let platforms = PLATFORM_KEYS
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_array))
        .map(|items| {
            let mut out: Vec<String> = Vec::with_capacity(items.len());
            for platform in items.iter().filter_map(Value::as_str) {
                if !out.iter().any(|existing| existing == platform) {
                    out.push(platform.to_string());
                }
            }
            out
        })
        .unwrap_or_default();

    Some(Release {
        id,
        title: title.to_string(),
        release_date,
        hype,
        kind,
        platforms,
    })
}

fn first_str<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| obj.get(*key).and_then(Value::as_str))
}
