use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HypeLevel {
    VeryHigh,
    High,
    Normal,
    Unrecognized(String),
}

impl HypeLevel {
    /// Accepts the English labels and the Portuguese ones found in older
    /// payloads. Anything else ranks lowest.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "very-high" | "very_high" | "veryhigh" | "altissimo" => Self::VeryHigh,
            "high" | "alto" => Self::High,
            "normal" | "medio" => Self::Normal,
            _ => Self::Unrecognized(raw.to_string()),
        }
    }

    pub fn weight(&self) -> u8 {
        match self {
            Self::VeryHigh => 3,
            Self::High => 2,
            Self::Normal => 1,
            Self::Unrecognized(_) => 0,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::VeryHigh => "very-high",
            Self::High => "high",
            Self::Normal => "normal",
            Self::Unrecognized(raw) => raw.as_str(),
        }
    }
}

impl Default for HypeLevel {
    fn default() -> Self {
        Self::Unrecognized(String::new())
    }
}

impl fmt::Display for HypeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An absolute release instant plus the calendar day it falls on in the
/// project timezone. Grid bucketing only ever looks at `day`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseDate {
    pub instant: DateTime<Utc>,
    pub day: NaiveDate,
}

impl ReleaseDate {
    pub fn new(instant: DateTime<Utc>, tz: &Tz) -> Self {
        Self {
            instant,
            day: instant.with_timezone(tz).date_naive(),
        }
    }

    pub fn utc(instant: DateTime<Utc>) -> Self {
        Self {
            instant,
            day: instant.date_naive(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Release {
    pub id: String,
    pub title: String,
    pub release_date: Option<ReleaseDate>,
    pub hype: HypeLevel,
    pub kind: String,
    pub platforms: Vec<String>,
}

impl Release {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            release_date: None,
            hype: HypeLevel::Normal,
            kind: String::new(),
            platforms: vec![],
        }
    }

    pub fn instant(&self) -> Option<DateTime<Utc>> {
        self.release_date.map(|date| date.instant)
    }

    pub fn day(&self) -> Option<NaiveDate> {
        self.release_date.map(|date| date.day)
    }

    pub fn is_tba(&self) -> bool {
        self.release_date.is_none()
    }

    pub fn hype_weight(&self) -> u8 {
        self.hype.weight()
    }

    pub fn matches_title(&self, needle_lower: &str) -> bool {
        self.title.to_lowercase().contains(needle_lower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hype_labels_map_to_weights() {
        assert_eq!(HypeLevel::parse("very-high").weight(), 3);
        assert_eq!(HypeLevel::parse("ALTISSIMO").weight(), 3);
        assert_eq!(HypeLevel::parse("high").weight(), 2);
        assert_eq!(HypeLevel::parse(" normal ").weight(), 1);
        assert_eq!(HypeLevel::parse("legendary").weight(), 0);
        assert_eq!(HypeLevel::parse("").weight(), 0);
    }

    #[test]
    fn unrecognized_hype_keeps_its_label() {
        let hype = HypeLevel::parse("mega");
        assert_eq!(hype, HypeLevel::Unrecognized("mega".to_string()));
        assert_eq!(hype.to_string(), "mega");
    }

    #[test]
    fn release_day_follows_timezone() {
        let instant = DateTime::parse_from_rfc3339("2026-03-01T02:00:00Z")
            .expect("valid instant")
            .with_timezone(&Utc);
        let date = ReleaseDate::new(instant, &chrono_tz::America::Sao_Paulo);
        assert_eq!(
            date.day,
            NaiveDate::from_ymd_opt(2026, 2, 28).expect("valid date")
        );
        assert_eq!(
            ReleaseDate::utc(instant).day,
            NaiveDate::from_ymd_opt(2026, 3, 1).expect("valid date")
        );
    }

    #[test]
    fn title_match_is_case_insensitive() {
        let release = Release::new("gta6", "Grand Theft Auto VI");
        assert!(release.matches_title("theft auto"));
        assert!(!release.matches_title("zelda"));
    }
}
