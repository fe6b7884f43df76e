//! Challenge identifiers and the weekly schedule they are published on.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Days, Local, NaiveDate};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result, ORIGIN_ID, WEEK_DAYS};

const ID_FORMAT: &str = "%Y%m%d";

/// A `YYYYMMDD` identifier, equal to the challenge's publication date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChallengeId(NaiveDate);

impl ChallengeId {
    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The first challenge ever published.
    pub fn origin() -> Self {
        // ORIGIN_ID is a valid literal, checked by `test_origin_is_valid`.
        ORIGIN_ID.parse().unwrap_or(Self(NaiveDate::MIN))
    }

    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    /// Human readable form stored in the record's `date` field.
    pub fn display_date(&self) -> String {
        self.0.format("%B %d,%Y").to_string()
    }

    fn next_week(&self) -> Option<Self> {
        self.0.checked_add_days(Days::new(WEEK_DAYS)).map(Self)
    }
}

impl FromStr for ChallengeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidDateFormat(s.to_string()));
        }
        NaiveDate::parse_from_str(s, ID_FORMAT)
            .map(Self)
            .map_err(|_| Error::InvalidDateFormat(s.to_string()))
    }
}

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(ID_FORMAT))
    }
}

impl Serialize for ChallengeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChallengeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        // Older collections stored the id as a bare number.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        let raw = match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s,
            Raw::Number(n) => n.to_string(),
        };
        raw.trim().parse().map_err(de::Error::custom)
    }
}

/// Where the ids of a batch come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Weekly { start: ChallengeId, end: ChallengeId },
    List(Vec<ChallengeId>),
}

impl Schedule {
    /// Weekly ids from `start` up to and including `end`.
    pub fn weekly(start: ChallengeId, end: ChallengeId) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidRange { start, end });
        }
        Ok(Schedule::Weekly { start, end })
    }

    /// Builds a weekly schedule from optional `YYYYMMDD` boundaries,
    /// defaulting to the origin and today.
    pub fn from_bounds(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let start = start
            .map(str::parse::<ChallengeId>)
            .transpose()?
            .unwrap_or_else(ChallengeId::origin);
        let end = end
            .map(str::parse::<ChallengeId>)
            .transpose()?
            .unwrap_or_else(ChallengeId::today);
        Self::weekly(start, end)
    }

    /// Explicit ids, deduplicated while keeping the first occurrence.
    pub fn list<I: IntoIterator<Item = ChallengeId>>(ids: I) -> Self {
        let mut seen = HashSet::new();
        Schedule::List(ids.into_iter().filter(|id| seen.insert(*id)).collect())
    }

    /// Parses a comma separated list such as `20051013, 20051020`.
    pub fn parse_list(s: &str) -> Result<Self> {
        let ids = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse::<ChallengeId>)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::list(ids))
    }

    /// A fresh iterator over the schedule. Can be called any number of times.
    pub fn iter(&self) -> Ids<'_> {
        match self {
            Schedule::Weekly { start, end } => Ids::Weekly(WeeklyIds {
                next: Some(*start),
                end: *end,
            }),
            Schedule::List(ids) => Ids::List(ids.iter()),
        }
    }
}

impl<'a> IntoIterator for &'a Schedule {
    type Item = ChallengeId;
    type IntoIter = Ids<'a>;

    fn into_iter(self) -> Ids<'a> {
        self.iter()
    }
}

/// Lazy walk over a date range in steps of exactly one week.
#[derive(Debug, Clone)]
pub struct WeeklyIds {
    next: Option<ChallengeId>,
    end: ChallengeId,
}

impl Iterator for WeeklyIds {
    type Item = ChallengeId;

    fn next(&mut self) -> Option<ChallengeId> {
        let current = self.next.filter(|id| *id <= self.end)?;
        self.next = current.next_week();
        Some(current)
    }
}

#[derive(Debug, Clone)]
pub enum Ids<'a> {
    Weekly(WeeklyIds),
    List(std::slice::Iter<'a, ChallengeId>),
}

impl Iterator for Ids<'_> {
    type Item = ChallengeId;

    fn next(&mut self) -> Option<ChallengeId> {
        match self {
            Ids::Weekly(w) => w.next(),
            Ids::List(l) => l.next().copied(),
        }
    }
}
