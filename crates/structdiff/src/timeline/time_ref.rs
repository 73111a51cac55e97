//! Symbolic timeline selectors.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const LAST_PUBLISHED: &str = "@lastPublished";
pub const LATEST: &str = "-";

/// A reference to a point in a document's history.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimeRef {
    /// The most recent publish.
    LastPublished,
    /// The most recent chunk.
    Latest,
    /// A chunk id, or the id of any transaction inside a chunk.
    Id(String),
    /// The chunk that was current at this instant.
    Time(DateTime<Utc>),
}

impl FromStr for TimeRef {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            LAST_PUBLISHED => TimeRef::LastPublished,
            LATEST => TimeRef::Latest,
            _ => match DateTime::parse_from_rfc3339(s) {
                Ok(t) => TimeRef::Time(t.with_timezone(&Utc)),
                Err(_) => TimeRef::Id(s.to_string()),
            },
        })
    }
}

impl From<&str> for TimeRef {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(r) => r,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for TimeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeRef::LastPublished => f.write_str(LAST_PUBLISHED),
            TimeRef::Latest => f.write_str(LATEST),
            TimeRef::Id(id) => f.write_str(id),
            TimeRef::Time(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

impl Serialize for TimeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(TimeRef::from(s.as_str()))
    }
}
