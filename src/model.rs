//! Types shared between the REST client and the photo loader.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseRefError;

/// A photo or video as returned by the gallery backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    /// Capture time, as wall-clock time where the photo was taken
    #[serde(deserialize_with = "iso_timestamp")]
    pub timestamp: NaiveDateTime,
    #[serde(default)]
    pub is_video: bool,
    #[serde(default)]
    pub directory_id: Option<i64>,
}

/// Date range and size of a browsable collection, as known when it was fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    #[serde(default, deserialize_with = "iso_date")]
    pub min_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "iso_date")]
    pub max_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub number_of_photos: u64,
}

impl Container {
    pub fn new(min_date: Option<NaiveDate>, max_date: Option<NaiveDate>, number_of_photos: u64) -> Self {
        Self {
            min_date,
            max_date,
            number_of_photos,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.number_of_photos == 0
    }
}

/// Accepts `YYYY-MM-DD` as well as full ISO 8601 timestamps; only the date is kept.
fn iso_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_iso_date(s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {}", s))),
    }
}

/// Accepts naive timestamps and RFC 3339 ones with an offset, which keep their local time.
fn iso_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_iso_timestamp(raw.trim())
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or(0))
}

pub(crate) fn parse_iso_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

pub(crate) fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    // Timestamps without an offset, e.g. "2020-01-31T10:00:00" or "2020-01-31T10:00:00.123"
    s.get(..10)
        .filter(|_| s.as_bytes().get(10) == Some(&b'T') || s.as_bytes().get(10) == Some(&b' '))
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = ParseRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(ParseRefError::SortOrder(s.to_string())),
        }
    }
}

/// Identifies one browsable container on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContainerRef {
    Directory(i64),
    Gallery(i64),
    Place(i64),
    FaceName(i64),
    Favorites,
    Search(String),
}

impl ContainerRef {
    /// Resource path relative to the API base URL.
    pub fn resource_path(&self) -> String {
        match self {
            ContainerRef::Directory(id) => format!("directories/{}", id),
            ContainerRef::Gallery(id) => format!("galleries/{}", id),
            ContainerRef::Place(id) => format!("places/{}", id),
            ContainerRef::FaceName(id) => format!("face-names/{}", id),
            ContainerRef::Favorites => "favorites".to_string(),
            ContainerRef::Search(_) => "search".to_string(),
        }
    }

    /// Extra query parameters identifying the container, if any.
    pub fn query(&self) -> Option<(&'static str, &str)> {
        match self {
            ContainerRef::Search(q) => Some(("q", q.as_str())),
            _ => None,
        }
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerRef::Directory(id) => write!(f, "directory:{}", id),
            ContainerRef::Gallery(id) => write!(f, "gallery:{}", id),
            ContainerRef::Place(id) => write!(f, "place:{}", id),
            ContainerRef::FaceName(id) => write!(f, "face:{}", id),
            ContainerRef::Favorites => f.write_str("favorites"),
            ContainerRef::Search(q) => write!(f, "search:{}", q),
        }
    }
}

impl FromStr for ContainerRef {
    type Err = ParseRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, value) = match s.split_once(':') {
            Some((kind, value)) => (kind, Some(value)),
            None => (s, None),
        };

        let id = |value: Option<&str>| -> Result<i64, ParseRefError> {
            let value = value.ok_or_else(|| ParseRefError::MissingValue(kind.to_string()))?;
            value
                .trim()
                .parse()
                .map_err(|_| ParseRefError::InvalidId(value.to_string()))
        };

        match kind.to_ascii_lowercase().as_str() {
            "directory" | "dir" => Ok(ContainerRef::Directory(id(value)?)),
            "gallery" => Ok(ContainerRef::Gallery(id(value)?)),
            "place" => Ok(ContainerRef::Place(id(value)?)),
            "face" | "face-name" => Ok(ContainerRef::FaceName(id(value)?)),
            "favorites" => Ok(ContainerRef::Favorites),
            "search" => match value.map(str::trim) {
                Some(q) if !q.is_empty() => Ok(ContainerRef::Search(q.to_string())),
                _ => Err(ParseRefError::MissingValue(kind.to_string())),
            },
            _ => Err(ParseRefError::UnknownKind(kind.to_string())),
        }
    }
}
