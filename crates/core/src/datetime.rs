//! Datetime bounds and temporal intervals.

use crate::{Collection, Error, Item, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// A possibly-open datetime interval.
///
/// `None` means unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatetimeBounds {
    /// The start of the interval.
    pub start: Option<DateTime<Utc>>,

    /// The end of the interval.
    pub end: Option<DateTime<Utc>>,
}

/// Implemented by entities that carry a temporal interval.
pub trait Temporal {
    /// Returns this entity's `(start, end)` interval.
    ///
    /// Values that can't be parsed are treated as absent.
    fn datetime_interval(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>);
}

impl DatetimeBounds {
    /// Creates new bounds.
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> DatetimeBounds {
        DatetimeBounds { start, end }
    }

    /// Returns bounds that are open on both sides.
    pub fn unbounded() -> DatetimeBounds {
        DatetimeBounds::default()
    }

    /// Returns true if neither side is bounded.
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Returns true if the interval `[start, end]` overlaps these bounds.
    ///
    /// An open end, on either the interval or the bounds, always satisfies
    /// that side's comparison.
    ///
    /// # Examples
    ///
    /// ```
    /// use stac_map::DatetimeBounds;
    ///
    /// let bounds: DatetimeBounds = "2020-01-01/2020-12-31".parse().unwrap();
    /// let start = "2020-06-01T00:00:00Z".parse().ok();
    /// assert!(bounds.overlaps(start, None));
    /// assert!(bounds.overlaps(None, None));
    /// ```
    pub fn overlaps(&self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> bool {
        let starts_before_end = match (start, self.end) {
            (Some(start), Some(bound)) => start <= bound,
            _ => true,
        };
        let ends_after_start = match (end, self.start) {
            (Some(end), Some(bound)) => end >= bound,
            _ => true,
        };
        starts_before_end && ends_after_start
    }

    /// Widens these bounds to include the given interval, ignoring open ends.
    pub fn extend(&mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) {
        if let Some(start) = start {
            self.start = Some(self.start.map_or(start, |current| current.min(start)));
        }
        if let Some(end) = end {
            self.end = Some(self.end.map_or(end, |current| current.max(end)));
        }
    }
}

/// Folds over entities taking the minimum start and maximum end.
///
/// Returns unbounded bounds if nothing contributes a value.
///
/// # Examples
///
/// ```
/// use stac_map::{Item, datetime};
///
/// let items: Vec<Item> = Vec::new();
/// assert!(datetime::compute_datetime_bounds(&items).is_unbounded());
/// ```
pub fn compute_datetime_bounds<'a, T, I>(entities: I) -> DatetimeBounds
where
    T: Temporal + 'a,
    I: IntoIterator<Item = &'a T>,
{
    entities
        .into_iter()
        .fold(DatetimeBounds::unbounded(), |mut bounds, entity| {
            let (start, end) = entity.datetime_interval();
            bounds.extend(start, end);
            bounds
        })
}

/// Parses a datetime that starts an interval.
///
/// RFC 3339 values are used as-is; plain dates are the start of that day.
pub fn parse_start(s: &str) -> Result<DateTime<Utc>> {
    parse_with_time(s, NaiveTime::MIN)
}

/// Parses a datetime that ends an interval.
///
/// RFC 3339 values are used as-is; plain dates are the end of that day.
pub fn parse_end(s: &str) -> Result<DateTime<Utc>> {
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).ok_or(Error::InvalidDatetime(s.into()))?;
    parse_with_time(s, end_of_day)
}

fn parse_with_time(s: &str, time: NaiveTime) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(datetime) = DateTime::parse_from_rfc3339(s) {
        Ok(datetime.with_timezone(&Utc))
    } else if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        Ok(date.and_time(time).and_utc())
    } else {
        Err(Error::InvalidDatetime(s.to_string()))
    }
}

fn parse_optional(s: Option<&str>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|datetime| datetime.with_timezone(&Utc))
}

impl FromStr for DatetimeBounds {
    type Err = Error;

    fn from_str(s: &str) -> Result<DatetimeBounds> {
        if let Some((start, end)) = s.split_once('/') {
            let start = if start.is_empty() || start == ".." {
                None
            } else {
                Some(parse_start(start)?)
            };
            let end = if end.is_empty() || end == ".." {
                None
            } else {
                Some(parse_end(end)?)
            };
            if let (Some(start), Some(end)) = (start, end)
                && end < start
            {
                return Err(Error::StartIsAfterEnd {
                    start: start.to_rfc3339(),
                    end: end.to_rfc3339(),
                });
            }
            Ok(DatetimeBounds { start, end })
        } else {
            Ok(DatetimeBounds {
                start: Some(parse_start(s)?),
                end: Some(parse_end(s)?),
            })
        }
    }
}

impl Display for DatetimeBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let format = |datetime: Option<DateTime<Utc>>| {
            datetime
                .map(|datetime| datetime.to_rfc3339_opts(SecondsFormat::AutoSi, true))
                .unwrap_or_else(|| "..".to_string())
        };
        write!(f, "{}/{}", format(self.start), format(self.end))
    }
}

impl Temporal for Collection {
    fn datetime_interval(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        self.extent
            .temporal
            .interval
            .first()
            .map(|[start, end]| (parse_optional(start.as_deref()), parse_optional(end.as_deref())))
            .unwrap_or_default()
    }
}

impl Temporal for Item {
    fn datetime_interval(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let datetime = parse_optional(self.property_str("datetime"));
        let start = parse_optional(self.property_str("start_datetime")).or(datetime);
        let end = parse_optional(self.property_str("end_datetime")).or(datetime);
        (start, end)
    }
}
