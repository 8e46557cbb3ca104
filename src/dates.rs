use chrono::{Datelike, NaiveDate};
use std::ops::RangeInclusive;

use crate::errors::IndexerError;
use crate::types::YearMonth;

/// Inclusive calendar date range. `start <= end` always holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DateRange {
    /// First day covered.
    pub start: NaiveDate,
    /// Last day covered.
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, IndexerError> {
        if start > end {
            return Err(IndexerError::DateParse {
                input: format!("{start}/{end}"),
                reason: "range starts after it ends".to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Every calendar year touched by the range, in order.
    pub fn years(&self) -> RangeInclusive<i32> {
        self.start.year()..=self.end.year()
    }
}

/// Turns a free-text date expression into a [`DateRange`].
pub trait DateRangeParser: Send + Sync {
    /// Parse `input`, failing with `IndexerError::DateParse`.
    fn parse(&self, input: &str) -> Result<DateRange, IndexerError>;
}

/// Parser for already-structured date strings.
///
/// Accepts `YYYY`, `YYYY-MM` and `YYYY-MM-DD` (a leading `-` marks a BCE year),
/// and ranges `A/B` of those forms. A partial date used as a start widens to its
/// first day, as an end to its last day, so `1843` covers the whole year.
#[derive(Clone, Copy, Debug, Default)]
pub struct StructuredDateParser;

#[derive(Clone, Copy, Debug)]
struct PartialDate {
    year: i32,
    month: Option<u32>,
    day: Option<u32>,
}

impl PartialDate {
    fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month.unwrap_or(1), self.day.unwrap_or(1))
    }

    fn last_day(&self) -> Option<NaiveDate> {
        match (self.month, self.day) {
            (Some(month), Some(day)) => NaiveDate::from_ymd_opt(self.year, month, day),
            (Some(12), None) | (None, _) => NaiveDate::from_ymd_opt(self.year, 12, 31),
            (Some(month), None) => NaiveDate::from_ymd_opt(self.year, month + 1, 1)?.pred_opt(),
        }
    }
}

impl DateRangeParser for StructuredDateParser {
    fn parse(&self, input: &str) -> Result<DateRange, IndexerError> {
        let trimmed = input.trim();
        let (start_text, end_text) = trimmed.split_once('/').unwrap_or((trimmed, trimmed));
        let start = parse_partial(start_text.trim())
            .and_then(|date| date.first_day())
            .ok_or_else(|| date_error(input, "unrecognized start date"))?;
        let end = parse_partial(end_text.trim())
            .and_then(|date| date.last_day())
            .ok_or_else(|| date_error(input, "unrecognized end date"))?;
        if start > end {
            return Err(date_error(input, "range starts after it ends"));
        }
        Ok(DateRange { start, end })
    }
}

fn parse_partial(text: &str) -> Option<PartialDate> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let mut parts = body.split('-');
    let year_text = parts.next()?;
    if year_text.is_empty() || year_text.len() > 6 || !year_text.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let year: i32 = year_text.parse().ok()?;
    let month = match parts.next() {
        Some(text) => Some(parse_number(text)?),
        None => None,
    };
    let day = match parts.next() {
        Some(text) => Some(parse_number(text)?),
        None => None,
    };
    if parts.next().is_some() {
        return None;
    }
    if let Some(month) = month
        && !(1..=12).contains(&month)
    {
        return None;
    }
    Some(PartialDate {
        year: if negative { -year } else { year },
        month,
        day,
    })
}

fn parse_number(text: &str) -> Option<u32> {
    if text.is_empty() || text.len() > 2 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn date_error(input: &str, reason: &str) -> IndexerError {
    IndexerError::DateParse {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

/// Month buckets covered by `range`.
///
/// Walks month by month from the start month to the end month. When the cursor
/// sits on January and December of that year is still inside the range, the
/// whole year is emitted as `(year, None)` instead of twelve monthly entries.
pub fn year_months(range: &DateRange) -> Vec<YearMonth> {
    let (mut year, mut month) = (range.start.year(), range.start.month());
    let end = (range.end.year(), range.end.month());
    let mut buckets = Vec::new();
    while (year, month) <= end {
        if month == 1 && (year, 12) <= end {
            buckets.push((year, None));
            year += 1;
        } else {
            buckets.push((year, Some(month)));
            month += 1;
            if month == 13 {
                month = 1;
                year += 1;
            }
        }
    }
    buckets
}
