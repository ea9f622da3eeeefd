use chrono::{
    DateTime, Datelike, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use thiserror::Error;

pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 3;

const TOKEN_FORMAT: &str = "%m-%d %a %H:%M";
const YEAR_WINDOW_MONTHS: u32 = 6;
const LEAP_REFERENCE_YEAR: i32 = 2000;
const MAX_LEAP_SEARCH_YEARS: i32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenParseError {
    #[error("token '{0}' has fewer than 3 fields")]
    MissingFields(String),
    #[error("invalid month-day '{0}'")]
    InvalidDate(String),
    #[error("invalid hour-minute '{0}'")]
    InvalidTime(String),
}

/// Builds the fixed reference offset used for every token, in whole hours east of UTC.
pub fn reference_offset(hours: i32) -> Option<FixedOffset> {
    if !(-23..=23).contains(&hours) {
        return None;
    }

    FixedOffset::east_opt(hours * 3600)
}

/// Renders `now_utc` as a token such as `04-05 Fri 14:30` in the reference offset.
pub fn format_token(now_utc: DateTime<Utc>, offset: FixedOffset) -> String {
    now_utc.with_timezone(&offset).format(TOKEN_FORMAT).to_string()
}

/// Resolves a token back into an absolute instant.
///
/// Tokens carry no year. The candidate is built in the current local year and
/// moved by one year when it falls more than six months away from `now_utc`,
/// so the result is always the reading closest to now. The weekday field is
/// informational and never checked.
pub fn parse_token(
    token: &str,
    now_utc: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<DateTime<Utc>, TokenParseError> {
    let fields = token.split_whitespace().collect::<Vec<_>>();
    if fields.len() < 3 {
        return Err(TokenParseError::MissingFields(token.trim().to_string()));
    }

    let (month, day) = parse_month_day(fields[0])?;
    let time = NaiveTime::parse_from_str(fields[2], "%H:%M")
        .map_err(|_| TokenParseError::InvalidTime(fields[2].to_string()))?;

    let now_local = now_utc.with_timezone(&offset).naive_local();
    let local = match candidate_in_year(now_local.year(), month, day, time) {
        Some(candidate) => shift_into_window(candidate, now_local),
        None => nearest_leap_candidate(now_local, month, day, time),
    }
    .ok_or_else(|| TokenParseError::InvalidDate(fields[0].to_string()))?;

    offset
        .from_local_datetime(&local)
        .single()
        .map(|value| value.with_timezone(&Utc))
        .ok_or_else(|| TokenParseError::InvalidDate(fields[0].to_string()))
}

fn parse_month_day(value: &str) -> Result<(u32, u32), TokenParseError> {
    let invalid = || TokenParseError::InvalidDate(value.to_string());
    let (month, day) = value.split_once('-').ok_or_else(invalid)?;
    if month.len() != 2 || day.len() != 2 {
        return Err(invalid());
    }

    let month: u32 = month.parse().map_err(|_| invalid())?;
    let day: u32 = day.parse().map_err(|_| invalid())?;

    // 02-29 is a real calendar date even when the current year cannot hold it.
    NaiveDate::from_ymd_opt(LEAP_REFERENCE_YEAR, month, day).ok_or_else(invalid)?;
    Ok((month, day))
}

fn candidate_in_year(year: i32, month: u32, day: u32, time: NaiveTime) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day).map(|date| date.and_time(time))
}

fn shift_into_window(candidate: NaiveDateTime, now_local: NaiveDateTime) -> Option<NaiveDateTime> {
    let window = Months::new(YEAR_WINDOW_MONTHS);
    let year = Months::new(12);

    if candidate > now_local.checked_add_months(window)? {
        return candidate.checked_sub_months(year);
    }
    if candidate < now_local.checked_sub_months(window)? {
        return candidate.checked_add_months(year);
    }

    Some(candidate)
}

/// Picks the latest leap-year reading of `02-29` that is not beyond the
/// forward window, so a leap day resolves to the past unless the next one is close.
fn nearest_leap_candidate(
    now_local: NaiveDateTime,
    month: u32,
    day: u32,
    time: NaiveTime,
) -> Option<NaiveDateTime> {
    let latest = now_local.checked_add_months(Months::new(YEAR_WINDOW_MONTHS))?;
    let year = now_local.year();
    (-MAX_LEAP_SEARCH_YEARS..=MAX_LEAP_SEARCH_YEARS)
        .rev()
        .filter_map(|distance| candidate_in_year(year + distance, month, day, time))
        .find(|candidate| *candidate <= latest)
}
