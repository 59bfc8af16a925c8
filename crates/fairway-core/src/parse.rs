//! String-to-value field parsers shared by the source adapters.

use std::sync::OnceLock;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;

const MONTHS: [(&str, u32); 12] = [
    ("Jan", 1),
    ("Feb", 2),
    ("Mar", 3),
    ("Apr", 4),
    ("May", 5),
    ("Jun", 6),
    ("Jul", 7),
    ("Aug", 8),
    ("Sep", 9),
    ("Oct", 10),
    ("Nov", 11),
    ("Dec", 12),
];

/// Abbreviated region names as printed by national feeds.
const REGION_NAMES: [(&str, &str); 51] = [
    ("Ala.", "AL"),
    ("Alaska", "AK"),
    ("Ariz.", "AZ"),
    ("Ark.", "AR"),
    ("Calif.", "CA"),
    ("Colo.", "CO"),
    ("Conn.", "CT"),
    ("Del.", "DE"),
    ("Fla.", "FL"),
    ("Ga.", "GA"),
    ("Hawaii", "HI"),
    ("Idaho", "ID"),
    ("Ill.", "IL"),
    ("Ind.", "IN"),
    ("Iowa", "IA"),
    ("Kan.", "KS"),
    ("Ky.", "KY"),
    ("La.", "LA"),
    ("Maine", "ME"),
    ("Md.", "MD"),
    ("Mass.", "MA"),
    ("Mich.", "MI"),
    ("Minn.", "MN"),
    ("Miss.", "MS"),
    ("Mo.", "MO"),
    ("Mont.", "MT"),
    ("Neb.", "NE"),
    ("Nev.", "NV"),
    ("N.H.", "NH"),
    ("N.J.", "NJ"),
    ("N.M.", "NM"),
    ("N.Y.", "NY"),
    ("N.C.", "NC"),
    ("N.D.", "ND"),
    ("Ohio", "OH"),
    ("Okla.", "OK"),
    ("Ore.", "OR"),
    ("Pa.", "PA"),
    ("R.I.", "RI"),
    ("S.C.", "SC"),
    ("S.D.", "SD"),
    ("Tenn.", "TN"),
    ("Texas", "TX"),
    ("Utah", "UT"),
    ("Vt.", "VT"),
    ("Va.", "VA"),
    ("Wash.", "WA"),
    ("W.Va.", "WV"),
    ("Wis.", "WI"),
    ("Wyo.", "WY"),
    ("D.C.", "DC"),
];

/// Hour offsets of the zone abbreviations seen in locale date strings.
const ZONE_OFFSETS: [(&str, i64); 12] = [
    ("UTC", 0),
    ("GMT", 0),
    ("EST", -5),
    ("EDT", -4),
    ("CST", -6),
    ("CDT", -5),
    ("MST", -7),
    ("MDT", -6),
    ("PST", -8),
    ("PDT", -7),
    ("AKST", -9),
    ("HST", -10),
];

fn date_range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z]+)\s+(\d{1,2})(?:\s*-\s*(\d{1,2}))?$").expect("valid date range regex")
    })
}

fn entry_fee_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\s*(\d{1,3}(?:,\d{3})+|\d+)").expect("valid entry fee regex"))
}

fn locale_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:[A-Za-z]{3,9},?\s+)?([A-Za-z]{3,9})\.?\s+(\d{1,2}),?\s+(?:(\d{1,2}):(\d{2})(?::(\d{2}))?\s+([A-Z]{3,4})\s+)?(\d{4})$",
        )
        .expect("valid locale date regex")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLocation {
    pub course_name: String,
    pub location: String,
    pub state: String,
}

fn month_number(token: &str) -> Option<u32> {
    let prefix = token.get(..3)?;
    MONTHS
        .iter()
        .find(|(abbrev, _)| abbrev.eq_ignore_ascii_case(prefix))
        .map(|(_, number)| *number)
}

/// Month number for a short month name. Unknown names fall back to January.
pub fn month_from_abbrev(abbrev: &str) -> u32 {
    MONTHS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(abbrev.trim()))
        .map(|(_, number)| *number)
        .unwrap_or(1)
}

/// Parse `"Apr 11"` or `"Apr 2-3"` against `year`.
///
/// An end day smaller than the start day continues into the next month
/// (`"May 31-2"` ends on June 2). Returns `None` for anything else, including
/// days that do not exist in the month.
pub fn parse_date_range(raw: &str, year: i32) -> Option<DateRange> {
    let caps = date_range_re().captures(raw.trim())?;
    let month = month_from_abbrev(&caps[1]);
    let start_day: u32 = caps[2].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, start_day)?;
    let end_date = match caps.get(3) {
        Some(end) => Some(range_end(date, end.as_str().parse().ok()?)?),
        None => None,
    };
    Some(DateRange { date, end_date })
}

fn range_end(start: NaiveDate, end_day: u32) -> Option<NaiveDate> {
    if end_day >= start.day() {
        return NaiveDate::from_ymd_opt(start.year(), start.month(), end_day);
    }
    let first_of_month = start.with_day(1)?;
    let next = first_of_month.checked_add_months(Months::new(1))?;
    NaiveDate::from_ymd_opt(next.year(), next.month(), end_day)
}

pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Calendar date (UTC) of a feed timestamp.
///
/// Accepts `2026-01-15`, RFC 3339, and locale strings such as
/// `Thu Jan 15 01:00:00 EST 2026`.
pub fn parse_feed_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(date) = parse_iso_date(raw) {
        return Some(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc).date_naive());
    }

    let caps = locale_date_re().captures(raw)?;
    let month = month_number(&caps[1])?;
    let day: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[7].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    let Some(hour) = caps.get(3) else {
        return Some(date);
    };
    let hour: u32 = hour.as_str().parse().ok()?;
    let minute: u32 = caps[4].parse().ok()?;
    let second: u32 = caps.get(5).map_or(Some(0), |s| s.as_str().parse().ok())?;
    let time = NaiveTime::from_hms_opt(hour, minute, second)?;
    let offset_hours = caps
        .get(6)
        .and_then(|zone| ZONE_OFFSETS.iter().find(|(name, _)| *name == zone.as_str()))
        .map_or(0, |(_, offset)| *offset);
    let utc = NaiveDateTime::new(date, time).checked_sub_signed(Duration::hours(offset_hours))?;
    Some(utc.date())
}

pub fn is_region_code(raw: &str) -> bool {
    raw.len() == 2 && raw.chars().all(|c| c.is_ascii_alphabetic())
}

/// Trailing comma token of a location when it is a two-letter code.
pub fn state_from_location(location: &str) -> String {
    let last = location.rsplit(',').next().unwrap_or_default().trim();
    if is_region_code(last) {
        last.to_ascii_uppercase()
    } else {
        String::new()
    }
}

/// Split `"Southgate GC · St. George, UT"` into course, location and state.
pub fn parse_location(raw: &str) -> ParsedLocation {
    let mut parts = raw.split('·').map(str::trim);
    let course_name = parts.next().unwrap_or_default().to_string();
    let location = parts.next().unwrap_or_default().to_string();
    let state = state_from_location(&location);
    ParsedLocation {
        course_name,
        location,
        state,
    }
}

/// First dollar amount in the text; the lower bound of a range.
pub fn parse_entry_fee(text: &str) -> Option<u32> {
    let caps = entry_fee_re().captures(text)?;
    caps[1].replace(',', "").parse().ok()
}

/// Map a region name or abbreviation to its two-letter code.
///
/// Unmapped input is best effort only: punctuation and whitespace are
/// stripped and the first two characters uppercased.
pub fn normalize_region(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some((_, code)) = REGION_NAMES.iter().find(|(name, _)| *name == trimmed) {
        return (*code).to_string();
    }
    trimmed
        .chars()
        .filter(|c| !c.is_ascii_punctuation() && !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .take(2)
        .collect()
}

/// Region code of the trailing comma token of a feed location.
pub fn region_from_location(location: &str) -> String {
    let last = location.rsplit(',').next().unwrap_or_default();
    normalize_region(last)
}
