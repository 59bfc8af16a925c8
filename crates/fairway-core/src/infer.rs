//! Keyword and date heuristics for the categorical tournament fields.

use std::collections::BTreeSet;

use chrono::{DateTime, Days, Duration, NaiveDate, Utc};

use crate::{AgeGroup, Gender, TournamentStatus};

/// Days before the start date used when a source publishes no deadline.
pub const REGISTRATION_LEAD_DAYS: u64 = 14;

/// Events starting within this many days are reported as open.
pub const OPEN_WINDOW_DAYS: i64 = 14;

const JUNIOR_KEYWORDS: [&str; 4] = ["junior", "girls'", "drive, chip", "drive chip"];
const CLINIC_KEYWORDS: [&str; 2] = ["drive, chip", "drive chip"];
const GIRLS_KEYWORDS: [&str; 3] = ["girls", "women's", "women\u{2019}s"];
const BOYS_KEYWORDS: [&str; 1] = ["boys"];

#[derive(Debug, Clone, Copy, Default)]
pub struct AgeRules {
    pub junior_clinic: bool,
}

impl AgeRules {
    pub fn with_junior_clinic() -> Self {
        Self { junior_clinic: true }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GenderRules {
    pub distinguishes_boys: bool,
}

impl GenderRules {
    pub fn with_boys() -> Self {
        Self {
            distinguishes_boys: true,
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

pub fn infer_age_groups(name: &str, rules: AgeRules) -> BTreeSet<AgeGroup> {
    let lower = name.to_lowercase();
    if rules.junior_clinic && contains_any(&lower, &CLINIC_KEYWORDS) {
        return BTreeSet::from([AgeGroup::U10, AgeGroup::U12, AgeGroup::U14]);
    }
    if contains_any(&lower, &["12-under", "12 under", "10-under", "10 under"]) {
        return BTreeSet::from([AgeGroup::U10, AgeGroup::U12]);
    }
    if contains_any(&lower, &["14-under", "14 under"]) {
        return BTreeSet::from([AgeGroup::U14]);
    }
    if contains_any(&lower, &["16-under", "16 under"]) {
        return BTreeSet::from([AgeGroup::U16]);
    }
    BTreeSet::from([AgeGroup::U18])
}

pub fn infer_gender(name: &str, rules: GenderRules) -> Gender {
    let lower = name.to_lowercase();
    if contains_any(&lower, &GIRLS_KEYWORDS) {
        Gender::Girls
    } else if rules.distinguishes_boys && contains_any(&lower, &BOYS_KEYWORDS) {
        Gender::Boys
    } else {
        Gender::Mixed
    }
}

pub fn is_junior_event(name: &str) -> bool {
    contains_any(&name.to_lowercase(), &JUNIOR_KEYWORDS)
}

/// `None` when the deadline would fall before the earliest representable date.
pub fn default_registration_deadline(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_sub_days(Days::new(REGISTRATION_LEAD_DAYS))
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Status computed from the calendar alone. Dates are taken at 00:00 UTC.
pub fn infer_status(date: NaiveDate, registration_deadline: NaiveDate, now: DateTime<Utc>) -> TournamentStatus {
    let start = start_of_day(date);
    if start < now {
        return TournamentStatus::Completed;
    }
    if start_of_day(registration_deadline) < now {
        return TournamentStatus::Closed;
    }
    if start - now < Duration::days(OPEN_WINDOW_DAYS) {
        TournamentStatus::Open
    } else {
        TournamentStatus::Upcoming
    }
}

/// Explicit status published by the source, if the marker carries one.
pub fn status_from_marker(marker: &str) -> Option<TournamentStatus> {
    let lower = marker.trim().to_lowercase();
    if lower == "full" {
        Some(TournamentStatus::Closed)
    } else if lower.contains("result") {
        Some(TournamentStatus::Completed)
    } else {
        None
    }
}

/// Source markers win over the computed status.
pub fn resolve_status(
    marker: Option<&str>,
    date: NaiveDate,
    registration_deadline: NaiveDate,
    now: DateTime<Utc>,
) -> TournamentStatus {
    marker
        .and_then(status_from_marker)
        .unwrap_or_else(|| infer_status(date, registration_deadline, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 15, 0, 0).single().unwrap()
    }

    #[test]
    fn boys_fourteen_under_championship() {
        let name = "Boys' 14-Under Championship";
        assert_eq!(infer_age_groups(name, AgeRules::default()), BTreeSet::from([AgeGroup::U14]));
        assert_eq!(infer_gender(name, GenderRules::with_boys()), Gender::Boys);
    }

    #[test]
    fn age_keywords_are_case_insensitive() {
        assert_eq!(
            infer_age_groups("UJGA 12-UNDER Series", AgeRules::default()),
            BTreeSet::from([AgeGroup::U10, AgeGroup::U12])
        );
        assert_eq!(
            infer_age_groups("10 Under Kids Classic", AgeRules::default()),
            BTreeSet::from([AgeGroup::U10, AgeGroup::U12])
        );
        assert_eq!(
            infer_age_groups("Girls 16 Under Invitational", AgeRules::default()),
            BTreeSet::from([AgeGroup::U16])
        );
        assert_eq!(
            infer_age_groups("Utah Junior Amateur", AgeRules::default()),
            BTreeSet::from([AgeGroup::U18])
        );
    }

    #[test]
    fn junior_clinic_only_applies_when_enabled() {
        let name = "Drive, Chip and Putt National Finals";
        assert_eq!(
            infer_age_groups(name, AgeRules::with_junior_clinic()),
            BTreeSet::from([AgeGroup::U10, AgeGroup::U12, AgeGroup::U14])
        );
        assert_eq!(infer_age_groups(name, AgeRules::default()), BTreeSet::from([AgeGroup::U18]));
    }

    #[test]
    fn gender_defaults_to_mixed_unless_source_distinguishes_boys() {
        assert_eq!(infer_gender("U.S. Girls' Junior", GenderRules::default()), Gender::Girls);
        assert_eq!(infer_gender("U.S. Women's Amateur", GenderRules::default()), Gender::Girls);
        assert_eq!(infer_gender("Boys Junior Classic", GenderRules::default()), Gender::Mixed);
        assert_eq!(infer_gender("Boys Junior Classic", GenderRules::with_boys()), Gender::Boys);
        assert_eq!(infer_gender("U.S. Junior Amateur", GenderRules::with_boys()), Gender::Mixed);
    }

    #[test]
    fn junior_relevance_filter() {
        assert!(is_junior_event("U.S. Junior Amateur"));
        assert!(is_junior_event("U.S. Girls' Junior"));
        assert!(is_junior_event("Drive Chip and Putt"));
        assert!(!is_junior_event("U.S. Senior Open"));
    }

    #[test]
    fn default_deadline_is_two_weeks_before_start() {
        assert_eq!(default_registration_deadline(ymd(2026, 4, 2)), Some(ymd(2026, 3, 19)));
    }

    #[test]
    fn default_deadline_underflow_is_none() {
        assert_eq!(default_registration_deadline(NaiveDate::MIN), None);
        assert_eq!(
            default_registration_deadline(NaiveDate::MIN + Duration::days(14)),
            Some(NaiveDate::MIN)
        );
    }

    #[test]
    fn status_follows_calendar() {
        let now = now();
        assert_eq!(infer_status(ymd(2026, 3, 30), ymd(2026, 3, 16), now), TournamentStatus::Completed);
        assert_eq!(infer_status(ymd(2026, 4, 1), ymd(2026, 3, 18), now), TournamentStatus::Completed);
        assert_eq!(infer_status(ymd(2026, 4, 10), ymd(2026, 3, 27), now), TournamentStatus::Closed);
        assert_eq!(infer_status(ymd(2026, 4, 10), ymd(2026, 4, 5), now), TournamentStatus::Open);
        assert_eq!(infer_status(ymd(2026, 6, 1), ymd(2026, 5, 18), now), TournamentStatus::Upcoming);
    }

    #[test]
    fn status_is_total_over_date_pairs() {
        let now = now();
        let base = ymd(2026, 3, 1);
        for start_offset in 0..90 {
            for lead in 0..30 {
                let date = base + Duration::days(start_offset);
                let deadline = date - Duration::days(lead);
                let status = infer_status(date, deadline, now);
                assert!(matches!(
                    status,
                    TournamentStatus::Open
                        | TournamentStatus::Upcoming
                        | TournamentStatus::Closed
                        | TournamentStatus::Completed
                ));
                assert_eq!(resolve_status(Some("Full"), date, deadline, now), TournamentStatus::Closed);
                assert_eq!(
                    resolve_status(Some("Results"), date, deadline, now),
                    TournamentStatus::Completed
                );
                assert_eq!(resolve_status(Some("Register"), date, deadline, now), status);
                assert_eq!(resolve_status(None, date, deadline, now), status);
            }
        }
    }

    #[test]
    fn markers_are_matched_loosely() {
        assert_eq!(status_from_marker(" FULL "), Some(TournamentStatus::Closed));
        assert_eq!(status_from_marker("Final Results"), Some(TournamentStatus::Completed));
        assert_eq!(status_from_marker("Full field, waitlist"), None);
        assert_eq!(status_from_marker(""), None);
    }
}
