//! BlueGolf-hosted association schedules (UJGA and friends).

use chrono::{Datelike, NaiveDate};
use fairway_core::infer::{default_registration_deadline, infer_age_groups, infer_gender, resolve_status, AgeRules, GenderRules};
use fairway_core::parse::{parse_date_range, parse_entry_fee, parse_iso_date, parse_location, state_from_location};
use fairway_core::{Tournament, UNKNOWN_COURSE};
use tracing::debug;

use crate::{non_empty, AdapterContext, AdapterOutput, IdSequence, RawEvent, RetrievalShape, SourceAdapter, SourceConfig};

#[derive(Debug, Clone)]
pub struct BlueGolfAdapter {
    config: SourceConfig,
}

impl BlueGolfAdapter {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    fn season_year(&self, ctx: &AdapterContext) -> i32 {
        self.config.season_year.unwrap_or_else(|| ctx.now.year())
    }

    /// Start date from the ISO attribute, else from the visible date text.
    /// The end date always comes from the text, in the start date's year.
    fn dates(&self, raw: &RawEvent, ctx: &AdapterContext) -> Option<(NaiveDate, Option<NaiveDate>)> {
        let text_range = |year| non_empty(raw.date_text.as_deref()).and_then(|text| parse_date_range(text, year));

        let date = match non_empty(raw.start_date.as_deref()).and_then(parse_iso_date) {
            Some(date) => date,
            None => text_range(self.season_year(ctx))?.date,
        };
        let end_date = text_range(date.year())
            .and_then(|range| range.end_date)
            .filter(|end| *end >= date);
        Some((date, end_date))
    }

    fn place(&self, raw: &RawEvent) -> (String, String, String) {
        let course_cell = non_empty(raw.course_name.as_deref()).unwrap_or_default();
        let (course_name, mut location) = if course_cell.contains('·') {
            let parsed = parse_location(course_cell);
            (parsed.course_name, parsed.location)
        } else {
            (course_cell.to_string(), String::new())
        };
        if let Some(address) = non_empty(raw.location.as_deref()) {
            location = address.to_string();
        }
        if location.is_empty() {
            location = self.config.default_state.clone();
        }

        let mut state = state_from_location(&location);
        if state.is_empty() {
            state = self.config.default_state.clone();
        }
        let course_name = if course_name.is_empty() {
            UNKNOWN_COURSE.to_string()
        } else {
            course_name
        };
        (course_name, location, state)
    }
}

impl SourceAdapter for BlueGolfAdapter {
    fn config(&self) -> &SourceConfig {
        &self.config
    }

    fn retrieval_shape(&self) -> RetrievalShape {
        RetrievalShape::Dom
    }

    fn normalize(&self, raw: Vec<RawEvent>, ctx: &AdapterContext) -> AdapterOutput {
        let mut output = AdapterOutput {
            raw_events: raw.len(),
            ..AdapterOutput::default()
        };
        let mut ids = IdSequence::new(&self.config.source_id);

        for event in raw {
            let name = event.name.trim();
            if name.is_empty() {
                output.dropped += 1;
                continue;
            }
            let Some((date, end_date)) = self.dates(&event, ctx) else {
                debug!(name, date_text = ?event.date_text, "dropping row without a parseable date");
                output.dropped += 1;
                continue;
            };

            let Some(registration_deadline) = non_empty(event.registration_deadline.as_deref())
                .and_then(parse_iso_date)
                .or_else(|| default_registration_deadline(date))
            else {
                debug!(name, %date, "dropping row whose deadline is out of range");
                output.dropped += 1;
                continue;
            };
            let (course_name, location, state) = self.place(&event);

            let tournament = Tournament {
                id: ids.next_id(),
                name: name.to_string(),
                date,
                end_date,
                location,
                state,
                course_name,
                age_groups: infer_age_groups(name, AgeRules::default()),
                gender: infer_gender(name, GenderRules::with_boys()),
                registration_deadline,
                status: resolve_status(event.status_marker.as_deref(), date, registration_deadline, ctx.now),
                entry_fee: event.fee_text.as_deref().and_then(parse_entry_fee),
                description: None,
            };
            output.tournaments.push(tournament.enforce_invariants());
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::extract_vevents;
    use crate::testing::ujga_config;
    use chrono::{TimeZone, Utc};
    use fairway_core::{AgeGroup, Gender, TournamentStatus};
    use std::collections::BTreeSet;

    const SCHEDULE: &str = include_str!("../../../fixtures/ujga/schedule.html");

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ctx() -> AdapterContext {
        AdapterContext::new(Utc.with_ymd_and_hms(2026, 3, 20, 12, 0, 0).single().unwrap())
    }

    fn normalized() -> AdapterOutput {
        let raw = extract_vevents(SCHEDULE, &ujga_config().url).unwrap();
        BlueGolfAdapter::new(ujga_config()).normalize(raw, &ctx())
    }

    #[test]
    fn schedule_fixture_normalizes() {
        let output = normalized();
        assert_eq!(output.raw_events, 6);
        assert_eq!(output.dropped, 2);
        assert_eq!(output.filtered, 0);
        assert_eq!(output.tournaments.len(), 4);

        let ids: Vec<_> = output.tournaments.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["ujga-0", "ujga-1", "ujga-2", "ujga-3"]);
    }

    #[test]
    fn twelve_under_series_is_open_soon() {
        let t = &normalized().tournaments[0];
        assert_eq!(t.name, "UJGA 12-Under Series #1");
        assert_eq!(t.date, ymd(2026, 4, 2));
        assert_eq!(t.end_date, Some(ymd(2026, 4, 3)));
        assert_eq!(t.course_name, "Southgate GC");
        assert_eq!(t.location, "St. George, UT");
        assert_eq!(t.state, "UT");
        assert_eq!(t.registration_deadline, ymd(2026, 3, 25));
        assert_eq!(t.entry_fee, Some(150));
        assert_eq!(t.age_groups, BTreeSet::from([AgeGroup::U10, AgeGroup::U12]));
        assert_eq!(t.gender, Gender::Mixed);
        assert_eq!(t.status, TournamentStatus::Open);
    }

    #[test]
    fn full_marker_closes_registration() {
        let t = &normalized().tournaments[1];
        assert_eq!(t.name, "Boys' 14-Under Championship");
        assert_eq!(t.status, TournamentStatus::Closed);
        assert_eq!(t.gender, Gender::Boys);
        assert_eq!(t.age_groups, BTreeSet::from([AgeGroup::U14]));
        assert_eq!(t.registration_deadline, ymd(2026, 5, 25));
        assert_eq!(t.entry_fee, None);
    }

    #[test]
    fn girls_championship_is_upcoming() {
        let t = &normalized().tournaments[2];
        assert_eq!(t.gender, Gender::Girls);
        assert_eq!(t.age_groups, BTreeSet::from([AgeGroup::U18]));
        assert_eq!(t.status, TournamentStatus::Upcoming);
        assert_eq!(t.end_date, Some(ymd(2026, 7, 16)));
        assert_eq!(t.entry_fee, Some(325));
    }

    #[test]
    fn combined_course_cell_and_text_date() {
        let t = &normalized().tournaments[3];
        assert_eq!(t.name, "UJGA Tour Championship");
        assert_eq!(t.date, ymd(2026, 8, 11));
        assert_eq!(t.end_date, None);
        assert_eq!(t.course_name, "Soldier Hollow GC");
        assert_eq!(t.location, "Midway, UT");
        assert_eq!(t.state, "UT");
        assert_eq!(t.status, TournamentStatus::Completed);
    }

    #[test]
    fn missing_place_falls_back_to_default_state() {
        let raw = vec![RawEvent {
            name: "Spring Junior Open".into(),
            date_text: Some("May 4".into()),
            ..RawEvent::default()
        }];
        let output = BlueGolfAdapter::new(ujga_config()).normalize(raw, &ctx());
        let t = &output.tournaments[0];
        assert_eq!(t.course_name, UNKNOWN_COURSE);
        assert_eq!(t.location, "UT");
        assert_eq!(t.state, "UT");
        assert_eq!(t.registration_deadline, ymd(2026, 4, 20));
    }

    #[test]
    fn season_year_defaults_to_current_year() {
        let mut config = ujga_config();
        config.season_year = None;
        let raw = vec![RawEvent {
            name: "Winter Junior".into(),
            date_text: Some("Dec 28-2".into()),
            ..RawEvent::default()
        }];
        let output = BlueGolfAdapter::new(config).normalize(raw, &ctx());
        let t = &output.tournaments[0];
        assert_eq!(t.date, ymd(2026, 12, 28));
        assert_eq!(t.end_date, Some(ymd(2027, 1, 2)));
    }

    #[test]
    fn impossible_calendar_day_is_dropped() {
        let raw = vec![RawEvent {
            name: "Leap Day Classic".into(),
            date_text: Some("Feb 30".into()),
            ..RawEvent::default()
        }];
        let output = BlueGolfAdapter::new(ujga_config()).normalize(raw, &ctx());
        assert!(output.tournaments.is_empty());
        assert_eq!(output.dropped, 1);
    }

    #[test]
    fn start_at_calendar_minimum_is_dropped_not_panicking() {
        let earliest = NaiveDate::MIN.format("%Y-%m-%d").to_string();
        let raw = vec![
            RawEvent {
                name: "Ancient Junior Open".into(),
                start_date: Some(earliest),
                ..RawEvent::default()
            },
            RawEvent {
                name: "Spring Junior Open".into(),
                date_text: Some("May 4".into()),
                ..RawEvent::default()
            },
        ];
        let output = BlueGolfAdapter::new(ujga_config()).normalize(raw, &ctx());
        assert_eq!(output.dropped, 1);
        assert_eq!(output.tournaments.len(), 1);
        assert_eq!(output.tournaments[0].id, "ujga-0");
        assert_eq!(output.tournaments[0].name, "Spring Junior Open");
    }
}
