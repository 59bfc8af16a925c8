//! National championship calendar served as a JSON feed.

use fairway_core::infer::{
    default_registration_deadline, infer_age_groups, infer_gender, infer_status, is_junior_event, AgeRules, GenderRules,
};
use fairway_core::parse::{parse_feed_date, region_from_location};
use fairway_core::Tournament;

use crate::{non_empty, AdapterContext, AdapterOutput, IdSequence, RawEvent, RetrievalShape, SourceAdapter, SourceConfig};

#[derive(Debug, Clone)]
pub struct UsgaAdapter {
    config: SourceConfig,
}

impl UsgaAdapter {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }
}

impl SourceAdapter for UsgaAdapter {
    fn config(&self) -> &SourceConfig {
        &self.config
    }

    fn retrieval_shape(&self) -> RetrievalShape {
        RetrievalShape::FeedIntercept
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
            if !is_junior_event(name) {
                output.filtered += 1;
                continue;
            }
            let dated = non_empty(event.start_date.as_deref())
                .and_then(parse_feed_date)
                .and_then(|date| Some((date, default_registration_deadline(date)?)));
            let Some((date, registration_deadline)) = dated else {
                output.dropped += 1;
                continue;
            };
            let end_date = non_empty(event.end_date.as_deref()).and_then(parse_feed_date);

            let location = non_empty(event.location.as_deref()).unwrap_or_default().to_string();
            let course_name = non_empty(event.course_name.as_deref())
                .map(str::to_string)
                .unwrap_or_else(|| location.clone());

            let tournament = Tournament {
                id: ids.next_id(),
                name: name.to_string(),
                date,
                end_date,
                state: region_from_location(&location),
                location,
                course_name,
                age_groups: infer_age_groups(name, AgeRules::with_junior_clinic()),
                gender: infer_gender(name, GenderRules::default()),
                registration_deadline,
                status: infer_status(date, registration_deadline, ctx.now),
                entry_fee: None,
                description: non_empty(event.event_url.as_deref()).map(|url| format!("More info: {url}")),
            };
            output.tournaments.push(tournament.enforce_invariants());
        }
        output
    }
}
