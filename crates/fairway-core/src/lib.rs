//! Core tournament model, snapshot artifact, field parsers and inference rules.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub mod infer;
pub mod parse;

pub const CRATE_NAME: &str = "fairway-core";

/// Placeholder used when a source does not publish the course.
pub const UNKNOWN_COURSE: &str = "TBD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    U10,
    U12,
    U14,
    U16,
    U18,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Boys,
    Girls,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TournamentStatus {
    Open,
    Upcoming,
    Closed,
    Completed,
}

/// Canonical tournament record shared by every source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tournament {
    pub id: String,
    pub name: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub location: String,
    pub state: String,
    pub course_name: String,
    pub age_groups: BTreeSet<AgeGroup>,
    pub gender: Gender,
    pub registration_deadline: NaiveDate,
    pub status: TournamentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_fee: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Tournament {
    /// Clamp the record onto the model invariants.
    ///
    /// A state that is not two ASCII letters becomes empty, an end date before
    /// the start date is dropped, an empty age-group set becomes `{U18}` and a
    /// blank course name becomes [`UNKNOWN_COURSE`].
    pub fn enforce_invariants(mut self) -> Self {
        self.state = if parse::is_region_code(&self.state) {
            self.state.to_ascii_uppercase()
        } else {
            String::new()
        };
        if self.end_date.is_some_and(|end| end < self.date) {
            self.end_date = None;
        }
        if self.age_groups.is_empty() {
            self.age_groups.insert(AgeGroup::U18);
        }
        if self.course_name.trim().is_empty() {
            self.course_name = UNKNOWN_COURSE.to_string();
        }
        self
    }
}

/// Persisted output of one pipeline run for one upstream source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub source: String,
    pub scraped_at: DateTime<Utc>,
    pub tournaments: Vec<Tournament>,
}

impl Snapshot {
    pub fn new(source: impl Into<String>, scraped_at: DateTime<Utc>, tournaments: Vec<Tournament>) -> Self {
        Self {
            source: source.into(),
            scraped_at,
            tournaments,
        }
    }
}
