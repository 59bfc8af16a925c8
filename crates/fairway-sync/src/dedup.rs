use std::collections::HashSet;

use fairway_core::Tournament;
use strsim::jaro_winkler;

#[derive(Debug, Clone, Copy)]
pub struct DedupConfig {
    /// Name similarity at or above which two same-day records are one event.
    pub name_threshold: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self { name_threshold: 0.97 }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DedupEngine {
    config: DedupConfig,
}

impl DedupEngine {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    pub fn normalize_name(input: &str) -> String {
        input
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn similarity(&self, a: &Tournament, b: &Tournament) -> f64 {
        jaro_winkler(&Self::normalize_name(&a.name), &Self::normalize_name(&b.name))
    }

    fn is_duplicate(&self, kept: &Tournament, candidate: &Tournament) -> bool {
        kept.date == candidate.date && self.similarity(kept, candidate) >= self.config.name_threshold
    }

    /// Collapse one source batch onto the first occurrence of each event.
    /// Returns the kept records and how many were removed.
    pub fn apply(&self, items: Vec<Tournament>) -> (Vec<Tournament>, usize) {
        let total = items.len();
        let mut seen_ids = HashSet::new();
        let mut kept: Vec<Tournament> = Vec::with_capacity(total);

        for item in items {
            if seen_ids.contains(&item.id) || kept.iter().any(|k| self.is_duplicate(k, &item)) {
                continue;
            }
            seen_ids.insert(item.id.clone());
            kept.push(item);
        }

        let removed = total - kept.len();
        (kept, removed)
    }
}
