use serde::Serialize;
use tracing::debug;

use crate::config::{ImprovementRule, PipelineConfig};
use crate::model::Problem;
use crate::util::{char_len, collapse_whitespace};

/// Stem prefix two records must share to count as the same problem.
pub fn dedup_key(stem: &str, prefix_length: usize) -> String {
    collapse_whitespace(stem)
        .to_lowercase()
        .chars()
        .take(prefix_length)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergePolicy {
    pub prefix_length: usize,
    pub length_ratio: f64,
    pub rule: ImprovementRule,
}

impl MergePolicy {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            prefix_length: config.dedup_prefix_length,
            length_ratio: config.improved_length_ratio,
            rule: config.improvement_rule,
        }
    }

    pub fn improves(&self, existing: &Problem, candidate: &Problem) -> bool {
        let existing_length = char_len(&existing.stem) as f64;
        let longer = char_len(&candidate.stem) as f64 > self.length_ratio * existing_length;
        let adds_answer =
            !candidate.answer.trim().is_empty() && existing.answer.trim().is_empty();

        match self.rule {
            ImprovementRule::LongerWithAnswer => longer && adds_answer,
            ImprovementRule::LongerOrAnswer => longer || adds_answer,
        }
    }
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Unique,
    Improved { replaced_id: String },
    Duplicate { existing_id: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub unique: Vec<String>,
    pub improved: Vec<String>,
    pub duplicate: Vec<String>,
}

impl MergeReport {
    pub fn record(&mut self, id: &str, outcome: &MergeOutcome) {
        let bucket = match outcome {
            MergeOutcome::Unique => &mut self.unique,
            MergeOutcome::Improved { .. } => &mut self.improved,
            MergeOutcome::Duplicate { .. } => &mut self.duplicate,
        };
        bucket.push(id.to_string());
    }
}

/// Insertion-ordered set of accepted problems. Merging takes `&mut self`, so
/// concurrent producers have to funnel through one owner or a lock.
#[derive(Debug, Clone)]
pub struct Corpus {
    records: Vec<Problem>,
    keys: Vec<String>,
    policy: MergePolicy,
}

impl Corpus {
    pub fn new(policy: MergePolicy) -> Self {
        Self {
            records: Vec::new(),
            keys: Vec::new(),
            policy,
        }
    }

    /// Seeds a corpus from stored records, keeping their order as-is.
    pub fn from_records(policy: MergePolicy, records: Vec<Problem>) -> Self {
        let keys = records
            .iter()
            .map(|record| dedup_key(&record.stem, policy.prefix_length))
            .collect();
        Self {
            records,
            keys,
            policy,
        }
    }

    pub fn merge(&mut self, candidate: Problem) -> MergeOutcome {
        let key = dedup_key(&candidate.stem, self.policy.prefix_length);
        let Some(index) = self.keys.iter().position(|existing| *existing == key) else {
            self.records.push(candidate);
            self.keys.push(key);
            return MergeOutcome::Unique;
        };

        let existing = &self.records[index];
        if self.policy.improves(existing, &candidate) {
            let replaced_id = existing.id.clone();
            self.records[index] = candidate;
            self.keys[index] = key;
            MergeOutcome::Improved { replaced_id }
        } else {
            MergeOutcome::Duplicate {
                existing_id: existing.id.clone(),
            }
        }
    }

    pub fn merge_all<I>(&mut self, candidates: I) -> MergeReport
    where
        I: IntoIterator<Item = Problem>,
    {
        let mut report = MergeReport::default();
        for candidate in candidates {
            let id = candidate.id.clone();
            let outcome = self.merge(candidate);
            match &outcome {
                MergeOutcome::Unique => {}
                MergeOutcome::Improved { replaced_id } => {
                    debug!(id = %id, replaced = %replaced_id, "record improved existing entry");
                }
                MergeOutcome::Duplicate { existing_id } => {
                    debug!(id = %id, existing = %existing_id, "duplicate record skipped");
                }
            }
            report.record(&id, &outcome);
        }
        report
    }

    pub fn records(&self) -> &[Problem] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}
