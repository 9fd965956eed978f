use anyhow::{Context, Result};
use regex::Regex;

use super::confidence::MAX_CONFIDENCE;
use crate::config::PipelineConfig;
use crate::model::Problem;
use crate::util::char_len;

const MATH_KEYWORDS: [&str; 10] = [
    "计算", "求", "解", "应用题", "几何", "面积", "周长", "体积", "练习", "题",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    TooShort { length: usize },
    TooLong { length: usize },
    NoMathContent,
}

impl Verdict {
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn length(self) -> Option<usize> {
        match self {
            Self::TooShort { length } | Self::TooLong { length } => Some(length),
            Self::Accepted | Self::NoMathContent => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::TooShort { .. } => "too_short",
            Self::TooLong { .. } => "too_long",
            Self::NoMathContent => "no_math_content",
        }
    }
}

/// Why a finished record cannot join the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordDefect {
    Stem(Verdict),
    ConfidenceOutOfRange { score: u8 },
    NoKnowledgePoints,
    ScoringMismatch { total: u32, sum: u32 },
    UnpairedTransitions { steps: usize, transitions: usize },
}

impl RecordDefect {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stem(verdict) => verdict.as_str(),
            Self::ConfidenceOutOfRange { .. } => "confidence_out_of_range",
            Self::NoKnowledgePoints => "no_knowledge_points",
            Self::ScoringMismatch { .. } => "scoring_mismatch",
            Self::UnpairedTransitions { .. } => "unpaired_transitions",
        }
    }
}

#[derive(Debug)]
pub struct Validator {
    min_stem_length: usize,
    max_stem_length: usize,
    arithmetic: Regex,
    chinese_numeral: Regex,
}

impl Validator {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            min_stem_length: config.min_stem_length,
            max_stem_length: config.max_stem_length,
            arithmetic: Regex::new(r"\d+\s*[+\-×÷=<>≤≥]\s*\d+")
                .context("failed to compile arithmetic comparison regex")?,
            chinese_numeral: Regex::new(r"[一二三四五六七八九十百千万亿]+")
                .context("failed to compile chinese numeral regex")?,
        })
    }

    /// Length bounds first, then any one math signal is enough.
    pub fn check(&self, stem: &str) -> Verdict {
        let length = char_len(stem);
        if length < self.min_stem_length {
            return Verdict::TooShort { length };
        }
        if length > self.max_stem_length {
            return Verdict::TooLong { length };
        }

        let has_math = self.arithmetic.is_match(stem)
            || self.chinese_numeral.is_match(stem)
            || MATH_KEYWORDS.iter().any(|keyword| stem.contains(keyword));

        if has_math {
            Verdict::Accepted
        } else {
            Verdict::NoMathContent
        }
    }

    /// Checks a record built elsewhere (an older export, another tool)
    /// against the same guarantees pipeline output carries.
    pub fn check_record(&self, problem: &Problem) -> Result<(), RecordDefect> {
        let verdict = self.check(&problem.stem);
        if !verdict.is_accepted() {
            return Err(RecordDefect::Stem(verdict));
        }
        if problem.confidence_score > MAX_CONFIDENCE {
            return Err(RecordDefect::ConfidenceOutOfRange {
                score: problem.confidence_score,
            });
        }
        if problem.knowledge_points.is_empty() {
            return Err(RecordDefect::NoKnowledgePoints);
        }

        let sum = problem
            .scoring
            .steps
            .iter()
            .fold(0_u32, |total, points| total.saturating_add(*points));
        if sum != problem.scoring.total {
            return Err(RecordDefect::ScoringMismatch {
                total: problem.scoring.total,
                sum,
            });
        }
        if problem.steps.len() != problem.transitions.len() {
            return Err(RecordDefect::UnpairedTransitions {
                steps: problem.steps.len(),
                transitions: problem.transitions.len(),
            });
        }
        Ok(())
    }
}
