use anyhow::{Context, Result};
use regex::Regex;

use crate::util::{char_len, is_cjk};

pub const MAX_CONFIDENCE: u8 = 100;

const BASE_SCORE: i32 = 50;
const ARITHMETIC_BONUS: i32 = 20;
const CJK_BONUS: i32 = 15;
const LENGTH_BONUS: i32 = 10;
const NOISE_PENALTY: i32 = 30;
const COMFORTABLE_LENGTH: std::ops::RangeInclusive<usize> = 20..=300;
const NOISE_TOKENS: [&str; 5] = ["www", "http", ".com", "微信", "关注"];

#[derive(Debug)]
pub struct ConfidenceScorer {
    arithmetic: Regex,
}

impl ConfidenceScorer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            arithmetic: Regex::new(r"\d+\s*[+\-×÷=<>≤≥]\s*\d+")
                .context("failed to compile confidence arithmetic regex")?,
        })
    }

    /// Heuristic 0..=100 score for how likely the stem is a clean problem.
    pub fn score(&self, stem: &str) -> u8 {
        let mut score = BASE_SCORE;
        if self.arithmetic.is_match(stem) {
            score += ARITHMETIC_BONUS;
        }
        if stem.chars().any(is_cjk) {
            score += CJK_BONUS;
        }
        if COMFORTABLE_LENGTH.contains(&char_len(stem)) {
            score += LENGTH_BONUS;
        }
        let lowered = stem.to_lowercase();
        if NOISE_TOKENS.iter().any(|token| lowered.contains(token)) {
            score -= NOISE_PENALTY;
        }

        u8::try_from(score.clamp(0, i32::from(MAX_CONFIDENCE))).unwrap_or(0)
    }
}
