use serde::{Deserialize, Serialize};

use crate::util::is_cjk;

const MATH_SYMBOLS: &str = "+-−×÷=<>＜＞≤≥";
const MATH_SYMBOL_WEIGHT: usize = 5;

/// Labels for the Tesseract page segmentation modes the upstream OCR step
/// runs for every page (uniform block, single column, sparse text), in
/// evaluation order. Unlabeled candidates borrow these by position.
pub const DEFAULT_OCR_VARIANTS: [&str; 3] = ["psm6", "psm4", "psm11"];

/// One OCR attempt for a page. `text` is `None` when that configuration failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrCandidate {
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl OcrCandidate {
    #[cfg(test)]
    pub fn new(variant: &str, text: Option<&str>) -> Self {
        Self {
            variant: Some(variant.to_string()),
            text: text.map(str::to_string),
        }
    }

    fn label(&self, index: usize) -> String {
        self.variant
            .clone()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| {
                DEFAULT_OCR_VARIANTS
                    .get(index)
                    .map(|label| label.to_string())
            })
            .unwrap_or_else(|| format!("attempt{}", index + 1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedText {
    pub variant: String,
    pub text: String,
    pub score: usize,
}

pub fn candidate_score(text: &str) -> usize {
    text.chars()
        .map(|character| {
            if is_cjk(character) {
                1
            } else if MATH_SYMBOLS.contains(character) {
                MATH_SYMBOL_WEIGHT
            } else {
                0
            }
        })
        .sum()
}

pub fn select_best(candidates: &[OcrCandidate]) -> Option<SelectedText> {
    select_best_by(candidates, candidate_score)
}

/// Picks the strictly best-scoring candidate; ties keep the earlier one.
/// `None` means every attempt failed or scored zero, so the page is skipped.
pub fn select_best_by<F>(candidates: &[OcrCandidate], score: F) -> Option<SelectedText>
where
    F: Fn(&str) -> usize,
{
    let (index, text, best_score) = candidates
        .iter()
        .enumerate()
        .filter_map(|(index, candidate)| {
            candidate
                .text
                .as_deref()
                .map(|text| (index, text, score(text)))
        })
        .filter(|(_, _, value)| *value > 0)
        .fold(None::<(usize, &str, usize)>, |best, current| match best {
            Some(kept) if kept.2 >= current.2 => Some(kept),
            _ => Some(current),
        })?;

    Some(SelectedText {
        variant: candidates[index].label(index),
        text: text.to_string(),
        score: best_score,
    })
}
