use std::thread;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::classify::Classifier;
use super::confidence::ConfidenceScorer;
use super::dedup::{Corpus, MergePolicy, MergeReport};
use super::fields::extract_fields;
use super::normalize::TextNormalizer;
use super::ocr_select::{OcrCandidate, select_best};
use super::rules::RuleTable;
use super::segment::segment;
use super::validate::{Validator, Verdict};
use crate::config::PipelineConfig;
use crate::model::{Problem, SourceLocator};
use crate::util::{non_whitespace_char_count, sanitize_key_for_id};

const TEXT_LAYER_METHOD: &str = "text_layer";

/// Page text as the upstream renderer delivered it: either a usable text
/// layer or the raw output of each OCR attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PageContent {
    Text(String),
    OcrCandidates(Vec<OcrCandidate>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInput {
    pub document_id: String,
    pub page_number: u32,
    #[serde(flatten)]
    pub content: PageContent,
}

#[cfg(test)]
impl PageInput {
    pub fn text(document_id: &str, page_number: u32, text: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            page_number,
            content: PageContent::Text(text.to_string()),
        }
    }

    pub fn ocr(document_id: &str, page_number: u32, candidates: Vec<OcrCandidate>) -> Self {
        Self {
            document_id: document_id.to_string(),
            page_number,
            content: PageContent::OcrCandidates(candidates),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    pub pages_total: usize,
    pub pages_skipped: usize,
    pub ocr_pages: usize,
    pub spans_total: usize,
    pub problems_accepted: usize,
    pub rejected_too_short: usize,
    pub rejected_too_long: usize,
    pub rejected_no_math_content: usize,
}

impl ExtractionStats {
    pub fn absorb(&mut self, other: &ExtractionStats) {
        self.pages_total += other.pages_total;
        self.pages_skipped += other.pages_skipped;
        self.ocr_pages += other.ocr_pages;
        self.spans_total += other.spans_total;
        self.problems_accepted += other.problems_accepted;
        self.rejected_too_short += other.rejected_too_short;
        self.rejected_too_long += other.rejected_too_long;
        self.rejected_no_math_content += other.rejected_no_math_content;
    }

    fn count_verdict(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Accepted => self.problems_accepted += 1,
            Verdict::TooShort { .. } => self.rejected_too_short += 1,
            Verdict::TooLong { .. } => self.rejected_too_long += 1,
            Verdict::NoMathContent => self.rejected_no_math_content += 1,
        }
    }

    pub fn rejected_total(&self) -> usize {
        self.rejected_too_short + self.rejected_too_long + self.rejected_no_math_content
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOutcome {
    pub document_id: String,
    pub page_number: u32,
    pub problems: Vec<Problem>,
    pub stats: ExtractionStats,
}

impl PageOutcome {
    fn empty(page: &PageInput, stats: ExtractionStats) -> Self {
        Self {
            document_id: page.document_id.clone(),
            page_number: page.page_number,
            problems: Vec::new(),
            stats,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub problems: Vec<Problem>,
    pub stats: ExtractionStats,
    pub merge: MergeReport,
}

/// One configured extraction pipeline. Every stage is compiled up front so
/// pages can be processed from several threads through a shared reference.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    normalizer: TextNormalizer,
    rules: RuleTable,
    validator: Validator,
    classifier: Classifier,
    scorer: ConfidenceScorer,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            normalizer: TextNormalizer::new()?,
            rules: RuleTable::standard()?,
            validator: Validator::new(&config)?,
            classifier: Classifier::new(&config),
            scorer: ConfidenceScorer::new()?,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn merge_policy(&self) -> MergePolicy {
        MergePolicy::from_config(&self.config)
    }

    pub fn process_page(&self, page: &PageInput) -> PageOutcome {
        let mut stats = ExtractionStats {
            pages_total: 1,
            ..ExtractionStats::default()
        };

        let (raw, method) = match &page.content {
            PageContent::Text(text) => (text.clone(), TEXT_LAYER_METHOD.to_string()),
            PageContent::OcrCandidates(candidates) => {
                stats.ocr_pages = 1;
                match select_best(candidates) {
                    Some(selected) => {
                        debug!(
                            document = %page.document_id,
                            page = page.page_number,
                            variant = %selected.variant,
                            score = selected.score,
                            "selected OCR candidate"
                        );
                        (selected.text, format!("ocr:{}", selected.variant))
                    }
                    None => {
                        debug!(
                            document = %page.document_id,
                            page = page.page_number,
                            attempts = candidates.len(),
                            "no usable OCR candidate; skipping page"
                        );
                        stats.pages_skipped = 1;
                        return PageOutcome::empty(page, stats);
                    }
                }
            }
        };

        let normalized = self.normalizer.normalize(&raw);
        if non_whitespace_char_count(&normalized) < self.config.min_stem_length {
            debug!(
                document = %page.document_id,
                page = page.page_number,
                "page text too short after normalization; skipping"
            );
            stats.pages_skipped = 1;
            return PageOutcome::empty(page, stats);
        }

        let doc_key = sanitize_key_for_id(&page.document_id);
        let spans = segment(&self.rules, &normalized);
        stats.spans_total = spans.len();

        let mut problems = Vec::<Problem>::new();
        for span in spans {
            let fields = extract_fields(&self.rules, &span.text);
            let verdict = self.validator.check(&fields.stem);
            stats.count_verdict(verdict);
            if !verdict.is_accepted() {
                debug!(
                    document = %page.document_id,
                    page = page.page_number,
                    span = span.sequence,
                    marker = %span.marker,
                    class = span.class.as_str(),
                    reason = verdict.as_str(),
                    length = ?verdict.length(),
                    "span rejected"
                );
                continue;
            }

            let classification = self.classifier.classify(&fields.stem);
            let confidence_score = self.scorer.score(&fields.stem);
            problems.push(Problem {
                id: format!("{doc_key}_p{}_{:03}", page.page_number, span.sequence),
                source: SourceLocator {
                    document: page.document_id.clone(),
                    page: page.page_number,
                    method: method.clone(),
                },
                stem: fields.stem,
                taxonomy: classification.taxonomy,
                problem_type: classification.problem_type,
                steps: classification.steps,
                transitions: classification.transitions,
                scoring: classification.scoring,
                answer: fields.answer,
                analysis: fields.analysis,
                knowledge_points: classification.knowledge_points,
                difficulty: classification.difficulty,
                grade_level: self.config.grade_level.clone(),
                extraction_method: method.clone(),
                confidence_score,
            });
        }

        PageOutcome {
            document_id: page.document_id.clone(),
            page_number: page.page_number,
            problems,
            stats,
        }
    }

    /// Processes pages on up to `jobs` scoped workers. Results come back in
    /// input order whatever the worker count.
    pub fn process_pages(&self, pages: &[PageInput]) -> Result<Vec<PageOutcome>> {
        let jobs = self.config.jobs.max(1);
        if jobs == 1 || pages.len() <= 1 {
            return Ok(pages.iter().map(|page| self.process_page(page)).collect());
        }

        let chunk_size = pages.len().div_ceil(jobs);
        let joined = thread::scope(|scope| {
            let handles = pages
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|page| self.process_page(page))
                            .collect::<Vec<PageOutcome>>()
                    })
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|handle| handle.join())
                .collect::<Vec<_>>()
        });

        let mut outcomes = Vec::with_capacity(pages.len());
        for (index, result) in joined.into_iter().enumerate() {
            match result {
                Ok(chunk) => outcomes.extend(chunk),
                Err(_) => bail!("page worker {} panicked", index + 1),
            }
        }
        Ok(outcomes)
    }

    /// Extracts every page, then merges the accepted problems into `corpus`
    /// sequentially in page order.
    pub fn run(&self, pages: &[PageInput], corpus: &mut Corpus) -> Result<RunSummary> {
        let outcomes = self.process_pages(pages)?;

        let mut stats = ExtractionStats::default();
        let mut problems = Vec::<Problem>::new();
        for outcome in outcomes {
            debug!(
                document = %outcome.document_id,
                page = outcome.page_number,
                problems = outcome.problems.len(),
                "page processed"
            );
            stats.absorb(&outcome.stats);
            problems.extend(outcome.problems);
        }

        let corpus_before = corpus.len();
        let merge = corpus.merge_all(problems.iter().cloned());

        info!(
            pages = stats.pages_total,
            skipped = stats.pages_skipped,
            spans = stats.spans_total,
            accepted = stats.problems_accepted,
            rejected = stats.rejected_total(),
            corpus_before,
            corpus_after = corpus.len(),
            unique = merge.unique.len(),
            improved = merge.improved.len(),
            duplicate = merge.duplicate.len(),
            "extraction run complete"
        );

        Ok(RunSummary {
            problems,
            stats,
            merge,
        })
    }
}
