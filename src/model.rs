use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocator {
    pub document: String,
    pub page: u32,
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scoring {
    pub total: u32,
    pub steps: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    WordProblem,
    MultipleChoice,
    TrueFalse,
    FillInBlank,
    Geometry,
    Measurement,
    DataAnalysis,
    Calculation,
}

impl ProblemType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WordProblem => "word_problem",
            Self::MultipleChoice => "multiple_choice",
            Self::TrueFalse => "true_false",
            Self::FillInBlank => "fill_in_blank",
            Self::Geometry => "geometry",
            Self::Measurement => "measurement",
            Self::DataAnalysis => "data_analysis",
            Self::Calculation => "calculation",
        }
    }

    pub fn taxonomy_label(self) -> &'static str {
        match self {
            Self::WordProblem => "应用题",
            Self::MultipleChoice => "选择题",
            Self::TrueFalse => "判断题",
            Self::FillInBlank => "填空题",
            Self::Geometry => "几何题",
            Self::Measurement => "测量题",
            Self::DataAnalysis => "统计题",
            Self::Calculation => "计算题",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

/// One extracted problem as handed to the learning platform.
///
/// Built by the field extractor and classifier, finished by the confidence
/// scorer, and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: String,
    pub source: SourceLocator,
    pub stem: String,
    pub taxonomy: String,
    #[serde(rename = "type")]
    pub problem_type: ProblemType,
    pub steps: Vec<String>,
    pub transitions: Vec<String>,
    pub scoring: Scoring,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub analysis: String,
    pub knowledge_points: Vec<String>,
    pub difficulty: Difficulty,
    pub grade_level: String,
    pub extraction_method: String,
    pub confidence_score: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunPaths {
    pub input_path: String,
    pub db_path: String,
    pub output_path: String,
    pub manifest_path: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunCounts {
    pub pages_total: usize,
    pub pages_skipped: usize,
    pub ocr_pages: usize,
    pub spans_total: usize,
    pub problems_accepted: usize,
    pub rejected_too_short: usize,
    pub rejected_too_long: usize,
    pub rejected_no_math_content: usize,
    pub corpus_before: usize,
    pub corpus_after: usize,
    pub merged_unique: usize,
    pub merged_improved: usize,
    pub merged_duplicate: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub input_sha256: String,
    pub paths: RunPaths,
    pub counts: RunCounts,
    pub improved_ids: Vec<String>,
    pub warnings: Vec<String>,
}
