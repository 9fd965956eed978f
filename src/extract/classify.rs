use crate::config::{DifficultyThresholds, KnowledgePointRule, PipelineConfig};
use crate::model::{Difficulty, ProblemType, Scoring};
use crate::util::char_len;

/// Keyword sets checked in order; the first type with any hit wins.
const TYPE_KEYWORDS: [(ProblemType, &[&str]); 8] = [
    (ProblemType::WordProblem, &["应用题", "解决", "实际", "问题"]),
    (
        ProblemType::MultipleChoice,
        &["选择", "选项", "A.", "B.", "C.", "D."],
    ),
    (ProblemType::TrueFalse, &["判断", "对错", "正确", "错误"]),
    (ProblemType::FillInBlank, &["填空", "括号", "横线"]),
    (ProblemType::Geometry, &["几何", "图形", "面积", "周长", "体积"]),
    (ProblemType::Measurement, &["单位", "长度", "重量", "时间"]),
    (ProblemType::DataAnalysis, &["统计", "图表", "平均数"]),
    (ProblemType::Calculation, &["计算", "求", "算式", "得数"]),
];

const LENGTH_BUCKET_CHARS: usize = 50;
const LENGTH_BUCKET_CAP: u32 = 3;

const DIFFICULTY_FACTORS: [(&[&str], u32); 3] = [
    (&["应用题", "解决", "实际"], 2),
    (&["分数", "小数", "面积", "体积"], 1),
    (&["综合", "分析", "多种方法"], 2),
];

const WORD_PROBLEM_STEPS: [&str; 5] = [
    "理解题意",
    "找出已知条件和问题",
    "选择解题方法",
    "列式计算",
    "检验答案",
];
const CALCULATION_STEPS: [&str; 4] = ["理解题目要求", "确定运算顺序", "进行计算", "检查结果"];
const GENERIC_STEPS: [&str; 4] = ["分析题目", "确定解题思路", "进行解答", "验证结果"];

const FIRST_CONNECTIVE: &str = "首先";
const MIDDLE_CONNECTIVES: [&str; 3] = ["接下来", "然后", "接着"];
const LAST_CONNECTIVE: &str = "最后";

/// Points above the even share go to the compute step first.
const SCORING_REMAINDER_START: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub problem_type: ProblemType,
    pub taxonomy: String,
    pub knowledge_points: Vec<String>,
    pub difficulty: Difficulty,
    pub steps: Vec<String>,
    pub transitions: Vec<String>,
    pub scoring: Scoring,
}

/// Assigns type, topic tags, difficulty and the solution scaffold. Holds its
/// own copy of the dictionary so differently configured pipelines never
/// share tables.
#[derive(Debug, Clone)]
pub struct Classifier {
    dictionary: Vec<KnowledgePointRule>,
    default_knowledge_point: String,
    thresholds: DifficultyThresholds,
    scoring_total: u32,
}

impl Classifier {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            dictionary: config.knowledge_point_dictionary.clone(),
            default_knowledge_point: config.default_knowledge_point.clone(),
            thresholds: config.difficulty_thresholds,
            scoring_total: config.scoring_total,
        }
    }

    pub fn classify(&self, stem: &str) -> Classification {
        let problem_type = problem_type(stem);
        let steps = scaffold_steps(problem_type);
        let transitions = transitions_for(&steps);
        let scoring = Scoring {
            total: self.scoring_total,
            steps: split_scoring(self.scoring_total, steps.len()),
        };

        Classification {
            problem_type,
            taxonomy: problem_type.taxonomy_label().to_string(),
            knowledge_points: self.knowledge_points(stem),
            difficulty: self.difficulty(stem),
            steps,
            transitions,
            scoring,
        }
    }

    pub fn knowledge_points(&self, stem: &str) -> Vec<String> {
        let mut tags = Vec::<String>::new();
        for rule in &self.dictionary {
            if stem.contains(rule.keyword.as_str()) && !tags.contains(&rule.tag) {
                tags.push(rule.tag.clone());
            }
        }
        if tags.is_empty() {
            tags.push(self.default_knowledge_point.clone());
        }
        tags
    }

    pub fn difficulty(&self, stem: &str) -> Difficulty {
        let score = difficulty_score(stem);
        if score >= self.thresholds.hard {
            Difficulty::Hard
        } else if score >= self.thresholds.medium {
            Difficulty::Medium
        } else {
            Difficulty::Easy
        }
    }
}

pub fn problem_type(stem: &str) -> ProblemType {
    TYPE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| stem.contains(keyword)))
        .map(|(problem_type, _)| *problem_type)
        .unwrap_or(ProblemType::Calculation)
}

pub fn difficulty_score(stem: &str) -> u32 {
    let bucket = u32::try_from(char_len(stem) / LENGTH_BUCKET_CHARS)
        .unwrap_or(LENGTH_BUCKET_CAP)
        .min(LENGTH_BUCKET_CAP);

    DIFFICULTY_FACTORS
        .iter()
        .filter(|(keywords, _)| keywords.iter().any(|keyword| stem.contains(keyword)))
        .fold(bucket, |score, (_, points)| score + points)
}

fn scaffold_steps(problem_type: ProblemType) -> Vec<String> {
    let template: &[&str] = match problem_type {
        ProblemType::WordProblem => &WORD_PROBLEM_STEPS,
        ProblemType::Calculation => &CALCULATION_STEPS,
        _ => &GENERIC_STEPS,
    };
    template.iter().map(|step| step.to_string()).collect()
}

fn transitions_for(steps: &[String]) -> Vec<String> {
    let last = steps.len().saturating_sub(1);
    steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let connective = if index == 0 {
                FIRST_CONNECTIVE
            } else if index == last {
                LAST_CONNECTIVE
            } else {
                MIDDLE_CONNECTIVES[(index - 1) % MIDDLE_CONNECTIVES.len()]
            };
            format!("{connective}，{step}。")
        })
        .collect()
}

/// Even split of `total` over `parts`; the remainder is handed out one point
/// at a time starting at the compute step and wrapping around.
pub fn split_scoring(total: u32, parts: usize) -> Vec<u32> {
    let Ok(count) = u32::try_from(parts) else {
        return Vec::new();
    };
    if count == 0 {
        return Vec::new();
    }

    let mut steps = vec![total / count; parts];
    let remainder = (total % count) as usize;
    for offset in 0..remainder {
        steps[(SCORING_REMAINDER_START + offset) % parts] += 1;
    }
    steps
}
