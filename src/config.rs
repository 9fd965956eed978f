use std::path::Path;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::util::read_json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImprovementRule {
    /// The newcomer must be materially longer *and* bring an answer the
    /// existing record lacks.
    LongerWithAnswer,
    /// Either condition alone promotes the newcomer.
    LongerOrAnswer,
}

impl ImprovementRule {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LongerWithAnswer => "longerWithAnswer",
            Self::LongerOrAnswer => "longerOrAnswer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyThresholds {
    pub medium: u32,
    pub hard: u32,
}

impl Default for DifficultyThresholds {
    fn default() -> Self {
        Self { medium: 3, hard: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgePointRule {
    pub keyword: String,
    pub tag: String,
}

impl KnowledgePointRule {
    fn new(keyword: &str, tag: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            tag: tag.to_string(),
        }
    }
}

/// Every knob the extraction pipeline recognises. Loaded from camelCase JSON;
/// any missing key keeps its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub min_stem_length: usize,
    pub max_stem_length: usize,
    pub dedup_prefix_length: usize,
    pub improved_length_ratio: f64,
    pub improvement_rule: ImprovementRule,
    pub difficulty_thresholds: DifficultyThresholds,
    pub knowledge_point_dictionary: Vec<KnowledgePointRule>,
    pub default_knowledge_point: String,
    pub grade_level: String,
    pub scoring_total: u32,
    pub jobs: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_stem_length: 10,
            max_stem_length: 800,
            dedup_prefix_length: 100,
            improved_length_ratio: 1.2,
            improvement_rule: ImprovementRule::LongerWithAnswer,
            difficulty_thresholds: DifficultyThresholds::default(),
            knowledge_point_dictionary: default_knowledge_point_dictionary(),
            default_knowledge_point: "基础运算".to_string(),
            grade_level: "4".to_string(),
            scoring_total: 5,
            jobs: 1,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => read_json::<PipelineConfig>(path)?,
            None => PipelineConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_stem_length == 0 {
            bail!("minStemLength must be at least 1");
        }
        if self.min_stem_length > self.max_stem_length {
            bail!(
                "minStemLength ({}) exceeds maxStemLength ({})",
                self.min_stem_length,
                self.max_stem_length
            );
        }
        if self.dedup_prefix_length == 0 {
            bail!("dedupPrefixLength must be at least 1");
        }
        if !self.improved_length_ratio.is_finite() || self.improved_length_ratio < 1.0 {
            bail!(
                "improvedLengthRatio must be a finite value >= 1.0, got {}",
                self.improved_length_ratio
            );
        }
        if self.difficulty_thresholds.medium > self.difficulty_thresholds.hard {
            bail!(
                "difficultyThresholds.medium ({}) exceeds difficultyThresholds.hard ({})",
                self.difficulty_thresholds.medium,
                self.difficulty_thresholds.hard
            );
        }
        if self.scoring_total == 0 {
            bail!("scoringTotal must be at least 1");
        }
        if self.default_knowledge_point.trim().is_empty() {
            bail!("defaultKnowledgePoint must not be empty");
        }
        for (index, rule) in self.knowledge_point_dictionary.iter().enumerate() {
            if rule.keyword.trim().is_empty() || rule.tag.trim().is_empty() {
                bail!(
                    "knowledgePointDictionary entry {} has an empty keyword or tag",
                    index + 1
                );
            }
        }
        if self.jobs == 0 {
            bail!("jobs must be at least 1");
        }
        Ok(())
    }
}

pub fn default_knowledge_point_dictionary() -> Vec<KnowledgePointRule> {
    [
        ("加法", "加法运算"),
        ("减法", "减法运算"),
        ("乘法", "乘法运算"),
        ("除法", "除法运算"),
        ("四则", "四则混合运算"),
        ("分数", "分数"),
        ("小数", "小数"),
        ("面积", "面积计算"),
        ("周长", "周长计算"),
        ("体积", "体积计算"),
        ("时间", "时间计算"),
        ("应用题", "应用题"),
        ("几何", "几何图形"),
        ("图形", "几何图形"),
        ("平均数", "平均数"),
        ("统计", "统计图表"),
        ("概率", "概率初步"),
        ("角度", "角度计算"),
        ("三角形", "三角形"),
        ("四边形", "四边形"),
        ("圆形", "圆形"),
        ("长方形", "长方形"),
        ("正方形", "正方形"),
        ("平行四边形", "平行四边形"),
        ("梯形", "梯形"),
        ("多位数", "多位数"),
        ("估算", "估算"),
        ("验算", "验算"),
        ("单位", "单位换算"),
        ("路程", "路程问题"),
        ("速度", "速度问题"),
        ("效率", "效率问题"),
        ("植树", "植树问题"),
        ("鸡兔", "鸡兔同笼"),
        ("和差", "和差问题"),
        ("和倍", "和倍问题"),
        ("差倍", "差倍问题"),
        ("年龄", "年龄问题"),
        ("盈亏", "盈亏问题"),
    ]
    .into_iter()
    .map(|(keyword, tag)| KnowledgePointRule::new(keyword, tag))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.knowledge_point_dictionary.len(), 39);
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let raw = r#"{ "maxStemLength": 500, "difficultyThresholds": { "hard": 6 } }"#;
        let config: PipelineConfig = serde_json::from_str(raw).expect("config parses");
        assert_eq!(config.max_stem_length, 500);
        assert_eq!(config.min_stem_length, 10);
        assert_eq!(config.difficulty_thresholds.medium, 3);
        assert_eq!(config.difficulty_thresholds.hard, 6);
        assert_eq!(config.improvement_rule, ImprovementRule::LongerWithAnswer);
    }

    #[test]
    fn improvement_rule_parses_camel_case() {
        let raw = r#"{ "improvementRule": "longerOrAnswer", "improvedLengthRatio": 1.5 }"#;
        let config: PipelineConfig = serde_json::from_str(raw).expect("config parses");
        assert_eq!(config.improvement_rule, ImprovementRule::LongerOrAnswer);
        assert!((config.improved_length_ratio - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn inverted_stem_bounds_are_rejected() {
        let config = PipelineConfig {
            min_stem_length: 900,
            ..PipelineConfig::default()
        };
        let error = config.validate().expect_err("inverted bounds must fail");
        assert!(error.to_string().contains("exceeds maxStemLength"));
    }

    #[test]
    fn shrinking_ratio_and_zero_jobs_are_rejected() {
        let ratio = PipelineConfig {
            improved_length_ratio: 0.8,
            ..PipelineConfig::default()
        };
        assert!(ratio.validate().is_err());

        let jobs = PipelineConfig {
            jobs: 0,
            ..PipelineConfig::default()
        };
        assert!(jobs.validate().is_err());

        let thresholds = PipelineConfig {
            difficulty_thresholds: DifficultyThresholds { medium: 6, hard: 5 },
            ..PipelineConfig::default()
        };
        assert!(thresholds.validate().is_err());
    }

    #[test]
    fn empty_dictionary_entries_are_rejected() {
        let config = PipelineConfig {
            knowledge_point_dictionary: vec![KnowledgePointRule::new("分数", " ")],
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
