use anyhow::{Context, Result};
use regex::Regex;

/// Marker classes in precedence order: a lower rank closes spans opened by
/// any class with an equal or higher rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MarkerClass {
    Circled,
    Numbered,
    Keyword,
}

impl MarkerClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Circled => "circled",
            Self::Numbered => "numbered",
            Self::Keyword => "keyword",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleField {
    Marker(MarkerClass),
    Answer,
    Analysis,
}

impl RuleField {
    pub fn is_marker(self) -> bool {
        matches!(self, Self::Marker(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchGuard {
    None,
    NotBeforeDigit,
}

#[derive(Debug)]
struct Rule {
    pattern: Regex,
    field: RuleField,
    precedence: u8,
    guard: MatchGuard,
}

/// A rule match located in a text. Offsets are byte offsets of the marker
/// itself (the `marker` capture group when the pattern has one).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleHit {
    pub start: usize,
    pub end: usize,
    pub field: RuleField,
    pub precedence: u8,
}

/// The ordered (pattern, field, precedence) table shared by the segmenter
/// and the field extractor.
#[derive(Debug)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn standard() -> Result<Self> {
        let rules = vec![
            rule(
                "circled_numeral",
                r"[①②③④⑤⑥⑦⑧⑨⑩]",
                RuleField::Marker(MarkerClass::Circled),
                1,
                MatchGuard::None,
            )?,
            rule(
                "numbered_item",
                r"(?:^|[^\d.．])(?P<marker>\d{1,3}[.、．])",
                RuleField::Marker(MarkerClass::Numbered),
                2,
                MatchGuard::NotBeforeDigit,
            )?,
            rule(
                "keyword_nth_problem",
                r"第\s*[0-9一二三四五六七八九十]+\s*题",
                RuleField::Marker(MarkerClass::Keyword),
                3,
                MatchGuard::None,
            )?,
            rule(
                "keyword_anchor",
                r"应用题|例题|计算|练习",
                RuleField::Marker(MarkerClass::Keyword),
                3,
                MatchGuard::None,
            )?,
            rule("answer_full", r"答案[:：]", RuleField::Answer, 1, MatchGuard::None)?,
            rule("answer_short", r"答[:：]", RuleField::Answer, 2, MatchGuard::None)?,
            rule("analysis_full", r"解析[:：]", RuleField::Analysis, 1, MatchGuard::None)?,
            rule("analysis_solve", r"解[:：]", RuleField::Analysis, 2, MatchGuard::None)?,
            rule("analysis_reason", r"分析[:：]", RuleField::Analysis, 3, MatchGuard::None)?,
            rule("analysis_idea", r"思路[:：]", RuleField::Analysis, 4, MatchGuard::None)?,
            rule("analysis_method", r"解法[:：]", RuleField::Analysis, 5, MatchGuard::None)?,
        ];

        Ok(Self { rules })
    }

    pub fn marker_hits(&self, text: &str) -> Vec<RuleHit> {
        self.hits(text, RuleField::is_marker)
    }

    pub fn field_hits(&self, text: &str) -> Vec<RuleHit> {
        self.hits(text, |field| !field.is_marker())
    }

    /// Non-overlapping hits sorted by position. Where two hits overlap, the
    /// one from the stronger class wins, then the earlier start.
    fn hits<F>(&self, text: &str, wanted: F) -> Vec<RuleHit>
    where
        F: Fn(RuleField) -> bool,
    {
        let mut candidates = Vec::<RuleHit>::new();
        for rule in self.rules.iter().filter(|rule| wanted(rule.field)) {
            for captures in rule.pattern.captures_iter(text) {
                let Some(found) = captures.name("marker").or_else(|| captures.get(0)) else {
                    continue;
                };
                if found.start() == found.end() {
                    continue;
                }
                if rule.guard == MatchGuard::NotBeforeDigit
                    && text[found.end()..]
                        .chars()
                        .next()
                        .is_some_and(|value| value.is_ascii_digit())
                {
                    continue;
                }

                candidates.push(RuleHit {
                    start: found.start(),
                    end: found.end(),
                    field: rule.field,
                    precedence: rule.precedence,
                });
            }
        }

        candidates.sort_by_key(|hit| (class_rank(hit.field), hit.start, hit.precedence));

        let mut accepted = Vec::<RuleHit>::with_capacity(candidates.len());
        for hit in candidates {
            let overlaps = accepted
                .iter()
                .any(|kept| hit.start < kept.end && kept.start < hit.end);
            if !overlaps {
                accepted.push(hit);
            }
        }

        accepted.sort_by_key(|hit| (hit.start, hit.precedence));
        accepted
    }
}

fn class_rank(field: RuleField) -> u8 {
    match field {
        RuleField::Marker(MarkerClass::Circled) => 0,
        RuleField::Marker(MarkerClass::Numbered) => 1,
        RuleField::Marker(MarkerClass::Keyword) => 2,
        RuleField::Answer | RuleField::Analysis => 3,
    }
}

fn rule(
    name: &'static str,
    pattern: &str,
    field: RuleField,
    precedence: u8,
    guard: MatchGuard,
) -> Result<Rule> {
    Ok(Rule {
        pattern: Regex::new(pattern).with_context(|| format!("failed to compile {name} regex"))?,
        field,
        precedence,
        guard,
    })
}
