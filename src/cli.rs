use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::ImprovementRule;

#[derive(Parser, Debug)]
#[command(
    name = "problem-extract",
    version,
    about = "Extract structured math problems from OCR'd workbook pages"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Extract(ExtractArgs),
    Merge(MergeArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[arg(long, default_value = ".cache/problem-extract")]
    pub cache_root: PathBuf,

    /// JSON array of pages: `{documentId, pageNumber, text | ocrCandidates}`.
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub jobs: Option<usize>,

    #[arg(long, value_enum)]
    pub improvement_rule: Option<ImprovementRuleArg>,
}

#[derive(Args, Debug, Clone)]
pub struct MergeArgs {
    #[arg(long, default_value = ".cache/problem-extract")]
    pub cache_root: PathBuf,

    /// Previously exported problem set to fold into the corpus.
    #[arg(long = "from")]
    pub from: PathBuf,

    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub improvement_rule: Option<ImprovementRuleArg>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/problem-extract")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long, default_value_t = 10)]
    pub top_knowledge_points: usize,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ImprovementRuleArg {
    LongerWithAnswer,
    LongerOrAnswer,
}

impl From<ImprovementRuleArg> for ImprovementRule {
    fn from(value: ImprovementRuleArg) -> Self {
        match value {
            ImprovementRuleArg::LongerWithAnswer => ImprovementRule::LongerWithAnswer,
            ImprovementRuleArg::LongerOrAnswer => ImprovementRule::LongerOrAnswer,
        }
    }
}

impl ExtractArgs {
    pub fn resolved_db_path(&self) -> PathBuf {
        resolve_db_path(&self.cache_root, self.db_path.as_ref())
    }

    pub fn resolved_output(&self) -> PathBuf {
        resolve_output(&self.cache_root, self.output.as_ref())
    }

    pub fn resolved_manifest_path(&self) -> PathBuf {
        self.manifest_path
            .clone()
            .unwrap_or_else(|| self.cache_root.join("manifests").join("extract_run.json"))
    }
}

impl MergeArgs {
    pub fn resolved_db_path(&self) -> PathBuf {
        resolve_db_path(&self.cache_root, self.db_path.as_ref())
    }

    pub fn resolved_output(&self) -> PathBuf {
        resolve_output(&self.cache_root, self.output.as_ref())
    }
}

impl StatusArgs {
    pub fn resolved_db_path(&self) -> PathBuf {
        resolve_db_path(&self.cache_root, self.db_path.as_ref())
    }
}

fn resolve_db_path(cache_root: &std::path::Path, db_path: Option<&PathBuf>) -> PathBuf {
    db_path
        .cloned()
        .unwrap_or_else(|| cache_root.join("problems.sqlite"))
}

fn resolve_output(cache_root: &std::path::Path, output: Option<&PathBuf>) -> PathBuf {
    output
        .cloned()
        .unwrap_or_else(|| cache_root.join("problems.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_defaults_land_under_cache_root() {
        let cli = Cli::parse_from(["problem-extract", "extract", "--input", "pages.json"]);
        let Commands::Extract(args) = cli.command else {
            panic!("expected extract subcommand");
        };
        assert_eq!(
            args.resolved_db_path(),
            PathBuf::from(".cache/problem-extract/problems.sqlite")
        );
        assert_eq!(
            args.resolved_manifest_path(),
            PathBuf::from(".cache/problem-extract/manifests/extract_run.json")
        );
        assert!(args.jobs.is_none());
    }

    #[test]
    fn merge_accepts_rule_override() {
        let cli = Cli::parse_from([
            "problem-extract",
            "merge",
            "--from",
            "old.json",
            "--improvement-rule",
            "longer-or-answer",
        ]);
        let Commands::Merge(args) = cli.command else {
            panic!("expected merge subcommand");
        };
        assert_eq!(args.from, PathBuf::from("old.json"));
        assert_eq!(
            args.improvement_rule.map(ImprovementRule::from),
            Some(ImprovementRule::LongerOrAnswer)
        );
    }
}
