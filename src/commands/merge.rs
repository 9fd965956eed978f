use anyhow::{Result, bail};
use tracing::{info, warn};

use super::load_corpus;
use crate::cli::MergeArgs;
use crate::config::PipelineConfig;
use crate::extract::{MergePolicy, MergeReport, Validator};
use crate::model::Problem;
use crate::store;
use crate::util::{read_json, write_json_pretty};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub merge: MergeReport,
    pub rejected: Vec<String>,
}

/// Folds a previously exported problem set into the stored corpus using the
/// same dedup rules as extraction. Records that fail the stem or record
/// checks are dropped before merging.
pub fn run(args: MergeArgs) -> Result<MergeSummary> {
    let db_path = args.resolved_db_path();
    let output_path = args.resolved_output();

    let mut config = PipelineConfig::load(args.config.as_deref())?;
    if let Some(rule) = args.improvement_rule {
        config.improvement_rule = rule.into();
    }
    let validator = Validator::new(&config)?;

    let incoming: Vec<Problem> = read_json(&args.from)?;
    info!(
        from = %args.from.display(),
        records = incoming.len(),
        improvement_rule = config.improvement_rule.as_str(),
        "merging problem set"
    );

    let loaded = load_corpus(&db_path, MergePolicy::from_config(&config));
    if !loaded.writable {
        bail!(
            "refusing to merge into unreadable corpus at {}",
            db_path.display()
        );
    }
    let mut corpus = loaded.corpus;
    let corpus_before = corpus.len();

    let mut accepted = Vec::with_capacity(incoming.len());
    let mut rejected = Vec::new();
    for problem in incoming {
        match validator.check_record(&problem) {
            Ok(()) => accepted.push(problem),
            Err(defect) => {
                warn!(
                    id = %problem.id,
                    reason = defect.as_str(),
                    detail = ?defect,
                    "incoming record rejected"
                );
                rejected.push(problem.id);
            }
        }
    }

    let report = corpus.merge_all(accepted);
    store::save_problems(&db_path, corpus.records())?;
    write_json_pretty(&output_path, &corpus.records())?;

    info!(
        corpus_before,
        corpus_after = corpus.len(),
        unique = report.unique.len(),
        improved = report.improved.len(),
        duplicate = report.duplicate.len(),
        rejected = rejected.len(),
        output = %output_path.display(),
        "merge finished"
    );

    Ok(MergeSummary {
        merge: report,
        rejected,
    })
}
