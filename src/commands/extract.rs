use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use super::load_corpus;
use crate::cli::{ExtractArgs, ImprovementRuleArg};
use crate::config::PipelineConfig;
use crate::extract::{PageInput, Pipeline};
use crate::model::{ExtractRunManifest, RunCounts, RunPaths};
use crate::store;
use crate::util::{now_utc_string, read_json, sha256_file, utc_compact_string, write_json_pretty};

pub fn run(args: ExtractArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let db_path = args.resolved_db_path();
    let output_path = args.resolved_output();
    let manifest_path = args.resolved_manifest_path();

    let mut config = PipelineConfig::load(args.config.as_deref())?;
    if let Some(jobs) = args.jobs {
        config.jobs = jobs;
    }
    if let Some(rule) = args.improvement_rule {
        config.improvement_rule = rule.into();
    }
    let pipeline = Pipeline::new(config).context("invalid extraction configuration")?;

    info!(
        run_id = %run_id,
        input = %args.input.display(),
        jobs = pipeline.config().jobs,
        improvement_rule = pipeline.config().improvement_rule.as_str(),
        "starting extraction"
    );

    let input_sha256 = sha256_file(&args.input)?;
    let pages: Vec<PageInput> = read_json(&args.input)?;

    let loaded = load_corpus(&db_path, pipeline.merge_policy());
    let mut warnings = loaded.warning.into_iter().collect::<Vec<String>>();
    let mut corpus = loaded.corpus;
    let corpus_before = corpus.len();

    let summary = pipeline.run(&pages, &mut corpus)?;

    if loaded.writable {
        let saved = store::save_problems(&db_path, corpus.records())?;
        info!(path = %db_path.display(), records = saved, "corpus saved");
    } else {
        warn!(path = %db_path.display(), "corpus store left untouched after load failure");
        warnings.push(format!(
            "corpus store {} was not updated; results exported to {} only",
            db_path.display(),
            output_path.display()
        ));
    }

    write_json_pretty(&output_path, &corpus.records())?;
    info!(
        path = %output_path.display(),
        records = corpus.len(),
        "wrote problem export"
    );

    let stats = summary.stats;
    let manifest = ExtractRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_extract_command(&args),
        input_sha256,
        paths: RunPaths {
            input_path: args.input.display().to_string(),
            db_path: db_path.display().to_string(),
            output_path: output_path.display().to_string(),
            manifest_path: manifest_path.display().to_string(),
        },
        counts: RunCounts {
            pages_total: stats.pages_total,
            pages_skipped: stats.pages_skipped,
            ocr_pages: stats.ocr_pages,
            spans_total: stats.spans_total,
            problems_accepted: stats.problems_accepted,
            rejected_too_short: stats.rejected_too_short,
            rejected_too_long: stats.rejected_too_long,
            rejected_no_math_content: stats.rejected_no_math_content,
            corpus_before,
            corpus_after: corpus.len(),
            merged_unique: summary.merge.unique.len(),
            merged_improved: summary.merge.improved.len(),
            merged_duplicate: summary.merge.duplicate.len(),
        },
        improved_ids: summary.merge.improved.clone(),
        warnings,
    };
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        run_id = %run_id,
        manifest = %manifest_path.display(),
        "extraction finished"
    );

    Ok(())
}

fn render_extract_command(args: &ExtractArgs) -> String {
    let mut command = vec![
        "problem-extract".to_string(),
        "extract".to_string(),
        "--cache-root".to_string(),
        args.cache_root.display().to_string(),
        "--input".to_string(),
        args.input.display().to_string(),
    ];

    if let Some(path) = &args.config {
        command.push("--config".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.db_path {
        command.push("--db-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.output {
        command.push("--output".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.manifest_path {
        command.push("--manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(jobs) = args.jobs {
        command.push("--jobs".to_string());
        command.push(jobs.to_string());
    }
    if let Some(rule) = args.improvement_rule {
        command.push("--improvement-rule".to_string());
        command.push(
            match rule {
                ImprovementRuleArg::LongerWithAnswer => "longer-with-answer",
                ImprovementRuleArg::LongerOrAnswer => "longer-or-answer",
            }
            .to_string(),
        );
    }

    command.join(" ")
}
