use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::store::{self, GroupColumn};

pub fn run(args: StatusArgs) -> Result<()> {
    let db_path = args.resolved_db_path();
    info!(path = %db_path.display(), "status requested");

    if !db_path.exists() {
        warn!(path = %db_path.display(), "corpus database missing");
        return Ok(());
    }

    let connection = store::open_corpus_db(&db_path)?;
    let problems = store::query_count(&connection, "SELECT COUNT(*) FROM problems").unwrap_or(0);
    let answered = store::query_count(
        &connection,
        "SELECT COUNT(*) FROM problems WHERE json_extract(record_json, '$.answer') <> ''",
    )
    .unwrap_or(0);
    let average_confidence = connection
        .query_row(
            "SELECT COALESCE(AVG(confidence_score), 0.0) FROM problems",
            [],
            |row| row.get::<_, f64>(0),
        )
        .unwrap_or(0.0);

    let schema_version =
        store::metadata_value(&connection, "db_schema_version")?.unwrap_or_default();
    let updated_at = store::metadata_value(&connection, "db_updated_at")?.unwrap_or_default();

    info!(
        path = %db_path.display(),
        schema_version = %schema_version,
        updated_at = %updated_at,
        problems,
        answered,
        average_confidence,
        "corpus status"
    );

    for (label, group) in [
        ("type", GroupColumn::ProblemType),
        ("difficulty", GroupColumn::Difficulty),
        ("document", GroupColumn::Document),
    ] {
        for (value, count) in store::counts_by(&connection, group)? {
            info!(group = label, value = %value, count, "corpus breakdown");
        }
    }

    for (rank, (tag, count)) in store::top_knowledge_points(&connection, args.top_knowledge_points)?
        .into_iter()
        .enumerate()
    {
        info!(rank = rank + 1, tag = %tag, count, "knowledge point");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_on_missing_database_is_not_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let args = StatusArgs {
            cache_root: dir.path().to_path_buf(),
            db_path: None,
            top_knowledge_points: 5,
        };
        assert!(run(args).is_ok());
        assert!(!dir.path().join("problems.sqlite").exists());
    }

    #[test]
    fn status_reads_an_empty_corpus() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("corpus.sqlite");
        store::save_problems(&db_path, &[]).expect("create empty corpus");

        let args = StatusArgs {
            cache_root: dir.path().to_path_buf(),
            db_path: Some(db_path),
            top_knowledge_points: 5,
        };
        assert!(run(args).is_ok());
    }
}
