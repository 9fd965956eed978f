use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use crate::model::Problem;
use crate::util::{ensure_directory, now_utc_string};

const DB_SCHEMA_VERSION: &str = "1.0.0";

/// Columns `status` may group the corpus by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupColumn {
    ProblemType,
    Difficulty,
    Document,
}

impl GroupColumn {
    fn column(self) -> &'static str {
        match self {
            Self::ProblemType => "problem_type",
            Self::Difficulty => "difficulty",
            Self::Document => "document",
        }
    }
}

pub fn open_corpus_db(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        ensure_directory(parent)?;
    }
    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;
    Ok(connection)
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS metadata (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS problems (
              position INTEGER PRIMARY KEY,
              problem_id TEXT NOT NULL,
              document TEXT NOT NULL,
              page INTEGER NOT NULL,
              problem_type TEXT NOT NULL,
              difficulty TEXT NOT NULL,
              confidence_score INTEGER NOT NULL,
              record_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS problem_knowledge_points (
              problem_id TEXT NOT NULL,
              tag TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_problems_problem_id ON problems(problem_id);
            CREATE INDEX IF NOT EXISTS idx_problem_knowledge_points_tag
              ON problem_knowledge_points(tag);
            ",
        )
        .context("failed to create corpus schema")?;

    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// Reads the stored corpus in insertion order. A missing database is an empty
/// corpus, not an error.
pub fn load_problems(db_path: &Path) -> Result<Vec<Problem>> {
    if !db_path.exists() {
        return Ok(Vec::new());
    }

    let connection = open_corpus_db(db_path)?;
    let mut statement = connection
        .prepare("SELECT problem_id, record_json FROM problems ORDER BY position")
        .context("failed to prepare corpus query")?;
    let rows = statement.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut problems = Vec::new();
    for row in rows {
        let (problem_id, record_json) = row?;
        let problem: Problem = serde_json::from_str(&record_json)
            .with_context(|| format!("failed to parse stored record {problem_id}"))?;
        problems.push(problem);
    }
    Ok(problems)
}

/// Replaces the stored corpus with `problems`, keeping their order.
pub fn save_problems(db_path: &Path, problems: &[Problem]) -> Result<usize> {
    let mut connection = open_corpus_db(db_path)?;
    let tx = connection.transaction()?;

    tx.execute("DELETE FROM problem_knowledge_points", [])?;
    tx.execute("DELETE FROM problems", [])?;

    {
        let mut problem_statement = tx.prepare(
            "
            INSERT INTO problems(
              position, problem_id, document, page, problem_type, difficulty,
              confidence_score, record_json
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )?;
        let mut tag_statement =
            tx.prepare("INSERT INTO problem_knowledge_points(problem_id, tag) VALUES(?1, ?2)")?;

        for (position, problem) in problems.iter().enumerate() {
            let record_json = serde_json::to_string(problem)
                .with_context(|| format!("failed to serialize record {}", problem.id))?;
            problem_statement.execute(params![
                position as i64,
                &problem.id,
                &problem.source.document,
                problem.source.page,
                problem.problem_type.as_str(),
                problem.difficulty.as_str(),
                problem.confidence_score,
                record_json
            ])?;

            for tag in &problem.knowledge_points {
                tag_statement.execute(params![&problem.id, tag])?;
            }
        }
    }

    tx.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now_utc_string()],
    )?;
    tx.commit()
        .with_context(|| format!("failed to commit corpus to {}", db_path.display()))?;

    Ok(problems.len())
}

pub fn query_count(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection.query_row(sql, [], |row| row.get(0))?;
    Ok(count)
}

pub fn counts_by(connection: &Connection, group: GroupColumn) -> Result<Vec<(String, i64)>> {
    let column = group.column();
    let sql = format!(
        "SELECT {column}, COUNT(*) AS total FROM problems
         GROUP BY {column} ORDER BY total DESC, {column} ASC"
    );
    collect_counts(connection, &sql, params![])
}

pub fn top_knowledge_points(connection: &Connection, limit: usize) -> Result<Vec<(String, i64)>> {
    collect_counts(
        connection,
        "SELECT tag, COUNT(*) AS total FROM problem_knowledge_points
         GROUP BY tag ORDER BY total DESC, tag ASC LIMIT ?1",
        params![limit as i64],
    )
}

fn collect_counts<P>(connection: &Connection, sql: &str, params: P) -> Result<Vec<(String, i64)>>
where
    P: rusqlite::Params,
{
    let mut statement = connection
        .prepare(sql)
        .with_context(|| format!("failed to prepare count query: {sql}"))?;
    let rows = statement.query_map(params, |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts = Vec::new();
    for row in rows {
        counts.push(row?);
    }
    Ok(counts)
}

pub fn metadata_value(connection: &Connection, key: &str) -> Result<Option<String>> {
    let mut statement = connection.prepare("SELECT value FROM metadata WHERE key = ?1")?;
    let mut rows = statement.query([key])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, ProblemType, Scoring, SourceLocator};

    fn problem(id: &str, problem_type: ProblemType, tags: &[&str]) -> Problem {
        Problem {
            id: id.to_string(),
            source: SourceLocator {
                document: "workbook".to_string(),
                page: 2,
                method: "text_layer".to_string(),
            },
            stem: format!("计算 {id} 的结果是多少"),
            taxonomy: problem_type.taxonomy_label().to_string(),
            problem_type,
            steps: vec!["理解题目要求".to_string()],
            transitions: vec!["首先，理解题目要求。".to_string()],
            scoring: Scoring {
                total: 5,
                steps: vec![5],
            },
            answer: String::new(),
            analysis: String::new(),
            knowledge_points: tags.iter().map(|tag| tag.to_string()).collect(),
            difficulty: Difficulty::Easy,
            grade_level: "4".to_string(),
            extraction_method: "text_layer".to_string(),
            confidence_score: 85,
        }
    }

    #[test]
    fn missing_database_loads_as_empty_corpus() {
        let dir = tempfile::tempdir().expect("tempdir");
        let problems = load_problems(&dir.path().join("absent.sqlite")).expect("load succeeds");
        assert!(problems.is_empty());
    }

    #[test]
    fn save_then_load_preserves_order_and_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("nested").join("corpus.sqlite");
        let records = vec![
            problem("b_p1_001", ProblemType::Geometry, &["面积计算"]),
            problem("a_p1_001", ProblemType::Calculation, &["基础运算"]),
        ];

        assert_eq!(save_problems(&db_path, &records).expect("save succeeds"), 2);
        let loaded = load_problems(&db_path).expect("load succeeds");
        assert_eq!(loaded, records);
    }

    #[test]
    fn save_replaces_previous_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("corpus.sqlite");
        save_problems(
            &db_path,
            &[
                problem("x_p1_001", ProblemType::Calculation, &["加法运算"]),
                problem("x_p1_002", ProblemType::Calculation, &["减法运算"]),
            ],
        )
        .expect("first save");
        save_problems(
            &db_path,
            &[problem("x_p1_003", ProblemType::Geometry, &["周长计算"])],
        )
        .expect("second save");

        let connection = open_corpus_db(&db_path).expect("open");
        assert_eq!(
            query_count(&connection, "SELECT COUNT(*) FROM problems").expect("count"),
            1
        );
        assert_eq!(
            query_count(&connection, "SELECT COUNT(*) FROM problem_knowledge_points")
                .expect("count"),
            1
        );
        assert!(metadata_value(&connection, "db_updated_at")
            .expect("metadata query")
            .is_some());
    }

    #[test]
    fn grouped_counts_order_by_frequency() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("corpus.sqlite");
        save_problems(
            &db_path,
            &[
                problem("g_p1_001", ProblemType::Geometry, &["面积计算", "几何图形"]),
                problem("g_p1_002", ProblemType::Calculation, &["基础运算"]),
                problem("g_p1_003", ProblemType::Geometry, &["面积计算"]),
            ],
        )
        .expect("save");

        let connection = open_corpus_db(&db_path).expect("open");
        let by_type = counts_by(&connection, GroupColumn::ProblemType).expect("type counts");
        assert_eq!(
            by_type,
            vec![("geometry".to_string(), 2), ("calculation".to_string(), 1)]
        );

        let tags = top_knowledge_points(&connection, 1).expect("tag counts");
        assert_eq!(tags, vec![("面积计算".to_string(), 2)]);
    }

    #[test]
    fn unreadable_record_surfaces_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("corpus.sqlite");
        let connection = open_corpus_db(&db_path).expect("open");
        connection
            .execute(
                "INSERT INTO problems(position, problem_id, document, page, problem_type,
                   difficulty, confidence_score, record_json)
                 VALUES(0, 'bad', 'doc', 1, 'calculation', 'easy', 50, '{not json')",
                [],
            )
            .expect("insert");
        drop(connection);

        let error = load_problems(&db_path).expect_err("corrupt record must fail");
        assert!(error.to_string().contains("bad"));
    }
}
