use super::classify::Classifier;
use super::dedup::Corpus;
use super::fields::extract_fields;
use super::normalize::TextNormalizer;
use super::ocr_select::OcrCandidate;
use super::pipeline::{PageContent, PageInput, Pipeline};
use super::rules::RuleTable;
use super::segment::segment;
use super::validate::Validator;
use crate::config::PipelineConfig;
use crate::model::{Difficulty, ProblemType};

fn pipeline() -> Pipeline {
    Pipeline::new(PipelineConfig::default()).expect("default config is valid")
}

fn pipeline_with_jobs(jobs: usize) -> Pipeline {
    Pipeline::new(PipelineConfig {
        jobs,
        ..PipelineConfig::default()
    })
    .expect("config with jobs is valid")
}

fn workbook_pages() -> Vec<PageInput> {
    vec![
        PageInput::text("Grade4 Workbook", 1, "1.计算 25+37=？ 答案：62 2.求 48÷6 的商。解析：想乘法口诀。"),
        PageInput::text("Grade4 Workbook", 2, "第 2 页\n①小明有 12 个苹果，吃了 5 个，还剩几个？ ②长方形的长是 8 厘米，宽是 5 厘米，求它的周长。"),
        PageInput::text("Grade4 Workbook", 3, "   "),
        PageInput::ocr(
            "Grade4 Workbook",
            4,
            vec![
                OcrCandidate::new("psm6", Some("abc")),
                OcrCandidate::new("psm4", Some("1.计算 12+8=？ 答案：20")),
                OcrCandidate::new("psm11", None),
            ],
        ),
        PageInput::ocr("Grade4 Workbook", 5, vec![OcrCandidate::new("psm6", None)]),
        PageInput::text("Grade4 Workbook", 6, "练习 1.判断 3 + 4 = 7 是否正确 2.填空：7 × 8 = （  ）"),
        PageInput::text("Grade4 Workbook", 7, "1.Hello world this is prose 2.计算 9 + 9 的和是多少"),
    ]
}

#[test]
fn scenario_a_numbered_problem_is_segmented_and_scored() {
    let rules = RuleTable::standard().expect("rule table compiles");
    let spans = segment(&rules, "1.计算 25+37=？");
    assert_eq!(spans.len(), 1);
    assert_eq!(extract_fields(&rules, &spans[0].text).stem, "计算 25+37=？");

    let outcome = pipeline().process_page(&PageInput::text("Grade4 Workbook", 3, "1.计算 25+37=？"));
    assert_eq!(outcome.problems.len(), 1);

    let problem = &outcome.problems[0];
    assert_eq!(problem.id, "grade4_workbook_p3_001");
    assert_eq!(problem.stem, "计算 25 + 37=？");
    assert_eq!(problem.problem_type, ProblemType::Calculation);
    assert_eq!(problem.taxonomy, "计算题");
    assert_eq!(problem.difficulty, Difficulty::Easy);
    assert_eq!(problem.extraction_method, "text_layer");
    assert_eq!(problem.grade_level, "4");
    assert!(problem.confidence_score >= 70);
    assert_eq!(problem.confidence_score, 85);
}

#[test]
fn scenario_b_noise_is_stripped_before_classification() {
    let normalizer = TextNormalizer::new().expect("normalizer compiles");
    let normalized = normalizer.normalize("pp3 关注微信xxx123456 125 + 36 = ？");
    assert_eq!(normalized, "125 + 36 = ？");

    let validator = Validator::new(&PipelineConfig::default()).expect("validator compiles");
    assert!(validator.check(&normalized).is_accepted());

    let classifier = Classifier::new(&PipelineConfig::default());
    let classification = classifier.classify(&normalized);
    assert_eq!(classification.problem_type, ProblemType::Calculation);
    assert_eq!(classification.difficulty, Difficulty::Easy);
}

#[test]
fn scenario_c_near_identical_problems_merge_to_one_record() {
    let pages = vec![
        PageInput::text("Workbook", 1, "1.计算 25+37=？"),
        PageInput::text("Workbook", 2, "①计算 25+37=？   "),
    ];
    let pipeline = pipeline();
    let mut corpus = Corpus::new(pipeline.merge_policy());
    let summary = pipeline.run(&pages, &mut corpus).expect("run succeeds");

    assert_eq!(summary.problems.len(), 2);
    assert_eq!(summary.merge.unique, vec!["workbook_p1_001"]);
    assert_eq!(summary.merge.duplicate, vec!["workbook_p2_001"]);
    assert_eq!(corpus.len(), 1);
}

#[test]
fn scenario_d_overlong_stem_is_rejected() {
    let text = format!("1.计算{}", "题".repeat(848));
    let outcome = pipeline().process_page(&PageInput::text("Workbook", 1, &text));

    assert!(outcome.problems.is_empty());
    assert_eq!(outcome.stats.spans_total, 1);
    assert_eq!(outcome.stats.rejected_too_long, 1);
}

#[test]
fn scenario_e_longer_record_with_answer_replaces_existing() {
    let shared = format!("求{}", "小".repeat(99));
    let longer = format!("{shared}{}", "明".repeat(30));
    let pipeline = pipeline();
    let mut corpus = Corpus::new(pipeline.merge_policy());

    pipeline
        .run(&[PageInput::text("Workbook", 1, &format!("1.{shared}"))], &mut corpus)
        .expect("first run succeeds");
    let summary = pipeline
        .run(
            &[PageInput::text("Workbook", 2, &format!("1.{longer} 答案：60"))],
            &mut corpus,
        )
        .expect("second run succeeds");

    assert_eq!(summary.merge.improved, vec!["workbook_p2_001"]);
    assert_eq!(corpus.len(), 1);
    assert_eq!(corpus.records()[0].id, "workbook_p2_001");
    assert_eq!(corpus.records()[0].stem, longer);
    assert_eq!(corpus.records()[0].answer, "60");
}

#[test]
fn answer_and_analysis_are_attached_per_span() {
    let outcome = pipeline().process_page(&workbook_pages()[0]);
    let stems = outcome
        .problems
        .iter()
        .map(|problem| problem.stem.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(stems, vec!["计算 25 + 37=？", "求 48 ÷ 6 的商。"]);
    assert_eq!(outcome.problems[0].answer, "62");
    assert_eq!(outcome.problems[1].analysis, "想乘法口诀");
    assert_eq!(outcome.problems[1].id, "grade4_workbook_p1_002");
}

#[test]
fn promo_text_before_first_marker_keeps_every_problem() {
    let page = PageInput::text("Book", 1, "关注微信 1.计算 25+37=？ 2.求 48÷6 的商是多少");
    let outcome = pipeline().process_page(&page);

    let ids = outcome
        .problems
        .iter()
        .map(|problem| problem.id.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(ids, vec!["book_p1_001", "book_p1_002"]);
    assert_eq!(outcome.problems[0].stem, "计算 25 + 37=？");
}

#[test]
fn ocr_page_uses_best_candidate_and_records_variant() {
    let outcome = pipeline().process_page(&workbook_pages()[3]);
    assert_eq!(outcome.stats.ocr_pages, 1);
    assert_eq!(outcome.problems.len(), 1);
    assert_eq!(outcome.problems[0].extraction_method, "ocr:psm4");
    assert_eq!(outcome.problems[0].source.method, "ocr:psm4");
    assert_eq!(outcome.problems[0].answer, "20");
}

#[test]
fn blank_and_failed_pages_are_skipped_not_errors() {
    let pages = workbook_pages();
    let blank = pipeline().process_page(&pages[2]);
    let failed_ocr = pipeline().process_page(&pages[4]);

    assert_eq!(blank.stats.pages_skipped, 1);
    assert!(blank.problems.is_empty());
    assert_eq!(failed_ocr.stats.pages_skipped, 1);
    assert_eq!(failed_ocr.stats.ocr_pages, 1);
}

#[test]
fn rejected_spans_do_not_consume_later_ids() {
    let outcome = pipeline().process_page(&workbook_pages()[6]);
    assert_eq!(outcome.stats.rejected_no_math_content, 1);
    assert_eq!(outcome.problems.len(), 1);
    assert_eq!(outcome.problems[0].id, "grade4_workbook_p7_002");
}

#[test]
fn extraction_is_deterministic_including_ids() {
    let pages = workbook_pages();
    let first = pipeline().process_pages(&pages).expect("first pass");
    let second = pipeline().process_pages(&pages).expect("second pass");
    assert_eq!(first, second);
}

#[test]
fn parallel_workers_match_sequential_output() {
    let pages = workbook_pages();
    let sequential = pipeline_with_jobs(1)
        .process_pages(&pages)
        .expect("sequential pass");
    let parallel = pipeline_with_jobs(3)
        .process_pages(&pages)
        .expect("parallel pass");

    assert_eq!(sequential, parallel);
    let pages_seen = parallel
        .iter()
        .map(|outcome| outcome.page_number)
        .collect::<Vec<u32>>();
    assert_eq!(pages_seen, vec![1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn accepted_records_respect_length_confidence_and_scoring_invariants() {
    let pipeline = pipeline();
    let mut corpus = Corpus::new(pipeline.merge_policy());
    let summary = pipeline
        .run(&workbook_pages(), &mut corpus)
        .expect("run succeeds");

    assert!(!summary.problems.is_empty());
    for problem in &summary.problems {
        let length = problem.stem.chars().count();
        assert!((10..=800).contains(&length), "{} has length {length}", problem.id);
        assert!(problem.confidence_score <= 100);
        assert_eq!(
            problem.scoring.steps.iter().sum::<u32>(),
            problem.scoring.total
        );
        assert_eq!(problem.steps.len(), problem.transitions.len());
        assert!(!problem.knowledge_points.is_empty());
    }
    assert_eq!(summary.stats.pages_total, 7);
    assert_eq!(summary.stats.problems_accepted, summary.problems.len());
}

#[test]
fn rerunning_the_same_pages_leaves_corpus_unchanged() {
    let pipeline = pipeline();
    let pages = workbook_pages();
    let mut corpus = Corpus::new(pipeline.merge_policy());

    let first = pipeline.run(&pages, &mut corpus).expect("first run");
    let snapshot = corpus.records().to_vec();
    let second = pipeline.run(&pages, &mut corpus).expect("second run");

    assert_eq!(corpus.records(), snapshot.as_slice());
    assert!(second.merge.unique.is_empty());
    assert!(second.merge.improved.is_empty());
    assert_eq!(second.merge.duplicate.len(), first.problems.len());
}

#[test]
fn invalid_configuration_is_rejected_before_running() {
    let error = Pipeline::new(PipelineConfig {
        min_stem_length: 0,
        ..PipelineConfig::default()
    })
    .expect_err("zero minimum must fail");
    assert!(error.to_string().contains("minStemLength"));
}

#[test]
fn page_manifest_json_uses_camel_case_and_content_tags() {
    let raw = r#"[
        { "documentId": "book", "pageNumber": 1, "text": "1.计算 1+1=？" },
        { "documentId": "book", "pageNumber": 2, "ocrCandidates": [
            { "variant": "psm6", "text": null },
            { "variant": "psm4", "text": "计算" }
        ] }
    ]"#;
    let pages: Vec<PageInput> = serde_json::from_str(raw).expect("page manifest parses");
    assert_eq!(pages[0], PageInput::text("book", 1, "1.计算 1+1=？"));
    assert!(matches!(
        &pages[1].content,
        PageContent::OcrCandidates(candidates) if candidates.len() == 2
    ));
}
