use std::collections::{BTreeMap, BTreeSet};

use exam_core::model::{
    AnswerValue, ExamDefinition, ExamId, Question, QuestionId, QuestionKind, ResultRecord, Section,
    SessionId, SessionSnapshot, SessionStatus,
};
use exam_core::time::fixed_now;
use storage::repository::{ExamRepository, ResultRepository, SnapshotRepository};
use storage::sqlite::SqliteRepository;

fn build_definition(id: &str) -> ExamDefinition {
    ExamDefinition::new(
        ExamId::new(id),
        "Academic Reading",
        vec![
            Section {
                name: "Passage 1".to_string(),
                questions: vec![
                    Question {
                        id: QuestionId::new("p1-q1"),
                        order: 0,
                        kind: QuestionKind::SingleChoice {
                            prompt: "Choose one".to_string(),
                            options: vec!["A".to_string(), "B".to_string(), "C".to_string()],
                        },
                    },
                    Question {
                        id: QuestionId::new("p1-q2"),
                        order: 1,
                        kind: QuestionKind::FreeText {
                            prompt: "Complete the sentence".to_string(),
                        },
                    },
                ],
            },
            Section {
                name: "Passage 2".to_string(),
                questions: vec![Question {
                    id: QuestionId::new("p2-q1"),
                    order: 0,
                    kind: QuestionKind::FreeText {
                        prompt: "Summarize".to_string(),
                    },
                }],
            },
        ],
        3600,
        false,
    )
    .unwrap()
}

#[tokio::test]
async fn sqlite_roundtrips_exam_definition() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_exam?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let def = build_definition("reading-academic-1");
    repo.put_exam(&def).await.unwrap();

    let fetched = repo.get_exam(def.id()).await.expect("fetch");
    assert_eq!(fetched, def);
    assert_eq!(fetched.total_questions(), 3);
}

#[tokio::test]
async fn sqlite_snapshot_survives_and_deletes() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_snapshot?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let session_id = SessionId::new();
    let mut answers = BTreeMap::new();
    answers.insert(QuestionId::new("p1-q1"), AnswerValue::selected(["B"]));
    let mut flags = BTreeSet::new();
    flags.insert(QuestionId::new("p1-q2"));

    let snapshot = SessionSnapshot {
        session_id,
        exam_id: ExamId::new("reading-academic-1"),
        status: SessionStatus::UnderReview,
        remaining_seconds: 1200,
        deadline: fixed_now() + chrono::Duration::seconds(1200),
        current_section: 1,
        current_question: 0,
        answers,
        flags,
        submission_attempts: 0,
        started_at: fixed_now(),
    };

    repo.save_snapshot(&snapshot).await.unwrap();
    let loaded = repo.load_snapshot(&session_id).await.unwrap();
    assert_eq!(loaded, Some(snapshot.clone()));

    // Overwrite with a later state; the row is replaced, not duplicated.
    let mut updated = snapshot;
    updated.remaining_seconds = 1100;
    updated.status = SessionStatus::InProgress;
    repo.save_snapshot(&updated).await.unwrap();
    let loaded = repo.load_snapshot(&session_id).await.unwrap().unwrap();
    assert_eq!(loaded.remaining_seconds, 1100);
    assert_eq!(loaded.status, SessionStatus::InProgress);

    repo.delete_snapshot(&session_id).await.unwrap();
    assert!(repo.load_snapshot(&session_id).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_results_deduplicate_on_key() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_results?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let session_id = SessionId::new();
    let mut answers = BTreeMap::new();
    answers.insert(QuestionId::new("p1-q1"), AnswerValue::text("A"));
    let record = ResultRecord {
        session_id,
        exam_id: ExamId::new("reading-academic-1"),
        answers,
        flags: BTreeSet::new(),
        elapsed_seconds: 3400,
        submitted_at: fixed_now(),
    };

    let key = format!("session-{session_id}");
    let first = repo.persist(&key, &record).await.unwrap();
    let second = repo.persist(&key, &record).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(repo.find(&key).await.unwrap(), Some(first));
    assert!(repo.find("session-other").await.unwrap().is_none());
}
