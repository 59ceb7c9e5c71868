use quiz_core::grading::Verdict;
use quiz_core::model::{
    Answer, AnswerId, AnswerSet, CourseId, Question, QuestionId, SessionTarget, SessionTrail,
    TopicId, TrailEntry, TrailRecord, TrailSelection, UserId,
};
use quiz_core::time::fixed_now;
use storage::repository::{CredentialStore, Credentials, StorageError, TrailStore};
use storage::sqlite::SqliteRepository;

async fn repo(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn trail_with(question_ids: &[u64]) -> SessionTrail {
    let mut trail = SessionTrail::new();
    for id in question_ids {
        let qid = QuestionId::new(*id);
        let answers = AnswerSet::new(
            qid,
            vec![Answer::new(AnswerId::new(id * 10), qid, "Bratislava", true)],
        )
        .unwrap();
        trail.record(TrailEntry {
            question: Question::new(qid, TopicId::new(1), format!("Q{id}"), fixed_now())
                .with_text_answer(),
            answers,
            selection: TrailSelection::Text("bratislava".into()),
            verdict: Verdict::Correct,
        });
    }
    trail
}

#[tokio::test]
async fn sqlite_trail_is_overwritten_wholesale() {
    let repo = repo("memdb_trail_overwrite").await;
    let target = SessionTarget::Challenge(CourseId::new(3));

    repo.save_trail(&TrailRecord::new(target, fixed_now(), trail_with(&[1, 2, 3])))
        .await
        .unwrap();
    repo.save_trail(&TrailRecord::new(target, fixed_now(), trail_with(&[7])))
        .await
        .unwrap();

    let loaded = repo.load_trail().await.unwrap().expect("trail stored");
    assert_eq!(loaded.trail.len(), 1);
    assert_eq!(loaded.trail.entries()[0].question.id, QuestionId::new(7));
    assert_eq!(loaded.target, target);
}

#[tokio::test]
async fn sqlite_clear_trail_is_idempotent() {
    let repo = repo("memdb_trail_clear").await;
    repo.clear_trail().await.unwrap();

    let record = TrailRecord::new(
        SessionTarget::Topic(TopicId::new(1)),
        fixed_now(),
        trail_with(&[1]),
    );
    repo.save_trail(&record).await.unwrap();
    repo.clear_trail().await.unwrap();
    repo.clear_trail().await.unwrap();
    assert!(repo.load_trail().await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_rejects_foreign_schema_versions() {
    let repo = repo("memdb_trail_schema").await;
    let record = TrailRecord::new(
        SessionTarget::Topic(TopicId::new(1)),
        fixed_now(),
        trail_with(&[1]),
    );
    let mut json = serde_json::to_value(&record).unwrap();
    json["schema_version"] = serde_json::json!(0);

    sqlx::query("INSERT INTO key_values (key, value, updated_at) VALUES ('session_trail', ?1, '')")
        .bind(json.to_string())
        .execute(repo.pool())
        .await
        .unwrap();

    let err = repo.load_trail().await.unwrap_err();
    assert!(matches!(err, StorageError::SchemaMismatch { found: 0, .. }));
}

#[tokio::test]
async fn sqlite_credentials_roundtrip() {
    let repo = repo("memdb_credentials").await;
    assert!(repo.load_credentials().await.unwrap().is_none());

    let mut creds = Credentials::new("a1", "r1");
    creds.user_id = UserId::new("42");
    creds.username = Some("jozef".into());
    repo.save_credentials(&creds).await.unwrap();
    assert_eq!(repo.load_credentials().await.unwrap(), Some(creds));

    repo.clear_credentials().await.unwrap();
    assert!(repo.load_credentials().await.unwrap().is_none());
}

#[tokio::test]
async fn migrations_are_rerunnable() {
    let repo = repo("memdb_migrate_twice").await;
    repo.migrate().await.expect("second migrate");
}
