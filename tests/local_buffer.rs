use tagbridge_core::buffer::models::{NewFact, NewLocalLogEntry};
use tagbridge_core::buffer::LocalBuffer;

fn temp_buffer() -> (LocalBuffer, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");
    let buffer = LocalBuffer::connect(path.to_str().unwrap()).unwrap();
    (buffer, dir)
}

#[tokio::test]
async fn facts_survive_until_explicitly_drained() {
    let (buffer, _dir) = temp_buffer();
    let now = chrono::Utc::now().naive_utc();

    buffer
        .insert_facts(vec![
            NewFact { tag_id: 1, time: now, val: 1.5 },
            NewFact { tag_id: 2, time: now, val: -2.25 },
        ])
        .await
        .unwrap();

    assert_eq!(buffer.facts_until(now).await.unwrap().len(), 2);

    let deleted = buffer.delete_facts_until(now).await.unwrap();
    assert_eq!(deleted, 2);
    assert!(buffer.facts_until(now).await.unwrap().is_empty());
}

#[tokio::test]
async fn logs_stage_and_drain_like_facts() {
    let (buffer, _dir) = temp_buffer();
    let now = chrono::Utc::now().naive_utc();

    buffer
        .insert_log(NewLocalLogEntry {
            time: now,
            message: "source started".into(),
            level: "Info".into(),
            daemon_id: 1,
        })
        .await
        .unwrap();

    let staged = buffer.logs_until(now).await.unwrap();
    assert_eq!(staged.len(), 1);
    assert_eq!(staged[0].message, "source started");

    let deleted = buffer.delete_logs_until(now).await.unwrap();
    assert_eq!(deleted, 1);
}

#[tokio::test]
async fn reopening_the_same_path_preserves_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");
    let now = chrono::Utc::now().naive_utc();

    {
        let buffer = LocalBuffer::connect(path.to_str().unwrap()).unwrap();
        buffer
            .insert_facts(vec![NewFact { tag_id: 7, time: now, val: 9.0 }])
            .await
            .unwrap();
    }

    let reopened = LocalBuffer::connect(path.to_str().unwrap()).unwrap();
    let staged = reopened.facts_until(now).await.unwrap();
    assert_eq!(staged.len(), 1);
}
