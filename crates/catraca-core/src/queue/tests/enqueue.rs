use super::*;

use serde::ser::Error as _;

#[tokio::test]
async fn enqueue_json_payload_lands_in_queue() {
    let (store, engine) = test_engine();

    engine
        .enqueue("jobs", &serde_json::json!({"id": 1}), Schedule::Immediate)
        .await
        .unwrap();

    assert_eq!(engine.len("jobs").await.unwrap(), 1);
    let popped = store.zpop_min("jobs", 1).await.unwrap();
    assert_eq!(popped[0].member, br#"{"id":1}"#);
    assert_eq!(popped[0].score, 0.0);
}

#[tokio::test]
async fn enqueue_raw_preserves_bytes_exactly() {
    let (store, engine) = test_engine();

    // Not valid UTF-8, not valid JSON. Must come back untouched.
    let payload = vec![0x00, 0xff, 0x80, 0x7f, 0x01];
    engine
        .enqueue_raw("jobs", payload.clone(), Schedule::Immediate)
        .await
        .unwrap();

    let popped = store.zpop_min("jobs", 1).await.unwrap();
    assert_eq!(popped[0].member, payload);
}

#[tokio::test]
async fn identical_payloads_collapse_to_one_member() {
    let (_store, engine) = test_engine();

    for _ in 0..3 {
        engine
            .enqueue_raw("jobs", b"same".to_vec(), Schedule::Immediate)
            .await
            .unwrap();
    }

    // Documented contract: callers embed their own unique id in the payload.
    assert_eq!(engine.len("jobs").await.unwrap(), 1);
}

#[tokio::test]
async fn encode_error_never_enters_queue() {
    struct Unencodable;
    impl serde::Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("cannot encode"))
        }
    }

    let (_store, engine) = test_engine();
    let err = engine
        .enqueue("jobs", &Unencodable, Schedule::Immediate)
        .await
        .unwrap_err();

    assert!(matches!(err, EnqueueError::Encode(_)), "got {err:?}");
    assert_eq!(engine.len("jobs").await.unwrap(), 0);
}

#[tokio::test]
async fn schedule_maps_to_scores() {
    let (store, engine) = test_engine();

    engine
        .enqueue_raw("d", b"x".to_vec(), Schedule::DelayedUntil(1_700_000_000_000))
        .await
        .unwrap();
    let popped = store.zpop_min("d", 1).await.unwrap();
    assert_eq!(popped[0].score, 1_700_000_000_000.0);

    engine
        .enqueue_raw("p", b"x".to_vec(), Schedule::PriorityRank(7))
        .await
        .unwrap();
    let popped = store.zpop_min("p", 1).await.unwrap();
    assert_eq!(popped[0].score, 7.0);

    let before = unix_ms();
    engine
        .enqueue_raw("b", b"x".to_vec(), Schedule::DelayedBy(Duration::from_secs(60)))
        .await
        .unwrap();
    let after = unix_ms();
    let popped = store.zpop_min("b", 1).await.unwrap();
    assert!(popped[0].score >= (before + 60_000) as f64);
    assert!(popped[0].score <= (after + 60_000) as f64);
}

#[tokio::test]
async fn enqueue_surfaces_store_errors() {
    let engine = QueueEngine::new(Arc::new(BrokenStore));
    let err = engine
        .enqueue_raw("jobs", b"x".to_vec(), Schedule::Immediate)
        .await
        .unwrap_err();
    assert!(matches!(err, EnqueueError::Store(_)), "got {err:?}");
}
