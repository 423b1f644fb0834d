//! Session transition and collection load behavior of the sync engine

mod support;

use anyhow::Result;
use movie_shelf_sync::{
    CollectionKind, CollectionSnapshot, LoadState, MovieId, MutationOutcome, Session, SyncError,
    UserId,
};
use serde_json::json;
use support::{engine, Op};

fn ids(values: &[i64]) -> Vec<MovieId> {
    values.iter().copied().map(MovieId::Number).collect()
}

#[tokio::test]
async fn test_sign_in_loads_all_collections() -> Result<()> {
    let (store, sync) = engine();
    store.seed("users/alice/favorites", json!([550, 680]));
    store.seed("users/alice/mustWatch", json!([13]));
    store.seed("users/alice/reviews", json!({"550": "Rewatchable", "13": "Long"}));

    let report = sync
        .on_session_change(Session::authenticated("alice"))
        .await
        .expect("sign in should start a load");

    assert!(report.is_complete());
    assert_eq!(report.loaded.len(), 3);
    assert_eq!(report.user_id, UserId::new("alice"));

    let snapshot = sync.snapshot();
    assert_eq!(snapshot.user_id, Some(UserId::new("alice")));
    assert_eq!(snapshot.favorites.as_slice(), ids(&[550, 680]).as_slice());
    assert_eq!(snapshot.must_watch.as_slice(), ids(&[13]).as_slice());
    assert_eq!(snapshot.review_for(&MovieId::Number(550)), Some("Rewatchable"));
    assert_eq!(snapshot.status.get(CollectionKind::Reviews), LoadState::Loaded);
    Ok(())
}

#[tokio::test]
async fn test_new_user_with_no_data_gets_empty_collections() {
    let (store, sync) = engine();

    let report = sync
        .on_session_change(Session::authenticated("newcomer"))
        .await
        .unwrap();

    assert!(report.is_complete());
    let snapshot = sync.snapshot();
    assert!(snapshot.is_empty());
    assert_eq!(snapshot.user_id, Some(UserId::new("newcomer")));
    assert!(!snapshot.status.is_loading());
    assert!(snapshot.status.failed().is_empty());
    assert!(store.inner.writes().is_empty());
}

#[tokio::test]
async fn test_loaded_data_is_normalized() {
    let (store, sync) = engine();
    store.seed("users/u1/favorites", json!({"0": 5, "2": 9, "1": null}));
    store.seed("users/u1/mustWatch", json!([3, 3, 4, null]));
    store.seed("users/u1/reviews", json!([null, "ok"]));

    sync.on_session_change(Session::authenticated("u1")).await;

    let snapshot = sync.snapshot();
    assert_eq!(snapshot.favorites.as_slice(), ids(&[5, 9]).as_slice());
    assert_eq!(snapshot.must_watch.as_slice(), ids(&[3, 4]).as_slice());
    assert_eq!(snapshot.reviews.len(), 1);
    assert_eq!(snapshot.review_for(&MovieId::Number(1)), Some("ok"));
}

#[tokio::test]
async fn test_sign_out_clears_everything_immediately() {
    let (store, sync) = engine();
    store.seed("users/u1/favorites", json!([1, 2]));
    store.seed("users/u1/mustWatch", json!([3]));
    store.seed("users/u1/reviews", json!({"1": "good"}));
    sync.on_session_change(Session::authenticated("u1")).await;
    assert!(!sync.snapshot().is_empty());

    let load = sync.begin_session(Session::Anonymous);
    assert!(load.is_none());

    assert_eq!(sync.snapshot(), CollectionSnapshot::default());
    assert_eq!(sync.session(), Session::Anonymous);
}

#[tokio::test]
async fn test_anonymous_mutations_require_session() {
    let (store, sync) = engine();

    assert_eq!(
        sync.add_to_favorites(&MovieId::Number(1)).await.unwrap(),
        MutationOutcome::SessionRequired
    );
    assert_eq!(
        sync.remove_from_must_watch(&MovieId::Number(1)).await.unwrap(),
        MutationOutcome::SessionRequired
    );
    assert_eq!(
        sync.upsert_review(&MovieId::Number(1), "hi").await.unwrap(),
        MutationOutcome::SessionRequired
    );
    assert!(store.inner.writes().is_empty());
    assert!(sync.snapshot().is_empty());
}

#[tokio::test]
async fn test_switching_users_replaces_collections() {
    let (store, sync) = engine();
    store.seed("users/a/favorites", json!([1]));
    store.seed("users/b/favorites", json!([2]));

    sync.on_session_change(Session::authenticated("a")).await;
    sync.on_session_change(Session::authenticated("b")).await;

    let snapshot = sync.snapshot();
    assert_eq!(snapshot.user_id, Some(UserId::new("b")));
    assert_eq!(snapshot.favorites.as_slice(), ids(&[2]).as_slice());
}

#[tokio::test]
async fn test_failed_load_is_flagged_while_others_load() {
    let (store, sync) = engine();
    store.seed("users/u1/favorites", json!([7]));
    store.seed("users/u1/reviews", json!({"7": "great"}));
    store.fail(Op::Read, "users/u1/reviews", 1);

    let report = sync
        .on_session_change(Session::authenticated("u1"))
        .await
        .unwrap();

    assert!(report.has_failures());
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        &report.failures[0],
        SyncError::RemoteReadFailed {
            collection: CollectionKind::Reviews,
            ..
        }
    ));
    assert_eq!(report.loaded.len(), 2);

    let snapshot = sync.snapshot();
    assert!(snapshot.contains_favorite(&MovieId::Number(7)));
    assert!(snapshot.reviews.is_empty());
    assert_eq!(snapshot.status.failed(), vec![CollectionKind::Reviews]);

    let reload = sync.reload_failed().await.unwrap();
    assert_eq!(reload.loaded, vec![CollectionKind::Reviews]);
    assert_eq!(sync.snapshot().review_for(&MovieId::Number(7)), Some("great"));
    assert!(sync.snapshot().status.failed().is_empty());
}

#[tokio::test]
async fn test_set_mutation_refused_while_collection_failed() {
    let (store, sync) = engine();
    store.seed("users/u1/favorites", json!([1, 2]));
    store.fail(Op::Read, "users/u1/favorites", 1);
    sync.on_session_change(Session::authenticated("u1")).await;

    let result = sync.add_to_favorites(&MovieId::Number(3)).await;
    assert!(matches!(
        result,
        Err(SyncError::CollectionUnavailable {
            collection: CollectionKind::Favorites
        })
    ));
    // the unseen remote list was not overwritten
    assert!(store.writes_to("users/u1/favorites").is_empty());

    // other collections are unaffected
    assert_eq!(
        sync.add_to_must_watch(&MovieId::Number(3)).await.unwrap(),
        MutationOutcome::Applied
    );

    sync.reload_failed().await.unwrap();
    assert_eq!(
        sync.add_to_favorites(&MovieId::Number(3)).await.unwrap(),
        MutationOutcome::Applied
    );
    assert_eq!(store.get("users/u1/favorites"), Some(json!([1, 2, 3])));
}

#[tokio::test]
async fn test_load_for_previous_user_is_discarded() {
    let (store, sync) = engine();
    store.seed("users/a/favorites", json!([1]));
    store.seed("users/b/favorites", json!([2]));
    let gate = store.hold(Op::Read, "users/a/favorites");

    let load_a = sync.begin_session(Session::authenticated("a")).unwrap();
    let task_a = tokio::spawn(load_a.run());
    gate.arrived().await;

    let report_b = sync
        .on_session_change(Session::authenticated("b"))
        .await
        .unwrap();
    assert!(report_b.is_complete());

    gate.release();
    let report_a = task_a.await.unwrap();
    assert_eq!(report_a.superseded, vec![CollectionKind::Favorites]);

    let snapshot = sync.snapshot();
    assert_eq!(snapshot.user_id, Some(UserId::new("b")));
    assert_eq!(snapshot.favorites.as_slice(), ids(&[2]).as_slice());
}

#[tokio::test]
async fn test_load_resolving_after_sign_out_is_discarded() {
    let (store, sync) = engine();
    store.seed("users/a/mustWatch", json!([4]));
    let gate = store.hold(Op::Read, "users/a/mustWatch");

    let load = sync.begin_session(Session::authenticated("a")).unwrap();
    let task = tokio::spawn(load.run());
    gate.arrived().await;

    sync.begin_session(Session::Anonymous);
    gate.release();
    let report = task.await.unwrap();

    assert_eq!(report.superseded, vec![CollectionKind::MustWatch]);
    assert_eq!(sync.snapshot(), CollectionSnapshot::default());
}

#[tokio::test]
async fn test_mutation_waits_for_in_flight_load() {
    let (store, sync) = engine();
    store.seed("users/u1/favorites", json!([1, 2]));
    let gate = store.hold(Op::Read, "users/u1/favorites");

    let load = sync.begin_session(Session::authenticated("u1")).unwrap();
    let load_task = tokio::spawn(load.run());
    gate.arrived().await;

    let add = tokio::spawn({
        let sync = sync.clone();
        async move { sync.add_to_favorites(&MovieId::Number(3)).await }
    });
    tokio::task::yield_now().await;
    assert!(store.writes_to("users/u1/favorites").is_empty());

    gate.release();
    load_task.await.unwrap();
    assert_eq!(add.await.unwrap().unwrap(), MutationOutcome::Applied);

    assert_eq!(sync.snapshot().favorites.as_slice(), ids(&[1, 2, 3]).as_slice());
    assert_eq!(store.get("users/u1/favorites"), Some(json!([1, 2, 3])));
}

#[tokio::test]
async fn test_subscribers_observe_transitions() {
    let (store, sync) = engine();
    store.seed("users/u1/favorites", json!([9]));
    let mut rx = sync.subscribe();

    sync.on_session_change(Session::authenticated("u1")).await;
    let loaded = rx
        .wait_for(|snapshot| snapshot.contains_favorite(&MovieId::Number(9)))
        .await
        .unwrap()
        .clone();
    assert_eq!(loaded.user_id, Some(UserId::new("u1")));

    sync.on_session_change(Session::Anonymous).await;
    rx.changed().await.unwrap();
    assert!(rx.borrow().is_empty());
}

#[tokio::test]
async fn test_malformed_user_id_never_touches_the_store() {
    let (store, sync) = engine();
    store.seed("users/favorites", json!([1]));

    for bad in ["", "a/b", "../b", "x[0]"] {
        let load = sync.begin_session(Session::authenticated(bad));
        assert!(load.is_none());
        assert_eq!(sync.session(), Session::Anonymous);
        assert_eq!(
            sync.add_to_favorites(&MovieId::Number(5)).await.unwrap(),
            MutationOutcome::SessionRequired
        );
    }
    assert!(store.inner.writes().is_empty());
    assert!(sync.snapshot().is_empty());
}
