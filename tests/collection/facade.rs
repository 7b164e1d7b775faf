//! Mutation streams on `Collection`.

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use rx_collection::{
    AllowDenyRules, Collection, CollectionError, CollectionOptions, CollectionSource, MemoryStore,
    MutationError, Observer, OperationKind, StoreError, UpdateOptions, UpsertResult,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::support::{settle_tasks, Event, FailingStore, GatedStore, Recorder};

fn tasks() -> Collection {
    Collection::new("tasks", CollectionOptions::default()).expect("collection")
}

fn wrap(store: Arc<MemoryStore>) -> Collection {
    Collection::new(CollectionSource::existing(store), CollectionOptions::default())
        .expect("collection")
}

// ============================================================================
// insert
// ============================================================================

#[tokio::test]
async fn insert_into_empty_collection_emits_generated_id_then_completes() {
    let c = tasks();
    let rec = Recorder::attach(&c.insert(&json!({})));

    let events = rec.finished().await;
    assert_eq!(events.len(), 2, "got {events:?}");
    let Event::Next(id) = &events[0] else {
        panic!("expected next, got {events:?}");
    };
    assert_eq!(id.len(), 17);
    assert_eq!(events[1], Event::Complete);
}

#[tokio::test]
async fn insert_keeps_supplied_id() {
    let c = tasks();
    let rec = Recorder::attach(&c.insert(&json!({ "_id": "mine", "v": 1 })));
    assert_eq!(
        rec.finished().await,
        vec![Event::Next("mine".to_string()), Event::Complete]
    );
}

#[tokio::test]
async fn duplicate_insert_fails_through_error_callback() {
    let store = Arc::new(MemoryStore::named("dup"));
    store.seed(vec![json!({ "_id": "a" })]).unwrap();
    let c = wrap(store);

    let rec = Recorder::attach(&c.insert(&json!({ "_id": "a" })));
    let events = rec.finished().await;
    assert_eq!(
        events,
        vec![Event::Error(CollectionError::Mutation(MutationError::new(
            OperationKind::Insert,
            StoreError::DuplicateId {
                collection: "dup".to_string(),
                id: "a".to_string(),
            },
        )))]
    );
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Grid {
    cells: BTreeMap<(i32, i32), String>,
}

#[tokio::test]
async fn unserializable_document_fails_asynchronously() {
    let c: Collection<Grid> = Collection::new("grids", CollectionOptions::default()).unwrap();
    let mut cells = BTreeMap::new();
    cells.insert((0, 0), "x".to_string());

    let stream = c.insert(&Grid { cells });
    let rec = Recorder::attach(&stream);

    let events = rec.finished().await;
    assert!(
        matches!(
            events.as_slice(),
            [Event::Error(CollectionError::Mutation(MutationError {
                kind: OperationKind::Insert,
                source: StoreError::InvalidDocument(_),
            }))]
        ),
        "got {events:?}"
    );
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Task {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    title: String,
    done: bool,
}

#[tokio::test]
async fn typed_documents_round_trip_through_the_store() {
    let c: Collection<Task> = Collection::new("typed", CollectionOptions::default()).unwrap();
    let task = Task {
        id: None,
        title: "write docs".to_string(),
        done: false,
    };

    let rec = Recorder::attach(&c.insert(&task));
    let Event::Next(id) = rec.finished().await[0].clone() else {
        panic!("insert failed");
    };

    let stored = c.find_one(Some(id.clone().into()), None).unwrap().unwrap();
    assert_eq!(stored, Task { id: Some(id), ..task });
}

// ============================================================================
// remove / update / upsert
// ============================================================================

#[tokio::test]
async fn remove_by_id_string_emits_count() {
    let store = Arc::new(MemoryStore::named("r"));
    store.seed(vec![json!({ "_id": "a" }), json!({ "_id": "b" })]).unwrap();
    let c = wrap(Arc::clone(&store));

    let rec = Recorder::attach(&c.remove("a"));
    assert_eq!(rec.finished().await, vec![Event::Next(1), Event::Complete]);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn update_multi_over_three_matches_emits_three() {
    let store = Arc::new(MemoryStore::named("u"));
    store
        .seed(vec![
            json!({ "k": 1 }),
            json!({ "k": 1 }),
            json!({ "k": 1 }),
            json!({ "k": 2 }),
        ])
        .unwrap();
    let c = wrap(store);

    let stream = c.update(
        json!({ "k": 1 }),
        json!({ "$set": { "seen": true } }),
        Some(UpdateOptions {
            multi: true,
            ..Default::default()
        }),
    );
    let rec = Recorder::attach(&stream);
    assert_eq!(rec.finished().await, vec![Event::Next(3), Event::Complete]);
}

#[tokio::test]
async fn update_without_multi_modifies_one() {
    let store = Arc::new(MemoryStore::named("u1"));
    store.seed(vec![json!({ "k": 1 }), json!({ "k": 1 })]).unwrap();
    let c = wrap(store);

    let rec = Recorder::attach(&c.update(json!({ "k": 1 }), json!({ "$inc": { "n": 1 } }), None));
    assert_eq!(rec.finished().await, vec![Event::Next(1), Event::Complete]);
}

#[tokio::test]
async fn update_with_upsert_option_inserts_when_nothing_matches() {
    let store = Arc::new(MemoryStore::named("uu"));
    let c = wrap(Arc::clone(&store));

    let stream = c.update(
        json!({ "slug": "home" }),
        json!({ "$set": { "views": 1 } }),
        Some(UpdateOptions {
            upsert: true,
            ..Default::default()
        }),
    );
    let rec = Recorder::attach(&stream);
    assert_eq!(rec.finished().await, vec![Event::Next(1), Event::Complete]);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn upsert_reports_inserted_id_then_plain_count() {
    let c = tasks();

    let first = Recorder::attach(&c.upsert(json!({ "slug": "a" }), json!({ "$set": { "n": 1 } }), None));
    let events = first.finished().await;
    let Event::Next(UpsertResult {
        count: 1,
        inserted_id: Some(id),
    }) = &events[0]
    else {
        panic!("expected an insert, got {events:?}");
    };

    let second = Recorder::attach(&c.upsert(json!({ "slug": "a" }), json!({ "$inc": { "n": 1 } }), None));
    assert_eq!(
        second.finished().await,
        vec![
            Event::Next(UpsertResult {
                count: 1,
                inserted_id: None,
            }),
            Event::Complete,
        ]
    );

    let doc = c.find_one(Some(id.as_str().into()), None).unwrap().unwrap();
    assert_eq!(doc["n"], json!(2));
}

// ============================================================================
// Delivery semantics
// ============================================================================

#[tokio::test]
async fn failure_delivers_error_and_nothing_else() {
    let store = Arc::new(FailingStore::default());
    let c: Collection = Collection::new(
        CollectionSource::existing(Arc::clone(&store)),
        CollectionOptions::default(),
    )
    .unwrap();

    let rec = Recorder::attach(&c.remove(json!({})));
    assert_eq!(
        rec.finished().await,
        vec![Event::Error(CollectionError::Mutation(MutationError::new(
            OperationKind::Remove,
            StoreError::Host("unavailable".to_string()),
        )))]
    );
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failure_without_subscribers_is_dropped() {
    let store = Arc::new(FailingStore::default());
    let c: Collection = Collection::new(
        CollectionSource::existing(Arc::clone(&store)),
        CollectionOptions::default(),
    )
    .unwrap();

    let _unobserved = c.update(json!({}), json!({ "$set": { "x": 1 } }), None);
    settle_tasks().await;
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn two_subscribers_share_one_operation() {
    let store = Arc::new(MemoryStore::named("multi"));
    let c = wrap(Arc::clone(&store));

    let stream = c.insert(&json!({ "v": 1 }));
    let a = Recorder::attach(&stream);
    let b = Recorder::attach(&stream.clone());

    let a_events = a.finished().await;
    let b_events = b.finished().await;
    assert_eq!(a_events, b_events);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn subscribers_are_called_in_registration_order() {
    let c = tasks();
    let order = Arc::new(Mutex::new(Vec::new()));
    let stream = c.insert(&json!({}));
    for name in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        stream.subscribe(Observer::new().on_complete(move || order.lock().unwrap().push(name)));
    }
    let last = Recorder::attach(&stream);

    last.finished().await;
    assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
}

#[tokio::test]
async fn unsubscribed_observer_is_never_called() {
    let gated = Arc::new(GatedStore::new("gated"));
    let c: Collection = Collection::new(
        CollectionSource::existing(Arc::clone(&gated)),
        CollectionOptions::default(),
    )
    .unwrap();

    let stream = c.insert(&json!({}));
    let dropped = Recorder::attach(&stream);
    settle_tasks().await;
    dropped.subscription.unsubscribe();
    let kept = Recorder::attach(&stream);

    gated.open();
    assert_eq!(kept.finished().await.len(), 2);
    assert!(dropped.events().is_empty());
    assert!(dropped.subscription.is_closed());
}

#[tokio::test]
async fn subscriber_after_settlement_is_silently_ignored() {
    let c = tasks();
    let stream = c.insert(&json!({}));
    let early = Recorder::attach(&stream);
    early.finished().await;

    let late = Recorder::attach(&stream);
    settle_tasks().await;
    assert!(late.events().is_empty());
    late.subscription.unsubscribe();
}

#[tokio::test]
async fn unsubscribe_after_completion_is_harmless() {
    let c = tasks();
    let rec = Recorder::attach(&c.insert(&json!({})));
    rec.finished().await;
    rec.subscription.unsubscribe();
    rec.subscription.unsubscribe();
    assert_eq!(rec.events().len(), 2);
}

#[tokio::test]
async fn panicking_observer_does_not_block_later_observers() {
    let c = tasks();
    let stream = c.insert(&json!({}));
    stream.subscribe(Observer::new().on_next(|_: String| panic!("observer bug")));
    let rec = Recorder::attach(&stream);

    assert_eq!(rec.finished().await.len(), 2);
}

#[tokio::test]
async fn allow_and_deny_leave_in_flight_mutations_alone() {
    let gated = Arc::new(GatedStore::new("rules"));
    let c: Collection = Collection::new(
        CollectionSource::existing(Arc::clone(&gated)),
        CollectionOptions::default(),
    )
    .unwrap();

    let rec = Recorder::attach(&c.insert(&json!({ "owner": "u1" })));
    assert!(c.allow(AllowDenyRules::new().insert(|user, doc| {
        user.is_some() && doc["owner"] == Value::from(user.unwrap_or_default())
    })));
    assert!(c.deny(AllowDenyRules::new().remove(|_, _| true).fetch(["owner"])));
    assert_eq!(gated.inner.rule_counts(), (1, 1));

    gated.open();
    let events = rec.finished().await;
    assert!(matches!(events.as_slice(), [Event::Next(_), Event::Complete]));
}
