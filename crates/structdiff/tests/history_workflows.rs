mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::fixtures::{
    alternating_edits, create, minutes, post_schema, publish, redraft, set_field, set_title, DOC_ID, DRAFT_ID,
};
use common::source::{MemorySource, StalledSource};
use serde_json::json;
use structdiff::mutation::Mutation;
use structdiff::timeline::Transaction;
use structdiff::{
    ChunkType, DocumentEvent, DocumentPair, HistoryConfig, HistoryController, HistoryError, PathSegment,
    TimeRef, TimelineState,
};

fn config(page_size: usize) -> HistoryConfig {
    HistoryConfig {
        page_size,
        ..Default::default()
    }
}

fn controller(source: Arc<MemorySource>, page_size: usize) -> HistoryController {
    HistoryController::new(DRAFT_ID, source, Arc::new(post_schema()), config(page_size))
}

fn id(s: &str) -> Option<TimeRef> {
    Some(TimeRef::Id(s.to_string()))
}

/// Create, edit, publish, then keep editing a new draft.
fn published_history() -> Vec<Transaction> {
    vec![
        create("r0", minutes(0), "ana", "draft"),
        set_title("r1", minutes(1), "bo", "ready"),
        publish("p1", minutes(2), "ana", "ready"),
        redraft("r3", minutes(3), "bo", "ready"),
        set_title("r4", minutes(4), "ana", "again"),
        set_title("r5", minutes(5), "bo", "again!"),
        set_title("r6", minutes(6), "ana", "final"),
    ]
}

// ── Pagination ────────────────────────────────────────────────────────────

#[tokio::test]
async fn pages_load_newest_to_oldest() {
    let source = Arc::new(MemorySource::new(alternating_edits(7)));
    let mut c = controller(source.clone(), 3);

    c.update(2).await.unwrap();
    assert_eq!(c.timeline().len(), 3);
    assert_eq!(c.timeline().state(), TimelineState::Loaded);
    assert_eq!(source.calls(), 1);

    c.update(5).await.unwrap();
    assert_eq!(c.timeline().len(), 6);
    let requests = source.requests();
    assert_eq!(requests[0].before, None);
    assert_eq!(requests[1].before.as_deref(), Some("4"));
    assert_eq!(requests[1].document_id, DOC_ID);

    c.update(100).await.unwrap();
    assert_eq!(c.timeline().state(), TimelineState::Exhausted);
    let chunks = c.timeline().chunks();
    let ids: Vec<&str> = chunks.iter().map(|ch| ch.id.as_str()).collect();
    assert_eq!(ids, vec!["r6", "r5", "r4", "r3", "r2", "r1", "r0"]);
    assert!(chunks.windows(2).all(|w| w[0].start_timestamp > w[1].end_timestamp));
    assert!(chunks.iter().enumerate().all(|(i, ch)| ch.index == i));
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), ids.len());
    assert_eq!(chunks[6].chunk_type, ChunkType::Create);

    let calls = source.calls();
    c.update(100).await.unwrap();
    assert_eq!(source.calls(), calls);
}

#[tokio::test]
async fn load_more_fetches_one_extra_page() {
    let source = Arc::new(MemorySource::new(alternating_edits(6)));
    let mut c = controller(source.clone(), 2);
    c.update(1).await.unwrap();
    assert_eq!(c.timeline().len(), 2);

    c.set_load_more(true);
    assert!(c.load_more());
    c.update(1).await.unwrap();
    assert_eq!(c.timeline().len(), 4);
    assert!(!c.load_more());
}

#[tokio::test]
async fn failed_fetch_is_retryable() {
    let source = Arc::new(MemorySource::new(alternating_edits(3)));
    let mut c = controller(source.clone(), 10);
    source.fail_next(1);

    let err = c.update(1).await.unwrap_err();
    assert!(matches!(err, HistoryError::Fetch(_)));
    assert!(err.is_retryable());
    assert_eq!(c.error(), Some(&err));
    assert_eq!(c.timeline().state(), TimelineState::Empty);
    assert!(!c.is_loading());

    c.update(1).await.unwrap();
    assert!(c.error().is_none());
    assert_eq!(c.timeline().state(), TimelineState::Exhausted);
    assert_eq!(c.timeline().len(), 3);
}

#[tokio::test]
async fn cancellation_closes_the_controller() {
    let mut c = HistoryController::new(
        DOC_ID,
        Arc::new(StalledSource),
        Arc::new(post_schema()),
        HistoryConfig::default(),
    );
    let cancel = c.cancel_handle();
    let (result, ()) = tokio::join!(c.update(1), async move {
        tokio::task::yield_now().await;
        cancel.cancel();
    });

    assert_eq!(result, Err(HistoryError::Cancelled));
    assert!(c.is_closed());
    assert!(!c.is_loading());
    assert_eq!(c.update(1).await, Err(HistoryError::Closed));
    assert_eq!(c.set_range(None, None).await, Err(HistoryError::Closed));
}

// ── Ranges ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn last_published_resolves_across_pages() {
    let source = Arc::new(MemorySource::new(published_history()));
    let mut c = controller(source.clone(), 2);
    c.update(1).await.unwrap();
    assert_eq!(c.timeline().len(), 2);

    let range = c
        .set_range(Some(TimeRef::LastPublished), None)
        .await
        .unwrap()
        .unwrap();
    let since = range.since.unwrap();
    assert_eq!(since.id, "p1");
    assert_eq!(since.chunk_type, ChunkType::Publish);
    assert!(range.rev.is_none());
    assert!(c.changes_panel_active());
    assert!(!c.on_older_revision());

    let diff = c.current_object_diff().unwrap();
    let title = diff.root.get(&[PathSegment::key("title")]).unwrap();
    assert!(title.is_changed());
    assert_eq!(title.from_value(), Some(&json!("ready")));
    assert_eq!(title.to_value(), Some(&json!("final")));
    let annotation = title.annotation().unwrap();
    assert_eq!(annotation.author, "ana");
    assert_eq!(annotation.chunk_id.as_deref(), Some("r6"));
}

#[tokio::test]
async fn changes_are_credited_to_their_chunk() {
    let source = Arc::new(MemorySource::new(vec![
        create("r0", minutes(0), "ana", "draft"),
        set_field("r1", minutes(1), "ana", "views", json!(3)),
        set_title("r2", minutes(2), "bo", "retitled"),
        set_field("r3", minutes(3), "ana", "tags", json!(["news"])),
    ]));
    let mut c = controller(source, 50);
    c.set_range(id("r0"), None).await.unwrap();
    let diff = c.current_object_diff().unwrap();

    let credit = |field: &str| {
        let node = diff.root.get(&[PathSegment::key(field)]).unwrap();
        let annotation = node.annotation().unwrap();
        (annotation.author.clone(), annotation.chunk_id.clone().unwrap())
    };
    assert_eq!(credit("views"), ("ana".to_string(), "r1".to_string()));
    assert_eq!(credit("title"), ("bo".to_string(), "r2".to_string()));
    assert_eq!(credit("tags"), ("ana".to_string(), "r3".to_string()));
}

#[tokio::test]
async fn unknown_reference_does_not_resolve() {
    let source = Arc::new(MemorySource::new(alternating_edits(3)));
    let mut c = controller(source, 10);
    let range = c.set_range(id("nope"), None).await.unwrap();
    assert!(range.is_none());
    assert!(c.current_object_diff().is_none());
}

#[tokio::test]
async fn latest_rev_means_current() {
    let source = Arc::new(MemorySource::new(alternating_edits(3)));
    let mut c = controller(source, 10);
    c.set_range(None, Some(TimeRef::Latest)).await.unwrap();
    assert!(c.rev_ref().is_none());
    assert!(!c.on_older_revision());
    assert!(c.restore_mutation().is_none());
}

#[tokio::test]
async fn picking_since_and_rev() {
    let source = Arc::new(MemorySource::new(alternating_edits(7)));
    let mut c = controller(source, 50);
    c.set_range(None, id("r3")).await.unwrap();
    let chunk = |c: &HistoryController, i: usize| c.timeline().chunk(i).unwrap().clone();

    // Older than rev: rev is kept.
    assert_eq!(c.find_range_for_new_since(&chunk(&c, 5)), (id("r1"), id("r3")));
    // Newer than rev: rev moves back to current.
    assert_eq!(c.find_range_for_new_since(&chunk(&c, 2)), (id("r4"), None));

    c.set_range(id("r1"), id("r3")).await.unwrap();
    // The newest chunk is current.
    assert_eq!(c.find_range_for_new_rev(&chunk(&c, 0)), (id("r1"), None));
    // A rev at or before since pushes since one chunk older.
    assert_eq!(c.find_range_for_new_rev(&chunk(&c, 5)), (id("r0"), id("r1")));
}

#[tokio::test]
async fn restore_targets_the_draft() {
    let source = Arc::new(MemorySource::new(alternating_edits(4)));
    let mut c = controller(source, 50);
    c.set_range(None, id("r2")).await.unwrap();
    assert!(c.on_older_revision());
    assert_eq!(c.displayed().unwrap()["title"], "v2");

    let Some(Mutation::CreateOrReplace(doc)) = c.restore_mutation() else {
        panic!("expected a createOrReplace mutation");
    };
    assert_eq!(doc["_id"], DRAFT_ID);
    assert_eq!(doc["title"], "v2");
    assert!(doc.get("_rev").is_none());
}

// ── Live document ─────────────────────────────────────────────────────────

#[tokio::test]
async fn historical_diff_is_stable_across_live_events() {
    let source = Arc::new(MemorySource::new(alternating_edits(5)));
    let mut c = controller(source, 50);
    c.set_range(id("r1"), id("r3")).await.unwrap();
    let before = c.current_object_diff().unwrap();

    c.handle_event(DocumentEvent::Mutation {
        transaction: set_title("r5", minutes(5), "bo", "live"),
    })
    .unwrap();
    assert_eq!(c.timeline().chunk(0).unwrap().id, "r5");
    let after = c.current_object_diff().unwrap();
    assert!(Arc::ptr_eq(&before, &after));
}

#[tokio::test]
async fn current_diff_follows_live_events() {
    let source = Arc::new(MemorySource::new(alternating_edits(3)));
    let mut c = controller(source, 50);
    c.set_range(id("r1"), None).await.unwrap();
    let first = c.current_object_diff().unwrap();
    assert!(Arc::ptr_eq(&first, &c.current_object_diff().unwrap()));

    let live = json!({"_id": DRAFT_ID, "_type": "post", "title": "typed just now"});
    c.handle_event(DocumentEvent::Snapshot {
        pair: DocumentPair::new(Some(live), None),
    })
    .unwrap();
    let second = c.current_object_diff().unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    let title = second.root.get(&[PathSegment::key("title")]).unwrap();
    assert_eq!(title.to_value(), Some(&json!("typed just now")));
}

#[tokio::test]
async fn live_edit_merged_into_since_chunk_stays_in_range() {
    let source = Arc::new(MemorySource::new(alternating_edits(3)));
    let mut c = controller(source, 50);
    c.set_range(id("r2"), None).await.unwrap();
    assert!(!c.current_object_diff().unwrap().is_changed());

    c.handle_event(DocumentEvent::Mutation {
        transaction: set_title("r3", minutes(3), "ana", "live"),
    })
    .unwrap();
    let newest = c.timeline().chunk(0).unwrap();
    assert_eq!(newest.id, "r3");
    assert_eq!(newest.transaction_count(), 2);

    let diff = c.current_object_diff().unwrap();
    let title = diff.root.get(&[PathSegment::key("title")]).unwrap();
    assert!(title.is_changed());
    assert_eq!(title.from_value(), Some(&json!("v2")));
    assert_eq!(title.to_value(), Some(&json!("live")));
    assert_eq!(title.annotation().unwrap().chunk_id.as_deref(), Some("r3"));
}

#[tokio::test]
async fn pinned_rev_ignores_merged_live_edits() {
    let source = Arc::new(MemorySource::new(alternating_edits(3)));
    let mut c = controller(source, 50);
    c.set_range(id("r1"), id("r2")).await.unwrap();
    let before = c.current_object_diff().unwrap();

    c.handle_event(DocumentEvent::Mutation {
        transaction: set_title("r3", minutes(3), "ana", "live"),
    })
    .unwrap();
    assert_eq!(c.displayed().unwrap()["title"], "v2");
    assert!(Arc::ptr_eq(&before, &c.current_object_diff().unwrap()));
}

#[tokio::test]
async fn live_events_before_first_page_are_not_recorded() {
    let source = Arc::new(MemorySource::new(alternating_edits(2)));
    let mut c = controller(source, 50);
    c.handle_event(DocumentEvent::Mutation {
        transaction: set_title("r9", minutes(9), "ana", "early"),
    })
    .unwrap();
    assert!(c.timeline().is_empty());

    c.update(1).await.unwrap();
    assert_eq!(c.timeline().len(), 2);
    assert!(c.timeline().chunk_by_id("r9").is_none());
}
