use super::*;

#[tokio::test(start_paused = true)]
async fn unreachable_store_keeps_records_and_the_cursor() {
    let (list, _) = record_list(seeded_store(), executive(), &config(5, 0));
    list.start_search(&open()).await.expect("search should succeed");

    list.store().fail_next(StoreError::unavailable("connection reset"));
    let err = list.load_more().await.expect_err("store is down");

    assert_eq!(err.kind, ErrorKind::StoreUnreachable);
    assert!(err.is_retryable());
    let snapshot = list.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Error);
    assert_eq!(snapshot.records.len(), 5);
    assert!(snapshot.has_more);
    assert_eq!(
        snapshot.error.as_ref().map(|err| err.kind),
        Some(ErrorKind::StoreUnreachable)
    );

    list.load_more().await.expect("retry should succeed");
    let snapshot = list.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Success);
    assert!(snapshot.error.is_none());
    assert_eq!(snapshot.records.len(), 10);
    assert_unique(&snapshot);
}

#[tokio::test(start_paused = true)]
async fn permission_denied_ends_pagination_but_keeps_records() {
    let (list, _) = record_list(seeded_store(), executive(), &config(5, 0));
    list.start_search(&open()).await.expect("search should succeed");

    list.store()
        .fail_next(StoreError::permission_denied("rules rejected the read"));
    let err = list.load_more().await.expect_err("read is denied");

    assert_eq!(err.kind, ErrorKind::PermissionDenied);
    assert!(!err.is_retryable());
    assert!(err.message.contains("ask an administrator"), "{}", err.message);
    let snapshot = list.snapshot();
    assert_eq!(snapshot.records.len(), 5);
    assert!(!snapshot.has_more);
    assert!(matches!(list.load_more().await, Ok(SearchOutcome::Unchanged)));
    assert_eq!(list.store().query_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn unsupported_query_says_what_to_change() {
    let (list, _) = record_list(seeded_store(), executive(), &config(25, 0));

    list.store()
        .fail_next(StoreError::failed_precondition("composite index required"));
    let err = list.start_search(&open()).await.expect_err("index is missing");

    assert_eq!(err.kind, ErrorKind::QueryUnsupported);
    assert!(err.message.contains("remove a filter"), "{}", err.message);
    let snapshot = list.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Error);
    assert!(!snapshot.has_more);
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_leaves_displayed_records_in_place() {
    let (list, _) = record_list(seeded_store(), executive(), &config(50, 0));
    list.start_search(&open()).await.expect("search should succeed");

    list.store().fail_next(StoreError::Timeout);
    let err = list.refresh().await.expect_err("store timed out");

    assert!(err.is_retryable());
    let snapshot = list.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Error);
    assert_eq!(snapshot.records.len(), 26);
    assert_eq!(snapshot.total_known, 26);

    list.refresh().await.expect("refresh should succeed");
    assert_eq!(list.snapshot().records.len(), 26);
    assert_eq!(list.snapshot().status, SessionStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn rejected_continuation_ends_pagination() {
    let (list, _) = record_list(seeded_store(), executive(), &config(5, 0));
    list.start_search(&open()).await.expect("search should succeed");

    list.store()
        .fail_next(StoreError::invalid_argument("cursor is no longer valid"));
    let err = list.load_more().await.expect_err("cursor is rejected");

    assert_eq!(err.kind, ErrorKind::ValidationFailed);
    assert!(!err.is_retryable());
    let snapshot = list.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Error);
    assert_eq!(snapshot.records.len(), 5);
    assert!(!snapshot.has_more);
    assert!(matches!(list.load_more().await, Ok(SearchOutcome::Unchanged)));
    assert_eq!(list.store().query_calls(), 2);
}
