use super::*;

#[tokio::test(start_paused = true)]
async fn delete_removes_exactly_one_record_from_the_view_and_the_cache() {
    let (list, _) = record_list(seeded_store(), executive(), &config(50, 300));
    list.start_search(&SearchCriteria::new()).await.expect("search should succeed");

    list.delete_record(&RecordId::from("wo-005"))
        .await
        .expect("delete should succeed");

    let snapshot = list.snapshot();
    assert_eq!(snapshot.records.len(), 39);
    assert_eq!(snapshot.total_known, 39);
    assert!(!snapshot.ids().contains(&"wo-005"));
    assert_eq!(list.store().len(), 39);
    assert_eq!(list.store().write_calls(), 1);

    // a cached view derived after the delete never resurrects the record
    list.start_search(&SearchCriteria::new().text("beta"))
        .await
        .expect("search should succeed");
    let snapshot = list.snapshot();
    assert!(snapshot.from_cache);
    assert_eq!(snapshot.records.len(), 29);
    assert!(!snapshot.ids().contains(&"wo-005"));
    assert_eq!(list.store().query_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn deleting_an_unloaded_record_changes_nothing() {
    let (list, _) = record_list(seeded_store(), executive(), &config(50, 300));
    list.start_search(&open()).await.expect("search should succeed");

    list.notify_deleted(&RecordId::from("wo-003"))
        .expect("notify should succeed");

    let snapshot = list.snapshot();
    assert_eq!(snapshot.records.len(), 26);
    assert_eq!(snapshot.total_known, 26);
}

#[tokio::test(start_paused = true)]
async fn created_record_lands_at_its_sorted_position() {
    let (list, _) = record_list(seeded_store(), executive(), &config(50, 300));
    list.start_search(&SearchCriteria::new()).await.expect("search should succeed");

    let created = list
        .create_record(fields(&[
            ("owner", json!("u-1")),
            ("status", json!("open")),
            ("number", json!(100)),
            ("created_at", json!(BASE_MILLIS + 100 * 60_000)),
            ("client", json!("Gamma Ltd")),
        ]))
        .await
        .expect("create should succeed");

    let snapshot = list.snapshot();
    assert_eq!(snapshot.records.len(), 41);
    assert_eq!(snapshot.total_known, 41);
    assert_eq!(snapshot.records[0].id(), created.id());

    list.start_search(&SearchCriteria::new().text("gamma"))
        .await
        .expect("search should succeed");
    let snapshot = list.snapshot();
    assert!(snapshot.from_cache);
    assert_eq!(snapshot.records.len(), 1);
    assert_eq!(list.store().query_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn create_rejects_client_assigned_ids_before_writing() {
    let (list, _) = record_list(seeded_store(), executive(), &config(50, 300));

    let err = list
        .create_record(fields(&[("id", json!("mine")), ("status", json!("open"))]))
        .await
        .expect_err("ids are store-assigned");

    assert_eq!(err.kind, ErrorKind::ValidationFailed);
    assert_eq!(list.store().write_calls(), 0);

    let err = list
        .create_record(fields(&[("number", json!("many"))]))
        .await
        .expect_err("number must be an integer");
    assert_eq!(err.kind, ErrorKind::ValidationFailed);
    assert_eq!(list.store().write_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn update_that_leaves_the_filter_drops_the_record() {
    let (list, _) = record_list(seeded_store(), executive(), &config(50, 0));
    list.start_search(&open()).await.expect("search should succeed");

    list.update_record(&RecordId::from("wo-001"), fields(&[("status", json!("closed"))]))
        .await
        .expect("update should succeed");

    let snapshot = list.snapshot();
    assert_eq!(snapshot.records.len(), 25);
    assert_eq!(snapshot.total_known, 25);
    assert!(!snapshot.ids().contains(&"wo-001"));

    list.start_search(&closed()).await.expect("search should succeed");
    assert!(list.snapshot().ids().contains(&"wo-001"));
}

#[tokio::test(start_paused = true)]
async fn records_outside_a_narrow_scope_are_never_inserted() {
    let (list, _) = record_list(seeded_store(), technician("u-1"), &config(50, 300));
    list.start_search(&SearchCriteria::new()).await.expect("search should succeed");

    let foreign = list
        .schema()
        .normalizer()
        .record(document(77));
    list.notify_created(foreign).expect("notify should succeed");

    let snapshot = list.snapshot();
    assert_eq!(snapshot.records.len(), 20);
    assert!(!snapshot.ids().contains(&"wo-077"));
}

#[tokio::test(start_paused = true)]
async fn failed_write_leaves_the_list_untouched() {
    let (list, _) = record_list(seeded_store(), executive(), &config(50, 300));
    list.start_search(&SearchCriteria::new()).await.expect("search should succeed");

    list.store().fail_next(StoreError::unavailable("offline"));
    let err = list
        .delete_record(&RecordId::from("wo-010"))
        .await
        .expect_err("store is down");

    assert_eq!(err.kind, ErrorKind::StoreUnreachable);
    assert_eq!(list.snapshot().records.len(), 40);
    assert_eq!(list.store().len(), 40);
}
