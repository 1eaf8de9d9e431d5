use hdocdb::collection::TieBreak;
use hdocdb::doc;
use hdocdb::errors::ErrorKind;
use hdocdb::fragment::BucketConfig;
use hdocdb::store::memory::InMemoryStore;
use hdocdb::{CollectionOptions, HDocDb};
use hdocdb_int_test::test_util::{cleanup, create_test_context, run_test, unique_name};

#[test]
fn test_builder_settings_are_frozen_after_open() {
    let db = HDocDb::builder()
        .store(InMemoryStore::new())
        .default_bucket("data")
        .tie_break(TieBreak::FewestFields)
        .path_cache_capacity(8)
        .plan_cache_capacity(0)
        .open()
        .unwrap();

    let config = db.config();
    assert_eq!(config.default_bucket(), "data");
    assert_eq!(config.tie_break(), TieBreak::FewestFields);
    let err = config.set_default_bucket("other").unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::InvalidOperation);

    let users = db.collection("users").unwrap();
    assert_eq!(users.buckets().default_bucket(), "data");
    assert_eq!(users.tie_break(), TieBreak::FewestFields);
    db.close().unwrap();
}

#[test]
fn test_invalid_builder_settings_fail_open() {
    let err = HDocDb::builder().default_bucket("_m").open().err().unwrap();
    assert_eq!(err.kind(), &ErrorKind::ValidationError);
    let err = HDocDb::builder().max_write_retries(0).open().err().unwrap();
    assert_eq!(err.kind(), &ErrorKind::ValidationError);
}

#[test]
fn test_collections_are_listed_and_dropped() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let first = unique_name("c");
            let second = unique_name("c");
            db.collection(&first)?.insert(doc! { _id: 1 })?;
            db.collection(&second)?;

            let mut expected = vec![first.clone(), second.clone()];
            expected.sort();
            assert_eq!(db.list_collections()?, expected);

            db.drop_collection(&first)?;
            assert!(!db.has_collection(&first)?);
            assert_eq!(db.list_collections()?, vec![second.clone()]);
            let err = db.drop_collection(&first).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::CollectionNotFound);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_reopen_with_other_buckets_fails() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let layout = BucketConfig::default().with_bucket("body", "b")?;
            db.collection_with_options("mail", CollectionOptions::new().buckets(layout.clone()))?;

            let other = BucketConfig::default().with_bucket("body", "x")?;
            let err = db
                .collection_with_options("mail", CollectionOptions::new().buckets(other.clone()))
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ValidationError);

            // a fresh handle over the same store checks the stored layout
            let reopened = HDocDb::builder().store_handle(db.store()).open()?;
            let err = reopened
                .collection_with_options("mail", CollectionOptions::new().buckets(other))
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::ValidationError);
            assert_eq!(reopened.collection("mail")?.buckets(), &layout);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_operations_after_close_fail() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            let users = db.collection("users")?;
            db.close()?;
            assert!(db.is_closed());

            assert_eq!(
                db.collection("users").unwrap_err().kind(),
                &ErrorKind::StoreAlreadyClosed
            );
            assert_eq!(
                users.find_by_id(1, None).unwrap_err().kind(),
                &ErrorKind::StoreAlreadyClosed
            );
            assert_eq!(db.list_collections().unwrap_err().kind(), &ErrorKind::StoreAlreadyClosed);
            Ok(())
        },
        cleanup,
    )
}
