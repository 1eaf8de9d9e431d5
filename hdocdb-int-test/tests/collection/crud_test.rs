use hdocdb::common::Value;
use hdocdb::doc;
use hdocdb::errors::ErrorKind;
use hdocdb::{Condition, FindOptions};
use hdocdb_int_test::test_util::{cleanup, create_test_context, insert_test_documents, run_test};

#[test]
fn test_insert_and_find_by_id() {
    run_test(
        create_test_context,
        |ctx| {
            let users = ctx.db().collection("users")?;
            insert_test_documents(&users)?;

            let found = users.find_by_id("u2", None)?.expect("u2 is stored");
            assert_eq!(found.get("address.city")?, Some(Value::from("Bergen")));
            assert_eq!(found.get("tags[0]")?, Some(Value::from("dev")));
            assert!(users.find_by_id("missing", None)?.is_none());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_insert_generates_string_ids() {
    run_test(
        create_test_context,
        |ctx| {
            let users = ctx.db().collection("users")?;
            let id = users.insert(doc! { name: "anon" })?;
            assert!(id.as_str().is_some_and(|s| !s.is_empty()));

            let stored = users.find_by_id(id.clone(), None)?.expect("inserted");
            assert_eq!(stored.id(), Some(&id));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_duplicate_insert_fails() {
    run_test(
        create_test_context,
        |ctx| {
            let users = ctx.db().collection("users")?;
            users.insert(doc! { _id: 7, v: "first" })?;
            let err = users.insert(doc! { _id: 7, v: "second" }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::DocumentExists);

            let stored = users.find_by_id(7, None)?.expect("first insert kept");
            assert_eq!(stored.field("v"), Some(&Value::from("first")));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_insert_with_id_overrides_document_id() {
    run_test(
        create_test_context,
        |ctx| {
            let users = ctx.db().collection("users")?;
            users.insert_with_id("given", doc! { _id: "ignored", v: 1 })?;
            assert!(users.find_by_id("ignored", None)?.is_none());
            let stored = users.find_by_id("given", None)?.expect("stored under given id");
            assert_eq!(stored.id(), Some(&Value::from("given")));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_replace_and_insert_or_replace() {
    run_test(
        create_test_context,
        |ctx| {
            let users = ctx.db().collection("users")?;
            let err = users.replace(doc! { _id: "r", v: 1 }).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::DocumentNotFound);

            users.insert_or_replace(doc! { _id: "r", v: 1, extra: true })?;
            users.replace(doc! { _id: "r", v: 2 })?;
            assert_eq!(users.find_by_id("r", None)?, Some(doc! { _id: "r", v: 2 }));

            users.insert_or_replace(doc! { _id: "r", v: 3 })?;
            assert_eq!(users.find_by_id("r", None)?, Some(doc! { _id: "r", v: 3 }));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_delete_reports_whether_anything_was_removed() {
    run_test(
        create_test_context,
        |ctx| {
            let users = ctx.db().collection("users")?;
            insert_test_documents(&users)?;
            assert!(users.delete("u1")?);
            assert!(!users.delete("u1")?);
            assert!(users.find_by_id("u1", None)?.is_none());

            let remaining = users.find(None, FindOptions::new())?.to_vec()?;
            assert_eq!(remaining.len(), 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_find_without_index_scans_everything() {
    run_test(
        create_test_context,
        |ctx| {
            let users = ctx.db().collection("users")?;
            insert_test_documents(&users)?;

            let oslo = Condition::builder().eq("address.city", "Oslo").build()?;
            let mut cursor = users.find(Some(oslo), FindOptions::new())?;
            let found = cursor.to_vec()?;
            assert_eq!(found.len(), 2);
            assert_eq!(cursor.query_info().index_name(), None);

            let limited = users.find(None, FindOptions::new().limit(2))?.to_vec()?;
            assert_eq!(limited.len(), 2);

            let first = users.find_one(None, FindOptions::new())?;
            assert_eq!(first.and_then(|d| d.id().cloned()), Some(Value::from("u1")));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_closed_cursor_yields_nothing() {
    run_test(
        create_test_context,
        |ctx| {
            let users = ctx.db().collection("users")?;
            insert_test_documents(&users)?;
            let mut cursor = users.find(None, FindOptions::new())?;
            assert!(cursor.next().is_some());
            cursor.close();
            assert!(cursor.is_closed());
            assert!(cursor.next().is_none());
            Ok(())
        },
        cleanup,
    )
}
