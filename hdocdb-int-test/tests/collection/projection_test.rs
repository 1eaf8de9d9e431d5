use hdocdb::common::Value;
use hdocdb::doc;
use hdocdb::fragment::BucketConfig;
use hdocdb::index::key_codec::encode_id;
use hdocdb::{CollectionOptions, Condition, FindOptions};
use hdocdb_int_test::test_util::{cleanup, create_test_context, insert_test_documents, run_test};

#[test]
fn test_projection_keeps_requested_paths_and_identity() {
    run_test(
        create_test_context,
        |ctx| {
            let users = ctx.db().collection("users")?;
            insert_test_documents(&users)?;

            let found = users.find_by_id("u1", Some(&["first_name", "address.city"][..]))?;
            assert_eq!(
                found,
                Some(doc! { _id: "u1", first_name: "fn1", address: { city: "Oslo" } })
            );

            let condition = Condition::builder().eq("last_name", "ln2").build()?;
            let found = users
                .find(Some(condition), FindOptions::new().projection(&["tags[0]"]))?
                .to_vec()?;
            assert_eq!(found, vec![doc! { _id: "u2", tags: ["dev"] }, doc! { _id: "u3" }]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_buckets_split_documents_across_families() {
    run_test(
        create_test_context,
        |ctx| {
            let layout = BucketConfig::default()
                .with_bucket("content", "blob")?
                .with_bucket("stats", "s")?;
            let files = ctx
                .db()
                .collection_with_options("files", CollectionOptions::new().buckets(layout))?;
            files.insert(doc! {
                _id: "f1",
                name: "report.txt",
                content: { text: "lorem ipsum", lines: 2 },
                stats: { reads: 0 }
            })?;

            let key = encode_id(&Value::from("f1"))?;
            let row = ctx.db().store().get("files", &key, None)?.expect("row stored");
            let families: Vec<&str> = row.families().collect();
            assert_eq!(families, vec!["_m", "blob", "c", "s"]);

            // a projection only needs the families that hold its paths
            let only_blob = vec!["blob".to_string()];
            let partial = ctx.db().store().get("files", &key, Some(&only_blob))?.expect("row stored");
            assert!(partial.families().all(|f| f == "blob"));

            let found = files.find_by_id("f1", Some(&["content.lines"][..]))?;
            assert_eq!(found, Some(doc! { _id: "f1", content: { lines: 2 } }));

            // conditions may read outside the projection
            let condition = Condition::builder().eq("stats.reads", 0).build()?;
            let found = files
                .find(Some(condition), FindOptions::new().projection(&["name"]))?
                .to_vec()?;
            assert_eq!(found, vec![doc! { _id: "f1", name: "report.txt" }]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_wildcard_projection_over_arrays() {
    run_test(
        create_test_context,
        |ctx| {
            let orders = ctx.db().collection("orders")?;
            orders.insert(doc! {
                _id: 1,
                items: [ { sku: "a", qty: 1 }, { sku: "b" }, { sku: "c", qty: 3 } ]
            })?;

            let found = orders.find_by_id(1, Some(&["items[].qty"][..]))?;
            assert_eq!(found, Some(doc! { _id: 1, items: [ { qty: 1 }, { qty: 3 } ] }));
            Ok(())
        },
        cleanup,
    )
}
