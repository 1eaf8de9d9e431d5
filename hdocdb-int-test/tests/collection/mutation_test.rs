use hdocdb::common::Value;
use hdocdb::doc;
use hdocdb::errors::ErrorKind;
use hdocdb::Mutation;
use hdocdb_int_test::test_util::{cleanup, create_test_context, run_test};

#[test]
fn test_increment_nested_targets() {
    run_test(
        create_test_context,
        |ctx| {
            let scores = ctx.db().collection("scores")?;
            scores.insert(doc! {
                _id: "s",
                Scores: [10, 20, 30],
                map: { byte: (100i8) }
            })?;

            scores.update(
                "s",
                &Mutation::new()
                    .increment("Scores[1]", 3)
                    .increment("map.byte", 5),
            )?;

            let stored = scores.find_by_id("s", None)?.expect("stored");
            assert_eq!(stored.get("Scores[1]")?, Some(Value::Int(23)));
            assert_eq!(stored.get("map.byte")?, Some(Value::Byte(105)));
            assert_eq!(stored.get("Scores[0]")?, Some(Value::Int(10)));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_update_creates_missing_document() {
    run_test(
        create_test_context,
        |ctx| {
            let counters = ctx.db().collection("counters")?;
            counters.update("hits", &Mutation::new().increment("total", 1i64))?;
            counters.update("hits", &Mutation::new().increment("total", 1i64))?;

            let stored = counters.find_by_id("hits", None)?.expect("created by update");
            assert_eq!(stored, doc! { _id: "hits", total: (2i64) });
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_mutations_apply_in_order() {
    run_test(
        create_test_context,
        |ctx| {
            let posts = ctx.db().collection("posts")?;
            posts.insert(doc! { _id: 1, title: "draft", tags: ["a"], meta: { views: 1 } })?;

            let mutation = Mutation::new()
                .append("title", "-v2")
                .push("tags", "b")
                .merge("meta", doc! { editor: "ann" })
                .set("meta.views", 10)
                .delete("meta.editor")
                .set_or_replace("state", "published");
            posts.update(1, &mutation)?;

            let stored = posts.find_by_id(1, None)?.expect("stored");
            assert_eq!(stored.field("title"), Some(&Value::from("draft-v2")));
            assert_eq!(stored.get("tags")?, Some(Value::from(vec!["a", "b"])));
            assert_eq!(stored.get("meta")?, Some(Value::Map(doc! { views: 10 })));
            assert_eq!(stored.field("state"), Some(&Value::from("published")));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_failed_mutation_leaves_document_unchanged() {
    run_test(
        create_test_context,
        |ctx| {
            let posts = ctx.db().collection("posts")?;
            let original = doc! { _id: 1, title: "t", count: 1 };
            posts.insert(original.clone())?;

            // the second op fails, so the first one must not be kept either
            let mutation = Mutation::new()
                .increment("count", 1)
                .increment("title", 1);
            let err = posts.update(1, &mutation).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::TypeMismatch);
            assert_eq!(posts.find_by_id(1, None)?, Some(original));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_mutation_cannot_change_identity() {
    run_test(
        create_test_context,
        |ctx| {
            let posts = ctx.db().collection("posts")?;
            posts.insert(doc! { _id: "p", v: 1 })?;
            let err = posts
                .update("p", &Mutation::new().set_or_replace("_id", "q"))
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::InvalidId);
            assert!(posts.find_by_id("q", None)?.is_none());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_mutation_from_update_document() {
    run_test(
        create_test_context,
        |ctx| {
            let posts = ctx.db().collection("posts")?;
            posts.insert(doc! { _id: "p", n: 1, tags: [] })?;
            let mutation = Mutation::from_document(&doc! {
                "$inc": { n: 4 },
                "$push": { tags: "x" }
            })?;
            posts.update("p", &mutation)?;

            let stored = posts.find_by_id("p", None)?.expect("stored");
            assert_eq!(stored.field("n"), Some(&Value::Int(5)));
            assert_eq!(stored.get("tags[0]")?, Some(Value::from("x")));
            Ok(())
        },
        cleanup,
    )
}
