use hdocdb::collection::IndexHint;
use hdocdb::common::{SortOrder, Value, ValueType};
use hdocdb::doc;
use hdocdb::errors::{ErrorKind, HDocResult};
use hdocdb::{
    CollectionOptions, Condition, DocumentCollection, FindOptions, IndexDefinition, IndexField,
    PlanType, TieBreak,
};
use hdocdb_int_test::test_util::{cleanup, create_test_context, is_sorted, run_test};

fn index(name: &str, fields: &[(&str, ValueType, SortOrder)]) -> HDocResult<IndexDefinition> {
    let fields = fields
        .iter()
        .map(|(path, value_type, order)| IndexField::new(path, *value_type, *order))
        .collect::<HDocResult<Vec<_>>>()?;
    Ok(IndexDefinition::new(name, fields).with_async_build(false))
}

fn ids(collection: &DocumentCollection, condition: Condition) -> HDocResult<Vec<Value>> {
    let found = collection.find(Some(condition), FindOptions::new())?.to_vec()?;
    Ok(found.iter().filter_map(|d| d.id().cloned()).collect())
}

#[test]
fn test_integer_extremes_through_index() {
    run_test(
        create_test_context,
        |ctx| {
            let numbers = ctx.db().collection("numbers")?;
            numbers.insert(doc! { _id: "min", a: (i32::MIN) })?;
            numbers.insert(doc! { _id: "zero", a: 0 })?;
            numbers.insert(doc! { _id: "max", a: (i32::MAX) })?;
            numbers.create_index(index("by_a", &[("a", ValueType::Int, SortOrder::Ascending)])?)?;

            let at_most_min = Condition::builder().le("a", i32::MIN).build()?;
            let mut cursor = numbers.find(Some(at_most_min), FindOptions::new())?;
            let found = cursor.to_vec()?;
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].id(), Some(&Value::from("min")));
            assert_eq!(cursor.query_info().index_name(), Some("by_a"));

            let below_max = Condition::builder().lt("a", i32::MAX).build()?;
            assert_eq!(
                ids(&numbers, below_max)?,
                vec![Value::from("min"), Value::from("zero")]
            );

            let at_least_max = Condition::builder().ge("a", i32::MAX).build()?;
            assert_eq!(ids(&numbers, at_least_max)?, vec![Value::from("max")]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_composite_index_bounds_both_fields() {
    run_test(
        create_test_context,
        |ctx| {
            let pairs = ctx.db().collection("pairs")?;
            for (id, a, b) in [(1, 1, 1), (2, 1, 2), (3, 1, 3), (4, 2, 1), (5, 2, 5)] {
                pairs.insert(doc! { _id: id, a: a, b: b })?;
            }
            pairs.create_index(index(
                "by_a_b",
                &[
                    ("a", ValueType::Int, SortOrder::Ascending),
                    ("b", ValueType::Int, SortOrder::Ascending),
                ],
            )?)?;

            let condition = Condition::builder()
                .and()
                .eq("a", 1)
                .ge("b", 2)
                .close()
                .build()?;
            let plan = pairs.explain(Some(condition.clone()), FindOptions::new())?;
            assert_eq!(plan.plan_type(), PlanType::IndexScan);
            assert_eq!(plan.index_bounds().len(), 2);

            let mut cursor = pairs.find(Some(condition), FindOptions::new())?;
            let found = cursor.to_vec()?;
            assert_eq!(found.len(), 2);
            // the bounds keep the scan inside a = 1, b >= 2
            assert_eq!(cursor.query_info().scanned_index_entries(), 2);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_descending_index_returns_descending_order() {
    run_test(
        create_test_context,
        |ctx| {
            let scores = ctx.db().collection("scores")?;
            for (id, score) in [("a", 12), ("b", 40), ("c", 7), ("d", 25), ("e", 31)] {
                scores.insert(doc! { _id: id, score: score })?;
            }
            scores.create_index(index(
                "by_score_desc",
                &[("score", ValueType::Int, SortOrder::Descending)],
            )?)?;

            let above_ten = Condition::builder().gt("score", 10).build()?;
            let found = scores
                .find(Some(above_ten), FindOptions::new())?
                .to_vec()?;
            let values: Vec<i64> = found
                .iter()
                .filter_map(|d| d.field("score").and_then(Value::as_i64))
                .collect();
            assert_eq!(values.len(), 4);
            assert!(is_sorted(values, false));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_in_condition_uses_index() {
    run_test(
        create_test_context,
        |ctx| {
            let users = ctx.db().collection("users")?;
            for (id, city) in [(1, "Oslo"), (2, "Bergen"), (3, "Tromso"), (4, "Oslo")] {
                users.insert(doc! { _id: id, city: city })?;
            }
            users.create_index(index("by_city", &[("city", ValueType::String, SortOrder::Ascending)])?)?;

            let condition = Condition::builder()
                .is_in("city", vec!["Oslo", "Tromso"])
                .build()?;
            let mut cursor = users.find(Some(condition), FindOptions::new())?;
            let found = cursor.to_vec()?;
            assert_eq!(found.len(), 3);
            let info = cursor.query_info();
            assert_eq!(info.index_name(), Some("by_city"));
            assert_eq!(info.stale_index_entries(), 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_residual_condition_is_applied_after_index() {
    run_test(
        create_test_context,
        |ctx| {
            let users = ctx.db().collection("users")?;
            for age in 20..30 {
                users.insert(doc! { _id: age, age: age, even: (age % 2 == 0) })?;
            }
            users.create_index(index("by_age", &[("age", ValueType::Int, SortOrder::Ascending)])?)?;

            let condition = Condition::builder()
                .and()
                .ge("age", 24)
                .eq("even", true)
                .close()
                .build()?;
            let mut cursor = users.find(Some(condition), FindOptions::new())?;
            assert_eq!(cursor.to_vec()?.len(), 3);
            assert_eq!(cursor.query_info().scanned_index_entries(), 6);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_hints_override_the_planner() {
    run_test(
        create_test_context,
        |ctx| {
            let users = ctx.db().collection("users")?;
            for i in 0..6 {
                users.insert(doc! { _id: i, a: i, b: (i * 10) })?;
            }
            users.create_index(index("by_a", &[("a", ValueType::Int, SortOrder::Ascending)])?)?;
            users.create_index(index("by_b", &[("b", ValueType::Int, SortOrder::Ascending)])?)?;

            let condition = Condition::builder()
                .and()
                .ge("a", 2)
                .le("b", 40)
                .close()
                .build()?;

            let auto = users.explain(Some(condition.clone()), FindOptions::new())?;
            assert_eq!(auto.index_name(), Some("by_a"));

            let named = users.explain(Some(condition.clone()), FindOptions::new().use_index("by_b"))?;
            assert_eq!(named.index_name(), Some("by_b"));

            let none = users.explain(Some(condition.clone()), FindOptions::new().no_index())?;
            assert_eq!(none.plan_type(), PlanType::FullTableScan);

            let err = users
                .explain(Some(condition.clone()), FindOptions::new().hint(IndexHint::Named("nope".into())))
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::IndexNotFound);

            // every plan returns the same documents
            for options in [
                FindOptions::new(),
                FindOptions::new().use_index("by_b"),
                FindOptions::new().no_index(),
            ] {
                let found = users.find(Some(condition.clone()), options)?.to_vec()?;
                assert_eq!(found.len(), 3);
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_collection_tie_break_override() {
    run_test(
        create_test_context,
        |ctx| {
            let users = ctx.db().collection_with_options(
                "users",
                CollectionOptions::new().tie_break(TieBreak::ReverseDeclarationOrder),
            )?;
            users.insert(doc! { _id: 1, a: 1, b: 1 })?;
            users.create_index(index("first", &[("a", ValueType::Int, SortOrder::Ascending)])?)?;
            users.create_index(index("second", &[("a", ValueType::Int, SortOrder::Descending)])?)?;

            let condition = Condition::builder().eq("a", 1).build()?;
            let plan = users.explain(Some(condition.clone()), FindOptions::new())?;
            assert_eq!(plan.index_name(), Some("second"));
            assert_eq!(ids(&users, condition)?, vec![Value::Int(1)]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_mismatched_literal_type_falls_back_to_scan() {
    run_test(
        create_test_context,
        |ctx| {
            let users = ctx.db().collection("users")?;
            users.insert(doc! { _id: 1, a: 1 })?;
            users.insert(doc! { _id: 2, a: "one" })?;
            users.create_index(index("by_a", &[("a", ValueType::Int, SortOrder::Ascending)])?)?;

            let condition = Condition::builder().eq("a", "one").build()?;
            let plan = users.explain(Some(condition.clone()), FindOptions::new())?;
            assert_eq!(plan.plan_type(), PlanType::FullTableScan);
            assert_eq!(ids(&users, condition)?, vec![Value::Int(2)]);
            Ok(())
        },
        cleanup,
    )
}

fn sorted_ids(
    collection: &DocumentCollection,
    condition: &Condition,
    options: FindOptions,
) -> HDocResult<Vec<String>> {
    let found = collection.find(Some(condition.clone()), options)?.to_vec()?;
    let mut ids: Vec<String> = found
        .iter()
        .filter_map(|d| d.id().and_then(Value::as_str).map(str::to_string))
        .collect();
    ids.sort();
    Ok(ids)
}

#[test]
fn test_index_and_full_scan_agree_on_arrays() {
    run_test(
        create_test_context,
        |ctx| {
            let values = ctx.db().collection("values")?;
            values.insert(doc! { _id: "x", a: [5, 6] })?;
            values.insert(doc! { _id: "y", a: 5 })?;
            values.insert(doc! { _id: "z", a: "5" })?;
            values.insert(doc! { _id: "w", a: [7] })?;
            values.insert(doc! { _id: "v", a: [3, 6] })?;
            values.insert(doc! { _id: "u", a: [] })?;
            values.create_index(index("by_a", &[("a", ValueType::Int, SortOrder::Ascending)])?)?;

            let equal = Condition::builder().eq("a", 5).build()?;
            let plan = values.explain(Some(equal.clone()), FindOptions::new())?;
            assert_eq!(plan.index_name(), Some("by_a"));

            let conditions = vec![
                equal,
                Condition::builder().gt("a", 5).build()?,
                Condition::builder().is_in("a", vec![5, 7]).build()?,
                // each leaf is met by a different element of v
                Condition::builder().and().ge("a", 4).le("a", 5).close().build()?,
                Condition::builder().lt("a", "x").build()?,
            ];
            for condition in &conditions {
                let via_index = sorted_ids(&values, condition, FindOptions::new())?;
                let via_scan = sorted_ids(&values, condition, FindOptions::new().no_index())?;
                assert_eq!(via_index, via_scan, "{}", condition);
            }
            assert_eq!(
                sorted_ids(&values, &conditions[0], FindOptions::new())?,
                vec!["x", "y"]
            );
            assert_eq!(
                sorted_ids(&values, &conditions[3], FindOptions::new())?,
                vec!["v", "x", "y"]
            );
            assert_eq!(values.index_size("by_a")?, 8);
            Ok(())
        },
        cleanup,
    )
}
