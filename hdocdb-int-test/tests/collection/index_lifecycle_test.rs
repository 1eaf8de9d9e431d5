use hdocdb::common::{SortOrder, ValueType};
use hdocdb::doc;
use hdocdb::errors::{ErrorKind, HDocResult};
use hdocdb::{Condition, FindOptions, IndexDefinition, IndexField, IndexState, PlanType};
use hdocdb_int_test::test_util::{cleanup, create_test_context, run_test};

fn by_age(async_build: bool) -> HDocResult<IndexDefinition> {
    let field = IndexField::new("age", ValueType::Int, SortOrder::Ascending)?;
    Ok(IndexDefinition::new("by_age", vec![field]).with_async_build(async_build))
}

#[test]
fn test_sync_index_is_active_and_backfilled() {
    run_test(
        create_test_context,
        |ctx| {
            let users = ctx.db().collection("users")?;
            for age in [18, 30, 42] {
                users.insert(doc! { age: age })?;
            }
            users.insert(doc! { name: "no age" })?;

            let descriptor = users.create_index(by_age(false)?)?;
            assert_eq!(descriptor.state(), IndexState::Active);
            // documents without the field are indexed under null
            assert_eq!(users.index_size("by_age")?, 4);

            users.insert(doc! { age: 50 })?;
            assert_eq!(users.index_size("by_age")?, 5);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_async_index_waits_for_pending_tasks() {
    run_test(
        create_test_context,
        |ctx| {
            let users = ctx.db().collection("users")?;
            users.insert(doc! { _id: 1, age: 30 })?;

            let descriptor = users.create_index(by_age(true)?)?;
            assert_eq!(descriptor.state(), IndexState::Building);

            // a building index is maintained but not used for reads
            users.insert(doc! { _id: 2, age: 31 })?;
            let condition = Condition::builder().ge("age", 30).build()?;
            let plan = users.explain(Some(condition.clone()), FindOptions::new())?;
            assert_eq!(plan.plan_type(), PlanType::FullTableScan);

            assert_eq!(users.run_pending_index_tasks()?, 1);
            assert_eq!(users.get_index("by_age")?.map(|d| d.state()), Some(IndexState::Active));
            assert_eq!(users.index_size("by_age")?, 2);

            let mut cursor = users.find(Some(condition), FindOptions::new())?;
            assert_eq!(cursor.to_vec()?.len(), 2);
            assert_eq!(cursor.query_info().index_name(), Some("by_age"));
            assert_eq!(users.run_pending_index_tasks()?, 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_duplicate_and_invalid_definitions() {
    run_test(
        create_test_context,
        |ctx| {
            let users = ctx.db().collection("users")?;
            users.create_index(by_age(false)?)?;
            let err = users.create_index(by_age(false)?).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::IndexAlreadyExists);

            let empty = IndexDefinition::new("empty", vec![]);
            assert!(users.create_index(empty).is_err());
            assert_eq!(users.list_indexes()?.len(), 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_drop_index_stops_using_it() {
    run_test(
        create_test_context,
        |ctx| {
            let users = ctx.db().collection("users")?;
            users.insert(doc! { age: 1 })?;
            users.create_index(by_age(false)?)?;

            users.drop_index("by_age", false)?;
            assert_eq!(users.get_index("by_age")?.map(|d| d.state()), Some(IndexState::Inactive));
            let condition = Condition::builder().eq("age", 1).build()?;
            let plan = users.explain(Some(condition.clone()), FindOptions::new())?;
            assert_eq!(plan.plan_type(), PlanType::FullTableScan);
            assert_eq!(users.find(Some(condition), FindOptions::new())?.to_vec()?.len(), 1);

            assert_eq!(users.run_pending_index_tasks()?, 1);
            assert!(users.get_index("by_age")?.is_none());
            let err = users.drop_index("by_age", true).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::IndexNotFound);

            // the name can be reused once dropped
            let recreated = users.create_index(by_age(false)?)?;
            assert_eq!(recreated.state(), IndexState::Active);
            assert_eq!(users.index_size("by_age")?, 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_indexes_are_visible_to_other_handles() {
    run_test(
        create_test_context,
        |ctx| {
            let db = ctx.db();
            db.collection("users")?.create_index(by_age(false)?)?;

            // a second database over the same store loads the catalog
            let other = hdocdb::HDocDb::builder()
                .store_handle(db.store())
                .open()?;
            let users = other.collection("users")?;
            let names: Vec<String> = users
                .list_indexes()?
                .iter()
                .map(|d| d.name().to_string())
                .collect();
            assert_eq!(names, vec!["by_age"]);
            Ok(())
        },
        cleanup,
    )
}
