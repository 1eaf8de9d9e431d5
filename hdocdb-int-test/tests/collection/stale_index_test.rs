use hdocdb::common::{SortOrder, Value, ValueType};
use hdocdb::doc;
use hdocdb::errors::{ErrorKind, HDocResult};
use hdocdb::{
    Condition, DocumentCollection, FindOptions, HDocDb, IndexDefinition, IndexField, Mutation,
};
use hdocdb_int_test::test_util::{cleanup, create_test_context_with, run_test};
use std::thread;
use std::time::Duration;

fn indexed_numbers(db: &HDocDb) -> HDocResult<DocumentCollection> {
    let numbers = db.collection("numbers")?;
    for n in 1..=5 {
        numbers.insert(doc! { _id: n, a: n })?;
    }
    let field = IndexField::new("a", ValueType::Int, SortOrder::Ascending)?;
    numbers.create_index(IndexDefinition::new("by_a", vec![field]).with_async_build(false))?;
    Ok(numbers)
}

#[test]
fn test_entries_that_no_longer_match_are_counted_and_removed() {
    run_test(
        || create_test_context_with(|builder| builder.scan_batch_hint(1)),
        |ctx| {
            let numbers = indexed_numbers(&ctx.db())?;

            // the row write lands but its index maintenance does not
            ctx.faults().only_tables("_IDX_");
            ctx.faults().fail_writes(true);
            let err = numbers
                .update(4, &Mutation::new().set_or_replace("a", -1))
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::IOError);
            ctx.faults().clear();

            let condition = Condition::builder().ge("a", 1).build()?;
            let mut cursor = numbers.find(Some(condition.clone()), FindOptions::new())?;
            let first = cursor.next().expect("one match")?;
            assert_eq!(first.id(), Some(&Value::Int(1)));
            let rest = cursor.to_vec()?;
            assert_eq!(rest.len(), 3);

            let info = cursor.query_info();
            assert_eq!(info.index_name(), Some("by_a"));
            assert_eq!(info.scanned_index_entries(), 5);
            assert!(info.stale_index_entries() >= 1);

            // the stale entry was removed, so the next scan is clean
            assert_eq!(numbers.index_size("by_a")?, 4);
            let mut again = numbers.find(Some(condition), FindOptions::new())?;
            assert_eq!(again.to_vec()?.len(), 4);
            assert_eq!(again.query_info().stale_index_entries(), 0);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_entries_of_missing_rows_expire() {
    run_test(
        || create_test_context_with(|builder| builder.stale_index_expiry_ms(0)),
        |ctx| {
            let numbers = indexed_numbers(&ctx.db())?;

            ctx.faults().only_tables("_IDX_");
            ctx.faults().fail_writes(true);
            assert!(numbers.delete(2).is_err());
            ctx.faults().clear();
            assert!(numbers.find_by_id(2, None)?.is_none());
            thread::sleep(Duration::from_millis(5));

            let condition = Condition::builder().le("a", 3).build()?;
            let mut cursor = numbers.find(Some(condition), FindOptions::new())?;
            let found = cursor.to_vec()?;
            assert_eq!(found.len(), 2);
            assert_eq!(cursor.query_info().stale_index_entries(), 1);
            assert_eq!(numbers.index_size("by_a")?, 4);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_young_entries_of_missing_rows_are_kept() {
    run_test(
        || create_test_context_with(|builder| builder.stale_index_expiry_ms(60_000)),
        |ctx| {
            let numbers = indexed_numbers(&ctx.db())?;

            ctx.faults().only_tables("_IDX_");
            ctx.faults().fail_writes(true);
            assert!(numbers.delete(2).is_err());
            ctx.faults().clear();

            let condition = Condition::builder().le("a", 3).build()?;
            let mut cursor = numbers.find(Some(condition), FindOptions::new())?;
            assert_eq!(cursor.to_vec()?.len(), 2);
            assert_eq!(cursor.query_info().stale_index_entries(), 1);
            // it may belong to an insert whose row is not written yet
            assert_eq!(numbers.index_size("by_a")?, 5);
            Ok(())
        },
        cleanup,
    )
}
