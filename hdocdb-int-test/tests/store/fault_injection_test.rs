use hdocdb::common::{SortOrder, Value, ValueType};
use hdocdb::doc;
use hdocdb::errors::ErrorKind;
use hdocdb::{Condition, FindOptions, IndexDefinition, IndexField, IndexState, Mutation};
use hdocdb_int_test::test_util::{cleanup, create_test_context, run_test};

#[test]
fn test_failed_writes_leave_no_trace() {
    run_test(
        create_test_context,
        |ctx| {
            let accounts = ctx.db().collection("accounts")?;
            let original = doc! { _id: "a", balance: 10 };
            accounts.insert(original.clone())?;

            ctx.faults().fail_writes(true);
            let checks = [
                accounts.insert(doc! { _id: "b", balance: 1 }).map(|_| ()),
                accounts.update("a", &Mutation::new().increment("balance", 5)),
                accounts.replace(doc! { _id: "a", balance: 0 }),
                accounts.delete("a").map(|_| ()),
                accounts
                    .check_and_mutate("a", &Condition::all(), &Mutation::new().delete("balance"))
                    .map(|_| ()),
            ];
            for result in checks {
                assert_eq!(result.unwrap_err().kind(), &ErrorKind::IOError);
            }
            assert!(ctx.faults().injected() >= 5);
            ctx.faults().clear();

            assert_eq!(accounts.find_by_id("a", None)?, Some(original));
            assert!(accounts.find_by_id("b", None)?.is_none());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_read_faults_surface_as_io_errors() {
    run_test(
        create_test_context,
        |ctx| {
            let accounts = ctx.db().collection("accounts")?;
            accounts.insert(doc! { _id: "a", balance: 10 })?;

            ctx.faults().only_tables("accounts");
            ctx.faults().fail_reads(true);
            let err = accounts.find_by_id("a", None).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::IOError);
            let err = accounts.find(None, FindOptions::new()).err().expect("scan fails");
            assert_eq!(err.kind(), &ErrorKind::IOError);
            // writes read the row first
            let err = accounts
                .update("a", &Mutation::new().increment("balance", 1))
                .unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::IOError);
            ctx.faults().clear();

            let stored = accounts.find_by_id("a", None)?.expect("stored");
            assert_eq!(stored.field("balance"), Some(&Value::Int(10)));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_index_fault_mid_query_ends_the_cursor() {
    run_test(
        create_test_context,
        |ctx| {
            let numbers = ctx.db().collection("numbers")?;
            for n in 0..10 {
                numbers.insert(doc! { _id: n, a: n })?;
            }
            let field = IndexField::new("a", ValueType::Int, SortOrder::Ascending)?;
            numbers.create_index(IndexDefinition::new("by_a", vec![field]).with_async_build(false))?;

            // rows become unreadable after the cursor has started on the index
            let condition = Condition::builder().ge("a", 0).build()?;
            let mut cursor = numbers.find(Some(condition), FindOptions::new())?;
            ctx.faults().only_tables("numbers");
            ctx.faults().fail_reads(true);
            let first = cursor.next().expect("an error is reported");
            assert_eq!(first.unwrap_err().kind(), &ErrorKind::IOError);
            assert!(cursor.next().is_none());
            assert!(cursor.is_closed());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_failed_build_can_be_resumed() {
    run_test(
        create_test_context,
        |ctx| {
            let numbers = ctx.db().collection("numbers")?;
            for n in 0..4 {
                numbers.insert(doc! { _id: n, a: n })?;
            }

            ctx.faults().only_tables("_IDX_");
            ctx.faults().fail_writes(true);
            let field = IndexField::new("a", ValueType::Int, SortOrder::Ascending)?;
            let definition = IndexDefinition::new("by_a", vec![field]).with_async_build(false);
            let err = numbers.create_index(definition).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::IOError);
            ctx.faults().clear();

            assert_eq!(
                numbers.get_index("by_a")?.map(|d| d.state()),
                Some(IndexState::Building)
            );
            assert_eq!(numbers.run_pending_index_tasks()?, 1);
            assert_eq!(
                numbers.get_index("by_a")?.map(|d| d.state()),
                Some(IndexState::Active)
            );
            assert_eq!(numbers.index_size("by_a")?, 4);
            Ok(())
        },
        cleanup,
    )
}
