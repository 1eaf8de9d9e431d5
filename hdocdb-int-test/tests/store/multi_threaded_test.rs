use hdocdb::common::{SortOrder, Value, ValueType};
use hdocdb::doc;
use hdocdb::{Condition, FindOptions, IndexDefinition, IndexField, Mutation};
use hdocdb_int_test::test_util::{cleanup, create_test_context_with, run_test};
use std::thread;

const THREADS: usize = 4;
const ROUNDS: usize = 50;

#[test]
fn test_concurrent_increments_are_not_lost() {
    run_test(
        || create_test_context_with(|builder| builder.max_write_retries(10_000)),
        |ctx| {
            let counters = ctx.db().collection("counters")?;
            counters.insert(doc! { _id: "c", n: 0 })?;

            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let counters = counters.clone();
                    thread::spawn(move || {
                        for _ in 0..ROUNDS {
                            counters.update("c", &Mutation::new().increment("n", 1))?;
                        }
                        Ok::<_, hdocdb::HDocError>(())
                    })
                })
                .collect();
            for handle in handles {
                handle.join().expect("writer thread panicked")?;
            }

            let stored = counters.find_by_id("c", None)?.expect("stored");
            assert_eq!(stored.field("n"), Some(&Value::Int((THREADS * ROUNDS) as i32)));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_only_one_conditional_claim_wins() {
    run_test(
        || create_test_context_with(|builder| builder.max_write_retries(10_000)),
        |ctx| {
            let locks = ctx.db().collection("locks")?;
            let free = Condition::builder().not_exists("owner").build()?;

            let handles: Vec<_> = (0..THREADS)
                .map(|worker| {
                    let locks = locks.clone();
                    let free = free.clone();
                    thread::spawn(move || {
                        let claim = Mutation::new().set_or_replace("owner", worker as i32);
                        locks.check_and_mutate("lock", &free, &claim)
                    })
                })
                .collect();

            let mut winners = 0;
            for handle in handles {
                if handle.join().expect("claimer thread panicked")? {
                    winners += 1;
                }
            }
            assert_eq!(winners, 1);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_index_stays_consistent_under_concurrent_updates() {
    run_test(
        || create_test_context_with(|builder| builder.max_write_retries(10_000)),
        |ctx| {
            let items = ctx.db().collection("items")?;
            let field = IndexField::new("bucket", ValueType::Int, SortOrder::Ascending)?;
            items.create_index(IndexDefinition::new("by_bucket", vec![field]).with_async_build(false))?;
            for id in 0..THREADS as i32 {
                items.insert(doc! { _id: id, bucket: 0 })?;
            }

            // each thread owns one document and moves it through the buckets
            let handles: Vec<_> = (0..THREADS as i32)
                .map(|id| {
                    let items = items.clone();
                    thread::spawn(move || {
                        for _ in 0..ROUNDS {
                            items.update(id, &Mutation::new().increment("bucket", 1))?;
                        }
                        Ok::<_, hdocdb::HDocError>(())
                    })
                })
                .collect();
            for handle in handles {
                handle.join().expect("writer thread panicked")?;
            }

            assert_eq!(items.index_size("by_bucket")?, THREADS);
            let last = Condition::builder().eq("bucket", ROUNDS as i32).build()?;
            let found = items.find(Some(last), FindOptions::new())?.to_vec()?;
            assert_eq!(found.len(), THREADS);
            Ok(())
        },
        cleanup,
    )
}
