use hdocdb::common::Value;
use hdocdb::doc;
use hdocdb::{Condition, Mutation};
use hdocdb_int_test::test_util::{cleanup, create_test_context, run_test};

#[test]
fn test_check_and_mutate_applies_only_when_condition_holds() {
    run_test(
        create_test_context,
        |ctx| {
            let jobs = ctx.db().collection("jobs")?;
            let original = doc! { _id: "j1", state: "queued", attempts: 0 };
            jobs.insert(original.clone())?;

            let running = Condition::builder().eq("state", "running").build()?;
            let start = Mutation::new()
                .set_or_replace("state", "running")
                .increment("attempts", 1);
            assert!(!jobs.check_and_mutate("j1", &running, &start)?);
            assert_eq!(jobs.find_by_id("j1", None)?, Some(original));

            let queued = Condition::builder().eq("state", "queued").build()?;
            assert!(jobs.check_and_mutate("j1", &queued, &start)?);
            let stored = jobs.find_by_id("j1", None)?.expect("stored");
            assert_eq!(stored.field("state"), Some(&Value::from("running")));
            assert_eq!(stored.field("attempts"), Some(&Value::Int(1)));

            // the same guard no longer holds
            assert!(!jobs.check_and_mutate("j1", &queued, &start)?);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_missing_document_is_checked_as_empty() {
    run_test(
        create_test_context,
        |ctx| {
            let locks = ctx.db().collection("locks")?;
            let free = Condition::builder().not_exists("owner").build()?;
            let claim = Mutation::new().set_or_replace("owner", "worker-1");

            assert!(locks.check_and_mutate("lock", &free, &claim)?);
            assert_eq!(
                locks.find_by_id("lock", None)?,
                Some(doc! { _id: "lock", owner: "worker-1" })
            );

            let claim_again = Mutation::new().set_or_replace("owner", "worker-2");
            assert!(!locks.check_and_mutate("lock", &free, &claim_again)?);

            let owned = Condition::builder().exists("owner").build()?;
            assert!(!locks.check_and_replace("other", &owned, doc! { owner: "x" })?);
            assert!(locks.find_by_id("other", None)?.is_none());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_check_and_replace() {
    run_test(
        create_test_context,
        |ctx| {
            let docs = ctx.db().collection("docs")?;
            docs.insert(doc! { _id: 1, version: 1, body: "a" })?;

            let v2 = Condition::builder().eq("version", 2).build()?;
            assert!(!docs.check_and_replace(1, &v2, doc! { version: 3, body: "c" })?);
            assert_eq!(
                docs.find_by_id(1, None)?,
                Some(doc! { _id: 1, version: 1, body: "a" })
            );

            let v1 = Condition::builder().eq("version", 1).build()?;
            assert!(docs.check_and_replace(1, &v1, doc! { version: 2, body: "b" })?);
            assert_eq!(
                docs.find_by_id(1, None)?,
                Some(doc! { _id: 1, version: 2, body: "b" })
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_check_and_delete() {
    run_test(
        create_test_context,
        |ctx| {
            let sessions = ctx.db().collection("sessions")?;
            sessions.insert(doc! { _id: "s", expired: false })?;

            let expired = Condition::builder().eq("expired", true).build()?;
            assert!(!sessions.check_and_delete("s", &expired)?);
            assert!(sessions.find_by_id("s", None)?.is_some());
            assert!(!sessions.check_and_delete("missing", &Condition::all())?);

            sessions.update("s", &Mutation::new().set_or_replace("expired", true))?;
            assert!(sessions.check_and_delete("s", &expired)?);
            assert!(sessions.find_by_id("s", None)?.is_none());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_compound_guard() {
    run_test(
        create_test_context,
        |ctx| {
            let accounts = ctx.db().collection("accounts")?;
            accounts.insert(doc! { _id: "a", balance: 100, frozen: false })?;

            let can_debit = Condition::builder()
                .and()
                .ge("balance", 30)
                .eq("frozen", false)
                .close()
                .build()?;
            let debit = Mutation::new().increment("balance", -30);

            let mut applied = 0;
            while accounts.check_and_mutate("a", &can_debit, &debit)? {
                applied += 1;
            }
            assert_eq!(applied, 3);
            let stored = accounts.find_by_id("a", None)?.expect("stored");
            assert_eq!(stored.field("balance"), Some(&Value::Int(10)));
            Ok(())
        },
        cleanup,
    )
}
