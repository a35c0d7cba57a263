//! Commit Retry Tests
//!
//! Lock contention from another connection is transient: it is retried per
//! `RetryConfig` and surfaces as `CommitFailed` once the budget is spent.

mod common;

use common::*;
use std::thread;
use std::time::Duration;

fn impatient(retry: RetryConfig) -> StoreConfig {
    StoreConfig::default()
        .with_busy_timeout_ms(0)
        .with_retry(retry)
}

#[test]
fn locked_file_fails_after_bounded_attempts() {
    let t = TestStore::with_config(impatient(
        RetryConfig::new().with_max_retries(2).with_base_delay_ms(1),
    ));

    let blocker = t.raw();
    blocker.execute_batch("BEGIN EXCLUSIVE").unwrap();

    let mut record = Record::new()
        .with("date", "20240101120000000")
        .with("score", 1);
    let err = t.store.write(&mut record, true).unwrap_err();
    assert!(err.is_retryable());
    match err {
        Error::CommitFailed { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected CommitFailed, got {other:?}"),
    }

    blocker.execute_batch("ROLLBACK").unwrap();
    t.store.write(&mut record, true).unwrap();
    assert_eq!(t.store.count().unwrap(), 1);
}

#[test]
fn no_retry_fails_on_first_contention() {
    let t = TestStore::with_config(impatient(RetryConfig::no_retry()));
    let blocker = t.raw();
    blocker.execute_batch("BEGIN EXCLUSIVE").unwrap();

    let err = t.store.delete(&[id("20240101120000000")]).unwrap_err();
    assert!(matches!(err, Error::CommitFailed { attempts: 1, .. }));
    drop(blocker);
}

#[test]
fn contention_that_clears_is_absorbed() {
    let t = TestStore::with_config(impatient(
        RetryConfig::new()
            .with_max_retries(50)
            .with_base_delay_ms(5)
            .with_max_delay_ms(20),
    ));

    let blocker = t.raw();
    blocker.execute_batch("BEGIN EXCLUSIVE").unwrap();
    let release = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        blocker.execute_batch("COMMIT").unwrap();
    });

    let mut record = Record::new()
        .with("date", "20240101120000000")
        .with("score", 1);
    t.store.write(&mut record, true).unwrap();
    release.join().unwrap();
    assert_eq!(t.store.count().unwrap(), 1);
}

#[test]
fn failed_write_leaves_no_trace() {
    let t = TestStore::with_config(impatient(RetryConfig::no_retry()));
    t.insert(id("20240101120000000"), vec![("score", Value::Int(1))]);

    let blocker = t.raw();
    blocker.execute_batch("BEGIN EXCLUSIVE").unwrap();
    let mut record = Record::new()
        .with("date", "20240101120000001")
        .with("fresh", "column");
    assert!(t.store.write(&mut record, true).is_err());
    blocker.execute_batch("ROLLBACK").unwrap();

    assert_eq!(t.column_names(), vec!["date", "score"]);
    assert_eq!(t.store.count().unwrap(), 1);
}
