//! Query Engine Tests
//!
//! Point lookup, range scan, membership match, last-N, and projection
//! validation.

mod common;

use common::*;
use rand::seq::SliceRandom;

/// Ten rows at noon + 0, 10, ..., 90 ms, inserted in random order.
fn ten_rows() -> (TestStore, Vec<Identity>) {
    let t = TestStore::new();
    let mut offsets: Vec<i64> = (0..10).map(|i| i * 10).collect();
    offsets.shuffle(&mut rand::thread_rng());
    for ms in &offsets {
        t.insert(
            id_plus(noon(), *ms),
            vec![("ms", Value::Int(*ms)), ("title", Value::from(format!("job {}", ms)))],
        );
    }
    let ids = (0..10).map(|i| id_plus(noon(), i * 10)).collect();
    (t, ids)
}

// ============================================================================
// Point lookup
// ============================================================================

#[test]
fn get_columns_returns_values_in_requested_order() {
    let (t, ids) = ten_rows();
    let values = t.store.get_columns(ids[3], &["title", "ms"]).unwrap();
    assert_eq!(values, vec![Value::from("job 30"), Value::Int(30)]);
    assert_eq!(t.store.fetch_one(ids[3], "MS").unwrap(), Value::Int(30));
}

#[test]
fn get_columns_on_missing_identity_is_not_found() {
    let (t, _) = ten_rows();
    let missing = id_plus(noon(), 5);
    match t.store.get_columns(missing, &["ms"]).unwrap_err() {
        Error::NotFound { identity } => assert_eq!(identity, missing.to_string()),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn get_columns_validates_projection() {
    let (t, ids) = ten_rows();
    assert!(matches!(
        t.store.get_columns(ids[0], &[]),
        Err(Error::InvalidInput { .. })
    ));
    match t.store.get_columns(ids[0], &["ms", "salary"]).unwrap_err() {
        Error::UnknownColumn { column } => assert_eq!(column, "salary"),
        other => panic!("expected UnknownColumn, got {other:?}"),
    }
}

// ============================================================================
// Range scan
// ============================================================================

#[test]
fn empty_projection_is_rejected_before_querying() {
    let (t, ids) = ten_rows();
    let none = Columns::Only(Vec::new());
    assert!(matches!(
        t.store.range(ids[0], ids[9], &none),
        Err(Error::InvalidInput { .. })
    ));
    assert!(matches!(
        t.store.last_n(3, &none),
        Err(Error::InvalidInput { .. })
    ));
    let filter = Filter::new().any_of("ms", [0]);
    assert!(matches!(
        t.store.match_rows(&filter, &none),
        Err(Error::InvalidInput { .. })
    ));
}

#[test]
fn range_is_inclusive_and_ascending() {
    let (t, ids) = ten_rows();
    let selection = t.store.range(ids[2], ids[6], &Columns::All).unwrap();
    let rows = match selection {
        Selection::Rows(rows) => rows,
        other => panic!("expected rows, got {other:?}"),
    };
    let got: Vec<Identity> = rows.iter().map(|r| r.identity().unwrap()).collect();
    assert_eq!(got, ids[2..=6].to_vec());
    assert_eq!(rows[0].columns(), &["date", "ms", "title"]);
}

#[test]
fn range_with_one_column_is_flat() {
    let (t, ids) = ten_rows();
    let selection = t
        .store
        .range(ids[0], ids[2], &Columns::only(["ms"]))
        .unwrap();
    assert_eq!(
        selection,
        Selection::Values(vec![Value::Int(0), Value::Int(10), Value::Int(20)])
    );
}

#[test]
fn range_with_several_columns_keeps_rows() {
    let (t, ids) = ten_rows();
    let selection = t
        .store
        .range(ids[8], ids[9], &Columns::only(["title", "ms"]))
        .unwrap();
    match selection {
        Selection::Rows(rows) => {
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[1].values(), &[Value::from("job 90"), Value::Int(90)]);
        }
        other => panic!("expected rows, got {other:?}"),
    }
}

#[test]
fn range_between_rows_and_reversed_is_empty() {
    let (t, ids) = ten_rows();
    let between = t
        .store
        .range(id_plus(noon(), 1), id_plus(noon(), 9), &Columns::All)
        .unwrap();
    assert!(between.is_empty());
    let reversed = t.store.range(ids[6], ids[2], &Columns::All).unwrap();
    assert!(reversed.is_empty());
}

#[test]
fn dates_in_accepts_bounds_in_either_order() {
    let (t, ids) = ten_rows();
    let forward = t.store.dates_in(ids[1], ids[4]).unwrap();
    let backward = t.store.dates_in(ids[4], ids[1]).unwrap();
    assert_eq!(forward, ids[1..=4].to_vec());
    assert_eq!(forward, backward);
}

// ============================================================================
// Match
// ============================================================================

fn scored_rows() -> (TestStore, Vec<Identity>) {
    let t = TestStore::new();
    let data = [(5, 0), (10, 0), (5, 1), (7, 0), (10, 1), (10, 0)];
    let ids = data
        .iter()
        .enumerate()
        .map(|(i, (score, dead))| {
            t.insert(
                id_plus(noon(), i as i64),
                vec![
                    ("score", Value::Int(*score)),
                    ("dead", Value::Int(*dead)),
                    ("viewed", Value::Bool(i % 2 == 0)),
                ],
            )
        })
        .collect();
    (t, ids)
}

#[test]
fn match_is_conjunction_of_memberships() {
    let (t, ids) = scored_rows();
    let filter = Filter::new().any_of("score", [5, 10]).any_of("dead", [0]);
    let matched = t.store.match_identities(&filter).unwrap();
    assert_eq!(matched, vec![ids[0], ids[1], ids[5]]);

    let rows = t
        .store
        .match_rows(&filter, &Columns::only(["score"]))
        .unwrap();
    let scores: Vec<Value> = rows.into_iter().flat_map(|r| r.into_values()).collect();
    assert_eq!(scores, vec![Value::Int(5), Value::Int(10), Value::Int(10)]);
}

#[test]
fn match_encodes_allowed_values() {
    let (t, ids) = scored_rows();
    let filter = Filter::new().any_of("viewed", [false]);
    assert_eq!(
        t.store.match_identities(&filter).unwrap(),
        vec![ids[1], ids[3], ids[5]]
    );
}

#[test]
fn match_null_finds_missing_values() {
    let (t, ids) = scored_rows();
    let late = t.insert(id_plus(noon(), 100), vec![("title", Value::from("late"))]);
    let filter = Filter::new().any_of("score", [Value::Null, Value::Int(7)]);
    assert_eq!(t.store.match_identities(&filter).unwrap(), vec![ids[3], late]);
}

#[test]
fn match_rejects_empty_filter() {
    let (t, _) = scored_rows();
    assert!(matches!(
        t.store.match_identities(&Filter::new()),
        Err(Error::InvalidInput { .. })
    ));
}

#[test]
fn match_with_empty_allowed_list_matches_nothing() {
    let (t, _) = scored_rows();
    let filter = Filter::new().any_of("score", Vec::<Value>::new());
    assert!(t.store.match_identities(&filter).unwrap().is_empty());
}

#[test]
fn match_on_unknown_column_is_rejected() {
    let (t, _) = scored_rows();
    let filter = Filter::new().any_of("salary", [100]);
    assert!(matches!(
        t.store.match_identities(&filter),
        Err(Error::UnknownColumn { .. })
    ));
}

// ============================================================================
// Last N
// ============================================================================

#[test]
fn last_n_returns_newest_first() {
    let (t, ids) = ten_rows();
    let rows = t.store.last_n(3, &Columns::All).unwrap();
    let got: Vec<Identity> = rows.iter().map(|r| r.identity().unwrap()).collect();
    assert_eq!(got, vec![ids[9], ids[8], ids[7]]);
    assert_eq!(t.store.last_n_identities(3).unwrap(), got);
}

#[test]
fn last_n_projection_starts_with_date() {
    let (t, ids) = ten_rows();
    let rows = t.store.last_n(2, &Columns::only(["title"])).unwrap();
    assert_eq!(rows[0].columns(), &["date", "title"]);
    assert_eq!(
        rows[0].values(),
        &[Value::Int(ids[9].as_i64()), Value::from("job 90")]
    );
}

#[test]
fn last_n_maps_are_keyed_by_column() {
    let (t, _) = ten_rows();
    let maps = t.store.last_n_maps(1, &Columns::only(["ms"])).unwrap();
    assert_eq!(maps.len(), 1);
    assert_eq!(maps[0].get("ms"), Some(&Value::Int(90)));
    assert!(maps[0].identity().is_ok());
}

#[test]
fn last_n_beyond_row_count_returns_everything() {
    let (t, _) = ten_rows();
    assert_eq!(t.store.last_n(100, &Columns::All).unwrap().len(), 10);
    assert!(t.store.last_n(0, &Columns::All).unwrap().is_empty());
}

// ============================================================================
// Sessions
// ============================================================================

#[test]
fn one_session_serves_many_queries() {
    let (t, ids) = ten_rows();
    let session = t.store.session().unwrap();
    assert_eq!(session.count().unwrap(), 10);
    assert_eq!(session.columns().unwrap().len(), 3);
    assert_eq!(session.dates_in(ids[0], ids[9]).unwrap().len(), 10);
    assert_eq!(session.fetch_one(ids[0], "ms").unwrap(), Value::Int(0));
}

#[test]
fn readers_see_committed_state_only() {
    let (t, ids) = ten_rows();
    let reader = t.store.session().unwrap();
    let mut writer = t.store.session().unwrap();

    let mut record = Record::with_identity(id_plus(noon(), 200)).with("remote", true);
    writer.write(&mut record, true).unwrap();

    assert_eq!(reader.count().unwrap(), 11);
    assert_eq!(reader.columns().unwrap().len(), 4);
    assert_eq!(reader.fetch_one(ids[0], "remote").unwrap(), Value::Null);
}
