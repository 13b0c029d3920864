use std::collections::BTreeMap;

use pagedb::{Config, DataType, Database, Row, Schema};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Operation {
    Insert(i32),
    Delete(i32),
    Update(i32, String),
}

fn arb_operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        3 => (-60i32..60).prop_map(Operation::Insert),
        2 => (-60i32..60).prop_map(Operation::Delete),
        1 => ((-60i32..60), "[a-z]{0,12}").prop_map(|(k, s)| Operation::Update(k, s)),
    ]
}

fn schema() -> Schema {
    Schema::new([("id", DataType::Integer), ("note", DataType::Text)]).unwrap()
}

fn row(id: i32, note: &str) -> Row {
    Row::new().with("id", id).with("note", note)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_cursor_matches_model(ops in prop::collection::vec(arb_operation(), 1..200)) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path().join("prop.db")).write_through(false);
        let mut db = Database::open(config).unwrap();
        let table = db.create_table("t", schema()).unwrap();
        let mut model: BTreeMap<i32, String> = BTreeMap::new();

        for op in ops {
            match op {
                Operation::Insert(key) => {
                    let result = table.insert(key, &row(key, "v"));
                    if model.contains_key(&key) {
                        prop_assert!(result.is_err());
                    } else {
                        prop_assert!(result.is_ok());
                        model.insert(key, "v".to_string());
                    }
                }
                Operation::Delete(key) => {
                    let deleted = table.delete(key).unwrap();
                    prop_assert_eq!(deleted, model.remove(&key).is_some());
                }
                Operation::Update(key, note) => {
                    let updated = table.update(key, &row(key, &note)).unwrap();
                    prop_assert_eq!(updated, model.contains_key(&key));
                    if updated {
                        model.insert(key, note);
                    }
                }
            }
        }

        prop_assert!(table.validate().is_ok());

        let rows: Vec<(i32, Row)> = table
            .start()
            .unwrap()
            .collect::<pagedb::Result<_>>()
            .unwrap();
        let expected: Vec<(i32, Row)> = model
            .iter()
            .map(|(&key, note)| (key, row(key, note)))
            .collect();
        prop_assert_eq!(rows, expected);
    }

    #[test]
    fn prop_row_roundtrip(id in any::<i32>(), note in ".{0,200}") {
        let bytes = pagedb::record::encode(&row(id, &note), &schema()).unwrap();
        let decoded = pagedb::record::decode(&bytes, &schema()).unwrap();
        prop_assert_eq!(decoded, row(id, &note));
    }
}
