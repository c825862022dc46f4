// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use opsbook::models::{NewTransaction, TxType};
use opsbook::{db, store};
use rusqlite::Connection;
use rust_decimal_macros::dec;

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    conn
}

fn spend(conn: &Connection, name: &str, category: &str) -> i64 {
    store::insert_transaction(
        conn,
        &NewTransaction {
            name: name.into(),
            date: NaiveDate::from_ymd_opt(2026, 4, 2).unwrap(),
            amount: dec!(20),
            kind: TxType::Saida,
            account: "Nubank".into(),
            category: Some(category.into()),
            description: None,
            imported: false,
            file_source: None,
        },
    )
    .unwrap()
}

#[test]
fn rename_ignores_case_of_the_old_name() {
    let conn = setup();
    let a = spend(&conn, "Feira", "Mercado");
    let b = spend(&conn, "Padaria", "mercado");

    let n = store::rename_category(&conn, "MERCADO", "Alimentação").unwrap();
    assert_eq!(n, 2);
    for id in [a, b] {
        let t = store::get_transaction(&conn, id).unwrap();
        assert_eq!(t.category.as_deref(), Some("Alimentação"));
    }
    let names: Vec<String> = store::list_categories(&conn)
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["Alimentação"]);
}

#[test]
fn rename_can_change_only_the_case() {
    let conn = setup();
    let id = spend(&conn, "Cinema", "lazer");
    store::rename_category(&conn, "lazer", "Lazer").unwrap();
    assert_eq!(
        store::get_transaction(&conn, id).unwrap().category.as_deref(),
        Some("Lazer")
    );
    let names: Vec<String> = store::list_categories(&conn)
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["Lazer"]);
}

#[test]
fn rename_to_blank_is_rejected() {
    let conn = setup();
    spend(&conn, "Cinema", "Lazer");
    assert!(store::rename_category(&conn, "Lazer", "  ").is_err());
}
