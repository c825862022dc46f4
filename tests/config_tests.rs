// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use opsbook::commands::config::{self, validate};
use opsbook::models::PaymentMethod;
use opsbook::utils::{
    self, BUDGET_TOP_CATEGORIES, PROPOSAL_PAYMENT_METHOD, REMOTE_TOKEN, REMOTE_URL,
};
use opsbook::{cli, db};
use rusqlite::Connection;

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    conn
}

fn run(conn: &Connection, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["opsbook", "config"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    if let Some(("config", config_m)) = matches.subcommand() {
        config::handle(conn, config_m)
    } else {
        panic!("config command not parsed");
    }
}

#[test]
fn remote_url_is_normalized() {
    assert_eq!(
        validate(REMOTE_URL, " https://api.example.com/v1/ ").unwrap(),
        "https://api.example.com/v1"
    );
    assert!(validate(REMOTE_URL, "ftp://example.com").is_err());
}

#[test]
fn payment_method_is_stored_in_canonical_form() {
    assert_eq!(
        validate(PROPOSAL_PAYMENT_METHOD, "cartao de credito").unwrap(),
        "Cartão de Crédito"
    );
    assert!(validate(PROPOSAL_PAYMENT_METHOD, "cheque").is_err());
}

#[test]
fn unknown_keys_and_bad_numbers_are_rejected() {
    let err = validate("base_currency", "BRL").unwrap_err();
    assert!(err.to_string().contains("Unknown setting"));
    assert!(validate(BUDGET_TOP_CATEGORIES, "three").is_err());
}

#[test]
fn set_get_unset_round_trip_through_the_cli() {
    let conn = setup();
    run(&conn, &["set", PROPOSAL_PAYMENT_METHOD, "boleto"]).unwrap();
    assert_eq!(
        utils::default_payment_method(&conn).unwrap(),
        PaymentMethod::Boleto
    );

    run(&conn, &["set", BUDGET_TOP_CATEGORIES, "5"]).unwrap();
    assert_eq!(utils::top_categories_setting(&conn).unwrap(), 5);

    run(&conn, &["unset", BUDGET_TOP_CATEGORIES]).unwrap();
    assert_eq!(utils::top_categories_setting(&conn).unwrap(), 3);

    run(&conn, &["set", REMOTE_TOKEN, "secret"]).unwrap();
    run(&conn, &["get", REMOTE_TOKEN]).unwrap();
    run(&conn, &["list"]).unwrap();
    assert_eq!(
        utils::get_setting(&conn, REMOTE_TOKEN).unwrap().as_deref(),
        Some("secret")
    );
}

#[test]
fn invalid_value_is_not_stored() {
    let conn = setup();
    assert!(run(&conn, &["set", REMOTE_URL, "example.com"]).is_err());
    assert!(utils::get_setting(&conn, REMOTE_URL).unwrap().is_none());
}
