// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use opsbook::engine::proposal::{calculate_installments, terms_total};
use opsbook::engine::currency::round_cents;
use opsbook::models::{PaymentMethod, ProposalStatus};
use opsbook::{cli, commands::proposals, db, store};
use proptest::prelude::*;
use rusqlite::Connection;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    conn
}

fn run(conn: &Connection, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["opsbook", "proposal"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    if let Some(("proposal", proposal_m)) = matches.subcommand() {
        proposals::handle(conn, proposal_m)
    } else {
        panic!("proposal command not parsed");
    }
}

/// Client "ACME", 2 x 1500 consulting, 10% discount, 5% tax.
fn priced_proposal(conn: &Connection) -> i64 {
    run(
        conn,
        &["new", "--client", "ACME Ltda", "--number", "2026-001", "--date", "2026-01-10"],
    )
    .unwrap();
    let id = store::list_proposals(conn).unwrap()[0].id;
    let id_s = id.to_string();
    run(
        conn,
        &[
            "service", &id_s, "--name", "Consultoria", "--quantity", "2", "--unit-value", "1500",
        ],
    )
    .unwrap();
    run(conn, &["discount", &id_s, "--kind", "percent", "--value", "10"]).unwrap();
    run(conn, &["tax", &id_s, "--kind", "percent", "--value", "5"]).unwrap();
    id
}

#[test]
fn new_proposal_defaults_validity_and_status() {
    let conn = setup();
    run(&conn, &["new", "--client", "Maria", "--date", "2026-03-01"]).unwrap();
    let p = &store::list_proposals(&conn).unwrap()[0];
    assert_eq!(p.status, ProposalStatus::EmCriacao);
    assert_eq!(p.valid_until, NaiveDate::from_ymd_opt(2026, 3, 31));
    assert!(p.services.is_empty());
    assert_eq!(p.totals.total, Decimal::ZERO);
}

#[test]
fn proposals_without_a_number_get_one() {
    let conn = setup();
    run(&conn, &["new", "--client", "Maria"]).unwrap();
    run(&conn, &["new", "--client", "João", "--number", " 2026-100 "]).unwrap();
    let ps = store::list_proposals(&conn).unwrap();
    let generated = ps.iter().find(|p| p.client.name == "Maria").unwrap();
    let number = generated.number.as_deref().unwrap();
    let (year, digits) = number.split_once('-').unwrap();
    assert_eq!(year, chrono::Local::now().format("%Y").to_string());
    assert_eq!(digits.len(), 6);
    assert!(digits.chars().all(|c| c.is_ascii_digit()));

    let given = ps.iter().find(|p| p.client.name == "João").unwrap();
    assert_eq!(given.number.as_deref(), Some("2026-100"));
}

#[test]
fn totals_follow_services_discount_and_tax() {
    let conn = setup();
    let id = priced_proposal(&conn);
    let p = store::get_proposal(&conn, id).unwrap();
    assert_eq!(p.totals.subtotal, dec!(3000));
    assert_eq!(p.totals.discount_amount, dec!(300));
    assert_eq!(p.totals.tax_amount, dec!(135));
    assert_eq!(p.totals.total, dec!(2835));
}

#[test]
fn removing_a_service_recomputes_totals() {
    let conn = setup();
    let id = priced_proposal(&conn);
    let id_s = id.to_string();
    run(
        &conn,
        &["service", &id_s, "--name", "Treinamento", "--unit-value", "1000"],
    )
    .unwrap();
    assert_eq!(store::get_proposal(&conn, id).unwrap().totals.subtotal, dec!(4000));

    run(&conn, &["service-rm", &id_s, "--line", "1"]).unwrap();
    let p = store::get_proposal(&conn, id).unwrap();
    assert_eq!(p.services.len(), 1);
    assert_eq!(p.services[0].name, "Treinamento");
    assert_eq!(p.totals.subtotal, dec!(1000));
    assert_eq!(p.totals.total, dec!(945));

    assert!(run(&conn, &["service-rm", &id_s, "--line", "3"]).is_err());
}

#[test]
fn installments_split_the_total_to_the_cent() {
    let conn = setup();
    let id = priced_proposal(&conn);
    let id_s = id.to_string();
    run(&conn, &["discount", &id_s, "--kind", "fixed", "--value", "0"]).unwrap();
    run(&conn, &["tax", &id_s, "--kind", "fixed", "--value", "0"]).unwrap();
    run(&conn, &["service-rm", &id_s, "--line", "1"]).unwrap();
    run(
        &conn,
        &["service", &id_s, "--name", "Projeto", "--unit-value", "100"],
    )
    .unwrap();
    run(
        &conn,
        &[
            "installments", &id_s, "--count", "3", "--first-due", "2026-01-31", "--method",
            "boleto",
        ],
    )
    .unwrap();

    let p = store::get_proposal(&conn, id).unwrap();
    let amounts: Vec<Decimal> = p.payment_terms.iter().map(|t| t.amount).collect();
    assert_eq!(amounts, vec![dec!(33.33), dec!(33.33), dec!(33.34)]);
    let dues: Vec<NaiveDate> = p.payment_terms.iter().map(|t| t.due_date).collect();
    assert_eq!(
        dues,
        vec![
            NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 28).unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
        ]
    );
    assert!(p.payment_terms.iter().all(|t| t.payment_method == PaymentMethod::Boleto));
    assert!(p.issues().is_empty());
}

#[test]
fn installments_use_configured_payment_method() {
    let conn = setup();
    opsbook::utils::set_setting(&conn, opsbook::utils::PROPOSAL_PAYMENT_METHOD, "Transferência")
        .unwrap();
    let id = priced_proposal(&conn);
    run(
        &conn,
        &["installments", &id.to_string(), "--count", "2", "--first-due", "2026-02-10"],
    )
    .unwrap();
    let p = store::get_proposal(&conn, id).unwrap();
    assert_eq!(terms_total(&p.payment_terms), dec!(2835));
    assert!(
        p.payment_terms
            .iter()
            .all(|t| t.payment_method == PaymentMethod::Transferencia)
    );
}

#[test]
fn zero_installments_or_empty_proposal_are_rejected() {
    let conn = setup();
    let id = priced_proposal(&conn);
    let id_s = id.to_string();
    let err = run(
        &conn,
        &["installments", &id_s, "--count", "0", "--first-due", "2026-02-10"],
    )
    .unwrap_err();
    assert!(err.to_string().contains("greater than zero"));

    run(&conn, &["new", "--client", "Vazio"]).unwrap();
    let empty = store::list_proposals(&conn)
        .unwrap()
        .into_iter()
        .find(|p| p.client.name == "Vazio")
        .unwrap();
    assert!(
        run(
            &conn,
            &["installments", &empty.id.to_string(), "--count", "2", "--first-due", "2026-02-10"],
        )
        .is_err()
    );
}

#[test]
fn schedule_goes_stale_when_prices_change() {
    let conn = setup();
    let id = priced_proposal(&conn);
    let id_s = id.to_string();
    run(
        &conn,
        &["installments", &id_s, "--count", "3", "--first-due", "2026-02-10"],
    )
    .unwrap();
    run(&conn, &["discount", &id_s, "--kind", "fixed", "--value", "35"]).unwrap();
    let p = store::get_proposal(&conn, id).unwrap();
    assert_eq!(p.issues().len(), 1);
    assert!(p.issues()[0].contains("payment terms"));
}

#[test]
fn refusing_requires_a_reason() {
    let conn = setup();
    let id = priced_proposal(&conn);
    let id_s = id.to_string();
    let err = run(&conn, &["status", &id_s, "Recusada"]).unwrap_err();
    assert!(err.to_string().contains("rejection reason"));
    assert_eq!(
        store::get_proposal(&conn, id).unwrap().status,
        ProposalStatus::EmCriacao
    );

    run(&conn, &["status", &id_s, "Recusada", "--reason", "preço"]).unwrap();
    let p = store::get_proposal(&conn, id).unwrap();
    assert_eq!(p.status, ProposalStatus::Recusada);
    assert_eq!(p.rejection_reason.as_deref(), Some("preço"));

    run(&conn, &["status", &id_s, "Aprovada"]).unwrap();
    assert!(store::get_proposal(&conn, id).unwrap().rejection_reason.is_none());
}

#[test]
fn negative_discount_is_rejected() {
    let conn = setup();
    let id = priced_proposal(&conn);
    assert!(run(&conn, &["discount", &id.to_string(), "--value", "-5"]).is_err());
    assert_eq!(
        store::get_proposal(&conn, id).unwrap().totals.total,
        dec!(2835)
    );
}

#[test]
fn removing_a_proposal() {
    let conn = setup();
    let id = priced_proposal(&conn);
    run(&conn, &["rm", &id.to_string()]).unwrap();
    assert!(store::get_proposal(&conn, id).is_err());
}

proptest! {
    #[test]
    fn installments_always_add_up(cents in 1i64..100_000_000, count in 1i64..48) {
        // at least one real per installment
        prop_assume!(cents >= count * 100);
        let total = Decimal::new(cents, 2);
        let first = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let terms = calculate_installments(total, count, first, PaymentMethod::Pix).unwrap();
        prop_assert_eq!(terms.len() as i64, count);
        prop_assert_eq!(terms_total(&terms), round_cents(total));
        let head = terms[0].amount;
        prop_assert!(terms[..terms.len() - 1].iter().all(|t| t.amount == head));
        prop_assert!(terms.iter().all(|t| t.amount > Decimal::ZERO));
    }

    #[test]
    fn non_positive_counts_never_produce_a_schedule(count in -50i64..=0) {
        let first = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        prop_assert!(calculate_installments(dec!(100), count, first, PaymentMethod::Pix).is_err());
    }
}
