// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use opsbook::engine::budget::{GoalStatus, UNCATEGORIZED};
use opsbook::models::{NewTransaction, TxType};
use opsbook::{cli, commands::budgets, db, store};
use rusqlite::Connection;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    conn
}

fn add_tx(conn: &Connection, date: &str, amount: Decimal, kind: TxType, category: Option<&str>) {
    store::insert_transaction(
        conn,
        &NewTransaction {
            name: "t".into(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            amount,
            kind,
            account: "Nubank".into(),
            category: category.map(Into::into),
            description: None,
            imported: false,
            file_source: None,
        },
    )
    .unwrap();
}

fn run(conn: &Connection, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["opsbook", "budget"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().get_matches_from(argv);
    if let Some(("budget", budget_m)) = matches.subcommand() {
        budgets::handle(conn, budget_m)
    } else {
        panic!("budget command not parsed");
    }
}

#[test]
fn setting_a_budget_twice_updates_the_same_goal() {
    let conn = setup();
    run(
        &conn,
        &["set", "--month", "2026-01", "--category", "Alimentação", "--amount", "400"],
    )
    .unwrap();
    run(
        &conn,
        &["set", "--month", "2026-01", "--category", "Alimentação", "--amount", "450,00"],
    )
    .unwrap();

    let goals = store::list_budget_goals(&conn, Some((2026, 1))).unwrap();
    assert_eq!(goals.len(), 1);
    assert_eq!(goals[0].budget_amount, dec!(450));
    assert_eq!(goals[0].period_start, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
    assert_eq!(goals[0].period_end, NaiveDate::from_ymd_opt(2026, 1, 31).unwrap());
}

#[test]
fn invalid_month_is_rejected() {
    let conn = setup();
    let err = run(
        &conn,
        &["set", "--month", "2026-13", "--category", "X", "--amount", "10"],
    )
    .unwrap_err();
    assert!(err.to_string().contains("Invalid month"));
}

#[test]
fn negative_budget_is_rejected() {
    let conn = setup();
    assert!(
        run(
            &conn,
            &["set", "--month", "2026-01", "--category", "X", "--amount", "-10"],
        )
        .is_err()
    );
    assert!(store::list_budget_goals(&conn, None).unwrap().is_empty());
}

#[test]
fn summary_compares_budget_with_spending() {
    let conn = setup();
    add_tx(&conn, "2026-01-03", dec!(300), TxType::Saida, Some("Alimentação"));
    add_tx(&conn, "2026-01-15", dec!(200), TxType::Saida, Some("Alimentação"));
    add_tx(&conn, "2026-01-05", dec!(1500), TxType::Saida, Some("Moradia"));
    add_tx(&conn, "2026-01-09", dec!(50), TxType::Saida, None);
    add_tx(&conn, "2026-01-05", dec!(5000), TxType::Entrada, Some("Salário"));
    add_tx(&conn, "2026-02-01", dec!(999), TxType::Saida, Some("Moradia"));
    run(
        &conn,
        &["set", "--month", "2026-01", "--category", "Alimentação", "--amount", "400"],
    )
    .unwrap();
    run(
        &conn,
        &["set", "--month", "2026-01", "--category", "Moradia", "--amount", "1500"],
    )
    .unwrap();

    let matches =
        cli::build_cli().get_matches_from(["opsbook", "budget", "summary", "--month", "2026-01"]);
    let Some(("budget", budget_m)) = matches.subcommand() else {
        panic!("budget command not parsed");
    };
    let Some(("summary", sub)) = budget_m.subcommand() else {
        panic!("summary not parsed");
    };
    let s = budgets::summary(&conn, sub).unwrap();

    assert_eq!(s.total_budgeted, dec!(1900));
    assert_eq!(s.total_spent, dec!(2050));
    assert_eq!(s.available_balance, dec!(-150));
    assert_eq!(s.utilization_percentage, dec!(107.89));

    let food = s
        .category_breakdown
        .iter()
        .find(|c| c.category == "Alimentação")
        .unwrap();
    assert_eq!(food.spent, dec!(500));
    assert_eq!(food.percentage, dec!(125));
    assert_eq!(food.status, GoalStatus::Excedido);

    let housing = s
        .category_breakdown
        .iter()
        .find(|c| c.category == "Moradia")
        .unwrap();
    assert_eq!(housing.status, GoalStatus::Atingido);

    let ranked: Vec<&str> = s.top_categories.iter().map(|c| c.category.as_str()).collect();
    assert_eq!(ranked, vec!["Moradia", "Alimentação", UNCATEGORIZED]);
    assert_eq!(s.top(2).len(), 2);
}

#[test]
fn summary_of_empty_month_is_all_zero() {
    let conn = setup();
    let matches =
        cli::build_cli().get_matches_from(["opsbook", "budget", "summary", "--month", "2026-05"]);
    let Some(("budget", budget_m)) = matches.subcommand() else {
        panic!("budget command not parsed");
    };
    let Some(("summary", sub)) = budget_m.subcommand() else {
        panic!("summary not parsed");
    };
    let s = budgets::summary(&conn, sub).unwrap();
    assert_eq!(s.total_spent, Decimal::ZERO);
    assert_eq!(s.utilization_percentage, Decimal::ZERO);
    assert!(s.category_breakdown.is_empty());
}

#[test]
fn removing_a_goal() {
    let conn = setup();
    run(
        &conn,
        &["set", "--month", "2026-01", "--category", "Lazer", "--amount", "100"],
    )
    .unwrap();
    let id = store::list_budget_goals(&conn, None).unwrap()[0].id;
    run(&conn, &["rm", &id.to_string()]).unwrap();
    assert!(store::list_budget_goals(&conn, None).unwrap().is_empty());
    assert!(run(&conn, &["rm", &id.to_string()]).is_err());
}

#[test]
fn summary_can_be_limited_to_one_account() {
    let conn = setup();
    add_tx(&conn, "2026-01-05", dec!(300), TxType::Saida, Some("Lazer"));
    store::insert_transaction(
        &conn,
        &NewTransaction {
            name: "Cartão PJ".into(),
            date: NaiveDate::from_ymd_opt(2026, 1, 7).unwrap(),
            amount: dec!(700),
            kind: TxType::Saida,
            account: "Itaú".into(),
            category: Some("Lazer".into()),
            description: None,
            imported: false,
            file_source: None,
        },
    )
    .unwrap();
    run(
        &conn,
        &["set", "--month", "2026-01", "--category", "Lazer", "--amount", "1000"],
    )
    .unwrap();

    let matches = cli::build_cli().get_matches_from([
        "opsbook", "budget", "summary", "--month", "2026-01", "--account", "Itaú",
    ]);
    let Some(("budget", budget_m)) = matches.subcommand() else {
        panic!("budget command not parsed");
    };
    let Some(("summary", sub)) = budget_m.subcommand() else {
        panic!("summary not parsed");
    };
    let s = budgets::summary(&conn, sub).unwrap();
    assert_eq!(s.total_spent, dec!(700));
    assert_eq!(s.available_balance, dec!(300));
}

#[test]
fn decisions_and_cashflow_reports_accept_an_account() {
    let conn = setup();
    add_tx(&conn, "2026-01-05", dec!(2000), TxType::Entrada, Some("Vendas"));
    add_tx(&conn, "2026-02-05", dec!(800), TxType::Saida, Some("Moradia"));
    for args in [
        vec!["opsbook", "report", "decisions", "--month", "2026-02", "--account", "Nubank", "--json"],
        vec!["opsbook", "report", "cashflow", "--month", "2026-02", "--account", "Nubank"],
        vec!["opsbook", "report", "history", "--month", "2026-02", "--months", "3"],
    ] {
        let matches = cli::build_cli().get_matches_from(args);
        let Some(("report", report_m)) = matches.subcommand() else {
            panic!("report command not parsed");
        };
        opsbook::commands::reports::handle(&conn, report_m).unwrap();
    }
    assert!(
        cli::build_cli()
            .try_get_matches_from(["opsbook", "report", "history", "--months", "0"])
            .is_err()
    );
}
