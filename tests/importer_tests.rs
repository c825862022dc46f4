// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use opsbook::models::TxType;
use opsbook::store::{self, TxFilter};
use opsbook::{cli, commands::importer, db};
use rusqlite::Connection;
use rust_decimal_macros::dec;
use std::io::Write;
use tempfile::NamedTempFile;

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    conn
}

fn statement(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", contents).unwrap();
    file.flush().unwrap();
    file
}

fn import(conn: &mut Connection, path: &str, extra: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec![
        "opsbook",
        "import",
        "transactions",
        "--path",
        path,
        "--account",
        "Nubank",
    ];
    argv.extend_from_slice(extra);
    let matches = cli::build_cli().get_matches_from(argv);
    if let Some(("import", import_m)) = matches.subcommand() {
        importer::handle(conn, import_m)
    } else {
        panic!("no import subcommand");
    }
}

fn count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0))
        .unwrap()
}

const BR_CSV: &str = "Data;Descrição;Valor\n\
10/01/2026;Padaria Pão Quente;-1.234,56\n\
11/01/2026;Pix recebido;500,00\n";

#[test]
fn importer_trims_cli_path_argument() {
    let mut conn = setup();
    let file = statement(BR_CSV);
    let padded = format!("  {}  ", file.path().to_str().unwrap());
    import(&mut conn, &padded, &[]).unwrap();
    assert_eq!(count(&conn), 2);
}

#[test]
fn brazilian_csv_rows_become_typed_transactions() {
    let mut conn = setup();
    let file = statement(BR_CSV);
    import(&mut conn, file.path().to_str().unwrap(), &[]).unwrap();

    let txs = store::list_transactions(&conn, &TxFilter::default()).unwrap();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0].name, "Padaria Pão Quente");
    assert_eq!(txs[0].amount, dec!(1234.56));
    assert_eq!(txs[0].kind, TxType::Saida);
    assert_eq!(txs[0].account, "Nubank");
    assert!(txs[0].imported);
    assert!(txs[0].file_source.is_some());
    assert_eq!(txs[1].kind, TxType::Entrada);
    assert_eq!(txs[1].amount, dec!(500));
}

#[test]
fn reimporting_the_same_statement_skips_duplicates() {
    let mut conn = setup();
    let file = statement(BR_CSV);
    let path = file.path().to_str().unwrap().to_string();
    import(&mut conn, &path, &[]).unwrap();
    import(&mut conn, &path, &[]).unwrap();
    assert_eq!(count(&conn), 2);
}

#[test]
fn dry_run_writes_nothing() {
    let mut conn = setup();
    let file = statement(BR_CSV);
    import(&mut conn, file.path().to_str().unwrap(), &["--dry-run"]).unwrap();
    assert_eq!(count(&conn), 0);
}

#[test]
fn one_malformed_row_rejects_the_whole_file() {
    let mut conn = setup();
    let file = statement(
        "date,description,amount\n2026-01-10,Mercado,-20.00\n2026-01-11,Farmácia,abc\n",
    );
    let err = import(&mut conn, file.path().to_str().unwrap(), &[]).unwrap_err();
    assert!(format!("{:#}", err).contains("abc"));
    assert_eq!(count(&conn), 0);
}

#[test]
fn empty_statement_is_an_error() {
    let mut conn = setup();
    let file = statement("Data;Descrição;Valor\n");
    assert!(import(&mut conn, file.path().to_str().unwrap(), &[]).is_err());
    assert_eq!(count(&conn), 0);
}

#[test]
fn imported_rows_are_categorized_by_rules() {
    let mut conn = setup();
    store::insert_rule(&conn, "Padaria", "padaria", "Alimentação", 0).unwrap();
    let file = statement(BR_CSV);
    import(&mut conn, file.path().to_str().unwrap(), &[]).unwrap();

    let txs = store::list_transactions(&conn, &TxFilter::default()).unwrap();
    assert_eq!(txs[0].category.as_deref(), Some("Alimentação"));
    assert!(txs[1].category.is_none());
}

#[test]
fn no_rules_flag_leaves_rows_uncategorized() {
    let mut conn = setup();
    store::insert_rule(&conn, "Padaria", "padaria", "Alimentação", 0).unwrap();
    let file = statement(BR_CSV);
    import(&mut conn, file.path().to_str().unwrap(), &["--no-rules"]).unwrap();

    let txs = store::list_transactions(&conn, &TxFilter::default()).unwrap();
    assert!(txs.iter().all(|t| t.category.is_none()));
}

#[test]
fn ofx_statement_is_detected() {
    let mut conn = setup();
    let file = statement(
        "OFXHEADER:100\n<OFX><BANKMSGSRSV1><STMTTRNRS><STMTRS><BANKTRANLIST>\n\
         <STMTTRN><TRNTYPE>DEBIT<DTPOSTED>20260115120000<TRNAMT>-89.90<MEMO>Internet</STMTTRN>\n\
         <STMTTRN><TRNTYPE>CREDIT<DTPOSTED>20260120<TRNAMT>3000.00<NAME>Salario</STMTTRN>\n\
         </BANKTRANLIST></STMTRS></STMTTRNRS></BANKMSGSRSV1></OFX>\n",
    );
    import(&mut conn, file.path().to_str().unwrap(), &[]).unwrap();

    let txs = store::list_transactions(&conn, &TxFilter::default()).unwrap();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0].name, "Internet");
    assert_eq!(txs[0].amount, dec!(89.90));
    assert_eq!(txs[0].kind, TxType::Saida);
    assert_eq!(txs[1].name, "Salario");
    assert_eq!(txs[1].kind, TxType::Entrada);
}

#[test]
fn same_amount_in_another_account_is_not_a_duplicate() {
    let mut conn = setup();
    let file = statement(BR_CSV);
    let path = file.path().to_str().unwrap().to_string();
    import(&mut conn, &path, &[]).unwrap();

    let matches = cli::build_cli().get_matches_from([
        "opsbook",
        "import",
        "transactions",
        "--path",
        &path,
        "--account",
        "Itaú",
    ]);
    let Some(("import", import_m)) = matches.subcommand() else {
        panic!("no import subcommand");
    };
    importer::handle(&mut conn, import_m).unwrap();
    assert_eq!(count(&conn), 4);
}
