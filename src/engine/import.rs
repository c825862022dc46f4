// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Bank statement parsing (CSV and OFX) and duplicate detection.

use chrono::NaiveDate;
use csv::ReaderBuilder;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use std::str::FromStr;

use crate::error::ImportError;
use crate::models::{NewTransaction, Transaction, TxType};

const DATE_COLUMNS: &[&str] = &["data", "date", "dt"];
const DESCRIPTION_COLUMNS: &[&str] = &[
    "desc",
    "historico",
    "histórico",
    "descrição",
    "descricao",
    "memo",
];
const VALUE_COLUMNS: &[&str] = &["valor", "value", "amount", "vlr"];

static OFX_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<STMTTRN>(.*?)</STMTTRN>").expect("static regex"));
static OFX_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<DTPOSTED>\s*(\d{8})").expect("static regex"));
static OFX_MEMO: Lazy<Regex> = Lazy::new(|| Regex::new(r"<MEMO>([^<]+)").expect("static regex"));
static OFX_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"<NAME>([^<]+)").expect("static regex"));
static OFX_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<TRNAMT>([^<]+)").expect("static regex"));

/// One movement read from a statement file, before any account is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementLine {
    pub date: NaiveDate,
    pub description: String,
    /// Magnitude; the sign lives in `kind`.
    pub amount: Decimal,
    pub kind: TxType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedRow {
    pub index: usize,
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub kind: TxType,
    pub account: String,
    pub is_duplicate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportPreview {
    pub account: String,
    pub transactions: Vec<ParsedRow>,
    pub total: usize,
    /// Net signed amount of the rows that would be imported.
    pub total_amount: Decimal,
    pub duplicates: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub imported: usize,
    pub duplicates: usize,
    pub transactions: Vec<NewTransaction>,
}

pub fn is_ofx(contents: &str) -> bool {
    contents.contains("<OFX>") || contents.contains("<?OFX") || contents.contains("<STMTTRN>")
}

/// Parses a whole statement. Any bad row fails the file.
pub fn parse_statement(contents: &str) -> Result<Vec<StatementLine>, ImportError> {
    let lines = if is_ofx(contents) {
        parse_ofx(contents)?
    } else {
        parse_csv(contents)?
    };
    if lines.is_empty() {
        return Err(ImportError::Empty);
    }
    Ok(lines)
}

pub fn parse_csv(contents: &str) -> Result<Vec<StatementLine>, ImportError> {
    let header_line = contents
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or(ImportError::Empty)?;
    let delimiter = if header_line.contains(';') && !header_line.contains(',') {
        b';'
    } else {
        b','
    };

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(contents.as_bytes());

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().trim_matches('"').to_lowercase())
        .collect();
    let date_idx = find_column(&headers, DATE_COLUMNS).ok_or(ImportError::MissingColumns)?;
    let desc_idx = find_column(&headers, DESCRIPTION_COLUMNS).ok_or(ImportError::MissingColumns)?;
    let value_idx = find_column(&headers, VALUE_COLUMNS).ok_or(ImportError::MissingColumns)?;

    let mut out = Vec::new();
    for result in rdr.records() {
        let rec = result?;
        if rec.iter().all(|f| f.is_empty()) {
            continue;
        }
        let line = rec.position().map(|p| p.line() as usize).unwrap_or(0);
        let date_raw = required_field(&rec, date_idx, "date", line)?;
        let description = required_field(&rec, desc_idx, "description", line)?.to_string();
        let value_raw = required_field(&rec, value_idx, "value", line)?;

        let date = parse_statement_date(date_raw).ok_or_else(|| ImportError::MalformedRow {
            line,
            reason: format!("invalid date '{}'", date_raw),
        })?;
        let signed = parse_statement_amount(value_raw).ok_or_else(|| ImportError::MalformedRow {
            line,
            reason: format!("invalid amount '{}'", value_raw),
        })?;
        out.push(StatementLine {
            date,
            description,
            amount: signed.abs(),
            kind: TxType::from_signed(signed),
        });
    }
    Ok(out)
}

pub fn parse_ofx(contents: &str) -> Result<Vec<StatementLine>, ImportError> {
    let mut out = Vec::new();
    for (i, cap) in OFX_BLOCK.captures_iter(contents).enumerate() {
        let block = &cap[1];
        let malformed = |reason: String| ImportError::MalformedRow {
            line: i + 1,
            reason,
        };

        let date = OFX_DATE
            .captures(block)
            .and_then(|c| NaiveDate::parse_from_str(&c[1], "%Y%m%d").ok())
            .ok_or_else(|| malformed("missing or invalid DTPOSTED".into()))?;
        let description = OFX_MEMO
            .captures(block)
            .or_else(|| OFX_NAME.captures(block))
            .map(|c| c[1].trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| malformed("missing MEMO/NAME".into()))?;
        let amount_raw = OFX_AMOUNT
            .captures(block)
            .map(|c| c[1].trim().to_string())
            .ok_or_else(|| malformed("missing TRNAMT".into()))?;
        let signed = parse_statement_amount(&amount_raw)
            .ok_or_else(|| malformed(format!("invalid TRNAMT '{}'", amount_raw)))?;

        out.push(StatementLine {
            date,
            description,
            amount: signed.abs(),
            kind: TxType::from_signed(signed),
        });
    }
    Ok(out)
}

/// Accepts `DD/MM/YYYY`, `YYYY-MM-DD` and `DD-MM-YYYY`, ignoring any time suffix.
pub fn parse_statement_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim().trim_matches('"');
    let head = raw.get(..10).unwrap_or(raw);
    ["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(head, fmt).ok())
}

/// Signed amount from a statement cell. A comma marks the Brazilian layout
/// (`-1.234,56`); otherwise the dot is the decimal point.
pub fn parse_statement_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .trim()
        .trim_matches('"')
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned
    };
    let normalized = normalized.strip_prefix('+').unwrap_or(&normalized);
    Decimal::from_str(normalized).ok()
}

fn required_field<'r>(
    rec: &'r csv::StringRecord,
    idx: usize,
    name: &str,
    line: usize,
) -> Result<&'r str, ImportError> {
    rec.get(idx)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ImportError::MalformedRow {
            line,
            reason: format!("{} missing", name),
        })
}

fn find_column(headers: &[String], keys: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| keys.iter().any(|k| h.contains(k)))
}

type DuplicateKey = (NaiveDate, Decimal, String);

fn duplicate_key(date: NaiveDate, amount: Decimal, account: &str) -> DuplicateKey {
    (date, amount.normalize(), account.to_string())
}

/// Parses `contents` for `account` and flags rows already present in
/// `existing` or earlier in the same file, matching on (date, amount, account).
pub fn preview_import(
    contents: &str,
    account: &str,
    existing: &[Transaction],
) -> Result<ImportPreview, ImportError> {
    let account = account.trim();
    if account.is_empty() {
        return Err(ImportError::MissingAccount);
    }
    let lines = parse_statement(contents)?;

    let mut seen: HashSet<DuplicateKey> = existing
        .iter()
        .map(|t| duplicate_key(t.date, t.amount, &t.account))
        .collect();

    let mut rows = Vec::with_capacity(lines.len());
    let mut duplicates = 0;
    let mut total_amount = Decimal::ZERO;
    for (index, line) in lines.into_iter().enumerate() {
        let is_duplicate = !seen.insert(duplicate_key(line.date, line.amount, account));
        if is_duplicate {
            duplicates += 1;
        } else {
            total_amount += match line.kind {
                TxType::Entrada => line.amount,
                TxType::Saida => -line.amount,
            };
        }
        rows.push(ParsedRow {
            index,
            date: line.date,
            description: line.description,
            amount: line.amount,
            kind: line.kind,
            account: account.to_string(),
            is_duplicate,
        });
    }

    Ok(ImportPreview {
        account: account.to_string(),
        total: rows.len(),
        transactions: rows,
        total_amount,
        duplicates,
    })
}

/// Turns the non-duplicate rows of a preview into records ready to persist.
pub fn commit_import(preview: &ImportPreview, file_source: Option<&str>) -> ImportOutcome {
    let transactions: Vec<NewTransaction> = preview
        .transactions
        .iter()
        .filter(|r| !r.is_duplicate)
        .map(|r| NewTransaction {
            name: r.description.clone(),
            date: r.date,
            amount: r.amount,
            kind: r.kind,
            account: r.account.clone(),
            category: None,
            description: Some(r.description.clone()),
            imported: true,
            file_source: file_source.map(str::to_string),
        })
        .collect();
    ImportOutcome {
        imported: transactions.len(),
        duplicates: preview.duplicates,
        transactions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn detects_brazilian_csv_layout() {
        let csv = "Data;Descrição;Valor\n10/01/2026;Padaria;-1.234,56\n11/01/2026;Pix recebido;500,00\n";
        let lines = parse_statement(csv).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].date, NaiveDate::from_ymd_opt(2026, 1, 10).unwrap());
        assert_eq!(lines[0].amount, dec!(1234.56));
        assert_eq!(lines[0].kind, TxType::Saida);
        assert_eq!(lines[1].kind, TxType::Entrada);
    }

    #[test]
    fn reads_quoted_fields_and_dot_decimals() {
        let csv = "date,description,amount\n2026-01-10,\"Coffee, beans\",-12.50\n";
        let lines = parse_statement(csv).unwrap();
        assert_eq!(lines[0].description, "Coffee, beans");
        assert_eq!(lines[0].amount, dec!(12.50));
    }

    #[test]
    fn missing_columns_is_an_error() {
        let csv = "foo,bar\n1,2\n";
        assert_eq!(parse_statement(csv).unwrap_err(), ImportError::MissingColumns);
    }

    #[test]
    fn one_bad_row_fails_the_file() {
        let csv = "date,description,amount\n2026-01-10,Ok,-1.00\n2026-13-40,Bad,-2.00\n";
        assert!(matches!(
            parse_statement(csv).unwrap_err(),
            ImportError::MalformedRow { .. }
        ));
    }

    #[test]
    fn parses_ofx_blocks() {
        let ofx = "<OFX><BANKTRANLIST>\
            <STMTTRN><TRNTYPE>DEBIT<DTPOSTED>20260110120000[-3:BRT]<TRNAMT>-45.90<MEMO>Mercado</STMTTRN>\
            <STMTTRN><TRNTYPE>CREDIT<DTPOSTED>20260111<TRNAMT>100.00<NAME>Cliente X</STMTTRN>\
            </BANKTRANLIST></OFX>";
        let lines = parse_statement(ofx).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].description, "Mercado");
        assert_eq!(lines[0].amount, dec!(45.90));
        assert_eq!(lines[1].description, "Cliente X");
        assert_eq!(lines[1].kind, TxType::Entrada);
    }

    #[test]
    fn empty_file_is_rejected() {
        assert_eq!(parse_statement("").unwrap_err(), ImportError::Empty);
        assert_eq!(
            parse_statement("date,description,amount\n").unwrap_err(),
            ImportError::Empty
        );
    }

    #[test]
    fn repeated_row_in_one_file_is_a_duplicate() {
        let csv = "date,description,amount\n\
            2026-01-10,Mercado,-45.90\n\
            2026-01-10,Mercado de novo,-45.90\n\
            2026-01-10,Outro valor,-45.91\n";
        let preview = preview_import(csv, "Nubank", &[]).unwrap();
        let flags: Vec<bool> = preview.transactions.iter().map(|r| r.is_duplicate).collect();
        assert_eq!(flags, vec![false, true, false]);
        assert_eq!(preview.duplicates, 1);
        assert_eq!(preview.total_amount, dec!(-91.81));
        assert_eq!(commit_import(&preview, None).imported, 2);
    }

    #[test]
    fn amount_layouts() {
        assert_eq!(parse_statement_amount("R$ -1.234,56"), Some(dec!(-1234.56)));
        assert_eq!(parse_statement_amount("+10.5"), Some(dec!(10.5)));
        assert_eq!(parse_statement_amount("abc"), None);
    }
}
