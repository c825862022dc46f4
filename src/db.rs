// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

static APP: Lazy<(&str, &str, &str)> = Lazy::new(|| ("com.alphavelocity", "Opsbook", "opsbook"));

/// Environment variable that points the CLI at a different database file.
pub const DB_ENV: &str = "OPSBOOK_DB";

pub fn db_path() -> Result<PathBuf> {
    if let Some(p) = std::env::var_os(DB_ENV).filter(|p| !p.is_empty()) {
        let path = PathBuf::from(p);
        if let Some(parent) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        return Ok(path);
    }
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("opsbook.sqlite"))
}

pub fn open_or_init() -> Result<Connection> {
    let path = db_path()?;
    let conn =
        Connection::open(&path).with_context(|| format!("Open DB at {}", path.display()))?;
    init_schema(&conn)?;
    log::debug!("database ready at {}", path.display());
    Ok(conn)
}

/// Creates every table if missing. Safe to run on an existing database.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS categories(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE COLLATE NOCASE
    );

    -- amounts are unsigned Decimal strings; direction lives in type
    CREATE TABLE IF NOT EXISTS transactions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        external_id TEXT UNIQUE,
        name TEXT NOT NULL,
        date TEXT NOT NULL,
        amount TEXT NOT NULL,
        type TEXT NOT NULL CHECK(type IN ('Entrada','Saída')),
        account TEXT NOT NULL,
        category TEXT,
        description TEXT,
        reconciled INTEGER NOT NULL DEFAULT 0,
        imported INTEGER NOT NULL DEFAULT 0,
        file_source TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);

    CREATE TABLE IF NOT EXISTS budget_goals(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        external_id TEXT UNIQUE,
        name TEXT NOT NULL,
        category TEXT NOT NULL,
        month INTEGER NOT NULL CHECK(month BETWEEN 1 AND 12),
        year INTEGER NOT NULL,
        budget_amount TEXT NOT NULL,
        period_start TEXT NOT NULL,
        period_end TEXT NOT NULL,
        notes TEXT,
        UNIQUE(category, month, year)
    );

    CREATE TABLE IF NOT EXISTS categorization_rules(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        external_id TEXT UNIQUE,
        name TEXT NOT NULL,
        pattern TEXT NOT NULL,
        category TEXT NOT NULL,
        priority INTEGER NOT NULL DEFAULT 0,
        active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    -- client, services and payment terms are JSON documents
    CREATE TABLE IF NOT EXISTS proposals(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        external_id TEXT UNIQUE,
        number TEXT,
        date TEXT NOT NULL,
        valid_until TEXT,
        client TEXT NOT NULL,
        services TEXT NOT NULL DEFAULT '[]',
        discount_kind TEXT NOT NULL DEFAULT 'percent',
        discount_value TEXT NOT NULL DEFAULT '0',
        tax_kind TEXT NOT NULL DEFAULT 'percent',
        tax_value TEXT NOT NULL DEFAULT '0',
        subtotal TEXT NOT NULL DEFAULT '0',
        discount_amount TEXT NOT NULL DEFAULT '0',
        tax_amount TEXT NOT NULL DEFAULT '0',
        total TEXT NOT NULL DEFAULT '0',
        payment_terms TEXT NOT NULL DEFAULT '[]',
        status TEXT NOT NULL DEFAULT 'Em criação',
        rejection_reason TEXT,
        observations TEXT,
        CHECK(status != 'Recusada' OR rejection_reason IS NOT NULL)
    );

    CREATE TABLE IF NOT EXISTS kpis(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        external_id TEXT UNIQUE,
        name TEXT NOT NULL,
        periodicity TEXT NOT NULL,
        sort_order INTEGER NOT NULL DEFAULT 0,
        visible_public INTEGER NOT NULL DEFAULT 0,
        is_financial INTEGER NOT NULL DEFAULT 0,
        unit TEXT,
        CHECK(is_financial = 0 OR visible_public = 0)
    );

    CREATE TABLE IF NOT EXISTS goals(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        external_id TEXT UNIQUE,
        kpi_id INTEGER NOT NULL,
        month INTEGER CHECK(month IS NULL OR month BETWEEN 1 AND 12),
        year INTEGER NOT NULL,
        actual TEXT NOT NULL DEFAULT '0',
        target TEXT NOT NULL DEFAULT '0',
        visible_public INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY(kpi_id) REFERENCES kpis(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_goals_kpi ON goals(kpi_id);
    "#,
    )?;
    Ok(())
}
