// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::anyhow;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Direction of a transaction. Amounts are always stored unsigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxType {
    #[serde(rename = "Entrada")]
    Entrada,
    #[serde(rename = "Saída", alias = "Saida")]
    Saida,
}

impl TxType {
    /// Direction implied by a signed statement amount.
    pub fn from_signed(amount: Decimal) -> Self {
        if amount.is_sign_negative() && !amount.is_zero() {
            TxType::Saida
        } else {
            TxType::Entrada
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Entrada => "Entrada",
            TxType::Saida => "Saída",
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "entrada" | "in" | "income" => Ok(TxType::Entrada),
            "saída" | "saida" | "out" | "expense" => Ok(TxType::Saida),
            other => Err(anyhow!("Invalid transaction type '{}', expected Entrada|Saída", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub name: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub kind: TxType,
    pub account: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub reconciled: bool,
    pub imported: bool,
    pub file_source: Option<String>,
}

impl Transaction {
    pub fn is_uncategorized(&self) -> bool {
        self.category.as_deref().is_none_or(|c| c.trim().is_empty())
    }

    /// Amount with the direction applied (Saída is negative).
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            TxType::Entrada => self.amount,
            TxType::Saida => -self.amount,
        }
    }
}

/// A transaction that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub name: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub kind: TxType,
    pub account: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub imported: bool,
    pub file_source: Option<String>,
}

impl NewTransaction {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.name.trim().is_empty() {
            return Err(EngineError::MissingField("name"));
        }
        if self.account.trim().is_empty() {
            return Err(EngineError::MissingField("account"));
        }
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(EngineError::NegativeAmount {
                field: "amount",
                value: self.amount,
            });
        }
        Ok(())
    }
}

/// Only the fields that are `Some` are written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionPatch {
    pub name: Option<String>,
    pub date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub kind: Option<TxType>,
    pub account: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub reconciled: Option<bool>,
}

impl TransactionPatch {
    pub fn is_empty(&self) -> bool {
        *self == TransactionPatch::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetGoal {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub month: u32,
    pub year: i32,
    pub budget_amount: Decimal,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub notes: Option<String>,
}

impl BudgetGoal {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.category.trim().is_empty() {
            return Err(EngineError::MissingField("category"));
        }
        if !(1..=12).contains(&self.month) {
            return Err(EngineError::InvalidMonth(self.month));
        }
        if self.budget_amount.is_sign_negative() && !self.budget_amount.is_zero() {
            return Err(EngineError::NegativeAmount {
                field: "budget_amount",
                value: self.budget_amount,
            });
        }
        if self.period_start >= self.period_end {
            return Err(EngineError::InvalidPeriod {
                start: self.period_start.to_string(),
                end: self.period_end.to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizationRule {
    pub id: i64,
    pub name: String,
    pub pattern: String,
    pub category: String,
    pub priority: i64,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentKind {
    Percent,
    Fixed,
}

impl FromStr for AdjustmentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "percent" | "%" => Ok(AdjustmentKind::Percent),
            "fixed" => Ok(AdjustmentKind::Fixed),
            other => Err(anyhow!("Invalid adjustment type '{}', expected percent|fixed", other)),
        }
    }
}

/// Discount or tax configuration of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    pub kind: AdjustmentKind,
    pub value: Decimal,
}

impl Adjustment {
    pub fn percent(value: Decimal) -> Self {
        Adjustment {
            kind: AdjustmentKind::Percent,
            value,
        }
    }

    pub fn fixed(value: Decimal) -> Self {
        Adjustment {
            kind: AdjustmentKind::Fixed,
            value,
        }
    }

    pub fn none() -> Self {
        Adjustment::percent(Decimal::ZERO)
    }
}

impl Default for Adjustment {
    fn default() -> Self {
        Adjustment::none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalService {
    pub name: String,
    pub description: Option<String>,
    pub procedures: Option<String>,
    pub materials_included: Option<String>,
    pub quantity: u32,
    pub unit_value: Decimal,
}

impl ProposalService {
    pub fn new(name: impl Into<String>, quantity: u32, unit_value: Decimal) -> Self {
        ProposalService {
            name: name.into(),
            description: None,
            procedures: None,
            materials_included: None,
            quantity,
            unit_value,
        }
    }

    pub fn subtotal(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_value
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.name.trim().is_empty() {
            return Err(EngineError::MissingField("service name"));
        }
        if self.quantity < 1 {
            return Err(EngineError::InvalidQuantity(self.quantity));
        }
        if self.unit_value.is_sign_negative() && !self.unit_value.is_zero() {
            return Err(EngineError::NegativeAmount {
                field: "unit value",
                value: self.unit_value,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[default]
    #[serde(rename = "PIX")]
    Pix,
    #[serde(rename = "Cartão de Crédito")]
    CartaoDeCredito,
    #[serde(rename = "Boleto")]
    Boleto,
    #[serde(rename = "Transferência")]
    Transferencia,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Pix => "PIX",
            PaymentMethod::CartaoDeCredito => "Cartão de Crédito",
            PaymentMethod::Boleto => "Boleto",
            PaymentMethod::Transferencia => "Transferência",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pix" => Ok(PaymentMethod::Pix),
            "cartão de crédito" | "cartao de credito" | "card" | "credit" => {
                Ok(PaymentMethod::CartaoDeCredito)
            }
            "boleto" => Ok(PaymentMethod::Boleto),
            "transferência" | "transferencia" | "transfer" => Ok(PaymentMethod::Transferencia),
            other => Err(anyhow!("Unknown payment method '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalPaymentTerm {
    pub due_date: NaiveDate,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub observation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProposalStatus {
    #[default]
    #[serde(rename = "Em criação")]
    EmCriacao,
    #[serde(rename = "Enviada")]
    Enviada,
    #[serde(rename = "Aprovada")]
    Aprovada,
    #[serde(rename = "Recusada")]
    Recusada,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::EmCriacao => "Em criação",
            ProposalStatus::Enviada => "Enviada",
            ProposalStatus::Aprovada => "Aprovada",
            ProposalStatus::Recusada => "Recusada",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "em criação" | "em criacao" | "draft" => Ok(ProposalStatus::EmCriacao),
            "enviada" | "sent" => Ok(ProposalStatus::Enviada),
            "aprovada" | "approved" => Ok(ProposalStatus::Aprovada),
            "recusada" | "rejected" => Ok(ProposalStatus::Recusada),
            other => Err(anyhow!("Unknown proposal status '{}'", other)),
        }
    }
}

/// Computed money figures of a proposal. Never set by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProposalTotals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

impl ProposalTotals {
    pub fn after_discount(&self) -> Decimal {
        self.subtotal - self.discount_amount
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub name: String,
    pub company: Option<String>,
    pub document: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: i64,
    pub number: Option<String>,
    pub date: NaiveDate,
    pub valid_until: Option<NaiveDate>,
    pub client: Client,
    pub services: Vec<ProposalService>,
    pub discount: Adjustment,
    pub tax: Adjustment,
    pub totals: ProposalTotals,
    pub payment_terms: Vec<ProposalPaymentTerm>,
    pub status: ProposalStatus,
    pub rejection_reason: Option<String>,
    pub observations: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Periodicity {
    Mensal,
    Trimestral,
    Semestral,
    Anual,
}

impl Periodicity {
    pub const ALL: [Periodicity; 4] = [
        Periodicity::Mensal,
        Periodicity::Trimestral,
        Periodicity::Semestral,
        Periodicity::Anual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Periodicity::Mensal => "Mensal",
            Periodicity::Trimestral => "Trimestral",
            Periodicity::Semestral => "Semestral",
            Periodicity::Anual => "Anual",
        }
    }
}

impl fmt::Display for Periodicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Periodicity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mensal" | "monthly" => Ok(Periodicity::Mensal),
            "trimestral" | "quarterly" => Ok(Periodicity::Trimestral),
            "semestral" | "semiannual" => Ok(Periodicity::Semestral),
            "anual" | "annual" | "yearly" => Ok(Periodicity::Anual),
            other => Err(anyhow!(
                "Unknown periodicity '{}', expected Mensal|Trimestral|Semestral|Anual",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kpi {
    pub id: i64,
    pub name: String,
    pub periodicity: Periodicity,
    pub sort_order: i64,
    pub visible_public: bool,
    pub is_financial: bool,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: i64,
    pub kpi_id: i64,
    /// `None` (or `Some(0)`) means the goal covers the whole period.
    pub month: Option<u32>,
    pub year: i32,
    pub actual: Decimal,
    pub target: Decimal,
    pub visible_public: bool,
}

impl Goal {
    pub fn validate(&self) -> Result<(), EngineError> {
        match self.month {
            Some(m) if m > 12 => Err(EngineError::InvalidMonth(m)),
            _ => Ok(()),
        }
    }

    pub fn is_whole_period(&self) -> bool {
        self.month.unwrap_or(0) == 0
    }

    /// Progress towards target in percent; 0 when there is no target.
    pub fn progress_pct(&self) -> Decimal {
        if self.target.is_zero() {
            Decimal::ZERO
        } else {
            (self.actual / self.target * Decimal::ONE_HUNDRED).round_dp(1)
        }
    }
}
