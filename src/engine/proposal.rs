// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Quote totals, installment schedules and the printable proposal layout.

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::engine::currency::{apply_adjustment, format_currency_brl, round_cents};
use crate::error::EngineError;
use crate::models::{
    Adjustment, AdjustmentKind, PaymentMethod, Proposal, ProposalPaymentTerm, ProposalService,
    ProposalStatus, ProposalTotals,
};

/// Subtotal, discount, tax and total for a list of services.
///
/// A fixed discount larger than the subtotal yields a negative amount after
/// discount; it is not clamped.
pub fn compute_totals(
    services: &[ProposalService],
    discount: &Adjustment,
    tax: &Adjustment,
) -> ProposalTotals {
    let subtotal: Decimal = services.iter().map(ProposalService::subtotal).sum();
    let discount_amount = apply_adjustment(subtotal, discount);
    let after_discount = subtotal - discount_amount;
    let tax_amount = apply_adjustment(after_discount, tax);
    ProposalTotals {
        subtotal,
        discount_amount,
        tax_amount,
        total: after_discount + tax_amount,
    }
}

/// Splits `total` (rounded to cents) into `count` monthly installments.
///
/// Every installment but the last is `round(total / count, 2)`; the last one
/// takes whatever is left so the schedule adds up to the cent. The first is
/// due on `first_due`, the i-th `i` calendar months later (clamped to the end
/// of shorter months).
pub fn calculate_installments(
    total: Decimal,
    count: i64,
    first_due: NaiveDate,
    method: PaymentMethod,
) -> Result<Vec<ProposalPaymentTerm>, EngineError> {
    if count <= 0 {
        return Err(EngineError::InvalidInstallmentCount(count));
    }
    let total = round_cents(total);
    if total <= Decimal::ZERO {
        return Err(EngineError::NonPositiveTotal(total));
    }
    let n = u32::try_from(count).map_err(|_| EngineError::InvalidInstallmentCount(count))?;

    let per_installment = round_cents(total / Decimal::from(n));
    let last = total - per_installment * Decimal::from(n - 1);
    if per_installment <= Decimal::ZERO || last <= Decimal::ZERO {
        return Err(EngineError::DegenerateInstallments { total, count: n });
    }

    (0..n)
        .map(|i| {
            let due_date = first_due
                .checked_add_months(Months::new(i))
                .ok_or(EngineError::InvalidInstallmentCount(count))?;
            Ok(ProposalPaymentTerm {
                due_date,
                amount: if i == n - 1 { last } else { per_installment },
                payment_method: method,
                observation: None,
            })
        })
        .collect()
}

/// Number given to a proposal created without one: the year and the last six
/// digits of a millisecond clock, e.g. `2026-431907`.
pub fn proposal_number(year: i32, clock_millis: i64) -> String {
    format!("{}-{:06}", year, clock_millis.rem_euclid(1_000_000))
}

/// Sum of a payment schedule.
pub fn terms_total(terms: &[ProposalPaymentTerm]) -> Decimal {
    terms.iter().map(|t| t.amount).sum()
}

impl Proposal {
    /// Recomputes every derived figure from services, discount and tax.
    pub fn recompute(&mut self) {
        self.totals = compute_totals(&self.services, &self.discount, &self.tax);
    }

    /// Moves the proposal to `status`. Refusing requires a reason; any other
    /// status clears a stale one.
    pub fn set_status(
        &mut self,
        status: ProposalStatus,
        reason: Option<String>,
    ) -> Result<(), EngineError> {
        let reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        if status == ProposalStatus::Recusada {
            let Some(reason) = reason else {
                return Err(EngineError::MissingRejectionReason);
            };
            self.rejection_reason = Some(reason);
        } else {
            self.rejection_reason = None;
        }
        self.status = status;
        Ok(())
    }

    /// Hard validation before a proposal is stored.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.client.name.trim().is_empty() {
            return Err(EngineError::MissingField("client name"));
        }
        for s in &self.services {
            s.validate()?;
        }
        for (field, adj) in [("discount", &self.discount), ("tax", &self.tax)] {
            if adj.value.is_sign_negative() && !adj.value.is_zero() {
                return Err(EngineError::NegativeAmount {
                    field,
                    value: adj.value,
                });
            }
        }
        if self.status == ProposalStatus::Recusada
            && self
                .rejection_reason
                .as_deref()
                .is_none_or(|r| r.trim().is_empty())
        {
            return Err(EngineError::MissingRejectionReason);
        }
        Ok(())
    }

    /// Soft checks worth showing to the user; none of them block a save.
    pub fn issues(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.services.is_empty() {
            out.push("proposal has no services".to_string());
        }
        if self.totals.after_discount().is_sign_negative() && !self.totals.after_discount().is_zero()
        {
            out.push(format!(
                "discount exceeds subtotal (after discount {})",
                format_currency_brl(self.totals.after_discount())
            ));
        }
        if !self.payment_terms.is_empty() {
            let scheduled = terms_total(&self.payment_terms);
            if round_cents(scheduled) != round_cents(self.totals.total) {
                out.push(format!(
                    "payment terms add up to {} but total is {}",
                    format_currency_brl(scheduled),
                    format_currency_brl(self.totals.total)
                ));
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentLine {
    pub name: String,
    pub detail: Option<String>,
    pub quantity: u32,
    pub unit_value: String,
    pub subtotal: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInstallment {
    pub number: usize,
    pub due_date: String,
    pub amount: String,
    pub payment_method: String,
    pub observation: Option<String>,
}

/// A proposal with every figure already computed and formatted; rendering it
/// involves no arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalDocument {
    pub title: String,
    pub date: String,
    pub valid_until: Option<String>,
    pub status: String,
    pub client: Vec<String>,
    pub lines: Vec<DocumentLine>,
    pub subtotal: String,
    pub discount: Option<String>,
    pub tax: Option<String>,
    pub total: String,
    pub installments: Vec<DocumentInstallment>,
    pub observations: Option<String>,
}

fn adjustment_label(label: &str, adj: &Adjustment, amount: Decimal) -> Option<String> {
    if amount.is_zero() {
        return None;
    }
    Some(match adj.kind {
        AdjustmentKind::Percent => format!(
            "{} ({}%): {}",
            label,
            adj.value.normalize(),
            format_currency_brl(amount)
        ),
        AdjustmentKind::Fixed => format!("{}: {}", label, format_currency_brl(amount)),
    })
}

impl ProposalDocument {
    pub fn from_proposal(p: &Proposal) -> Self {
        let title = match &p.number {
            Some(n) => format!("Proposta Comercial Nº {}", n),
            None => format!("Proposta Comercial #{}", p.id),
        };
        let mut client = vec![p.client.name.clone()];
        client.extend(
            [
                &p.client.company,
                &p.client.document,
                &p.client.email,
                &p.client.phone,
                &p.client.city,
            ]
            .into_iter()
            .flatten()
            .cloned(),
        );
        let lines = p
            .services
            .iter()
            .map(|s| DocumentLine {
                name: s.name.clone(),
                detail: s.description.clone(),
                quantity: s.quantity,
                unit_value: format_currency_brl(s.unit_value),
                subtotal: format_currency_brl(s.subtotal()),
            })
            .collect();
        let installments = p
            .payment_terms
            .iter()
            .enumerate()
            .map(|(i, t)| DocumentInstallment {
                number: i + 1,
                due_date: t.due_date.format("%d/%m/%Y").to_string(),
                amount: format_currency_brl(t.amount),
                payment_method: t.payment_method.to_string(),
                observation: t.observation.clone(),
            })
            .collect();
        ProposalDocument {
            title,
            date: p.date.format("%d/%m/%Y").to_string(),
            valid_until: p.valid_until.map(|d| d.format("%d/%m/%Y").to_string()),
            status: p.status.to_string(),
            client,
            lines,
            subtotal: format_currency_brl(p.totals.subtotal),
            discount: adjustment_label("Desconto", &p.discount, p.totals.discount_amount),
            tax: adjustment_label("Impostos", &p.tax, p.totals.tax_amount),
            total: format_currency_brl(p.totals.total),
            installments,
            observations: p.observations.clone(),
        }
    }

    /// Plain-text printable rendering.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.title);
        out.push('\n');
        out.push_str(&format!("Data: {}", self.date));
        if let Some(v) = &self.valid_until {
            out.push_str(&format!("  |  Válida até: {}", v));
        }
        out.push_str(&format!("  |  Status: {}\n\n", self.status));

        out.push_str("Cliente\n");
        for c in &self.client {
            out.push_str(&format!("  {}\n", c));
        }

        out.push_str("\nServiços\n");
        for (i, l) in self.lines.iter().enumerate() {
            out.push_str(&format!("  {}. {}\n", i + 1, l.name));
            if let Some(d) = &l.detail {
                out.push_str(&format!("     {}\n", d));
            }
            out.push_str(&format!(
                "     Quantidade: {} | Valor Unitário: {} | Subtotal: {}\n",
                l.quantity, l.unit_value, l.subtotal
            ));
        }

        out.push_str(&format!("\nSubtotal: {}\n", self.subtotal));
        if let Some(d) = &self.discount {
            out.push_str(&format!("{}\n", d));
        }
        if let Some(t) = &self.tax {
            out.push_str(&format!("{}\n", t));
        }
        out.push_str(&format!("TOTAL: {}\n", self.total));

        if !self.installments.is_empty() {
            out.push_str("\nCondições de Pagamento\n");
            for inst in &self.installments {
                out.push_str(&format!(
                    "  {}ª parcela - {} - {} ({})\n",
                    inst.number, inst.due_date, inst.amount, inst.payment_method
                ));
                if let Some(o) = &inst.observation {
                    out.push_str(&format!("     {}\n", o));
                }
            }
        }
        if let Some(o) = &self.observations {
            out.push_str(&format!("\nObservações\n  {}\n", o));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Client;
    use rust_decimal_macros::dec;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn proposal() -> Proposal {
        let mut p = Proposal {
            id: 7,
            number: Some("2026-001".into()),
            date: day(2026, 1, 15),
            valid_until: None,
            client: Client {
                name: "Padaria Central".into(),
                company: None,
                document: None,
                email: None,
                phone: None,
                city: None,
            },
            services: vec![ProposalService::new("Diagnóstico", 1, dec!(1000))],
            discount: Adjustment::fixed(dec!(100)),
            tax: Adjustment::none(),
            totals: ProposalTotals::default(),
            payment_terms: vec![],
            status: ProposalStatus::EmCriacao,
            rejection_reason: None,
            observations: None,
        };
        p.recompute();
        p
    }

    #[test]
    fn fixed_discount_above_subtotal_stays_negative() {
        let services = vec![ProposalService::new("Visita", 1, dec!(100))];
        let totals = compute_totals(
            &services,
            &Adjustment::fixed(dec!(150)),
            &Adjustment::percent(dec!(10)),
        );
        assert_eq!(totals.discount_amount, dec!(150));
        assert_eq!(totals.after_discount(), dec!(-50));
        assert_eq!(totals.tax_amount, dec!(-5));
        assert_eq!(totals.total, dec!(-55));
    }

    #[test]
    fn generated_numbers_keep_six_clock_digits() {
        assert_eq!(proposal_number(2026, 1_767_225_431_907), "2026-431907");
        assert_eq!(proposal_number(2026, 1_767_225_000_042), "2026-000042");
    }

    #[test]
    fn month_end_due_dates_clamp() {
        let terms =
            calculate_installments(dec!(300), 3, day(2026, 1, 31), PaymentMethod::Pix).unwrap();
        let dates: Vec<NaiveDate> = terms.iter().map(|t| t.due_date).collect();
        assert_eq!(dates, vec![day(2026, 1, 31), day(2026, 2, 28), day(2026, 3, 31)]);
    }

    #[test]
    fn rejects_bad_counts_and_totals() {
        let today = day(2026, 1, 1);
        assert_eq!(
            calculate_installments(dec!(100), 0, today, PaymentMethod::Pix).unwrap_err(),
            EngineError::InvalidInstallmentCount(0)
        );
        assert!(matches!(
            calculate_installments(dec!(-5), 2, today, PaymentMethod::Pix).unwrap_err(),
            EngineError::NonPositiveTotal(_)
        ));
        assert!(matches!(
            calculate_installments(dec!(1.00), 60, today, PaymentMethod::Pix).unwrap_err(),
            EngineError::DegenerateInstallments { .. }
        ));
    }

    #[test]
    fn refusing_requires_a_reason() {
        let mut p = proposal();
        assert_eq!(
            p.set_status(ProposalStatus::Recusada, Some("  ".into())),
            Err(EngineError::MissingRejectionReason)
        );
        assert_eq!(p.status, ProposalStatus::EmCriacao);
        p.set_status(ProposalStatus::Recusada, Some("Preço".into())).unwrap();
        assert_eq!(p.rejection_reason.as_deref(), Some("Preço"));
        p.set_status(ProposalStatus::Enviada, None).unwrap();
        assert_eq!(p.rejection_reason, None);
    }

    #[test]
    fn issues_flag_schedule_mismatch() {
        let mut p = proposal();
        p.payment_terms =
            calculate_installments(dec!(500), 1, day(2026, 2, 1), PaymentMethod::Boleto).unwrap();
        assert_eq!(p.issues().len(), 1);
        p.payment_terms =
            calculate_installments(p.totals.total, 2, day(2026, 2, 1), PaymentMethod::Boleto)
                .unwrap();
        assert!(p.issues().is_empty());
    }

    #[test]
    fn document_is_preformatted() {
        let doc = ProposalDocument::from_proposal(&proposal());
        assert_eq!(doc.subtotal, "R$ 1.000,00");
        assert_eq!(doc.discount.as_deref(), Some("Desconto: R$ 100,00"));
        assert_eq!(doc.tax, None);
        assert_eq!(doc.total, "R$ 900,00");
        let text = doc.render_text();
        assert!(text.starts_with("Proposta Comercial Nº 2026-001\n"));
        assert!(text.contains("TOTAL: R$ 900,00"));
    }
}
