//! Invoice breakdown types for billing-engine.
//!
//! [`InvoiceBreakdown`] is what the route layer and the PDF renderer
//! consume. Every amount is an exact [`Decimal`]; [`InvoiceBreakdown::rounded`]
//! produces the two-decimal presentation view and nothing else rounds.

use crate::models::charge_rule::TaxJurisdiction;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a client is being billed for on one invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingMode {
    Service,
    Reimbursement,
    ServiceAndReimbursement,
}

impl BillingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingMode::Service => "service",
            BillingMode::Reimbursement => "reimbursement",
            BillingMode::ServiceAndReimbursement => "service_reimbursement",
        }
    }
}

impl std::str::FromStr for BillingMode {
    type Err = String;

    /// Accepts both the storage tokens and the operator-facing labels.
    /// Unknown tokens are rejected rather than defaulted; defaulting a
    /// billing mode would silently mis-bill.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "service" | "Service" => Ok(BillingMode::Service),
            "reimbursement" | "Reimbursement" => Ok(BillingMode::Reimbursement),
            "service_reimbursement" | "Service & Reimbursement" => {
                Ok(BillingMode::ServiceAndReimbursement)
            }
            other => Err(format!("Invalid billing mode: {}", other)),
        }
    }
}

/// One pass-through cost slot, billed without markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReimbursementLine {
    /// 1-based slot position on the charge rule; cross-job summation aligns
    /// on this, not on the description text.
    pub slot: u8,
    pub description: String,
    pub amount: Decimal,
}

/// Charge Calculation Engine output for a single job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCharges {
    pub job_id: Uuid,
    pub service_fee: Decimal,
    pub certificate_a_count: i64,
    pub certificate_b_count: i64,
    pub certificate_a_fee: Decimal,
    pub certificate_b_fee: Decimal,
    pub registration_charge: Decimal,
    pub application_fee: Decimal,
    pub reimbursements: Vec<ReimbursementLine>,
}

impl JobCharges {
    /// All derived amounts zero; what a job without a charge rule yields.
    pub fn zero(job_id: Uuid) -> Self {
        Self {
            job_id,
            service_fee: Decimal::ZERO,
            certificate_a_count: 0,
            certificate_b_count: 0,
            certificate_a_fee: Decimal::ZERO,
            certificate_b_fee: Decimal::ZERO,
            registration_charge: Decimal::ZERO,
            application_fee: Decimal::ZERO,
            reimbursements: Vec::new(),
        }
    }

    pub fn reimbursement_total(&self) -> Decimal {
        self.reimbursements.iter().map(|line| line.amount).sum()
    }
}

/// Tax amounts and the rates they were derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub jurisdiction: TaxJurisdiction,
    pub central_rate: Decimal,
    pub state_rate: Decimal,
    pub interstate_rate: Decimal,
    pub central_amount: Decimal,
    pub state_amount: Decimal,
    pub interstate_amount: Decimal,
}

impl TaxBreakdown {
    pub fn total(&self) -> Decimal {
        self.central_amount + self.state_amount + self.interstate_amount
    }
}

/// Aggregated monetary breakdown across all jobs on one invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceBreakdown {
    pub billing_mode: BillingMode,
    pub jobs: Vec<JobCharges>,
    pub base_amount: Decimal,
    pub certificate_a_total: Decimal,
    pub certificate_b_total: Decimal,
    pub registration_total: Decimal,
    pub application_fee_total: Decimal,
    /// Slot-aligned sums across jobs; the first-seen description labels each
    /// slot.
    pub reimbursement_lines: Vec<ReimbursementLine>,
    pub reward: Decimal,
    pub discount: Decimal,
    pub service_subtotal: Decimal,
    pub reimbursement_subtotal: Decimal,
    pub tax: TaxBreakdown,
    pub total_amount: Decimal,
    pub payable_amount: Decimal,
}

fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

impl InvoiceBreakdown {
    /// Two-decimal presentation view. Rates are left untouched.
    pub fn rounded(&self) -> InvoiceBreakdown {
        let mut out = self.clone();
        for job in &mut out.jobs {
            job.service_fee = round2(job.service_fee);
            job.certificate_a_fee = round2(job.certificate_a_fee);
            job.certificate_b_fee = round2(job.certificate_b_fee);
            job.registration_charge = round2(job.registration_charge);
            job.application_fee = round2(job.application_fee);
            for line in &mut job.reimbursements {
                line.amount = round2(line.amount);
            }
        }
        for line in &mut out.reimbursement_lines {
            line.amount = round2(line.amount);
        }
        out.base_amount = round2(out.base_amount);
        out.certificate_a_total = round2(out.certificate_a_total);
        out.certificate_b_total = round2(out.certificate_b_total);
        out.registration_total = round2(out.registration_total);
        out.application_fee_total = round2(out.application_fee_total);
        out.reward = round2(out.reward);
        out.discount = round2(out.discount);
        out.service_subtotal = round2(out.service_subtotal);
        out.reimbursement_subtotal = round2(out.reimbursement_subtotal);
        out.tax.central_amount = round2(out.tax.central_amount);
        out.tax.state_amount = round2(out.tax.state_amount);
        out.tax.interstate_amount = round2(out.tax.interstate_amount);
        out.total_amount = round2(out.total_amount);
        out.payable_amount = round2(out.payable_amount);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn billing_mode_parses_operator_labels() {
        assert_eq!(BillingMode::from_str("Service"), Ok(BillingMode::Service));
        assert_eq!(
            BillingMode::from_str("Service & Reimbursement"),
            Ok(BillingMode::ServiceAndReimbursement)
        );
        assert_eq!(
            BillingMode::from_str("reimbursement"),
            Ok(BillingMode::Reimbursement)
        );
    }

    #[test]
    fn billing_mode_rejects_unknown_tokens() {
        assert!(BillingMode::from_str("both").is_err());
        assert!(BillingMode::from_str("").is_err());
    }
}
