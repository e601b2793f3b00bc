//! Charge calculation, tax computation, and invoice aggregation.
//!
//! Everything here is pure and synchronous; [`super::invoice::InvoiceService`]
//! does the I/O and hands the data in. Missing charge rules, attributes, or
//! tax rates degrade to zero — billing never fails because an operator left
//! a form field blank.

use crate::models::{
    AttributeMap, BillingMode, ChargeRule, InvoiceBreakdown, JobCharges, ReimbursementLine,
    TaxBreakdown, TaxJurisdiction, TaxRate,
};
use rust_decimal::Decimal;
use service_core::error::AppError;
use service_core::utils::money::parse_money;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Which job attributes feed the calculation. Defaults match the field
/// names the job-category forms ship with; lookups are tolerant to naming
/// variants either way.
#[derive(Debug, Clone)]
pub struct FieldBindings {
    /// Numeric basis for percentage and per-unit pricing.
    pub basis: String,
    /// Certificate of Analysis & Certification count.
    pub certificate_a: String,
    /// Certificate of Origin count.
    pub certificate_b: String,
    /// Government application fee, passed through as billed.
    pub application_fee: String,
}

impl Default for FieldBindings {
    fn default() -> Self {
        Self {
            basis: "FOB Value".to_string(),
            certificate_a: "No of CAC".to_string(),
            certificate_b: "No of COO".to_string(),
            application_fee: "Application Fee".to_string(),
        }
    }
}

/// Per-job data the aggregator feeds through the calculation.
#[derive(Debug, Clone)]
pub struct JobBillingInput {
    pub job_id: Uuid,
    pub rule: Option<ChargeRule>,
    pub attributes: AttributeMap,
}

/// Professional service fee for one rule.
///
/// Precedence is contractual and must not be reordered: percentage-of-basis
/// wins over a configured fixed amount whenever the basis attribute is
/// present, then fixed, then per-unit. The clamp applies to whichever branch
/// produced the fee.
fn service_fee(rule: &ChargeRule, basis: Option<Decimal>) -> Decimal {
    let mut fee = if rule.percentage_rate > Decimal::ZERO && basis.is_some() {
        basis.unwrap_or_default() * rule.percentage_rate / Decimal::ONE_HUNDRED
    } else if rule.fixed_amount > Decimal::ZERO {
        rule.fixed_amount
    } else if rule.per_unit_rate > Decimal::ZERO && basis.is_some() {
        rule.per_unit_rate * basis.unwrap_or_default()
    } else {
        Decimal::ZERO
    };

    if rule.minimum_amount > Decimal::ZERO && fee < rule.minimum_amount {
        fee = rule.minimum_amount;
    }
    if rule.maximum_amount > Decimal::ZERO && fee > rule.maximum_amount {
        fee = rule.maximum_amount;
    }
    fee
}

fn reimbursement_lines(rule: &ChargeRule) -> Vec<ReimbursementLine> {
    rule.reimbursement_slots()
        .into_iter()
        .enumerate()
        .filter_map(|(idx, (description, amount))| {
            let description = description?.trim();
            if description.is_empty() || description.eq_ignore_ascii_case("null") {
                return None;
            }
            Some(ReimbursementLine {
                slot: idx as u8 + 1,
                description: description.to_string(),
                amount: parse_money(amount),
            })
        })
        .collect()
}

/// Compute every monetary component for one job.
pub fn charges_for_job(
    job_id: Uuid,
    rule: Option<&ChargeRule>,
    attrs: &AttributeMap,
    fields: &FieldBindings,
) -> JobCharges {
    let Some(rule) = rule else {
        return JobCharges::zero(job_id);
    };

    let certificate_a_count = attrs.count(&fields.certificate_a);
    let certificate_b_count = attrs.count(&fields.certificate_b);

    JobCharges {
        job_id,
        service_fee: service_fee(rule, attrs.money_opt(&fields.basis)),
        certificate_a_count,
        certificate_b_count,
        certificate_a_fee: Decimal::from(certificate_a_count) * rule.certificate_a_rate,
        certificate_b_fee: Decimal::from(certificate_b_count) * rule.certificate_b_rate,
        registration_charge: rule.registration_charge,
        application_fee: attrs.money(&fields.application_fee),
        reimbursements: reimbursement_lines(rule),
    }
}

/// Split a service subtotal into GST buckets for the given jurisdiction.
///
/// `Unspecified` computes all three buckets. That is how pre-jurisdiction
/// rule rows have always billed and existing documents depend on it, so it
/// is preserved even though it can double-tax (see DESIGN.md).
pub fn compute_tax(
    subtotal: Decimal,
    rate: Option<&TaxRate>,
    jurisdiction: TaxJurisdiction,
) -> TaxBreakdown {
    let central_rate = rate.map_or(Decimal::ZERO, |r| r.central_rate);
    let state_rate = rate.map_or(Decimal::ZERO, |r| r.state_rate);
    let interstate_rate = rate.map_or(Decimal::ZERO, |r| r.interstate_rate);

    let of = |pct: Decimal| subtotal * pct / Decimal::ONE_HUNDRED;

    let (central_amount, state_amount, interstate_amount) = match jurisdiction {
        TaxJurisdiction::StateCentral => (of(central_rate), of(state_rate), Decimal::ZERO),
        TaxJurisdiction::InterState => (Decimal::ZERO, Decimal::ZERO, of(interstate_rate)),
        TaxJurisdiction::Exempt => (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
        TaxJurisdiction::Unspecified => (of(central_rate), of(state_rate), of(interstate_rate)),
    };

    TaxBreakdown {
        jurisdiction,
        central_rate,
        state_rate,
        interstate_rate,
        central_amount,
        state_amount,
        interstate_amount,
    }
}

/// Aggregate per-job charges into one invoice breakdown.
///
/// All rule-bearing jobs must agree on tax jurisdiction; the shared
/// jurisdiction and the supplied rate drive the tax line. Jobs without a
/// rule contribute zero to every bucket but do not block the others.
pub fn aggregate(
    inputs: &[JobBillingInput],
    rate: Option<&TaxRate>,
    billing_mode: BillingMode,
    reward: Decimal,
    discount: Decimal,
    fields: &FieldBindings,
) -> Result<InvoiceBreakdown, AppError> {
    if inputs.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Cannot bill an empty job list"
        )));
    }

    let mut jurisdictions = inputs
        .iter()
        .filter_map(|input| input.rule.as_ref())
        .map(|rule| rule.jurisdiction());
    let jurisdiction = jurisdictions.next().unwrap_or(TaxJurisdiction::Unspecified);
    if jurisdictions.any(|j| j != jurisdiction) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Jobs on one invoice must share a tax jurisdiction"
        )));
    }

    let jobs: Vec<JobCharges> = inputs
        .iter()
        .map(|input| charges_for_job(input.job_id, input.rule.as_ref(), &input.attributes, fields))
        .collect();

    let base_amount: Decimal = jobs.iter().map(|j| j.service_fee).sum();
    let certificate_a_total: Decimal = jobs.iter().map(|j| j.certificate_a_fee).sum();
    let certificate_b_total: Decimal = jobs.iter().map(|j| j.certificate_b_fee).sum();
    let registration_total: Decimal = jobs.iter().map(|j| j.registration_charge).sum();
    let application_fee_total: Decimal = jobs.iter().map(|j| j.application_fee).sum();

    // Sum reimbursements by slot position across jobs; the first-seen
    // description labels the combined line.
    let mut slots: BTreeMap<u8, ReimbursementLine> = BTreeMap::new();
    for job in &jobs {
        for line in &job.reimbursements {
            slots
                .entry(line.slot)
                .and_modify(|merged| merged.amount += line.amount)
                .or_insert_with(|| line.clone());
        }
    }
    let reimbursement_lines: Vec<ReimbursementLine> = slots.into_values().collect();
    let reimbursement_line_total: Decimal =
        reimbursement_lines.iter().map(|line| line.amount).sum();

    let service_subtotal = base_amount
        + certificate_a_total
        + certificate_b_total
        + registration_total
        + reward
        - discount;
    let reimbursement_subtotal = application_fee_total + reimbursement_line_total;

    let tax = compute_tax(service_subtotal, rate, jurisdiction);

    let total_amount = match billing_mode {
        BillingMode::Service => service_subtotal + tax.total(),
        BillingMode::Reimbursement => reimbursement_subtotal,
        BillingMode::ServiceAndReimbursement => {
            service_subtotal + reimbursement_subtotal + tax.total()
        }
    };

    Ok(InvoiceBreakdown {
        billing_mode,
        jobs,
        base_amount,
        certificate_a_total,
        certificate_b_total,
        registration_total,
        application_fee_total,
        reimbursement_lines,
        reward,
        discount,
        service_subtotal,
        reimbursement_subtotal,
        tax,
        total_amount,
        payable_amount: total_amount,
    })
}
