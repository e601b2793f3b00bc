//! Invoice aggregation tests for billing-engine.
//!
//! These run entirely on the pure calculation layer: charge rules and
//! attribute maps are built in memory and fed through `aggregate`, the same
//! path `InvoiceService::calculate_breakdown` takes after its I/O.

use billing_engine::models::{
    AttributeMap, BillingMode, ChargeRule, TaxJurisdiction, TaxRate,
};
use billing_engine::services::{aggregate, FieldBindings, JobBillingInput};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use service_core::error::AppError;
use uuid::Uuid;

fn job_input(rule: Option<ChargeRule>, pairs: &[(&str, &str)]) -> JobBillingInput {
    JobBillingInput {
        job_id: Uuid::new_v4(),
        rule,
        attributes: AttributeMap::from_pairs(pairs.iter().map(|(k, v)| (*k, *v))),
    }
}

fn gst_18() -> TaxRate {
    TaxRate {
        sac_code: "9967".to_string(),
        central_rate: dec!(9),
        state_rate: dec!(9),
        interstate_rate: dec!(18),
        ..Default::default()
    }
}

#[test]
fn empty_job_list_is_rejected() {
    let result = aggregate(
        &[],
        None,
        BillingMode::Service,
        Decimal::ZERO,
        Decimal::ZERO,
        &FieldBindings::default(),
    );
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[test]
fn reimbursement_mode_ignores_the_service_side() {
    // Service-side fields are all non-zero; none of them may leak into a
    // reimbursement-only invoice.
    let rule = ChargeRule {
        fixed_amount: dec!(5000),
        certificate_a_rate: dec!(200),
        registration_charge: dec!(1000),
        reimb_description_1: Some("DGFT application".to_string()),
        reimb_amount_1: Some("300".to_string()),
        tax_jurisdiction: TaxJurisdiction::StateCentral.as_str().to_string(),
        ..Default::default()
    };
    let input = job_input(Some(rule), &[("No of CAC", "2"), ("Application Fee", "500")]);

    let breakdown = aggregate(
        &[input],
        Some(&gst_18()),
        BillingMode::Reimbursement,
        Decimal::ZERO,
        Decimal::ZERO,
        &FieldBindings::default(),
    )
    .unwrap();

    assert_eq!(breakdown.reimbursement_subtotal, dec!(800));
    assert_eq!(breakdown.total_amount, dec!(800));
    assert_eq!(breakdown.payable_amount, dec!(800));
}

#[test]
fn service_mode_taxes_the_service_subtotal() {
    let rule = ChargeRule {
        fixed_amount: dec!(1000),
        tax_jurisdiction: TaxJurisdiction::StateCentral.as_str().to_string(),
        ..Default::default()
    };
    let input = job_input(Some(rule), &[]);

    let breakdown = aggregate(
        &[input],
        Some(&gst_18()),
        BillingMode::Service,
        Decimal::ZERO,
        Decimal::ZERO,
        &FieldBindings::default(),
    )
    .unwrap();

    assert_eq!(breakdown.service_subtotal, dec!(1000));
    assert_eq!(breakdown.tax.central_amount, dec!(90));
    assert_eq!(breakdown.tax.state_amount, dec!(90));
    assert_eq!(breakdown.tax.interstate_amount, Decimal::ZERO);
    assert_eq!(breakdown.total_amount, dec!(1180));
}

#[test]
fn combined_mode_adds_both_sides_plus_tax() {
    let rule = ChargeRule {
        fixed_amount: dec!(1000),
        reimb_description_1: Some("Port charges".to_string()),
        reimb_amount_1: Some("250".to_string()),
        tax_jurisdiction: TaxJurisdiction::StateCentral.as_str().to_string(),
        ..Default::default()
    };
    let input = job_input(Some(rule), &[("Application Fee", "150")]);

    let breakdown = aggregate(
        &[input],
        Some(&gst_18()),
        BillingMode::ServiceAndReimbursement,
        Decimal::ZERO,
        Decimal::ZERO,
        &FieldBindings::default(),
    )
    .unwrap();

    // 1000 service + 180 tax + 400 reimbursement.
    assert_eq!(breakdown.reimbursement_subtotal, dec!(400));
    assert_eq!(breakdown.total_amount, dec!(1580));
}

#[test]
fn reward_and_discount_adjust_the_service_side_only() {
    let rule = ChargeRule {
        fixed_amount: dec!(1000),
        tax_jurisdiction: TaxJurisdiction::Exempt.as_str().to_string(),
        ..Default::default()
    };
    let input = job_input(Some(rule), &[("Application Fee", "500")]);

    let breakdown = aggregate(
        &[input],
        Some(&gst_18()),
        BillingMode::ServiceAndReimbursement,
        dec!(200),
        dec!(50),
        &FieldBindings::default(),
    )
    .unwrap();

    assert_eq!(breakdown.service_subtotal, dec!(1150));
    assert_eq!(breakdown.reimbursement_subtotal, dec!(500));
    assert_eq!(breakdown.total_amount, dec!(1650));
}

#[test]
fn jurisdiction_mismatch_across_jobs_is_rejected() {
    let intra = ChargeRule {
        fixed_amount: dec!(1000),
        tax_jurisdiction: TaxJurisdiction::StateCentral.as_str().to_string(),
        ..Default::default()
    };
    let inter = ChargeRule {
        fixed_amount: dec!(2000),
        tax_jurisdiction: TaxJurisdiction::InterState.as_str().to_string(),
        ..Default::default()
    };

    let result = aggregate(
        &[job_input(Some(intra), &[]), job_input(Some(inter), &[])],
        Some(&gst_18()),
        BillingMode::Service,
        Decimal::ZERO,
        Decimal::ZERO,
        &FieldBindings::default(),
    );

    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[test]
fn ruleless_jobs_contribute_zero_without_blocking() {
    let rule = ChargeRule {
        fixed_amount: dec!(1000),
        tax_jurisdiction: TaxJurisdiction::Exempt.as_str().to_string(),
        ..Default::default()
    };

    let breakdown = aggregate(
        &[
            job_input(Some(rule), &[]),
            job_input(None, &[("Application Fee", "999")]),
        ],
        None,
        BillingMode::Service,
        Decimal::ZERO,
        Decimal::ZERO,
        &FieldBindings::default(),
    )
    .unwrap();

    assert_eq!(breakdown.base_amount, dec!(1000));
    // The ruleless job's application fee attribute is not read.
    assert_eq!(breakdown.application_fee_total, Decimal::ZERO);
    assert_eq!(breakdown.jobs.len(), 2);
    assert_eq!(breakdown.jobs[1].service_fee, Decimal::ZERO);
}

#[test]
fn reimbursement_lines_sum_by_slot_with_first_seen_label() {
    let first = ChargeRule {
        reimb_description_1: Some("DGFT fee".to_string()),
        reimb_amount_1: Some("300".to_string()),
        ..Default::default()
    };
    let second = ChargeRule {
        reimb_description_1: Some("DGFT application fee".to_string()),
        reimb_amount_1: Some("200".to_string()),
        reimb_description_2: Some("Courier".to_string()),
        reimb_amount_2: Some("80".to_string()),
        ..Default::default()
    };

    let breakdown = aggregate(
        &[job_input(Some(first), &[]), job_input(Some(second), &[])],
        None,
        BillingMode::Reimbursement,
        Decimal::ZERO,
        Decimal::ZERO,
        &FieldBindings::default(),
    )
    .unwrap();

    assert_eq!(breakdown.reimbursement_lines.len(), 2);
    assert_eq!(breakdown.reimbursement_lines[0].slot, 1);
    assert_eq!(breakdown.reimbursement_lines[0].description, "DGFT fee");
    assert_eq!(breakdown.reimbursement_lines[0].amount, dec!(500));
    assert_eq!(breakdown.reimbursement_lines[1].slot, 2);
    assert_eq!(breakdown.reimbursement_lines[1].amount, dec!(80));
    assert_eq!(breakdown.total_amount, dec!(580));
}

#[test]
fn percentage_pricing_flows_through_to_the_invoice_total() {
    let rule = ChargeRule {
        percentage_rate: dec!(0.5),
        fixed_amount: dec!(9999),
        minimum_amount: dec!(2500),
        tax_jurisdiction: TaxJurisdiction::InterState.as_str().to_string(),
        ..Default::default()
    };
    // 0.5% of 1,000,000 = 5000; above the minimum, percentage wins over fixed.
    let input = job_input(Some(rule), &[("FOB Value", "1000000")]);

    let breakdown = aggregate(
        &[input],
        Some(&gst_18()),
        BillingMode::Service,
        Decimal::ZERO,
        Decimal::ZERO,
        &FieldBindings::default(),
    )
    .unwrap();

    assert_eq!(breakdown.base_amount, dec!(5000));
    assert_eq!(breakdown.tax.interstate_amount, dec!(900));
    assert_eq!(breakdown.total_amount, dec!(5900));
}

#[test]
fn rounded_view_presents_two_decimals() {
    let rule = ChargeRule {
        fixed_amount: dec!(333.335),
        tax_jurisdiction: TaxJurisdiction::StateCentral.as_str().to_string(),
        ..Default::default()
    };
    let input = job_input(Some(rule), &[]);

    let breakdown = aggregate(
        &[input],
        Some(&gst_18()),
        BillingMode::Service,
        Decimal::ZERO,
        Decimal::ZERO,
        &FieldBindings::default(),
    )
    .unwrap();

    let rounded = breakdown.rounded();
    assert_eq!(rounded.base_amount, dec!(333.34));
    assert_eq!(rounded.tax.central_amount, dec!(30.00));
    // The exact breakdown is untouched.
    assert_eq!(breakdown.base_amount, dec!(333.335));
}
