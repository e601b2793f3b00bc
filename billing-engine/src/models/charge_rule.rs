//! Charge rule model for billing-engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// GST jurisdiction of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxJurisdiction {
    /// Intra-state supply: central + state tax apply.
    StateCentral,
    /// Inter-state supply: integrated tax applies.
    InterState,
    /// Exempt supply: no tax, rates still shown on the document.
    Exempt,
    /// No code recorded on the rule. Legacy rule sets predate the
    /// jurisdiction column; billing computes all three buckets for these,
    /// which existing documents depend on even though it can double-tax.
    Unspecified,
}

impl TaxJurisdiction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxJurisdiction::StateCentral => "state_central",
            TaxJurisdiction::InterState => "inter_state",
            TaxJurisdiction::Exempt => "exempt",
            TaxJurisdiction::Unspecified => "unspecified",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "state_central" => TaxJurisdiction::StateCentral,
            "inter_state" => TaxJurisdiction::InterState,
            "exempt" => TaxJurisdiction::Exempt,
            _ => TaxJurisdiction::Unspecified,
        }
    }
}

/// Pricing parameters for one job.
///
/// Modeled one-to-many per job; billing uses only the most-recent
/// non-deleted row. Monetary columns are `NOT NULL DEFAULT 0`. The five
/// reimbursement slots hold operator free text: a slot participates in
/// billing only when its description is non-blank, and its amount parses
/// leniently (garbage becomes zero, never an error).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChargeRule {
    pub rule_id: Uuid,
    pub job_id: Uuid,
    pub minimum_amount: Decimal,
    pub maximum_amount: Decimal,
    pub percentage_rate: Decimal,
    pub fixed_amount: Decimal,
    pub per_unit_rate: Decimal,
    pub certificate_a_rate: Decimal,
    pub certificate_b_rate: Decimal,
    pub registration_charge: Decimal,
    pub invoice_description: Option<String>,
    pub reimb_description_1: Option<String>,
    pub reimb_amount_1: Option<String>,
    pub reimb_description_2: Option<String>,
    pub reimb_amount_2: Option<String>,
    pub reimb_description_3: Option<String>,
    pub reimb_amount_3: Option<String>,
    pub reimb_description_4: Option<String>,
    pub reimb_amount_4: Option<String>,
    pub reimb_description_5: Option<String>,
    pub reimb_amount_5: Option<String>,
    pub tax_jurisdiction: String,
    pub is_deleted: bool,
    pub created_utc: DateTime<Utc>,
}

impl ChargeRule {
    pub fn jurisdiction(&self) -> TaxJurisdiction {
        TaxJurisdiction::from_string(&self.tax_jurisdiction)
    }

    /// The five reimbursement slots in position order.
    pub fn reimbursement_slots(&self) -> [(Option<&str>, Option<&str>); 5] {
        [
            (self.reimb_description_1.as_deref(), self.reimb_amount_1.as_deref()),
            (self.reimb_description_2.as_deref(), self.reimb_amount_2.as_deref()),
            (self.reimb_description_3.as_deref(), self.reimb_amount_3.as_deref()),
            (self.reimb_description_4.as_deref(), self.reimb_amount_4.as_deref()),
            (self.reimb_description_5.as_deref(), self.reimb_amount_5.as_deref()),
        ]
    }
}

impl Default for ChargeRule {
    fn default() -> Self {
        Self {
            rule_id: Uuid::nil(),
            job_id: Uuid::nil(),
            minimum_amount: Decimal::ZERO,
            maximum_amount: Decimal::ZERO,
            percentage_rate: Decimal::ZERO,
            fixed_amount: Decimal::ZERO,
            per_unit_rate: Decimal::ZERO,
            certificate_a_rate: Decimal::ZERO,
            certificate_b_rate: Decimal::ZERO,
            registration_charge: Decimal::ZERO,
            invoice_description: None,
            reimb_description_1: None,
            reimb_amount_1: None,
            reimb_description_2: None,
            reimb_amount_2: None,
            reimb_description_3: None,
            reimb_amount_3: None,
            reimb_description_4: None,
            reimb_amount_4: None,
            reimb_description_5: None,
            reimb_amount_5: None,
            tax_jurisdiction: TaxJurisdiction::Unspecified.as_str().to_string(),
            is_deleted: false,
            created_utc: Utc::now(),
        }
    }
}
