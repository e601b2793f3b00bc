//! Invoice model for billing-engine.

use crate::models::breakdown::BillingMode;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invoice stage. Cancellation is a stage, not a deletion: numbers assigned
/// in earlier stages survive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStage {
    Draft,
    Proforma,
    Canceled,
}

impl InvoiceStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStage::Draft => "draft",
            InvoiceStage::Proforma => "proforma",
            InvoiceStage::Canceled => "canceled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "proforma" => InvoiceStage::Proforma,
            "canceled" => InvoiceStage::Canceled,
            _ => InvoiceStage::Draft,
        }
    }
}

/// Invoice record status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Active,
    Deleted,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Active => "active",
            InvoiceStatus::Deleted => "deleted",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "deleted" => InvoiceStatus::Deleted,
            _ => InvoiceStatus::Active,
        }
    }
}

/// Invoice document.
///
/// `draft_number` is assigned once at creation and immutable; a NULL draft
/// number means generation failed at creation time (the creation itself is
/// never rolled back for that). `proforma_number` is assigned at the first
/// Draft→Proforma transition and never regenerated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub account_id: i64,
    pub client_id: Uuid,
    pub draft_number: Option<String>,
    pub proforma_number: Option<String>,
    pub stage: String,
    pub status: String,
    pub billing_mode: String,
    pub base_amount: Decimal,
    pub certificate_a_total: Decimal,
    pub certificate_b_total: Decimal,
    pub registration_total: Decimal,
    pub application_fee_total: Decimal,
    pub reimbursement_total: Decimal,
    pub reward: Decimal,
    pub discount: Decimal,
    pub service_subtotal: Decimal,
    pub central_tax_amount: Decimal,
    pub state_tax_amount: Decimal,
    pub interstate_tax_amount: Decimal,
    pub total_amount: Decimal,
    pub payable_amount: Decimal,
    pub created_utc: DateTime<Utc>,
    pub proforma_utc: Option<DateTime<Utc>>,
    pub canceled_utc: Option<DateTime<Utc>>,
}

impl Invoice {
    pub fn stage(&self) -> InvoiceStage {
        InvoiceStage::from_string(&self.stage)
    }

    pub fn invoice_status(&self) -> InvoiceStatus {
        InvoiceStatus::from_string(&self.status)
    }
}

/// Link row tying one job onto one invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceJob {
    pub invoice_id: Uuid,
    pub job_id: Uuid,
}

/// Caller input for creating an invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub account_id: i64,
    pub client_id: Uuid,
    pub job_ids: Vec<Uuid>,
    pub billing_mode: BillingMode,
    pub reward: Decimal,
    pub discount: Decimal,
}

/// Fully computed column values for the invoice insert, produced by the
/// aggregator; the persistence layer stores it verbatim.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub account_id: i64,
    pub client_id: Uuid,
    pub draft_number: Option<String>,
    pub billing_mode: BillingMode,
    pub job_ids: Vec<Uuid>,
    pub base_amount: Decimal,
    pub certificate_a_total: Decimal,
    pub certificate_b_total: Decimal,
    pub registration_total: Decimal,
    pub application_fee_total: Decimal,
    pub reimbursement_total: Decimal,
    pub reward: Decimal,
    pub discount: Decimal,
    pub service_subtotal: Decimal,
    pub central_tax_amount: Decimal,
    pub state_tax_amount: Decimal,
    pub interstate_tax_amount: Decimal,
    pub total_amount: Decimal,
    pub payable_amount: Decimal,
}
