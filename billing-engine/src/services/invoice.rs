//! Invoice service: breakdown calculation and invoice lifecycle.

use crate::models::{
    BillingMode, CreateInvoice, Invoice, InvoiceBreakdown, InvoiceStage, NewInvoice,
};
use crate::services::calculation::{aggregate, FieldBindings, JobBillingInput};
use crate::services::database::Database;
use crate::services::metrics::{INVOICES_TOTAL, INVOICE_AMOUNT_TOTAL};
use crate::services::numbering::NumberingService;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Entry point for the route layer and the PDF renderer.
pub struct InvoiceService {
    db: Arc<Database>,
    numbering: NumberingService,
    fields: FieldBindings,
}

impl InvoiceService {
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_field_bindings(db, FieldBindings::default())
    }

    pub fn with_field_bindings(db: Arc<Database>, fields: FieldBindings) -> Self {
        Self {
            numbering: NumberingService::new(db.clone()),
            db,
            fields,
        }
    }

    pub fn numbering(&self) -> &NumberingService {
        &self.numbering
    }

    /// Compute the full monetary breakdown for a set of jobs without
    /// persisting anything.
    #[instrument(skip(self, job_ids), fields(jobs = job_ids.len(), mode = billing_mode.as_str()))]
    pub async fn calculate_breakdown(
        &self,
        job_ids: &[Uuid],
        billing_mode: BillingMode,
        reward: Decimal,
        discount: Decimal,
    ) -> Result<InvoiceBreakdown, AppError> {
        if job_ids.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Cannot bill an empty job list"
            )));
        }

        let jobs = self.db.get_jobs(job_ids).await?;
        if jobs.len() != job_ids.len() {
            return Err(AppError::NotFound(anyhow::anyhow!(
                "One or more jobs do not exist"
            )));
        }

        // All jobs on one invoice share a category, hence a SAC code; the
        // first job's rate drives the tax line. Jurisdiction agreement is
        // enforced in the aggregator.
        let tax_rate = match jobs.first().and_then(|job| job.sac_code.as_deref()) {
            Some(sac) => self.db.get_tax_rate(sac).await?,
            None => None,
        };

        let mut inputs = Vec::with_capacity(jobs.len());
        for job in &jobs {
            inputs.push(JobBillingInput {
                job_id: job.job_id,
                rule: self.db.get_charge_rule(job.job_id).await?,
                attributes: self.db.get_attributes(job.job_id).await?,
            });
        }

        aggregate(
            &inputs,
            tax_rate.as_ref(),
            billing_mode,
            reward,
            discount,
            &self.fields,
        )
    }

    /// Create a draft invoice: aggregate, mint a draft number, persist the
    /// invoice and its job links in one transaction.
    ///
    /// Draft-number generation failure does not abort creation; the invoice
    /// is stored with a NULL draft number and the failure is logged by the
    /// numbering service.
    #[instrument(skip(self, input), fields(account_id = input.account_id))]
    pub async fn create_invoice(&self, input: &CreateInvoice) -> Result<Invoice, AppError> {
        if input.account_id <= 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "An account id is required to create an invoice"
            )));
        }

        let breakdown = self
            .calculate_breakdown(
                &input.job_ids,
                input.billing_mode,
                input.reward,
                input.discount,
            )
            .await?;

        let draft_number = self.numbering.draft_number(input.account_id).await?;

        let reimbursement_total: Decimal = breakdown
            .reimbursement_lines
            .iter()
            .map(|line| line.amount)
            .sum();

        let invoice = self
            .db
            .create_invoice(&NewInvoice {
                account_id: input.account_id,
                client_id: input.client_id,
                draft_number,
                billing_mode: input.billing_mode,
                job_ids: input.job_ids.clone(),
                base_amount: breakdown.base_amount,
                certificate_a_total: breakdown.certificate_a_total,
                certificate_b_total: breakdown.certificate_b_total,
                registration_total: breakdown.registration_total,
                application_fee_total: breakdown.application_fee_total,
                reimbursement_total,
                reward: breakdown.reward,
                discount: breakdown.discount,
                service_subtotal: breakdown.service_subtotal,
                central_tax_amount: breakdown.tax.central_amount,
                state_tax_amount: breakdown.tax.state_amount,
                interstate_tax_amount: breakdown.tax.interstate_amount,
                total_amount: breakdown.total_amount,
                payable_amount: breakdown.payable_amount,
            })
            .await?;

        INVOICES_TOTAL.with_label_values(&["draft"]).inc();
        if let Some(amount) = invoice.total_amount.to_f64() {
            INVOICE_AMOUNT_TOTAL
                .with_label_values(&[input.billing_mode.as_str()])
                .inc_by(amount);
        }

        Ok(invoice)
    }

    /// Move a draft invoice to the proforma stage, assigning its proforma
    /// number the first time. An already-assigned number is never
    /// regenerated; the call is a no-op returning the invoice as-is.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn promote_to_proforma(&self, invoice_id: Uuid) -> Result<Invoice, AppError> {
        let invoice = self
            .db
            .get_invoice(invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        match invoice.stage() {
            InvoiceStage::Canceled => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Canceled invoices cannot move to proforma"
                )))
            }
            InvoiceStage::Proforma if invoice.proforma_number.is_some() => {
                return Ok(invoice);
            }
            _ => {}
        }

        let proforma_number = self.numbering.proforma_number(invoice.account_id).await?;

        let updated = self
            .db
            .assign_proforma(invoice_id, proforma_number.as_deref())
            .await?
            .ok_or_else(|| {
                AppError::Conflict(anyhow::anyhow!(
                    "Invoice is no longer eligible for proforma promotion"
                ))
            })?;

        INVOICES_TOTAL.with_label_values(&["proforma"]).inc();
        info!(
            invoice_id = %updated.invoice_id,
            proforma_number = %updated.proforma_number.as_deref().unwrap_or(""),
            "Invoice promoted to proforma"
        );

        Ok(updated)
    }

    /// Cancel an invoice. Numbers assigned so far stay with the row.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn cancel_invoice(&self, invoice_id: Uuid) -> Result<Invoice, AppError> {
        let invoice = self
            .db
            .cancel_invoice(invoice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found or already canceled")))?;

        INVOICES_TOTAL.with_label_values(&["canceled"]).inc();

        Ok(invoice)
    }
}
