//! Database service for billing-engine.

use crate::models::{
    AttributeMap, ChargeRule, Invoice, InvoiceJob, Job, JobAttribute, NewInvoice, SetAttribute,
    TaxRate, canonical_key,
};
use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const INVOICE_COLUMNS: &str = r#"
    invoice_id, account_id, client_id, draft_number, proforma_number, stage, status,
    billing_mode, base_amount, certificate_a_total, certificate_b_total, registration_total,
    application_fee_total, reimbursement_total, reward, discount, service_subtotal,
    central_tax_amount, state_tax_amount, interstate_tax_amount, total_amount, payable_amount,
    created_utc, proforma_utc, canceled_utc
"#;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "billing-engine"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Job Operations
    // -------------------------------------------------------------------------

    /// Get a job by ID.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_job"])
            .start_timer();

        let job = sqlx::query_as::<_, Job>(
            r#"
            SELECT job_id, account_id, client_id, category, sac_code, status,
                is_deleted, deleted_utc, created_by, created_utc
            FROM jobs
            WHERE job_id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get job: {}", e)))?;

        timer.observe_duration();

        Ok(job)
    }

    /// Get several jobs at once, returned in the order requested. IDs that
    /// match no row are simply absent from the result.
    #[instrument(skip(self, job_ids))]
    pub async fn get_jobs(&self, job_ids: &[Uuid]) -> Result<Vec<Job>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_jobs"])
            .start_timer();

        let rows = sqlx::query_as::<_, Job>(
            r#"
            SELECT job_id, account_id, client_id, category, sac_code, status,
                is_deleted, deleted_utc, created_by, created_utc
            FROM jobs
            WHERE job_id = ANY($1)
            "#,
        )
        .bind(job_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get jobs: {}", e)))?;

        timer.observe_duration();

        let mut by_id: HashMap<Uuid, Job> = rows.into_iter().map(|j| (j.job_id, j)).collect();
        Ok(job_ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    // -------------------------------------------------------------------------
    // Attribute Store Operations
    // -------------------------------------------------------------------------

    /// Get all attributes for a job.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn get_attributes(&self, job_id: Uuid) -> Result<AttributeMap, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_attributes"])
            .start_timer();

        let rows = sqlx::query_as::<_, JobAttribute>(
            r#"
            SELECT attribute_id, job_id, field_key, field_name, field_value, created_utc
            FROM job_attributes
            WHERE job_id = $1
            ORDER BY field_key
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get attributes: {}", e)))?;

        timer.observe_duration();

        Ok(AttributeMap::from_rows(rows))
    }

    /// Replace a job's attribute set: delete everything, insert the new set,
    /// as one transaction. A concurrent reader sees either the old set or
    /// the new one, never a partial mix. Keys are canonicalized here, at
    /// write time; duplicate keys in the input collapse to the last pair.
    #[instrument(skip(self, attributes), fields(job_id = %job_id))]
    pub async fn replace_attributes(
        &self,
        job_id: Uuid,
        attributes: &[SetAttribute],
    ) -> Result<AttributeMap, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["replace_attributes"])
            .start_timer();

        let mut deduped: BTreeMap<String, (&str, &str)> = BTreeMap::new();
        for attr in attributes {
            deduped.insert(
                canonical_key(&attr.field_name),
                (attr.field_name.as_str(), attr.field_value.as_str()),
            );
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query("DELETE FROM job_attributes WHERE job_id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to clear attributes: {}", e))
            })?;

        for (field_key, (field_name, field_value)) in &deduped {
            sqlx::query(
                r#"
                INSERT INTO job_attributes (attribute_id, job_id, field_key, field_name, field_value)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(job_id)
            .bind(field_key)
            .bind(field_name)
            .bind(field_value)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert attribute: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit attributes: {}", e))
        })?;

        timer.observe_duration();

        info!(job_id = %job_id, count = deduped.len(), "Job attributes replaced");

        self.get_attributes(job_id).await
    }

    // -------------------------------------------------------------------------
    // Charge Rule / Tax Rate Operations
    // -------------------------------------------------------------------------

    /// Get the charge rule billing uses for a job: the most recent
    /// non-deleted row.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn get_charge_rule(&self, job_id: Uuid) -> Result<Option<ChargeRule>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_charge_rule"])
            .start_timer();

        let rule = sqlx::query_as::<_, ChargeRule>(
            r#"
            SELECT rule_id, job_id, minimum_amount, maximum_amount, percentage_rate,
                fixed_amount, per_unit_rate, certificate_a_rate, certificate_b_rate,
                registration_charge, invoice_description,
                reimb_description_1, reimb_amount_1, reimb_description_2, reimb_amount_2,
                reimb_description_3, reimb_amount_3, reimb_description_4, reimb_amount_4,
                reimb_description_5, reimb_amount_5,
                tax_jurisdiction, is_deleted, created_utc
            FROM charge_rules
            WHERE job_id = $1 AND is_deleted = FALSE
            ORDER BY created_utc DESC
            LIMIT 1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get charge rule: {}", e))
        })?;

        timer.observe_duration();

        Ok(rule)
    }

    /// Get the active tax rate for a service accounting code.
    #[instrument(skip(self), fields(sac_code = %sac_code))]
    pub async fn get_tax_rate(&self, sac_code: &str) -> Result<Option<TaxRate>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_tax_rate"])
            .start_timer();

        let tax_rate = sqlx::query_as::<_, TaxRate>(
            r#"
            SELECT tax_rate_id, sac_code, central_rate, state_rate, interstate_rate,
                active, created_utc
            FROM tax_rates
            WHERE sac_code = $1 AND active = TRUE
            ORDER BY created_utc DESC
            LIMIT 1
            "#,
        )
        .bind(sac_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get tax rate: {}", e)))?;

        timer.observe_duration();

        Ok(tax_rate)
    }

    // -------------------------------------------------------------------------
    // Document Sequence Operations
    // -------------------------------------------------------------------------

    /// Claim the next sequence value for a scope. The upsert is atomic:
    /// concurrent callers serialize on the counter row and each gets a
    /// distinct value. A claimed value is burned even if the caller's
    /// subsequent insert fails, so scopes may have gaps but never
    /// duplicates.
    #[instrument(skip(self), fields(scope = %scope))]
    pub async fn next_sequence(&self, scope: &str) -> Result<i64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["next_sequence"])
            .start_timer();

        let sequence: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO document_sequences (scope, next_value)
            VALUES ($1, 1)
            ON CONFLICT (scope)
            DO UPDATE SET next_value = document_sequences.next_value + 1
            RETURNING next_value
            "#,
        )
        .bind(scope)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to advance sequence: {}", e))
        })?;

        timer.observe_duration();

        Ok(sequence)
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    /// Create an invoice and its job links in one transaction.
    #[instrument(skip(self, input), fields(account_id = %input.account_id))]
    pub async fn create_invoice(&self, input: &NewInvoice) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice_id = Uuid::new_v4();
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (
                invoice_id, account_id, client_id, draft_number, stage, status, billing_mode,
                base_amount, certificate_a_total, certificate_b_total, registration_total,
                application_fee_total, reimbursement_total, reward, discount, service_subtotal,
                central_tax_amount, state_tax_amount, interstate_tax_amount,
                total_amount, payable_amount
            )
            VALUES ($1, $2, $3, $4, 'draft', 'active', $5, $6, $7, $8, $9, $10, $11, $12, $13,
                $14, $15, $16, $17, $18, $19)
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(invoice_id)
        .bind(input.account_id)
        .bind(input.client_id)
        .bind(&input.draft_number)
        .bind(input.billing_mode.as_str())
        .bind(input.base_amount)
        .bind(input.certificate_a_total)
        .bind(input.certificate_b_total)
        .bind(input.registration_total)
        .bind(input.application_fee_total)
        .bind(input.reimbursement_total)
        .bind(input.reward)
        .bind(input.discount)
        .bind(input.service_subtotal)
        .bind(input.central_tax_amount)
        .bind(input.state_tax_amount)
        .bind(input.interstate_tax_amount)
        .bind(input.total_amount)
        .bind(input.payable_amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Invoice number already exists: {}",
                    input.draft_number.as_deref().unwrap_or("")
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)),
        })?;

        for job_id in &input.job_ids {
            sqlx::query("INSERT INTO invoice_jobs (invoice_id, job_id) VALUES ($1, $2)")
                .bind(invoice_id)
                .bind(job_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to link job: {}", e))
                })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit invoice: {}", e))
        })?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice.invoice_id,
            draft_number = %invoice.draft_number.as_deref().unwrap_or(""),
            jobs = input.job_ids.len(),
            "Draft invoice created"
        );

        Ok(invoice)
    }

    /// Get an invoice by ID.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE invoice_id = $1
            "#
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// Get the job links of an invoice.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice_jobs(&self, invoice_id: Uuid) -> Result<Vec<InvoiceJob>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice_jobs"])
            .start_timer();

        let links = sqlx::query_as::<_, InvoiceJob>(
            r#"
            SELECT invoice_id, job_id
            FROM invoice_jobs
            WHERE invoice_id = $1
            ORDER BY job_id
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice jobs: {}", e))
        })?;

        timer.observe_duration();

        Ok(links)
    }

    /// Move an invoice to the proforma stage, recording its number. The
    /// `proforma_number IS NULL` guard makes the number assign-once: a
    /// retry after a failed generation may fill a NULL, but an existing
    /// number is never overwritten.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn assign_proforma(
        &self,
        invoice_id: Uuid,
        proforma_number: Option<&str>,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["assign_proforma"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET proforma_number = $2,
                stage = 'proforma',
                proforma_utc = NOW()
            WHERE invoice_id = $1
              AND stage IN ('draft', 'proforma')
              AND status = 'active'
              AND proforma_number IS NULL
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(invoice_id)
        .bind(proforma_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "Proforma number already exists: {}",
                    proforma_number.unwrap_or("")
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to assign proforma: {}", e)),
        })?;

        timer.observe_duration();

        if let Some(ref inv) = invoice {
            info!(
                invoice_id = %inv.invoice_id,
                proforma_number = %inv.proforma_number.as_deref().unwrap_or(""),
                "Invoice moved to proforma"
            );
        }

        Ok(invoice)
    }

    /// Cancel an invoice. A separate stage, not a deletion: both document
    /// numbers stay on the row and are never reused.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn cancel_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["cancel_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET stage = 'canceled',
                canceled_utc = NOW()
            WHERE invoice_id = $1
              AND stage <> 'canceled'
              AND status = 'active'
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to cancel invoice: {}", e)))?;

        timer.observe_duration();

        if let Some(ref inv) = invoice {
            info!(invoice_id = %inv.invoice_id, "Invoice canceled");
        }

        Ok(invoice)
    }
}
