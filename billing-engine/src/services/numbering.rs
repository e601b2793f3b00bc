//! Document numbering for billing-engine.
//!
//! Draft and proforma numbers are scoped per account and fiscal year
//! (`D<account><fy-pair><seq:4>`); pricing group codes are global per prefix
//! (`LE00001`). Sequences come from an atomic per-scope counter upsert in
//! PostgreSQL, so concurrent callers get distinct consecutive values; the
//! unique indexes on stored numbers are the final backstop.
//!
//! Generation failure never fails the surrounding document creation: the
//! entry points log and return `Ok(None)`, and the document is persisted
//! with a NULL identifier.

use crate::services::database::Database;
use crate::services::metrics::NUMBERING_FAILURES_TOTAL;
use chrono::{Datelike, NaiveDate, Utc};
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Fiscal-year-scoped document kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Draft,
    Proforma,
}

impl DocumentKind {
    pub fn letter(&self) -> char {
        match self {
            DocumentKind::Draft => 'D',
            DocumentKind::Proforma => 'P',
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Draft => "draft",
            DocumentKind::Proforma => "proforma",
        }
    }
}

/// Two-digit year pair of the April–March fiscal year containing `date`.
/// 2025-04-10 → `"2526"`; 2025-01-15 → `"2425"`.
pub fn fiscal_year_pair(date: NaiveDate) -> String {
    let (start, end) = if date.month() >= 4 {
        (date.year(), date.year() + 1)
    } else {
        (date.year() - 1, date.year())
    };
    format!("{:02}{:02}", start.rem_euclid(100), end.rem_euclid(100))
}

/// Scope prefix shared by all documents of one kind, account, and fiscal
/// year; doubles as the counter key.
pub fn document_scope(kind: DocumentKind, account_id: i64, fiscal_pair: &str) -> String {
    format!("{}{}{}", kind.letter(), account_id, fiscal_pair)
}

pub fn format_document_number(scope: &str, sequence: i64) -> String {
    format!("{}{:04}", scope, sequence)
}

pub fn format_group_code(prefix: &str, sequence: i64) -> String {
    format!("{}{:05}", prefix, sequence)
}

/// Mints human-facing document identifiers.
pub struct NumberingService {
    db: Arc<Database>,
}

impl NumberingService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Next draft number for the account in the current fiscal year.
    pub async fn draft_number(&self, account_id: i64) -> Result<Option<String>, AppError> {
        self.document_number(DocumentKind::Draft, account_id).await
    }

    /// Next proforma number for the account in the current fiscal year.
    pub async fn proforma_number(&self, account_id: i64) -> Result<Option<String>, AppError> {
        self.document_number(DocumentKind::Proforma, account_id)
            .await
    }

    #[instrument(skip(self))]
    async fn document_number(
        &self,
        kind: DocumentKind,
        account_id: i64,
    ) -> Result<Option<String>, AppError> {
        if account_id <= 0 {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "An account id is required to number a {} document",
                kind.as_str()
            )));
        }

        let pair = fiscal_year_pair(Utc::now().date_naive());
        let scope = document_scope(kind, account_id, &pair);
        match self.db.next_sequence(&scope).await {
            Ok(sequence) => Ok(Some(format_document_number(&scope, sequence))),
            Err(err) => {
                NUMBERING_FAILURES_TOTAL
                    .with_label_values(&[kind.as_str()])
                    .inc();
                warn!(
                    scope = %scope,
                    error = %err,
                    "Document number generation failed; proceeding without one"
                );
                Ok(None)
            }
        }
    }

    /// Next running-counter code for a pricing group registry
    /// (`LE` for client pricing, `JS` for job pricing). Global scope: not
    /// tied to an account or fiscal year.
    #[instrument(skip(self))]
    pub async fn group_code(&self, prefix: &str) -> Result<Option<String>, AppError> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "A prefix is required to generate a group code"
            )));
        }

        let scope = format!("group:{}", prefix);
        match self.db.next_sequence(&scope).await {
            Ok(sequence) => Ok(Some(format_group_code(prefix, sequence))),
            Err(err) => {
                NUMBERING_FAILURES_TOTAL.with_label_values(&["group"]).inc();
                warn!(
                    scope = %scope,
                    error = %err,
                    "Group code generation failed; proceeding without one"
                );
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn april_starts_the_new_fiscal_year() {
        assert_eq!(fiscal_year_pair(date(2025, 4, 10)), "2526");
        assert_eq!(fiscal_year_pair(date(2025, 4, 1)), "2526");
        assert_eq!(fiscal_year_pair(date(2025, 12, 31)), "2526");
    }

    #[test]
    fn january_through_march_belong_to_the_prior_fiscal_year() {
        assert_eq!(fiscal_year_pair(date(2025, 1, 15)), "2425");
        assert_eq!(fiscal_year_pair(date(2025, 3, 31)), "2425");
    }

    #[test]
    fn century_rollover_keeps_two_digits() {
        assert_eq!(fiscal_year_pair(date(2099, 6, 1)), "9900");
        assert_eq!(fiscal_year_pair(date(2100, 2, 1)), "9900");
    }

    #[test]
    fn draft_number_concatenates_scope_and_padded_sequence() {
        let scope = document_scope(DocumentKind::Draft, 2, "2526");
        assert_eq!(scope, "D22526");
        assert_eq!(format_document_number(&scope, 1), "D225260001");
        assert_eq!(format_document_number(&scope, 2), "D225260002");
        assert_eq!(format_document_number(&scope, 123), "D225260123");
    }

    #[test]
    fn proforma_scope_is_independent_of_draft_scope() {
        assert_eq!(document_scope(DocumentKind::Proforma, 2, "2526"), "P22526");
    }

    #[test]
    fn group_codes_use_five_digit_sequences() {
        assert_eq!(format_group_code("LE", 1), "LE00001");
        assert_eq!(format_group_code("JS", 42), "JS00042");
        assert_eq!(format_group_code("JS", 100000), "JS100000");
    }
}
