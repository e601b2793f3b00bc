//! Tax rate model for billing-engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// GST percentages for one service accounting code (SAC).
///
/// Which of the three rates actually applies to an invoice is decided by the
/// charge rule's jurisdiction code, not here; the record always carries all
/// three so documents can print the full rate line.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaxRate {
    pub tax_rate_id: Uuid,
    pub sac_code: String,
    pub central_rate: Decimal,
    pub state_rate: Decimal,
    pub interstate_rate: Decimal,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

impl Default for TaxRate {
    fn default() -> Self {
        Self {
            tax_rate_id: Uuid::nil(),
            sac_code: String::new(),
            central_rate: Decimal::ZERO,
            state_rate: Decimal::ZERO,
            interstate_rate: Decimal::ZERO,
            active: true,
            created_utc: Utc::now(),
        }
    }
}
