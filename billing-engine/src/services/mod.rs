//! Services module for billing-engine.

pub mod calculation;
pub mod database;
pub mod invoice;
pub mod metrics;
pub mod numbering;

pub use calculation::{aggregate, charges_for_job, compute_tax, FieldBindings, JobBillingInput};
pub use database::Database;
pub use invoice::InvoiceService;
pub use metrics::{get_metrics, init_metrics};
pub use numbering::{
    document_scope, fiscal_year_pair, format_document_number, format_group_code, DocumentKind,
    NumberingService,
};
