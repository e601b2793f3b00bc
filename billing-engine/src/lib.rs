//! billing-engine: invoice financial computation and document numbering for
//! the exim back office.
//!
//! The engine is an in-process library. Route handlers and the PDF renderer
//! call [`services::InvoiceService`] for breakdowns and invoice lifecycle,
//! and [`services::NumberingService`] for document identifiers; persistence
//! goes through [`services::Database`] (PostgreSQL via sqlx).

pub mod config;
pub mod models;
pub mod services;
