//! service-core: Shared infrastructure for the exim back-office services.
pub mod config;
pub mod error;
pub mod observability;
pub mod utils;

pub use serde;
pub use serde_json;
pub use tracing;
