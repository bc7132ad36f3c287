//! API middleware components

pub mod logging;
pub mod metrics;

pub use logging::{correlation_token, logging_middleware, truncate_for_log, REQUEST_ID_HEADER};
pub use metrics::metrics_middleware;
