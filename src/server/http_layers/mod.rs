mod correlation;
mod requests_logging;

pub use correlation::propagate_correlation_id;
pub use requests_logging::{log_requests, RequestsLoggingLevel};
