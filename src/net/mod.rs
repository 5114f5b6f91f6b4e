//! The resilient request layer: timeouts, bounded retry and response
//! normalization shared by every provider.

pub mod request;
pub mod retry;

pub use request::{DEFAULT_TIMEOUT, RequestOptions, handle_response, request, request_with_retry};
pub use retry::{RetryPolicy, execute_with_retry};
