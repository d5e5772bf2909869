//! HTTP module
//!
//! Request execution against the Optiply API: bearer auth, response
//! classification, bounded retries, and optional client-side throttling.

mod client;
mod rate_limit;
mod retry;

pub use client::{
    HttpClientConfig, HttpClientConfigBuilder, HttpExecutor, ParsedResponse, RequestConfig,
};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use retry::{classify_status, Budget, RetryPolicy, RetryState, StatusClass};
