//! Response classification and retry budgets
//!
//! Two independent budgets are tracked per logical request: one for general
//! transient failures (408/502/503, network timeouts, refused connections)
//! and a smaller one for 504 Gateway Timeout, which is expensive to repeat.
//! Each budget has its own doubling delay sequence.

use reqwest::StatusCode;
use std::time::Duration;

/// Outcome class of an HTTP status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 2xx
    Success,
    /// 401, the bearer token was rejected
    AuthExpired,
    /// 429
    RateLimited,
    /// 504
    GatewayTimeout,
    /// 408, 502, 503
    Transient,
    /// 403, 404 and other 4xx
    ClientError,
    /// 500 and everything else
    Fatal,
}

impl StatusClass {
    /// Whether a retry budget applies to this class
    pub fn is_transient(self) -> bool {
        matches!(self, Self::GatewayTimeout | Self::Transient)
    }
}

/// Classify an HTTP status code
pub fn classify_status(status: StatusCode) -> StatusClass {
    match status.as_u16() {
        200..=299 => StatusClass::Success,
        401 => StatusClass::AuthExpired,
        429 => StatusClass::RateLimited,
        504 => StatusClass::GatewayTimeout,
        408 | 502 | 503 => StatusClass::Transient,
        400..=499 => StatusClass::ClientError,
        _ => StatusClass::Fatal,
    }
}

/// Retry limits and backoff for the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed for 408/502/503 and network-level failures
    pub max_retries: u32,
    /// Retries allowed for 504 Gateway Timeout
    pub max_gateway_timeout_retries: u32,
    /// Retries allowed for 429; zero makes 429 fatal
    pub rate_limit_retries: u32,
    /// First delay of each budget's sequence
    pub initial_backoff: Duration,
    /// Upper bound for any single delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_gateway_timeout_retries: 2,
            rate_limit_retries: 0,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            max_gateway_timeout_retries: 0,
            rate_limit_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before the `n`-th retry of one budget (1-based): `initial * 2^(n-1)`
    pub fn delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let factor = 2u32.saturating_pow(exponent);
        std::cmp::min(
            self.initial_backoff.saturating_mul(factor),
            self.max_backoff,
        )
    }

    /// Delay for a 429, honoring `Retry-After` but never exceeding `max_backoff`
    pub fn rate_limit_delay(&self, retry_after_seconds: u64) -> Duration {
        std::cmp::min(Duration::from_secs(retry_after_seconds), self.max_backoff)
    }
}

/// Which budget a failure is charged to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    /// 408/502/503, timeouts, connection failures
    General,
    /// 504
    GatewayTimeout,
    /// 429
    RateLimit,
}

/// Per-request retry bookkeeping
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    general: u32,
    gateway_timeouts: u32,
    rate_limited: u32,
}

impl RetryState {
    /// Fresh counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Charge a failure to `budget`. Returns the delay to wait before retrying,
    /// or `None` when that budget is exhausted.
    pub fn charge(&mut self, budget: Budget, policy: &RetryPolicy) -> Option<Duration> {
        let (count, limit) = match budget {
            Budget::General => (&mut self.general, policy.max_retries),
            Budget::GatewayTimeout => (
                &mut self.gateway_timeouts,
                policy.max_gateway_timeout_retries,
            ),
            Budget::RateLimit => (&mut self.rate_limited, policy.rate_limit_retries),
        };
        *count += 1;
        if *count > limit {
            return None;
        }
        Some(policy.delay(*count))
    }

    /// Attempts made so far against `budget`
    pub fn attempts(&self, budget: Budget) -> u32 {
        match budget {
            Budget::General => self.general,
            Budget::GatewayTimeout => self.gateway_timeouts,
            Budget::RateLimit => self.rate_limited,
        }
    }

    /// Total retries granted across every budget
    pub fn retries(&self, policy: &RetryPolicy) -> u32 {
        self.general.min(policy.max_retries)
            + self
                .gateway_timeouts
                .min(policy.max_gateway_timeout_retries)
            + self.rate_limited.min(policy.rate_limit_retries)
    }
}

#[cfg(test)]
mod retry_tests {
    use super::*;
    use test_case::test_case;

    #[test_case(200, StatusClass::Success ; "ok")]
    #[test_case(204, StatusClass::Success ; "no content")]
    #[test_case(401, StatusClass::AuthExpired ; "unauthorized")]
    #[test_case(429, StatusClass::RateLimited ; "too many requests")]
    #[test_case(504, StatusClass::GatewayTimeout ; "gateway timeout")]
    #[test_case(408, StatusClass::Transient ; "request timeout")]
    #[test_case(502, StatusClass::Transient ; "bad gateway")]
    #[test_case(503, StatusClass::Transient ; "unavailable")]
    #[test_case(403, StatusClass::ClientError ; "forbidden")]
    #[test_case(404, StatusClass::ClientError ; "not found")]
    #[test_case(500, StatusClass::Fatal ; "internal error")]
    #[test_case(301, StatusClass::Fatal ; "redirect")]
    fn test_classify_status(code: u16, expected: StatusClass) {
        let status = StatusCode::from_u16(code).unwrap();
        assert_eq!(classify_status(status), expected);
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
        assert_eq!(policy.delay(4), Duration::from_secs(5));
        assert_eq!(policy.delay(40), Duration::from_secs(5));
    }

    #[test]
    fn test_budgets_are_independent() {
        let policy = RetryPolicy::default();
        let mut state = RetryState::new();

        assert_eq!(
            state.charge(Budget::GatewayTimeout, &policy),
            Some(Duration::from_secs(1))
        );
        assert_eq!(
            state.charge(Budget::GatewayTimeout, &policy),
            Some(Duration::from_secs(2))
        );
        assert_eq!(state.charge(Budget::GatewayTimeout, &policy), None);

        // The general budget starts its own sequence from the initial delay
        assert_eq!(
            state.charge(Budget::General, &policy),
            Some(Duration::from_secs(1))
        );
        assert_eq!(state.attempts(Budget::GatewayTimeout), 3);
        assert_eq!(state.attempts(Budget::General), 1);
        assert_eq!(state.retries(&policy), 3);
    }

    #[test]
    fn test_rate_limit_budget_defaults_to_fatal() {
        let policy = RetryPolicy::default();
        let mut state = RetryState::new();
        assert_eq!(state.charge(Budget::RateLimit, &policy), None);
    }

    #[test]
    fn test_rate_limit_delay_is_capped() {
        let policy = RetryPolicy {
            max_backoff: Duration::from_secs(10),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.rate_limit_delay(3), Duration::from_secs(3));
        assert_eq!(policy.rate_limit_delay(600), Duration::from_secs(10));
    }

    #[test]
    fn test_no_retry_policy() {
        let policy = RetryPolicy::no_retry();
        let mut state = RetryState::new();
        assert_eq!(state.charge(Budget::General, &policy), None);
        assert_eq!(state.charge(Budget::GatewayTimeout, &policy), None);
        assert!(StatusClass::Transient.is_transient());
        assert!(!StatusClass::ClientError.is_transient());
    }
}
