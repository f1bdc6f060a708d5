//! Per-account, per-pair cap on simultaneously committed capital.

use rust_decimal::Decimal;

/// Outcome of a circuit breaker evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitDecision {
    /// Capital headroom remains; the entry may proceed
    Clear,
    /// Locked capital has reached the ceiling; skip the entry
    Open,
}

/// Evaluates whether an account may commit more capital to a quote pair.
///
/// `locked` is the sum of invested amounts over the account+pair's
/// non-terminal trade ops. A ceiling of zero or less disables the breaker
/// entirely, matching an account configured without a risk cap.
pub struct CircuitBreaker;

impl CircuitBreaker {
    pub fn evaluate(locked: Decimal, ceiling: Decimal) -> CircuitDecision {
        if ceiling <= Decimal::ZERO {
            return CircuitDecision::Clear;
        }
        if locked >= ceiling {
            CircuitDecision::Open
        } else {
            CircuitDecision::Clear
        }
    }
}
