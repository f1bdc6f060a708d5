use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeStatus {
    /// Queued by the distributor, no order placed yet
    NewSignal,
    /// Limit buy resting on the exchange, waiting for fill
    BuyInProgress,
    /// Buy filled, net quantity recorded, sell not yet placed
    BuyFilled,
    /// Limit sell resting on the exchange, waiting for fill
    SellInProgress,
    /// Sell filled, revenue recorded (terminal)
    Completed,
    /// Rejected by the circuit breaker before any order (terminal)
    SkippedCircuit,
    /// Validation or buy-time rejection before capital committed (terminal)
    Error,
    /// Stale buy cancelled by the timeout sweep (terminal)
    CanceledTimeout,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::NewSignal => "NEW_SIGNAL",
            TradeStatus::BuyInProgress => "BUY_IN_PROGRESS",
            TradeStatus::BuyFilled => "BUY_FILLED",
            TradeStatus::SellInProgress => "SELL_IN_PROGRESS",
            TradeStatus::Completed => "COMPLETED",
            TradeStatus::SkippedCircuit => "SKIPPED_CIRCUIT",
            TradeStatus::Error => "ERROR",
            TradeStatus::CanceledTimeout => "CANCELED_TIMEOUT",
        }
    }

    /// Check if this state can transition to another state
    pub fn can_transition_to(&self, target: TradeStatus) -> bool {
        use TradeStatus::*;

        match (self, target) {
            // From NewSignal
            (NewSignal, BuyInProgress) => true,  // Buy accepted
            (NewSignal, SkippedCircuit) => true, // Circuit breaker open
            (NewSignal, Error) => true,          // Validation / buy rejection

            // From BuyInProgress
            (BuyInProgress, BuyFilled) => true,       // Fill confirmed
            (BuyInProgress, CanceledTimeout) => true, // Stale sweep

            // From BuyFilled
            (BuyFilled, SellInProgress) => true, // Sell accepted

            // From SellInProgress
            (SellInProgress, Completed) => true, // Fill confirmed

            // All other transitions are invalid
            _ => false,
        }
    }

    /// Get valid next states from current state
    pub fn valid_transitions(&self) -> Vec<TradeStatus> {
        use TradeStatus::*;

        match self {
            NewSignal => vec![BuyInProgress, SkippedCircuit, Error],
            BuyInProgress => vec![BuyFilled, CanceledTimeout],
            BuyFilled => vec![SellInProgress],
            SellInProgress => vec![Completed],
            Completed | SkippedCircuit | Error | CanceledTimeout => vec![],
        }
    }

    /// Is this a terminal state?
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TradeStatus::Completed
                | TradeStatus::SkippedCircuit
                | TradeStatus::Error
                | TradeStatus::CanceledTimeout
        )
    }

    /// States counted as open by dedup and the circuit breaker
    pub fn non_terminal() -> &'static [TradeStatus] {
        &[
            TradeStatus::NewSignal,
            TradeStatus::BuyInProgress,
            TradeStatus::BuyFilled,
            TradeStatus::SellInProgress,
        ]
    }

    /// Does this state have a resting order on the exchange?
    pub fn has_open_order(&self) -> bool {
        matches!(self, TradeStatus::BuyInProgress | TradeStatus::SellInProgress)
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for TradeStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, String> {
        match s.to_uppercase().as_str() {
            "NEW_SIGNAL" => Ok(TradeStatus::NewSignal),
            "BUY_IN_PROGRESS" => Ok(TradeStatus::BuyInProgress),
            "BUY_FILLED" => Ok(TradeStatus::BuyFilled),
            "SELL_IN_PROGRESS" => Ok(TradeStatus::SellInProgress),
            "COMPLETED" => Ok(TradeStatus::Completed),
            "SKIPPED_CIRCUIT" => Ok(TradeStatus::SkippedCircuit),
            "ERROR" => Ok(TradeStatus::Error),
            "CANCELED_TIMEOUT" => Ok(TradeStatus::CanceledTimeout),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        use TradeStatus::*;

        assert!(NewSignal.can_transition_to(BuyInProgress));
        assert!(NewSignal.can_transition_to(SkippedCircuit));
        assert!(NewSignal.can_transition_to(Error));
        assert!(BuyInProgress.can_transition_to(BuyFilled));
        assert!(BuyInProgress.can_transition_to(CanceledTimeout));
        assert!(BuyFilled.can_transition_to(SellInProgress));
        assert!(SellInProgress.can_transition_to(Completed));
    }

    #[test]
    fn test_invalid_transitions() {
        use TradeStatus::*;

        // No backward or skipping moves
        assert!(!NewSignal.can_transition_to(BuyFilled));
        assert!(!NewSignal.can_transition_to(Completed));
        assert!(!BuyInProgress.can_transition_to(NewSignal));
        assert!(!BuyInProgress.can_transition_to(SellInProgress));
        assert!(!BuyInProgress.can_transition_to(Error));
        assert!(!BuyFilled.can_transition_to(Error));
        assert!(!BuyFilled.can_transition_to(CanceledTimeout));
        assert!(!BuyFilled.can_transition_to(Completed));
        assert!(!SellInProgress.can_transition_to(BuyFilled));
        assert!(!SellInProgress.can_transition_to(CanceledTimeout));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        use TradeStatus::*;

        for terminal in [Completed, SkippedCircuit, Error, CanceledTimeout] {
            assert!(terminal.is_terminal());
            assert!(terminal.valid_transitions().is_empty());
            for target in [
                NewSignal,
                BuyInProgress,
                BuyFilled,
                SellInProgress,
                Completed,
                SkippedCircuit,
                Error,
                CanceledTimeout,
            ] {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }

    #[test]
    fn test_every_non_terminal_reachable_from_documented_predecessor() {
        use TradeStatus::*;

        // BuyInProgress only from NewSignal
        let all = [
            NewSignal,
            BuyInProgress,
            BuyFilled,
            SellInProgress,
            Completed,
            SkippedCircuit,
            Error,
            CanceledTimeout,
        ];
        let predecessors = |target: TradeStatus| {
            all.iter()
                .copied()
                .filter(|s| s.can_transition_to(target))
                .collect::<Vec<_>>()
        };

        assert_eq!(predecessors(BuyInProgress), vec![NewSignal]);
        assert_eq!(predecessors(BuyFilled), vec![BuyInProgress]);
        assert_eq!(predecessors(SellInProgress), vec![BuyFilled]);
        assert_eq!(predecessors(Completed), vec![SellInProgress]);
        assert_eq!(predecessors(SkippedCircuit), vec![NewSignal]);
        assert_eq!(predecessors(Error), vec![NewSignal]);
        assert_eq!(predecessors(CanceledTimeout), vec![BuyInProgress]);
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(
            TradeStatus::try_from("NEW_SIGNAL").unwrap(),
            TradeStatus::NewSignal
        );
        assert_eq!(
            TradeStatus::try_from("buy_filled").unwrap(),
            TradeStatus::BuyFilled
        );
        assert!(TradeStatus::try_from("INVALID").is_err());
    }

    #[test]
    fn test_non_terminal_set() {
        for status in TradeStatus::non_terminal() {
            assert!(!status.is_terminal());
        }
        assert_eq!(TradeStatus::non_terminal().len(), 4);
    }
}
