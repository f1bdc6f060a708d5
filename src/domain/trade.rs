use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{QuotePair, TradeStatus};

/// One per-account execution attempt derived from a signal.
///
/// Created by the distributor in `NewSignal`; exclusively mutated by the
/// executor thereafter. For a given (account, asset, pair, strategy) tuple at
/// most one row is in a non-terminal status at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOp {
    pub id: i64,
    pub account_id: i64,
    pub asset: String,
    pub pair: QuotePair,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub strategy: String,
    pub status: TradeStatus,
    /// Quote amount committed at buy placement (the account budget)
    pub invested_amount: Option<Decimal>,
    pub buy_order_id: Option<String>,
    /// Net, fee-corrected, quantized quantity available to sell
    pub buy_quantity_executed: Option<Decimal>,
    pub sell_order_id: Option<String>,
    /// Cumulative quote proceeds of the filled sell
    pub sell_revenue: Option<Decimal>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TradeOp {
    /// Exchange symbol for this trade, e.g. "BTCTMN"
    pub fn symbol(&self) -> String {
        format!("{}{}", self.asset, self.pair.as_str())
    }

    /// Realized profit once revenue is known
    pub fn realized_profit(&self) -> Option<Decimal> {
        match (self.sell_revenue, self.invested_amount) {
            (Some(revenue), Some(invested)) => Some(revenue - invested),
            _ => None,
        }
    }
}

/// Field updates carried by a stage transition.
///
/// `None` leaves the stored value untouched; only the fields a stage
/// actually learned are set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradeUpdate {
    pub invested_amount: Option<Decimal>,
    pub buy_order_id: Option<String>,
    pub buy_quantity_executed: Option<Decimal>,
    pub sell_order_id: Option<String>,
    pub sell_revenue: Option<Decimal>,
    pub note: Option<String>,
}

impl TradeUpdate {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_note(note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_trade() -> TradeOp {
        TradeOp {
            id: 1,
            account_id: 7,
            asset: "BTC".to_string(),
            pair: QuotePair::Tmn,
            entry_price: dec!(100),
            exit_price: dec!(120),
            strategy: "G1".to_string(),
            status: TradeStatus::Completed,
            invested_amount: Some(dec!(1000)),
            buy_order_id: Some("ord-1".to_string()),
            buy_quantity_executed: Some(dec!(9.99)),
            sell_order_id: Some("ord-2".to_string()),
            sell_revenue: Some(dec!(1198.8)),
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_symbol() {
        assert_eq!(sample_trade().symbol(), "BTCTMN");
    }

    #[test]
    fn test_realized_profit() {
        let trade = sample_trade();
        assert_eq!(trade.realized_profit(), Some(dec!(198.8)));

        let mut open = trade.clone();
        open.sell_revenue = None;
        assert_eq!(open.realized_profit(), None);
    }
}
