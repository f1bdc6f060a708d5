use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::MarketEntry;
use crate::error::Result;

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Exchange-side state of a resting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    /// Fully executed
    Filled,
    /// Resting or partially executed
    Open,
    /// Cancelled on the exchange
    Canceled,
    /// Anything the exchange reports that we do not model
    Unknown,
}

impl OrderState {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "FILLED" => OrderState::Filled,
            "NEW" | "OPEN" | "PARTIALLY_FILLED" => OrderState::Open,
            "CANCELED" | "CANCELLED" => OrderState::Canceled,
            _ => OrderState::Unknown,
        }
    }

    pub fn is_filled(&self) -> bool {
        matches!(self, OrderState::Filled)
    }
}

/// Result of submitting a limit order.
///
/// Transport failures are `Err` at the call site; a `Rejected` value means the
/// exchange answered and refused the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceOrderOutcome {
    Accepted { order_ref: String },
    Rejected { message: String },
}

/// Result of a cancel request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    Canceled,
    /// Unknown to the exchange: already filled or already cancelled
    NotFound,
    Failed(String),
}

/// Snapshot of one order as reported by the exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderQuery {
    pub state: OrderState,
    pub executed_quantity: Decimal,
    /// Cumulative quote proceeds (revenue for a sell, spend for a buy)
    pub cumulative_quote_quantity: Decimal,
    pub fee: Decimal,
    /// Asset the fee was charged in, when the exchange reports one
    pub fee_asset: Option<String>,
}

/// Exchange seam used by the executor, distributor and CLI.
///
/// Every call is authenticated with the per-account API key; the client itself
/// holds no credentials.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn place_order(
        &self,
        api_key: &str,
        symbol: &str,
        side: OrderSide,
        price: Decimal,
        quantity: Decimal,
    ) -> Result<PlaceOrderOutcome>;

    /// `None` when the order reference is unknown to the exchange
    async fn get_order(&self, api_key: &str, order_ref: &str) -> Result<Option<OrderQuery>>;

    async fn cancel_order(&self, api_key: &str, order_ref: &str) -> Result<CancelOutcome>;

    async fn fetch_market_catalog(&self) -> Result<Vec<MarketEntry>>;

    async fn validate_api_key(&self, api_key: &str) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_state_parse() {
        assert_eq!(OrderState::parse("FILLED"), OrderState::Filled);
        assert_eq!(OrderState::parse("filled"), OrderState::Filled);
        assert_eq!(OrderState::parse("NEW"), OrderState::Open);
        assert_eq!(OrderState::parse("PARTIALLY_FILLED"), OrderState::Open);
        assert_eq!(OrderState::parse("CANCELED"), OrderState::Canceled);
        assert_eq!(OrderState::parse("weird"), OrderState::Unknown);
    }

    #[test]
    fn test_order_side_display() {
        assert_eq!(OrderSide::Buy.to_string(), "BUY");
        assert_eq!(OrderSide::Sell.to_string(), "SELL");
    }
}
