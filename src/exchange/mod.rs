mod traits;

pub use traits::{
    CancelOutcome, ExchangeClient, OrderQuery, OrderSide, OrderState, PlaceOrderOutcome,
};

#[cfg(test)]
pub use traits::MockExchangeClient;
