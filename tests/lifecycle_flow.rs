//! End-to-end walk of one trade op through the five executor stages,
//! against a scripted exchange stub.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Mutex;

use multitrade::adapters::TradeTask;
use multitrade::domain::{
    MarketEntry, MarketPrecision, QuotePair, TradeOp, TradeStatus, TradeUpdate,
};
use multitrade::error::Result;
use multitrade::exchange::{
    CancelOutcome, ExchangeClient, OrderQuery, OrderSide, OrderState, PlaceOrderOutcome,
};
use multitrade::market::PrecisionResolver;
use multitrade::services::{
    attempt_buy_confirmation, attempt_buy_placement, attempt_sell_confirmation,
    attempt_sell_placement, StageOutcome,
};

/// Deterministic exchange: accepts every order, reports a fill with a
/// base-asset fee for the buy and full proceeds for the sell.
struct StubExchange {
    placed: Mutex<Vec<(String, OrderSide, Decimal, Decimal)>>,
}

impl StubExchange {
    fn new() -> Self {
        Self {
            placed: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ExchangeClient for StubExchange {
    async fn place_order(
        &self,
        _api_key: &str,
        symbol: &str,
        side: OrderSide,
        price: Decimal,
        quantity: Decimal,
    ) -> Result<PlaceOrderOutcome> {
        let mut placed = self.placed.lock().unwrap();
        placed.push((symbol.to_string(), side, price, quantity));
        let order_ref = format!("ord-{}", placed.len());
        Ok(PlaceOrderOutcome::Accepted { order_ref })
    }

    async fn get_order(&self, _api_key: &str, order_ref: &str) -> Result<Option<OrderQuery>> {
        Ok(Some(match order_ref {
            "ord-1" => OrderQuery {
                state: OrderState::Filled,
                executed_quantity: dec!(10.0),
                cumulative_quote_quantity: dec!(1000),
                fee: dec!(0.01),
                fee_asset: Some("BTC".to_string()),
            },
            _ => OrderQuery {
                state: OrderState::Filled,
                executed_quantity: dec!(9.99),
                cumulative_quote_quantity: dec!(1198.8),
                fee: dec!(0),
                fee_asset: None,
            },
        }))
    }

    async fn cancel_order(&self, _api_key: &str, _order_ref: &str) -> Result<CancelOutcome> {
        Ok(CancelOutcome::Canceled)
    }

    async fn fetch_market_catalog(&self) -> Result<Vec<MarketEntry>> {
        Ok(vec![MarketEntry {
            symbol: "BTCTMN".to_string(),
            precision: MarketPrecision {
                qty_decimals: 4,
                price_decimals: 0,
            },
        }])
    }

    async fn validate_api_key(&self, _api_key: &str) -> Result<bool> {
        Ok(true)
    }
}

fn new_task() -> TradeTask {
    TradeTask {
        op: TradeOp {
            id: 1,
            account_id: 1,
            asset: "BTC".to_string(),
            pair: QuotePair::Tmn,
            entry_price: dec!(100),
            exit_price: dec!(120),
            strategy: "G1".to_string(),
            status: TradeStatus::NewSignal,
            invested_amount: None,
            buy_order_id: None,
            buy_quantity_executed: None,
            sell_order_id: None,
            sell_revenue: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        },
        api_key: "key".to_string(),
        owner_chat_id: None,
        budget_tmn: dec!(1000),
        budget_usdt: dec!(0),
        ceiling_tmn: dec!(0),
        ceiling_usdt: dec!(0),
    }
}

/// Mimic what the executor's apply step persists between stages
fn apply(task: &mut TradeTask, status: TradeStatus, update: TradeUpdate) {
    assert!(
        task.op.status.can_transition_to(status),
        "stage produced an undocumented transition {} -> {}",
        task.op.status,
        status
    );
    task.op.status = status;
    if update.invested_amount.is_some() {
        task.op.invested_amount = update.invested_amount;
    }
    if update.buy_order_id.is_some() {
        task.op.buy_order_id = update.buy_order_id;
    }
    if update.buy_quantity_executed.is_some() {
        task.op.buy_quantity_executed = update.buy_quantity_executed;
    }
    if update.sell_order_id.is_some() {
        task.op.sell_order_id = update.sell_order_id;
    }
    if update.sell_revenue.is_some() {
        task.op.sell_revenue = update.sell_revenue;
    }
}

#[tokio::test]
async fn trade_reaches_settlement_through_all_stages() {
    let exchange = StubExchange::new();
    let mut resolver = PrecisionResolver::new();
    resolver.ensure_loaded(&exchange).await.unwrap();

    let mut task = new_task();

    // Stage 1: budget 1000 / entry 100 -> 10.0000 at integer price
    resolver.begin_cycle();
    let outcome = attempt_buy_placement(&exchange, &mut resolver, dec!(0), &task)
        .await
        .unwrap();
    let StageOutcome::Advance { status, update } = outcome else {
        panic!("buy placement did not advance");
    };
    assert_eq!(status, TradeStatus::BuyInProgress);
    assert_eq!(update.invested_amount, Some(dec!(1000)));
    apply(&mut task, status, update);

    {
        let placed = exchange.placed.lock().unwrap();
        assert_eq!(placed.len(), 1);
        let (symbol, side, price, quantity) = &placed[0];
        assert_eq!(symbol, "BTCTMN");
        assert_eq!(*side, OrderSide::Buy);
        assert_eq!(*price, dec!(100));
        assert_eq!(*quantity, dec!(10.0000));
    }

    // Stage 2: 10.0 gross minus 0.01 BTC fee -> 9.9900 net
    resolver.begin_cycle();
    let outcome = attempt_buy_confirmation(&exchange, &mut resolver, &task)
        .await
        .unwrap();
    let StageOutcome::Advance { status, update } = outcome else {
        panic!("buy confirmation did not advance");
    };
    assert_eq!(status, TradeStatus::BuyFilled);
    assert_eq!(update.buy_quantity_executed, Some(dec!(9.9900)));
    apply(&mut task, status, update);

    // Stage 3: sell the net quantity at the quantized target
    resolver.begin_cycle();
    let outcome = attempt_sell_placement(&exchange, &mut resolver, &task)
        .await
        .unwrap();
    let StageOutcome::Advance { status, update } = outcome else {
        panic!("sell placement did not advance");
    };
    assert_eq!(status, TradeStatus::SellInProgress);
    apply(&mut task, status, update);

    {
        let placed = exchange.placed.lock().unwrap();
        assert_eq!(placed.len(), 2);
        let (_, side, price, quantity) = &placed[1];
        assert_eq!(*side, OrderSide::Sell);
        assert_eq!(*price, dec!(120));
        assert_eq!(*quantity, dec!(9.9900));
    }

    // Stage 4: settlement with proceeds
    let outcome = attempt_sell_confirmation(&exchange, &task).await.unwrap();
    let StageOutcome::Advance { status, update } = outcome else {
        panic!("sell confirmation did not advance");
    };
    assert_eq!(status, TradeStatus::Completed);
    assert_eq!(update.sell_revenue, Some(dec!(1198.8)));
    apply(&mut task, status, update);

    assert!(task.op.status.is_terminal());
    assert_eq!(task.op.realized_profit(), Some(dec!(198.8)));
}
