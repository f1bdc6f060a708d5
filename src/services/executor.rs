//! Order lifecycle executor
//!
//! Drives every trade op from intent to settlement through five re-entrant
//! stages, each operating on its own status-filtered batch:
//!
//! 1. place buy        NEW_SIGNAL      -> BUY_IN_PROGRESS | SKIPPED_CIRCUIT | ERROR
//! 2. confirm buy      BUY_IN_PROGRESS -> BUY_FILLED
//! 3. place sell       BUY_FILLED      -> SELL_IN_PROGRESS
//! 4. confirm sell     SELL_IN_PROGRESS -> COMPLETED
//! 5. cancel stale     BUY_IN_PROGRESS -> CANCELED_TIMEOUT
//!
//! A stage returns what it decided; the cycle wrapper owns all persistence,
//! so "retry next cycle" is a value, not a skipped code path.

use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

use crate::adapters::{TelegramNotifier, TradeStore, TradeTask};
use crate::config::ExecutorConfig;
use crate::domain::{TradeStatus, TradeUpdate};
use crate::error::{MultitradeError, Result};
use crate::exchange::{CancelOutcome, ExchangeClient, OrderSide, PlaceOrderOutcome};
use crate::market::{quantize_price, quantize_quantity, PrecisionResolver};
use crate::risk::{CircuitBreaker, CircuitDecision};

/// What a stage decided for one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Move the record forward, applying the field updates
    Advance {
        status: TradeStatus,
        update: TradeUpdate,
    },
    /// Leave the record untouched; the next cycle re-attempts it
    Retry,
    /// Leave the record in place but record why this attempt went nowhere
    RetryWithNote { note: String },
    /// Terminal branch with a human-readable note
    Fail {
        status: TradeStatus,
        note: String,
    },
}

/// Stage 1: place the limit buy for a freshly queued signal.
///
/// The circuit breaker is evaluated before precision resolution so a skipped
/// entry costs no exchange traffic at all.
pub async fn attempt_buy_placement(
    exchange: &dyn ExchangeClient,
    resolver: &mut PrecisionResolver,
    locked: Decimal,
    task: &TradeTask,
) -> Result<StageOutcome> {
    let budget = task.budget();
    if budget <= Decimal::ZERO {
        return Ok(StageOutcome::Fail {
            status: TradeStatus::Error,
            note: "Budget is zero".to_string(),
        });
    }

    if CircuitBreaker::evaluate(locked, task.ceiling()) == CircuitDecision::Open {
        return Ok(StageOutcome::Fail {
            status: TradeStatus::SkippedCircuit,
            note: format!("Circuit breaker open: locked {} >= ceiling {}", locked, task.ceiling()),
        });
    }

    if task.op.entry_price <= Decimal::ZERO {
        return Ok(StageOutcome::Fail {
            status: TradeStatus::Error,
            note: "Invalid entry price".to_string(),
        });
    }

    let symbol = task.op.symbol();
    let Some(precision) = resolver.resolve(exchange, &symbol).await? else {
        // Market may appear after the next catalog sync
        return Ok(StageOutcome::Retry);
    };

    let price = quantize_price(task.op.entry_price, precision.price_decimals);
    let quantity = quantize_quantity(budget / task.op.entry_price, precision.qty_decimals);
    if price <= Decimal::ZERO || quantity <= Decimal::ZERO {
        return Ok(StageOutcome::Fail {
            status: TradeStatus::Error,
            note: "Quantity too small".to_string(),
        });
    }

    info!("Placing buy {} P:{} Q:{} (op {})", symbol, price, quantity, task.op.id);
    match exchange
        .place_order(&task.api_key, &symbol, OrderSide::Buy, price, quantity)
        .await?
    {
        PlaceOrderOutcome::Accepted { order_ref } => Ok(StageOutcome::Advance {
            status: TradeStatus::BuyInProgress,
            update: TradeUpdate {
                buy_order_id: Some(order_ref),
                invested_amount: Some(budget),
                ..TradeUpdate::none()
            },
        }),
        PlaceOrderOutcome::Rejected { message } => Ok(StageOutcome::Fail {
            status: TradeStatus::Error,
            note: format!("Buy rejected: {}", message),
        }),
    }
}

/// Stage 2: poll the resting buy; on fill, correct for a base-asset fee and
/// quantize the net quantity before it is ever used to size a sell.
pub async fn attempt_buy_confirmation(
    exchange: &dyn ExchangeClient,
    resolver: &mut PrecisionResolver,
    task: &TradeTask,
) -> Result<StageOutcome> {
    let order_ref = task.op.buy_order_id.as_deref().ok_or_else(|| {
        MultitradeError::Internal(format!("trade op {} has no buy order id", task.op.id))
    })?;

    let Some(query) = exchange.get_order(&task.api_key, order_ref).await? else {
        // Unknown to the exchange right now; the stale sweep bounds this
        return Ok(StageOutcome::Retry);
    };
    if !query.state.is_filled() {
        return Ok(StageOutcome::Retry);
    }

    // A fee charged in the asset being bought reduces what is actually
    // available to sell; a sell sized at the gross quantity would bounce
    // with insufficient balance
    let mut net = query.executed_quantity;
    if query.fee_asset.as_deref() == Some(task.op.asset.as_str()) {
        net -= query.fee;
    }

    let symbol = task.op.symbol();
    let Some(precision) = resolver.resolve(exchange, &symbol).await? else {
        return Ok(StageOutcome::Retry);
    };
    let net_quantity = quantize_quantity(net, precision.qty_decimals);

    info!(
        "Buy filled {} gross:{} net:{} (op {})",
        symbol, query.executed_quantity, net_quantity, task.op.id
    );
    Ok(StageOutcome::Advance {
        status: TradeStatus::BuyFilled,
        update: TradeUpdate {
            buy_quantity_executed: Some(net_quantity),
            ..TradeUpdate::none()
        },
    })
}

/// Stage 3: place the limit sell from the already-net, already-quantized
/// fill quantity. Funds are committed, so a rejection is never terminal;
/// the record stays in BUY_FILLED and is retried every cycle.
pub async fn attempt_sell_placement(
    exchange: &dyn ExchangeClient,
    resolver: &mut PrecisionResolver,
    task: &TradeTask,
) -> Result<StageOutcome> {
    let quantity = task.op.buy_quantity_executed.ok_or_else(|| {
        MultitradeError::Internal(format!("trade op {} has no executed quantity", task.op.id))
    })?;
    if quantity <= Decimal::ZERO {
        return Ok(StageOutcome::RetryWithNote {
            note: "Sell quantity is zero after fee correction".to_string(),
        });
    }

    let symbol = task.op.symbol();
    let Some(precision) = resolver.resolve(exchange, &symbol).await? else {
        return Ok(StageOutcome::Retry);
    };

    let price = quantize_price(task.op.exit_price, precision.price_decimals);
    if price <= Decimal::ZERO {
        return Ok(StageOutcome::RetryWithNote {
            note: "Exit price quantized to zero".to_string(),
        });
    }

    info!("Placing sell {} P:{} Q:{} (op {})", symbol, price, quantity, task.op.id);
    match exchange
        .place_order(&task.api_key, &symbol, OrderSide::Sell, price, quantity)
        .await?
    {
        PlaceOrderOutcome::Accepted { order_ref } => Ok(StageOutcome::Advance {
            status: TradeStatus::SellInProgress,
            update: TradeUpdate {
                sell_order_id: Some(order_ref),
                note: Some("Sell placed".to_string()),
                ..TradeUpdate::none()
            },
        }),
        PlaceOrderOutcome::Rejected { message } => Ok(StageOutcome::RetryWithNote {
            note: format!("Sell rejected: {}", message),
        }),
    }
}

/// Stage 4: poll the resting sell; on fill, record cumulative quote proceeds.
pub async fn attempt_sell_confirmation(
    exchange: &dyn ExchangeClient,
    task: &TradeTask,
) -> Result<StageOutcome> {
    let order_ref = task.op.sell_order_id.as_deref().ok_or_else(|| {
        MultitradeError::Internal(format!("trade op {} has no sell order id", task.op.id))
    })?;

    let Some(query) = exchange.get_order(&task.api_key, order_ref).await? else {
        return Ok(StageOutcome::Retry);
    };
    if !query.state.is_filled() {
        return Ok(StageOutcome::Retry);
    }

    info!(
        "Trade completed {} revenue:{} (op {})",
        task.op.symbol(),
        query.cumulative_quote_quantity,
        task.op.id
    );
    Ok(StageOutcome::Advance {
        status: TradeStatus::Completed,
        update: TradeUpdate {
            sell_revenue: Some(query.cumulative_quote_quantity),
            ..TradeUpdate::none()
        },
    })
}

/// Stage 5: cancel a buy that has rested past the timeout.
///
/// The record leaves BUY_IN_PROGRESS whatever the cancel call reports:
/// "not found" means it already filled or was already cancelled, and either
/// way it must not be polled forever.
pub async fn attempt_stale_cancel(
    exchange: &dyn ExchangeClient,
    task: &TradeTask,
) -> StageOutcome {
    let Some(order_ref) = task.op.buy_order_id.as_deref() else {
        return StageOutcome::Advance {
            status: TradeStatus::CanceledTimeout,
            update: TradeUpdate::with_note("Auto cancel: no order reference"),
        };
    };

    warn!("Order timeout on trade op {}; canceling {}", task.op.id, order_ref);
    let note = match exchange.cancel_order(&task.api_key, order_ref).await {
        Ok(CancelOutcome::Canceled) => "Auto cancel: stale buy".to_string(),
        Ok(CancelOutcome::NotFound) => "Auto cancel: order not found".to_string(),
        Ok(CancelOutcome::Failed(message)) => format!("Auto cancel failed: {}", message),
        Err(e) => format!("Auto cancel errored: {}", e),
    };

    StageOutcome::Advance {
        status: TradeStatus::CanceledTimeout,
        update: TradeUpdate::with_note(note),
    }
}

/// The executor loop: one instance drives all accounts' trade ops.
pub struct OrderLifecycleExecutor {
    store: TradeStore,
    exchange: Arc<dyn ExchangeClient>,
    notifier: Option<Arc<TelegramNotifier>>,
    resolver: PrecisionResolver,
    config: ExecutorConfig,
}

impl OrderLifecycleExecutor {
    pub fn new(
        store: TradeStore,
        exchange: Arc<dyn ExchangeClient>,
        notifier: Option<Arc<TelegramNotifier>>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            store,
            exchange,
            notifier,
            resolver: PrecisionResolver::new(),
            config,
        }
    }

    /// Run forever. Fatal only when the market catalog never loads.
    pub async fn run(mut self) -> Result<()> {
        self.resolver.ensure_loaded(self.exchange.as_ref()).await?;
        info!(
            "Order lifecycle executor started (interval: {}s, stale timeout: {}m)",
            self.config.poll_interval_secs, self.config.stale_order_minutes
        );

        let mut ticker = interval(Duration::from_secs(self.config.poll_interval_secs));
        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }

    /// One full pass over all five stages
    pub async fn run_cycle(&mut self) {
        self.resolver.begin_cycle();
        self.stage_place_buys().await;
        self.stage_confirm_buys().await;
        self.stage_place_sells().await;
        self.stage_confirm_sells().await;
        self.stage_cancel_stale().await;
    }

    async fn stage_place_buys(&mut self) {
        let tasks = match self.store.fetch_tasks(TradeStatus::NewSignal, true).await {
            Ok(tasks) => tasks,
            Err(e) => {
                error!("Buy placement: fetch failed: {}", e);
                return;
            }
        };

        for task in &tasks {
            let locked = match self
                .store
                .locked_amount(task.op.account_id, task.op.pair)
                .await
            {
                Ok(locked) => locked,
                Err(e) => {
                    error!("Buy placement: locked sum failed for op {}: {}", task.op.id, e);
                    continue;
                }
            };

            match attempt_buy_placement(self.exchange.as_ref(), &mut self.resolver, locked, task)
                .await
            {
                Ok(outcome) => self.apply(task, outcome).await,
                Err(e) => error!("Buy placement: op {} left for retry: {}", task.op.id, e),
            }
        }
    }

    async fn stage_confirm_buys(&mut self) {
        let tasks = match self.store.fetch_tasks(TradeStatus::BuyInProgress, false).await {
            Ok(tasks) => tasks,
            Err(e) => {
                error!("Buy confirmation: fetch failed: {}", e);
                return;
            }
        };

        for task in &tasks {
            match attempt_buy_confirmation(self.exchange.as_ref(), &mut self.resolver, task).await
            {
                Ok(outcome) => self.apply(task, outcome).await,
                Err(e) => error!("Buy confirmation: op {} left for retry: {}", task.op.id, e),
            }
        }
    }

    async fn stage_place_sells(&mut self) {
        let tasks = match self.store.fetch_tasks(TradeStatus::BuyFilled, false).await {
            Ok(tasks) => tasks,
            Err(e) => {
                error!("Sell placement: fetch failed: {}", e);
                return;
            }
        };

        for task in &tasks {
            match attempt_sell_placement(self.exchange.as_ref(), &mut self.resolver, task).await {
                Ok(outcome) => self.apply(task, outcome).await,
                Err(e) => error!("Sell placement: op {} left for retry: {}", task.op.id, e),
            }
        }
    }

    async fn stage_confirm_sells(&mut self) {
        let tasks = match self.store.fetch_tasks(TradeStatus::SellInProgress, false).await {
            Ok(tasks) => tasks,
            Err(e) => {
                error!("Sell confirmation: fetch failed: {}", e);
                return;
            }
        };

        for task in &tasks {
            match attempt_sell_confirmation(self.exchange.as_ref(), task).await {
                Ok(outcome) => self.apply(task, outcome).await,
                Err(e) => error!("Sell confirmation: op {} left for retry: {}", task.op.id, e),
            }
        }
    }

    async fn stage_cancel_stale(&mut self) {
        let tasks = match self
            .store
            .fetch_stale_tasks(TradeStatus::BuyInProgress, self.config.stale_order_minutes)
            .await
        {
            Ok(tasks) => tasks,
            Err(e) => {
                error!("Stale sweep: fetch failed: {}", e);
                return;
            }
        };

        for task in &tasks {
            let outcome = attempt_stale_cancel(self.exchange.as_ref(), task).await;
            self.apply(task, outcome).await;
        }
    }

    /// Persist a stage's decision and emit the matching notification
    async fn apply(&self, task: &TradeTask, outcome: StageOutcome) {
        match outcome {
            StageOutcome::Retry => {}
            StageOutcome::RetryWithNote { note } => {
                warn!("Trade op {}: {}", task.op.id, note);
                if let Err(e) = self.store.set_note(task.op.id, &note).await {
                    error!("Failed to record note on op {}: {}", task.op.id, e);
                }
            }
            StageOutcome::Fail { status, note } => {
                warn!("Trade op {} -> {}: {}", task.op.id, status, note);
                let update = TradeUpdate::with_note(note);
                match self
                    .store
                    .transition(task.op.id, task.op.status, status, &update)
                    .await
                {
                    Ok(_) => {}
                    Err(e) => error!("Failed to fail op {}: {}", task.op.id, e),
                }
            }
            StageOutcome::Advance { status, update } => {
                let moved = match self
                    .store
                    .transition(task.op.id, task.op.status, status, &update)
                    .await
                {
                    Ok(moved) => moved,
                    Err(e) => {
                        error!("Failed to advance op {}: {}", task.op.id, e);
                        return;
                    }
                };
                if moved {
                    self.notify(task, status, &update).await;
                }
            }
        }
    }

    async fn notify(&self, task: &TradeTask, status: TradeStatus, update: &TradeUpdate) {
        let (Some(notifier), Some(chat_id)) = (&self.notifier, task.owner_chat_id) else {
            return;
        };

        match status {
            TradeStatus::BuyFilled => {
                if let Some(quantity) = update.buy_quantity_executed {
                    notifier
                        .notify_buy_filled(chat_id, &task.op.asset, quantity)
                        .await;
                }
            }
            TradeStatus::SellInProgress => {
                notifier
                    .notify_sell_placed(chat_id, &task.op.asset, task.op.exit_price)
                    .await;
            }
            TradeStatus::Completed => {
                if let (Some(revenue), Some(invested)) =
                    (update.sell_revenue, task.op.invested_amount)
                {
                    notifier
                        .notify_trade_closed(chat_id, &task.op.asset, revenue, revenue - invested)
                        .await;
                }
            }
            _ => debug!("No notification for {} on op {}", status, task.op.id),
        }
    }
}
