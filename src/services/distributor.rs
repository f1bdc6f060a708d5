//! Signal distributor
//!
//! Polls the upstream signal pool and fans each signal out to every active
//! account that subscribes to it, creating one NEW_SIGNAL trade op per
//! surviving (signal, account) pairing. Admission is a pure decision;
//! dedup consults the store for an open trade on the same
//! (account, asset, pair, strategy) tuple. Dedup keys on strategy, so the
//! same asset from two different strategies is tracked independently.

use rust_decimal::Decimal;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

use crate::adapters::{SignalPool, TradeStore};
use crate::config::DistributorConfig;
use crate::domain::{Account, Signal, SubscriptionFilter};
use crate::error::Result;

/// Why an account was not given a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    StrategyNotAllowed,
    GradeNotAllowed,
    NoBudget,
}

/// Pure admission decision: subscription and budget filters only.
/// Dedup is a separate store lookup.
pub fn admission_check(account: &Account, signal: &Signal) -> std::result::Result<(), SkipReason> {
    if !account.allowed_strategies.allows(&signal.strategy) {
        return Err(SkipReason::StrategyNotAllowed);
    }

    match (&signal.grade, &account.allowed_grades) {
        (_, SubscriptionFilter::All) => {}
        (Some(grade), filter) if filter.allows(grade) => {}
        // Graded subscription never matches an ungraded or foreign-grade signal
        _ => return Err(SkipReason::GradeNotAllowed),
    }

    if account.budget_for(signal.pair) <= Decimal::ZERO {
        return Err(SkipReason::NoBudget);
    }

    Ok(())
}

/// Counters for one distribution cycle
#[derive(Debug, Clone, Copy, Default)]
pub struct DistributionStats {
    pub signals_seen: usize,
    pub queued: usize,
    pub skipped: usize,
}

/// The distribution loop
pub struct SignalDistributor {
    store: TradeStore,
    pool: SignalPool,
    config: DistributorConfig,
}

impl SignalDistributor {
    pub fn new(store: TradeStore, pool: SignalPool, config: DistributorConfig) -> Self {
        Self {
            store,
            pool,
            config,
        }
    }

    /// Run forever; cycle failures are logged and retried on the next tick
    pub async fn run(self) -> Result<()> {
        info!(
            "Signal distributor started (lookback: {}m, interval: {}s)",
            self.config.lookback_minutes, self.config.poll_interval_secs
        );

        let mut ticker = interval(Duration::from_secs(self.config.poll_interval_secs));
        loop {
            ticker.tick().await;
            match self.run_cycle().await {
                Ok(stats) if stats.queued > 0 => {
                    info!(
                        "Distribution cycle: {} signals, {} queued, {} skipped",
                        stats.signals_seen, stats.queued, stats.skipped
                    );
                }
                Ok(_) => {}
                Err(e) => error!("Distribution cycle failed: {}", e),
            }
        }
    }

    /// One pass over the lookback window
    pub async fn run_cycle(&self) -> Result<DistributionStats> {
        let mut stats = DistributionStats::default();

        let signals = self.pool.fetch_recent(self.config.lookback_minutes).await?;
        stats.signals_seen = signals.len();
        if signals.is_empty() {
            return Ok(stats);
        }

        let accounts = self.store.fetch_active_accounts().await?;
        if accounts.is_empty() {
            warn!("Signals found but no active accounts");
            return Ok(stats);
        }

        for signal in &signals {
            debug!(
                "Signal found: {}/{} ({})",
                signal.asset, signal.pair, signal.strategy
            );

            for account in &accounts {
                match self.consider(account, signal).await {
                    Ok(true) => stats.queued += 1,
                    Ok(false) => stats.skipped += 1,
                    // One bad pairing must not starve the rest of the batch
                    Err(e) => {
                        stats.skipped += 1;
                        error!(
                            "Failed to queue {}/{} for account {}: {}",
                            signal.asset, signal.pair, account.account_id, e
                        );
                    }
                }
            }
        }

        Ok(stats)
    }

    async fn consider(&self, account: &Account, signal: &Signal) -> Result<bool> {
        if let Err(reason) = admission_check(account, signal) {
            debug!(
                "Account {} skipped for {}/{}: {:?}",
                account.account_id, signal.asset, signal.pair, reason
            );
            return Ok(false);
        }

        // At most one open trade per (account, asset, pair, strategy)
        if self
            .store
            .has_open_trade(
                account.account_id,
                &signal.asset,
                signal.pair,
                &signal.strategy,
            )
            .await?
        {
            return Ok(false);
        }

        let op_id = self
            .store
            .insert_trade_op(account.account_id, signal)
            .await?;
        info!(
            "Queued {}/{} ({}) -> account {} (trade op {})",
            signal.asset, signal.pair, signal.strategy, account.account_id, op_id
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QuotePair;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn account() -> Account {
        Account {
            account_id: 1,
            account_name: "alice".to_string(),
            owner_chat_id: Some(10),
            api_key: "k".to_string(),
            is_active: true,
            budget_tmn: dec!(1000),
            budget_usdt: dec!(50),
            ceiling_tmn: dec!(5000),
            ceiling_usdt: dec!(0),
            allowed_strategies: SubscriptionFilter::All,
            allowed_grades: SubscriptionFilter::All,
            created_at: Utc::now(),
        }
    }

    fn signal() -> Signal {
        Signal {
            asset: "BTC".to_string(),
            pair: QuotePair::Tmn,
            entry_price: dec!(100),
            target_price: dec!(120),
            strategy: "G1".to_string(),
            grade: Some("Q1".to_string()),
            signal_time: Utc::now(),
        }
    }

    #[test]
    fn test_open_subscription_admits() {
        assert_eq!(admission_check(&account(), &signal()), Ok(()));
    }

    #[test]
    fn test_strategy_filter() {
        let mut acc = account();
        acc.allowed_strategies = SubscriptionFilter::parse("Internal,Arbitrage");
        assert_eq!(
            admission_check(&acc, &signal()),
            Err(SkipReason::StrategyNotAllowed)
        );

        acc.allowed_strategies = SubscriptionFilter::parse("G1");
        assert_eq!(admission_check(&acc, &signal()), Ok(()));
    }

    #[test]
    fn test_grade_filter() {
        let mut acc = account();
        acc.allowed_grades = SubscriptionFilter::parse("Q3,Q4");
        assert_eq!(
            admission_check(&acc, &signal()),
            Err(SkipReason::GradeNotAllowed)
        );

        acc.allowed_grades = SubscriptionFilter::parse("Q1");
        assert_eq!(admission_check(&acc, &signal()), Ok(()));
    }

    #[test]
    fn test_ungraded_signal_needs_open_grade_subscription() {
        let mut sig = signal();
        sig.grade = None;

        assert_eq!(admission_check(&account(), &sig), Ok(()));

        let mut acc = account();
        acc.allowed_grades = SubscriptionFilter::parse("Q1");
        assert_eq!(admission_check(&acc, &sig), Err(SkipReason::GradeNotAllowed));
    }

    #[test]
    fn test_budget_filter_per_pair() {
        let mut acc = account();
        acc.budget_tmn = dec!(0);
        assert_eq!(admission_check(&acc, &signal()), Err(SkipReason::NoBudget));

        // The USDT budget is independent of the TMN one
        let mut usdt_signal = signal();
        usdt_signal.pair = QuotePair::Usdt;
        assert_eq!(admission_check(&acc, &usdt_signal), Ok(()));
    }
}
