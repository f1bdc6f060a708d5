pub mod distributor;
pub mod executor;

pub use distributor::{admission_check, DistributionStats, SignalDistributor, SkipReason};
pub use executor::{
    attempt_buy_confirmation, attempt_buy_placement, attempt_sell_confirmation,
    attempt_sell_placement, attempt_stale_cancel, OrderLifecycleExecutor, StageOutcome,
};
