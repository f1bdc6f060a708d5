pub mod postgres;
pub mod signal_pool;
pub mod telegram;
pub mod wallex_rest;

pub use postgres::{NewAccount, TradeStore, TradeTask};
pub use signal_pool::SignalPool;
pub use telegram::TelegramNotifier;
pub use wallex_rest::WallexClient;
