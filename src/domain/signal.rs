use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::QuotePair;

/// A trading opportunity produced by the upstream signal pipeline.
///
/// Read-only to this system; identity for dedup purposes is
/// (asset, pair, strategy) per subscriber account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub asset: String,
    pub pair: QuotePair,
    pub entry_price: Decimal,
    pub target_price: Decimal,
    pub strategy: String,
    pub grade: Option<String>,
    pub signal_time: DateTime<Utc>,
}

impl Signal {
    /// Exchange symbol for this signal, e.g. "BTCTMN"
    pub fn symbol(&self) -> String {
        format!("{}{}", self.asset, self.pair.as_str())
    }
}
