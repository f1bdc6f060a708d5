use serde::{Deserialize, Serialize};

/// Exchange-mandated decimal precision for one trading symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketPrecision {
    pub qty_decimals: u32,
    pub price_decimals: u32,
}

/// One row of the exchange market catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketEntry {
    pub symbol: String,
    pub precision: MarketPrecision,
}
