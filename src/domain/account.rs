use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quote currency a trade is denominated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QuotePair {
    /// Toman-pegged quote
    Tmn,
    /// Tether quote
    Usdt,
}

impl QuotePair {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotePair::Tmn => "TMN",
            QuotePair::Usdt => "USDT",
        }
    }
}

impl fmt::Display for QuotePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for QuotePair {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, String> {
        match s.trim().to_uppercase().as_str() {
            "TMN" => Ok(QuotePair::Tmn),
            "USDT" => Ok(QuotePair::Usdt),
            _ => Err(format!("Unknown quote pair: {}", s)),
        }
    }
}

/// Which strategy or grade tags an account subscribes to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionFilter {
    /// Accept every tag
    All,
    /// Accept only the listed tags
    Only(Vec<String>),
}

impl SubscriptionFilter {
    pub fn allows(&self, tag: &str) -> bool {
        match self {
            SubscriptionFilter::All => true,
            SubscriptionFilter::Only(tags) => tags.iter().any(|t| t == tag),
        }
    }

    /// Parse the stored text form: "ALL", empty, or a comma list
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("ALL") {
            return SubscriptionFilter::All;
        }
        SubscriptionFilter::Only(
            trimmed
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        )
    }

    /// Render back to the stored text form
    pub fn to_column(&self) -> String {
        match self {
            SubscriptionFilter::All => "ALL".to_string(),
            SubscriptionFilter::Only(tags) => tags.join(","),
        }
    }
}

/// A subscriber account with exchange credentials and trading limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub account_id: i64,
    pub account_name: String,
    /// Telegram chat id of the owner, for lifecycle notifications
    pub owner_chat_id: Option<i64>,
    pub api_key: String,
    pub is_active: bool,
    pub budget_tmn: Decimal,
    pub budget_usdt: Decimal,
    pub ceiling_tmn: Decimal,
    pub ceiling_usdt: Decimal,
    pub allowed_strategies: SubscriptionFilter,
    pub allowed_grades: SubscriptionFilter,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Amount committed to a single trade in this quote pair
    pub fn budget_for(&self, pair: QuotePair) -> Decimal {
        match pair {
            QuotePair::Tmn => self.budget_tmn,
            QuotePair::Usdt => self.budget_usdt,
        }
    }

    /// Maximum simultaneously locked capital for this quote pair
    pub fn ceiling_for(&self, pair: QuotePair) -> Decimal {
        match pair {
            QuotePair::Tmn => self.ceiling_tmn,
            QuotePair::Usdt => self.ceiling_usdt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_filter_parse() {
        assert_eq!(SubscriptionFilter::parse("ALL"), SubscriptionFilter::All);
        assert_eq!(SubscriptionFilter::parse("all"), SubscriptionFilter::All);
        assert_eq!(SubscriptionFilter::parse(""), SubscriptionFilter::All);
        assert_eq!(
            SubscriptionFilter::parse("G1, Internal"),
            SubscriptionFilter::Only(vec!["G1".to_string(), "Internal".to_string()])
        );
    }

    #[test]
    fn test_subscription_filter_allows() {
        let all = SubscriptionFilter::All;
        assert!(all.allows("anything"));

        let only = SubscriptionFilter::parse("G1,Arbitrage");
        assert!(only.allows("G1"));
        assert!(only.allows("Arbitrage"));
        assert!(!only.allows("Internal"));
    }

    #[test]
    fn test_subscription_filter_round_trip() {
        let only = SubscriptionFilter::parse("G1,Internal");
        assert_eq!(only.to_column(), "G1,Internal");
        assert_eq!(SubscriptionFilter::All.to_column(), "ALL");
    }

    #[test]
    fn test_quote_pair_from_str() {
        assert_eq!(QuotePair::try_from("TMN").unwrap(), QuotePair::Tmn);
        assert_eq!(QuotePair::try_from("usdt").unwrap(), QuotePair::Usdt);
        assert!(QuotePair::try_from("BTC").is_err());
    }
}
