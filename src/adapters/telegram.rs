//! Telegram bot notifications
//!
//! Sends trade lifecycle alerts to account owners. Delivery is best-effort:
//! every failure is logged and swallowed so notification problems can never
//! touch lifecycle state.

use reqwest::Client;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Telegram notification client
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    bot_token: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
}

impl TelegramNotifier {
    /// Create a notifier from the environment variable, if set
    pub fn from_env() -> Option<Arc<Self>> {
        std::env::var("TELEGRAM_BOT_TOKEN").ok().map(Self::build)
    }

    /// Create a notifier with an explicit bot token
    pub fn new(bot_token: String) -> Arc<Self> {
        Self::build(bot_token)
    }

    fn build(bot_token: String) -> Arc<Self> {
        info!("Telegram notifications enabled");
        Arc::new(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
            bot_token,
        })
    }

    /// Send a Markdown message to one chat
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), String> {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.bot_token
        );
        let message = SendMessage {
            chat_id,
            text,
            parse_mode: "Markdown",
        };

        match self.client.post(&url).json(&message).send().await {
            Ok(resp) => {
                if resp.status().is_success() {
                    debug!("Telegram notification sent to {}", chat_id);
                    Ok(())
                } else {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    error!("Telegram notification failed: {} - {}", status, body);
                    Err(format!("HTTP {}: {}", status, body))
                }
            }
            Err(e) => {
                error!("Telegram request failed: {}", e);
                Err(e.to_string())
            }
        }
    }

    /// Buy fill confirmed
    pub async fn notify_buy_filled(&self, chat_id: i64, asset: &str, quantity: Decimal) {
        let text = format!(
            "✅ *Buy filled*\n💎 {}\n🔢 Quantity: `{}`",
            asset, quantity
        );
        if let Err(e) = self.send_message(chat_id, &text).await {
            error!("Failed to send buy-filled notification: {}", e);
        }
    }

    /// Sell order resting on the exchange
    pub async fn notify_sell_placed(&self, chat_id: i64, asset: &str, target_price: Decimal) {
        let text = format!(
            "⬇️ *Sell order placed*\n💎 {}\n🎯 Target: `{}`",
            asset, target_price
        );
        if let Err(e) = self.send_message(chat_id, &text).await {
            error!("Failed to send sell-placed notification: {}", e);
        }
    }

    /// Trade settled; report revenue and signed outcome
    pub async fn notify_trade_closed(
        &self,
        chat_id: i64,
        asset: &str,
        revenue: Decimal,
        profit: Decimal,
    ) {
        let icon = if profit >= Decimal::ZERO { "🟢" } else { "🔴" };
        let text = format!(
            "{} *Trade closed*\n💎 {}\n💰 Revenue: `{}`\n📊 P/L: `{}`",
            icon, asset, revenue, profit
        );
        if let Err(e) = self.send_message(chat_id, &text).await {
            error!("Failed to send trade-closed notification: {}", e);
        }
    }
}
