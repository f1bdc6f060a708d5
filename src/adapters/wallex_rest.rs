//! Wallex REST adapter (x-api-key authenticated, no external SDK).
//!
//! Normalizes Wallex's `{success, result, message}` envelope into the
//! exchange trait types so lifecycle code never sees wire shapes.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::{MarketEntry, MarketPrecision};
use crate::error::{MultitradeError, Result};
use crate::exchange::{
    CancelOutcome, ExchangeClient, OrderQuery, OrderSide, OrderState, PlaceOrderOutcome,
};

const DEFAULT_WALLEX_API_BASE: &str = "https://api.wallex.ir/v1";

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct WallexClient {
    http: Client,
    base_url: String,
}

/// Standard Wallex response envelope
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Option<Value>,
}

impl WallexClient {
    pub fn new(base_url: Option<&str>, timeout_secs: u64) -> Result<Self> {
        let base_url = base_url
            .unwrap_or(DEFAULT_WALLEX_API_BASE)
            .trim_end_matches('/')
            .to_string();

        let http = Client::builder()
            .user_agent("multitrade/0.1")
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                MultitradeError::Internal(format!("failed to build Wallex HTTP client: {}", e))
            })?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Render a decimal the way Wallex expects: plain notation, no trailing zeros
fn fmt_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Wallex serializes numbers inconsistently (sometimes strings); accept both
fn decimal_field(value: &Value, keys: &[&str]) -> Decimal {
    for key in keys {
        match value.get(key) {
            Some(Value::String(s)) => {
                if let Ok(d) = Decimal::from_str(s.trim()) {
                    return d;
                }
            }
            Some(Value::Number(n)) => {
                if let Ok(d) = Decimal::from_str(&n.to_string()) {
                    return d;
                }
            }
            _ => continue,
        }
    }
    Decimal::ZERO
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn parse_order_query(result: &Value) -> OrderQuery {
    let state = string_field(result, "status")
        .map(|s| OrderState::parse(&s))
        .unwrap_or(OrderState::Unknown);

    OrderQuery {
        state,
        executed_quantity: decimal_field(result, &["executedQty", "executedQuantity"]),
        // Wallex keeps Binance's historical misspelling
        cumulative_quote_quantity: decimal_field(
            result,
            &["cummulativeQuoteQty", "cumulativeQuoteQty"],
        ),
        fee: decimal_field(result, &["fee", "feeAmount"]),
        fee_asset: string_field(result, "feeAsset"),
    }
}

fn parse_catalog(result: &Value) -> Vec<MarketEntry> {
    let Some(markets) = result.get("markets").and_then(Value::as_array) else {
        return Vec::new();
    };

    markets
        .iter()
        .filter_map(|m| {
            let symbol = string_field(m, "symbol")?;
            let qty_decimals = m.get("amount_precision").and_then(Value::as_u64)?;
            let price_decimals = m.get("price_precision").and_then(Value::as_u64)?;
            Some(MarketEntry {
                symbol,
                precision: MarketPrecision {
                    qty_decimals: qty_decimals as u32,
                    price_decimals: price_decimals as u32,
                },
            })
        })
        .collect()
}

#[async_trait]
impl ExchangeClient for WallexClient {
    async fn place_order(
        &self,
        api_key: &str,
        symbol: &str,
        side: OrderSide,
        price: Decimal,
        quantity: Decimal,
    ) -> Result<PlaceOrderOutcome> {
        let payload = json!({
            "symbol": symbol,
            "price": fmt_decimal(price),
            "quantity": fmt_decimal(quantity),
            "side": side.to_string(),
            "type": "LIMIT",
        });

        debug!("Submitting {} {} P:{} Q:{}", side, symbol, price, quantity);

        let resp = self
            .http
            .post(self.url("/orders"))
            .header(API_KEY_HEADER, api_key)
            .json(&payload)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;

        // 5xx is a transport-level failure and must stay retryable; only an
        // answered rejection is terminal for the caller
        if status.is_server_error() {
            return Err(MultitradeError::Internal(format!(
                "Wallex place order failed: status={} body={}",
                status, text
            )));
        }

        let envelope: Envelope = serde_json::from_str(&text).unwrap_or(Envelope {
            success: false,
            message: Some(text.clone()),
            result: None,
        });

        if status.is_success() && envelope.success {
            let order_ref = envelope
                .result
                .as_ref()
                .and_then(|r| string_field(r, "clientOrderId"))
                .ok_or_else(|| {
                    MultitradeError::Internal(
                        "Wallex accepted order without a clientOrderId".to_string(),
                    )
                })?;
            return Ok(PlaceOrderOutcome::Accepted { order_ref });
        }

        let message = envelope
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("HTTP {}: {}", status, text));
        warn!("Wallex rejected {} {}: {}", side, symbol, message);
        Ok(PlaceOrderOutcome::Rejected { message })
    }

    async fn get_order(&self, api_key: &str, order_ref: &str) -> Result<Option<OrderQuery>> {
        let resp = self
            .http
            .get(self.url(&format!("/orders/{}", order_ref)))
            .header(API_KEY_HEADER, api_key)
            .send()
            .await?;
        let status = resp.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let text = resp.text().await?;
        if !status.is_success() {
            return Err(MultitradeError::Internal(format!(
                "Wallex get order {} failed: status={} body={}",
                order_ref, status, text
            )));
        }

        let envelope: Envelope = serde_json::from_str(&text)?;
        match envelope.result {
            Some(result) if envelope.success => Ok(Some(parse_order_query(&result))),
            _ => Ok(None),
        }
    }

    async fn cancel_order(&self, api_key: &str, order_ref: &str) -> Result<CancelOutcome> {
        let payload = json!({ "clientOrderId": order_ref });

        let resp = self
            .http
            .delete(self.url("/orders"))
            .header(API_KEY_HEADER, api_key)
            .json(&payload)
            .send()
            .await?;
        let status = resp.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(CancelOutcome::NotFound);
        }

        let text = resp.text().await?;
        let envelope: Envelope = serde_json::from_str(&text).unwrap_or(Envelope {
            success: false,
            message: Some(text.clone()),
            result: None,
        });

        if status.is_success() && envelope.success {
            return Ok(CancelOutcome::Canceled);
        }

        let message = envelope.message.unwrap_or_else(|| text.clone());
        if message.to_lowercase().contains("not found") {
            return Ok(CancelOutcome::NotFound);
        }
        Ok(CancelOutcome::Failed(format!(
            "status={} message={}",
            status, message
        )))
    }

    async fn fetch_market_catalog(&self) -> Result<Vec<MarketEntry>> {
        let resp = self.http.get(self.url("/markets")).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(MultitradeError::CatalogUnavailable(format!(
                "status={} body={}",
                status, text
            )));
        }

        let envelope: Envelope = serde_json::from_str(&text)?;
        let Some(result) = envelope.result.filter(|_| envelope.success) else {
            return Err(MultitradeError::CatalogUnavailable(
                envelope.message.unwrap_or_else(|| "no result".to_string()),
            ));
        };

        Ok(parse_catalog(&result))
    }

    async fn validate_api_key(&self, api_key: &str) -> Result<bool> {
        let resp = self
            .http
            .get(self.url("/account/balances"))
            .header(API_KEY_HEADER, api_key)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Ok(false);
        }

        let envelope: Envelope = resp.json().await?;
        Ok(envelope.success)
    }
}
