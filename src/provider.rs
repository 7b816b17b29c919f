use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use tracing::debug;

use crate::config::{Config, HTTP_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::types::{ChainSnapshot, RawQuote};

/// Source of option-chain snapshots. One call returns the spot price and
/// the full call/put chains for a single underlying, stamped with the
/// capture instant. Implementations surface retrieval problems as `Err`;
/// the pipeline recovers by treating the batch as empty.
#[async_trait]
pub trait SnapshotProvider {
    async fn fetch_chain(&self, symbol: &str) -> Result<ChainSnapshot>;
}

/// Yahoo Finance options REST API client.
///
/// `GET /v7/finance/options/{symbol}` yields the spot quote and the list of
/// expiry epochs; one follow-up request per expiry yields that slice of the
/// chain.
pub struct YahooProvider {
    client: reqwest::Client,
    base_url: String,
}

impl YahooProvider {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.yahoo_api_url.clone(),
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        Ok(self.client.get(url).send().await?.json().await?)
    }
}

#[async_trait]
impl SnapshotProvider for YahooProvider {
    async fn fetch_chain(&self, symbol: &str) -> Result<ChainSnapshot> {
        let root_url = format!("{}/v7/finance/options/{}", self.base_url, symbol);
        let root = self.get_json(&root_url).await?;

        let result = root
            .get("optionChain")
            .and_then(|c| c.get("result"))
            .and_then(|r| r.as_array())
            .and_then(|a| a.first())
            .ok_or_else(|| AppError::Provider(format!("no option chain result for {symbol}")))?;

        let spot = result
            .get("quote")
            .and_then(|q| q.get("regularMarketPrice"))
            .and_then(|p| p.as_f64())
            .filter(|p| *p > 0.0)
            .ok_or_else(|| AppError::Provider(format!("no usable spot price for {symbol}")))?;

        let expiries: Vec<i64> = result
            .get("expirationDates")
            .and_then(|e| e.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_i64()).collect())
            .unwrap_or_default();

        let captured_at = Utc::now();
        let mut calls = Vec::new();
        let mut puts = Vec::new();

        for epoch in &expiries {
            let url = format!("{root_url}?date={epoch}");
            let slice = self.get_json(&url).await?;
            let Some(options) = slice
                .get("optionChain")
                .and_then(|c| c.get("result"))
                .and_then(|r| r.as_array())
                .and_then(|a| a.first())
                .and_then(|r| r.get("options"))
                .and_then(|o| o.as_array())
                .and_then(|a| a.first())
            else {
                continue;
            };

            let before = (calls.len(), puts.len());
            for side in ["calls", "puts"] {
                let Some(contracts) = options.get(side).and_then(|c| c.as_array()) else {
                    continue;
                };
                let out = if side == "calls" { &mut calls } else { &mut puts };
                out.extend(contracts.iter().filter_map(|c| parse_contract(c, symbol)));
            }
            debug!(
                symbol,
                epoch,
                calls = calls.len() - before.0,
                puts = puts.len() - before.1,
                "fetched expiry slice"
            );
        }

        Ok(ChainSnapshot {
            symbol: symbol.to_string(),
            spot,
            captured_at,
            calls,
            puts,
        })
    }
}

/// Parse one contract object. Returns None only when the record is
/// structurally unusable (no contract symbol, strike, or expiry); missing
/// price fields degrade to 0.0 and are handled by the downstream filters.
fn parse_contract(v: &Value, symbol: &str) -> Option<RawQuote> {
    let contract_symbol = v.get("contractSymbol")?.as_str()?.to_string();
    let strike = v.get("strike")?.as_f64().filter(|s| *s > 0.0)?;
    let expiry = v
        .get("expiration")
        .and_then(|e| e.as_i64())
        .and_then(epoch_to_date)?;

    let num = |key: &str| v.get(key).and_then(|x| x.as_f64()).unwrap_or(0.0);

    Some(RawQuote {
        contract_symbol,
        strike,
        last_price: num("lastPrice"),
        bid: num("bid"),
        ask: num("ask"),
        implied_volatility: num("impliedVolatility"),
        expiry,
        symbol: symbol.to_string(),
    })
}

fn epoch_to_date(epoch: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(epoch, 0).map(|dt| dt.date_naive())
}
