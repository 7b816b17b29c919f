use crate::error::{AppError, Result};
use crate::types::OptionKind;

pub const YAHOO_API_URL: &str = "https://query2.finance.yahoo.com";

/// Implied-volatility exclusion floor. Quotes at or below this are stale or
/// illiquid and would make the Greeks formulas divide by ~0.
pub const IV_FLOOR: f64 = 1e-5;

/// Calendar-day year used to convert dte to the time-to-expiry in years.
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Sheet names longer than this are truncated by the caller (format limit
/// inherited from spreadsheet workbooks).
pub const SHEET_NAME_MAX: usize = 31;

/// HTTP timeout for provider requests (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub yahoo_api_url: String,
    pub log_level: String,
    pub db_path: String,
    /// Underlying symbols to collect, in run order (TICKERS)
    pub tickers: Vec<String>,
    /// Option kinds to process per ticker (OPT_KINDS)
    pub kinds: Vec<OptionKind>,
    /// Strike-band half-width as a fraction of spot (STRIKE_BOUND)
    pub strike_bound: f64,
    /// Contracts expiring further out than this many days are excluded (MAX_DTE)
    pub max_dte: i64,
    /// Continuously-compounded risk-free rate (RISK_FREE_RATE)
    pub risk_free_rate: f64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let tickers: Vec<String> = std::env::var("TICKERS")
            .unwrap_or_else(|_| "SPY,UPRO".to_string())
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if tickers.is_empty() {
            return Err(AppError::Config("TICKERS must name at least one symbol".to_string()));
        }

        let kinds: Vec<OptionKind> = std::env::var("OPT_KINDS")
            .unwrap_or_else(|_| "call,put".to_string())
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                OptionKind::parse(s)
                    .ok_or_else(|| AppError::Config(format!("OPT_KINDS: unknown option kind {s:?}")))
            })
            .collect::<Result<_>>()?;
        if kinds.is_empty() {
            return Err(AppError::Config("OPT_KINDS must name at least one kind".to_string()));
        }

        Ok(Self {
            yahoo_api_url: std::env::var("YAHOO_API_URL")
                .unwrap_or_else(|_| YAHOO_API_URL.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "greeks.db".to_string()),
            tickers,
            kinds,
            strike_bound: std::env::var("STRIKE_BOUND")
                .unwrap_or_else(|_| "0.20".to_string())
                .parse::<f64>()
                .map_err(|_| AppError::Config("STRIKE_BOUND must be a fraction, e.g. 0.20".to_string()))?,
            max_dte: std::env::var("MAX_DTE")
                .unwrap_or_else(|_| "120".to_string())
                .parse::<i64>()
                .map_err(|_| AppError::Config("MAX_DTE must be a whole number of days".to_string()))?,
            risk_free_rate: std::env::var("RISK_FREE_RATE")
                .unwrap_or_else(|_| "0.045".to_string())
                .parse::<f64>()
                .map_err(|_| AppError::Config("RISK_FREE_RATE must be a decimal rate, e.g. 0.045".to_string()))?,
        })
    }
}
