use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Option kind
// ---------------------------------------------------------------------------

/// Which side of the chain a batch holds. Calls and puts are processed in
/// separate kind-homogeneous batches; the kind is a property of the batch,
/// not of individual rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Call,
    Put,
}

impl OptionKind {
    /// Accepts the long names and the single-letter codes used in sheet names.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "call" | "calls" | "c" => Some(OptionKind::Call),
            "put" | "puts" | "p" => Some(OptionKind::Put),
            _ => None,
        }
    }

    /// Single-letter code used in sheet names: `c` or `p`.
    pub fn code(&self) -> char {
        match self {
            OptionKind::Call => 'c',
            OptionKind::Put => 'p',
        }
    }
}

impl std::fmt::Display for OptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OptionKind::Call => "call",
            OptionKind::Put => "put",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Quote rows — one pipeline stage each
// ---------------------------------------------------------------------------

/// One exchange-quoted option contract as captured from the provider.
/// Never mutated after parsing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawQuote {
    pub contract_symbol: String,
    pub strike: f64,
    pub last_price: f64,
    pub bid: f64,
    pub ask: f64,
    /// Annualized implied volatility as supplied by the quote source.
    /// May be zero or near-zero on stale/illiquid contracts.
    pub implied_volatility: f64,
    /// Expiry calendar date, no time component.
    pub expiry: NaiveDate,
    /// Underlying symbol.
    pub symbol: String,
}

/// A full chain snapshot for one underlying: spot plus the call and put
/// sides across all available expiries, stamped with the capture instant.
#[derive(Debug, Clone)]
pub struct ChainSnapshot {
    pub symbol: String,
    pub spot: f64,
    pub captured_at: DateTime<Utc>,
    pub calls: Vec<RawQuote>,
    pub puts: Vec<RawQuote>,
}

/// RawQuote that survived the strike-band and expiry filters, carrying the
/// per-fetch spot and capture timestamp. `dte > 0` always holds — the
/// normalizer drops anything else before construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRow {
    #[serde(flatten)]
    pub quote: RawQuote,
    /// Capture timestamp, timezone-aware (UTC).
    pub downloaded_at: DateTime<Utc>,
    /// Underlying spot at capture, rounded to 2 decimal places.
    pub underlying_price: f64,
    /// Calendar days to expiry, inclusive: an expiry dated today is 1.
    pub dte: i64,
}

/// Terminal row handed to the sheet sink: the normalized quote plus the
/// time-to-expiry in years and the four Greeks, each rounded to 4 decimals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GreeksRow {
    #[serde(flatten)]
    pub row: NormalizedRow,
    /// Time to expiry in years (dte / 365).
    pub time: f64,
    pub delta: f64,
    pub theta: f64,
    pub gamma: f64,
    pub vega: f64,
}
