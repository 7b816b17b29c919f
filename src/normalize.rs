use chrono::{DateTime, Duration, Utc};

use crate::types::{NormalizedRow, RawQuote};

/// Per-batch accounting of what the normalizer kept and dropped.
#[derive(Debug, Default, PartialEq)]
pub struct FilterStats {
    pub input: usize,
    pub rejected_strike_band: usize,
    pub rejected_expiry_cutoff: usize,
    /// Expired or same-day-stale contracts (dte ≤ 0).
    pub rejected_stale_dte: usize,
    pub kept: usize,
}

/// Filters a raw chain batch down to the admissible strike band and expiry
/// window, and stamps each survivor with the per-fetch spot and capture
/// instant.
///
/// The band is `[round(spot·(1−bound)), round(spot·(1+bound))]`, inclusive
/// by strike value, rounded to the nearest whole currency unit. Contracts
/// expiring strictly after `capture + max_dte` days are excluded. `dte` is
/// the inclusive calendar-day count — an expiry dated today is 1 — and the
/// same capture instant drives both the cutoff and the dte computation.
/// Rows with `dte ≤ 0` never leave this function, so downstream code can
/// rely on a strictly positive time to expiry.
///
/// Empty input or a fully filtered-out batch yields an empty Vec; the
/// caller reports it as "no rows matched filters" and moves on.
pub fn normalize(
    quotes: Vec<RawQuote>,
    spot: f64,
    captured_at: DateTime<Utc>,
    bound: f64,
    max_dte: i64,
) -> (Vec<NormalizedRow>, FilterStats) {
    let mut stats = FilterStats {
        input: quotes.len(),
        ..FilterStats::default()
    };

    let band_lo = (spot * (1.0 - bound)).round();
    let band_hi = (spot * (1.0 + bound)).round();
    let capture_date = captured_at.date_naive();
    let cutoff = capture_date + Duration::days(max_dte);
    let spot_2dp = (spot * 100.0).round() / 100.0;

    let mut out = Vec::with_capacity(quotes.len());
    for quote in quotes {
        if quote.strike < band_lo || quote.strike > band_hi {
            stats.rejected_strike_band += 1;
            continue;
        }
        if quote.expiry > cutoff {
            stats.rejected_expiry_cutoff += 1;
            continue;
        }
        let dte = (quote.expiry - capture_date).num_days() + 1;
        if dte <= 0 {
            stats.rejected_stale_dte += 1;
            continue;
        }
        out.push(NormalizedRow {
            quote,
            downloaded_at: captured_at,
            underlying_price: spot_2dp,
            dte,
        });
    }

    stats.kept = out.len();
    (out, stats)
}
