use std::f64::consts::PI;

use tracing::warn;

use crate::config::{DAYS_PER_YEAR, IV_FLOOR};
use crate::types::{GreeksRow, NormalizedRow, OptionKind};

// ---------------------------------------------------------------------------
// Normal distribution helpers
// ---------------------------------------------------------------------------

/// Standard normal CDF Φ(x), via the error function.
fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / (2.0_f64).sqrt()))
}

/// Standard normal PDF φ(x).
fn norm_pdf(x: f64) -> f64 {
    (-(x * x) / 2.0).exp() / (2.0 * PI).sqrt()
}

/// Error function, Abramowitz & Stegun formula 7.1.26.
/// Maximum absolute error < 1.5e-7.
fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}

/// Black-Scholes d₁ and d₂:
/// d₁ = [ln(S/K) + (r + σ²/2)t] / (σ√t), d₂ = d₁ − σ√t.
/// Callers guarantee t > 0 and σ > 0.
fn d1_d2(spot: f64, strike: f64, t: f64, rate: f64, sigma: f64) -> (f64, f64) {
    let d1 = ((spot / strike).ln() + (rate + sigma * sigma / 2.0) * t) / (sigma * t.sqrt());
    let d2 = d1 - sigma * t.sqrt();
    (d1, d2)
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

// ---------------------------------------------------------------------------
// Greeks engine
// ---------------------------------------------------------------------------

/// Per-batch accounting of what the engine kept and dropped.
#[derive(Debug, Default, PartialEq)]
pub struct EngineStats {
    pub input: usize,
    /// Implied volatility at or below the exclusion floor (stale quote).
    pub rejected_iv_floor: usize,
    /// A Greek came out non-finite despite the domain guards.
    pub rejected_non_finite: usize,
    pub computed: usize,
}

/// Computes delta, theta, gamma, and vega for every row of a
/// kind-homogeneous batch.
///
/// Rows with implied volatility at or below [`IV_FLOOR`] are dropped before
/// any math runs; `dte > 0` is already guaranteed by the normalizer, so the
/// formulas never see a zero divisor or a non-positive log argument. Each
/// row is computed purely from its own fields plus the shared `rate` — no
/// cross-row state. An empty result is legitimate, not an error.
pub fn compute_greeks(
    rows: Vec<NormalizedRow>,
    kind: OptionKind,
    rate: f64,
) -> (Vec<GreeksRow>, EngineStats) {
    let mut stats = EngineStats {
        input: rows.len(),
        ..EngineStats::default()
    };

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let sigma = row.quote.implied_volatility;
        if sigma <= IV_FLOOR {
            stats.rejected_iv_floor += 1;
            continue;
        }

        let spot = row.underlying_price;
        let strike = row.quote.strike;
        let t = row.dte as f64 / DAYS_PER_YEAR;

        let (d1, d2) = d1_d2(spot, strike, t, rate, sigma);
        let sqrt_t = t.sqrt();
        let npd1 = norm_pdf(d1);
        let discount = (-rate * t).exp();

        let delta = match kind {
            OptionKind::Call => norm_cdf(d1),
            OptionKind::Put => norm_cdf(d1) - 1.0,
        };
        let decay = -spot * sigma * npd1 / (2.0 * sqrt_t);
        let theta = match kind {
            OptionKind::Call => (decay - rate * strike * discount * norm_cdf(d2)) / DAYS_PER_YEAR,
            OptionKind::Put => (decay + rate * strike * discount * norm_cdf(-d2)) / DAYS_PER_YEAR,
        };
        let gamma = npd1 / (spot * sigma * sqrt_t);
        let vega = spot * sqrt_t * npd1 / 100.0;

        if !(delta.is_finite() && theta.is_finite() && gamma.is_finite() && vega.is_finite()) {
            warn!(
                contract = %row.quote.contract_symbol,
                spot, strike, sigma, dte = row.dte,
                "[ENGINE] non-finite greek, dropping row"
            );
            stats.rejected_non_finite += 1;
            continue;
        }

        out.push(GreeksRow {
            row,
            time: t,
            delta: round4(delta),
            theta: round4(theta),
            gamma: round4(gamma),
            vega: round4(vega),
        });
    }

    stats.computed = out.len();
    (out, stats)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawQuote;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn test_row(strike: f64, spot: f64, iv: f64, dte: i64) -> NormalizedRow {
        NormalizedRow {
            quote: RawQuote {
                contract_symbol: format!("SPY260918C{:08}", (strike * 1000.0) as u64),
                strike,
                last_price: 5.0,
                bid: 4.9,
                ask: 5.1,
                implied_volatility: iv,
                expiry: NaiveDate::from_ymd_opt(2026, 9, 18).unwrap(),
                symbol: "SPY".to_string(),
            },
            downloaded_at: Utc.with_ymd_and_hms(2026, 8, 6, 14, 30, 0).unwrap(),
            underlying_price: spot,
            dte,
        }
    }

    #[test]
    fn stale_quotes_at_or_below_floor_are_dropped() {
        let rows = vec![
            test_row(440.0, 450.0, 0.0, 30),
            test_row(445.0, 450.0, IV_FLOOR, 30),
            test_row(450.0, 450.0, 0.15, 30),
        ];
        let (out, stats) = compute_greeks(rows, OptionKind::Call, 0.045);
        assert_eq!(stats.input, 3);
        assert_eq!(stats.rejected_iv_floor, 2);
        assert_eq!(stats.computed, 1);
        assert_eq!(out.len(), 1);
        assert!(out[0].row.quote.implied_volatility > IV_FLOOR);
        assert!(out[0].row.dte > 0);
    }

    #[test]
    fn call_delta_stays_in_unit_interval() {
        for strike in [360.0, 400.0, 440.0, 450.0, 460.0, 500.0, 540.0] {
            let (out, _) = compute_greeks(
                vec![test_row(strike, 450.0, 0.22, 45)],
                OptionKind::Call,
                0.045,
            );
            let delta = out[0].delta;
            assert!((0.0..=1.0).contains(&delta), "call delta out of range at K={strike}: {delta}");
        }
    }

    #[test]
    fn put_delta_stays_in_negative_unit_interval() {
        for strike in [360.0, 400.0, 440.0, 450.0, 460.0, 500.0, 540.0] {
            let (out, _) = compute_greeks(
                vec![test_row(strike, 450.0, 0.22, 45)],
                OptionKind::Put,
                0.045,
            );
            let delta = out[0].delta;
            assert!((-1.0..=0.0).contains(&delta), "put delta out of range at K={strike}: {delta}");
        }
    }

    #[test]
    fn gamma_and_vega_are_non_negative_for_both_kinds() {
        for kind in [OptionKind::Call, OptionKind::Put] {
            for strike in [380.0, 450.0, 520.0] {
                let (out, _) =
                    compute_greeks(vec![test_row(strike, 450.0, 0.18, 60)], kind, 0.045);
                assert!(out[0].gamma >= 0.0, "{kind} gamma negative at K={strike}");
                assert!(out[0].vega >= 0.0, "{kind} vega negative at K={strike}");
            }
        }
    }

    #[test]
    fn put_call_symmetry_on_identical_inputs() {
        let (calls, _) =
            compute_greeks(vec![test_row(440.0, 450.0, 0.15, 30)], OptionKind::Call, 0.045);
        let (puts, _) =
            compute_greeks(vec![test_row(440.0, 450.0, 0.15, 30)], OptionKind::Put, 0.045);
        let c = &calls[0];
        let p = &puts[0];

        // Φ(d1) − (Φ(d1) − 1) = 1, up to the 4-decimal rounding of each side.
        assert!(
            (c.delta - p.delta - 1.0).abs() < 1.5e-4,
            "delta_call − delta_put = {}",
            c.delta - p.delta
        );
        // Same formula, same rounding — bitwise equal.
        assert_eq!(c.gamma, p.gamma);
        assert_eq!(c.vega, p.vega);
    }

    #[test]
    fn itm_call_end_to_end_values() {
        // S=450, K=440, σ=0.15, dte=30, r=0.045. By the closed forms:
        // t ≈ 0.0822, d1 ≈ 0.6301, Φ(d1) ≈ 0.7357, gamma ≈ 0.0169,
        // vega ≈ 0.4220, theta ≈ −0.1445/day.
        let (out, stats) =
            compute_greeks(vec![test_row(440.0, 450.0, 0.15, 30)], OptionKind::Call, 0.045);
        assert_eq!(stats.computed, 1);
        let g = &out[0];

        assert!((g.time - 30.0 / 365.0).abs() < 1e-12);
        assert!((g.delta - 0.7357).abs() < 1e-3, "delta = {}", g.delta);
        assert!(g.delta > 0.5 && g.delta < 0.8, "ITM call delta = {}", g.delta);
        assert!((g.gamma - 0.0169).abs() < 5e-4, "gamma = {}", g.gamma);
        assert!((g.vega - 0.4220).abs() < 5e-3, "vega = {}", g.vega);
        assert!((g.theta - -0.1445).abs() < 5e-3, "theta = {}", g.theta);
        assert!(g.theta < 0.0, "long call should decay: theta = {}", g.theta);
    }

    #[test]
    fn empty_input_returns_empty_without_error() {
        let (out, stats) = compute_greeks(Vec::new(), OptionKind::Call, 0.045);
        assert!(out.is_empty());
        assert_eq!(stats, EngineStats::default());
    }

    #[test]
    fn output_set_is_independent_of_row_order() {
        let rows = vec![
            test_row(420.0, 450.0, 0.17, 20),
            test_row(440.0, 450.0, 0.15, 30),
            test_row(460.0, 450.0, 0.19, 45),
            test_row(480.0, 450.0, 0.21, 90),
        ];
        let mut reversed = rows.clone();
        reversed.reverse();

        let (mut a, _) = compute_greeks(rows, OptionKind::Call, 0.045);
        let (mut b, _) = compute_greeks(reversed, OptionKind::Call, 0.045);
        let key = |g: &GreeksRow| g.row.quote.contract_symbol.clone();
        a.sort_by_key(key);
        b.sort_by_key(key);
        assert_eq!(a, b);
    }
}
