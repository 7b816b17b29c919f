use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::{Config, SHEET_NAME_MAX};
use crate::greeks::compute_greeks;
use crate::normalize::normalize;
use crate::provider::SnapshotProvider;
use crate::sink::SheetSink;
use crate::types::{ChainSnapshot, OptionKind};

// ---------------------------------------------------------------------------
// Per-batch outcomes
// ---------------------------------------------------------------------------

/// What happened to one (underlying × kind) batch. Failures are values, not
/// exceptions: no outcome ever aborts a sibling batch. Only `SinkFailed`
/// affects the process exit status.
#[derive(Debug)]
pub enum BatchOutcome {
    Written { sheet: String, rows: usize },
    Empty { batch: String, reason: String },
    FetchFailed { batch: String, reason: String },
    SinkFailed { sheet: String, reason: String },
}

impl std::fmt::Display for BatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchOutcome::Written { sheet, rows } => write!(f, "{sheet}: {rows} rows"),
            BatchOutcome::Empty { batch, reason } => write!(f, "{batch}: {reason}"),
            BatchOutcome::FetchFailed { batch, reason } => {
                write!(f, "{batch}: fetch failed: {reason}")
            }
            BatchOutcome::SinkFailed { sheet, reason } => {
                write!(f, "{sheet}: write failed: {reason}")
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<BatchOutcome>,
    pub total_rows: usize,
}

impl RunSummary {
    pub fn written_sheets(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, BatchOutcome::Written { .. }))
            .count()
    }

    pub fn sink_failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, BatchOutcome::SinkFailed { .. }))
            .count()
    }
}

/// Sheet name for one batch: `{SYMBOL}_{c|p}_{stamp}`, truncated to the
/// 31-character workbook limit.
pub fn sheet_name(symbol: &str, kind: OptionKind, stamp: &str) -> String {
    let mut name = format!("{}_{}_{}", symbol, kind.code(), stamp);
    if name.len() > SHEET_NAME_MAX {
        name.truncate(SHEET_NAME_MAX);
    }
    name
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Runs the snapshot → normalize → greeks → sink pipeline over every
/// configured (ticker × kind) batch. One fetch per ticker feeds both kind
/// batches; all batches share a single run stamp for their sheet names.
pub struct Pipeline<P, S> {
    cfg: Config,
    provider: P,
    sink: S,
}

impl<P: SnapshotProvider, S: SheetSink> Pipeline<P, S> {
    pub fn new(cfg: Config, provider: P, sink: S) -> Self {
        Self { cfg, provider, sink }
    }

    pub async fn run(&self) -> RunSummary {
        let stamp = Utc::now().format("%Y-%m-%d_%H%M").to_string();
        let mut summary = RunSummary::default();

        for ticker in &self.cfg.tickers {
            let snapshot = match self.provider.fetch_chain(ticker).await {
                Ok(s) => s,
                Err(e) => {
                    warn!("[FETCH] {ticker}: {e} — continuing with next underlying");
                    for kind in &self.cfg.kinds {
                        summary.outcomes.push(BatchOutcome::FetchFailed {
                            batch: format!("{ticker} {kind}s"),
                            reason: e.to_string(),
                        });
                    }
                    continue;
                }
            };
            info!(
                "[FETCH] {ticker}: spot={:.2} calls={} puts={}",
                snapshot.spot,
                snapshot.calls.len(),
                snapshot.puts.len(),
            );

            for kind in &self.cfg.kinds {
                let outcome = self.run_batch(&snapshot, *kind, &stamp).await;
                if let BatchOutcome::Written { rows, .. } = &outcome {
                    summary.total_rows += rows;
                }
                summary.outcomes.push(outcome);
            }
        }

        summary
    }

    async fn run_batch(
        &self,
        snapshot: &ChainSnapshot,
        kind: OptionKind,
        stamp: &str,
    ) -> BatchOutcome {
        let batch = format!("{} {}s", snapshot.symbol, kind);
        let quotes = match kind {
            OptionKind::Call => snapshot.calls.clone(),
            OptionKind::Put => snapshot.puts.clone(),
        };

        let (rows, fstats) = normalize(
            quotes,
            snapshot.spot,
            snapshot.captured_at,
            self.cfg.strike_bound,
            self.cfg.max_dte,
        );
        info!(
            "[FILTER] {batch}: kept {} of {} (strike_band={} expiry_cutoff={} stale_dte={})",
            fstats.kept,
            fstats.input,
            fstats.rejected_strike_band,
            fstats.rejected_expiry_cutoff,
            fstats.rejected_stale_dte,
        );
        if rows.is_empty() {
            info!("[FILTER] {batch}: no rows matched filters");
            return BatchOutcome::Empty {
                batch,
                reason: "no rows matched filters".to_string(),
            };
        }

        let (greeks, estats) = compute_greeks(rows, kind, self.cfg.risk_free_rate);
        if estats.computed < estats.input {
            info!(
                "[ENGINE] {batch}: computed {} of {} (stale_vol={} non_finite={})",
                estats.computed, estats.input, estats.rejected_iv_floor, estats.rejected_non_finite,
            );
        }
        if greeks.is_empty() {
            info!("[ENGINE] {batch}: no rows above the volatility floor");
            return BatchOutcome::Empty {
                batch,
                reason: "no rows above the volatility floor".to_string(),
            };
        }

        let sheet = sheet_name(&snapshot.symbol, kind, stamp);
        match self.sink.write_table(&sheet, &greeks).await {
            Ok(n) => {
                info!("[SINK] {sheet:<31} rows={n:4}");
                BatchOutcome::Written { sheet, rows: n }
            }
            Err(e) => {
                error!("[SINK] {sheet}: {e}");
                BatchOutcome::SinkFailed {
                    sheet,
                    reason: e.to_string(),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
