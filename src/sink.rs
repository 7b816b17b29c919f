use async_trait::async_trait;

use crate::error::Result;
use crate::types::GreeksRow;

/// Destination for finished greeks tables. A sheet name identifies a region
/// of persistent storage; writing an existing name replaces that region.
/// Callers keep names within the 31-character workbook limit.
#[async_trait]
pub trait SheetSink {
    /// Appends `rows` under `sheet`, overwriting any previous rows with the
    /// same sheet name. Returns the number of rows written.
    async fn write_table(&self, sheet: &str, rows: &[GreeksRow]) -> Result<usize>;
}

/// Persists greeks tables to the workbook SQLite database. One
/// `option_greeks` table holds every sheet, keyed by the `sheet` column;
/// each write runs in a single transaction so a sheet is either fully
/// replaced or untouched.
pub struct SqliteSink {
    pool: sqlx::SqlitePool,
}

impl SqliteSink {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SheetSink for SqliteSink {
    async fn write_table(&self, sheet: &str, rows: &[GreeksRow]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        // Same sheet name written again replaces the old region.
        sqlx::query("DELETE FROM option_greeks WHERE sheet = ?")
            .bind(sheet)
            .execute(&mut *tx)
            .await?;

        for g in rows {
            sqlx::query(
                r#"
                INSERT INTO option_greeks (
                    sheet, contract_symbol, strike, last_price, bid, ask,
                    implied_volatility, symbol, expiry, downloaded_at,
                    underlying_price, dte, time, delta, theta, gamma, vega
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(sheet)
            .bind(&g.row.quote.contract_symbol)
            .bind(g.row.quote.strike)
            .bind(g.row.quote.last_price)
            .bind(g.row.quote.bid)
            .bind(g.row.quote.ask)
            .bind(g.row.quote.implied_volatility)
            .bind(&g.row.quote.symbol)
            .bind(g.row.quote.expiry)
            .bind(g.row.downloaded_at)
            .bind(g.row.underlying_price)
            .bind(g.row.dte)
            .bind(g.time)
            .bind(g.delta)
            .bind(g.theta)
            .bind(g.gamma)
            .bind(g.vega)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(rows.len())
    }
}
