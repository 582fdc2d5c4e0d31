//! Pure portfolio math: per-stock values, portfolio totals and sector totals.
//!
//! Every ratio is zero-guarded: when the denominator is not positive the
//! result is `0.0` rather than NaN or infinity.

use std::collections::BTreeMap;

use crate::models::portfolio::{PortfolioTotals, SectorTotals, StockView};

/// `part / whole × 100`, or 0 when `whole` is not positive.
pub fn percentage_of(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        (part / whole) * 100.0
    } else {
        0.0
    }
}

/// Derive investment, present value, gain/loss and portfolio share for one
/// stock. Pass `0.0` as `total_portfolio_value` when the total is not yet known.
#[must_use]
pub fn calculate_stock_values(stock: &StockView, total_portfolio_value: f64) -> StockView {
    let investment = stock.purchase_price * stock.quantity;
    let present_value = stock.cmp * stock.quantity;
    let gain_loss = present_value - investment;

    StockView {
        investment,
        present_value,
        gain_loss,
        gain_loss_percentage: percentage_of(gain_loss, investment),
        portfolio_percentage: percentage_of(present_value, total_portfolio_value),
        ..stock.clone()
    }
}

/// Reduce stocks (whose values are already computed) to portfolio totals.
///
/// Portfolio percentages are recomputed against the final total value, and
/// stocks are grouped into sector totals.
#[must_use]
pub fn calculate_portfolio_totals(stocks: &[StockView]) -> PortfolioTotals {
    let total_investment: f64 = stocks.iter().map(|s| s.investment).sum();
    let total_value: f64 = stocks.iter().map(|s| s.present_value).sum();
    let total_gain_loss = total_value - total_investment;

    let stocks: Vec<StockView> = stocks
        .iter()
        .map(|s| StockView {
            portfolio_percentage: percentage_of(s.present_value, total_value),
            ..s.clone()
        })
        .collect();

    let sector_totals = calculate_sector_totals(&stocks);

    PortfolioTotals {
        stocks,
        total_investment,
        total_value,
        total_gain_loss,
        total_gain_loss_percentage: percentage_of(total_gain_loss, total_investment),
        sector_totals,
    }
}

/// Group stocks by sector. Stocks with an empty sector belong to no group.
#[must_use]
pub fn calculate_sector_totals(stocks: &[StockView]) -> BTreeMap<String, SectorTotals> {
    let mut sectors: BTreeMap<String, SectorTotals> = BTreeMap::new();

    for stock in stocks {
        let sector = stock.sector.trim();
        if sector.is_empty() {
            continue;
        }
        let totals = sectors.entry(sector.to_string()).or_default();
        totals.symbols.push(stock.symbol.clone());
        totals.total_investment += stock.investment;
        totals.total_value += stock.present_value;
    }

    for totals in sectors.values_mut() {
        totals.total_gain_loss = totals.total_value - totals.total_investment;
        totals.total_gain_loss_percentage =
            percentage_of(totals.total_gain_loss, totals.total_investment);
    }

    sectors
}

/// Two-pass computation: values first, then percentages against the total.
#[must_use]
pub fn build_portfolio(stocks: &[StockView]) -> PortfolioTotals {
    let with_values: Vec<StockView> = stocks
        .iter()
        .map(|s| calculate_stock_values(s, 0.0))
        .collect();
    let total_value: f64 = with_values.iter().map(|s| s.present_value).sum();
    let final_stocks: Vec<StockView> = with_values
        .iter()
        .map(|s| calculate_stock_values(s, total_value))
        .collect();
    calculate_portfolio_totals(&final_stocks)
}
