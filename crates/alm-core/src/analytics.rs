//! # Portfolio Analytics
//!
//! Annualized return/volatility of price series and the aggregate
//! metrics reported for a portfolio.
//!
//! Daily simple returns are annualized with `TRADING_DAYS_PER_YEAR`:
//! `return = mean × 252`, `volatility = sample_std × √252`.

use crate::PriceHistory;
use crate::primitives::{
    FORECAST_RETURN_FACTOR, FORECAST_VOLATILITY_FACTOR, FULL_ALLOCATION_TOLERANCE,
    MOCK_ALLOCATIONS, TRADING_DAYS_PER_YEAR,
};
use serde::{Deserialize, Serialize};

/// Round to a fixed number of decimal places.
#[must_use]
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Arithmetic mean. Empty input yields 0.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n − 1). Fewer than two values yield 0.
#[must_use]
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Population standard deviation (n). Empty input yields 0.
#[must_use]
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / values.len() as f64).sqrt()
}

/// Daily simple returns `p[t] / p[t-1] - 1`, skipping zero denominators.
#[must_use]
pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

// =============================================================================
// RETURN & VOLATILITY
// =============================================================================

/// Annualized statistics of a price series, rounded to 4 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AnnualizedStats {
    pub annual_return: f64,
    pub annual_volatility: f64,
}

/// Compute annualized return and volatility from closing prices.
#[must_use]
pub fn returns_and_volatility(closes: &[f64]) -> AnnualizedStats {
    let returns = daily_returns(closes);
    if returns.is_empty() {
        return AnnualizedStats::default();
    }
    AnnualizedStats {
        annual_return: round_to(mean(&returns) * TRADING_DAYS_PER_YEAR, 4),
        annual_volatility: round_to(sample_std(&returns) * TRADING_DAYS_PER_YEAR.sqrt(), 4),
    }
}

// =============================================================================
// PORTFOLIO ITEM
// =============================================================================

/// One asset of a portfolio enriched with market metrics.
///
/// Field names follow the frontend's camelCase contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioItem {
    pub ticker: String,
    pub name: String,
    pub allocation: f64,
    pub current_price: f64,
    pub historical_annual_return: f64,
    pub historical_annual_volatility: f64,
    pub forecast_annual_return: f64,
    pub forecast_annual_volatility: f64,
}

impl PortfolioItem {
    /// Build an item from a non-empty price history.
    ///
    /// Returns `None` when the history has no points.
    #[must_use]
    pub fn from_history(
        ticker: impl Into<String>,
        name: impl Into<String>,
        allocation: f64,
        history: &PriceHistory,
    ) -> Option<Self> {
        let current_price = history.last_close()?;
        let stats = returns_and_volatility(&history.closes());
        Some(Self {
            ticker: ticker.into(),
            name: name.into(),
            allocation,
            current_price: round_to(current_price, 2),
            historical_annual_return: stats.annual_return,
            historical_annual_volatility: stats.annual_volatility,
            forecast_annual_return: round_to(stats.annual_return * FORECAST_RETURN_FACTOR, 4),
            forecast_annual_volatility: round_to(
                stats.annual_volatility * FORECAST_VOLATILITY_FACTOR,
                4,
            ),
        })
    }
}

/// Allocation used for a ticker when no user portfolio applies.
#[must_use]
pub fn mock_allocation(ticker: &str) -> f64 {
    MOCK_ALLOCATIONS
        .iter()
        .find(|(t, _)| *t == ticker)
        .map(|(_, a)| *a)
        .unwrap_or(0.0)
}

/// Sum of allocations, rounded to 4 decimals.
#[must_use]
pub fn total_allocation(items: &[PortfolioItem]) -> f64 {
    round_to(items.iter().map(|i| i.allocation).sum(), 4)
}

// =============================================================================
// PORTFOLIO SUMMARY
// =============================================================================

/// Aggregate metrics of a portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub user_id: u64,
    pub total_assets: usize,
    pub total_allocation: f64,
    pub weighted_annual_return: f64,
    pub weighted_annual_volatility: f64,
    pub is_fully_allocated: bool,
}

impl PortfolioSummary {
    /// Aggregate allocation-weighted metrics over the items.
    #[must_use]
    pub fn from_items(user_id: u64, items: &[PortfolioItem]) -> Self {
        let total: f64 = items.iter().map(|i| i.allocation).sum();
        let weighted_return: f64 = items
            .iter()
            .map(|i| i.allocation * i.historical_annual_return)
            .sum();
        let weighted_volatility: f64 = items
            .iter()
            .map(|i| i.allocation * i.historical_annual_volatility)
            .sum();

        Self {
            user_id,
            total_assets: items.len(),
            total_allocation: round_to(total, 4),
            weighted_annual_return: round_to(weighted_return, 4),
            weighted_annual_volatility: round_to(weighted_volatility, 4),
            is_fully_allocated: (total - 1.0).abs() < FULL_ALLOCATION_TOLERANCE,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PricePoint;
    use chrono::NaiveDate;

    fn history(closes: &[f64]) -> PriceHistory {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, c)| PricePoint::close_only(start + chrono::Days::new(i as u64), *c))
            .collect();
        PriceHistory::new("TEST3.SA", points)
    }

    #[test]
    fn round_to_places() {
        assert_eq!(round_to(1.234_56, 2), 1.23);
        assert_eq!(round_to(1.235_01, 2), 1.24);
        assert_eq!(round_to(-0.123_456, 4), -0.1235);
    }

    #[test]
    fn constant_prices_have_zero_stats() {
        let stats = returns_and_volatility(&[10.0, 10.0, 10.0, 10.0]);
        assert_eq!(stats.annual_return, 0.0);
        assert_eq!(stats.annual_volatility, 0.0);
    }

    #[test]
    fn short_series_yields_zero() {
        assert_eq!(returns_and_volatility(&[]), AnnualizedStats::default());
        assert_eq!(returns_and_volatility(&[42.0]), AnnualizedStats::default());
    }

    #[test]
    fn known_returns_are_annualized() {
        // returns: +10%, -10%  -> mean 0, sample std = 0.141421...
        let stats = returns_and_volatility(&[100.0, 110.0, 99.0]);
        assert_eq!(stats.annual_return, 0.0);
        let expected = round_to(0.1_f64.hypot(0.1) * 252f64.sqrt(), 4);
        assert_eq!(stats.annual_volatility, expected);
    }

    #[test]
    fn steady_growth_has_positive_return() {
        // 0.1% per day
        let closes: Vec<f64> = (0..50).map(|i| 100.0 * 1.001f64.powi(i)).collect();
        let stats = returns_and_volatility(&closes);
        assert_eq!(stats.annual_return, 0.252);
        assert_eq!(stats.annual_volatility, 0.0);
    }

    #[test]
    fn item_applies_forecast_factors() {
        let item =
            PortfolioItem::from_history("TEST3.SA", "Test", 0.5, &history(&[100.0, 110.0, 99.0]))
                .expect("non-empty history");
        assert_eq!(item.current_price, 99.0);
        assert_eq!(
            item.forecast_annual_volatility,
            round_to(item.historical_annual_volatility * 0.95, 4)
        );
    }

    #[test]
    fn empty_history_has_no_item() {
        assert!(PortfolioItem::from_history("X", "X", 0.1, &history(&[])).is_none());
    }

    #[test]
    fn item_serializes_camel_case() {
        let item = PortfolioItem::from_history("A", "A", 1.0, &history(&[1.0, 2.0]));
        let json = serde_json::to_string(&item).unwrap_or_default();
        assert!(json.contains("\"currentPrice\""));
        assert!(json.contains("\"forecastAnnualVolatility\""));
    }

    #[test]
    fn summary_weights_metrics() {
        let mk = |allocation: f64, r: f64, v: f64| PortfolioItem {
            ticker: "T".to_string(),
            name: "T".to_string(),
            allocation,
            current_price: 1.0,
            historical_annual_return: r,
            historical_annual_volatility: v,
            forecast_annual_return: 0.0,
            forecast_annual_volatility: 0.0,
        };
        let items = vec![mk(0.6, 0.10, 0.20), mk(0.395, 0.20, 0.40)];
        let summary = PortfolioSummary::from_items(1, &items);

        assert_eq!(summary.total_assets, 2);
        assert_eq!(summary.total_allocation, 0.995);
        assert_eq!(summary.weighted_annual_return, 0.139);
        assert_eq!(summary.weighted_annual_volatility, 0.278);
        assert!(summary.is_fully_allocated);

        let partial = PortfolioSummary::from_items(1, &[mk(0.5, 0.1, 0.1)]);
        assert!(!partial.is_fully_allocated);
    }

    #[test]
    fn mock_allocations_default_to_zero() {
        assert_eq!(mock_allocation("PETR4.SA"), 0.40);
        assert_eq!(mock_allocation("WEGE3.SA"), 0.0);
    }
}
