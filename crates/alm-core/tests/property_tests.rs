//! # Property-Based Tests
//!
//! Invariants of the store, analytics and forecasting engine.

use alm_core::analytics::{population_std, round_to, sample_std};
use alm_core::{
    AlmStore, Database, SarimaModel, SeasonalOrder, SlidingWindowLimiter, UserId,
    returns_and_volatility,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::time::Duration;

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Volatility is never negative and the stats are always finite.
    #[test]
    fn stats_are_finite_and_volatility_non_negative(
        closes in vec(1.0f64..1000.0, 0..200)
    ) {
        let stats = returns_and_volatility(&closes);
        prop_assert!(stats.annual_return.is_finite());
        prop_assert!(stats.annual_volatility.is_finite());
        prop_assert!(stats.annual_volatility >= 0.0);
    }

    /// Scaling every price by a constant leaves returns unchanged.
    #[test]
    fn stats_are_scale_invariant(
        closes in vec(1.0f64..1000.0, 2..100),
        scale in 0.5f64..20.0
    ) {
        let scaled: Vec<f64> = closes.iter().map(|c| c * scale).collect();
        let a = returns_and_volatility(&closes);
        let b = returns_and_volatility(&scaled);
        prop_assert!((a.annual_return - b.annual_return).abs() <= 1e-3);
        prop_assert!((a.annual_volatility - b.annual_volatility).abs() <= 1e-3);
    }

    /// Population deviation never exceeds the sample deviation.
    #[test]
    fn population_std_not_above_sample_std(values in vec(-1e3f64..1e3, 2..100)) {
        prop_assert!(population_std(&values) <= sample_std(&values) + 1e-9);
    }

    /// Rounding is idempotent.
    #[test]
    fn rounding_is_idempotent(value in -1e6f64..1e6, places in 0i32..6) {
        let once = round_to(value, places);
        prop_assert_eq!(round_to(once, places), once);
    }

    /// Repeated allocation updates keep one holding per ticker, with the last value.
    #[test]
    fn allocation_upsert_keeps_last_value(
        updates in vec((0usize..5, 0.0f64..=1.0), 1..40)
    ) {
        let tickers = ["PETR4.SA", "VALE3.SA", "ITUB4.SA", "WEGE3.SA", "BTC-USD"];
        let mut db = Database::in_memory();
        let mut expected = std::collections::BTreeMap::new();

        for (idx, allocation) in &updates {
            db.update_allocation(UserId(1), tickers[*idx], *allocation).expect("update");
            expected.insert(tickers[*idx], *allocation);
        }

        let holdings = db.holdings(UserId(1)).expect("holdings");
        prop_assert_eq!(holdings.len(), expected.len());
        for holding in holdings {
            let want = expected.get(holding.ticker.as_str()).copied();
            prop_assert_eq!(want, Some(holding.allocation));
        }
    }

    /// The portfolio view is always sorted by allocation, descending.
    #[test]
    fn portfolio_view_is_sorted(allocations in vec(0.0f64..=1.0, 5)) {
        let mut db = Database::in_memory();
        db.initialize_stocks().expect("seed");
        let tickers = ["PETR4.SA", "VALE3.SA", "ITUB4.SA", "WEGE3.SA", "BTC-USD"];
        for (ticker, allocation) in tickers.iter().zip(&allocations) {
            db.update_allocation(UserId(9), ticker, *allocation).expect("update");
        }

        let view = db.user_portfolio(UserId(9)).expect("portfolio");
        for pair in view.windows(2) {
            prop_assert!(pair[0].holding.allocation >= pair[1].holding.allocation);
        }
    }

    /// Differencing then integrating reproduces a random-walk-with-drift forecast.
    #[test]
    fn random_walk_forecast_continues_drift(
        start in 10.0f64..100.0,
        drift in -1.0f64..1.0,
        steps in 1usize..30
    ) {
        let series: Vec<f64> = (0..80).map(|t| start + drift * t as f64).collect();
        let model = SarimaModel::fit(&series, (0, 1, 0).into(), SeasonalOrder::none())
            .expect("fit");
        let forecast = model.forecast(steps).expect("forecast");

        prop_assert_eq!(forecast.len(), steps);
        for (h, value) in forecast.iter().enumerate() {
            let expected = start + drift * (80 + h) as f64;
            prop_assert!((value - expected).abs() < 1e-6);
        }
    }

    /// The limiter never admits more than `max_calls` without time passing.
    #[test]
    fn limiter_caps_burst(max_calls in 1usize..20, attempts in 0usize..50) {
        let mut limiter = SlidingWindowLimiter::new(max_calls, Duration::from_secs(3600));
        let mut admitted = 0;
        for _ in 0..attempts {
            if limiter.try_acquire().is_ok() {
                admitted += 1;
            }
        }
        prop_assert_eq!(admitted, attempts.min(max_calls));
    }
}
