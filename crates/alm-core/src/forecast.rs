//! # Forecast Engine
//!
//! Short-horizon price forecasts for a single ticker.
//!
//! ## Model
//!
//! `SarimaModel` fits a seasonal ARIMA `(p,d,q)×(P,D,Q)s`:
//! 1. Regular differencing `d` times, then seasonal differencing `D` times at lag `s`.
//! 2. An ARMA on the differenced series with AR lags `1..=p ∪ {s·1..s·P}`,
//!    MA lags `1..=q ∪ {s·1..s·Q}` and an intercept, estimated with the
//!    two-stage Hannan–Rissanen regression: a long autoregression supplies
//!    innovation estimates, then one least-squares pass fits all lags.
//! 3. Forecasts are produced recursively (future innovations are zero) and
//!    integrated back through every differencing step.
//!
//! When the model cannot be fitted, `forecast_series` falls back to the
//! moving average of the last `MOVING_AVERAGE_WINDOW` closes plus small
//! Gaussian noise.

use crate::analytics::{mean, population_std};
use crate::primitives::{
    MAX_FORECAST_STEPS, MAX_ORDER_COMPONENT, MAX_SEASONAL_PERIOD, MIN_FORECAST_STEPS,
    MOVING_AVERAGE_WINDOW,
};
use crate::{AlmError, PriceHistory};
use chrono::{Days, NaiveDate};
use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Observations required beyond the number of estimated coefficients.
const MIN_DEGREES_OF_FREEDOM: usize = 10;

/// Lower bound for the long autoregression of the first stage.
const MIN_LONG_AR_ORDER: usize = 10;

/// Fallback noise standard deviation relative to the series deviation.
const FALLBACK_NOISE_RATIO: f64 = 0.01;

// =============================================================================
// ORDERS
// =============================================================================

/// Non-seasonal order `(p, d, q)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SarimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl Default for SarimaOrder {
    fn default() -> Self {
        Self { p: 2, d: 1, q: 2 }
    }
}

impl From<(usize, usize, usize)> for SarimaOrder {
    fn from((p, d, q): (usize, usize, usize)) -> Self {
        Self { p, d, q }
    }
}

/// Seasonal order `(P, D, Q, s)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonalOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub s: usize,
}

impl SeasonalOrder {
    /// No seasonal component.
    #[must_use]
    pub const fn none() -> Self {
        Self { p: 0, d: 0, q: 0, s: 0 }
    }

    const fn is_active(&self) -> bool {
        self.p > 0 || self.d > 0 || self.q > 0
    }
}

impl Default for SeasonalOrder {
    fn default() -> Self {
        Self { p: 1, d: 1, q: 1, s: 5 }
    }
}

impl From<(usize, usize, usize, usize)> for SeasonalOrder {
    fn from((p, d, q, s): (usize, usize, usize, usize)) -> Self {
        Self { p, d, q, s }
    }
}

/// Check every order component against `MAX_ORDER_COMPONENT` and the
/// period against `MAX_SEASONAL_PERIOD`.
pub fn validate_orders(order: SarimaOrder, seasonal: SeasonalOrder) -> Result<(), AlmError> {
    let components = [
        ("p", order.p),
        ("d", order.d),
        ("q", order.q),
        ("P", seasonal.p),
        ("D", seasonal.d),
        ("Q", seasonal.q),
    ];
    if let Some((name, value)) = components
        .iter()
        .find(|(_, value)| *value > MAX_ORDER_COMPONENT)
    {
        return Err(AlmError::InvalidInput(format!(
            "order component {name} must be at most {MAX_ORDER_COMPONENT}, got {value}"
        )));
    }
    if seasonal.s > MAX_SEASONAL_PERIOD {
        return Err(AlmError::InvalidInput(format!(
            "seasonal period must be at most {MAX_SEASONAL_PERIOD}, got {}",
            seasonal.s
        )));
    }
    Ok(())
}

/// Check a forecast horizon against `MIN_FORECAST_STEPS..=MAX_FORECAST_STEPS`.
pub fn validate_steps(steps: usize) -> Result<(), AlmError> {
    if !(MIN_FORECAST_STEPS..=MAX_FORECAST_STEPS).contains(&steps) {
        return Err(AlmError::InvalidInput(format!(
            "n_steps must be between {MIN_FORECAST_STEPS} and {MAX_FORECAST_STEPS}"
        )));
    }
    Ok(())
}

/// Lags `1..=regular ∪ {period·1..period·seasonal}`, sorted and unique.
fn lag_set(regular: usize, seasonal: usize, period: usize) -> Vec<usize> {
    let mut lags: Vec<usize> = (1..=regular).collect();
    lags.extend((1..=seasonal).map(|k| k * period));
    lags.sort_unstable();
    lags.dedup();
    lags
}

/// Difference a series at the given lag.
fn difference(series: &[f64], lag: usize) -> Vec<f64> {
    series
        .iter()
        .skip(lag)
        .zip(series.iter())
        .map(|(later, earlier)| later - earlier)
        .collect()
}

/// Ordinary least squares. Returns `(coefficients, residuals)`.
fn least_squares(
    rows: usize,
    cols: usize,
    x: &[f64],
    y: Vec<f64>,
) -> Result<(Vec<f64>, Vec<f64>), AlmError> {
    let x = DMatrix::from_row_slice(rows, cols, x);
    let y = DVector::from_vec(y);

    let xtx = x.transpose() * &x;
    let xty = x.transpose() * &y;
    let beta = xtx
        .lu()
        .solve(&xty)
        .ok_or_else(|| AlmError::Numerical("singular regression matrix".to_string()))?;

    let residuals = &y - &x * &beta;
    let beta: Vec<f64> = beta.iter().copied().collect();
    if beta.iter().any(|b| !b.is_finite()) {
        return Err(AlmError::Numerical("non-finite coefficients".to_string()));
    }
    Ok((beta, residuals.iter().copied().collect()))
}

// =============================================================================
// SARIMA MODEL
// =============================================================================

/// A fitted seasonal ARIMA model.
#[derive(Debug, Clone)]
pub struct SarimaModel {
    pub order: SarimaOrder,
    pub seasonal: SeasonalOrder,
    /// Intercept of the differenced series.
    pub intercept: f64,
    /// `(lag, coefficient)` of the autoregressive part.
    pub ar: Vec<(usize, f64)>,
    /// `(lag, coefficient)` of the moving-average part.
    pub ma: Vec<(usize, f64)>,
    /// Innovation variance.
    pub sigma2: f64,
    pub aic: f64,
    pub bic: f64,
    /// Observations used in the final regression.
    pub nobs: usize,
    /// Series before each differencing step, paired with that step's lag.
    levels: Vec<(Vec<f64>, usize)>,
    /// Fully differenced series.
    stationary: Vec<f64>,
    /// Innovation estimates aligned with `stationary`.
    innovations: Vec<f64>,
}

impl SarimaModel {
    /// Fit the model to a series.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for non-finite observations, orders outside
    ///   `validate_orders` or a seasonal part with `s < 2`
    /// - `InsufficientData` when too few observations remain after differencing
    /// - `Numerical` when the regression is singular
    pub fn fit(
        series: &[f64],
        order: SarimaOrder,
        seasonal: SeasonalOrder,
    ) -> Result<Self, AlmError> {
        if series.iter().any(|v| !v.is_finite()) {
            return Err(AlmError::InvalidInput(
                "series contains non-finite values".to_string(),
            ));
        }
        validate_orders(order, seasonal)?;
        if seasonal.is_active() && seasonal.s < 2 {
            return Err(AlmError::InvalidInput(format!(
                "seasonal period must be at least 2, got {}",
                seasonal.s
            )));
        }

        // 1. Differencing
        let mut levels = Vec::with_capacity(order.d + seasonal.d);
        let mut current = series.to_vec();
        let steps =
            std::iter::repeat_n(1, order.d).chain(std::iter::repeat_n(seasonal.s, seasonal.d));
        for lag in steps {
            if current.len() <= lag {
                return Err(AlmError::InsufficientData(format!(
                    "{} observations cannot be differenced at lag {}",
                    series.len(),
                    lag
                )));
            }
            let next = difference(&current, lag);
            levels.push((current, lag));
            current = next;
        }
        let w = current;
        let n = w.len();

        let ar_lags = lag_set(order.p, seasonal.p, seasonal.s);
        let ma_lags = lag_set(order.q, seasonal.q, seasonal.s);
        let max_ar = ar_lags.last().copied().unwrap_or(0);
        let max_ma = ma_lags.last().copied().unwrap_or(0);

        // 2a. Long autoregression for innovation estimates
        let (innovations, start) = if ma_lags.is_empty() {
            (vec![0.0; n], max_ar)
        } else {
            let m = (2 * max_ar.max(max_ma)).max(MIN_LONG_AR_ORDER);
            if n < 2 * m + MIN_DEGREES_OF_FREEDOM {
                return Err(AlmError::InsufficientData(format!(
                    "{n} differenced observations are too few for a long AR({m})"
                )));
            }
            let rows = n - m;
            let mut x = Vec::with_capacity(rows * (m + 1));
            for t in m..n {
                x.push(1.0);
                x.extend((1..=m).map(|l| w[t - l]));
            }
            let (_, residuals) = least_squares(rows, m + 1, &x, w[m..].to_vec())?;
            let mut innovations = vec![0.0; m];
            innovations.extend(residuals);
            (innovations, (m + max_ma).max(max_ar))
        };

        // 2b. Joint regression on AR lags and lagged innovations
        let cols = 1 + ar_lags.len() + ma_lags.len();
        if n < start + cols + MIN_DEGREES_OF_FREEDOM {
            return Err(AlmError::InsufficientData(format!(
                "{n} differenced observations are too few for {cols} coefficients"
            )));
        }
        let rows = n - start;
        let mut x = Vec::with_capacity(rows * cols);
        for t in start..n {
            x.push(1.0);
            x.extend(ar_lags.iter().map(|&l| w[t - l]));
            x.extend(ma_lags.iter().map(|&l| innovations[t - l]));
        }
        let (beta, residuals) = least_squares(rows, cols, &x, w[start..].to_vec())?;

        let intercept = beta[0];
        let ar: Vec<(usize, f64)> = ar_lags
            .iter()
            .copied()
            .zip(beta[1..=ar_lags.len()].iter().copied())
            .collect();
        let ma: Vec<(usize, f64)> = ma_lags
            .iter()
            .copied()
            .zip(beta[1 + ar_lags.len()..].iter().copied())
            .collect();

        // 3. Information criteria
        let nobs = rows;
        let nobs_f = nobs as f64;
        let ssr: f64 = residuals.iter().map(|r| r * r).sum();
        let sigma2 = (ssr / nobs_f).max(f64::MIN_POSITIVE);
        let log_likelihood = -0.5 * nobs_f * ((2.0 * std::f64::consts::PI * sigma2).ln() + 1.0);
        let k = (cols + 1) as f64;
        let aic = -2.0 * log_likelihood + 2.0 * k;
        let bic = -2.0 * log_likelihood + k * nobs_f.ln();

        Ok(Self {
            order,
            seasonal,
            intercept,
            ar,
            ma,
            sigma2,
            aic,
            bic,
            nobs,
            levels,
            stationary: w,
            innovations,
        })
    }

    /// Forecast `steps` values past the end of the fitted series.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a horizon outside `validate_steps` and
    /// `Numerical` if the recursion produces non-finite values.
    pub fn forecast(&self, steps: usize) -> Result<Vec<f64>, AlmError> {
        validate_steps(steps)?;
        let mut w = self.stationary.clone();
        let mut e = self.innovations.clone();
        let mut predictions = Vec::with_capacity(steps);

        for _ in 0..steps {
            let t = w.len();
            let mut value = self.intercept;
            for &(lag, phi) in &self.ar {
                if t >= lag {
                    value += phi * w[t - lag];
                }
            }
            for &(lag, theta) in &self.ma {
                if t >= lag {
                    value += theta * e[t - lag];
                }
            }
            w.push(value);
            e.push(0.0);
            predictions.push(value);
        }

        // Undo the differencing, last step first.
        for (base, lag) in self.levels.iter().rev() {
            let mut extended = base.clone();
            for delta in &predictions {
                let previous = extended[extended.len() - lag];
                extended.push(delta + previous);
            }
            predictions = extended.split_off(base.len());
        }

        if predictions.iter().any(|v| !v.is_finite()) {
            return Err(AlmError::Numerical("forecast diverged".to_string()));
        }
        Ok(predictions)
    }
}

// =============================================================================
// MOVING-AVERAGE FALLBACK
// =============================================================================

/// Flat forecast at the mean of the last `MOVING_AVERAGE_WINDOW` values,
/// perturbed by Gaussian noise with σ = 1% of the series deviation.
///
/// Shorter series use all available values.
pub fn moving_average_forecast<R: Rng + ?Sized>(
    series: &[f64],
    steps: usize,
    rng: &mut R,
) -> Result<Vec<f64>, AlmError> {
    validate_steps(steps)?;
    if series.is_empty() {
        return Err(AlmError::InsufficientData("empty series".to_string()));
    }
    let window = MOVING_AVERAGE_WINDOW.min(series.len());
    let level = mean(&series[series.len() - window..]);
    let noise = Normal::new(0.0, population_std(series) * FALLBACK_NOISE_RATIO)
        .map_err(|e| AlmError::Numerical(e.to_string()))?;

    Ok((0..steps).map(|_| level + noise.sample(rng)).collect())
}

/// Calendar dates following `last`, formatted `YYYY-MM-DD`.
#[must_use]
pub fn forecast_dates(last: NaiveDate, steps: usize) -> Vec<String> {
    (1..=steps as u64)
        .filter_map(|i| last.checked_add_days(Days::new(i)))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect()
}

// =============================================================================
// FORECAST OUTCOME
// =============================================================================

/// Which model produced a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    Sarima,
    MovingAverageFallback,
}

/// Diagnostics reported with a forecast.
///
/// SARIMA forecasts carry `aic`, `bic` and `std_forecast`; fallback
/// forecasts carry `method` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub aic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bic: Option<f64>,
    pub last_price: f64,
    pub mean_forecast: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub std_forecast: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub method: Option<ForecastMethod>,
}

/// A forecast with its dates and diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastOutcome {
    pub method: ForecastMethod,
    pub dates: Vec<String>,
    pub values: Vec<f64>,
    pub metrics: ForecastMetrics,
    /// Why the SARIMA fit was abandoned, when the fallback was used.
    pub fallback_reason: Option<String>,
}

/// Forecast the closes of a history, falling back to a moving average
/// when the seasonal model cannot be fitted.
///
/// # Errors
///
/// Returns `InvalidInput` for a horizon outside `validate_steps` and
/// `InsufficientData` for an empty history.
pub fn forecast_series<R: Rng + ?Sized>(
    history: &PriceHistory,
    steps: usize,
    order: SarimaOrder,
    seasonal: SeasonalOrder,
    rng: &mut R,
) -> Result<ForecastOutcome, AlmError> {
    validate_steps(steps)?;
    let (Some(last_price), Some(last_date)) = (history.last_close(), history.last_date()) else {
        return Err(AlmError::InsufficientData(format!(
            "no price history for {}",
            history.ticker
        )));
    };
    let closes = history.closes();
    let dates = forecast_dates(last_date, steps);

    let fitted = SarimaModel::fit(&closes, order, seasonal).and_then(|m| {
        let values = m.forecast(steps)?;
        Ok((m, values))
    });

    match fitted {
        Ok((model, values)) => Ok(ForecastOutcome {
            method: ForecastMethod::Sarima,
            dates,
            metrics: ForecastMetrics {
                aic: Some(model.aic),
                bic: Some(model.bic),
                last_price,
                mean_forecast: mean(&values),
                std_forecast: Some(population_std(&values)),
                method: None,
            },
            values,
            fallback_reason: None,
        }),
        Err(reason) => {
            let values = moving_average_forecast(&closes, steps, rng)?;
            Ok(ForecastOutcome {
                method: ForecastMethod::MovingAverageFallback,
                dates,
                metrics: ForecastMetrics {
                    aic: None,
                    bic: None,
                    last_price,
                    mean_forecast: mean(&values),
                    std_forecast: None,
                    method: Some(ForecastMethod::MovingAverageFallback),
                },
                values,
                fallback_reason: Some(reason.to_string()),
            })
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
