//! Seasonal forecaster for monthly consumption.
//!
//! The model is additive: a linear trend plus a yearly seasonal component
//! expressed as a truncated Fourier series over the month of the year,
//!
//! ```text
//! y(t) = b0 + b1*t + sum_k ( a_k*sin(2*pi*k*m/12) + c_k*cos(2*pi*k*m/12) )
//! ```
//!
//! with `t` in years since the first observed month and `m` the month of
//! the year (0..11). Coefficients are fitted by ordinary least squares.
//! Uncertainty bands are OLS prediction intervals, so they widen as the
//! projection moves away from the observed data.
//!
//! A fitted [`SeasonalModel`] is a long-lived artifact: fit once, persist
//! with [`SeasonalModel::save`], and serve forecasts from the reloaded
//! model until new history arrives.

use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ForecastError, LoadError};
use crate::models::{add_months, months_between, ForecastRecord, MonthlyRecord};

// ---

/// Shortest horizon accepted by [`SeasonalModel::forecast`].
pub const MIN_HORIZON: usize = 1;

/// Longest horizon accepted by [`SeasonalModel::forecast`].
pub const MAX_HORIZON: usize = 36;

/// Months held out by [`backtest`] unless told otherwise.
pub const DEFAULT_HOLDOUT: usize = 24;

/// Two full years are needed before yearly seasonality is identifiable.
const SEASONAL_MIN_POINTS: usize = 24;

/// Order 6 would alias onto order 0 for monthly samples.
const MAX_FOURIER_ORDER: usize = 5;

const SINGULAR_EPS: f64 = 1e-10;

/// Tuning knobs for [`fit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecasterConfig {
    // ---
    /// Minimum monthly points required to fit (never below 2).
    pub min_points: usize,
    /// Number of yearly Fourier harmonics.
    pub fourier_order: usize,
    /// Coverage of the uncertainty band, e.g. 0.80 for an 80% interval.
    pub interval_width: f64,
}

impl Default for ForecasterConfig {
    fn default() -> Self {
        Self {
            min_points: SEASONAL_MIN_POINTS,
            fourier_order: 3,
            interval_width: 0.80,
        }
    }
}

/// Fitted trend + seasonality model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonalModel {
    // ---
    model_id: Uuid,
    fitted_at: DateTime<Utc>,
    first_month: NaiveDate,
    last_month: NaiveDate,
    n_observations: usize,
    /// Zero when the series was too short for seasonality.
    fourier_order: usize,
    coefficients: Vec<f64>,
    /// `(X'X)^-1`, kept for prediction intervals.
    xtx_inverse: Vec<Vec<f64>>,
    residual_std: f64,
    interval_width: f64,
}

/// Fit a [`SeasonalModel`] on a monthly series.
///
/// # Errors
/// - [`ForecastError::InsufficientData`] if the series has fewer than
///   `max(2, config.min_points)` points.
/// - [`ForecastError::InvalidSeries`] if months are not first-of-month,
///   not strictly increasing, or a total is not finite.
/// - [`ForecastError::Numerical`] if the normal equations are singular.
pub fn fit(
    series: &[MonthlyRecord],
    config: &ForecasterConfig,
) -> Result<SeasonalModel, ForecastError> {
    // ---
    let required = config.min_points.max(2);
    if series.len() < required {
        return Err(ForecastError::InsufficientData {
            required,
            actual: series.len(),
        });
    }
    validate_series(series)?;

    let first_month = series[0].month_start;
    let last_month = series[series.len() - 1].month_start;
    let fourier_order = if series.len() >= SEASONAL_MIN_POINTS {
        config.fourier_order.min(MAX_FOURIER_ORDER)
    } else {
        tracing::warn!(
            "Only {} monthly points; fitting trend without yearly seasonality",
            series.len()
        );
        0
    };

    let rows: Vec<Vec<f64>> = series
        .iter()
        .map(|r| {
            let offset = months_between(first_month, r.month_start);
            design_row(offset, r.month_start, fourier_order)
        })
        .collect();
    let p = rows[0].len();

    let mut xtx = vec![vec![0.0; p]; p];
    let mut xty = vec![0.0; p];
    for (row, record) in rows.iter().zip(series) {
        for i in 0..p {
            xty[i] += row[i] * record.total_liters;
            for j in 0..p {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }

    let xtx_inverse = invert(&xtx)?;
    let coefficients: Vec<f64> = xtx_inverse.iter().map(|inv_row| dot(inv_row, &xty)).collect();

    let ssr: f64 = rows
        .iter()
        .zip(series)
        .map(|(row, r)| (r.total_liters - dot(row, &coefficients)).powi(2))
        .sum();
    let dof = series.len().saturating_sub(p).max(1);
    let residual_std = (ssr / dof as f64).sqrt();

    tracing::info!(
        "Fitted seasonal model on {} months ({} .. {}), fourier_order={}, residual_std={:.2}",
        series.len(),
        first_month,
        last_month,
        fourier_order,
        residual_std
    );

    Ok(SeasonalModel {
        model_id: Uuid::new_v4(),
        fitted_at: Utc::now(),
        first_month,
        last_month,
        n_observations: series.len(),
        fourier_order,
        coefficients,
        xtx_inverse,
        residual_std,
        interval_width: config.interval_width.clamp(0.01, 0.99),
    })
}

impl SeasonalModel {
    pub fn model_id(&self) -> Uuid {
        self.model_id
    }

    pub fn fitted_at(&self) -> DateTime<Utc> {
        self.fitted_at
    }

    pub fn first_observed(&self) -> NaiveDate {
        self.first_month
    }

    pub fn last_observed(&self) -> NaiveDate {
        self.last_month
    }

    pub fn n_observations(&self) -> usize {
        self.n_observations
    }

    pub fn residual_std(&self) -> f64 {
        self.residual_std
    }

    pub fn is_seasonal(&self) -> bool {
        self.fourier_order > 0
    }

    /// One record per calendar month from the first observed month through
    /// `horizon` months past the last observed month.
    ///
    /// Records up to the last observed month are fitted values; later
    /// records are projections (`out_of_sample == true`).
    pub fn forecast(&self, horizon: usize) -> Result<Vec<ForecastRecord>, ForecastError> {
        // ---
        if !(MIN_HORIZON..=MAX_HORIZON).contains(&horizon) {
            return Err(ForecastError::InvalidHorizon {
                horizon,
                min: MIN_HORIZON,
                max: MAX_HORIZON,
            });
        }

        let span = months_between(self.first_month, self.last_month);
        Ok((0..=span + horizon as i32)
            .map(|offset| self.predict(add_months(self.first_month, offset)))
            .collect())
    }

    /// Estimate and band for the month starting at `month`.
    pub fn predict(&self, month: NaiveDate) -> ForecastRecord {
        // ---
        let offset = months_between(self.first_month, month);
        let x = design_row(offset, month, self.fourier_order);
        let estimate = dot(&x, &self.coefficients);

        let leverage = self
            .xtx_inverse
            .iter()
            .zip(&x)
            .map(|(inv_row, xi)| xi * dot(inv_row, &x))
            .sum::<f64>()
            .max(0.0);
        let z = normal_quantile(0.5 + self.interval_width / 2.0);
        let half_width = z * self.residual_std * (1.0 + leverage).sqrt();

        // Volumes are non-negative; clipping preserves lower <= point <= upper.
        let point_estimate = estimate.max(0.0);
        ForecastRecord {
            date: month,
            point_estimate,
            lower_bound: (estimate - half_width).max(0.0),
            upper_bound: (estimate + half_width).max(point_estimate),
            out_of_sample: month > self.last_month,
        }
    }

    /// Persist the model as JSON, replacing any previous file atomically.
    pub fn save(&self, path: &Path) -> Result<(), LoadError> {
        // ---
        let tmp = path.with_extension("tmp");
        let file = File::create(&tmp).map_err(|e| LoadError::from_io(&tmp, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|source| LoadError::Json {
            path: tmp.clone(),
            source,
        })?;
        writer.flush().map_err(|e| LoadError::from_io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| LoadError::from_io(path, e))?;

        tracing::info!("Saved model {} to {}", self.model_id, path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        // ---
        let file = File::open(path).map_err(|e| LoadError::from_io(path, e))?;
        let model: SeasonalModel =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| LoadError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::info!(
            "Loaded model {} (fitted {}) from {}",
            model.model_id,
            model.fitted_at,
            path.display()
        );
        Ok(model)
    }
}

// ---

/// Hold-out accuracy of the forecaster on the tail of a series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyReport {
    // ---
    pub train_points: usize,
    pub test_points: usize,
    pub mae: f64,
    pub rmse: f64,
    /// Mean absolute percentage error; `None` if every actual was zero.
    pub mape: Option<f64>,
    /// `100 - mape`.
    pub accuracy: Option<f64>,
}

/// Fit on all but the last `holdout` months and score the projection
/// against them.
pub fn backtest(
    series: &[MonthlyRecord],
    holdout: usize,
    config: &ForecasterConfig,
) -> Result<AccuracyReport, ForecastError> {
    // ---
    if holdout == 0 || series.len() <= holdout {
        return Err(ForecastError::InsufficientData {
            required: holdout + 1,
            actual: series.len(),
        });
    }

    let (train, test) = series.split_at(series.len() - holdout);
    let model = fit(train, config)?;

    let mut abs_sum = 0.0;
    let mut sq_sum = 0.0;
    let mut pct_sum = 0.0;
    let mut pct_count = 0usize;
    for actual in test {
        let predicted = model.predict(actual.month_start).point_estimate;
        let err = actual.total_liters - predicted;
        abs_sum += err.abs();
        sq_sum += err * err;
        if actual.total_liters != 0.0 {
            pct_sum += (err / actual.total_liters).abs();
            pct_count += 1;
        }
    }

    let n = test.len() as f64;
    let mape = (pct_count > 0).then(|| pct_sum / pct_count as f64 * 100.0);
    let report = AccuracyReport {
        train_points: train.len(),
        test_points: test.len(),
        mae: abs_sum / n,
        rmse: (sq_sum / n).sqrt(),
        mape,
        accuracy: mape.map(|m| 100.0 - m),
    };

    tracing::info!(
        "Backtest over {} months: MAE={:.2} RMSE={:.2} MAPE={:?}",
        report.test_points,
        report.mae,
        report.rmse,
        report.mape
    );
    Ok(report)
}

// ---

fn validate_series(series: &[MonthlyRecord]) -> Result<(), ForecastError> {
    // ---
    for record in series {
        if record.month_start.day() != 1 {
            return Err(ForecastError::InvalidSeries(format!(
                "{} is not the first day of a month",
                record.month_start
            )));
        }
        if !record.total_liters.is_finite() {
            return Err(ForecastError::InvalidSeries(format!(
                "non-finite total for {}",
                record.month_start
            )));
        }
    }

    if let Some(pair) = series
        .windows(2)
        .find(|w| w[1].month_start <= w[0].month_start)
    {
        return Err(ForecastError::InvalidSeries(format!(
            "months must be strictly increasing: {} followed by {}",
            pair[0].month_start, pair[1].month_start
        )));
    }
    Ok(())
}

/// `[1, t, sin(2*pi*m/12), cos(2*pi*m/12), ...]` for the month at `offset`.
fn design_row(offset: i32, month: NaiveDate, fourier_order: usize) -> Vec<f64> {
    // ---
    let mut row = Vec::with_capacity(2 + 2 * fourier_order);
    row.push(1.0);
    row.push(f64::from(offset) / 12.0);

    let phase = 2.0 * PI * f64::from(month.month0()) / 12.0;
    for k in 1..=fourier_order {
        let angle = phase * k as f64;
        row.push(angle.sin());
        row.push(angle.cos());
    }
    row
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Gauss-Jordan inversion with partial pivoting.
fn invert(matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ForecastError> {
    // ---
    let n = matrix.len();
    let mut a: Vec<Vec<f64>> = matrix
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut augmented = row.clone();
            augmented.extend((0..n).map(|j| if i == j { 1.0 } else { 0.0 }));
            augmented
        })
        .collect();

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < SINGULAR_EPS {
            return Err(ForecastError::Numerical(
                "normal equations are singular".to_string(),
            ));
        }
        a.swap(col, pivot);

        let scale = a[col][col];
        for v in a[col].iter_mut() {
            *v /= scale;
        }

        let pivot_row = a[col].clone();
        for (r, row) in a.iter_mut().enumerate() {
            if r == col || row[col] == 0.0 {
                continue;
            }
            let factor = row[col];
            for (v, p) in row.iter_mut().zip(&pivot_row) {
                *v -= factor * p;
            }
        }
    }

    Ok(a.into_iter().map(|row| row[n..].to_vec()).collect())
}

/// Inverse of the standard normal CDF (Acklam's rational approximation,
/// relative error below 1.2e-9).
fn normal_quantile(p: f64) -> f64 {
    // ---
    const A: [f64; 6] = [
        -3.969683028665376e1,
        2.209460984245205e2,
        -2.759285104469687e2,
        1.383577518672690e2,
        -3.066479806614716e1,
        2.506628277459239,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e1,
        1.615858368580409e2,
        -1.556989798598866e2,
        6.680131188771972e1,
        -1.328068155288572e1,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-3,
        -3.223964580411365e-1,
        -2.400758277161838,
        -2.549732539343734,
        4.374664141464968,
        2.938163982698783,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-3,
        3.224671290700398e-1,
        2.445134137142996,
        3.754408661907416,
    ];
    const P_LOW: f64 = 0.02425;

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn month(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    /// Trend + yearly cycle + small deterministic wobble.
    fn seasonal_series(months: i32, wobble: f64) -> Vec<MonthlyRecord> {
        let start = month(2020, 1);
        (0..months)
            .map(|i| {
                let date = add_months(start, i);
                let season = 2.0 * PI * f64::from(date.month0()) / 12.0;
                let noise = wobble * f64::from((i * 7919) % 13 - 6);
                MonthlyRecord {
                    month_start: date,
                    total_liters: 200_000.0
                        + 1_000.0 * f64::from(i)
                        + 30_000.0 * season.sin()
                        + noise,
                }
            })
            .collect()
    }

    #[test]
    fn test_rejects_fewer_than_two_points() {
        // ---
        let config = ForecasterConfig {
            min_points: 0,
            ..ForecasterConfig::default()
        };
        let one = vec![MonthlyRecord {
            month_start: month(2024, 1),
            total_liters: 10.0,
        }];
        assert_eq!(
            fit(&one, &config).unwrap_err(),
            ForecastError::InsufficientData {
                required: 2,
                actual: 1
            }
        );
        assert!(matches!(
            fit(&[], &config),
            Err(ForecastError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_reports_insufficient_data_below_min_points() {
        // ---
        let series = seasonal_series(18, 0.0);
        let err = fit(&series, &ForecasterConfig::default()).unwrap_err();
        assert_eq!(
            err,
            ForecastError::InsufficientData {
                required: 24,
                actual: 18
            }
        );
    }

    #[test]
    fn test_rejects_duplicate_and_unordered_months() {
        // ---
        let mut series = seasonal_series(30, 0.0);
        series[10].month_start = series[9].month_start;
        assert!(matches!(
            fit(&series, &ForecasterConfig::default()),
            Err(ForecastError::InvalidSeries(_))
        ));

        let mut series = seasonal_series(30, 0.0);
        series.swap(3, 4);
        assert!(matches!(
            fit(&series, &ForecasterConfig::default()),
            Err(ForecastError::InvalidSeries(_))
        ));

        let mut series = seasonal_series(30, 0.0);
        series[5].total_liters = f64::NAN;
        assert!(matches!(
            fit(&series, &ForecasterConfig::default()),
            Err(ForecastError::InvalidSeries(_))
        ));
    }

    #[test]
    fn test_recovers_clean_seasonal_signal() {
        // ---
        let series = seasonal_series(48, 0.0);
        let model = fit(&series, &ForecasterConfig::default()).unwrap();
        assert!(model.is_seasonal());
        assert!(model.residual_std() < 1e-3);

        let records = model.forecast(12).unwrap();
        assert_eq!(records.len(), 48 + 12);
        for (record, actual) in records.iter().zip(&series) {
            assert_eq!(record.date, actual.month_start);
            assert!((record.point_estimate - actual.total_liters).abs() < 1e-3);
            assert!(!record.out_of_sample);
        }

        // One year past the end the cycle repeats on top of the trend
        let projected = records.last().unwrap();
        assert!(projected.out_of_sample);
        assert_eq!(projected.date, month(2024, 12));
        let expected = 200_000.0 + 1_000.0 * 59.0 + 30_000.0 * (2.0 * PI * 11.0 / 12.0).sin();
        assert!((projected.point_estimate - expected).abs() < 1e-2);
    }

    #[test]
    fn test_bounds_are_ordered_and_widen_with_horizon() {
        // ---
        let series = seasonal_series(36, 500.0);
        let model = fit(&series, &ForecasterConfig::default()).unwrap();
        let records = model.forecast(36).unwrap();

        for r in &records {
            assert!(r.lower_bound <= r.point_estimate, "{:?}", r);
            assert!(r.point_estimate <= r.upper_bound, "{:?}", r);
        }

        let width = |r: &ForecastRecord| r.upper_bound - r.lower_bound;
        let last_fitted = &records[35];
        let far = records.last().unwrap();
        assert!(width(last_fitted) > 0.0);
        assert!(width(far) > width(last_fitted));
    }

    #[test]
    fn test_refit_is_deterministic() {
        // ---
        let series = seasonal_series(40, 250.0);
        let a = fit(&series, &ForecasterConfig::default()).unwrap();
        let b = fit(&series, &ForecasterConfig::default()).unwrap();
        assert_ne!(a.model_id(), b.model_id());
        assert_eq!(a.forecast(24).unwrap(), b.forecast(24).unwrap());
    }

    #[test]
    fn test_horizon_bounds() {
        // ---
        let model = fit(&seasonal_series(24, 0.0), &ForecasterConfig::default()).unwrap();
        assert!(matches!(
            model.forecast(0),
            Err(ForecastError::InvalidHorizon { horizon: 0, .. })
        ));
        assert!(matches!(
            model.forecast(37),
            Err(ForecastError::InvalidHorizon { horizon: 37, .. })
        ));
        assert_eq!(model.forecast(36).unwrap().len(), 24 + 36);
    }

    #[test]
    fn test_trend_only_when_min_points_lowered() {
        // ---
        let config = ForecasterConfig {
            min_points: 2,
            ..ForecasterConfig::default()
        };
        let series: Vec<MonthlyRecord> = (0..6)
            .map(|i| MonthlyRecord {
                month_start: add_months(month(2023, 3), i),
                total_liters: 100.0 + 10.0 * f64::from(i),
            })
            .collect();

        let model = fit(&series, &config).unwrap();
        assert!(!model.is_seasonal());
        let next = model.predict(month(2023, 9));
        assert!((next.point_estimate - 160.0).abs() < 1e-6);
    }

    #[test]
    fn test_save_and_load_preserve_forecasts() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        let model = fit(&seasonal_series(30, 300.0), &ForecasterConfig::default()).unwrap();
        model.save(&path).unwrap();
        let loaded = SeasonalModel::load(&path).unwrap();

        assert_eq!(loaded.model_id(), model.model_id());
        assert_eq!(loaded.forecast(24).unwrap(), model.forecast(24).unwrap());
    }

    #[test]
    fn test_load_missing_model_is_file_not_found() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let err = SeasonalModel::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, LoadError::FileNotFound(_)));
    }

    #[test]
    fn test_backtest_on_clean_series() {
        // ---
        let series = seasonal_series(60, 0.0);
        let report = backtest(&series, DEFAULT_HOLDOUT, &ForecasterConfig::default()).unwrap();
        assert_eq!(report.train_points, 36);
        assert_eq!(report.test_points, 24);
        assert!(report.mae < 1.0);
        assert!(report.accuracy.unwrap() > 99.9);
    }

    #[test]
    fn test_backtest_needs_more_than_holdout() {
        // ---
        let series = seasonal_series(24, 0.0);
        assert!(matches!(
            backtest(&series, 24, &ForecasterConfig::default()),
            Err(ForecastError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_normal_quantile() {
        // ---
        assert!((normal_quantile(0.9) - 1.281_551_6).abs() < 1e-6);
        assert!((normal_quantile(0.975) - 1.959_964).abs() < 1e-6);
        assert!((normal_quantile(0.5)).abs() < 1e-12);
        assert!((normal_quantile(0.01) + 2.326_348).abs() < 1e-5);
    }
}
