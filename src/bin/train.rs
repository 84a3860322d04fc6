//! `hydro-train`: batch pipeline from the raw log to a persisted model.
//!
//! 1. Stream the historical log into daily records
//! 2. Save the daily aggregate file
//! 3. Reduce to monthly totals and, when the history is long enough,
//!    report hold-out accuracy
//! 4. Fit on the full history, persist the model and export the forecast
//!
//! Paths and tuning come from the same environment variables as the
//! server (see [`hydromind::config::load_from_env`]).
use anyhow::{anyhow, Context, Result};
use dotenvy::dotenv;

use hydromind::aggregate::{reduce_monthly, DailyAggregator};
use hydromind::logging::init_tracing;
use hydromind::{config, forecast, schema, store};

// ---

fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();
    schema::ensure_layout(&cfg)?;

    // Step 1
    // Folded row by row: a multi-year log at one-second spacing does not fit in memory
    let mut aggregator = DailyAggregator::new(cfg.sample_interval_secs);
    let scan = store::scan_historical(&cfg.historical_log_path, |reading| {
        aggregator.push(&reading)
    })
    .context("Failed to load historical log")?;
    if scan.rows == 0 {
        return Err(anyhow!(
            "No readings in {}; nothing to train on",
            cfg.historical_log_path.display()
        ));
    }
    let daily = aggregator.finish();

    // Step 2
    store::save_daily(&cfg.daily_aggregate_path, &daily)
        .context("Failed to save daily aggregate")?;

    // Step 3
    let monthly = reduce_monthly(&daily);
    tracing::info!("Monthly history: {} months", monthly.len());

    let forecaster = cfg.forecaster();
    if monthly.len() > cfg.holdout_months {
        match forecast::backtest(&monthly, cfg.holdout_months, &forecaster) {
            Ok(report) => {
                tracing::info!(
                    "Hold-out ({} months): MAE={:.2} RMSE={:.2}",
                    report.test_points,
                    report.mae,
                    report.rmse
                );
                match (report.mape, report.accuracy) {
                    (Some(mape), Some(accuracy)) => {
                        tracing::info!("MAPE={:.2}% accuracy={:.2}%", mape, accuracy)
                    }
                    _ => tracing::info!("MAPE undefined (all actuals zero)"),
                }
            }
            Err(e) => tracing::warn!("Hold-out validation skipped: {}", e),
        }
    } else {
        tracing::info!(
            "Not enough history for a {}-month hold-out; skipping validation",
            cfg.holdout_months
        );
    }

    // Step 4
    let model = forecast::fit(&monthly, &forecaster).context("Failed to fit forecast model")?;
    model.save(&cfg.model_path).context("Failed to save model")?;

    let records = model.forecast(cfg.forecast_horizon)?;
    store::save_forecast(&cfg.forecast_export_path, &records)
        .context("Failed to export forecast")?;

    tracing::info!(
        "Model {} fitted on {} months; forecast through {}",
        model.model_id(),
        model.n_observations(),
        records.last().map(|r| r.date.to_string()).unwrap_or_default()
    );
    Ok(())
}
