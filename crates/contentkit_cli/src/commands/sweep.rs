//! Sweep command implementation.

use contentkit_cache::{CacheStore, SweepReport};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Runs the sweep command.
pub fn run(dir: &Path, horizon_hours: u64, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !dir.is_dir() {
        return Err(format!("No cache found at {:?}", dir).into());
    }
    let horizon = horizon(horizon_hours)?;
    info!("Sweeping cache at {:?}", dir);
    let store = CacheStore::open(dir)?;

    println!("Sweeping cache at {:?} (horizon {}h)", dir, horizon_hours);
    if dry_run {
        println!("(dry run - no changes will be made)");
        println!();
        let expired = expired_keys(&store, horizon)?;
        for key in &expired {
            println!("  would remove {}", key);
        }
        println!();
        println!("{} record(s) past the horizon", expired.len());
        return Ok(());
    }

    let report = store.sweep(horizon)?;
    print_report(&report);
    Ok(())
}

/// Converts `--horizon-hours` into a duration.
pub fn horizon(hours: u64) -> Result<Duration, Box<dyn std::error::Error>> {
    hours
        .checked_mul(60 * 60)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("Horizon of {} hours is too large", hours).into())
}

/// Returns the keys of readable records older than `horizon`.
pub fn expired_keys(
    store: &CacheStore,
    horizon: Duration,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let now = store.now_millis();
    let horizon = u64::try_from(horizon.as_millis()).unwrap_or(u64::MAX);
    Ok(store
        .entries()?
        .into_iter()
        .filter(|r| r.age_millis(now) > horizon)
        .map(|r| r.key.to_string())
        .collect())
}

fn print_report(report: &SweepReport) {
    println!();
    println!("Sweep Results:");
    println!("  Scanned: {}", report.scanned);
    println!("  Expired: {}", report.removed);
    println!("  Corrupt: {}", report.corrupt);
}
