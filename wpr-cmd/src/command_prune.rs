use std::fs;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use hifitime::Unit;
use tracing::{info, warn};
use wpr::config::Config;
use wpr::Time;

use crate::util;

/// The pruner: every hour, delete published day directories older than the
/// retention window from all operational publish roots.
pub fn run(config: &Config, logging: &str) -> Result<()> {
    let _guard = util::init_logging(&config.remove.log_path, "rm", logging)?;
    let targets = [
        config.parse.oper.save_path.clone(),
        config.mkgrd.oper.save_path.clone(),
        config.shear.oper.save_path.clone(),
    ];

    loop {
        let retention = i64::from(config.remove.retention_days);
        let cutoff = Time::from_epoch(*Time::now() - Unit::Day * retention).day_stamp();

        for root in &targets {
            let days = match util::day_dirs(root) {
                Ok(days) => days,
                Err(err) => {
                    warn!("cannot list {}: {err}", root.display());
                    continue;
                }
            };
            for day in days {
                if day.as_str() >= cutoff.as_str() {
                    continue;
                }
                match fs::remove_dir_all(root.join(&day)) {
                    Ok(()) => info!("removed {day} dir under {}", root.display()),
                    Err(err) => warn!("failed to remove {day} under {}: {err}", root.display()),
                }
            }
        }

        thread::sleep(Duration::from_secs(3600));
    }
}
