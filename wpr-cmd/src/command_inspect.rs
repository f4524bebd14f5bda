use std::collections::BTreeSet;
use std::fs;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing::warn;
use wpr::config::Config;
use wpr::{standard_slots, Time};

use crate::util;

/// The missing-slot reporter: compare the newest published day against the
/// standard slot table up to the latest published slot and keep the day's
/// accumulated missing list in `<report>/<day>.txt`.
pub fn run(config: &Config, logging: &str) -> Result<()> {
    let _guard = util::init_logging(&config.report_path.join("log"), "inspect", logging)?;
    let root = config.mkgrd.oper.save_path.as_path();
    fs::create_dir_all(&config.report_path)?;
    util::wait_for_dir(root);

    let mut missing: BTreeSet<String> = BTreeSet::new();
    let mut current_day: Option<String> = None;

    loop {
        let Some(day) = util::latest_day_dir(root)? else {
            thread::sleep(Duration::from_secs(10));
            continue;
        };
        if current_day.as_deref() != Some(day.as_str()) {
            missing.clear();
            current_day = Some(day.clone());
        }

        let published: BTreeSet<String> = util::list_file_names(&root.join(&day))?
            .iter()
            .filter_map(|name| name.split('.').next().map(str::to_string))
            .collect();

        if let Some(last) = published.iter().next_back() {
            let table = match standard_slots(&day) {
                Ok(table) => table,
                Err(err) => {
                    warn!("skipping day {day}: {err}");
                    thread::sleep(Duration::from_secs(10));
                    continue;
                }
            };
            for slot in table.iter().filter(|slot| slot.as_str() <= last.as_str()) {
                if !published.contains(slot) {
                    missing.insert(slot.clone());
                }
            }
            if !missing.is_empty() {
                write_report(config, &day, &missing)?;
            }
        }

        thread::sleep(Duration::from_secs(5));
    }
}

fn write_report(config: &Config, day: &str, missing: &BTreeSet<String>) -> Result<()> {
    let mut content = format!("{}\nmissing:\n", Time::now().minute_stamp());
    for slot in missing {
        content.push_str(slot);
        content.push('\n');
    }
    fs::write(config.report_path.join(format!("{day}.txt")), content)?;
    Ok(())
}
