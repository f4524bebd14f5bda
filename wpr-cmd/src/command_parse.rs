use std::fs;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};
use wpr::config::{Config, StagePaths};
use wpr::{parse_station, today_utc, write_slot_records, SlotScheduler, Time};

use crate::util;

fn stage<'a>(config: &'a Config, mode: Option<&str>) -> Result<&'a StagePaths> {
    match mode {
        None => Ok(&config.parse.oper),
        Some("test" | "test_local") => Ok(&config.parse.test),
        Some(other) => {
            Err(wpr::Error::ConfigInvalid(format!("unknown parse mode {other}")).into())
        }
    }
}

/// The ingest stage: drive the slot scheduler over today's drop directory
/// and write one record-set file per closed slot.
pub fn run(config: &Config, mode: Option<&str>, logging: &str) -> Result<()> {
    let stage = stage(config, mode)?;
    let _guard = util::init_logging(&stage.log_path, "wprd", logging)?;
    let root = &config.data_source;

    fs::create_dir_all(&stage.save_path)?;
    fs::create_dir_all(&stage.preset_path)?;

    util::wait_for_dir(&root.join(today_utc()));
    let mut sched = SlotScheduler::new(&stage.preset_path, "robs", &Time::now())?;
    util::wait_for_nonempty(&root.join(sched.today()));
    info!("initialize");

    loop {
        let now = Time::now();
        if sched.rollover_due(&now) {
            sched.begin_rollover(&now)?;
            let inpath = root.join(sched.today());
            util::wait_for_dir(&inpath);
            util::wait_for_nonempty(&inpath);
            sched.reset_expect(&Time::now());
        }

        let inpath = root.join(sched.today());
        let savedir = stage.save_path.join(sched.today());
        fs::create_dir_all(&savedir)?;

        // close every slot whose grace window has elapsed before sleeping;
        // after downtime this drains the backlog in order
        loop {
            let files = match util::list_file_names(&inpath) {
                Ok(files) => files,
                Err(err) => {
                    warn!("cannot list {}: {err}", inpath.display());
                    break;
                }
            };
            let Some(event) = sched.poll(&files, &Time::now())? else {
                break;
            };
            info!("processing: {}", event.slot);

            let mut records = Vec::with_capacity(event.files.len());
            for name in &event.files {
                match parse_station(&inpath.join(name)) {
                    Ok(record) => records.push(record),
                    Err(err) => warn!("dropping {name}: {err}"),
                }
            }
            if records.is_empty() {
                info!("{} closed with no usable stations", event.slot);
            } else {
                let dest = savedir.join(format!("{}.json", event.slot));
                write_slot_records(&dest, &records)
                    .with_context(|| format!("writing {}", dest.display()))?;
            }
            sched.commit(&event)?;
        }

        thread::sleep(Duration::from_secs(20));
    }
}
