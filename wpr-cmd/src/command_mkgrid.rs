use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};
use wpr::config::{Config, StagePaths};
use wpr::{make_grids, read_slot_records, resample, write_cube, Cube, Preset, ResampledStation};

use crate::util;

fn stage<'a>(config: &'a Config, mode: Option<&str>) -> Result<(&'a Path, &'a StagePaths)> {
    match mode {
        None => Ok((config.parse.oper.save_path.as_path(), &config.mkgrd.oper)),
        Some("test1") => Ok((config.parse.oper.save_path.as_path(), &config.mkgrd.test)),
        Some("test2") => Ok((config.parse.test.save_path.as_path(), &config.mkgrd.test)),
        Some(other) => {
            Err(wpr::Error::ConfigInvalid(format!("unknown mkgrid mode {other}")).into())
        }
    }
}

/// The gridding stage: pick up new per-slot record sets from the parse
/// stage and publish one wind cube per slot.
pub fn run(config: &Config, mode: Option<&str>, logging: &str) -> Result<()> {
    let (input_root, stage) = stage(config, mode)?;
    let _guard = util::init_logging(&stage.log_path, "wprd", logging)?;
    let buffer: PathBuf = stage
        .buffer_path
        .clone()
        .ok_or_else(|| wpr::Error::ConfigInvalid("mkgrd buffer_path missing".to_string()))?;
    let method = config.mkgrd.method;

    fs::create_dir_all(&stage.save_path)?;
    fs::create_dir_all(&stage.preset_path)?;
    fs::create_dir_all(&buffer)?;
    let mut preset = Preset::open(stage.preset_path.join("mg.set"))?;

    info!("initial");
    util::wait_for_dir(input_root);

    loop {
        let Some(day) = util::latest_day_dir(input_root)? else {
            thread::sleep(Duration::from_secs(10));
            continue;
        };
        let indir = input_root.join(&day);
        let files = util::list_file_names(&indir)?;
        let mut fresh = preset.difference(files.iter().map(String::as_str));
        fresh.retain(|name| name.ends_with(".json"));
        fresh.sort();

        if !fresh.is_empty() {
            info!("dir {day} has {} new files", fresh.len());
        }
        for name in fresh {
            let slot = name.trim_end_matches(".json");
            let cube = match load_cube(&indir.join(&name), slot, method) {
                Ok(cube) => cube,
                Err(err) => {
                    warn!("skipping {name}: {err:#}");
                    preset.add(name.clone());
                    preset.save()?;
                    continue;
                }
            };
            let dest = stage.save_path.join(&day).join(format!("{slot}.nc"));
            write_cube(&cube, &buffer, &dest)
                .with_context(|| format!("publishing {}", dest.display()))?;
            preset.add(name.clone());
            preset.save()?;
            info!("{name} finished");
        }

        thread::sleep(Duration::from_secs(5));
    }
}

fn load_cube(path: &Path, slot: &str, method: wpr::GridMethod) -> Result<Cube> {
    let records = read_slot_records(path)?;
    let resampled: Vec<ResampledStation> = records.iter().map(resample).collect();
    let grids = make_grids(&resampled, method);
    Ok(Cube::wind(slot, grids)?)
}
