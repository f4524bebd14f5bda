use std::collections::HashSet;
use std::path::{Path, PathBuf};

use hifitime::{Epoch, Unit};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

use crate::error::Result;
use crate::preset::Preset;
use crate::time::{floor_slot, match_slot, next_slot, slot_to_time, Time};

lazy_static! {
    // ..._<station5>_<yyyymmddhhmmss>_..., e.g.
    // Z_RADA_I_54511_20180907145400_P_WPRD_LC_ROBS.TXT
    static ref FILENAME_RE: Regex =
        Regex::new(r"^(?:[^_]+_){3}(?P<station>[^_]{5})_(?P<stamp>\d{14})[_.]").unwrap();
}

/// Station id and minute stamp recovered from a drop-directory file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub station: String,
    pub stamp: String,
}

/// Extract the station id and the 12-char minute stamp embedded in a raw
/// file name, or `None` if the name does not follow the convention.
pub fn parse_filename(name: &str) -> Option<FileMeta> {
    let caps = FILENAME_RE.captures(name)?;
    Some(FileMeta {
        station: caps["station"].to_string(),
        stamp: caps["stamp"][..12].to_string(),
    })
}

/// One closed slot: the nominal stamp and the files chosen for it. The file
/// set may be empty, which records a known-missing slot.
#[derive(Debug, Clone)]
pub struct SlotEvent {
    pub slot: String,
    pub files: Vec<String>,
}

/// Arrival-driven state machine turning the stream of file drops into one
/// close event per standard slot.
///
/// All clock reads are injected so the close logic is deterministic under
/// test. The persistent `files_seen`/`slots_seen` sets on disk are the
/// authoritative record across restarts; they are only updated through
/// [SlotScheduler::commit], which the stage loop calls after its output
/// write succeeded.
pub struct SlotScheduler {
    preset_dir: PathBuf,
    tag: String,
    today: String,
    expect: String,
    files_seen: Preset,
    slots_seen: Preset,
    rollover_armed_at: Option<Epoch>,
}

impl SlotScheduler {
    pub fn new(preset_dir: &Path, tag: &str, now: &Time) -> Result<Self> {
        let today = now.day_stamp();
        let (files_seen, slots_seen) = open_presets(preset_dir, tag, &today)?;
        let expect = match slots_seen.max() {
            Some(last) => next_slot(last)?,
            None => floor_slot(now),
        };
        info!("scheduler for {today} starts expecting {expect}");
        Ok(SlotScheduler {
            preset_dir: preset_dir.to_path_buf(),
            tag: tag.to_string(),
            today,
            expect,
            files_seen,
            slots_seen,
            rollover_armed_at: None,
        })
    }

    pub fn today(&self) -> &str {
        &self.today
    }

    pub fn expect(&self) -> &str {
        &self.expect
    }

    /// Arm on a wall-clock day change and fire once the 60-second grace has
    /// elapsed, tolerating the upstream writer finishing the previous day.
    pub fn rollover_due(&mut self, now: &Time) -> bool {
        if now.day_stamp() == self.today {
            self.rollover_armed_at = None;
            return false;
        }
        match self.rollover_armed_at {
            None => {
                info!("day changed from {}, arming rollover", self.today);
                self.rollover_armed_at = Some(**now);
                false
            }
            Some(armed) => (**now - armed).to_seconds() >= 60.0,
        }
    }

    /// Switch to the new UTC day and drop both persistent sets. The caller
    /// blocks for the new drop directory before calling [Self::reset_expect].
    pub fn begin_rollover(&mut self, now: &Time) -> Result<()> {
        self.files_seen.delete()?;
        self.slots_seen.delete()?;
        self.today = now.day_stamp();
        let (files_seen, slots_seen) = open_presets(&self.preset_dir, &self.tag, &self.today)?;
        self.files_seen = files_seen;
        self.slots_seen = slots_seen;
        self.rollover_armed_at = None;
        info!("rolled over to {}", self.today);
        Ok(())
    }

    pub fn reset_expect(&mut self, now: &Time) {
        self.expect = floor_slot(now);
        info!("expecting {}", self.expect);
    }

    /// Inspect the current drop-directory listing. Returns the close event
    /// for `expect` once the wall clock passed the slot's 6-minute grace,
    /// otherwise reports the running station count and returns `None`.
    pub fn poll(&mut self, files: &[String], now: &Time) -> Result<Option<SlotEvent>> {
        let close_at = *slot_to_time(&self.expect)? + Unit::Minute * 6_i64;
        let candidates = self.candidates(files);
        if **now < close_at {
            info!("{}: {} stations received", self.expect, candidates.len());
            return Ok(None);
        }
        if candidates.is_empty() {
            info!("{} closed with no stations", self.expect);
        }
        Ok(Some(SlotEvent {
            slot: self.expect.clone(),
            files: candidates,
        }))
    }

    /// Record a processed event: consumed files and the closed slot enter
    /// the persistent sets and `expect` advances to the next standard slot.
    pub fn commit(&mut self, event: &SlotEvent) -> Result<()> {
        self.files_seen.extend(event.files.iter().cloned());
        self.slots_seen.add(event.slot.clone());
        self.files_seen.save()?;
        self.slots_seen.save()?;
        self.expect = next_slot(&event.slot)?;
        Ok(())
    }

    /// Files matching `expect`, not yet consumed, deduplicated by station.
    /// The listing is sorted first so the lexicographically first file of a
    /// duplicated station wins regardless of directory iteration order.
    fn candidates(&self, files: &[String]) -> Vec<String> {
        let mut names: Vec<&String> = files.iter().collect();
        names.sort();

        let mut stations: HashSet<String> = HashSet::new();
        let mut picked = Vec::new();
        for name in names {
            if self.files_seen.contains(name) {
                continue;
            }
            let Some(meta) = parse_filename(name) else {
                debug!("ignoring unconventional file name {name}");
                continue;
            };
            let Ok(slot) = match_slot(&meta.stamp) else {
                debug!("ignoring file with bad stamp {name}");
                continue;
            };
            if slot != self.expect {
                continue;
            }
            if stations.insert(meta.station) {
                picked.push(name.clone());
            }
        }
        picked
    }
}

fn open_presets(dir: &Path, tag: &str, day: &str) -> Result<(Preset, Preset)> {
    let files_seen = Preset::open(dir.join(format!("{tag}.files.{day}.set")))?;
    let slots_seen = Preset::open(dir.join(format!("{tag}.slots.{day}.set")))?;
    Ok((files_seen, slots_seen))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::standard_slots;
    use tempfile::TempDir;

    fn fname(station: &str, stamp14: &str) -> String {
        format!("Z_RADA_I_{station}_{stamp14}_P_WPRD_LC_ROBS.TXT")
    }

    fn time(stamp: &str) -> Time {
        Time::from_stamp(stamp).unwrap()
    }

    #[test]
    fn filename_convention() {
        let meta = parse_filename("Z_RADA_I_54511_20180907145400_P_WPRD_LC_ROBS.TXT").unwrap();
        assert_eq!(meta.station, "54511");
        assert_eq!(meta.stamp, "201809071454");

        assert!(parse_filename("README.md").is_none());
        assert!(parse_filename("Z_RADA_I_54511_2018FEB7145400_P.TXT").is_none());
    }

    #[test]
    fn initial_expect_is_floor_of_now() {
        let dir = TempDir::new().unwrap();
        let sched = SlotScheduler::new(dir.path(), "robs", &time("201809071457")).unwrap();
        assert_eq!(sched.expect(), "201809071454");
    }

    #[test]
    fn poll_defers_until_grace_elapsed() {
        let dir = TempDir::new().unwrap();
        let mut sched = SlotScheduler::new(dir.path(), "robs", &time("201809071454")).unwrap();
        let files = vec![fname("54511", "20180907145400")];

        // within the 6-minute window nothing closes
        assert!(sched
            .poll(&files, &time("201809071459"))
            .unwrap()
            .is_none());

        let event = sched
            .poll(&files, &time("201809071500"))
            .unwrap()
            .expect("slot should close");
        assert_eq!(event.slot, "201809071454");
        assert_eq!(event.files, files);
    }

    #[test]
    fn duplicate_station_first_file_wins() {
        let dir = TempDir::new().unwrap();
        let mut sched = SlotScheduler::new(dir.path(), "robs", &time("201809071454")).unwrap();
        // same station, jittered stamps, listed out of order
        let files = vec![
            fname("54511", "20180907145600"),
            fname("54511", "20180907145300"),
        ];

        let event = sched
            .poll(&files, &time("201809071501"))
            .unwrap()
            .expect("slot should close");
        assert_eq!(event.files, vec![fname("54511", "20180907145300")]);
    }

    #[test]
    fn commit_is_at_most_once() {
        let dir = TempDir::new().unwrap();
        let mut sched = SlotScheduler::new(dir.path(), "robs", &time("201809071454")).unwrap();
        let files = vec![fname("54511", "20180907145400")];
        let now = time("201809071501");

        let event = sched.poll(&files, &now).unwrap().unwrap();
        sched.commit(&event).unwrap();
        assert_eq!(sched.expect(), "201809071500");

        // the consumed file is never reconsidered
        let next = sched.poll(&files, &time("201809071507")).unwrap().unwrap();
        assert_eq!(next.slot, "201809071500");
        assert!(next.files.is_empty());
    }

    #[test]
    fn backlog_closes_in_order() {
        let dir = TempDir::new().unwrap();
        let mut sched = SlotScheduler::new(dir.path(), "robs", &time("201809071454")).unwrap();
        let files = vec![
            fname("54511", "20180907145400"),
            fname("54727", "20180907150000"),
        ];
        let now = time("201809071513");

        let mut closed = Vec::new();
        while let Some(event) = sched.poll(&files, &now).unwrap() {
            sched.commit(&event).unwrap();
            closed.push(event.slot.clone());
            if closed.len() > 4 {
                break;
            }
        }
        assert_eq!(
            closed,
            vec!["201809071454", "201809071500", "201809071506"]
        );
        let day = standard_slots("20180907").unwrap();
        assert!(closed.iter().all(|slot| day.contains(slot)));
    }

    #[test]
    fn empty_slot_is_still_committed() {
        let dir = TempDir::new().unwrap();
        let mut sched = SlotScheduler::new(dir.path(), "robs", &time("201809071454")).unwrap();

        let event = sched.poll(&[], &time("201809071500")).unwrap().unwrap();
        assert!(event.files.is_empty());
        sched.commit(&event).unwrap();
        assert_eq!(sched.expect(), "201809071500");
    }

    #[test]
    fn restart_resumes_after_last_slot() {
        let dir = TempDir::new().unwrap();
        {
            let mut sched = SlotScheduler::new(dir.path(), "robs", &time("201809071454")).unwrap();
            let event = sched.poll(&[], &time("201809071501")).unwrap().unwrap();
            sched.commit(&event).unwrap();
        }
        let sched = SlotScheduler::new(dir.path(), "robs", &time("201809071502")).unwrap();
        assert_eq!(sched.expect(), "201809071500");
    }

    #[test]
    fn past_slot_files_are_ignored() {
        let dir = TempDir::new().unwrap();
        let mut sched = SlotScheduler::new(dir.path(), "robs", &time("201809071454")).unwrap();
        let files = vec![fname("54511", "20180907000000")];

        let event = sched.poll(&files, &time("201809071500")).unwrap().unwrap();
        assert!(event.files.is_empty());
    }

    #[test]
    fn rollover_arms_then_fires() {
        let dir = TempDir::new().unwrap();
        let mut sched = SlotScheduler::new(dir.path(), "robs", &time("201809072357")).unwrap();

        assert!(!sched.rollover_due(&time("201809072359")));
        // day flips: first sighting arms, 60 s later it fires
        assert!(!sched.rollover_due(&time("20180908000000")));
        assert!(!sched.rollover_due(&time("20180908000030")));
        assert!(sched.rollover_due(&time("20180908000100")));

        sched.begin_rollover(&time("20180908000100")).unwrap();
        assert_eq!(sched.today(), "20180908");
        sched.reset_expect(&time("201809080001"));
        assert_eq!(sched.expect(), "201809080000");
    }

    #[test]
    fn rollover_clears_presets() {
        let dir = TempDir::new().unwrap();
        let mut sched = SlotScheduler::new(dir.path(), "robs", &time("201809072348")).unwrap();
        let files = vec![fname("54511", "20180907234800")];
        let event = sched.poll(&files, &time("201809072354")).unwrap().unwrap();
        sched.commit(&event).unwrap();

        sched.begin_rollover(&time("20180908000200")).unwrap();
        sched.reset_expect(&time("201809080002"));

        // yesterday's consumed file is forgotten with the old sets
        let files = vec![fname("54511", "20180908000000")];
        let event = sched.poll(&files, &time("201809080006")).unwrap().unwrap();
        assert_eq!(event.slot, "201809080000");
        assert_eq!(event.files.len(), 1);
    }
}
