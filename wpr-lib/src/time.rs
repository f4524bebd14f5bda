use std::ops::Deref;

use hifitime::{Epoch, Unit};

use crate::error::{Error, Result};

/// Epoch of the cube `time` coordinate, minutes since 2018-01-01 00:00:00 UTC.
const GRID_EPOCH: (i32, u8, u8) = (2018, 1, 1);

/// Number of standard 6-minute slots in one UTC day.
pub const SLOTS_PER_DAY: usize = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Time(Epoch);

impl AsRef<Epoch> for Time {
    fn as_ref(&self) -> &Epoch {
        &self.0
    }
}

impl Deref for Time {
    type Target = Epoch;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Time {
    pub fn now() -> Self {
        Time(Epoch::now().expect("failed to get system time"))
    }

    pub fn from_epoch(epoch: Epoch) -> Self {
        Time(epoch)
    }

    /// Parse a UTC stamp of the form `YYYYMMDD`, `YYYYMMDDhhmm` or
    /// `YYYYMMDDhhmmss`.
    pub fn from_stamp(stamp: &str) -> Result<Self> {
        let bad = || Error::SlotFormat(stamp.to_string());
        if !matches!(stamp.len(), 8 | 12 | 14) || !stamp.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        let year: i32 = stamp[..4].parse().map_err(|_| bad())?;
        let month: u8 = stamp[4..6].parse().map_err(|_| bad())?;
        let day: u8 = stamp[6..8].parse().map_err(|_| bad())?;
        let (mut hour, mut minute, mut second) = (0u8, 0u8, 0u8);
        if stamp.len() >= 12 {
            hour = stamp[8..10].parse().map_err(|_| bad())?;
            minute = stamp[10..12].parse().map_err(|_| bad())?;
        }
        if stamp.len() == 14 {
            second = stamp[12..14].parse().map_err(|_| bad())?;
        }

        Epoch::maybe_from_gregorian_utc(year, month, day, hour, minute, second, 0)
            .map(Time)
            .map_err(|_| bad())
    }

    /// UTC day as `YYYYMMDD`.
    pub fn day_stamp(&self) -> String {
        let (y, m, d, ..) = self.0.to_gregorian_utc();
        format!("{y:04}{m:02}{d:02}")
    }

    /// UTC instant truncated to the minute, as `YYYYMMDDhhmm`.
    pub fn minute_stamp(&self) -> String {
        let (y, m, d, hh, mm, ..) = self.0.to_gregorian_utc();
        format!("{y:04}{m:02}{d:02}{hh:02}{mm:02}")
    }

    /// Minutes since the grid epoch (2018-01-01 00:00:00 UTC).
    pub fn grid_minutes(&self) -> f64 {
        let (y, m, d) = GRID_EPOCH;
        let epoch = Epoch::from_gregorian_utc_at_midnight(y, m, d);
        (self.0 - epoch).to_unit(Unit::Minute)
    }
}

/// Current UTC day as `YYYYMMDD`.
pub fn today_utc() -> String {
    Time::now().day_stamp()
}

/// The 240 standard slot stamps of one UTC day, in increasing order.
pub fn standard_slots(day: &str) -> Result<Vec<String>> {
    // validates the day stamp as a side effect
    Time::from_stamp(day)?;
    let mut slots = Vec::with_capacity(SLOTS_PER_DAY);
    for hour in 0..24 {
        for minute in (0..60).step_by(6) {
            slots.push(format!("{day}{hour:02}{minute:02}"));
        }
    }
    Ok(slots)
}

/// Absolute UTC instant of a 12-char slot stamp.
pub fn slot_to_time(stamp: &str) -> Result<Time> {
    if stamp.len() != 12 {
        return Err(Error::SlotFormat(stamp.to_string()));
    }
    Time::from_stamp(stamp)
}

/// The standard slot 6 minutes after `stamp`, crossing day boundaries.
pub fn next_slot(stamp: &str) -> Result<String> {
    let time = slot_to_time(stamp)?;
    Ok(Time(*time + Unit::Minute * 6_i64).minute_stamp())
}

/// Match a raw minute stamp to the nearest standard slot of the same hour.
///
/// Equivalent to scanning the full-day table: the minute is rounded to the
/// nearest multiple of 6 within the hour, ties break toward the lower slot
/// and minutes past 57 stay on the hour's last slot.
pub fn match_slot(raw: &str) -> Result<String> {
    if raw.len() != 12 {
        return Err(Error::SlotFormat(raw.to_string()));
    }
    // validates digits and calendar fields
    slot_to_time(raw)?;
    let minute: u8 = raw[10..12]
        .parse()
        .map_err(|_| Error::SlotFormat(raw.to_string()))?;
    let rem = minute % 6;
    let slot_minute = if rem <= 3 {
        minute - rem
    } else {
        (minute - rem + 6).min(54)
    };
    Ok(format!("{}{slot_minute:02}", &raw[..10]))
}

/// Largest standard slot at or before `time`.
pub fn floor_slot(time: &Time) -> String {
    let (y, m, d, hh, mm, ..) = time.to_gregorian_utc();
    let slot_minute = mm - mm % 6;
    format!("{y:04}{m:02}{d:02}{hh:02}{slot_minute:02}")
}
