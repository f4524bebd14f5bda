use interp::{interp, InterpMode};
use lazy_static::lazy_static;

use crate::station::StationRecord;

lazy_static! {
    /// The fixed 40 sampling-height levels (m): 100 m spacing to 1.9 km,
    /// 250 m to 4.75 km, 500 m to 9 km.
    pub static ref STD_LEVELS: Vec<f64> = {
        let mut levels: Vec<f64> = Vec::with_capacity(40);
        levels.extend((100..2000).step_by(100).map(f64::from));
        levels.extend((2000..5000).step_by(250).map(f64::from));
        levels.extend((5000..9500).step_by(500).map(f64::from));
        levels
    };
}

/// Product variables carried through the gridding stages.
pub const PROFILE_VARS: [&str; 6] = ["HWD", "HWS", "VWS", "HDR", "VDR", "CN2"];

/// One station resampled onto [STD_LEVELS]; every column has 40 entries.
#[derive(Debug, Clone)]
pub struct ResampledStation {
    pub station: Option<String>,
    pub lon: f64,
    pub lat: f64,
    pub hwd: Vec<Option<f64>>,
    pub hws: Vec<Option<f64>>,
    pub vws: Vec<Option<f64>>,
    pub hdr: Vec<Option<f64>>,
    pub vdr: Vec<Option<f64>>,
    pub cn2: Vec<Option<f64>>,
}

/// Resample a station's profile onto the standard levels.
///
/// Per variable, source pairs keep only indices where both the sampling
/// height and the value are present. Levels outside the station's reported
/// height range stay missing so that horizontal interpolation sees honest
/// gaps rather than extrapolated values.
pub fn resample(record: &StationRecord) -> ResampledStation {
    let profile = &record.profile;
    ResampledStation {
        station: record.station.clone(),
        lon: record.lon,
        lat: record.lat,
        hwd: resample_column(&profile.sh, &profile.hwd),
        hws: resample_column(&profile.sh, &profile.hws),
        vws: resample_column(&profile.sh, &profile.vws),
        hdr: resample_column(&profile.sh, &profile.hdr),
        vdr: resample_column(&profile.sh, &profile.vdr),
        cn2: resample_column(&profile.sh, &profile.cn2),
    }
}

fn resample_column(sh: &[Option<f64>], values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut src_h: Vec<f64> = Vec::with_capacity(sh.len());
    let mut src_v: Vec<f64> = Vec::with_capacity(sh.len());
    for (height, value) in sh.iter().zip(values) {
        if let (Some(height), Some(value)) = (height, value) {
            src_h.push(*height);
            src_v.push(*value);
        }
    }
    if src_h.len() < 2 {
        return vec![None; STD_LEVELS.len()];
    }
    let bottom = src_h[0];
    let top = src_h[src_h.len() - 1];
    STD_LEVELS
        .iter()
        .map(|&level| {
            if level < bottom || level > top {
                None
            } else {
                Some(interp(&src_h, &src_v, level, &InterpMode::FirstLast))
            }
        })
        .collect()
}
