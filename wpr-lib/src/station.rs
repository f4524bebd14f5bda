use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Token lengths identifying the six header fields, in field order:
/// station, lon, lat, altitude, wave band, observation time.
const HEADER_LENS: [usize; 6] = [5, 9, 8, 7, 2, 14];

/// Gappy per-height product columns of one station. All columns have the
/// same length as `sh`; a `None` cell is a missing measurement (the raw
/// `/////` sentinel or any other non-numeric token).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "SH")]
    pub sh: Vec<Option<f64>>,
    #[serde(rename = "HWD")]
    pub hwd: Vec<Option<f64>>,
    #[serde(rename = "HWS")]
    pub hws: Vec<Option<f64>>,
    #[serde(rename = "VWS")]
    pub vws: Vec<Option<f64>>,
    #[serde(rename = "HDR")]
    pub hdr: Vec<Option<f64>>,
    #[serde(rename = "VDR")]
    pub vdr: Vec<Option<f64>>,
    #[serde(rename = "CN2")]
    pub cn2: Vec<Option<f64>>,
}

impl Profile {
    pub fn len(&self) -> usize {
        self.sh.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sh.is_empty()
    }

    /// Column selector by product variable name.
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        match name {
            "HWD" => Some(&self.hwd),
            "HWS" => Some(&self.hws),
            "VWS" => Some(&self.vws),
            "HDR" => Some(&self.hdr),
            "VDR" => Some(&self.vdr),
            "CN2" => Some(&self.cn2),
            _ => None,
        }
    }
}

/// One station's header and profile for a single slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationRecord {
    pub station: Option<String>,
    pub lon: f64,
    pub lat: f64,
    pub altitude: f64,
    pub wave: Option<String>,
    #[serde(rename = "time")]
    pub obs_time: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub profile: Profile,
}

/// Parse one raw station text file.
///
/// Layout: line 0 starts with the product kind, line 1 is the header, line
/// 2 is skipped, the body runs to one line before EOF. Header fields are
/// recovered by their length signature so that absent fields land in the
/// right slot.
pub fn parse_station(path: &Path) -> Result<StationRecord> {
    let raw = fs::read(path).map_err(|err| Error::input(path, err.to_string()))?;
    let text = String::from_utf8_lossy(&raw);
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() < 4 {
        return Err(Error::input(path, "truncated file"));
    }

    let kind = lines[0]
        .split_whitespace()
        .next()
        .ok_or_else(|| Error::input(path, "missing product kind"))?
        .to_string();

    let fields = resolve_header(lines[1])
        .ok_or_else(|| Error::parse(path, "header length signature cannot be resolved"))?;
    let [station, lon, lat, altitude, wave, obs_time] = fields;

    let numeric = |field: Option<String>, name: &str| -> Result<f64> {
        field
            .as_deref()
            .and_then(|v| v.parse::<f64>().ok())
            .ok_or_else(|| Error::parse(path, format!("header field {name} is not numeric")))
    };
    let lon = numeric(lon, "lon")?;
    let lat = numeric(lat, "lat")?;
    let altitude = numeric(altitude, "altitude")?;

    let mut profile = Profile::default();
    for line in &lines[3..lines.len() - 1] {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != 7 {
            return Err(Error::parse(
                path,
                format!("body row has {} tokens, expected 7", tokens.len()),
            ));
        }
        let cell = |idx: usize| tokens[idx].parse::<f64>().ok();
        profile.sh.push(cell(0));
        profile.hwd.push(cell(1));
        profile.hws.push(cell(2));
        profile.vws.push(cell(3));
        profile.hdr.push(cell(4));
        profile.vdr.push(cell(5));
        profile.cn2.push(cell(6));
    }

    let heights: Vec<f64> = profile.sh.iter().flatten().copied().collect();
    if heights.windows(2).any(|w| w[0] >= w[1]) {
        return Err(Error::parse(path, "sample heights are not increasing"));
    }

    Ok(StationRecord {
        station,
        lon,
        lat,
        altitude,
        wave,
        obs_time,
        kind,
        profile,
    })
}

/// Place each header token into its length-signature slot. Returns `None`
/// when a token has an unknown length or two tokens claim the same slot.
fn resolve_header(line: &str) -> Option<[Option<String>; 6]> {
    let mut slots: [Option<String>; 6] = Default::default();
    for token in line.split_whitespace() {
        let idx = HEADER_LENS.iter().position(|&len| len == token.len())?;
        if slots[idx].is_some() {
            return None;
        }
        slots[idx] = Some(token.to_string());
    }
    Some(slots)
}

/// Write one slot's records as line-delimited JSON (missing cells become
/// `null`).
pub fn write_slot_records(path: &Path, records: &[StationRecord]) -> Result<()> {
    let mut out = BufWriter::new(fs::File::create(path)?);
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Read a slot file written by [write_slot_records].
pub fn read_slot_records(path: &Path) -> Result<Vec<StationRecord>> {
    let text = fs::read_to_string(path)?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(Error::from))
        .collect()
}
