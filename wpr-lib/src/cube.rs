use std::collections::HashMap;

use ndarray::Array3;

use crate::error::Result;
use crate::horizontal::{SlotGrids, GRID_LATS, GRID_LONS};
use crate::time::slot_to_time;
use crate::vertical::STD_LEVELS;

/// Stamped on every variable of every published dataset.
pub const COPYRIGHT: &str = "This dataset is parsed, processed and packaged by \
    Beijing Presky Inc., contact us please visit : http://www.cnpresky.com";

/// Per-variable descriptive attributes.
#[derive(Debug, Clone, Default)]
pub struct VarAttrs {
    pub long_name: String,
    pub units: String,
    pub fill_value: Option<f64>,
    pub note: Option<String>,
}

impl VarAttrs {
    fn new(long_name: &str, units: &str) -> Self {
        VarAttrs {
            long_name: long_name.to_string(),
            units: units.to_string(),
            fill_value: None,
            note: None,
        }
    }

    fn with_fill(mut self, fill: f64) -> Self {
        self.fill_value = Some(fill);
        self
    }

    fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }
}

/// One slot's self-describing gridded product: fixed coordinates, a time
/// stamp in minutes since 2018-01-01 00:00:00 UTC, and named
/// `(level, lat, lon)` variables with NaN-masked cells.
#[derive(Debug, Clone)]
pub struct Cube {
    pub lon: Vec<f64>,
    pub lat: Vec<f64>,
    pub level: Vec<f64>,
    pub time: f64,
    pub vars: Vec<(String, Array3<f64>)>,
    pub attrs: HashMap<String, VarAttrs>,
}

impl Cube {
    /// Assemble the wind cube of one closed slot.
    pub fn wind(slot: &str, grids: SlotGrids) -> Result<Cube> {
        let time = slot_to_time(slot)?.grid_minutes();
        Ok(Cube {
            lon: GRID_LONS.clone(),
            lat: GRID_LATS.clone(),
            level: STD_LEVELS.clone(),
            time,
            vars: vec![
                ("U".to_string(), grids.u),
                ("V".to_string(), grids.v),
                ("HWS".to_string(), grids.hws),
                ("HWD".to_string(), grids.hwd),
                ("VWS".to_string(), grids.vws),
            ],
            attrs: wind_attrs(),
        })
    }

    pub fn var(&self, name: &str) -> Option<&Array3<f64>> {
        self.vars
            .iter()
            .find(|(var, _)| var == name)
            .map(|(_, arr)| arr)
    }
}

pub(crate) fn coordinate_attrs(attrs: &mut HashMap<String, VarAttrs>) {
    attrs.insert("lon".to_string(), VarAttrs::new("longitudes", "degree_east"));
    attrs.insert("lat".to_string(), VarAttrs::new("latitudes", "degree_north"));
    attrs.insert(
        "level".to_string(),
        VarAttrs::new("Sampling Height level", "m"),
    );
    attrs.insert(
        "time".to_string(),
        VarAttrs::new("datetime", "minutes since 2018-01-01 00:00:00"),
    );
}

/// Attribute table of the gridded wind product.
pub fn wind_attrs() -> HashMap<String, VarAttrs> {
    let mut attrs = HashMap::new();
    coordinate_attrs(&mut attrs);
    attrs.insert(
        "U".to_string(),
        VarAttrs::new("U component of wind", "m/s")
            .with_note("Vector points where the wind blows to"),
    );
    attrs.insert(
        "V".to_string(),
        VarAttrs::new("V component of wind", "m/s")
            .with_note("Vector points where the wind blows to"),
    );
    attrs.insert(
        "HWS".to_string(),
        VarAttrs::new("Horizontal Wind Speed", "m/s"),
    );
    attrs.insert(
        "HWD".to_string(),
        VarAttrs::new("Horizontal Wind Direction", "degree"),
    );
    attrs.insert(
        "VWS".to_string(),
        VarAttrs::new("Vertical Wind Speed", "m/s"),
    );
    attrs
}

/// Attribute table of the vertical-shear product; shears are stored per
/// 100 m with masked cells as the -9999 fill.
pub fn shear_attrs() -> HashMap<String, VarAttrs> {
    let fill = -9999.0;
    let mut attrs = HashMap::new();
    coordinate_attrs(&mut attrs);
    attrs.insert(
        "U".to_string(),
        VarAttrs::new("vertical shear of U component", "(m/s)/(100m)").with_fill(fill),
    );
    attrs.insert(
        "V".to_string(),
        VarAttrs::new("vertical shear of V component", "(m/s)/(100m)").with_fill(fill),
    );
    attrs.insert(
        "HWS".to_string(),
        VarAttrs::new("vertical shear of horizontal wind speed", "(m/s)/(100m)").with_fill(fill),
    );
    attrs.insert(
        "HWD".to_string(),
        VarAttrs::new("vertical shear of horizontal wind direction", "degree/(100m)")
            .with_fill(fill)
            .with_note("Differences are wrapped into [-180, 180]"),
    );
    attrs.insert(
        "VWS".to_string(),
        VarAttrs::new("vertical shear of vertical wind speed", "(m/s)/(100m)").with_fill(fill),
    );
    attrs
}
