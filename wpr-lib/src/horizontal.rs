use lazy_static::lazy_static;
use ndarray::{Array2, Array3};
use serde::Deserialize;
use spade::{DelaunayTriangulation, HasPosition, Point2, Triangulation};
use tracing::debug;

use crate::vertical::{ResampledStation, STD_LEVELS};

lazy_static! {
    /// Fixed longitude grid: 85°E to 124.5°E, 0.5° spacing.
    pub static ref GRID_LONS: Vec<f64> = half_degree_axis(85.0, 125.0);
    /// Fixed latitude grid: 14°N to 44.5°N, 0.5° spacing.
    pub static ref GRID_LATS: Vec<f64> = half_degree_axis(14.0, 45.0);
}

fn half_degree_axis(start: f64, stop: f64) -> Vec<f64> {
    let count = ((stop - start) * 2.0).round() as usize;
    (0..count).map(|i| start + i as f64 * 0.5).collect()
}

/// Scatter-to-grid evaluation scheme. Linear and cubic mask everything
/// outside the convex hull of the stations; nearest fills each Voronoi
/// region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridMethod {
    #[default]
    Linear,
    Cubic,
    Nearest,
}

/// The five gridded wind variables of one slot, each `(level, lat, lon)`
/// with NaN marking masked cells.
#[derive(Debug, Clone)]
pub struct SlotGrids {
    pub u: Array3<f64>,
    pub v: Array3<f64>,
    pub hws: Array3<f64>,
    pub hwd: Array3<f64>,
    pub vws: Array3<f64>,
}

/// Horizontally interpolate the vertically-resampled stations of one slot
/// onto the fixed grid at every standard level.
///
/// Speed/direction pairs are converted to components per station, the
/// components are gridded independently, and speed and direction are
/// recovered from the gridded components. The stored `U`/`V` are negated so
/// the vector points where the wind blows to. Contributions are sorted by
/// station id so the result does not depend on iteration order.
pub fn make_grids(stations: &[ResampledStation], method: GridMethod) -> SlotGrids {
    let mut stations: Vec<&ResampledStation> = stations.iter().collect();
    stations.sort_by(|a, b| a.station.cmp(&b.station));

    let shape = (STD_LEVELS.len(), GRID_LATS.len(), GRID_LONS.len());
    let mut grids = SlotGrids {
        u: Array3::from_elem(shape, f64::NAN),
        v: Array3::from_elem(shape, f64::NAN),
        hws: Array3::from_elem(shape, f64::NAN),
        hwd: Array3::from_elem(shape, f64::NAN),
        vws: Array3::from_elem(shape, f64::NAN),
    };

    for level in 0..STD_LEVELS.len() {
        grid_wind_level(&stations, level, method, &mut grids);
        grid_scalar_level(&stations, level, method, &mut grids.vws);
    }
    grids
}

fn grid_wind_level(
    stations: &[&ResampledStation],
    level: usize,
    method: GridMethod,
    grids: &mut SlotGrids,
) {
    let mut lons = Vec::with_capacity(stations.len());
    let mut lats = Vec::with_capacity(stations.len());
    let mut us = Vec::with_capacity(stations.len());
    let mut vs = Vec::with_capacity(stations.len());
    for station in stations {
        if let (Some(dir), Some(speed)) = (station.hwd[level], station.hws[level]) {
            let rad = dir.to_radians();
            lons.push(station.lon);
            lats.push(station.lat);
            us.push(speed * rad.sin());
            vs.push(speed * rad.cos());
        }
    }

    let grid_u = griddata(&lons, &lats, &us, method);
    let grid_v = griddata(&lons, &lats, &vs, method);
    for j in 0..GRID_LATS.len() {
        for i in 0..GRID_LONS.len() {
            let (cu, cv) = (grid_u[[j, i]], grid_v[[j, i]]);
            if !cu.is_finite() || !cv.is_finite() {
                continue;
            }
            let mut speed = (cu * cu + cv * cv).sqrt();
            if method == GridMethod::Cubic && speed < 0.0 {
                speed = 0.0;
            }
            let dir = (cu / speed).asin().to_degrees();
            grids.u[[level, j, i]] = -cu;
            grids.v[[level, j, i]] = -cv;
            grids.hws[[level, j, i]] = speed;
            if dir.is_finite() {
                grids.hwd[[level, j, i]] = dir;
            }
        }
    }
}

fn grid_scalar_level(
    stations: &[&ResampledStation],
    level: usize,
    method: GridMethod,
    out: &mut Array3<f64>,
) {
    let mut lons = Vec::with_capacity(stations.len());
    let mut lats = Vec::with_capacity(stations.len());
    let mut values = Vec::with_capacity(stations.len());
    for station in stations {
        if let Some(value) = station.vws[level] {
            lons.push(station.lon);
            lats.push(station.lat);
            values.push(value);
        }
    }
    let grid = griddata(&lons, &lats, &values, method);
    for j in 0..GRID_LATS.len() {
        for i in 0..GRID_LONS.len() {
            let value = grid[[j, i]];
            if value.is_finite() {
                out[[level, j, i]] = value;
            }
        }
    }
}

struct GridSample {
    position: Point2<f64>,
    value: f64,
}

impl HasPosition for GridSample {
    type Scalar = f64;

    fn position(&self) -> Point2<f64> {
        self.position
    }
}

/// Interpolate scattered samples onto the full lon×lat mesh. Returns an
/// all-NaN grid when the sample set is empty or the triangulation cannot
/// be built.
fn griddata(lons: &[f64], lats: &[f64], values: &[f64], method: GridMethod) -> Array2<f64> {
    let mut grid = Array2::from_elem((GRID_LATS.len(), GRID_LONS.len()), f64::NAN);

    let mut triangulation: DelaunayTriangulation<GridSample> = DelaunayTriangulation::new();
    for ((&lon, &lat), &value) in lons.iter().zip(lats).zip(values) {
        if !lon.is_finite() || !lat.is_finite() || !value.is_finite() {
            continue;
        }
        let sample = GridSample {
            position: Point2::new(lon, lat),
            value,
        };
        if let Err(err) = triangulation.insert(sample) {
            debug!("triangulation rejected ({lon}, {lat}): {err}");
            return grid;
        }
    }
    if triangulation.num_vertices() == 0 {
        return grid;
    }

    match method {
        GridMethod::Linear => {
            let barycentric = triangulation.barycentric();
            fill(&mut grid, |point| {
                barycentric.interpolate(|v| v.data().value, point)
            });
        }
        GridMethod::Cubic => {
            let natural = triangulation.natural_neighbor();
            fill(&mut grid, |point| {
                natural.interpolate(|v| v.data().value, point)
            });
        }
        GridMethod::Nearest => {
            fill(&mut grid, |point| {
                triangulation
                    .nearest_neighbor(point)
                    .map(|v| v.data().value)
            });
        }
    }
    grid
}

fn fill<F>(grid: &mut Array2<f64>, lookup: F)
where
    F: Fn(Point2<f64>) -> Option<f64>,
{
    for (j, &lat) in GRID_LATS.iter().enumerate() {
        for (i, &lon) in GRID_LONS.iter().enumerate() {
            if let Some(value) = lookup(Point2::new(lon, lat)) {
                if value.is_finite() {
                    grid[[j, i]] = value;
                }
            }
        }
    }
}
