use ndarray::Array3;

use crate::cube::{shear_attrs, Cube};

/// Sentinel for masked cells in published shear cubes.
pub const FILL_VALUE: f64 = -9999.0;

/// Finite-difference step (m); shears are stored per this step.
const DELTA: f64 = 100.0;

/// Piecewise quadratic interpolant over ascending sample points, NaN
/// outside the sampled range. Each evaluation fits the parabola through
/// the three consecutive samples bracketing the query point.
struct QuadModel {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl QuadModel {
    fn new(xs: Vec<f64>, ys: Vec<f64>) -> Option<Self> {
        if xs.len() < 3 {
            return None;
        }
        Some(QuadModel { xs, ys })
    }

    fn eval(&self, x: f64) -> f64 {
        let n = self.xs.len();
        if x < self.xs[0] || x > self.xs[n - 1] {
            return f64::NAN;
        }
        // index of the interval containing x, then the 3-point window
        // starting one node below it, clamped to the sample range
        let interval = self.xs.partition_point(|&h| h <= x).saturating_sub(1);
        let start = interval.saturating_sub(1).min(n - 3);

        let (x0, x1, x2) = (self.xs[start], self.xs[start + 1], self.xs[start + 2]);
        let (y0, y1, y2) = (self.ys[start], self.ys[start + 1], self.ys[start + 2]);
        y0 * (x - x1) * (x - x2) / ((x0 - x1) * (x0 - x2))
            + y1 * (x - x0) * (x - x2) / ((x1 - x0) * (x1 - x2))
            + y2 * (x - x0) * (x - x1) / ((x2 - x0) * (x2 - x1))
    }
}

/// Vertical shear of one column on the level grid.
///
/// NaN entries are treated as masked and dropped before the fit; a column
/// with fewer than three valid samples is fully masked. Boundary levels use
/// one-sided differences over the full step, interior levels a centered
/// difference over half steps either side.
pub fn column_shear(levels: &[f64], values: &[f64]) -> Vec<f64> {
    let n = levels.len();
    let mut xs = Vec::with_capacity(n);
    let mut ys = Vec::with_capacity(n);
    for (&level, &value) in levels.iter().zip(values) {
        if value.is_finite() {
            xs.push(level);
            ys.push(value);
        }
    }
    let Some(model) = QuadModel::new(xs, ys) else {
        return vec![f64::NAN; n];
    };

    let mut shear = Vec::with_capacity(n);
    shear.push(model.eval(levels[0] + DELTA) - model.eval(levels[0]));
    for &level in &levels[1..n - 1] {
        shear.push(model.eval(level + DELTA / 2.0) - model.eval(level - DELTA / 2.0));
    }
    shear.push(model.eval(levels[n - 1]) - model.eval(levels[n - 1] - DELTA));
    shear
}

/// Wrap an angular difference into [-180, 180].
fn wrap_degrees(d: f64) -> f64 {
    if d > 180.0 {
        d - 360.0
    } else if d < -180.0 {
        d + 360.0
    } else {
        d
    }
}

/// Compute the shear cube of a gridded wind cube.
///
/// Input cells equal to [FILL_VALUE] are masked on the way in; masked
/// outputs are stored as [FILL_VALUE] with the matching attribute.
pub fn shear_cube(cube: &Cube) -> Cube {
    let levels = &cube.level;
    let mut vars = Vec::with_capacity(cube.vars.len());

    for (name, values) in &cube.vars {
        let angular = name == "HWD";
        let (nlev, nlat, nlon) = values.dim();
        let mut out = Array3::from_elem((nlev, nlat, nlon), FILL_VALUE);

        for j in 0..nlat {
            for i in 0..nlon {
                let column: Vec<f64> = (0..nlev)
                    .map(|l| {
                        let v = values[[l, j, i]];
                        if v == FILL_VALUE {
                            f64::NAN
                        } else {
                            v
                        }
                    })
                    .collect();
                let shear = column_shear(levels, &column);
                for (l, value) in shear.into_iter().enumerate() {
                    if value.is_finite() {
                        out[[l, j, i]] = if angular { wrap_degrees(value) } else { value };
                    }
                }
            }
        }
        vars.push((name.clone(), out));
    }

    Cube {
        lon: cube.lon.clone(),
        lat: cube.lat.clone(),
        level: cube.level.clone(),
        time: cube.time,
        vars,
        attrs: shear_attrs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadratic_fit_is_exact() {
        // x -> (x/100)^2 sampled on the level grid
        let levels = [100.0, 200.0, 300.0, 400.0];
        let values: Vec<f64> = levels.iter().map(|&x| (x / 100.0).powi(2)).collect();
        let shear = column_shear(&levels, &values);

        // interior at 200 m: (2.5)^2 - (1.5)^2 = 4
        assert!((shear[1] - 4.0).abs() < 1e-9);
        assert!((shear[2] - 6.0).abs() < 1e-9);
        // one-sided boundaries: m(200)-m(100) and m(400)-m(300)
        assert!((shear[0] - 3.0).abs() < 1e-9);
        assert!((shear[3] - 7.0).abs() < 1e-9);
    }

    #[test]
    fn short_columns_are_masked() {
        let levels = [100.0, 200.0, 300.0, 400.0];
        let values = [1.0, f64::NAN, f64::NAN, 4.0];
        assert!(column_shear(&levels, &values).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn masked_cells_are_skipped_by_the_fit() {
        let levels = [100.0, 200.0, 300.0, 400.0];
        // linear profile with a hole: quadratic through the rest is exact
        let values = [1.0, f64::NAN, 3.0, 4.0];
        let shear = column_shear(&levels, &values);
        assert!((shear[2] - 1.0).abs() < 1e-9);
        assert!((shear[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_evaluations_stay_masked() {
        let levels = [100.0, 200.0, 300.0, 400.0];
        // bottom level missing: the fit starts at 200 m, so differences
        // reaching below it are masked
        let values = [f64::NAN, 2.0, 3.0, 4.0];
        let shear = column_shear(&levels, &values);
        assert!(shear[0].is_nan());
        assert!(shear[1].is_nan(), "centered difference needs 150 m");
        assert!((shear[2] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn angular_wrap_bounds() {
        assert_eq!(wrap_degrees(270.0), -90.0);
        assert_eq!(wrap_degrees(-270.0), 90.0);
        assert_eq!(wrap_degrees(90.0), 90.0);

        for d in [-350.0, -190.0, -10.0, 0.0, 170.0, 359.0] {
            let w = wrap_degrees(d);
            assert!((-180.0..=180.0).contains(&w), "{d} wrapped to {w}");
        }
    }

    #[test]
    fn shear_cube_round_trips_the_sentinel() {
        use crate::cube::wind_attrs;
        use ndarray::Array3;

        let levels = vec![100.0, 200.0, 300.0, 400.0];
        let mut values = Array3::from_elem((4, 1, 2), 0.0);
        for l in 0..4 {
            values[[l, 0, 0]] = ((l + 1) * (l + 1)) as f64; // (x/100)^2
            values[[l, 0, 1]] = FILL_VALUE; // fully masked column
        }
        let cube = Cube {
            lon: vec![85.0, 85.5],
            lat: vec![14.0],
            level: levels,
            time: 0.0,
            vars: vec![("U".to_string(), values)],
            attrs: wind_attrs(),
        };

        let shear = shear_cube(&cube);
        let out = shear.var("U").unwrap();
        assert_eq!(out.dim(), (4, 1, 2));
        assert!((out[[1, 0, 0]] - 4.0).abs() < 1e-9);
        // masked column comes back as the fill sentinel
        for l in 0..4 {
            assert_eq!(out[[l, 0, 1]], FILL_VALUE);
        }
        assert_eq!(shear.attrs["U"].fill_value, Some(FILL_VALUE));
    }

    #[test]
    fn angular_shear_wraps_into_bounds() {
        let levels = [100.0, 200.0, 300.0];
        // steep direction turn: bottom difference m(200)-m(100) = 270
        let values = [0.0, 270.0, 180.0];
        let raw = column_shear(&levels, &values);
        assert!((raw[0] - 270.0).abs() < 1e-9);
        assert_eq!(wrap_degrees(raw[0]), -90.0);
    }
}
