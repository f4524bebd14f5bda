use std::collections::HashMap;

use ndarray::{Array2, Array3, ArrayView2};

use crate::cube::{coordinate_attrs, Cube, VarAttrs};
use crate::shear::FILL_VALUE;

/// Grid spacing of the central differences (degrees).
const INTERVAL: f64 = 0.5;

/// Divergence of one level of the gridded wind field.
///
/// Central differences over the immediate neighbors; a cell is filled with
/// the sentinel when it sits on the grid boundary or any neighbor it needs
/// is masked. Units are `[input]/(0.5°)`.
pub fn divergence_level(u: ArrayView2<f64>, v: ArrayView2<f64>) -> Array2<f64> {
    let (ny, nx) = u.dim();
    let mut out = Array2::from_elem((ny, nx), FILL_VALUE);
    if ny < 3 || nx < 3 {
        return out;
    }
    for j in 1..ny - 1 {
        for i in 1..nx - 1 {
            let east = u[[j, i + 1]];
            let west = u[[j, i - 1]];
            let north = v[[j + 1, i]];
            let south = v[[j - 1, i]];
            if [east, west, north, south]
                .iter()
                .any(|&x| x == FILL_VALUE || !x.is_finite())
            {
                continue;
            }
            let ax = (east - west) / (INTERVAL * 2.0);
            let ay = (north - south) / (INTERVAL * 2.0);
            out[[j, i]] = ax + ay;
        }
    }
    out
}

/// Compute the divergence cube of a gridded wind cube, or `None` when the
/// cube carries no `U`/`V` pair.
pub fn divergence_cube(cube: &Cube) -> Option<Cube> {
    let u = cube.var("U")?;
    let v = cube.var("V")?;

    let (nlev, nlat, nlon) = u.dim();
    let mut divs = Array3::from_elem((nlev, nlat, nlon), FILL_VALUE);
    for level in 0..nlev {
        let plane = divergence_level(
            u.index_axis(ndarray::Axis(0), level),
            v.index_axis(ndarray::Axis(0), level),
        );
        divs.index_axis_mut(ndarray::Axis(0), level).assign(&plane);
    }

    Some(Cube {
        lon: cube.lon.clone(),
        lat: cube.lat.clone(),
        level: cube.level.clone(),
        time: cube.time,
        vars: vec![("divs".to_string(), divs)],
        attrs: diverge_attrs(),
    })
}

/// Attribute table of the divergence product.
pub fn diverge_attrs() -> HashMap<String, VarAttrs> {
    let mut attrs = HashMap::new();
    coordinate_attrs(&mut attrs);
    attrs.insert(
        "divs".to_string(),
        VarAttrs {
            long_name: "wind divergence.".to_string(),
            units: "(m/s)/(0.5°)".to_string(),
            fill_value: Some(FILL_VALUE),
            note: Some("Negative means convergence, positive means divergence".to_string()),
        },
    );
    attrs
}
