use std::fs;
use std::path::Path;

use ndarray::Array3;
use serde_json::{json, Value};
use tracing::debug;

use crate::cube::{Cube, VarAttrs, COPYRIGHT};
use crate::error::{Error, Result};

/// Names of the gridded wind variables, in storage order.
pub const CUBE_VARS: [&str; 5] = ["U", "V", "HWS", "HWD", "VWS"];

/// Publish one slot cube.
///
/// The file is fully written under `buffer_dir` and then renamed into
/// place, so readers of the publish directory never observe a partial
/// file. The output format follows the destination extension: `nc` for the
/// netCDF cube, `json` for the fallback encoding where masked cells become
/// `null`. Anything else is an output error.
pub fn write_cube(cube: &Cube, buffer_dir: &Path, dest: &Path) -> Result<()> {
    let ext = dest
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let name = dest
        .file_name()
        .ok_or_else(|| Error::OutputExtension(dest.display().to_string()))?;

    fs::create_dir_all(buffer_dir)?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let staged = buffer_dir.join(name);
    match ext.as_str() {
        "nc" => write_netcdf(cube, &staged)?,
        "json" => write_json(cube, &staged)?,
        _ => return Err(Error::OutputExtension(dest.display().to_string())),
    }
    fs::rename(&staged, dest)?;
    debug!("published {}", dest.display());
    Ok(())
}

fn write_netcdf(cube: &Cube, path: &Path) -> Result<()> {
    let mut file = netcdf::create(path)?;

    file.add_dimension("lon", cube.lon.len())?;
    file.add_dimension("lat", cube.lat.len())?;
    file.add_dimension("level", cube.level.len())?;
    file.add_unlimited_dimension("time")?;

    write_coordinate(&mut file, "lon", &cube.lon, cube.attrs.get("lon"))?;
    write_coordinate(&mut file, "lat", &cube.lat, cube.attrs.get("lat"))?;
    write_coordinate(&mut file, "level", &cube.level, cube.attrs.get("level"))?;

    let mut time = file.add_variable::<f64>("time", &["time"])?;
    time.put_values(&[cube.time], 0..1)?;
    write_attributes(&mut time, cube.attrs.get("time"))?;

    for (name, values) in &cube.vars {
        let mut var = file.add_variable::<f64>(name, &["level", "lat", "lon"])?;
        let flat: Vec<f64> = values.iter().copied().collect();
        var.put_values(&flat, ..)?;
        write_attributes(&mut var, cube.attrs.get(name.as_str()))?;
    }
    Ok(())
}

fn write_coordinate(
    file: &mut netcdf::FileMut,
    name: &str,
    values: &[f64],
    attrs: Option<&VarAttrs>,
) -> Result<()> {
    let mut var = file.add_variable::<f64>(name, &[name])?;
    var.put_values(values, ..)?;
    write_attributes(&mut var, attrs)
}

fn write_attributes(var: &mut netcdf::VariableMut<'_>, attrs: Option<&VarAttrs>) -> Result<()> {
    if let Some(attrs) = attrs {
        var.put_attribute("long_name", attrs.long_name.as_str())?;
        var.put_attribute("units", attrs.units.as_str())?;
        if let Some(fill) = attrs.fill_value {
            var.put_attribute("fill_value", fill)?;
        }
        if let Some(note) = &attrs.note {
            var.put_attribute("note", note.as_str())?;
        }
    }
    var.put_attribute("copyright", COPYRIGHT)?;
    Ok(())
}

fn write_json(cube: &Cube, path: &Path) -> Result<()> {
    let mut vars = serde_json::Map::new();
    for (name, values) in &cube.vars {
        let levels: Vec<Value> = values
            .outer_iter()
            .map(|plane| {
                let rows: Vec<Value> = plane
                    .outer_iter()
                    .map(|row| {
                        Value::Array(row.iter().map(|&v| json_cell(v)).collect())
                    })
                    .collect();
                Value::Array(rows)
            })
            .collect();
        vars.insert(name.clone(), Value::Array(levels));
    }

    let mut attrs = serde_json::Map::new();
    for (name, var_attrs) in &cube.attrs {
        attrs.insert(
            name.clone(),
            json!({
                "long_name": var_attrs.long_name,
                "units": var_attrs.units,
                "fill_value": var_attrs.fill_value,
                "note": var_attrs.note,
                "copyright": COPYRIGHT,
            }),
        );
    }

    let document = json!({
        "lon": cube.lon,
        "lat": cube.lat,
        "level": cube.level,
        "time": cube.time,
        "variables": Value::Object(vars),
        "attributes": Value::Object(attrs),
    });
    fs::write(path, serde_json::to_string(&document)?)?;
    Ok(())
}

fn json_cell(value: f64) -> Value {
    if value.is_finite() {
        json!(value)
    } else {
        Value::Null
    }
}

/// Load a published netCDF cube (the shear stage input).
pub fn read_cube(path: &Path) -> Result<Cube> {
    let file = netcdf::open(path)?;

    let coordinate = |name: &str| -> Result<Vec<f64>> {
        file.variable(name)
            .ok_or_else(|| Error::input(path, format!("missing coordinate {name}")))?
            .get_values::<f64, _>(..)
            .map_err(Error::from)
    };
    let lon = coordinate("lon")?;
    let lat = coordinate("lat")?;
    let level = coordinate("level")?;
    let time = *coordinate("time")?
        .first()
        .ok_or_else(|| Error::input(path, "empty time coordinate"))?;

    let mut vars = Vec::new();
    for name in CUBE_VARS {
        let Some(var) = file.variable(name) else {
            continue;
        };
        let flat = var.get_values::<f64, _>(..)?;
        let values = Array3::from_shape_vec((level.len(), lat.len(), lon.len()), flat)
            .map_err(|err| Error::input(path, err.to_string()))?;
        vars.push((name.to_string(), values));
    }
    if vars.is_empty() {
        return Err(Error::input(path, "no cube variables present"));
    }

    Ok(Cube {
        lon,
        lat,
        level,
        time,
        vars,
        attrs: Default::default(),
    })
}
