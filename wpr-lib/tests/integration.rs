use tempfile::TempDir;
use wpr::{
    make_grids, read_cube, shear_cube, write_cube, Cube, GridMethod, ResampledStation, FILL_VALUE,
    STD_LEVELS,
};

fn station(id: &str, lon: f64, lat: f64, hws: f64, hwd: f64) -> ResampledStation {
    let levels = STD_LEVELS.len();
    ResampledStation {
        station: Some(id.to_string()),
        lon,
        lat,
        hwd: vec![Some(hwd); levels],
        hws: vec![Some(hws); levels],
        vws: vec![Some(0.5); levels],
        hdr: vec![Some(90.0); levels],
        vdr: vec![Some(90.0); levels],
        cn2: vec![Some(1e-15); levels],
    }
}

#[test]
fn publish_and_reload_wind_cube() {
    let dir = TempDir::new().unwrap();
    let stations = vec![
        station("50000", 100.0, 20.0, 5.0, 90.0),
        station("51000", 120.0, 20.0, 8.0, 180.0),
        station("52000", 110.0, 40.0, 12.0, 270.0),
    ];
    let grids = make_grids(&stations, GridMethod::Linear);
    let cube = Cube::wind("201809071454", grids).unwrap();

    let buffer = dir.path().join("buffer");
    let dest = dir.path().join("20180907").join("201809071454.nc");
    write_cube(&cube, &buffer, &dest).unwrap();
    assert!(dest.exists());
    assert!(!buffer.join("201809071454.nc").exists(), "staged copy left behind");

    let loaded = read_cube(&dest).unwrap();
    assert_eq!(loaded.lon.len(), 80);
    assert_eq!(loaded.lat.len(), 62);
    assert_eq!(loaded.level.len(), 40);
    assert_eq!(loaded.vars.len(), 5);
    assert!((loaded.time - cube.time).abs() < 1e-9);

    let (u, v, hws) = (
        loaded.var("U").unwrap(),
        loaded.var("V").unwrap(),
        loaded.var("HWS").unwrap(),
    );
    assert_eq!(u.shape(), &[40, 62, 80]);

    let mut inside = 0usize;
    let mut outside = 0usize;
    for j in 0..62 {
        for i in 0..80 {
            let (cu, cv, cs) = (u[[0, j, i]], v[[0, j, i]], hws[[0, j, i]]);
            if cu.is_finite() && cv.is_finite() {
                assert!((cs - (cu * cu + cv * cv).sqrt()).abs() < 1e-9);
                inside += 1;
            } else {
                assert!(cs.is_nan());
                outside += 1;
            }
        }
    }
    assert!(inside > 0, "no cell inside the station hull");
    assert!(outside > 0, "convex-hull masking lost in the round trip");
}

#[test]
fn shear_of_published_cube() {
    let dir = TempDir::new().unwrap();
    let stations = vec![
        station("50000", 100.0, 20.0, 5.0, 90.0),
        station("51000", 120.0, 20.0, 8.0, 180.0),
        station("52000", 110.0, 40.0, 12.0, 270.0),
    ];
    let cube = Cube::wind("201809071454", make_grids(&stations, GridMethod::Nearest)).unwrap();
    let wind_path = dir.path().join("mkgrd").join("201809071454.nc");
    write_cube(&cube, &dir.path().join("buffer"), &wind_path).unwrap();

    let shear = shear_cube(&read_cube(&wind_path).unwrap());
    let shear_path = dir.path().join("shear").join("201809071454.nc");
    write_cube(&shear, &dir.path().join("buffer"), &shear_path).unwrap();

    let loaded = read_cube(&shear_path).unwrap();
    assert_eq!(loaded.vars.len(), 5);
    for (name, values) in &loaded.vars {
        assert_eq!(values.shape(), &[40, 62, 80], "{name} shape");
    }
    // vertically constant columns shear to zero; masked cells carry the
    // fill sentinel
    let u = loaded.var("U").unwrap();
    assert!(u.iter().all(|&v| v == FILL_VALUE || v.abs() < 1e-6));

    let hwd = loaded.var("HWD").unwrap();
    for &value in hwd.iter() {
        assert!(
            value == FILL_VALUE || (-180.0..=180.0).contains(&value),
            "angular shear {value} out of bounds"
        );
    }
}

#[test]
fn unsupported_extension_fails_without_publishing() {
    let dir = TempDir::new().unwrap();
    let cube = Cube::wind("201809071454", make_grids(&[], GridMethod::Linear)).unwrap();
    let dest = dir.path().join("201809071454.txt");
    assert!(write_cube(&cube, &dir.path().join("buffer"), &dest).is_err());
    assert!(!dest.exists());
}
