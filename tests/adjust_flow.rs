use std::fs;
use std::path::Path;

use ev_shift::actions::Action;
use ev_shift::capture::Image;
use ev_shift::config::Config;
use ev_shift::host::SidecarHost;
use ev_shift::params::{self, ExposureParams};
use ev_shift::{AdjustError, pipeline, xmp};
use tempfile::TempDir;

fn sidecar_with_exposure(exposure: f32) -> String {
    let hex = params::encode(&ExposureParams::default().with_exposure(exposure));
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/" x:xmptk="XMP Core 4.4.0-Exiv2">
 <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <rdf:Description rdf:about=""
    xmlns:darktable="http://darktable.sf.net/"
    darktable:history_end="2">
   <darktable:history>
    <rdf:Seq>
     <rdf:li
      darktable:num="0"
      darktable:operation="temperature"
      darktable:params="0000803f"/>
     <rdf:li
      darktable:num="1"
      darktable:operation="exposure"
      darktable:enabled="1"
      darktable:modversion="6"
      darktable:params="{hex}"/>
    </rdf:Seq>
   </darktable:history>
  </rdf:Description>
 </rdf:RDF>
</x:xmpmeta>
"#
    )
}

fn image(dir: &Path, name: &str, exposure_time: f64, exposure: Option<f32>) -> Image {
    let sidecar = dir.join(format!("{name}.xmp"));
    if let Some(exposure) = exposure {
        fs::write(&sidecar, sidecar_with_exposure(exposure)).unwrap();
    }
    Image::new(dir.join(name), sidecar, 2.8, exposure_time, 400.0)
}

fn latest_exposure(image: &Image) -> f32 {
    xmp::read_latest_exposure(&image.sidecar_path)
        .unwrap()
        .unwrap()
        .exposure
}

#[test]
fn plus_one_writes_new_history_entry() {
    let dir = TempDir::new().unwrap();
    let images = vec![
        image(dir.path(), "a.cr2", 1.0 / 200.0, Some(0.2)),
        image(dir.path(), "b.cr2", 1.0 / 200.0, Some(-0.5)),
    ];
    let config = Config::default();
    let mut host = SidecarHost::new(false, true);

    let results = Action::PlusOne.run(&images, &mut host, &config).unwrap();
    assert!(results.iter().all(|r| r.is_ok()));
    assert!((latest_exposure(&images[0]) - 1.2).abs() < 1e-6);
    assert!((latest_exposure(&images[1]) - 0.5).abs() < 1e-6);
    assert_eq!(host.registered(), 0);

    let text = fs::read_to_string(&images[0].sidecar_path).unwrap();
    assert_eq!(xmp::read_history_end(&text), Some(3));
    let history = xmp::parse_history(&text);
    assert_eq!(history.len(), 3);
    assert_eq!(history[2].sequence_number, 2);

    // Other fields survive the shift
    let latest = xmp::read_latest_exposure(&images[0].sidecar_path).unwrap().unwrap();
    assert_eq!(latest.with_exposure(0.7), ExposureParams::default());

    assert!(dir.path().join("a.cr2.xmp.bak").exists());
}

#[test]
fn repeated_shifts_stack() {
    let dir = TempDir::new().unwrap();
    let images = vec![image(dir.path(), "a.nef", 1.0 / 60.0, Some(0.0))];
    let config = Config::default();
    let mut host = SidecarHost::new(false, false);

    for _ in 0..3 {
        Action::PlusThird.run(&images, &mut host, &config).unwrap();
    }
    assert!((latest_exposure(&images[0]) - 1.0).abs() < 1e-5);
    assert!(!dir.path().join("a.nef.xmp.bak").exists());
}

#[test]
fn missing_sidecar_does_not_stop_batch() {
    let dir = TempDir::new().unwrap();
    let images = vec![
        image(dir.path(), "a.cr2", 1.0 / 200.0, None),
        image(dir.path(), "b.cr2", 1.0 / 200.0, Some(0.0)),
    ];
    let mut host = SidecarHost::new(false, false);

    let results = pipeline::adjust_by(&images, -1.0, &mut host, &Config::default());
    assert!(matches!(
        results[0].error,
        Some(AdjustError::SidecarUnavailable { .. })
    ));
    assert!(results[1].is_ok());
    assert!((latest_exposure(&images[1]) + 1.0).abs() < 1e-6);
}

#[test]
fn equalize_bracket_to_first_image() {
    let dir = TempDir::new().unwrap();
    let images = vec![
        image(dir.path(), "a.cr2", 1.0 / 200.0, Some(0.0)),
        image(dir.path(), "b.cr2", 1.0 / 100.0, Some(0.0)),
        image(dir.path(), "c.cr2", 1.0 / 400.0, Some(0.5)),
    ];
    let reference = fs::read_to_string(&images[0].sidecar_path).unwrap();
    let mut host = SidecarHost::new(false, true);

    let results = Action::Equalize
        .run(&images, &mut host, &Config::default())
        .unwrap();
    assert!(results.iter().all(|r| r.is_ok()));
    assert!(results[0].reference);

    // Reference untouched, no backup either
    assert_eq!(fs::read_to_string(&images[0].sidecar_path).unwrap(), reference);
    assert!(!dir.path().join("a.cr2.xmp.bak").exists());

    // One stop more light darkens by one stop
    assert!((latest_exposure(&images[1]) + 1.0).abs() < 1e-5);
    // One stop less light plus the existing +0.5 counted into its EV
    assert!((latest_exposure(&images[2]) - 2.0).abs() < 1e-5);
    assert_eq!(latest_exposure(&images[0]), 0.0);

    assert_eq!(results[1].previous_exposure, Some(0.0));
    assert_eq!(results[2].previous_exposure, Some(0.5));
    let ev_a = results[0].ev.unwrap();
    assert!((ev_a - results[1].ev.unwrap() - 1.0).abs() < 1e-9);
}

#[test]
fn dry_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let images = vec![image(dir.path(), "a.cr2", 1.0 / 200.0, Some(0.0))];
    let before = fs::read_to_string(&images[0].sidecar_path).unwrap();
    let mut config = Config::default();
    config.output.dry_run = true;
    let mut host = SidecarHost::new(config.output.dry_run, config.output.backup_sidecars);

    let results = Action::MinusOne.run(&images, &mut host, &config).unwrap();
    assert_eq!(results[0].new_exposure, Some(-1.0));
    assert_eq!(host.written(), &[images[0].sidecar_path.clone()]);
    assert_eq!(fs::read_to_string(&images[0].sidecar_path).unwrap(), before);
}

#[test]
fn collect_and_load_from_directory() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("b.CR2"), b"raw").unwrap();
    fs::write(dir.path().join("a.dng"), b"raw").unwrap();
    fs::write(dir.path().join("a.dng.xmp"), sidecar_with_exposure(0.0)).unwrap();
    fs::write(dir.path().join("notes.txt"), b"x").unwrap();

    let paths = pipeline::collect_images(&[dir.path().to_path_buf()]);
    assert_eq!(paths, vec![dir.path().join("a.dng"), dir.path().join("b.CR2")]);

    let images = pipeline::load_images(&paths, &Config::default());
    assert_eq!(images[0].sidecar_path, dir.path().join("a.dng.xmp"));
    assert!(images[0].iso.is_nan());

    // No EXIF in these files, so equalization fails per image
    let mut host = SidecarHost::new(true, false);
    let results = Action::Equalize
        .run(&images, &mut host, &Config::default())
        .unwrap();
    assert!(matches!(
        results[0].error,
        Some(AdjustError::InvalidExposureMetadata { .. })
    ));
    assert!(results[1].error.is_some());
}
