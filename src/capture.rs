//! Image handles and their capture settings.

use anyhow::{Context, Result};
use nom_exif::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Default sidecar extension appended to the image file name.
pub const SIDECAR_EXTENSION: &str = "xmp";

/// Capture settings read from an image's EXIF.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CaptureSettings {
    /// f-number
    pub aperture: Option<f64>,
    /// Shutter time in seconds
    pub exposure_time: Option<f64>,
    pub iso: Option<f64>,
}

/// An image selected for adjustment.
///
/// Capture values that could not be read are `NaN`; EV computation rejects
/// them for that image only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Image {
    pub path: PathBuf,
    pub sidecar_path: PathBuf,
    pub aperture: f64,
    pub exposure_time: f64,
    pub iso: f64,
}

impl Image {
    pub fn new(
        path: impl Into<PathBuf>,
        sidecar_path: impl Into<PathBuf>,
        aperture: f64,
        exposure_time: f64,
        iso: f64,
    ) -> Self {
        Self {
            path: path.into(),
            sidecar_path: sidecar_path.into(),
            aperture,
            exposure_time,
            iso,
        }
    }

    /// Build an image handle from a file on disk, reading its EXIF and
    /// locating its sidecar (`<file name>.<sidecar_ext>`).
    pub fn from_path(path: &Path, sidecar_ext: &str) -> Self {
        let capture = match read_capture(path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Failed to read EXIF from {}: {e:#}", path.display());
                CaptureSettings::default()
            }
        };

        Self {
            path: path.to_path_buf(),
            sidecar_path: sidecar_path_for(path, sidecar_ext),
            aperture: capture.aperture.unwrap_or(f64::NAN),
            exposure_time: capture.exposure_time.unwrap_or(f64::NAN),
            iso: capture.iso.unwrap_or(f64::NAN),
        }
    }
}

/// darktable keeps the sidecar next to the image with the extension appended:
/// `IMG_0001.CR2` → `IMG_0001.CR2.xmp`.
pub fn sidecar_path_for(path: &Path, sidecar_ext: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(sidecar_ext);
    path.with_file_name(name)
}

/// Read aperture, shutter time and ISO from an image file.
pub fn read_capture(path: &Path) -> Result<CaptureSettings> {
    let mut parser = MediaParser::new();
    let ms = MediaSource::file_path(path).context("Failed to open image file")?;

    let iter: ExifIter = match parser.parse(ms) {
        Ok(iter) => iter,
        Err(_) => {
            log::debug!("No EXIF data found in {}", path.display());
            return Ok(CaptureSettings::default());
        }
    };
    let exif: Exif = iter.into();

    let settings = CaptureSettings {
        aperture: exif.get(ExifTag::FNumber).and_then(entry_to_f64),
        exposure_time: exif.get(ExifTag::ExposureTime).and_then(entry_to_f64),
        iso: exif.get(ExifTag::ISOSpeedRatings).and_then(entry_to_f64),
    };
    log::debug!(
        "{}: f/{:?} {:?}s ISO {:?}",
        path.display(),
        settings.aperture,
        settings.exposure_time,
        settings.iso
    );

    Ok(settings)
}

/// Convert an EntryValue to a number via its display form
/// (`"1/200 (0.0050)"`, `"28/10"`, `"400"`).
fn entry_to_f64(val: &EntryValue) -> Option<f64> {
    parse_number(&val.to_string())
}

fn parse_number(s: &str) -> Option<f64> {
    let token = s.split_whitespace().next()?;
    let token = token.trim_matches(|c: char| matches!(c, '"' | '(' | ')' | '[' | ']' | ','));

    let value = match token.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => token.parse().ok()?,
    };

    value.is_finite().then_some(value)
}
