use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::capture::Image;
use crate::config::Config;
use crate::error::{AdjustError, Result};
use crate::ev::compute_ev;
use crate::host::{PresetHost, StagedPreset};
use crate::params::ExposureParams;
use crate::preset::{self, PresetDocument};
use crate::xmp;

/// Supported image extensions.
const IMAGE_EXTENSIONS: &[&str] = &[
    // RAW formats
    "cr3", "cr2", "crw", "dng", "nef", "nrw", "arw", "srf", "sr2", "raf", "orf", "rw2", "pef",
    "srw", "3fr", "iiq", "erf", "mef", "mos", "mrw", "x3f",
    // Rendered formats darktable also edits
    "jpg", "jpeg", "tif", "tiff", "png", "heic", "heif", "avif", "exr",
];

/// The outcome of adjusting a single image.
///
/// `error` is set when this image failed; the rest of the batch is
/// unaffected. During equalization the first image is the `reference` and is
/// never written.
#[derive(Debug)]
pub struct AdjustResult {
    pub path: PathBuf,
    /// Exposure value (EV) of the capture plus its current exposure setting.
    /// Only computed during equalization.
    pub ev: Option<f64>,
    pub previous_exposure: Option<f32>,
    pub new_exposure: Option<f32>,
    /// Name of the preset that was applied.
    pub style_name: Option<String>,
    pub reference: bool,
    pub error: Option<AdjustError>,
}

impl AdjustResult {
    fn new(image: &Image) -> Self {
        Self {
            path: image.path.clone(),
            ev: None,
            previous_exposure: None,
            new_exposure: None,
            style_name: None,
            reference: false,
            error: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Current state of an image, for read-only display.
#[derive(Debug)]
pub struct InspectResult {
    pub path: PathBuf,
    pub sidecar_path: PathBuf,
    pub params: Option<ExposureParams>,
    /// EV of the capture settings alone.
    pub capture_ev: Option<f64>,
    pub error: Option<AdjustError>,
}

/// Collect supported image files from the given paths.
///
/// Accepts a mix of file paths and directory paths. Directories are walked
/// recursively (following symlinks). Sidecars and other non-image files are
/// skipped. An image reached twice (a file and its directory) is kept once,
/// at its first position.
pub fn collect_images(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_file() {
            if is_supported_image(path) {
                images.push(path.clone());
            } else {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .map(|e| e.into_path())
                .filter(|p| p.is_file() && is_supported_image(p))
                .collect();
            // Bracket order follows file names inside a directory
            found.sort();
            images.extend(found);
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    let mut seen = HashSet::new();
    images.retain(|p| {
        let key = p.canonicalize().unwrap_or_else(|_| p.clone());
        let first = seen.insert(key);
        if !first {
            log::debug!("Skipping duplicate: {}", p.display());
        }
        first
    });
    images
}

/// Check if a file has a supported image extension.
fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Build image handles (capture settings + sidecar location) for image files.
pub fn load_images(paths: &[PathBuf], config: &Config) -> Vec<Image> {
    paths
        .iter()
        .map(|p| Image::from_path(p, &config.sidecar.extension))
        .collect()
}

/// Shift the exposure of every image by `delta_ev` stops.
///
/// Images are processed one after another in the given order. Each image is
/// independent: a failure is recorded in its [`AdjustResult`] and the batch
/// continues.
pub fn adjust_by(
    images: &[Image],
    delta_ev: f32,
    host: &mut dyn PresetHost,
    config: &Config,
) -> Vec<AdjustResult> {
    let total = images.len();
    log::info!("Shifting exposure of {total} image(s) by {delta_ev:+.2} EV");

    images
        .iter()
        .enumerate()
        .map(|(i, image)| {
            log::info!("[{}/{}] {}", i + 1, total, image.path.display());
            let mut result = AdjustResult::new(image);

            let outcome = read_params(image).and_then(|params| {
                result.previous_exposure = Some(params.exposure);
                let updated = params.with_exposure(params.exposure + delta_ev);
                result.new_exposure = Some(updated.exposure);
                apply_params(image, &updated, host, config, i)
            });
            finish(&mut result, outcome);
            result
        })
        .collect()
}

/// Match the brightness of every image to the first one.
///
/// For each image `ev = compute_ev(aperture, exposure_time, iso) + exposure`.
/// Image `i` gets `exposure - (ev[0] - ev[i])`. The first image is the
/// reference and is left untouched. Images are handled one at a time: each is
/// read, computed and applied before the next sidecar is read. Fails up front
/// with [`AdjustError::InsufficientSelection`] for fewer than two images.
pub fn equalize(
    images: &[Image],
    host: &mut dyn PresetHost,
    config: &Config,
) -> Result<Vec<AdjustResult>> {
    if images.len() < 2 {
        return Err(AdjustError::InsufficientSelection {
            count: images.len(),
        });
    }

    let total = images.len();
    log::info!("Equalizing exposure of {total} images to {}", images[0].path.display());
    let mut results = Vec::with_capacity(total);

    log::info!("[1/{total}] {}", images[0].path.display());
    let mut first = AdjustResult::new(&images[0]);
    first.reference = true;
    let reference_ev = match evaluate(&images[0]) {
        Ok((params, ev)) => {
            first.ev = Some(ev);
            first.previous_exposure = Some(params.exposure);
            log::info!("  Reference: {ev:.3} EV");
            Some(ev)
        }
        Err(e) => {
            log::error!("  Error: {e}");
            first.error = Some(e);
            None
        }
    };
    results.push(first);

    for (i, image) in images.iter().enumerate().skip(1) {
        log::info!("[{}/{}] {}", i + 1, total, image.path.display());
        let mut result = AdjustResult::new(image);

        let outcome = match reference_ev {
            None => Err(AdjustError::ReferenceUnavailable {
                path: images[0].path.clone(),
            }),
            Some(reference_ev) => evaluate(image).and_then(|(params, ev)| {
                result.ev = Some(ev);
                result.previous_exposure = Some(params.exposure);
                let delta = reference_ev - ev;
                let exposure = (f64::from(params.exposure) - delta) as f32;
                log::debug!("  ev={ev:.3} delta={delta:+.3}");
                result.new_exposure = Some(exposure);
                apply_params(image, &params.with_exposure(exposure), host, config, i)
            }),
        };
        finish(&mut result, outcome);
        results.push(result);
    }

    Ok(results)
}

/// Read current parameters and capture EV of every image without changing anything.
pub fn inspect(images: &[Image]) -> Vec<InspectResult> {
    images
        .iter()
        .map(|image| {
            let mut result = InspectResult {
                path: image.path.clone(),
                sidecar_path: image.sidecar_path.clone(),
                params: None,
                capture_ev: compute_ev(image.aperture, image.exposure_time, image.iso).ok(),
                error: None,
            };
            match read_params(image) {
                Ok(params) => result.params = Some(params),
                Err(e) => result.error = Some(e),
            }
            result
        })
        .collect()
}

/// Current exposure parameters of an image.
fn read_params(image: &Image) -> Result<ExposureParams> {
    xmp::read_latest_exposure(&image.sidecar_path)?.ok_or_else(|| {
        AdjustError::NoExposureRecord {
            path: image.sidecar_path.clone(),
        }
    })
}

fn evaluate(image: &Image) -> Result<(ExposureParams, f64)> {
    let params = read_params(image)?;
    let ev = compute_ev(image.aperture, image.exposure_time, image.iso)?;
    Ok((params, ev + f64::from(params.exposure)))
}

/// Render, stage, import, apply and delete a preset carrying `params`.
///
/// The staged file is removed when this returns, whatever the outcome.
/// Deleting the preset is best-effort.
fn apply_params(
    image: &Image,
    params: &ExposureParams,
    host: &mut dyn PresetHost,
    config: &Config,
    index: usize,
) -> Result<String> {
    let name = preset::unique_style_name(&config.style.name_prefix, index);
    let staged = StagedPreset::stage(PresetDocument::new(name, params))?;

    let handle = host.import_preset(&staged)?;
    let applied = host.apply_preset(&handle, image);
    if let Err(e) = host.delete_preset(&handle) {
        log::warn!("  Failed to delete preset {:?}: {e}", handle.name);
    }
    applied?;

    Ok(staged.name().to_string())
}

fn finish(result: &mut AdjustResult, outcome: Result<String>) {
    match outcome {
        Ok(name) => {
            if let (Some(from), Some(to)) = (result.previous_exposure, result.new_exposure) {
                log::info!("  Exposure {from:+.3} → {to:+.3} EV");
            }
            result.style_name = Some(name);
        }
        Err(e) => {
            log::error!("  Error: {e}");
            result.error = Some(e);
        }
    }
}
