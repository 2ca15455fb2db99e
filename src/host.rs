//! The host application seam: importing, applying and deleting presets.
//!
//! The orchestrator only talks to a [`PresetHost`]. [`SidecarHost`] is the
//! standalone implementation used by the CLI: it applies a preset by appending
//! the style's entry to the image's darktable sidecar, which darktable picks up
//! as a new edit the next time it reads the sidecar.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::capture::Image;
use crate::error::{AdjustError, Result};
use crate::params::{self, MODULE_VERSION};
use crate::preset::{self, PresetDocument, StyleDocument};
use crate::xmp::{self, HistoryEntry, EXPOSURE_OPERATION};

/// Handle to a preset registered with a host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PresetHandle {
    pub id: u64,
    pub name: String,
}

/// A preset document written to a temporary file for import.
///
/// The file is removed when this value is dropped, whether or not the import
/// and apply steps succeeded.
#[derive(Debug)]
pub struct StagedPreset {
    document: PresetDocument,
    file: NamedTempFile,
}

impl StagedPreset {
    pub fn stage(document: PresetDocument) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("ev-shift-")
            .suffix(".dtstyle")
            .tempfile()
            .map_err(|e| AdjustError::import_failed(format!("failed to create temp file: {e}")))?;
        file.write_all(document.text.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| AdjustError::import_failed(format!("failed to stage preset: {e}")))?;
        log::debug!("Staged preset {:?} at {}", document.name, file.path().display());
        Ok(Self { document, file })
    }

    pub fn name(&self) -> &str {
        &self.document.name
    }

    pub fn text(&self) -> &str {
        &self.document.text
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Operations the adjustment pipeline needs from the host application.
pub trait PresetHost {
    /// Register a preset document. Fails with [`AdjustError::PresetImportFailed`].
    fn import_preset(&mut self, preset: &StagedPreset) -> Result<PresetHandle>;

    /// Apply a registered preset to an image, creating a new edit.
    /// Fails with [`AdjustError::PresetApplyFailed`].
    fn apply_preset(&mut self, handle: &PresetHandle, image: &Image) -> Result<()>;

    /// Remove a registered preset. Callers treat failure as best-effort.
    fn delete_preset(&mut self, handle: &PresetHandle) -> Result<()>;
}

/// Applies presets by writing history entries straight into XMP sidecars.
#[derive(Debug, Default)]
pub struct SidecarHost {
    dry_run: bool,
    backup_sidecars: bool,
    next_id: u64,
    styles: HashMap<u64, StyleDocument>,
    /// Sidecars written (or that would be written in dry-run mode), in order.
    written: Vec<PathBuf>,
}

impl SidecarHost {
    pub fn new(dry_run: bool, backup_sidecars: bool) -> Self {
        Self {
            dry_run,
            backup_sidecars,
            ..Self::default()
        }
    }

    /// Number of presets currently registered.
    pub fn registered(&self) -> usize {
        self.styles.len()
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl PresetHost for SidecarHost {
    fn import_preset(&mut self, preset: &StagedPreset) -> Result<PresetHandle> {
        let text = std::fs::read_to_string(preset.path()).map_err(|e| {
            AdjustError::import_failed(format!("cannot read {}: {e}", preset.path().display()))
        })?;
        let style = preset::parse_style(&text)?;

        if style.operation != EXPOSURE_OPERATION {
            return Err(AdjustError::import_failed(format!(
                "unsupported operation {:?}",
                style.operation
            )));
        }
        if style.module_version != MODULE_VERSION {
            return Err(AdjustError::import_failed(format!(
                "unsupported exposure module version {}",
                style.module_version
            )));
        }
        params::decode(&style.params_hex)
            .map_err(|e| AdjustError::import_failed(format!("bad op_params: {e}")))?;

        let handle = PresetHandle {
            id: self.next_id,
            name: style.name.clone(),
        };
        self.next_id += 1;
        self.styles.insert(handle.id, style);
        log::debug!("Imported preset #{} {:?}", handle.id, handle.name);
        Ok(handle)
    }

    fn apply_preset(&mut self, handle: &PresetHandle, image: &Image) -> Result<()> {
        let style = self
            .styles
            .get(&handle.id)
            .ok_or_else(|| AdjustError::apply_failed(format!("unknown preset {:?}", handle.name)))?;

        let sidecar = &image.sidecar_path;
        let text = std::fs::read_to_string(sidecar).map_err(|e| {
            AdjustError::apply_failed(format!("cannot read {}: {e}", sidecar.display()))
        })?;

        let entry = HistoryEntry {
            operation: style.operation.clone(),
            enabled: style.enabled,
            modversion: style.module_version,
            params: style.params_hex.clone(),
            multi_name: style.multi_name.clone(),
            multi_priority: style.multi_priority,
            blendop_version: style.blendop_version,
            blendop_params: style.blendop_params.clone(),
        };
        let (updated, num) = xmp::append_history_entry(&text, &entry)?;

        if self.dry_run {
            log::info!("  Would append history #{num} to {}", sidecar.display());
        } else {
            if self.backup_sidecars {
                if let Err(e) = backup_file(sidecar) {
                    log::warn!("Failed to backup {}: {e}", sidecar.display());
                }
            }
            std::fs::write(sidecar, updated).map_err(|e| {
                AdjustError::apply_failed(format!("cannot write {}: {e}", sidecar.display()))
            })?;
            log::debug!("Appended history #{num} to {}", sidecar.display());
        }

        self.written.push(sidecar.clone());
        Ok(())
    }

    fn delete_preset(&mut self, handle: &PresetHandle) -> Result<()> {
        self.styles
            .remove(&handle.id)
            .map(|_| ())
            .ok_or_else(|| AdjustError::import_failed(format!("preset {:?} is not registered", handle.name)))
    }
}

/// Create a backup of the original sidecar, once.
fn backup_file(path: &Path) -> std::io::Result<PathBuf> {
    let backup_path = path.with_extension(format!(
        "{}.bak",
        path.extension().unwrap_or_default().to_string_lossy()
    ));

    if !backup_path.exists() {
        std::fs::copy(path, &backup_path)?;
        log::debug!("Backup created: {}", backup_path.display());
    }

    Ok(backup_path)
}
