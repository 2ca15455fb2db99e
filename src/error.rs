//! Error types for exposure adjustment.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ev-shift operations.
pub type Result<T> = std::result::Result<T, AdjustError>;

/// Everything that can go wrong while adjusting a single image or a batch.
///
/// Per-image errors are collected into [`AdjustResult`](crate::pipeline::AdjustResult)
/// by the orchestrator; only [`AdjustError::InsufficientSelection`] aborts a
/// whole batch.
#[derive(Error, Debug)]
pub enum AdjustError {
    /// The sidecar document is missing or cannot be read.
    #[error("Sidecar unavailable: {}", path.display())]
    SidecarUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The sidecar was read but has no exposure entry in its history.
    #[error("No exposure entry in history of {}", path.display())]
    NoExposureRecord { path: PathBuf },

    /// A parameter payload could not be decoded into the fixed record layout.
    #[error("Malformed exposure record: {reason}")]
    MalformedRecord { reason: String },

    /// Capture metadata is non-positive or non-finite.
    #[error("Invalid exposure metadata: {field} = {value}")]
    InvalidExposureMetadata { field: &'static str, value: f64 },

    /// Equalization needs a reference image plus at least one other.
    #[error("Equalize needs at least 2 images, got {count}")]
    InsufficientSelection { count: usize },

    /// The reference image of an equalization could not be evaluated.
    #[error("Reference image {} could not be evaluated", path.display())]
    ReferenceUnavailable { path: PathBuf },

    /// The host rejected the generated preset document.
    #[error("Preset import failed: {reason}")]
    PresetImportFailed { reason: String },

    /// The host could not apply the preset to the image.
    #[error("Preset apply failed: {reason}")]
    PresetApplyFailed { reason: String },
}

impl AdjustError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            reason: reason.into(),
        }
    }

    pub fn import_failed(reason: impl Into<String>) -> Self {
        Self::PresetImportFailed {
            reason: reason.into(),
        }
    }

    pub fn apply_failed(reason: impl Into<String>) -> Self {
        Self::PresetApplyFailed {
            reason: reason.into(),
        }
    }

    /// Short machine-friendly name of the error kind, used in JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            AdjustError::SidecarUnavailable { .. } => "sidecar_unavailable",
            AdjustError::NoExposureRecord { .. } => "no_exposure_record",
            AdjustError::MalformedRecord { .. } => "malformed_record",
            AdjustError::InvalidExposureMetadata { .. } => "invalid_exposure_metadata",
            AdjustError::InsufficientSelection { .. } => "insufficient_selection",
            AdjustError::ReferenceUnavailable { .. } => "reference_unavailable",
            AdjustError::PresetImportFailed { .. } => "preset_import_failed",
            AdjustError::PresetApplyFailed { .. } => "preset_apply_failed",
        }
    }
}
