//! Exposure value arithmetic.

use crate::error::{AdjustError, Result};

/// Exposure value of a capture, normalised to ISO 100.
///
/// `EV = log2(N² / t) - log2(S / 100)` where `N` is the f-number, `t` the
/// shutter time in seconds and `S` the ISO sensitivity. A brighter capture
/// (longer shutter, wider aperture, higher ISO) has a *lower* EV.
pub fn compute_ev(aperture: f64, exposure_time: f64, iso: f64) -> Result<f64> {
    check_positive("aperture", aperture)?;
    check_positive("exposure_time", exposure_time)?;
    check_positive("iso", iso)?;

    Ok((aperture * aperture / exposure_time).log2() - (iso / 100.0).log2())
}

fn check_positive(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AdjustError::InvalidExposureMetadata { field, value })
    }
}
