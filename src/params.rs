//! Exposure parameter record codec.
//!
//! darktable stores the exposure module's parameters as a packed C struct,
//! hex-encoded into the sidecar (`darktable:params`) and into style documents
//! (`<op_params>`). For module version 6 the layout is:
//!
//! | offset | type  | field                      |
//! |--------|-------|----------------------------|
//! | 0      | `i32` | `mode`                     |
//! | 4      | `f32` | `black`                    |
//! | 8      | `f32` | `exposure`                 |
//! | 12     | `f32` | `deflicker_percentile`     |
//! | 16     | `f32` | `deflicker_target_level`   |
//! | 20     | `i32` | `compensate_exposure_bias` |
//!
//! All fields are little-endian. The host reads this blob without validation,
//! so a wrong byte order produces a style that applies "successfully" with
//! garbage values.

use serde::{Deserialize, Serialize};

use crate::error::{AdjustError, Result};

/// Size of the encoded record in bytes.
pub const RECORD_LEN: usize = 24;

/// Size of the encoded record in hex characters.
pub const RECORD_HEX_LEN: usize = RECORD_LEN * 2;

/// Exposure module version the record layout belongs to.
pub const MODULE_VERSION: u32 = 6;

/// `mode` value for a plain exposure offset.
pub const MODE_MANUAL: i32 = 0;

/// `mode` value for percentile-targeted deflicker.
pub const MODE_DEFLICKER: i32 = 1;

/// Decoded exposure module parameters.
///
/// `mode` is kept as a raw integer so that values this crate does not know
/// about survive a decode/encode cycle unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureParams {
    pub mode: i32,
    pub black: f32,
    pub exposure: f32,
    pub deflicker_percentile: f32,
    pub deflicker_target_level: f32,
    pub compensate_exposure_bias: i32,
}

impl Default for ExposureParams {
    /// The module defaults darktable writes for a freshly imported raw.
    fn default() -> Self {
        Self {
            mode: MODE_MANUAL,
            black: -1.0 / 4096.0,
            exposure: 0.7,
            deflicker_percentile: 50.0,
            deflicker_target_level: -4.0,
            compensate_exposure_bias: 1,
        }
    }
}

impl ExposureParams {
    pub fn is_deflicker(&self) -> bool {
        self.mode == MODE_DEFLICKER
    }

    /// Copy of these parameters with `exposure` replaced.
    pub fn with_exposure(&self, exposure: f32) -> Self {
        Self { exposure, ..*self }
    }

    /// Pack into the fixed 24-byte little-endian layout.
    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut bytes = [0u8; RECORD_LEN];
        bytes[0..4].copy_from_slice(&self.mode.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.black.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.exposure.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.deflicker_percentile.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.deflicker_target_level.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.compensate_exposure_bias.to_le_bytes());
        bytes
    }

    /// Unpack from the fixed layout. The slice must be exactly [`RECORD_LEN`] bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: &[u8; RECORD_LEN] = bytes.try_into().map_err(|_| {
            AdjustError::malformed(format!(
                "expected {RECORD_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;

        let word = |offset: usize| -> [u8; 4] {
            [
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ]
        };

        Ok(Self {
            mode: i32::from_le_bytes(word(0)),
            black: f32::from_le_bytes(word(4)),
            exposure: f32::from_le_bytes(word(8)),
            deflicker_percentile: f32::from_le_bytes(word(12)),
            deflicker_target_level: f32::from_le_bytes(word(16)),
            compensate_exposure_bias: i32::from_le_bytes(word(20)),
        })
    }
}

/// Decode a hex-encoded parameter record.
///
/// Accepts upper- or lowercase hex. Fails with
/// [`AdjustError::MalformedRecord`] on odd length, non-hex characters, or a
/// payload that is not exactly 24 bytes.
pub fn decode(hex_str: &str) -> Result<ExposureParams> {
    let hex_str = hex_str.trim();
    if hex_str.len() % 2 != 0 {
        return Err(AdjustError::malformed(format!(
            "odd hex length {}",
            hex_str.len()
        )));
    }
    let bytes = hex::decode(hex_str)
        .map_err(|e| AdjustError::malformed(format!("invalid hex: {e}")))?;
    ExposureParams::from_bytes(&bytes)
}

/// Encode a parameter record as exactly 48 lowercase hex characters.
pub fn encode(params: &ExposureParams) -> String {
    hex::encode(params.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    // mode=0, black=0, exposure=1.0, percentile=50, target=-4, bias=1
    const KNOWN_HEX: &str = "00000000000000000000803f00004842000080c001000000";

    fn known() -> ExposureParams {
        ExposureParams {
            mode: MODE_MANUAL,
            black: 0.0,
            exposure: 1.0,
            deflicker_percentile: 50.0,
            deflicker_target_level: -4.0,
            compensate_exposure_bias: 1,
        }
    }

    // ── layout ───────────────────────────────────────────────────────

    #[test]
    fn encode_exact_layout() {
        assert_eq!(encode(&known()), KNOWN_HEX);
    }

    #[test]
    fn to_bytes_field_offsets() {
        let p = ExposureParams {
            mode: MODE_DEFLICKER,
            black: -1.0 / 4096.0,
            exposure: 0.7,
            deflicker_percentile: 50.0,
            deflicker_target_level: -4.0,
            compensate_exposure_bias: 0,
        };
        let b = p.to_bytes();
        assert_eq!(&b[0..4], &[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(&b[4..8], &[0x00, 0x00, 0x80, 0xb9]);
        assert_eq!(&b[8..12], &[0x33, 0x33, 0x33, 0x3f]);
        assert_eq!(&b[12..16], &[0x00, 0x00, 0x48, 0x42]);
        assert_eq!(&b[16..20], &[0x00, 0x00, 0x80, 0xc0]);
        assert_eq!(&b[20..24], &[0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn negative_mode_is_twos_complement() {
        let p = ExposureParams { mode: -1, ..known() };
        assert!(encode(&p).starts_with("ffffffff"));
        assert_eq!(decode(&encode(&p)).unwrap().mode, -1);
    }

    #[test]
    fn default_matches_darktable_defaults() {
        assert_eq!(
            encode(&ExposureParams::default()),
            "00000000000080b93333333f00004842000080c001000000"
        );
    }

    // ── decode ───────────────────────────────────────────────────────

    #[test]
    fn decode_known() {
        assert_eq!(decode(KNOWN_HEX).unwrap(), known());
    }

    #[test]
    fn decode_accepts_uppercase() {
        let upper = KNOWN_HEX.to_uppercase();
        assert_eq!(decode(&upper).unwrap(), known());
    }

    #[test]
    fn round_trip_is_bit_exact() {
        let samples = [
            known(),
            ExposureParams::default(),
            ExposureParams {
                mode: 7,
                black: -0.1,
                exposure: -3.333_333_3,
                deflicker_percentile: 99.9,
                deflicker_target_level: -0.5,
                compensate_exposure_bias: 0,
            },
            ExposureParams {
                exposure: f32::MIN_POSITIVE,
                ..known()
            },
        ];
        for p in samples {
            let hex = encode(&p);
            assert_eq!(hex.len(), RECORD_HEX_LEN);
            assert!(hex.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
            let back = decode(&hex).unwrap();
            assert_eq!(back.exposure.to_bits(), p.exposure.to_bits());
            assert_eq!(back, p);
        }
    }

    #[test]
    fn decode_rejects_odd_length() {
        let err = decode(&KNOWN_HEX[..47]).unwrap_err();
        assert!(matches!(err, AdjustError::MalformedRecord { .. }));
    }

    #[test]
    fn decode_rejects_non_hex() {
        let bad = format!("zz{}", &KNOWN_HEX[2..]);
        let err = decode(&bad).unwrap_err();
        assert!(matches!(err, AdjustError::MalformedRecord { .. }));
    }

    #[test]
    fn decode_rejects_wrong_width() {
        assert!(matches!(
            decode(&KNOWN_HEX[..40]),
            Err(AdjustError::MalformedRecord { .. })
        ));
        let long = format!("{KNOWN_HEX}00000000");
        assert!(matches!(
            decode(&long),
            Err(AdjustError::MalformedRecord { .. })
        ));
        assert!(matches!(decode(""), Err(AdjustError::MalformedRecord { .. })));
    }

    #[test]
    fn with_exposure_keeps_other_fields() {
        let p = known().with_exposure(2.5);
        assert_eq!(p.exposure, 2.5);
        assert_eq!(p.deflicker_percentile, 50.0);
        assert_eq!(p.compensate_exposure_bias, 1);
    }
}
