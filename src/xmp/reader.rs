use std::ops::Range;
use std::path::Path;

use serde::Serialize;

use crate::error::{AdjustError, Result};
use crate::params::{self, ExposureParams};

/// Operation name darktable uses for the exposure module.
pub const EXPOSURE_OPERATION: &str = "exposure";

/// One history stack entry from a darktable sidecar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SidecarRecord {
    pub sequence_number: u32,
    pub operation_name: String,
    pub params_hex: String,
}

impl SidecarRecord {
    pub fn is_exposure(&self) -> bool {
        self.operation_name == EXPOSURE_OPERATION
    }
}

/// Read the sidecar at `path` and decode its most recent exposure entry.
///
/// Returns `Ok(None)` when the sidecar has no exposure entry at all. A
/// sidecar that cannot be read is [`AdjustError::SidecarUnavailable`]; a
/// selected entry whose payload does not decode is
/// [`AdjustError::MalformedRecord`].
pub fn read_latest_exposure(path: &Path) -> Result<Option<ExposureParams>> {
    let text = std::fs::read_to_string(path).map_err(|source| AdjustError::SidecarUnavailable {
        path: path.to_path_buf(),
        source,
    })?;

    let records = parse_history(&text);
    log::debug!(
        "{}: {} history entries",
        path.display(),
        records.len()
    );

    match latest_exposure_record(&records) {
        Some(record) => {
            log::debug!(
                "  latest exposure entry: num={} params={}",
                record.sequence_number,
                record.params_hex
            );
            params::decode(&record.params_hex).map(Some)
        }
        None => Ok(None),
    }
}

/// Pick the exposure entry with the highest sequence number.
///
/// Non-exposure entries are ignored. If two entries share the highest number
/// the later one in document order wins.
pub fn latest_exposure_record(records: &[SidecarRecord]) -> Option<&SidecarRecord> {
    records
        .iter()
        .filter(|r| r.is_exposure())
        .fold(None, |best: Option<&SidecarRecord>, r| match best {
            Some(b) if b.sequence_number > r.sequence_number => Some(b),
            _ => Some(r),
        })
}

/// Scan a sidecar document for history entries.
///
/// Every `<rdf:li ...>` start tag carrying `num`, `operation` and `params`
/// attributes (with or without the `darktable:` prefix, in any order) becomes
/// a record. Entries missing one of them, or with a non-numeric `num`, are
/// skipped. This is a tolerant text scan, not an XML parse.
pub fn parse_history(xmp: &str) -> Vec<SidecarRecord> {
    let mut records = Vec::new();
    let mut rest = xmp;

    while let Some(start) = rest.find("<rdf:li") {
        let after = &rest[start + "<rdf:li".len()..];

        // `<rdf:li>` followed by text content is a bag item, not an entry
        let tag_end = after.find('>').unwrap_or(after.len());
        let tag = &after[..tag_end];
        rest = &after[tag_end..];

        if !tag.starts_with(char::is_whitespace) {
            continue;
        }

        let num = find_attribute(tag, "num").and_then(|n| n.trim().parse::<u32>().ok());
        let operation = find_attribute(tag, "operation");
        let params = find_attribute(tag, "params");

        match (num, operation, params) {
            (Some(sequence_number), Some(operation_name), Some(params_hex)) => {
                records.push(SidecarRecord {
                    sequence_number,
                    operation_name: operation_name.to_string(),
                    params_hex: params_hex.to_string(),
                });
            }
            _ => log::trace!("Skipping history entry without num/operation/params"),
        }
    }

    records
}

/// Read `darktable:history_end` from the sidecar's description.
pub fn read_history_end(xmp: &str) -> Option<u32> {
    find_attribute(xmp, "history_end").and_then(|v| v.trim().parse().ok())
}

/// Find the value of attribute `name` in `text`.
///
/// Matches `name="..."`, `prefix:name="..."` and single-quoted forms. The
/// character before the name must be whitespace or a namespace colon, so
/// `num` does not match `mask_num` and `params` does not match
/// `blendop_params`.
pub(crate) fn find_attribute<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    find_attribute_span(text, name).map(|span| &text[span])
}

/// Byte range of the value of attribute `name` in `text`, quotes excluded.
pub(crate) fn find_attribute_span(text: &str, name: &str) -> Option<Range<usize>> {
    let bytes = text.as_bytes();
    let mut from = 0;

    while let Some(rel) = text[from..].find(name) {
        let at = from + rel;
        from = at + name.len();

        let boundary = at == 0 || {
            let prev = bytes[at - 1];
            prev == b':' || prev.is_ascii_whitespace()
        };
        if !boundary {
            continue;
        }

        let after = text[at + name.len()..].trim_start();
        let Some(after) = after.strip_prefix('=') else {
            continue;
        };
        let after = after.trim_start();
        let Some(quote) = after.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            continue;
        };
        let value = &after[1..];
        if let Some(end) = value.find(quote) {
            let start = text.len() - value.len();
            return Some(start..start + end);
        }
    }

    None
}
