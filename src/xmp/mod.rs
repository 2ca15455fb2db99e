//! darktable XMP sidecar reading and writing.
//!
//! - [`read_latest_exposure`] — Find and decode the most recent exposure entry in a sidecar
//! - [`parse_history`] — Scan a sidecar for its history stack entries
//! - [`append_history_entry`] — Add a new edit to a sidecar's history stack
//!
//! Both directions work on the document text directly rather than through an
//! XML DOM, so unrelated content in the sidecar is preserved byte for byte.

mod reader;
mod writer;

pub use reader::{
    latest_exposure_record, parse_history, read_history_end, read_latest_exposure,
    SidecarRecord, EXPOSURE_OPERATION,
};
pub use writer::{append_history_entry, HistoryEntry};
