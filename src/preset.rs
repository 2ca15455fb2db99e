//! darktable style (`.dtstyle`) documents carrying one exposure entry.

use chrono::Local;

use crate::error::{AdjustError, Result};
use crate::params::{self, ExposureParams, MODULE_VERSION};
use crate::xmp::EXPOSURE_OPERATION;

/// Blend parameters for "no blending" (normal mode, 100% opacity, no mask),
/// as darktable serialises them: gzip + base64. Opaque to this crate.
pub const NOOP_BLENDOP_PARAMS: &str = "gz11eJxjYGBgkGAAgRNODGiAEV0AJ2iwh+CR4oFBAA/xBCU=";

/// Blend parameter format version matching [`NOOP_BLENDOP_PARAMS`].
pub const BLENDOP_VERSION: u32 = 7;

/// Instance priority of the exposure entry (first instance).
pub const MULTI_PRIORITY: u32 = 0;

/// Position of the single plugin entry inside the style.
pub const PLUGIN_NUM: u32 = 0;

/// A rendered style document, ready to be staged and imported.
#[derive(Debug, Clone, PartialEq)]
pub struct PresetDocument {
    pub name: String,
    pub text: String,
}

impl PresetDocument {
    pub fn new(name: impl Into<String>, params: &ExposureParams) -> Self {
        let name = name.into();
        let text = render(&name, &params::encode(params));
        Self { name, text }
    }
}

/// Render a style document applying `params_hex` to the exposure module.
///
/// `style_name` is inserted as-is. Names come from [`unique_style_name`],
/// which never produces markup characters from a sane prefix.
pub fn render(style_name: &str, params_hex: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<darktable_style version="1.0">
<info>
<name>{style_name}</name>
<description></description>
</info>
<style>
<plugin>
<num>{PLUGIN_NUM}</num>
<module>{MODULE_VERSION}</module>
<operation>{EXPOSURE_OPERATION}</operation>
<op_params>{params_hex}</op_params>
<enabled>1</enabled>
<blendop_params>{NOOP_BLENDOP_PARAMS}</blendop_params>
<blendop_version>{BLENDOP_VERSION}</blendop_version>
<multi_priority>{MULTI_PRIORITY}</multi_priority>
<multi_name></multi_name>
</plugin>
</style>
</darktable_style>
"#
    )
}

/// Build a style name that is unique within a run: prefix, local time down to
/// microseconds, and the image's index in the batch.
pub fn unique_style_name(prefix: &str, index: usize) -> String {
    format!(
        "{prefix} {}-{index}",
        Local::now().format("%Y%m%d-%H%M%S%.6f")
    )
}

/// The single plugin entry of a parsed style document.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleDocument {
    pub name: String,
    pub operation: String,
    pub module_version: u32,
    pub params_hex: String,
    pub enabled: bool,
    pub blendop_params: String,
    pub blendop_version: u32,
    pub multi_priority: u32,
    pub multi_name: String,
}

/// Parse a style document produced by [`render`] (or by darktable for a
/// single-plugin style). Any missing or non-numeric field is
/// [`AdjustError::PresetImportFailed`].
pub fn parse_style(text: &str) -> Result<StyleDocument> {
    if !text.contains("<darktable_style") {
        return Err(AdjustError::import_failed("not a darktable style document"));
    }

    let required = |tag: &str| -> Result<String> {
        extract_element(text, tag)
            .map(str::to_string)
            .ok_or_else(|| AdjustError::import_failed(format!("missing <{tag}>")))
    };
    let number = |tag: &str| -> Result<u32> {
        required(tag)?
            .parse()
            .map_err(|_| AdjustError::import_failed(format!("<{tag}> is not a number")))
    };

    Ok(StyleDocument {
        name: required("name")?,
        operation: required("operation")?,
        module_version: number("module")?,
        params_hex: required("op_params")?,
        enabled: number("enabled")? != 0,
        blendop_params: required("blendop_params")?,
        blendop_version: number("blendop_version")?,
        multi_priority: number("multi_priority")?,
        multi_name: extract_element(text, "multi_name")
            .unwrap_or_default()
            .to_string(),
    })
}

/// Text between `<tag>` and `</tag>`, trimmed.
fn extract_element<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)?;
    Some(text[start..start + end].trim())
}
