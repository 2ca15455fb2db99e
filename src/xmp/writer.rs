use std::ops::Range;

use crate::error::{AdjustError, Result};

use super::reader::{find_attribute, find_attribute_span, parse_history, read_history_end};

const DARKTABLE_NS: &str = "http://darktable.sf.net/";

/// A history stack entry to append to a sidecar.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub operation: String,
    pub enabled: bool,
    pub modversion: u32,
    pub params: String,
    pub multi_name: String,
    pub multi_priority: u32,
    pub blendop_version: u32,
    pub blendop_params: String,
}

/// Append `entry` to the darktable history in `xmp`, returning the new document
/// and the sequence number given to the entry.
///
/// Entries at or past the current `darktable:history_end` are undone edits;
/// they are discarded first, as darktable does when a new edit is made. The
/// new entry is numbered one past the highest remaining `num` and
/// `history_end` is moved to include it, so darktable shows it as the latest
/// edit. A sidecar without a history sequence gets one.
pub fn append_history_entry(xmp: &str, entry: &HistoryEntry) -> Result<(String, u32)> {
    let mut result = xmp.to_string();

    if let Some(history_end) = read_history_end(&result) {
        let dropped = drop_undone_entries(&mut result, history_end);
        if dropped > 0 {
            log::debug!("Discarded {dropped} undone history entries (history_end={history_end})");
        }
    }

    let num = parse_history(&result)
        .iter()
        .map(|r| r.sequence_number + 1)
        .max()
        .unwrap_or(0);

    open_self_closing_description(&mut result);

    if !result.contains("</rdf:Description>") {
        return Err(AdjustError::apply_failed(
            "sidecar has no rdf:Description element",
        ));
    }

    // Ensure darktable namespace is declared
    if !result.contains("xmlns:darktable=") {
        insert_after_about(
            &mut result,
            &format!("\n    xmlns:darktable=\"{DARKTABLE_NS}\""),
        )?;
    }

    let li = render_entry(num, entry);

    match find_history_seq_end(&result) {
        Some(pos) => result.insert_str(pos, &li),
        None => {
            let block = format!(
                "   <darktable:history>\n    <rdf:Seq>\n{li}    </rdf:Seq>\n   </darktable:history>\n"
            );
            let pos = result
                .find("</rdf:Description>")
                .ok_or_else(|| AdjustError::apply_failed("sidecar lost its rdf:Description"))?;
            result.insert_str(pos, &block);
        }
    }

    set_history_end(&mut result, num + 1)?;
    log::debug!(
        "Appended {} history entry #{num} (history_end={})",
        entry.operation,
        num + 1
    );

    Ok((result, num))
}

fn render_entry(num: u32, entry: &HistoryEntry) -> String {
    format!(
        "     <rdf:li\n      darktable:num=\"{num}\"\n      darktable:operation=\"{}\"\n      darktable:enabled=\"{}\"\n      darktable:modversion=\"{}\"\n      darktable:params=\"{}\"\n      darktable:multi_name=\"{}\"\n      darktable:multi_priority=\"{}\"\n      darktable:blendop_version=\"{}\"\n      darktable:blendop_params=\"{}\"/>\n",
        entry.operation,
        u8::from(entry.enabled),
        entry.modversion,
        entry.params,
        xml_escape(&entry.multi_name),
        entry.multi_priority,
        entry.blendop_version,
        entry.blendop_params,
    )
}

/// Position of the `</rdf:Seq>` closing the `darktable:history` sequence.
fn find_history_seq_end(xmp: &str) -> Option<usize> {
    let start = xmp.find("<darktable:history>")?;
    let end = start + xmp[start..].find("</darktable:history>")?;
    let seq_end = start + xmp[start..end].rfind("</rdf:Seq>")?;
    // Insert on the line of the closing tag, before its indentation
    let line_start = xmp[..seq_end]
        .rfind('\n')
        .map(|p| p + 1)
        .filter(|&p| xmp[p..seq_end].trim().is_empty())
        .unwrap_or(seq_end);
    Some(line_start)
}

/// Convert `<rdf:Description .../>` into an open/close pair.
fn open_self_closing_description(xmp: &mut String) {
    if xmp.contains("</rdf:Description>") {
        return;
    }
    if let Some(desc_start) = xmp.find("<rdf:Description") {
        if let Some(close_pos) = xmp[desc_start..].find("/>") {
            let abs_close = desc_start + close_pos;
            xmp.replace_range(abs_close..abs_close + 2, ">\n");
            if let Some(rdf_end) = xmp.find("</rdf:RDF>") {
                xmp.insert_str(rdf_end, "</rdf:Description>\n");
            }
        }
    }
}

fn insert_after_about(xmp: &mut String, text: &str) -> Result<()> {
    let pos = xmp
        .find("rdf:about=\"\"")
        .ok_or_else(|| AdjustError::apply_failed("sidecar has no rdf:about attribute"))?;
    xmp.insert_str(pos + "rdf:about=\"\"".len(), text);
    Ok(())
}

/// Replace the `history_end` value in place, whatever its quoting or prefix,
/// or add the attribute when there is none.
fn set_history_end(xmp: &mut String, value: u32) -> Result<()> {
    match find_attribute_span(xmp, "history_end") {
        Some(span) => {
            xmp.replace_range(span, &value.to_string());
            Ok(())
        }
        None => insert_after_about(xmp, &format!("\n    darktable:history_end=\"{value}\"")),
    }
}

/// Remove every history `<rdf:li>` whose `num` is at or past `history_end`.
/// Returns how many were removed.
fn drop_undone_entries(xmp: &mut String, history_end: u32) -> usize {
    const LI_CLOSE: &str = "</rdf:li>";

    let Some(start) = xmp.find("<darktable:history>") else {
        return 0;
    };
    let Some(len) = xmp[start..].find("</darktable:history>") else {
        return 0;
    };
    let block_end = start + len;

    let mut undone = Vec::new();
    let mut pos = start;
    while let Some(rel) = xmp[pos..block_end].find("<rdf:li") {
        let li_start = pos + rel;
        let Some(tag_len) = xmp[li_start..block_end].find('>') else {
            break;
        };
        let tag_end = li_start + tag_len + 1;
        let tag = &xmp[li_start..tag_end];

        let li_end = if tag.ends_with("/>") {
            tag_end
        } else {
            match xmp[tag_end..block_end].find(LI_CLOSE) {
                Some(close) => tag_end + close + LI_CLOSE.len(),
                None => break,
            }
        };
        pos = li_end;

        let num = find_attribute(tag, "num").and_then(|n| n.trim().parse::<u32>().ok());
        if num.is_some_and(|n| n >= history_end) {
            undone.push(whole_lines(xmp, li_start..li_end));
        }
    }

    for span in undone.iter().rev() {
        xmp.replace_range(span.clone(), "");
    }
    undone.len()
}

/// Widen `span` to its full lines when nothing else shares them.
fn whole_lines(text: &str, span: Range<usize>) -> Range<usize> {
    let line_start = text[..span.start].rfind('\n').map_or(0, |p| p + 1);
    if !text[line_start..span.start].trim().is_empty() {
        return span;
    }
    let rest = &text[span.end..];
    let blanks = rest.len() - rest.trim_start_matches([' ', '\t']).len();
    if rest[blanks..].starts_with('\n') {
        line_start..span.end + blanks + 1
    } else {
        span
    }
}

/// Escape special XML characters.
fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xmp::reader::latest_exposure_record;

    const SIDECAR: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/" x:xmptk="XMP Core 4.4.0-Exiv2">
 <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <rdf:Description rdf:about=""
    xmlns:darktable="http://darktable.sf.net/"
    darktable:xmp_version="5"
    darktable:history_end="2">
   <darktable:history>
    <rdf:Seq>
     <rdf:li
      darktable:num="0"
      darktable:operation="rawprepare"
      darktable:params="00"/>
     <rdf:li
      darktable:num="1"
      darktable:operation="exposure"
      darktable:params="00000000000080b93333333f00004842000080c001000000"/>
    </rdf:Seq>
   </darktable:history>
  </rdf:Description>
 </rdf:RDF>
</x:xmpmeta>
"#;

    fn exposure_entry(params: &str) -> HistoryEntry {
        HistoryEntry {
            operation: "exposure".into(),
            enabled: true,
            modversion: 6,
            params: params.into(),
            multi_name: String::new(),
            multi_priority: 0,
            blendop_version: 7,
            blendop_params: "gz".into(),
        }
    }

    #[test]
    fn appends_after_last_entry() {
        let (out, num) = append_history_entry(SIDECAR, &exposure_entry("aa")).unwrap();
        assert_eq!(num, 2);
        assert_eq!(read_history_end(&out), Some(3));

        let records = parse_history(&out);
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].sequence_number, 2);
        assert_eq!(latest_exposure_record(&records).unwrap().params_hex, "aa");
        // Everything outside the history is untouched
        assert!(out.contains("darktable:xmp_version=\"5\""));
        assert!(out.ends_with("</x:xmpmeta>\n"));
    }

    #[test]
    fn repeated_appends_keep_numbering() {
        let (once, _) = append_history_entry(SIDECAR, &exposure_entry("aa")).unwrap();
        let (twice, num) = append_history_entry(&once, &exposure_entry("bb")).unwrap();
        assert_eq!(num, 3);
        assert_eq!(read_history_end(&twice), Some(4));
        assert_eq!(
            latest_exposure_record(&parse_history(&twice)).unwrap().params_hex,
            "bb"
        );
    }

    #[test]
    fn creates_history_when_missing() {
        let bare = "<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n <rdf:RDF>\n  <rdf:Description rdf:about=\"\"/>\n </rdf:RDF>\n</x:xmpmeta>\n";
        let (out, num) = append_history_entry(bare, &exposure_entry("cc")).unwrap();
        assert_eq!(num, 0);
        assert!(out.contains("xmlns:darktable=\"http://darktable.sf.net/\""));
        assert_eq!(read_history_end(&out), Some(1));
        let records = parse_history(&out);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].params_hex, "cc");
    }

    #[test]
    fn discards_undone_entries() {
        let undone = SIDECAR.replace(
            "    </rdf:Seq>",
            "     <rdf:li\n      darktable:num=\"2\"\n      darktable:operation=\"sharpen\"\n      darktable:params=\"01\"/>\n     <rdf:li darktable:num=\"3\" darktable:operation=\"vignette\" darktable:params=\"02\"/>\n    </rdf:Seq>",
        );
        assert_eq!(parse_history(&undone).len(), 4);

        let (out, num) = append_history_entry(&undone, &exposure_entry("aa")).unwrap();
        assert_eq!(num, 2);
        assert_eq!(read_history_end(&out), Some(3));

        let operations: Vec<_> = parse_history(&out)
            .into_iter()
            .map(|r| (r.sequence_number, r.operation_name))
            .collect();
        assert_eq!(
            operations,
            vec![
                (0, "rawprepare".to_string()),
                (1, "exposure".to_string()),
                (2, "exposure".to_string()),
            ]
        );
        assert!(!out.contains("sharpen"));
        assert!(!out.contains("vignette"));
        // Removed entries leave no blank lines behind
        assert!(!out.contains("\n\n"));
    }

    #[test]
    fn history_end_zero_discards_everything() {
        let all_undone = SIDECAR.replace("darktable:history_end=\"2\"", "darktable:history_end=\"0\"");
        let (out, num) = append_history_entry(&all_undone, &exposure_entry("aa")).unwrap();
        assert_eq!(num, 0);
        assert_eq!(read_history_end(&out), Some(1));
        let records = parse_history(&out);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].params_hex, "aa");
    }

    #[test]
    fn single_quoted_history_end_replaced_in_place() {
        let quoted = SIDECAR.replace("darktable:history_end=\"2\"", "darktable:history_end='2'");
        let (out, num) = append_history_entry(&quoted, &exposure_entry("aa")).unwrap();
        assert_eq!(num, 2);
        assert_eq!(out.matches("history_end").count(), 1);
        assert!(out.contains("darktable:history_end='3'"));
        assert_eq!(read_history_end(&out), Some(3));
    }

    #[test]
    fn unprefixed_history_end_replaced_in_place() {
        let bare = SIDECAR.replace("darktable:history_end=\"2\"", "history_end = \"2\"");
        let (out, _) = append_history_entry(&bare, &exposure_entry("aa")).unwrap();
        assert_eq!(out.matches("history_end").count(), 1);
        assert!(out.contains("history_end = \"3\""));
    }

    #[test]
    fn rejects_non_xmp() {
        let err = append_history_entry("not a sidecar", &exposure_entry("aa")).unwrap_err();
        assert!(matches!(err, AdjustError::PresetApplyFailed { .. }));
    }

    #[test]
    fn multi_name_is_escaped() {
        let mut entry = exposure_entry("aa");
        entry.multi_name = "a\"b".into();
        let (out, _) = append_history_entry(SIDECAR, &entry).unwrap();
        assert!(out.contains("darktable:multi_name=\"a&quot;b\""));
    }
}
