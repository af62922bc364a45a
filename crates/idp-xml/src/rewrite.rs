use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::XmlError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    V3,
    V2,
    PreviousPid,
}

fn attr(e: &BytesStart, local_name: &[u8]) -> String {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local_name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
        .unwrap_or_default()
}

fn classify(e: &BytesStart, aop_pid: &str) -> Option<Target> {
    if e.local_name().as_ref() != b"article-id" || attr(e, b"pub-id-type") != "publisher-id" {
        return None;
    }
    match attr(e, b"specific-use").as_str() {
        "scielo-v3" => Some(Target::V3),
        "scielo-v2" => Some(Target::V2),
        "previous-pid" if !aop_pid.is_empty() => Some(Target::PreviousPid),
        _ => None,
    }
}

fn has_previous_pid(xml: &[u8]) -> Result<bool, XmlError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(|_| XmlError::InvalidXml("malformed document".to_string()))? {
            Event::Start(e) | Event::Empty(e) => {
                if e.local_name().as_ref() == b"article-id"
                    && attr(&e, b"pub-id-type") == "publisher-id"
                    && attr(&e, b"specific-use") == "previous-pid"
                {
                    return Ok(true);
                }
            }
            Event::Eof => return Ok(false),
            _ => {}
        }
        buf.clear();
    }
}

fn write_previous_pid(writer: &mut Writer<Vec<u8>>, aop_pid: &str) -> Result<(), XmlError> {
    let mut start = BytesStart::new("article-id");
    start.push_attribute(("pub-id-type", "publisher-id"));
    start.push_attribute(("specific-use", "previous-pid"));
    let io_err = |_| XmlError::InvalidXml("failed to serialize rewritten document".to_string());
    writer.write_event(Event::Start(start)).map_err(io_err)?;
    writer.write_event(Event::Text(BytesText::new(aop_pid))).map_err(io_err)?;
    writer.write_event(Event::End(BytesEnd::new("article-id"))).map_err(io_err)?;
    Ok(())
}

/// Set the three `<article-id>` identifier elements in-place and
/// reserialize, preserving the rest of the tree (spec.md §4.1).
///
/// `previous-pid` is only written when `aop_pid` is non-empty: an existing
/// occurrence is updated, otherwise a new one is inserted right after
/// `scielo-v2` (the conventional JATS ordering this codebase always emits).
pub fn rewrite_ids(xml: &[u8], v3: &str, v2: &str, aop_pid: &str) -> Result<Vec<u8>, XmlError> {
    let needs_insertion = !aop_pid.is_empty() && !has_previous_pid(xml)?;

    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();
    let mut rewriting: Option<Target> = None;
    let mut text_written = false;

    let io_err = |_| XmlError::InvalidXml("failed to serialize rewritten document".to_string());
    let parse_err = |_| XmlError::InvalidXml("malformed document".to_string());

    let value_for = |target: Target| match target {
        Target::V3 => v3,
        Target::V2 => v2,
        Target::PreviousPid => aop_pid,
    };

    loop {
        match reader.read_event_into(&mut buf).map_err(parse_err)? {
            Event::Start(e) => {
                let target = classify(&e, aop_pid);
                writer.write_event(Event::Start(e)).map_err(io_err)?;
                rewriting = target;
                text_written = false;
            }
            Event::Empty(e) => {
                let target = classify(&e, aop_pid);
                match target {
                    Some(t) => {
                        writer.write_event(Event::Start(e)).map_err(io_err)?;
                        writer.write_event(Event::Text(BytesText::new(value_for(t)))).map_err(io_err)?;
                        writer.write_event(Event::End(BytesEnd::new("article-id"))).map_err(io_err)?;
                        if t == Target::V2 && needs_insertion {
                            write_previous_pid(&mut writer, aop_pid)?;
                        }
                    }
                    None => writer.write_event(Event::Empty(e)).map_err(io_err)?,
                }
            }
            Event::Text(e) => {
                if let Some(target) = rewriting {
                    if !text_written {
                        writer.write_event(Event::Text(BytesText::new(value_for(target)))).map_err(io_err)?;
                        text_written = true;
                    }
                } else {
                    writer.write_event(Event::Text(e)).map_err(io_err)?;
                }
            }
            Event::End(e) => {
                writer.write_event(Event::End(e)).map_err(io_err)?;
                if rewriting == Some(Target::V2) && needs_insertion {
                    write_previous_pid(&mut writer, aop_pid)?;
                }
                rewriting = None;
            }
            Event::Eof => break,
            other => writer.write_event(other).map_err(io_err)?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<article><front><article-meta><article-id pub-id-type="publisher-id" specific-use="scielo-v3">old3</article-id><article-id pub-id-type="publisher-id" specific-use="scielo-v2">old2</article-id></article-meta></front></article>"#;

    #[test]
    fn rewrites_v3_and_v2_in_place() {
        let out = rewrite_ids(SAMPLE.as_bytes(), "NEW3", "NEW2", "").unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains(">NEW3<"));
        assert!(out.contains(">NEW2<"));
        assert!(!out.contains("old3"));
    }

    #[test]
    fn inserts_previous_pid_after_v2_when_absent() {
        let out = rewrite_ids(SAMPLE.as_bytes(), "NEW3", "NEW2", "AOPV2").unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains(r#"specific-use="previous-pid">AOPV2<"#));
        let v2_pos = out.find(">NEW2<").unwrap();
        let prev_pos = out.find("previous-pid").unwrap();
        assert!(prev_pos > v2_pos);
    }

    #[test]
    fn leaves_tree_untouched_when_no_aop_pid() {
        let out = rewrite_ids(SAMPLE.as_bytes(), "NEW3", "NEW2", "").unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(!out.contains("previous-pid"));
    }

    #[test]
    fn updates_existing_previous_pid_instead_of_duplicating() {
        let with_prev = r#"<article><article-id pub-id-type="publisher-id" specific-use="scielo-v2">old2</article-id><article-id pub-id-type="publisher-id" specific-use="previous-pid">stale</article-id></article>"#;
        let out = rewrite_ids(with_prev.as_bytes(), "V3", "NEW2", "FRESH").unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.matches("previous-pid").count(), 1);
        assert!(out.contains(">FRESH<"));
    }
}
