// XMLTV read/write
//
// Reading is lenient: unknown elements are ignored and missing attributes are
// left as `None` for the record extractor to judge. Only XML that cannot be
// tokenized, or lacks a <tv> root, is an error.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use tvmerge_recon::guide::Listing;
use tvmerge_recon::model::{DocChannel, DocProgramme, LangText, ScheduleDocument};

use crate::error::XmltvError;

/// Language tag written on display names and titles.
pub const OUTPUT_LANG: &str = "zh";

// ============================================================================
// Reading
// ============================================================================

/// Which text-bearing element is open.
enum Capture {
    None,
    DisplayName(Option<String>),
    Title(Option<String>),
}

pub fn parse_document(xml: &str) -> Result<ScheduleDocument, XmltvError> {
    let mut reader = Reader::from_str(xml);
    // entity references split text events; whitespace is trimmed per element
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();

    let mut doc = ScheduleDocument::default();
    let mut saw_root = false;
    let mut channel: Option<DocChannel> = None;
    let mut programme: Option<DocProgramme> = None;
    let mut capture = Capture::None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"tv" => saw_root = true,
                b"channel" => channel = Some(read_channel(e)),
                b"programme" => programme = Some(read_programme(e)),
                b"display-name" if channel.is_some() => {
                    capture = Capture::DisplayName(attr(e, b"lang"));
                    text.clear();
                }
                b"title" if programme.is_some() => {
                    capture = Capture::Title(attr(e, b"lang"));
                    text.clear();
                }
                b"icon" => set_icon(channel.as_mut(), e),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"tv" => saw_root = true,
                b"channel" => doc.channels.push(read_channel(e)),
                b"programme" => doc.programmes.push(read_programme(e)),
                b"icon" => set_icon(channel.as_mut(), e),
                b"display-name" => {
                    if let Some(ch) = channel.as_mut() {
                        ch.display_names.push(LangText {
                            lang: attr(e, b"lang"),
                            text: String::new(),
                        });
                    }
                }
                b"title" => {
                    if let Some(p) = programme.as_mut() {
                        p.titles.push(LangText {
                            lang: attr(e, b"lang"),
                            text: String::new(),
                        });
                    }
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if !matches!(capture, Capture::None) {
                    text.push_str(&unescape_xml(&String::from_utf8_lossy(e.as_ref())));
                }
            }
            Ok(Event::CData(ref e)) => {
                if !matches!(capture, Capture::None) {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Ok(Event::GeneralRef(ref e)) => {
                if !matches!(capture, Capture::None) {
                    if let Some(c) = resolve_entity(&String::from_utf8_lossy(e.as_ref())) {
                        text.push(c);
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"display-name" | b"title" => {
                    let value = LangText {
                        lang: None,
                        text: text.trim().to_string(),
                    };
                    match std::mem::replace(&mut capture, Capture::None) {
                        Capture::DisplayName(lang) => {
                            if let Some(ch) = channel.as_mut() {
                                ch.display_names.push(LangText { lang, ..value });
                            }
                        }
                        Capture::Title(lang) => {
                            if let Some(p) = programme.as_mut() {
                                p.titles.push(LangText { lang, ..value });
                            }
                        }
                        Capture::None => {}
                    }
                    text.clear();
                }
                b"channel" => doc.channels.extend(channel.take()),
                b"programme" => doc.programmes.extend(programme.take()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(XmltvError::Malformed {
                    position: reader.buffer_position() as u64,
                    message: e.to_string(),
                })
            }
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(XmltvError::NotXmltv);
    }
    Ok(doc)
}

fn read_channel(e: &BytesStart<'_>) -> DocChannel {
    DocChannel {
        id: attr(e, b"id"),
        display_names: Vec::new(),
        icon: None,
    }
}

fn read_programme(e: &BytesStart<'_>) -> DocProgramme {
    DocProgramme {
        channel: attr(e, b"channel"),
        start: attr(e, b"start"),
        stop: attr(e, b"stop"),
        titles: Vec::new(),
    }
}

fn set_icon(channel: Option<&mut DocChannel>, e: &BytesStart<'_>) {
    if let Some(ch) = channel {
        ch.icon = attr(e, b"src").filter(|s| !s.trim().is_empty());
    }
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| unescape_xml(&String::from_utf8_lossy(&a.value)))
}

fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Resolve a general entity reference name (`amp`, `#233`, `#x4E2D`).
fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}

// ============================================================================
// Writing
// ============================================================================

/// Serialize a listing as an XMLTV document.
pub fn write_listing(listing: &Listing, generator: &str) -> Result<Vec<u8>, XmltvError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    w(writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None))))?;

    let mut tv = BytesStart::new("tv");
    tv.push_attribute(("generator-info-name", generator));
    w(writer.write_event(Event::Start(tv)))?;

    for channel in &listing.channels {
        let mut el = BytesStart::new("channel");
        el.push_attribute(("id", channel.id.as_str()));
        w(writer.write_event(Event::Start(el)))?;
        for name in &channel.names {
            let mut dn = BytesStart::new("display-name");
            dn.push_attribute(("lang", OUTPUT_LANG));
            w(writer.write_event(Event::Start(dn)))?;
            w(writer.write_event(Event::Text(BytesText::new(name))))?;
            w(writer.write_event(Event::End(BytesEnd::new("display-name"))))?;
        }
        w(writer.write_event(Event::End(BytesEnd::new("channel"))))?;
    }

    for p in &listing.programmes {
        let mut el = BytesStart::new("programme");
        el.push_attribute(("channel", p.channel.as_str()));
        el.push_attribute(("start", p.start.as_str()));
        el.push_attribute(("stop", p.stop.as_str()));
        w(writer.write_event(Event::Start(el)))?;
        let mut title = BytesStart::new("title");
        title.push_attribute(("lang", OUTPUT_LANG));
        w(writer.write_event(Event::Start(title)))?;
        w(writer.write_event(Event::Text(BytesText::new(&p.title))))?;
        w(writer.write_event(Event::End(BytesEnd::new("title"))))?;
        w(writer.write_event(Event::End(BytesEnd::new("programme"))))?;
    }

    w(writer.write_event(Event::End(BytesEnd::new("tv"))))?;

    let mut out = writer.into_inner();
    out.push(b'\n');
    Ok(out)
}

fn w<E: std::fmt::Display>(result: Result<(), E>) -> Result<(), XmltvError> {
    result.map_err(|e| XmltvError::Write(e.to_string()))
}

/// Write the listing to `path`, plus `path.gz` when `gzip` is set.
/// Returns every file written.
pub fn save_listing(
    path: &Path,
    listing: &Listing,
    generator: &str,
    gzip: bool,
) -> Result<Vec<PathBuf>, XmltvError> {
    let bytes = write_listing(listing, generator)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &bytes)?;
    let mut written = vec![path.to_path_buf()];

    if gzip {
        let mut gz_path = path.as_os_str().to_owned();
        gz_path.push(".gz");
        let gz_path = PathBuf::from(gz_path);
        let mut enc = GzEncoder::new(File::create(&gz_path)?, Compression::best());
        enc.write_all(&bytes)?;
        enc.finish()?;
        written.push(gz_path);
    }

    log::info!(
        "wrote {} ({} channels, {} programmes)",
        path.display(),
        listing.channels.len(),
        listing.programmes.len()
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvmerge_recon::guide::ListingChannel;
    use tvmerge_recon::model::ProgramEntry;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE tv SYSTEM "xmltv.dtd">
<tv generator-info-name="upstream">
  <channel id="cctv1">
    <display-name lang="zh">CCTV-1 综合</display-name>
    <display-name lang="en">CCTV1</display-name>
  </channel>
  <channel id="logo">
    <display-name>凤凰卫视</display-name>
    <icon src="http://img.example/phoenix.png"/>
  </channel>
  <programme channel="cctv1" start="20250101080000 +0800" stop="20250101090000 +0800">
    <title lang="en">Morning News</title>
    <title lang="zh">朝闻天下</title>
    <desc lang="zh">ignored</desc>
  </programme>
  <programme channel="cctv1" start="20250101090000 +0800">
    <title>Tom &amp; Jerry</title>
  </programme>
</tv>
"#;

    #[test]
    fn parses_channels_and_programmes() {
        let doc = parse_document(SAMPLE).unwrap();
        assert_eq!(doc.channels.len(), 2);
        assert_eq!(doc.channels[0].id.as_deref(), Some("cctv1"));
        assert_eq!(
            doc.channels[0].display_names,
            vec![LangText::new(Some("zh"), "CCTV-1 综合"), LangText::new(Some("en"), "CCTV1")]
        );
        assert_eq!(doc.channels[1].display_names[0].lang, None);
        assert_eq!(doc.channels[1].icon.as_deref(), Some("http://img.example/phoenix.png"));
        assert_eq!(doc.channels[0].icon, None);

        assert_eq!(doc.programmes.len(), 2);
        let first = &doc.programmes[0];
        assert_eq!(first.start.as_deref(), Some("20250101080000 +0800"));
        assert_eq!(first.titles[1], LangText::new(Some("zh"), "朝闻天下"));
        assert_eq!(doc.programmes[1].stop, None);
    }

    #[test]
    fn entities_are_resolved_with_surrounding_spaces() {
        let doc = parse_document(SAMPLE).unwrap();
        assert_eq!(doc.programmes[1].titles[0].text, "Tom & Jerry");
    }

    #[test]
    fn attribute_entities_are_unescaped() {
        let xml = r#"<tv><channel id="a&amp;b"><display-name>x</display-name></channel></tv>"#;
        let doc = parse_document(xml).unwrap();
        assert_eq!(doc.channels[0].id.as_deref(), Some("a&b"));
    }

    #[test]
    fn rejects_non_xmltv_and_broken_xml() {
        assert!(matches!(parse_document("<rss></rss>"), Err(XmltvError::NotXmltv)));
        assert!(matches!(
            parse_document("<tv><channel id=\"1\"></tv>"),
            Err(XmltvError::Malformed { .. })
        ));
    }

    #[test]
    fn numeric_entities() {
        assert_eq!(resolve_entity("#233"), Some('é'));
        assert_eq!(resolve_entity("#x4E2D"), Some('中'));
        assert_eq!(resolve_entity("nbsp"), None);
    }

    fn listing() -> Listing {
        Listing {
            channels: vec![ListingChannel {
                id: "1".into(),
                names: vec!["CCTV1".into()],
            }],
            programmes: vec![ProgramEntry {
                channel: "1".into(),
                start: "20250101080000 +0800".into(),
                stop: "20250101090000 +0800".into(),
                title: "新闻 <直播> & 访谈".into(),
            }],
        }
    }

    #[test]
    fn written_listing_reads_back() {
        let bytes = write_listing(&listing(), "tvmerge").unwrap();
        let xml = String::from_utf8(bytes).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("generator-info-name=\"tvmerge\""));
        assert!(xml.contains("<display-name lang=\"zh\">CCTV1</display-name>"));

        let doc = parse_document(&xml).unwrap();
        assert_eq!(doc.programmes[0].titles[0].text, "新闻 <直播> & 访谈");
        assert_eq!(doc.programmes[0].channel.as_deref(), Some("1"));
    }

    #[test]
    fn save_writes_plain_and_gzip_copies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("epg.xml");
        let written = save_listing(&path, &listing(), "tvmerge", true).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written[1].to_string_lossy().ends_with("epg.xml.gz"));

        let gz = std::fs::read(&written[1]).unwrap();
        let plain = std::fs::read(&path).unwrap();
        assert_eq!(crate::decode::decode_payload(&gz).unwrap().as_bytes(), plain.as_slice());
    }
}
