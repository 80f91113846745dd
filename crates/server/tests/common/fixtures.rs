//! Test fixtures for building uploads and reading feeds.

use quick_xml::Reader;
use quick_xml::events::Event;
use std::io::{Cursor, Write};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Multipart boundary used by [`multipart_body`].
pub const BOUNDARY: &str = "cask-test-boundary";

/// Build a zip archive from `(name, contents)` entries.
#[allow(dead_code)]
pub fn zip_of(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in files {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(body).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A minimal unpacked extension at `version`.
#[allow(dead_code)]
pub fn extension(version: &str) -> Vec<u8> {
    let manifest = format!(
        r#"{{"name":"Demo Extension","version":"{version}","manifest_version":2,"permissions":["tabs"]}}"#
    );
    zip_of(&[
        ("manifest.json", manifest.as_bytes()),
        ("background.js", b"chrome.tabs.query({}, () => {});"),
        ("icons/icon16.png", b"\x89PNG\r\n\x1a\n"),
    ])
}

/// Generate deterministic, poorly compressible test data.
#[allow(dead_code)]
pub fn seeded_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    let mut state = seed;

    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    data
}

/// Encode an upload form. `None` leaves the field out.
#[allow(dead_code)]
pub fn multipart_body(name: Option<&str>, archive: Option<&[u8]>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(name) = name {
        write!(
            body,
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\n{name}\r\n"
        )
        .unwrap();
    }
    if let Some(archive) = archive {
        write!(
            body,
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"zippedExtension\"; \
             filename=\"extension.zip\"\r\nContent-Type: application/zip\r\n\r\n"
        )
        .unwrap();
        body.extend_from_slice(archive);
        body.extend_from_slice(b"\r\n");
    }
    write!(body, "--{BOUNDARY}--\r\n").unwrap();
    body
}

/// One `app` element of a feed, as a client sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedApp {
    pub app_id: String,
    pub codebase: String,
    pub version: String,
}

/// Parse a feed document, asserting the gupdate envelope along the way.
#[allow(dead_code)]
pub fn parse_feed(xml: &str) -> Vec<FeedApp> {
    let mut reader = Reader::from_str(xml);
    let mut apps = Vec::new();
    let mut current_app: Option<String> = None;
    let mut saw_root = false;

    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                b"gupdate" => {
                    assert_eq!(
                        attr(&e, "xmlns"),
                        "http://www.google.com/update2/response"
                    );
                    assert_eq!(attr(&e, "protocol"), "2.0");
                    saw_root = true;
                }
                b"app" => current_app = Some(attr(&e, "appid")),
                b"updatecheck" => apps.push(FeedApp {
                    app_id: current_app.clone().expect("updatecheck outside app"),
                    codebase: attr(&e, "codebase"),
                    version: attr(&e, "version"),
                }),
                other => panic!("unexpected element {:?}", String::from_utf8_lossy(other)),
            },
            Event::End(e) if e.name().as_ref() == b"app" => current_app = None,
            Event::Eof => break,
            _ => {}
        }
    }

    assert!(saw_root, "feed has no gupdate element");
    apps
}

fn attr(e: &quick_xml::events::BytesStart<'_>, name: &str) -> String {
    e.try_get_attribute(name)
        .unwrap()
        .unwrap_or_else(|| panic!("missing attribute {name}"))
        .unescape_value()
        .unwrap()
        .into_owned()
}
