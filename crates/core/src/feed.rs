//! Update feed document (gupdate protocol 2.0).

use crate::identity::AppId;
use crate::version::PackageVersion;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use serde::Serialize;

/// XML namespace of the update response.
pub const GUPDATE_NAMESPACE: &str = "http://www.google.com/update2/response";

/// Protocol version advertised by the feed.
pub const GUPDATE_PROTOCOL: &str = "2.0";

/// Media type of the rendered feed.
pub const FEED_CONTENT_TYPE: &str = "text/xml";

/// One application entry of the feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FeedEntry {
    /// Identity of the application.
    pub app_id: AppId,
    /// Absolute download URL of the package.
    pub codebase: String,
    /// Latest published version.
    pub version: PackageVersion,
}

/// The update-check response polled by browser clients.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FeedDocument {
    /// Application entries. Position carries no meaning for clients.
    pub entries: Vec<FeedEntry>,
}

fn feed_err(e: impl std::fmt::Display) -> crate::Error {
    crate::Error::Feed(e.to_string())
}

impl FeedDocument {
    /// Create an empty feed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry.
    pub fn push(&mut self, entry: FeedEntry) {
        self.entries.push(entry);
    }

    /// Look up the entry for an application id.
    pub fn entry(&self, app_id: &AppId) -> Option<&FeedEntry> {
        self.entries.iter().find(|e| &e.app_id == app_id)
    }

    /// Render as a pretty-printed XML document.
    pub fn to_xml(&self) -> crate::Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(feed_err)?;

        let mut root = BytesStart::new("gupdate");
        root.push_attribute(("xmlns", GUPDATE_NAMESPACE));
        root.push_attribute(("protocol", GUPDATE_PROTOCOL));
        writer.write_event(Event::Start(root)).map_err(feed_err)?;

        for entry in &self.entries {
            let version = entry.version.to_string();

            let mut app = BytesStart::new("app");
            app.push_attribute(("appid", entry.app_id.as_str()));
            writer.write_event(Event::Start(app)).map_err(feed_err)?;

            let mut check = BytesStart::new("updatecheck");
            check.push_attribute(("codebase", entry.codebase.as_str()));
            check.push_attribute(("version", version.as_str()));
            writer.write_event(Event::Empty(check)).map_err(feed_err)?;

            writer
                .write_event(Event::End(BytesEnd::new("app")))
                .map_err(feed_err)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("gupdate")))
            .map_err(feed_err)?;

        String::from_utf8(writer.into_inner()).map_err(feed_err)
    }

    /// Parse a rendered feed, as an update client would.
    pub fn from_xml(xml: &str) -> crate::Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut doc = Self::new();
        let mut saw_root = false;
        let mut current_app: Option<AppId> = None;

        loop {
            match reader.read_event().map_err(feed_err)? {
                Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                    b"gupdate" => {
                        let protocol = attribute(&e, "protocol")?;
                        if protocol.as_deref() != Some(GUPDATE_PROTOCOL) {
                            return Err(feed_err(format!(
                                "unsupported protocol: {protocol:?}"
                            )));
                        }
                        saw_root = true;
                    }
                    b"app" => {
                        let app_id = attribute(&e, "appid")?
                            .ok_or_else(|| feed_err("app element without appid"))?;
                        current_app = Some(AppId::parse(&app_id)?);
                    }
                    b"updatecheck" => {
                        let app_id = current_app
                            .clone()
                            .ok_or_else(|| feed_err("updatecheck outside of app"))?;
                        let codebase = attribute(&e, "codebase")?
                            .ok_or_else(|| feed_err("updatecheck without codebase"))?;
                        let version = attribute(&e, "version")?
                            .ok_or_else(|| feed_err("updatecheck without version"))?;
                        doc.push(FeedEntry {
                            app_id,
                            codebase,
                            version: PackageVersion::parse(&version)?,
                        });
                    }
                    _ => {}
                },
                Event::End(e) if e.name().as_ref() == b"app" => current_app = None,
                Event::Eof => break,
                _ => {}
            }
        }

        if !saw_root {
            return Err(feed_err("missing gupdate root element"));
        }
        Ok(doc)
    }
}

fn attribute(element: &BytesStart<'_>, name: &str) -> crate::Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(feed_err)?;
        if attr.key.as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value().map_err(feed_err)?.into_owned()));
        }
    }
    Ok(None)
}
