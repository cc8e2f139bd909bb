//! Download-link lookup in the FIRDS discovery document
//!
//! The discovery document is a Solr `select` response. Each `doc` element
//! describes one published file as a list of named values:
//!
//! ```xml
//! <result name="response" numFound="2" start="0">
//!   <doc>
//!     <str name="download_link">http://firds.esma.europa.eu/firds/DLTINS_20210117_01of01.zip</str>
//!     <str name="file_type">DLTINS</str>
//!   </doc>
//! </result>
//! ```
//!
//! The document is small, so it is read fully into memory.

use crate::error::{IngestError, ParseError, Result};
use crate::models::DiscoveryEntry;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::ops::ControlFlow;
use std::path::Path;
use tracing::{debug, warn};

/// File type of the delta instrument reports.
pub const DEFAULT_FILE_TYPE: &str = "DLTINS";

const ENTRY_TAG: &[u8] = b"doc";
const NAME_ATTRIBUTE: &[u8] = b"name";

/// Which named values identify an entry's type and its link.
#[derive(Debug, Clone)]
pub struct LinkLocator {
    pub type_field: String,
    pub link_field: String,
}

impl Default for LinkLocator {
    fn default() -> Self {
        Self {
            type_field: "file_type".to_string(),
            link_field: "download_link".to_string(),
        }
    }
}

impl LinkLocator {
    /// Link of the first entry, in document order, whose type equals
    /// `file_type`.
    ///
    /// Returns `None` when nothing matches or the document cannot be read
    /// as XML; the caller decides whether that is fatal.
    pub fn find(&self, document: &str, file_type: &str) -> Option<String> {
        let mut found = None;

        let scanned = scan_entries(document, |entry| {
            if entry.get(&self.type_field) == Some(file_type) {
                found = entry.get(&self.link_field).map(str::to_string);
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        if let Err(message) = scanned {
            warn!(error = %message, "discovery document is not well-formed");
        }

        match &found {
            Some(link) => debug!(%file_type, %link, "download link located"),
            None => debug!(%file_type, "no entry with a download link matched"),
        }
        found
    }
}

/// [`LinkLocator::find`] with the default field names.
pub fn find_link(document: &str, file_type: &str) -> Option<String> {
    LinkLocator::default().find(document, file_type)
}

/// Reads `path` and looks up the link. Only the file read can fail.
pub fn find_link_in_file(path: &Path, file_type: &str) -> Result<Option<String>> {
    let document = std::fs::read_to_string(path)?;
    Ok(find_link(&document, file_type))
}

/// Every entry of the document, in order.
pub fn parse_entries(document: &str, source_id: &str) -> Result<Vec<DiscoveryEntry>> {
    let mut entries = Vec::new();
    scan_entries(document, |entry| {
        entries.push(entry);
        ControlFlow::Continue(())
    })
    .map_err(|message| IngestError::from(ParseError::new(source_id, 0, message)))?;
    Ok(entries)
}

/// Walks the document once, handing each completed entry to `visit` until
/// it breaks. Errors carry the reader's message and byte position.
fn scan_entries<F>(document: &str, mut visit: F) -> std::result::Result<(), String>
where
    F: FnMut(DiscoveryEntry) -> ControlFlow<()>,
{
    let mut reader = Reader::from_str(document);
    reader.config_mut().trim_text(true);

    let mut entry: Option<DiscoveryEntry> = None;
    // depth below the open `doc`; 1 means inside one of its named values
    let mut depth = 0usize;
    let mut field: Option<String> = None;
    let mut text = String::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("{} at byte {}", e, reader.buffer_position()))?;

        match event {
            Event::Start(e) => match entry.as_mut() {
                None if e.local_name().as_ref() == ENTRY_TAG => {
                    entry = Some(DiscoveryEntry::default());
                    depth = 0;
                },
                None => {},
                Some(_) => {
                    depth += 1;
                    if depth == 1 {
                        field = attribute_value(&e, NAME_ATTRIBUTE);
                        text.clear();
                    }
                },
            },
            Event::Empty(e) => {
                if let Some(current) = entry.as_mut() {
                    if depth == 0 {
                        if let Some(name) = attribute_value(&e, NAME_ATTRIBUTE) {
                            current.fields.insert(name, String::new());
                        }
                    }
                }
            },
            Event::Text(e) => {
                if entry.is_some() && depth == 1 && field.is_some() {
                    let value = e.unescape().map_err(|err| err.to_string())?;
                    text.push_str(&value);
                }
            },
            Event::End(_) => {
                if let Some(current) = entry.as_mut() {
                    if depth == 0 {
                        if let Some(done) = entry.take() {
                            if visit(done).is_break() {
                                return Ok(());
                            }
                        }
                    } else {
                        if depth == 1 {
                            if let Some(name) = field.take() {
                                current.fields.insert(name, text.trim().to_string());
                            }
                        }
                        depth -= 1;
                    }
                }
            },
            Event::Eof => return Ok(()),
            _ => {},
        }
    }
}

fn attribute_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}
