//! Streaming extraction of instrument records
//!
//! The source document is consumed as a forward-only event stream. Only the
//! record under construction, the current batch and one event buffer are
//! held in memory, so peak usage is bounded by the batch size no matter how
//! large the document is.
//!
//! Record layout (all tags in the record namespace):
//!
//! ```text
//! FinInstrm                      one output row per occurrence
//! └── TermntdRcrd | NewRcrd ...  first child only
//!     ├── FinInstrmGnlAttrbts
//!     │   ├── Id
//!     │   ├── FullNm
//!     │   ├── ClssfctnTp
//!     │   ├── CmmdtyDerivInd
//!     │   └── NtnlCcy
//!     └── Issr
//! ```
//!
//! Unknown elements are skipped at every level. When a field tag repeats
//! inside one record the last occurrence wins.

use crate::error::{IngestError, ParseError, Result};
use crate::models::{Field, InstrumentRecord};
use crate::writer::{BatchSink, CsvTableWriter};
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Namespace of DLTINS delta reports (ISO 20022 auth.036.001.02).
pub const DEFAULT_NAMESPACE: &str = "urn:iso:std:iso:20022:tech:xsd:auth.036.001.02";

/// Records held in memory before a flush.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

const RECORD_TAG: &[u8] = b"FinInstrm";
const GENERAL_ATTRIBUTES_TAG: &[u8] = b"FinInstrmGnlAttrbts";
const ISSUER_TAG: &[u8] = b"Issr";

const READ_BUFFER_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Namespace URI of the record elements
    pub namespace: String,

    /// Flush threshold, at least 1
    pub batch_size: usize,

    /// Write the column header when the destination table is created
    pub include_header: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            include_header: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionSummary {
    /// Records emitted, one per record element
    pub records: usize,

    /// Non-empty batches handed to the sink
    pub batches: usize,
}

/// Role of an open element below the current `FinInstrm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Container,
    GeneralAttributes,
    Field(Field),
    Ignored,
}

/// The record being assembled.
#[derive(Debug, Default)]
struct PendingRecord {
    record: InstrumentRecord,
    scopes: Vec<Scope>,
    children_seen: usize,
    text: String,
}

impl PendingRecord {
    /// Classifies a child element opened at the current position.
    fn open(&mut self, in_namespace: bool, local_name: &[u8]) -> Scope {
        let scope = match self.scopes.last() {
            None => {
                self.children_seen += 1;
                if self.children_seen == 1 {
                    Scope::Container
                } else {
                    Scope::Ignored
                }
            },
            Some(Scope::Container) if in_namespace => match local_name {
                GENERAL_ATTRIBUTES_TAG => Scope::GeneralAttributes,
                ISSUER_TAG => Scope::Field(Field::Issuer),
                _ => Scope::Ignored,
            },
            Some(Scope::GeneralAttributes) if in_namespace => {
                Field::from_general_attribute(local_name)
                    .map(Scope::Field)
                    .unwrap_or(Scope::Ignored)
            },
            _ => Scope::Ignored,
        };

        if let Scope::Field(_) = scope {
            self.text.clear();
        }
        scope
    }

    /// Stores the collected text if `scope` was a field.
    fn close(&mut self, scope: Scope) {
        if let Scope::Field(field) = scope {
            let value = self.text.trim();
            let value = (!value.is_empty()).then(|| value.to_string());
            field.assign(&mut self.record, value);
            self.text.clear();
        }
    }

    /// True while inside a field element whose text is being collected.
    fn collecting(&self) -> bool {
        matches!(self.scopes.last(), Some(Scope::Field(_)))
    }

    fn push_text(&mut self, text: &str) {
        if self.collecting() {
            self.text.push_str(text);
        }
    }
}

/// Well-formedness of the document outside any element.
#[derive(Debug, Default)]
struct Prolog {
    root_seen: bool,
    root_closed: bool,
}

impl Prolog {
    /// An element opens at depth 0.
    fn open_root(&mut self) -> std::result::Result<(), &'static str> {
        if self.root_closed {
            return Err("junk after document element");
        }
        self.root_seen = true;
        Ok(())
    }

    /// Character data at depth 0; only whitespace is allowed there.
    fn text(&self, raw: &[u8]) -> std::result::Result<(), &'static str> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            Ok(())
        } else if self.root_closed {
            Err("junk after document element")
        } else {
            Err("text outside the document element")
        }
    }
}

/// Per-call accumulation state. Nothing outlives one extraction.
struct Batcher<'s, S: BatchSink> {
    sink: &'s mut S,
    batch: Vec<InstrumentRecord>,
    batch_size: usize,
    summary: ExtractionSummary,
}

impl<'s, S: BatchSink> Batcher<'s, S> {
    fn new(sink: &'s mut S, batch_size: usize) -> Self {
        Self {
            sink,
            batch: Vec::with_capacity(batch_size.min(DEFAULT_BATCH_SIZE)),
            batch_size,
            summary: ExtractionSummary::default(),
        }
    }

    fn push(&mut self, record: InstrumentRecord) -> Result<()> {
        self.batch.push(record);
        self.summary.records += 1;
        if self.batch.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.sink.append_batch(&self.batch)?;
        if !self.batch.is_empty() {
            self.summary.batches += 1;
            debug!(
                rows = self.batch.len(),
                total = self.summary.records,
                "flushed batch"
            );
        }
        self.batch.clear();
        Ok(())
    }

    /// Flushes the trailing partial batch, even when it is empty.
    fn finish(mut self) -> Result<ExtractionSummary> {
        self.flush()?;
        Ok(self.summary)
    }
}

/// Streams `source`, handing every full batch of records to `sink` and the
/// trailing partial batch at end of stream.
///
/// On malformed XML or a read failure the in-progress batch is dropped and a
/// [`ParseError`] naming `source_id` is returned. A source without exactly one
/// document element (empty, plain text, several roots, trailing junk) is
/// malformed. Batches flushed before the
/// failure stay in the sink, so its content must be treated as partial.
pub fn extract_records<R, S>(
    source: R,
    source_id: &str,
    sink: &mut S,
    options: &ExtractOptions,
) -> Result<ExtractionSummary>
where
    R: BufRead,
    S: BatchSink,
{
    if options.batch_size == 0 {
        return Err(IngestError::Config(
            "batch size must be greater than 0".to_string(),
        ));
    }

    let namespace = options.namespace.as_bytes();
    let mut reader = NsReader::from_reader(source);
    // whitespace is trimmed once per field, after comments and CDATA are joined
    reader.config_mut().trim_text(false);

    let mut batcher = Batcher::new(sink, options.batch_size);
    let mut pending: Option<PendingRecord> = None;
    let mut depth = 0usize;
    let mut prolog = Prolog::default();
    let mut buf = Vec::new();

    loop {
        let position = reader.buffer_position() as u64;
        let (resolved, event) = reader
            .read_resolved_event_into(&mut buf)
            .map_err(|e| ParseError::new(source_id, position, e))?;
        let in_namespace = matches!(resolved, ResolveResult::Bound(Namespace(ns)) if ns == namespace);

        match event {
            Event::Start(e) => {
                if depth == 0 {
                    prolog
                        .open_root()
                        .map_err(|msg| ParseError::new(source_id, position, msg))?;
                }
                depth += 1;
                let local = e.local_name();
                match pending.as_mut() {
                    Some(p) => {
                        let scope = p.open(in_namespace, local.as_ref());
                        p.scopes.push(scope);
                    },
                    None if in_namespace && local.as_ref() == RECORD_TAG => {
                        pending = Some(PendingRecord::default());
                    },
                    None => {},
                }
            },
            Event::Empty(e) => {
                if depth == 0 {
                    prolog
                        .open_root()
                        .map_err(|msg| ParseError::new(source_id, position, msg))?;
                    prolog.root_closed = true;
                }
                let local = e.local_name();
                match pending.as_mut() {
                    Some(p) => {
                        let scope = p.open(in_namespace, local.as_ref());
                        p.close(scope);
                    },
                    None if in_namespace && local.as_ref() == RECORD_TAG => {
                        batcher.push(InstrumentRecord::default())?;
                    },
                    None => {},
                }
            },
            Event::Text(e) => {
                if depth == 0 {
                    prolog
                        .text(&e)
                        .map_err(|msg| ParseError::new(source_id, position, msg))?;
                }
                if let Some(p) = pending.as_mut().filter(|p| p.collecting()) {
                    let text = e
                        .unescape()
                        .map_err(|err| ParseError::new(source_id, position, err))?;
                    p.push_text(&text);
                }
            },
            Event::CData(e) => {
                if depth == 0 {
                    return Err(ParseError::new(
                        source_id,
                        position,
                        "CDATA outside the document element",
                    )
                    .into());
                }
                if let Some(p) = pending.as_mut().filter(|p| p.collecting()) {
                    let text = std::str::from_utf8(&e)
                        .map_err(|err| ParseError::new(source_id, position, err))?;
                    p.push_text(text);
                }
            },
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    prolog.root_closed = true;
                }
                if let Some(p) = pending.as_mut() {
                    match p.scopes.pop() {
                        Some(scope) => p.close(scope),
                        None => {
                            if let Some(done) = pending.take() {
                                batcher.push(done.record)?;
                            }
                        },
                    }
                }
            },
            Event::Eof => {
                if depth > 0 {
                    return Err(ParseError::new(
                        source_id,
                        position,
                        format!("document ended with {} unclosed element(s)", depth),
                    )
                    .into());
                }
                if !prolog.root_seen {
                    return Err(ParseError::new(source_id, position, "no element found").into());
                }
                break;
            },
            _ => {},
        }

        buf.clear();
    }

    batcher.finish()
}

/// Extracts `xml_path` into a fresh CSV table at `csv_path`.
///
/// Precondition handled here: the destination is truncated (and the header
/// written, if enabled) before parsing starts, so repeated runs never append
/// onto stale rows.
#[instrument(skip_all, fields(source = %xml_path.display(), destination = %csv_path.display()))]
pub fn extract_to_csv(
    xml_path: &Path,
    csv_path: &Path,
    options: &ExtractOptions,
) -> Result<ExtractionSummary> {
    let source_id = xml_path.display().to_string();
    let started = Instant::now();

    let file = File::open(xml_path).map_err(|e| ParseError::new(&source_id, 0, e))?;
    let reader = BufReader::with_capacity(READ_BUFFER_BYTES, file);
    let mut writer = CsvTableWriter::create(csv_path, options.include_header)?;

    let summary = extract_records(reader, &source_id, &mut writer, options)?;

    info!(
        records = summary.records,
        batches = summary.batches,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "parsed records"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WriteError;

    /// Keeps every flushed batch for inspection.
    #[derive(Default)]
    struct RecordingSink {
        flushes: Vec<Vec<InstrumentRecord>>,
    }

    impl BatchSink for RecordingSink {
        fn append_batch(&mut self, records: &[InstrumentRecord]) -> std::result::Result<(), WriteError> {
            self.flushes.push(records.to_vec());
            Ok(())
        }
    }

    fn document(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<BizData xmlns="urn:iso:std:iso:20022:tech:xsd:head.003.001.01">
  <Pyld>
    <Document xmlns="{}">
      <FinInstrmRptgRefDataDltaRpt>
        {}
      </FinInstrmRptgRefDataDltaRpt>
    </Document>
  </Pyld>
</BizData>"#,
            DEFAULT_NAMESPACE, body
        )
    }

    fn run(xml: &str, batch_size: usize) -> Result<(ExtractionSummary, RecordingSink)> {
        let mut sink = RecordingSink::default();
        let options = ExtractOptions {
            batch_size,
            ..Default::default()
        };
        let summary = extract_records(xml.as_bytes(), "test.xml", &mut sink, &options)?;
        Ok((summary, sink))
    }

    fn all_records(sink: &RecordingSink) -> Vec<InstrumentRecord> {
        sink.flushes.iter().flatten().cloned().collect()
    }

    const FULL_RECORD: &str = r#"
        <FinInstrm>
          <TermntdRcrd>
            <FinInstrmGnlAttrbts>
              <Id>DE000MC7YRD4</Id>
              <FullNm>Open End Turbo Long Planet Fitness emittiert von Morgan Stanley &amp; Co. Int. plc</FullNm>
              <ShrtNm>MS/TL PLNT FTNS</ShrtNm>
              <ClssfctnTp>RFSTCA</ClssfctnTp>
              <NtnlCcy>EUR</NtnlCcy>
              <CmmdtyDerivInd>false</CmmdtyDerivInd>
            </FinInstrmGnlAttrbts>
            <Issr>4PQUHN3JPFGFNF3BB653</Issr>
            <TradgVnRltdAttrbts><Id>FRAB</Id></TradgVnRltdAttrbts>
          </TermntdRcrd>
        </FinInstrm>"#;

    #[test]
    fn test_full_record() {
        let (summary, sink) = run(&document(FULL_RECORD), 10).unwrap();

        assert_eq!(summary.records, 1);
        assert_eq!(
            all_records(&sink),
            vec![InstrumentRecord {
                id: Some("DE000MC7YRD4".to_string()),
                full_name: Some(
                    "Open End Turbo Long Planet Fitness emittiert von Morgan Stanley & Co. Int. plc"
                        .to_string()
                ),
                classification_type: Some("RFSTCA".to_string()),
                commodity_derivative_indicator: Some("false".to_string()),
                currency: Some("EUR".to_string()),
                issuer: Some("4PQUHN3JPFGFNF3BB653".to_string()),
            }]
        );
    }

    #[test]
    fn test_missing_fields_still_emit_rows() {
        let body = r#"
            <FinInstrm><NewRcrd><FinInstrmGnlAttrbts><Id>A</Id></FinInstrmGnlAttrbts></NewRcrd></FinInstrm>
            <FinInstrm><NewRcrd/></FinInstrm>
            <FinInstrm/>
            <FinInstrm><ModfdRcrd><Issr>LEI</Issr><FinInstrmGnlAttrbts><NtnlCcy/></FinInstrmGnlAttrbts></ModfdRcrd></FinInstrm>"#;

        let (summary, sink) = run(&document(body), 10).unwrap();
        let records = all_records(&sink);

        assert_eq!(summary.records, 4);
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].id.as_deref(), Some("A"));
        assert_eq!(records[0].issuer, None);
        assert!(records[1].is_empty());
        assert!(records[2].is_empty());
        assert_eq!(records[3].issuer.as_deref(), Some("LEI"));
        assert_eq!(records[3].currency, None);
    }

    #[test]
    fn test_only_first_container_is_read() {
        let body = r#"
            <FinInstrm>
              <TermntdRcrd><FinInstrmGnlAttrbts><Id>FIRST</Id></FinInstrmGnlAttrbts></TermntdRcrd>
              <NewRcrd><FinInstrmGnlAttrbts><Id>SECOND</Id></FinInstrmGnlAttrbts><Issr>X</Issr></NewRcrd>
            </FinInstrm>"#;

        let (_, sink) = run(&document(body), 10).unwrap();
        let records = all_records(&sink);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id.as_deref(), Some("FIRST"));
        assert_eq!(records[0].issuer, None);
    }

    #[test]
    fn test_duplicate_tags_last_wins() {
        let body = r#"
            <FinInstrm><NewRcrd>
              <FinInstrmGnlAttrbts><NtnlCcy>EUR</NtnlCcy><NtnlCcy>USD</NtnlCcy></FinInstrmGnlAttrbts>
              <Issr>FIRST</Issr><Issr>LAST</Issr>
            </NewRcrd></FinInstrm>"#;

        let (_, sink) = run(&document(body), 10).unwrap();
        let records = all_records(&sink);

        assert_eq!(records[0].currency.as_deref(), Some("USD"));
        assert_eq!(records[0].issuer.as_deref(), Some("LAST"));
    }

    #[test]
    fn test_other_namespace_is_ignored() {
        let xml = format!(
            r#"<Root xmlns:x="urn:other" xmlns="{}">
                 <x:FinInstrm><x:NewRcrd><x:FinInstrmGnlAttrbts><x:Id>NOPE</x:Id></x:FinInstrmGnlAttrbts></x:NewRcrd></x:FinInstrm>
                 <FinInstrm><NewRcrd><FinInstrmGnlAttrbts><x:Id>NOPE</x:Id><Id>YES</Id></FinInstrmGnlAttrbts></NewRcrd></FinInstrm>
               </Root>"#,
            DEFAULT_NAMESPACE
        );

        let (summary, sink) = run(&xml, 10).unwrap();
        let records = all_records(&sink);

        assert_eq!(summary.records, 1);
        assert_eq!(records[0].id.as_deref(), Some("YES"));
    }

    #[test]
    fn test_prefixed_record_namespace() {
        let xml = format!(
            r#"<a:Document xmlns:a="{}"><a:FinInstrm><a:NewRcrd><a:Issr>P</a:Issr></a:NewRcrd></a:FinInstrm></a:Document>"#,
            DEFAULT_NAMESPACE
        );

        let (_, sink) = run(&xml, 10).unwrap();
        assert_eq!(all_records(&sink)[0].issuer.as_deref(), Some("P"));
    }

    #[test]
    fn test_cdata_text() {
        let body = r#"<FinInstrm><NewRcrd><FinInstrmGnlAttrbts><FullNm><![CDATA[A & B <C>]]></FullNm></FinInstrmGnlAttrbts></NewRcrd></FinInstrm>"#;

        let (_, sink) = run(&document(body), 10).unwrap();
        assert_eq!(all_records(&sink)[0].full_name.as_deref(), Some("A & B <C>"));
    }

    #[test]
    fn test_comment_inside_field_keeps_spacing() {
        let body = r#"<FinInstrm><NewRcrd><FinInstrmGnlAttrbts><FullNm>
            Alpha <!-- split --> Beta <?pi x?> Gamma
        </FullNm><Id> </Id></FinInstrmGnlAttrbts></NewRcrd></FinInstrm>"#;

        let (_, sink) = run(&document(body), 10).unwrap();
        let record = &all_records(&sink)[0];
        assert_eq!(record.full_name.as_deref(), Some("Alpha  Beta  Gamma"));
        assert_eq!(record.id, None);
    }

    #[test]
    fn test_invalid_utf8_in_cdata_is_parse_error() {
        let mut xml = document(
            "<FinInstrm><NewRcrd><FinInstrmGnlAttrbts><FullNm><![CDATA[X]]></FullNm></FinInstrmGnlAttrbts></NewRcrd></FinInstrm>",
        )
        .into_bytes();
        let at = xml.windows(3).position(|w| w == b"[X]").unwrap() + 1;
        xml[at] = 0xFF;

        let mut sink = RecordingSink::default();
        let result = extract_records(xml.as_slice(), "cdata.xml", &mut sink, &ExtractOptions::default());
        match result {
            Err(IngestError::Parse(err)) => assert_eq!(err.source_id, "cdata.xml"),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_documents_without_single_root_are_rejected() {
        let record_root = format!(r#"<FinInstrm xmlns="{}"/>trailing junk"#, DEFAULT_NAMESPACE);
        let inputs = [
            "",
            "   \n",
            "not xml",
            "<a/><b/>",
            "<a></a><b></b>",
            "<?xml version=\"1.0\"?>\n<!-- nothing -->\n",
            record_root.as_str(),
        ];

        for input in inputs {
            let mut sink = RecordingSink::default();
            let result = extract_records(input.as_bytes(), "bad.xml", &mut sink, &ExtractOptions::default());
            assert!(
                matches!(result, Err(IngestError::Parse(_))),
                "{:?} should not parse, got {:?}",
                input,
                result
            );
            // nothing reaches the sink, not even the closing flush
            assert!(sink.flushes.is_empty(), "{:?} flushed", input);
        }
    }

    #[test]
    fn test_whitespace_after_root_is_accepted() {
        let xml = format!("{}\n\n  \t\n", document(""));
        let (summary, _) = run(&xml, 10).unwrap();
        assert_eq!(summary.records, 0);
    }

    /// Accepts `ok_calls` batches, then fails every append.
    struct FailingSink {
        calls: usize,
        ok_calls: usize,
    }

    impl BatchSink for FailingSink {
        fn append_batch(&mut self, _records: &[InstrumentRecord]) -> std::result::Result<(), WriteError> {
            self.calls += 1;
            if self.calls > self.ok_calls {
                return Err(WriteError::Io {
                    path: "out.csv".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_sink_failure_stops_extraction() {
        let mut sink = FailingSink { calls: 0, ok_calls: 1 };
        let options = ExtractOptions {
            batch_size: 1,
            ..Default::default()
        };

        let body = FULL_RECORD.repeat(3);
        let err = extract_records(document(&body).as_bytes(), "test.xml", &mut sink, &options).unwrap_err();

        assert!(matches!(err, IngestError::Write(_)));
        assert_eq!(err.stage(), "write");
        assert_eq!(sink.calls, 2);
    }

    #[test]
    fn test_batches_flush_at_threshold() {
        let body = FULL_RECORD.repeat(7);
        let (summary, sink) = run(&document(&body), 3).unwrap();

        let sizes: Vec<usize> = sink.flushes.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(summary.records, 7);
        assert_eq!(summary.batches, 3);
    }

    #[test]
    fn test_trailing_empty_batch_is_flushed() {
        let body = FULL_RECORD.repeat(4);
        let (summary, sink) = run(&document(&body), 2).unwrap();

        let sizes: Vec<usize> = sink.flushes.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 0]);
        assert_eq!(summary.batches, 2);
    }

    #[test]
    fn test_no_records() {
        let (summary, sink) = run(&document(""), 5).unwrap();
        assert_eq!(summary, ExtractionSummary::default());
        assert_eq!(sink.flushes, vec![Vec::new()]);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result = run(&document(FULL_RECORD), 0);
        assert!(matches!(result, Err(IngestError::Config(_))));
    }

    #[test]
    fn test_mismatched_tag_is_parse_error() {
        let xml = document("<FinInstrm><NewRcrd></Wrong></FinInstrm>");
        match run(&xml, 10) {
            Err(IngestError::Parse(err)) => assert_eq!(err.source_id, "test.xml"),
            other => panic!("expected parse error, got {:?}", other.map(|(s, _)| s)),
        }
    }

    #[test]
    fn test_truncated_document_is_parse_error() {
        let xml = document(FULL_RECORD);
        let truncated = &xml[..xml.find("</FinInstrmRptgRefDataDltaRpt>").unwrap()];

        let mut sink = RecordingSink::default();
        let result = extract_records(
            truncated.as_bytes(),
            "truncated.xml",
            &mut sink,
            &ExtractOptions::default(),
        );

        assert!(matches!(result, Err(IngestError::Parse(_))));
        // the in-progress batch is discarded, never flushed
        assert!(sink.flushes.is_empty());
    }

    #[test]
    fn test_parse_error_keeps_earlier_flushes() {
        let body = format!("{}{}<FinInstrm></Broken>", FULL_RECORD, FULL_RECORD);
        let mut sink = RecordingSink::default();
        let options = ExtractOptions {
            batch_size: 1,
            ..Default::default()
        };

        let result = extract_records(document(&body).as_bytes(), "partial.xml", &mut sink, &options);

        assert!(result.is_err());
        assert_eq!(sink.flushes.len(), 2);
    }
}
