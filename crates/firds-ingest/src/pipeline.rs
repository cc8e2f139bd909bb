//! End-to-end run: discovery document to published tables
//!
//! Stages run strictly in sequence and the first failure ends the run. Blocking
//! work (archive extraction, record parsing) is moved off the async runtime
//! but still awaited before the next stage starts.

use crate::archive::{filter_by_extension, ArchiveExtractor};
use crate::config::IngestConfig;
use crate::discovery::LinkLocator;
use crate::error::{ExtractError, IngestError, Result};
use crate::fetch::{file_name_from_url, Fetcher};
use crate::parser::{extract_to_csv, ExtractionSummary};
use crate::storage::{PublishedObject, Uploader};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument};

pub const DISCOVERY_FILE_NAME: &str = "discovery.xml";
pub const EXTRACTED_DIR_NAME: &str = "extracted";
const FALLBACK_ARCHIVE_NAME: &str = "archive.zip";

/// One XML payload turned into a table.
#[derive(Debug, Clone, Serialize)]
pub struct PublishedTable {
    pub source: PathBuf,
    pub table: PathBuf,
    pub records: usize,
    pub batches: usize,
    /// `None` when uploads are skipped
    pub published: Option<PublishedObject>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub discovery_url: String,
    pub link: String,
    pub archive: PathBuf,
    pub tables: Vec<PublishedTable>,
}

impl PipelineReport {
    pub fn total_records(&self) -> usize {
        self.tables.iter().map(|t| t.records).sum()
    }
}

pub struct Pipeline {
    config: IngestConfig,
    locator: LinkLocator,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn ArchiveExtractor>,
    uploader: Option<Arc<dyn Uploader>>,
}

impl Pipeline {
    /// Fails when the configuration is invalid or uploads are enabled
    /// without an uploader.
    pub fn new(
        config: IngestConfig,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn ArchiveExtractor>,
        uploader: Option<Arc<dyn Uploader>>,
    ) -> Result<Self> {
        config.validate().map_err(IngestError::Config)?;

        if !config.skip_upload && uploader.is_none() {
            return Err(IngestError::Config(
                "uploads are enabled but no uploader is configured".to_string(),
            ));
        }

        let locator = LinkLocator {
            type_field: config.type_field.clone(),
            link_field: config.link_field.clone(),
        };

        Ok(Self {
            config,
            locator,
            fetcher,
            extractor,
            uploader,
        })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Runs every stage; a failure is logged once, with its stage, and
    /// returned.
    pub async fn run(&self) -> Result<PipelineReport> {
        let result = self.execute().await;

        match &result {
            Ok(report) => info!(
                link = %report.link,
                tables = report.tables.len(),
                records = report.total_records(),
                "pipeline finished"
            ),
            Err(e) => error!(stage = e.stage(), error = %e, "pipeline failed"),
        }

        result
    }

    #[instrument(skip(self), fields(work_dir = %self.config.work_dir.display()))]
    async fn execute(&self) -> Result<PipelineReport> {
        let work_dir = self.config.work_dir.clone();
        tokio::fs::create_dir_all(&work_dir).await?;

        let discovery_url = self.config.discovery_url();
        let discovery_path = self
            .fetcher
            .fetch(&discovery_url, &work_dir.join(DISCOVERY_FILE_NAME))
            .await?;

        let link = self.locate(&discovery_path).await?;
        info!(%link, file_type = %self.config.file_type, "download link located");

        let archive_name = file_name_from_url(&link).unwrap_or_else(|| FALLBACK_ARCHIVE_NAME.to_string());
        let archive = self.fetcher.fetch(&link, &work_dir.join(archive_name)).await?;

        let xml_files = self.unpack(&archive, &work_dir.join(EXTRACTED_DIR_NAME)).await?;

        let mut tables = Vec::with_capacity(xml_files.len());
        for xml_path in xml_files {
            tables.push(self.process(&xml_path, &work_dir).await?);
        }

        Ok(PipelineReport {
            discovery_url,
            link,
            archive,
            tables,
        })
    }

    async fn locate(&self, discovery_path: &Path) -> Result<String> {
        let document = tokio::fs::read_to_string(discovery_path).await?;

        self.locator
            .find(&document, &self.config.file_type)
            .ok_or_else(|| IngestError::LinkNotFound {
                file_type: self.config.file_type.clone(),
                source_id: discovery_path.display().to_string(),
            })
    }

    /// Extracts the archive and keeps its XML payloads, in archive order.
    async fn unpack(&self, archive: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>> {
        let extractor = Arc::clone(&self.extractor);
        let archive_owned = archive.to_path_buf();
        let dest_owned = dest_dir.to_path_buf();

        let extracted = tokio::task::spawn_blocking(move || {
            extractor.extract_archive(&archive_owned, &dest_owned)
        })
        .await
        .map_err(join_error)??;

        let xml_files = filter_by_extension(&extracted, "xml");
        if xml_files.is_empty() {
            return Err(ExtractError::MissingEntry {
                path: archive.display().to_string(),
                extension: "xml".to_string(),
            }
            .into());
        }

        Ok(xml_files)
    }

    /// Extracts one XML file to `<work>/<stem>.csv` and publishes it.
    async fn process(&self, xml_path: &Path, work_dir: &Path) -> Result<PublishedTable> {
        let table_name = table_name(xml_path);
        let table = work_dir.join(&table_name);

        let options = self.config.extract_options();
        let source = xml_path.to_path_buf();
        let destination = table.clone();
        let summary: ExtractionSummary =
            tokio::task::spawn_blocking(move || extract_to_csv(&source, &destination, &options))
                .await
                .map_err(join_error)??;

        let published = match (&self.uploader, self.config.skip_upload) {
            (Some(uploader), false) => Some(uploader.upload(&table, &table_name).await?),
            _ => None,
        };

        Ok(PublishedTable {
            source: xml_path.to_path_buf(),
            table,
            records: summary.records,
            batches: summary.batches,
            published,
        })
    }
}

/// `<stem>.csv` for an extracted XML file.
pub fn table_name(xml_path: &Path) -> String {
    let stem = xml_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "records".to_string());
    format!("{}.csv", stem)
}

fn join_error(e: tokio::task::JoinError) -> IngestError {
    IngestError::Io(std::io::Error::other(e))
}
