//! End-to-end run: locators → extract → chapters → ToC → convert → deliver.
//!
//! Each external collaborator is an injected capability, so the orchestration
//! can be exercised with fakes. Per-locator fetch/extraction failures are
//! logged and skipped; any other failure aborts the run. The working
//! directory is removed on every path.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use kindle_voz_crawler::{ExtractedArticle, Extractor, Fetcher};
use kindle_voz_delivery::{Mailer, Parcel};
use kindle_voz_shared::{ConvertConfig, Result, RunId, RunState, VozError};

use crate::assembler;
use crate::convert::{ConversionJob, Converter};
use crate::run::Run;
use crate::toc;

/// Per-run book settings.
#[derive(Debug, Clone)]
pub struct BookOptions {
    /// Book / thread title.
    pub title: String,
    /// Converter profile, author metadata, and output naming.
    pub convert: ConvertConfig,
    /// Copy the packaged output here before delivery.
    pub copy_to: Option<PathBuf>,
    /// Parent of the run's working directory (defaults to the system temp dir).
    pub work_root: Option<PathBuf>,
}

impl BookOptions {
    pub fn new(title: impl Into<String>, convert: ConvertConfig) -> Self {
        Self {
            title: title.into(),
            convert,
            copy_to: None,
            work_root: None,
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: RunId,
    pub title: String,
    pub started_at: DateTime<Utc>,
    /// Source locator of each chapter, in chapter order.
    pub chapter_sources: Vec<String>,
    /// Locators that were skipped, with the reason.
    pub skipped: Vec<(String, String)>,
    /// File name of the packaged output.
    pub output_name: String,
    /// Device profile the output was built for.
    pub output_profile: String,
    pub output_bytes: u64,
    /// Where the packaged output was copied, if requested.
    pub copied_to: Option<PathBuf>,
    pub delivered: bool,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn chapter_count(&self) -> usize {
        self.chapter_sources.len()
    }
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a locator is fetched.
    fn locator_started(&self, locator: &str, current: usize, total: usize);
    /// Called when a locator is skipped.
    fn locator_skipped(&self, locator: &str, reason: &str);
    /// Called when the run completes successfully.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn locator_started(&self, _locator: &str, _current: usize, _total: usize) {}
    fn locator_skipped(&self, _locator: &str, _reason: &str) {}
    fn done(&self, _report: &RunReport) {}
}

/// The orchestrator, holding one implementation of each capability.
pub struct Pipeline {
    fetcher: Box<dyn Fetcher>,
    extractor: Box<dyn Extractor>,
    converter: Box<dyn Converter>,
    mailer: Option<Box<dyn Mailer>>,
}

impl Pipeline {
    /// A pipeline without delivery; add a mailer with [`Pipeline::with_mailer`].
    pub fn new(
        fetcher: Box<dyn Fetcher>,
        extractor: Box<dyn Extractor>,
        converter: Box<dyn Converter>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            converter,
            mailer: None,
        }
    }

    pub fn with_mailer(mut self, mailer: Box<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Run the whole pipeline over `locators`.
    #[instrument(skip_all, fields(title = %options.title, locators = locators.len()))]
    pub async fn run(
        &self,
        options: &BookOptions,
        locators: &[String],
        progress: &dyn ProgressReporter,
    ) -> Result<RunReport> {
        let start = Instant::now();

        let mut run = match &options.work_root {
            Some(root) => Run::create_in(root, &options.title)?,
            None => Run::create(&options.title)?,
        };

        let outcome = self.drive(&mut run, options, locators, progress).await;
        if outcome.is_err() {
            run.fail();
        }

        let workdir = run.workdir().to_path_buf();
        if let Err(e) = run.close() {
            warn!(path = %workdir.display(), error = %e, "failed to remove working directory");
        }

        let mut report = outcome?;
        report.elapsed = start.elapsed();
        progress.done(&report);

        info!(
            run_id = %report.run_id,
            chapters = report.chapter_count(),
            skipped = report.skipped.len(),
            delivered = report.delivered,
            elapsed_ms = report.elapsed.as_millis(),
            "run complete"
        );

        Ok(report)
    }

    async fn drive(
        &self,
        run: &mut Run,
        options: &BookOptions,
        locators: &[String],
        progress: &dyn ProgressReporter,
    ) -> Result<RunReport> {
        // --- Extracting ---
        run.advance(RunState::Extracting);
        progress.phase("Extracting articles");

        let mut articles: Vec<ExtractedArticle> = Vec::new();
        let mut skipped: Vec<(String, String)> = Vec::new();
        let total = locators.len();

        for (i, locator) in locators.iter().enumerate() {
            progress.locator_started(locator, i + 1, total);

            match self.extract_one(locator).await {
                Ok(article) => articles.push(article),
                Err(e) if e.is_per_locator() => {
                    warn!(locator = %locator, error = %e, "skipping locator");
                    progress.locator_skipped(locator, &e.to_string());
                    skipped.push((locator.clone(), e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }

        // --- Assembling ---
        run.advance(RunState::Assembling);
        progress.phase("Writing chapters");
        assembler::write_chapters(run, &articles)?;
        for chapter in run.chapters() {
            debug!(
                chapter = chapter.index,
                title = chapter.title.as_deref().unwrap_or(""),
                source = %chapter.source_url,
                hash = %chapter.content_hash,
                "chapter recorded"
            );
        }

        // --- GeneratingToc ---
        run.advance(RunState::GeneratingToc);
        progress.phase("Building table of contents");
        let toc_path = toc::write_toc(run)?;

        // --- Converting ---
        run.advance(RunState::Converting);
        progress.phase("Converting e-book");
        let job = ConversionJob {
            input: toc_path,
            output: run.output_path(&options.convert.output_prefix, &options.convert.format),
            output_profile: options.convert.output_profile.clone(),
            authors: options.convert.authors.clone(),
        };
        let packaged = self.converter.convert(&job).await?;
        info!(
            output = %packaged.file_name(),
            profile = %packaged.profile,
            authors = %packaged.authors,
            bytes = packaged.size_bytes,
            "e-book packaged"
        );

        let copied_to = match &options.copy_to {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|e| VozError::io(dir, e))?;
                let target = dir.join(packaged.file_name());
                std::fs::copy(&packaged.path, &target).map_err(|e| VozError::io(&target, e))?;
                info!(path = %target.display(), "packaged output copied");
                Some(target)
            }
            None => None,
        };

        // --- Delivering ---
        let delivered = match &self.mailer {
            Some(mailer) => {
                run.advance(RunState::Delivering);
                progress.phase("Sending to device");
                let parcel = Parcel {
                    subject: run.title().to_string(),
                    attachment: packaged.path.clone(),
                };
                mailer.send(&parcel).await?;
                true
            }
            None => {
                info!("no mailer configured, delivery skipped");
                false
            }
        };

        run.advance(RunState::Done);

        Ok(RunReport {
            run_id: run.id().clone(),
            title: run.title().to_string(),
            started_at: run.started_at(),
            chapter_sources: run
                .chapters()
                .iter()
                .map(|c| c.source_url.clone())
                .collect(),
            skipped,
            output_name: packaged.file_name(),
            output_profile: packaged.profile.clone(),
            output_bytes: packaged.size_bytes,
            copied_to,
            delivered,
            elapsed: Duration::ZERO,
        })
    }

    async fn extract_one(&self, locator: &str) -> Result<ExtractedArticle> {
        let document = self.fetcher.fetch(locator).await?;
        debug!(locator, status = document.status, extractor = self.extractor.name(), "extracting");
        self.extractor.extract(&document)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
