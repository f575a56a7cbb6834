//! External e-book conversion (Calibre's `ebook-convert`).
//!
//! The converter is a pre-installed executable. This module only builds the
//! invocation and maps the process outcome onto [`VozError::Conversion`].

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use kindle_voz_shared::{PackagedOutput, Result, VozError};

/// One conversion: ToC document in, packaged e-book out.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    /// The ToC document; linked chapters are resolved relative to it.
    pub input: PathBuf,
    pub output: PathBuf,
    pub output_profile: String,
    pub authors: String,
}

impl ConversionJob {
    /// Arguments in the converter's order:
    /// `<input> <output> --output-profile <profile> --authors <authors>`.
    pub fn args(&self) -> Vec<OsString> {
        vec![
            self.input.clone().into_os_string(),
            self.output.clone().into_os_string(),
            "--output-profile".into(),
            self.output_profile.clone().into(),
            "--authors".into(),
            self.authors.clone().into(),
        ]
    }
}

/// Capability that packages a ToC document into an e-book.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Run `job`. Every failure is a [`VozError::Conversion`].
    async fn convert(&self, job: &ConversionJob) -> Result<PackagedOutput>;
}

/// Subprocess-backed converter.
#[derive(Debug, Clone)]
pub struct EbookConvert {
    command: String,
}

impl EbookConvert {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl Converter for EbookConvert {
    #[instrument(skip_all, fields(command = %self.command, output = %job.output.display()))]
    async fn convert(&self, job: &ConversionJob) -> Result<PackagedOutput> {
        let args = job.args();
        debug!(?args, "spawning converter");

        let output = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                VozError::conversion(format!("failed to run '{}': {e}", self.command))
            })?;

        if !output.status.success() {
            return Err(VozError::Conversion {
                message: format!("'{}' exited unsuccessfully", self.command),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let size_bytes = tokio::fs::metadata(&job.output)
            .await
            .map_err(|e| {
                VozError::conversion(format!(
                    "'{}' succeeded but {} is unusable: {e}",
                    self.command,
                    job.output.display()
                ))
            })?
            .len();

        info!(bytes = size_bytes, "conversion complete");

        Ok(PackagedOutput {
            path: job.output.clone(),
            profile: job.output_profile.clone(),
            authors: job.authors.clone(),
            size_bytes,
        })
    }
}
