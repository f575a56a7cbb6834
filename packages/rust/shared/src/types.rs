//! Core domain types for a kindle-voz run.

use std::path::PathBuf;

use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// First eight hex digits, enough to tell runs apart in directory names.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// RunState
// ---------------------------------------------------------------------------

/// Lifecycle of a run. Any stage may move to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Extracting,
    Assembling,
    GeneratingToc,
    Converting,
    Delivering,
    Done,
    Failed,
}

impl RunState {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::Extracting => "extracting",
            Self::Assembling => "assembling",
            Self::GeneratingToc => "generating-toc",
            Self::Converting => "converting",
            Self::Delivering => "delivering",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Chapter / PackagedOutput
// ---------------------------------------------------------------------------

/// One extracted article written into the run's working directory.
#[derive(Debug, Clone)]
pub struct Chapter {
    /// 1-based position among successful extractions.
    pub index: usize,
    /// Backing file inside the working directory.
    pub path: PathBuf,
    /// Locator the content came from.
    pub source_url: String,
    /// Article title, if the extractor found one.
    pub title: Option<String>,
    /// SHA-256 of the written document.
    pub content_hash: String,
}

/// The converted e-book handed to delivery.
#[derive(Debug, Clone)]
pub struct PackagedOutput {
    pub path: PathBuf,
    /// Device output profile it was built for.
    pub profile: String,
    pub authors: String,
    pub size_bytes: u64,
}

impl PackagedOutput {
    /// File name component of the output path.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
