//! The per-run resource: identity, lifecycle state, chapters, and the
//! isolated working directory.
//!
//! The working directory is a [`tempfile::TempDir`] owned by the [`Run`], so
//! it is removed on every exit path: explicitly through [`Run::close`], or on
//! drop after an early `?` return or a panic.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tracing::{debug, info};

use kindle_voz_shared::{Chapter, Result, RunId, RunState, VozError};

/// Name of the table of contents document inside the working directory.
pub const TOC_FILE_NAME: &str = "toc.html";

/// One end-to-end execution.
#[derive(Debug)]
pub struct Run {
    id: RunId,
    title: String,
    state: RunState,
    chapters: Vec<Chapter>,
    started_at: DateTime<Utc>,
    workdir: TempDir,
}

impl Run {
    /// Start a run with a fresh working directory under the system temp dir.
    pub fn create(title: &str) -> Result<Self> {
        Self::create_in(&std::env::temp_dir(), title)
    }

    /// Start a run with a fresh working directory under `root`.
    pub fn create_in(root: &Path, title: &str) -> Result<Self> {
        let id = RunId::new();
        let workdir = tempfile::Builder::new()
            .prefix(&format!("kindle-voz-{}-", id.short()))
            .tempdir_in(root)
            .map_err(|e| VozError::io(root, e))?;

        info!(run_id = %id, workdir = %workdir.path().display(), "run created");

        Ok(Self {
            id,
            title: title.to_string(),
            state: RunState::Init,
            chapters: Vec::new(),
            started_at: Utc::now(),
            workdir,
        })
    }

    pub fn id(&self) -> &RunId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    /// Chapters written so far, in index order.
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// Number of chapters written. Always equals the highest chapter index.
    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    /// Record a written chapter. Indices must arrive as 1, 2, 3, ...
    pub(crate) fn push_chapter(&mut self, chapter: Chapter) {
        debug_assert_eq!(
            chapter.index,
            self.chapters.len() + 1,
            "chapter indices must be gap-free"
        );
        self.chapters.push(chapter);
    }

    /// Move to the next lifecycle state.
    pub fn advance(&mut self, next: RunState) {
        if self.state.is_terminal() {
            debug!(from = %self.state, to = %next, "ignoring transition out of terminal state");
            return;
        }
        info!(run_id = %self.id, from = %self.state, to = %next, "run state");
        self.state = next;
    }

    /// Mark the run failed.
    pub fn fail(&mut self) {
        self.advance(RunState::Failed);
    }

    /// Path of chapter `index` (1-based).
    pub fn chapter_path(&self, index: usize) -> PathBuf {
        self.workdir().join(crate::assembler::chapter_file_name(index))
    }

    /// Path of the table of contents document.
    pub fn toc_path(&self) -> PathBuf {
        self.workdir().join(TOC_FILE_NAME)
    }

    /// Path of the packaged output: `<prefix><title>.<format>`.
    pub fn output_path(&self, prefix: &str, format: &str) -> PathBuf {
        self.workdir().join(output_file_name(prefix, &self.title, format))
    }

    /// Remove the working directory, reporting failures.
    pub fn close(self) -> Result<()> {
        let path = self.workdir.path().to_path_buf();
        self.workdir.close().map_err(|e| VozError::io(&path, e))?;
        debug!(path = %path.display(), "working directory removed");
        Ok(())
    }
}

/// Build the packaged file name, replacing characters that would escape
/// the working directory.
pub fn output_file_name(prefix: &str, title: &str, format: &str) -> String {
    let safe: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    format!("{prefix}{safe}.{format}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_isolated_directory() {
        let root = tempfile::tempdir().unwrap();
        let a = Run::create_in(root.path(), "Thread").unwrap();
        let b = Run::create_in(root.path(), "Thread").unwrap();

        assert!(a.workdir().is_dir());
        assert_ne!(a.workdir(), b.workdir());
        assert!(a.workdir().starts_with(root.path()));
        assert_eq!(a.state(), RunState::Init);
        assert_eq!(a.chapter_count(), 0);
    }

    #[test]
    fn close_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let run = Run::create_in(root.path(), "Thread").unwrap();
        let dir = run.workdir().to_path_buf();
        std::fs::write(dir.join("chap_1.html"), "x").unwrap();

        run.close().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = {
            let run = Run::create_in(root.path(), "Thread").unwrap();
            run.workdir().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn terminal_state_is_sticky() {
        let root = tempfile::tempdir().unwrap();
        let mut run = Run::create_in(root.path(), "Thread").unwrap();
        run.advance(RunState::Extracting);
        run.fail();
        run.advance(RunState::Done);
        assert_eq!(run.state(), RunState::Failed);
    }

    #[test]
    fn paths_follow_layout() {
        let root = tempfile::tempdir().unwrap();
        let run = Run::create_in(root.path(), "From F17 with Love").unwrap();

        assert_eq!(run.chapter_path(3), run.workdir().join("chap_3.html"));
        assert_eq!(run.toc_path(), run.workdir().join("toc.html"));
        assert_eq!(
            run.output_path("[voz-f17]", "mobi"),
            run.workdir().join("[voz-f17]From F17 with Love.mobi")
        );
    }

    #[test]
    fn output_name_cannot_escape_workdir() {
        assert_eq!(
            output_file_name("[voz-f17]", "../a/b\\c", "mobi"),
            "[voz-f17].._a_b_c.mobi"
        );
    }
}
