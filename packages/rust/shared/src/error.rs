//! Error types for kindle-voz.
//!
//! Library crates use [`VozError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for every stage of a run.
#[derive(Debug, thiserror::Error)]
pub enum VozError {
    /// Configuration loading or validation error (including mail credentials).
    #[error("config error: {message}")]
    Config { message: String },

    /// The source list could not be opened or read.
    #[error("cannot read source list {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A single locator could not be fetched. Non-fatal to a run.
    #[error("fetch failed for {locator}: {message}")]
    Fetch { locator: String, message: String },

    /// A fetched document yielded no readable content. Non-fatal to a run.
    #[error("extraction failed for {locator}: {message}")]
    Extraction { locator: String, message: String },

    /// The table of contents document could not be produced.
    #[error("table of contents generation failed at {path:?}: {source}")]
    Template {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The external converter failed or could not be started.
    #[error("conversion failed: {message}{}", format_exit(.status, .stderr))]
    Conversion {
        message: String,
        status: Option<i32>,
        stderr: String,
    },

    /// Mail transport failure: auth, connection, or rejected attachment.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, VozError>;

fn format_exit(status: &Option<i32>, stderr: &str) -> String {
    let mut out = String::new();
    if let Some(code) = status {
        out.push_str(&format!(" (exit code {code})"));
    }
    if !stderr.is_empty() {
        out.push_str(&format!(": {stderr}"));
    }
    out
}

impl VozError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a fetch error for `locator`.
    pub fn fetch(locator: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            locator: locator.into(),
            message: msg.into(),
        }
    }

    /// Create an extraction error for `locator`.
    pub fn extraction(locator: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Extraction {
            locator: locator.into(),
            message: msg.into(),
        }
    }

    /// Create a conversion error without process details (e.g. spawn failure).
    pub fn conversion(msg: impl Into<String>) -> Self {
        Self::Conversion {
            message: msg.into(),
            status: None,
            stderr: String::new(),
        }
    }

    /// Create a delivery error from any displayable message.
    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::Delivery(msg.into())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error belongs to a single locator and should be
    /// logged and skipped rather than aborting the run.
    pub fn is_per_locator(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Extraction { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = VozError::config("missing smtp_host");
        assert_eq!(err.to_string(), "config error: missing smtp_host");

        let err = VozError::fetch("https://example.com/a", "HTTP 404 Not Found");
        assert_eq!(
            err.to_string(),
            "fetch failed for https://example.com/a: HTTP 404 Not Found"
        );
    }

    #[test]
    fn conversion_error_includes_exit_status_and_stderr() {
        let err = VozError::Conversion {
            message: "ebook-convert exited unsuccessfully".into(),
            status: Some(2),
            stderr: "no such profile".into(),
        };
        let s = err.to_string();
        assert!(s.contains("exit code 2"));
        assert!(s.ends_with(": no such profile"));

        let err = VozError::conversion("ebook-convert not found");
        assert_eq!(err.to_string(), "conversion failed: ebook-convert not found");
    }

    #[test]
    fn only_fetch_and_extraction_are_per_locator() {
        assert!(VozError::fetch("u", "x").is_per_locator());
        assert!(VozError::extraction("u", "x").is_per_locator());
        assert!(!VozError::delivery("auth").is_per_locator());
        assert!(!VozError::conversion("boom").is_per_locator());
    }
}
