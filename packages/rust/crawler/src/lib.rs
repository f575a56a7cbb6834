//! Article fetching and readable-content extraction.
//!
//! This crate provides:
//! - [`fetch`]: the [`Fetcher`] capability and its `reqwest` implementation
//! - [`extract`]: the [`Extractor`] capability and the heuristic [`ReadableExtractor`]

pub mod extract;
pub mod fetch;

pub use extract::{ExtractedArticle, Extractor, ReadableExtractor};
pub use fetch::{FetchedDocument, Fetcher, HttpFetcher, parse_locator};
