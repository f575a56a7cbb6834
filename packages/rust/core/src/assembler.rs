//! Chapter assembly: wrap each extracted fragment in a minimal XHTML shell and
//! write it into the run's working directory.
//!
//! Layout of the working directory once assembly and ToC generation are done:
//! ```text
//! <workdir>/
//! ├── chap_1.html
//! ├── chap_2.html
//! ├── ...
//! └── toc.html
//! ```

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use kindle_voz_crawler::ExtractedArticle;
use kindle_voz_shared::{Chapter, Result, VozError};

use crate::run::Run;

/// Fixed document header: declares UTF-8 and leaves the title empty so the
/// converter takes chapter names from the table of contents.
const CHAPTER_HEADER: &str = r#"<?xml version='1.0' encoding='utf-8'?>
<html xmlns="http://www.w3.org/1999/xhtml">
  <head>
    <title></title>
    <meta http-equiv="Content-Type" content="text/html; charset=utf-8"/>
  </head>
  <body>
"#;

const CHAPTER_FOOTER: &str = "\n  </body>\n</html>\n";

/// File name of chapter `index` (1-based). The ToC links use the same name.
pub fn chapter_file_name(index: usize) -> String {
    format!("chap_{index}.html")
}

/// Wrap a content fragment in the chapter document shell.
pub fn wrap_chapter(fragment: &str) -> String {
    let mut doc =
        String::with_capacity(CHAPTER_HEADER.len() + fragment.len() + CHAPTER_FOOTER.len());
    doc.push_str(CHAPTER_HEADER);
    doc.push_str(fragment);
    doc.push_str(CHAPTER_FOOTER);
    doc
}

/// Write one chapter per article, numbered 1..=n in slice order.
///
/// `articles` holds successful extractions only, so numbering has no gaps
/// even when locators were skipped.
#[instrument(skip_all, fields(articles = articles.len()))]
pub fn write_chapters(run: &mut Run, articles: &[ExtractedArticle]) -> Result<()> {
    for (i, article) in articles.iter().enumerate() {
        let index = i + 1;
        let path = run.chapter_path(index);
        let document = wrap_chapter(&article.content_html);

        std::fs::write(&path, &document).map_err(|e| VozError::io(&path, e))?;
        debug!(
            chapter = index,
            source = %article.source_url,
            bytes = document.len(),
            "chapter written"
        );

        run.push_chapter(Chapter {
            index,
            path,
            source_url: article.source_url.clone(),
            title: article.title.clone(),
            content_hash: compute_hash(&document),
        });
    }

    info!(chapters = run.chapter_count(), "chapters assembled");
    Ok(())
}

/// Compute SHA-256 hash of content.
fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
