//! Table of contents document.
//!
//! The index links chapters purely by count: one link per chapter index in
//! `1..=chapter_count`, targets named by [`chapter_file_name`].

use std::path::PathBuf;

use tracing::{info, instrument};

use kindle_voz_shared::{Result, VozError};

use crate::assembler::chapter_file_name;
use crate::run::Run;

/// Render the ToC document for `title` with `chapter_count` links.
pub fn render_toc(title: &str, chapter_count: usize) -> String {
    let mut links = String::new();
    for i in 1..=chapter_count {
        links.push_str(&format!(
            "<a href=\"{}\">Chap {i}</a><br/>",
            chapter_file_name(i)
        ));
    }

    format!(
        r#"<?xml version='1.0' encoding='utf-8'?>
<html xmlns="http://www.w3.org/1999/xhtml">
  <head>
    <title>{title}</title>
    <meta http-equiv="Content-Type" content="text/html; charset=utf-8"/>
  </head>
  <body>
    <h1>Table of Contents</h1>
    <p style="text-indent:0pt">
    {links}
    </p>
  </body>
</html>
"#,
        title = escape_html(title),
    )
}

/// Write `toc.html` for the run's current chapters.
#[instrument(skip_all, fields(chapters = run.chapter_count()))]
pub fn write_toc(run: &Run) -> Result<PathBuf> {
    let path = run.toc_path();
    let document = render_toc(run.title(), run.chapter_count());

    std::fs::write(&path, document).map_err(|e| VozError::Template {
        path: path.clone(),
        source: e,
    })?;

    info!(path = %path.display(), "table of contents written");
    Ok(path)
}

/// Link targets of a rendered ToC, in document order.
pub fn toc_links(document: &str) -> Vec<String> {
    document
        .split("href=\"")
        .skip(1)
        .filter_map(|rest| rest.split('"').next())
        .map(String::from)
        .collect()
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
