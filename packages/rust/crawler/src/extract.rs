//! Readable-content extraction.
//!
//! Reduces a fetched page to a self-contained XHTML fragment: the main content
//! container is located, page chrome and ads are dropped, the heading that
//! repeats the article title is removed, and the remaining tree is
//! re-serialised with a small attribute whitelist.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, instrument};
use url::Url;

use kindle_voz_shared::{Result, VozError};

use crate::fetch::FetchedDocument;

/// Candidate content containers, most specific first.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    r#"[role="main"]"#,
    "#content",
    ".content",
    ".post",
    ".entry-content",
];

/// Elements dropped wholesale, children included.
const CHROME_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "nav", "header", "footer", "aside", "form",
    "button", "svg", "template", "object", "embed",
];

/// Class/id tokens that mark ads and share widgets.
const JUNK_TOKENS: &[&str] = &[
    "ad",
    "ads",
    "advert",
    "advertisement",
    "banner",
    "cookie",
    "newsletter",
    "promo",
    "share",
    "social",
    "sponsor",
    "sponsored",
];

/// Attributes kept on output elements.
const KEPT_ATTRS: &[&str] = &["href", "src", "alt", "title", "colspan", "rowspan"];

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

/// The readable part of one page.
#[derive(Debug, Clone)]
pub struct ExtractedArticle {
    /// Locator the page was fetched from.
    pub source_url: String,
    /// Article title, if one was found.
    pub title: Option<String>,
    /// Self-contained XHTML fragment without the title heading.
    pub content_html: String,
}

/// Capability that reduces a raw document to readable content.
pub trait Extractor: Send + Sync {
    /// Extract the article. Failures are [`VozError::Extraction`].
    fn extract(&self, doc: &FetchedDocument) -> Result<ExtractedArticle>;

    /// Human-readable extractor name for tracing.
    fn name(&self) -> &str;
}

/// Heuristic extractor that works on arbitrary article pages.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadableExtractor;

impl Extractor for ReadableExtractor {
    #[instrument(skip_all, fields(locator = %doc.locator))]
    fn extract(&self, doc: &FetchedDocument) -> Result<ExtractedArticle> {
        let html = Html::parse_document(&doc.body);
        let title = extract_title(&html);

        let roots = content_roots(&html);
        if roots.is_empty() {
            return Err(VozError::extraction(&doc.locator, "document has no body"));
        }

        let mut writer = FragmentWriter::new(&doc.url, title.as_deref());
        for (i, root) in roots.iter().enumerate() {
            if i > 0 {
                writer.out.push_str("\n<hr/>\n");
            }
            writer.children(*root);
        }

        if writer.text_chars == 0 && writer.images == 0 {
            return Err(VozError::extraction(
                &doc.locator,
                "no readable content left after cleanup",
            ));
        }

        debug!(
            title = title.as_deref().unwrap_or(""),
            roots = roots.len(),
            text_chars = writer.text_chars,
            images = writer.images,
            "article extracted"
        );

        Ok(ExtractedArticle {
            source_url: doc.locator.clone(),
            title,
            content_html: writer.out.trim().to_string(),
        })
    }

    fn name(&self) -> &str {
        "readable"
    }
}

// ---------------------------------------------------------------------------
// Title and root selection
// ---------------------------------------------------------------------------

/// Title from `og:title`, then `<title>`, then the first `<h1>`.
fn extract_title(html: &Html) -> Option<String> {
    static OG: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse(r#"meta[property="og:title"]"#).expect("valid selector"));
    static TITLE: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("title").expect("valid selector"));
    static H1: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("h1").expect("valid selector"));

    let og = html
        .select(&OG)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(collapse_whitespace);
    let title_tag = || {
        html.select(&TITLE)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
    };
    let h1 = || {
        html.select(&H1)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
    };

    og.filter(|t| !t.is_empty())
        .or_else(|| title_tag().filter(|t| !t.is_empty()))
        .or_else(|| h1().filter(|t| !t.is_empty()))
}

/// Content containers for the page.
///
/// Selectors are tried in priority order. For a selector, every outermost
/// match outside page chrome that keeps readable content is returned in
/// document order, so a thread whose posts are sibling `<article>`s yields
/// all of them. Falls back to `<body>`.
fn content_roots(html: &Html) -> Vec<ElementRef<'_>> {
    for sel_str in CONTENT_SELECTORS {
        let Ok(sel) = Selector::parse(sel_str) else {
            continue;
        };
        let roots: Vec<ElementRef<'_>> = html
            .select(&sel)
            .filter(|el| !is_junk(*el) && !in_chrome(*el))
            .filter(|el| !has_matching_ancestor(*el, &sel))
            .filter(|el| readable_weight(*el) > 0)
            .collect();
        if !roots.is_empty() {
            return roots;
        }
    }

    let Ok(body) = Selector::parse("body") else {
        return Vec::new();
    };
    html.select(&body).next().into_iter().collect()
}

/// Whether any ancestor below `<body>` is chrome or junk.
fn in_chrome(el: ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .take_while(|a| !matches!(a.value().name(), "body" | "html"))
        .any(is_junk)
}

fn has_matching_ancestor(el: ElementRef<'_>, sel: &Selector) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| sel.matches(&a))
}

/// Non-whitespace characters plus images that survive junk removal.
fn readable_weight(el: ElementRef<'_>) -> usize {
    let mut weight = 0;
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                let text: &str = text;
                weight += text.chars().filter(|c| !c.is_whitespace()).count();
            }
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    if is_junk(child_el) {
                        continue;
                    }
                    if child_el.value().name() == "img" {
                        weight += 1;
                    }
                    weight += readable_weight(child_el);
                }
            }
            _ => {}
        }
    }
    weight
}

// ---------------------------------------------------------------------------
// Serialisation
// ---------------------------------------------------------------------------

/// Walks the kept tree and writes XHTML.
struct FragmentWriter<'a> {
    base: &'a Url,
    /// Lowercased title plus its forms without a site suffix.
    titles: Vec<String>,
    title_dropped: bool,
    out: String,
    text_chars: usize,
    images: usize,
}

impl<'a> FragmentWriter<'a> {
    fn new(base: &'a Url, title: Option<&str>) -> Self {
        Self {
            base,
            titles: title.map(title_forms).unwrap_or_default(),
            title_dropped: false,
            out: String::new(),
            text_chars: 0,
            images: 0,
        }
    }

    fn children(&mut self, el: ElementRef<'_>) {
        for child in el.children() {
            match child.value() {
                Node::Text(text) => {
                    let text: &str = text;
                    self.text_chars += text.chars().filter(|c| !c.is_whitespace()).count();
                    self.out.push_str(&escape_text(text));
                }
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        self.element(child_el);
                    }
                }
                _ => {}
            }
        }
    }

    fn element(&mut self, el: ElementRef<'_>) {
        let name = el.value().name();

        if is_junk(el) || self.is_title_heading(el) {
            return;
        }

        self.out.push('<');
        self.out.push_str(name);
        for attr in KEPT_ATTRS {
            let Some(value) = el
                .value()
                .attr(attr)
                .and_then(|v| self.attr_value(attr, v))
            else {
                continue;
            };
            self.out.push(' ');
            self.out.push_str(attr);
            self.out.push_str("=\"");
            self.out.push_str(&escape_attr(&value));
            self.out.push('"');
        }

        if VOID_TAGS.contains(&name) {
            if name == "img" {
                self.images += 1;
            }
            self.out.push_str("/>");
            return;
        }

        self.out.push('>');
        self.children(el);
        self.out.push_str("</");
        self.out.push_str(name);
        self.out.push('>');
    }

    /// The first `h1`/`h2` whose text equals the article title, with or
    /// without the site name after a separator.
    fn is_title_heading(&mut self, el: ElementRef<'_>) -> bool {
        if self.title_dropped || !matches!(el.value().name(), "h1" | "h2") {
            return false;
        }
        let text = collapse_whitespace(&el.text().collect::<String>()).to_lowercase();
        if !text.is_empty() && self.titles.contains(&text) {
            self.title_dropped = true;
            return true;
        }
        false
    }

    /// Absolutise links and drop script URLs.
    fn attr_value(&self, attr: &str, value: &str) -> Option<String> {
        if attr != "href" && attr != "src" {
            return Some(value.to_string());
        }
        let trimmed = value.trim();
        if trimmed.to_ascii_lowercase().starts_with("javascript:") {
            return None;
        }
        if trimmed.starts_with('#') || trimmed.starts_with("data:") {
            return Some(trimmed.to_string());
        }
        Some(
            self.base
                .join(trimmed)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| trimmed.to_string()),
        )
    }
}

/// Separators between an article title and the site name in `<title>`.
const TITLE_SEPARATORS: &[&str] = &[" | ", " - ", " – ", " — ", " :: "];

/// `title` lowercased, plus the part before the first and the last site
/// separator.
fn title_forms(title: &str) -> Vec<String> {
    let full = title.to_lowercase();
    let mut forms = vec![full.clone()];
    for sep in TITLE_SEPARATORS {
        let prefixes = [
            full.split_once(sep).map(|(head, _)| head),
            full.rsplit_once(sep).map(|(head, _)| head),
        ];
        for head in prefixes.into_iter().flatten() {
            let head = head.trim().to_string();
            if !head.is_empty() && !forms.contains(&head) {
                forms.push(head);
            }
        }
    }
    forms
}

fn is_junk(el: ElementRef<'_>) -> bool {
    let value = el.value();
    if CHROME_TAGS.contains(&value.name()) || value.attr("hidden").is_some() {
        return true;
    }

    let tokens = value
        .attr("class")
        .into_iter()
        .chain(value.id())
        .flat_map(|s| s.split(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|t| !t.is_empty());

    for token in tokens {
        if JUNK_TOKENS.contains(&token.to_ascii_lowercase().as_str()) {
            return true;
        }
    }
    false
}

fn collapse_whitespace(s: &str) -> String {
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
    WS_RE.replace_all(s.trim(), " ").into_owned()
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> FetchedDocument {
        FetchedDocument {
            locator: "https://forum.example.com/t/42".into(),
            url: Url::parse("https://forum.example.com/t/42").unwrap(),
            status: 200,
            body: body.into(),
        }
    }

    fn extract(body: &str) -> Result<ExtractedArticle> {
        ReadableExtractor.extract(&doc(body))
    }

    #[test]
    fn extracts_article_and_strips_chrome() {
        let article = extract(
            r#"<html><head><title>My Story</title><script>track()</script></head><body>
            <nav><a href="/">Home</a></nav>
            <header>Site banner</header>
            <article>
              <h1>My Story</h1>
              <p>Once upon a time.</p>
              <div class="ad-slot">Buy now</div>
              <script>alert(1)</script>
            </article>
            <footer>Copyright</footer>
            </body></html>"#,
        )
        .unwrap();

        assert_eq!(article.title.as_deref(), Some("My Story"));
        assert!(article.content_html.contains("<p>Once upon a time.</p>"));
        assert!(!article.content_html.contains("Buy now"));
        assert!(!article.content_html.contains("alert"));
        assert!(!article.content_html.contains("Home"));
        assert!(!article.content_html.contains("Copyright"));
    }

    #[test]
    fn drops_heading_that_repeats_title() {
        let article = extract(
            r#"<html><head><title>Chapter One</title></head><body><main>
            <h1>Chapter One</h1><h2>Part A</h2><p>Text.</p>
            </main></body></html>"#,
        )
        .unwrap();

        assert!(!article.content_html.contains("Chapter One"));
        assert!(article.content_html.contains("<h2>Part A</h2>"));
    }

    #[test]
    fn og_title_wins_over_title_tag() {
        let article = extract(
            r#"<html><head>
            <meta property="og:title" content="Real   Title"/>
            <title>Real Title | Forum</title>
            </head><body><p>Body text</p></body></html>"#,
        )
        .unwrap();
        assert_eq!(article.title.as_deref(), Some("Real Title"));
    }

    #[test]
    fn falls_back_to_body() {
        let article = extract("<html><body><p>Just a paragraph.</p></body></html>").unwrap();
        assert_eq!(article.title, None);
        assert_eq!(article.content_html, "<p>Just a paragraph.</p>");
    }

    #[test]
    fn absolutises_links_and_drops_script_urls() {
        let article = extract(
            r#"<html><body><article>
            <p><a href="/t/43" onclick="x()">next</a>
            <a href="javascript:void(0)">noop</a>
            <img src="img/cat.png" alt="a cat" width="10"></p>
            </article></body></html>"#,
        )
        .unwrap();

        assert!(
            article
                .content_html
                .contains(r#"<a href="https://forum.example.com/t/43">next</a>"#)
        );
        assert!(article.content_html.contains("<a>noop</a>"));
        assert!(
            article
                .content_html
                .contains(r#"<img src="https://forum.example.com/t/img/cat.png" alt="a cat"/>"#)
        );
        assert!(!article.content_html.contains("onclick"));
    }

    #[test]
    fn escapes_text() {
        let article = extract("<html><body><p>a &lt; b &amp; c</p></body></html>").unwrap();
        assert_eq!(article.content_html, "<p>a &lt; b &amp; c</p>");
    }

    #[test]
    fn image_only_post_is_content() {
        let article = extract(r#"<html><body><img src="/x.jpg"></body></html>"#).unwrap();
        assert!(article.content_html.contains("<img"));
    }

    #[test]
    fn empty_page_is_extraction_error() {
        let err = extract(
            "<html><body><nav>menu</nav><script>x</script><div class='share'>Tweet</div></body></html>",
        )
        .unwrap_err();
        assert!(matches!(err, VozError::Extraction { .. }));
        assert!(err.is_per_locator());
    }

    #[test]
    fn keeps_every_post_of_a_thread() {
        let article = extract(
            r#"<html><body><main>
            <article><p>POST ONE</p></article>
            <article><p>POST TWO</p></article>
            <div class="wrap"><article><p>POST THREE</p></article></div>
            </main></body></html>"#,
        )
        .unwrap();

        let html = &article.content_html;
        let one = html.find("POST ONE").unwrap();
        let two = html.find("POST TWO").unwrap();
        let three = html.find("POST THREE").unwrap();
        assert!(one < two && two < three);
        assert_eq!(html.matches("<hr/>").count(), 2);
    }

    #[test]
    fn article_inside_sidebar_does_not_win() {
        let article = extract(
            r#"<html><body>
            <aside><article><a href="/x">Related teaser</a></article></aside>
            <main><p>The real long article body.</p></main>
            </body></html>"#,
        )
        .unwrap();

        assert_eq!(article.content_html, "<p>The real long article body.</p>");
    }

    #[test]
    fn candidate_with_only_junk_is_passed_over() {
        let article = extract(
            r#"<html><body>
            <article><div class="share">Tweet this</div></article>
            <main><p>Real content here.</p></main>
            </body></html>"#,
        )
        .unwrap();

        assert_eq!(article.content_html, "<p>Real content here.</p>");
    }

    #[test]
    fn nested_matches_are_not_duplicated() {
        let article = extract(
            r#"<html><body><article><p>Outer</p><article><p>Inner</p></article></article></body></html>"#,
        )
        .unwrap();

        assert_eq!(article.content_html.matches("Inner").count(), 1);
        assert!(!article.content_html.contains("<hr/>"));
    }

    #[test]
    fn heading_that_prefixes_title_is_kept() {
        let article = extract(
            r#"<html><head><title>Introduction to Rust</title></head><body><main>
            <p>Lead.</p><h2>Intro</h2><p>Section body.</p>
            </main></body></html>"#,
        )
        .unwrap();

        assert!(article.content_html.contains("<h2>Intro</h2>"));
    }

    #[test]
    fn heading_matching_title_without_site_name_is_dropped() {
        let article = extract(
            r#"<html><head><title>Chapter One | Voz Forum</title></head><body><main>
            <h1>Chapter One</h1><p>Text.</p>
            </main></body></html>"#,
        )
        .unwrap();

        assert!(!article.content_html.contains("<h1>"));
        assert!(article.content_html.contains("<p>Text.</p>"));
    }

    #[test]
    fn title_forms_strip_site_suffix() {
        assert_eq!(
            title_forms("A - B | Site"),
            vec!["a - b | site", "a - b", "a"]
        );
    }

    #[test]
    fn extraction_is_deterministic() {
        let body = "<html><body><article><p>Same</p><p>Input</p></article></body></html>";
        let a = extract(body).unwrap();
        let b = extract(body).unwrap();
        assert_eq!(a.content_html, b.content_html);
    }
}
