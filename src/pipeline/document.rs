//! The HTML document shell the rendered pages are placed into.

use crate::settings::MathChannels;

/// Stylesheet needed by KaTeX's HTML output.
pub const KATEX_STYLESHEET_URL: &str = "https://cdn.jsdelivr.net/npm/katex@0.16.9/dist/katex.min.css";

/// One source file's rendered HTML.
pub struct Page {
    /// Shown in the page's `data-source` attribute
    pub source: String,
    pub html: String,
}

/// Inputs to [`render`].
pub struct Document<'a> {
    pub title: &'a str,
    pub author: &'a str,
    pub stylesheet: &'a str,
    pub channels: MathChannels,
    pub pages: &'a [Page],
}

/// Assemble the full HTML document, pages in the order given.
pub fn render(document: &Document<'_>) -> String {
    let pages_html = document
        .pages
        .iter()
        .map(|page| {
            format!(
                "<section class=\"mmd-page\" data-source=\"{}\">\n{}</section>\n",
                html_escape::encode_double_quoted_attribute(&page.source),
                page.html
            )
        })
        .collect::<String>();

    let katex_css = if document.channels.css {
        format!(r#"<link rel="stylesheet" href="{KATEX_STYLESHEET_URL}">"#)
    } else {
        String::new()
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="author" content="{author}">
<meta name="generator" content="mathmd {version}">
<title>{title}</title>
{katex_css}
<style>{style}</style>
</head>
<body>
<div class="mmd-wrapper">
{pages_html}</div>
</body>
</html>
"#,
        author = html_escape::encode_double_quoted_attribute(document.author),
        version = env!("CARGO_PKG_VERSION"),
        title = html_escape::encode_text(document.title),
        style = document.stylesheet,
    )
}
