//! Markdown to HTML conversion.
//!
//! Formulae are not typeset here. `$…$` and `$$…$$` spans are emitted as
//! marker elements holding the escaped TeX source so that the typesetter can
//! find them again without markdown having mangled any `_` or `*` inside.
//! Raw HTML written in the source never reads as a marker: its marker class
//! attribute is entity-encoded, which browsers display the same.

use pulldown_cmark::{html, CowStr, Event, Options, Parser};

/// Class carried by every formula marker.
pub const TEX_MARKER_CLASS: &str = "mmd-tex";

fn parser_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    options.insert(Options::ENABLE_MATH);
    options
}

/// Raw HTML from the source with anything that would pass for a formula marker
/// encoded so the typesetter skips it.
fn defuse_markers(html: CowStr<'_>) -> CowStr<'_> {
    let marker = format!(r#"class="{TEX_MARKER_CLASS}""#);
    if !html.contains(&marker) {
        return html;
    }
    let encoded = marker.replace('-', "&#45;");
    CowStr::from(html.replace(&marker, &encoded))
}

fn tex_marker(tex: &str, display: bool) -> String {
    format!(
        r#"<span class="{TEX_MARKER_CLASS}" data-display="{}">{}</span>"#,
        if display { "block" } else { "inline" },
        html_escape::encode_text(tex)
    )
}

/// Render markdown text to an HTML fragment.
pub fn to_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, parser_options()).map(|event| match event {
        Event::InlineMath(tex) => Event::InlineHtml(CowStr::from(tex_marker(&tex, false))),
        Event::DisplayMath(tex) => Event::InlineHtml(CowStr::from(tex_marker(&tex, true))),
        Event::Html(html) => Event::Html(defuse_markers(html)),
        Event::InlineHtml(html) => Event::InlineHtml(defuse_markers(html)),
        event => event,
    });

    let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut html_output, parser);
    html_output
}
