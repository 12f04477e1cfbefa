//! Formula typesetting.
//!
//! Scans an HTML fragment for the formula markers left by the markdown stage
//! and replaces each with KaTeX output. Which KaTeX output is requested follows
//! the run's [`MathChannels`]:
//!
//! - `mml` only: MathML
//! - `html` (with or without `mml`): HTML, plus MathML when `mml` is also set
//! - `svg`: MathML placed inside an inline `<svg>` through `<foreignObject>`,
//!   so every formula is a self-contained SVG element
//!
//! Invalid TeX does not fail the page; KaTeX renders the source in red instead.

use super::markdown::TEX_MARKER_CLASS;
use crate::settings::MathChannels;
use anyhow::{anyhow, Result};
use katex::{OptsBuilder, OutputType};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Class carried by every SVG-wrapped formula.
pub const SVG_MATH_CLASS: &str = "mmd-math-svg";

static TEX_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"(?s)<span class="{TEX_MARKER_CLASS}" data-display="(inline|block)">(.*?)</span>"#
    ))
    .expect("formula marker pattern is valid")
});

/// Something that renders the formulae embedded in an HTML fragment.
pub trait Typeset {
    fn typeset(&self, html: &str) -> Result<String>;
}

/// Typesetter backed by KaTeX.
#[derive(Debug, Clone, Copy)]
pub struct Katex {
    channels: MathChannels,
}

impl Katex {
    pub fn new(channels: MathChannels) -> Self {
        Self { channels }
    }

    fn output_type(&self) -> OutputType {
        let MathChannels { html, mml, svg, .. } = self.channels;
        match (html, mml, svg) {
            (_, _, true) => OutputType::Mathml,
            (true, true, false) => OutputType::HtmlAndMathml,
            (true, false, false) => OutputType::Html,
            (false, _, false) => OutputType::Mathml,
        }
    }

    fn render(&self, tex: &str, display: bool) -> Result<String> {
        let mut builder = OptsBuilder::default();
        builder.display_mode(display);
        builder.output_type(self.output_type());
        builder.throw_on_error(false);

        let opts = builder
            .build()
            .map_err(|err| anyhow!("failed to build KaTeX options: {err}"))?;

        let rendered = katex::render_with_opts(tex, opts)
            .map_err(|err| anyhow!("KaTeX rendering failed for `{tex}`: {err}"))?;

        if self.channels.svg {
            Ok(wrap_in_svg(&rendered, tex, display))
        } else {
            Ok(rendered)
        }
    }
}

impl Typeset for Katex {
    fn typeset(&self, html: &str) -> Result<String> {
        let mut output = String::with_capacity(html.len() * 4);
        let mut last = 0;

        for caps in TEX_MARKER.captures_iter(html) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            output.push_str(&html[last..whole.start()]);
            output.push_str(&self.render_marker(&caps)?);
            last = whole.end();
        }
        output.push_str(&html[last..]);

        Ok(output)
    }
}

impl Katex {
    fn render_marker(&self, caps: &Captures<'_>) -> Result<String> {
        let display = &caps[1] == "block";
        let tex = html_escape::decode_html_entities(&caps[2]);
        self.render(&tex, display)
    }
}

/// Rough extent of a formula in `em`, from its TeX source.
///
/// Control words count as one glyph and grouping/script characters as none.
/// Fractions, roots and big operators make the box taller.
fn estimate_extent(tex: &str, display: bool) -> (f32, f32) {
    let mut glyphs = 0usize;
    let mut chars = tex.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                while chars.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
                    chars.next();
                }
                glyphs += 1;
            }
            '{' | '}' | '^' | '_' | '&' => {}
            c if c.is_whitespace() => {}
            _ => glyphs += 1,
        }
    }

    let tall = ["\\frac", "\\dfrac", "\\sqrt", "\\sum", "\\int", "\\prod", "\\begin"]
        .iter()
        .any(|cmd| tex.contains(cmd));

    let width = (glyphs as f32 * 0.6).max(1.0);
    let height = match (display, tall) {
        (true, true) => 3.2,
        (true, false) => 2.0,
        (false, true) => 2.4,
        (false, false) => 1.4,
    };
    (width, height)
}

fn wrap_in_svg(mathml: &str, tex: &str, display: bool) -> String {
    let (width, height) = estimate_extent(tex, display);
    let class = if display {
        format!("{SVG_MATH_CLASS} mmd-display")
    } else {
        SVG_MATH_CLASS.to_string()
    };
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" class="{class}" width="{width:.1}em" height="{height:.1}em" overflow="visible" role="img" aria-label="{label}"><foreignObject width="100%" height="100%"><div xmlns="http://www.w3.org/1999/xhtml">{mathml}</div></foreignObject></svg>"#,
        label = html_escape::encode_double_quoted_attribute(tex),
    )
}
