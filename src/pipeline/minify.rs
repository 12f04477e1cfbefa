use minify_html::Cfg;

fn config() -> Cfg {
    let mut cfg = Cfg::new();
    cfg.minify_css = true;
    cfg.keep_comments = false;
    // the live-reload script is injected before `</body>`
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg
}

/// Minify a complete HTML document, inline CSS included.
pub fn minify(html: &str) -> String {
    let minified = minify_html::minify(html.as_bytes(), &config());
    String::from_utf8_lossy(&minified).into_owned()
}
