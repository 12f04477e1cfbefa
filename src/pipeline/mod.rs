//! Conversion of a set of markdown files into one HTML document.
//!
//! Every run goes through the same steps: check all inputs exist, read them
//! (concurrently), convert each to HTML and typeset its formulae, assemble the
//! pages in input order, minify, and finally write the document next to the
//! first input. Nothing is written until every page has been produced, so a
//! failing run leaves the previous output untouched.

mod document;
mod markdown;
mod minify;
mod typeset;

use crate::settings::Options;
use anyhow::{anyhow, Context, Result};
use document::{Document, Page};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use typeset::{Katex, Typeset};

/// Statistics from a successful conversion, used for user feedback.
#[derive(Debug)]
pub struct RenderStats {
    pub outfile: PathBuf,
    pub page_count: usize,
    pub elapsed: Duration,
}

/// Where the document for a run is written: the first input with its
/// extension replaced by `.html`.
pub fn output_path(first: &Path) -> PathBuf {
    first.with_extension("html")
}

/// Document title: the stem of the first input file.
pub fn document_title(first: &Path) -> String {
    first
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Untitled".to_string())
}

/// Convert, reporting the outcome on the console instead of returning errors.
///
/// Returns the statistics when the document was written.
pub async fn convert(files: &[PathBuf], options: &Options) -> Option<RenderStats> {
    let progress = if console::user_attended() {
        let progress = ProgressBar::new(files.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("can parse progress style")
                .progress_chars("#>-"),
        );
        progress
    } else {
        ProgressBar::hidden()
    };

    match render(files, options, &progress).await {
        Ok(stats) => {
            log::info!(
                "Input compiled into {} ({} page(s)) in {}ms!",
                console::style(stats.outfile.display()).underlined().white(),
                stats.page_count,
                stats.elapsed.as_millis()
            );
            Some(stats)
        }
        Err(e) => {
            progress.abandon();
            log::error!("{e:#}");
            None
        }
    }
}

/// Render `files` into a single document.
pub async fn render(
    files: &[PathBuf],
    options: &Options,
    progress: &ProgressBar,
) -> Result<RenderStats> {
    let start = Instant::now();

    let first = files
        .first()
        .ok_or_else(|| anyhow!("Input file not provided!"))?;

    for file in files {
        let exists = tokio::fs::try_exists(file)
            .await
            .with_context(|| format!("Failed to check whether {} exists", file.display()))?;
        if !exists {
            log::warn!("{} doesn't exist, aborting this run", file.display());
            return Err(anyhow!("Input file {} doesn't exist", file.display()));
        }
    }

    // reads may finish in any order, join_all hands them back in input order
    let contents = futures::future::join_all(files.iter().map(|file| async move {
        tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))
    }))
    .await
    .into_iter()
    .collect::<Result<Vec<String>>>()?;

    progress.set_message("Typesetting...");
    let sources: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();
    let title = document_title(first);
    let options_for_render = options.clone();
    let progress_for_render = progress.clone();
    let html = tokio::task::spawn_blocking(move || {
        let typesetter = Katex::new(options_for_render.channels());
        let pages = sources
            .into_iter()
            .zip(contents)
            .map(|(source, markdown)| {
                let html = typesetter
                    .typeset(&markdown::to_html(&markdown))
                    .with_context(|| format!("Failed to typeset {source}"))?;
                progress_for_render.inc(1);
                Ok(Page { source, html })
            })
            .collect::<Result<Vec<Page>>>()?;

        let document = document::render(&Document {
            title: &title,
            author: &options_for_render.author,
            stylesheet: &options_for_render.stylesheet,
            channels: options_for_render.channels(),
            pages: &pages,
        });
        Ok::<_, anyhow::Error>((minify::minify(&document), pages.len()))
    })
    .await
    .with_context(|| "Typesetting task failed")?;
    let (html, page_count) = html?;

    let outfile = output_path(first);
    progress.set_message("Writing...");
    let target = outfile.clone();
    tokio::task::spawn_blocking(move || write_replace(&target, html.as_bytes()))
        .await
        .with_context(|| "Writing task failed")??;

    progress.finish_and_clear();

    Ok(RenderStats {
        outfile,
        page_count,
        elapsed: start.elapsed(),
    })
}

/// Write `contents` to a temporary file beside `path`, then move it over `path`.
fn write_replace(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create a temporary file in {}", dir.display()))?;
    tmp.write_all(contents)
        .with_context(|| format!("Failed to write {}", tmp.path().display()))?;
    // dropping the temporary file inside the error deletes it
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
