//! Watch mode: rebuild the document whenever a source file really changes and
//! reload the browser preview afterwards.

mod debounce;
mod fingerprint;
mod notifier;

use crate::pipeline;
use crate::preview::{PreviewConfig, PreviewServer};
use crate::settings::Options;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use debounce::{Rebuild, WatchLoop, DEBOUNCE};
use std::path::PathBuf;

/// Glob handed to the preview server after every successful rebuild.
const RELOAD_GLOB: &str = "*.html";

/// How the live preview should be served.
#[derive(Debug, Clone, Copy)]
pub struct PreviewSettings {
    pub port: u16,
    pub open_browser: bool,
}

/// Rebuilds the whole document and tells the preview about it.
struct SessionRebuilder {
    options: Options,
    preview: Option<PreviewServer>,
}

#[async_trait]
impl Rebuild for SessionRebuilder {
    async fn rebuild(&mut self) {
        if pipeline::convert(&self.options.files, &self.options)
            .await
            .is_none()
        {
            return;
        }

        if let Some(preview) = &self.preview {
            match preview.trigger().reload(RELOAD_GLOB) {
                Ok(true) => log::debug!("preview reloaded"),
                Ok(false) => {}
                Err(e) => log::warn!("{e:#}"),
            }
        }
    }
}

/// Watch every input file until the process is killed.
pub async fn run(options: Options, settings: PreviewSettings) -> Result<()> {
    let first = options
        .files
        .first()
        .ok_or_else(|| anyhow!("Input file not provided!"))?;

    // the output name is fixed for the whole session
    let outfile = pipeline::output_path(first);
    let base_dir = match outfile.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let index = outfile
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| anyhow!("{} has no file name", outfile.display()))?;

    println!(
        "{}",
        console::style(
            "Edit and save to make your browser automatically reload the preview! Hit CTRL + C to stop"
        )
        .cyan()
    );

    let preview = match PreviewServer::start(PreviewConfig {
        base_dir,
        index,
        port: settings.port,
        open_browser: settings.open_browser,
    })
    .await
    {
        Ok(server) => {
            log::debug!("preview server bound to {}", server.addr());
            Some(server)
        }
        Err(e) => {
            log::warn!("{e:#}, watching without a preview");
            None
        }
    };

    let paths = options.files.clone();
    let mut watch_loop = WatchLoop::new(
        paths.clone(),
        DEBOUNCE,
        SessionRebuilder { options, preview },
    );
    watch_loop.seed().await;

    let _notifier = notifier::subscribe(&paths, watch_loop.sender())?;
    watch_loop.run().await;

    Ok(())
}
