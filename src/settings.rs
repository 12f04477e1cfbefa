//! Settings resolution.
//!
//! Both the command line and the interactive wizard produce an [`Answers`] set,
//! which is normalised here into the [`Options`] record a conversion run works
//! from. Resolution never touches the network. A stylesheet that is missing or
//! can't be read is only a warning: the bundled one is used instead.

use anyhow::{Context, Result};
use derive_builder::Builder;
use std::fmt;
use std::path::{Path, PathBuf};

/// The stylesheet used when no custom one is provided.
pub const DEFAULT_STYLESHEET: &str = include_str!("../assets/default.css");

/// Author placeholder used when none is given.
pub const DEFAULT_AUTHOR: &str = "Anonymous";

/// How formulae end up in the output document.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum OutputFormat {
    /// Native MathML markup
    MathML,
    /// Inline SVG elements
    Svg,
    /// HTML + CSS rendering with MathML alongside for accessibility
    #[default]
    Mixed,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl OutputFormat {
    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::MathML => "MathML",
            OutputFormat::Svg => "SVG",
            OutputFormat::Mixed => "Mixed (HTML + MathML)",
        }
    }

    pub fn all() -> &'static [OutputFormat] {
        &[OutputFormat::Svg, OutputFormat::MathML, OutputFormat::Mixed]
    }

    /// The output channels the typesetter is configured with for this format.
    pub fn channels(&self) -> MathChannels {
        match self {
            OutputFormat::MathML => MathChannels {
                html: false,
                css: false,
                mml: true,
                svg: false,
            },
            OutputFormat::Svg => MathChannels {
                html: false,
                css: false,
                mml: false,
                svg: true,
            },
            OutputFormat::Mixed => MathChannels {
                html: true,
                css: true,
                mml: true,
                svg: false,
            },
        }
    }
}

/// Which renderings of each formula are emitted.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct MathChannels {
    /// HTML markup positioned with the KaTeX stylesheet
    pub html: bool,
    /// Link the KaTeX stylesheet into the document head
    pub css: bool,
    /// MathML markup
    pub mml: bool,
    /// Inline SVG
    pub svg: bool,
}

/// Input files as they were supplied.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum FileList {
    /// Already one path per entry (command line arguments)
    Split(Vec<PathBuf>),
    /// A single whitespace-separated line (wizard answer)
    Joined(String),
}

impl FileList {
    pub fn into_paths(self) -> Vec<PathBuf> {
        match self {
            FileList::Split(paths) => paths,
            FileList::Joined(line) => line.split_whitespace().map(PathBuf::from).collect(),
        }
    }
}

/// Raw settings from either the command line or the wizard.
#[derive(Clone, Debug)]
pub struct Answers {
    pub input_files: FileList,
    pub output_format: Option<OutputFormat>,
    pub stylesheet: Option<PathBuf>,
    pub author: Option<String>,
    pub watch: bool,
}

/// Everything a conversion run needs to know.
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
#[builder(setter(into))]
pub struct Options {
    /// Source files in the order their pages appear
    #[builder(default)]
    pub files: Vec<PathBuf>,
    #[builder(default)]
    pub format: OutputFormat,
    /// Stylesheet contents inlined into the document
    #[builder(default = "DEFAULT_STYLESHEET.to_string()")]
    pub stylesheet: String,
    #[builder(default = "DEFAULT_AUTHOR.to_string()")]
    pub author: String,
    #[builder(default)]
    pub watch: bool,
}

impl Options {
    pub fn channels(&self) -> MathChannels {
        self.format.channels()
    }
}

/// Stylesheet bytes as text; invalid UTF-8 is replaced rather than rejected.
fn read_stylesheet(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read stylesheet {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Normalise an answer set into run options.
pub fn resolve(answers: Answers) -> Result<Options> {
    let Answers {
        input_files,
        output_format,
        stylesheet,
        author,
        watch,
    } = answers;

    let mut builder = OptionsBuilder::default();
    builder
        .files(input_files.into_paths())
        .format(output_format.unwrap_or_default())
        .watch(watch);

    match stylesheet {
        Some(path) if path.exists() => match read_stylesheet(&path) {
            Ok(contents) => {
                log::info!("Custom stylesheet {} found!", path.display());
                builder.stylesheet(contents);
            }
            Err(e) => log::warn!("{e:#}! Using the default one..."),
        },
        Some(path) => {
            log::warn!(
                "Custom stylesheet {} not found! Using the default one...",
                path.display()
            );
        }
        None => log::debug!("no custom stylesheet given, using the default one"),
    }

    if let Some(author) = author.filter(|a| !a.trim().is_empty()) {
        builder.author(author);
    }

    builder.build().with_context(|| "Failed to build options")
}
