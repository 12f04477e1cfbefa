use crate::settings::{Answers, FileList, OutputFormat};
use clap::{ArgAction, Parser};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
pub struct Cli {
    /// The markdown file(s) to compile; the output is named after the first one
    pub files: Vec<PathBuf>,

    /// Author of the document (wrap it in quotes!)
    #[clap(short, long, env = "MATHMD_AUTHOR")]
    pub author: Option<String>,

    /// Load a custom CSS file for the document
    #[clap(short, long)]
    pub stylesheet: Option<PathBuf>,

    /// Export with formulae in MathML
    #[clap(short = 'M', long, conflicts_with = "svg")]
    pub mml: bool,

    /// Export with formulae as SVG
    #[clap(short = 'S', long)]
    pub svg: bool,

    /// Automatically compile when a source file is saved and reload the browser preview
    #[clap(short, long)]
    pub watch: bool,

    /// Run in interactive mode
    #[clap(short, long)]
    pub interactive: bool,

    /// Port the live preview server listens on
    #[clap(short, long, env = "MATHMD_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Don't open the preview in a browser when watching
    #[clap(long)]
    pub no_open: bool,

    /// Print more diagnostics (repeat for even more)
    #[clap(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Nothing at all was typed after the program name
    #[clap(skip)]
    bare: bool,
}

impl Cli {
    /// Parse `args` (program name first), remembering whether the user typed
    /// anything at all. Environment fallbacks don't count as typed.
    pub fn parse_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let mut cli = Cli::parse_from(&args);
        cli.bare = args.len() <= 1;
        cli
    }

    /// Nothing to work with at all, so ask instead.
    pub fn is_bare(&self) -> bool {
        self.bare
    }

    pub fn wants_interactive(&self) -> bool {
        self.interactive || self.is_bare()
    }

    /// The flags expressed as the same answer set the wizard produces.
    pub fn answers(&self) -> Answers {
        let output_format = if self.mml {
            Some(OutputFormat::MathML)
        } else if self.svg {
            Some(OutputFormat::Svg)
        } else {
            None
        };

        Answers {
            input_files: FileList::Split(self.files.clone()),
            output_format,
            stylesheet: self.stylesheet.clone(),
            author: self.author.clone(),
            watch: self.watch,
        }
    }
}
