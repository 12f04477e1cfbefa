//! Interactive settings wizard.
//!
//! Asks for the source files, the formula output format, an optional
//! stylesheet and author, and whether to keep watching the sources. The
//! answers are returned as an [`Answers`] set exactly like the command line
//! flags, so both paths go through the same resolution.

use crate::settings::{Answers, FileList, OutputFormat, DEFAULT_AUTHOR};
use anyhow::{Context, Result};
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use std::path::PathBuf;

/// What the user types to skip an optional answer.
const NONE: &str = "none";

fn print_banner() {
    println!();
    println!("{}", style("  ╔╦╗┌─┐┌┬┐┬ ┬╔╦╗╔╦╗ ").white().on_red());
    println!("{}", style("  ║║║├─┤ │ ├─┤║║║ ║║ ").white().on_red());
    println!("{}", style("  ╩ ╩┴ ┴ ┴ ┴ ┴╩ ╩═╩╝ ").white().on_red());
    println!("{}", style(" Use CTRL+C to exit. ").black().on_white());
    println!();
}

/// `none` or nothing at all means the question was skipped.
fn optional(answer: String) -> Option<String> {
    let answer = answer.trim();
    if answer.is_empty() || answer.eq_ignore_ascii_case(NONE) {
        None
    } else {
        Some(answer.to_string())
    }
}

/// Run the interactive wizard.
pub fn run() -> Result<Answers> {
    print_banner();

    let theme = ColorfulTheme::default();

    let input_files: String = Input::with_theme(&theme)
        .with_prompt("Path to the source file(s) (space is a separator)")
        .interact()
        .with_context(|| "Failed to obtain source files")?;

    let formats = OutputFormat::all();
    let default_format = formats
        .iter()
        .position(|f| *f == OutputFormat::default())
        .unwrap_or(0);
    let format = Select::with_theme(&theme)
        .with_prompt("Output format for your formulae")
        .items(formats)
        .default(default_format)
        .interact()
        .with_context(|| "Failed to obtain output format")?;

    let stylesheet: String = Input::with_theme(&theme)
        .with_prompt("[Optional] Path to an external stylesheet")
        .default(NONE.to_string())
        .interact()
        .with_context(|| "Failed to obtain stylesheet")?;

    let author: String = Input::with_theme(&theme)
        .with_prompt("[Optional] Author")
        .default(DEFAULT_AUTHOR.to_string())
        .interact()
        .with_context(|| "Failed to obtain author")?;

    let watch = Confirm::with_theme(&theme)
        .with_prompt(
            "Do you want to watch for file changes and automatically reload the preview in a browser?",
        )
        .default(false)
        .interact()?;

    Ok(Answers {
        input_files: FileList::Joined(input_files),
        output_format: Some(formats[format]),
        stylesheet: optional(stylesheet).map(PathBuf::from),
        author: optional(author),
        watch,
    })
}
