use anyhow::{Context, Result};
use cli::Cli;
use std::process::ExitCode;

mod cli;
mod logging;
mod pipeline;
mod preview;
mod settings;
mod watch;
mod wizard;

fn main() -> ExitCode {
    if let Err(e) = try_main() {
        eprintln!("{}: {e:#}", console::style("Error").red());
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse_args(std::env::args_os());
    logging::initialize(cli.verbose);

    let answers = if cli.wants_interactive() {
        if cli.is_bare() {
            println!(
                "{}",
                console::style("No arguments given, starting in interactive mode").yellow()
            );
        }
        wizard::run()?
    } else {
        cli.answers()
    };

    let options = settings::resolve(answers)?;
    let preview = watch::PreviewSettings {
        port: cli.port,
        open_browser: !cli.no_open,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .with_context(|| "Failed to start async runtime")?;

    runtime.block_on(async move {
        pipeline::convert(&options.files, &options).await;

        if options.watch && !options.files.is_empty() {
            watch::run(options, preview).await?;
        }
        Ok::<_, anyhow::Error>(())
    })
}
