//! `xdt`: apply an XML document transform to a file

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use xdt_dom::{Document, LoadOptions, TransformableDocument};
use xdt_engine::TransformationBuilder;
use xdt_traits::{Diagnostic, MessageType, Severity, SourceLocation, TransformLogger};

#[derive(Parser)]
#[command(name = "xdt", version, about = "Apply an XML document transform")]
struct Cli {
    /// Document to transform
    #[arg(long, short, value_name = "PATH")]
    source: PathBuf,
    /// Transform document with xdt:Transform / xdt:Locator directives
    #[arg(long, short, value_name = "PATH")]
    transform: PathBuf,
    /// Where to write the result (default: stdout)
    #[arg(long, short, value_name = "PATH", conflicts_with = "in_place")]
    output: Option<PathBuf>,
    /// Overwrite the source document with the result
    #[arg(long)]
    in_place: bool,
    /// Lay the result out from scratch instead of keeping source formatting
    #[arg(long)]
    no_preserve: bool,
    /// Print every step of the transformation
    #[arg(long, short)]
    verbose: bool,
    /// Diagnostics format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// `file (line, column) warning: message`
    Text,
    /// One JSON object per line
    Json,
}

/// Prints warnings and errors to stderr; messages go to the log
struct ConsoleLogger {
    format: Format,
    depth: usize,
}

impl ConsoleLogger {
    fn report(&self, severity: Severity, location: Option<&SourceLocation>, message: &str) {
        let diagnostic = Diagnostic::new(severity, location, message);
        let line = match self.format {
            Format::Text => diagnostic.to_line(),
            Format::Json => match serde_json::to_string(&diagnostic) {
                Ok(json) => json,
                Err(err) => {
                    log::error!("could not serialize diagnostic: {}", err);
                    diagnostic.to_line()
                }
            },
        };
        eprintln!("{}", line);
    }
}

impl TransformLogger for ConsoleLogger {
    fn log_message(&mut self, kind: MessageType, message: &str) {
        let indent = "  ".repeat(self.depth);
        match kind {
            MessageType::Normal => log::info!("{}{}", indent, message),
            MessageType::Verbose => log::debug!("{}{}", indent, message),
        }
    }

    fn log_warning(&mut self, location: Option<&SourceLocation>, message: &str) {
        self.report(Severity::Warning, location, message);
    }

    fn log_error(&mut self, location: Option<&SourceLocation>, message: &str) {
        self.report(Severity::Error, location, message);
    }

    fn start_section(&mut self, kind: MessageType, message: &str) {
        self.log_message(kind, message);
        self.depth += 1;
    }

    fn end_section(&mut self, kind: MessageType, message: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.log_message(kind, message);
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_target(false)
        .format_timestamp(None)
        .init();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(2)
        }
    }
}

/// Returns whether the transform applied without errors
fn run(cli: &Cli) -> Result<bool> {
    let logger = ConsoleLogger {
        format: cli.format,
        depth: 0,
    };
    let mut transformation = TransformationBuilder::new()
        .logger(logger)
        .from_file(&cli.transform)
        .with_context(|| format!("failed to load transform {}", cli.transform.display()))?;

    let options = if cli.no_preserve {
        LoadOptions::default()
    } else {
        LoadOptions::preserving()
    };
    let source = Document::load_file(&cli.source, &options)
        .with_context(|| format!("failed to load {}", cli.source.display()))?;

    let mut target = TransformableDocument::new(source);
    let succeeded = transformation.apply(&mut target);
    if !succeeded {
        log::info!("transform reported errors, writing the partial result");
    }

    let destination = match (&cli.output, cli.in_place) {
        (Some(path), _) => Some(path),
        (None, true) => Some(&cli.source),
        (None, false) => None,
    };
    match destination {
        Some(path) => target
            .save_to_path(path)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            target.save_to_writer(&mut stdout).context("failed to write to stdout")?;
            stdout.flush()?;
        }
    }
    Ok(succeeded)
}
