//! `creole render` command implementation.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use clap::Args;
use creole_config::{CliSettings, Config};
use creole_markup::{Element, Formatter};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Creole file to format (default: stdin, also with `-`).
    input: Option<PathBuf>,

    /// Format inline text only: no paragraphs, headings, lists or tables.
    #[arg(long)]
    inline: bool,

    /// Wrap the output in an element with this tag name.
    #[arg(long, value_name = "TAG")]
    wrap: Option<String>,

    /// Write HTML to this file instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Show changes from this older version of the input instead.
    #[arg(long, value_name = "FILE", conflicts_with = "inline")]
    diff_from: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover creole.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Largest accepted input in bytes (overrides config).
    #[arg(long)]
    max_input_bytes: Option<usize>,

    /// Prefix for wiki link targets (overrides config).
    #[arg(long)]
    link_prefix: Option<String>,

    /// Suffix for wiki link targets (overrides config).
    #[arg(long)]
    link_suffix: Option<String>,

    /// Alt text for images without one (overrides config).
    #[arg(long)]
    image_text: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub(crate) verbose: bool,
}

impl RenderArgs {
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let Self {
            input,
            inline,
            wrap,
            output: output_path,
            diff_from,
            config: config_path,
            max_input_bytes,
            link_prefix,
            link_suffix,
            image_text,
            verbose,
        } = self;
        let output = Output::new();

        let cli_settings = CliSettings {
            max_input_bytes,
            link_prefix,
            link_suffix,
            default_image_text: image_text,
        };
        let config = Config::load(config_path.as_deref(), Some(&cli_settings))?;
        if let Some(path) = &config.config_path {
            tracing::info!(path = %path.display(), "Loaded configuration");
        }

        if let Some(tag) = &wrap {
            validate_tag(tag)?;
        }

        let limit = config.limits.max_input_bytes;
        let text = read_input(input.as_deref(), limit)?;
        if text.trim().is_empty() {
            output.warning("Input is empty");
        }
        let previous = diff_from
            .as_deref()
            .map(|path| read_limited(File::open(path)?, limit))
            .transpose()?;

        let mode = match &previous {
            Some(old) => Mode::DiffFrom(old),
            None if inline => Mode::Inline,
            None => Mode::Document,
        };
        let formatter = Formatter::new(config.format_options());
        let html = render(&formatter, &text, mode, wrap.as_deref());
        tracing::info!(input = text.len(), output = html.len(), "Rendered");

        match &output_path {
            Some(path) => {
                std::fs::write(path, &html)?;
                output.success(&format!("Wrote {}", path.display()));
            }
            None => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(html.as_bytes())?;
                stdout.write_all(b"\n")?;
                stdout.flush()?;
            }
        }
        if verbose {
            output.info(&format!("{} bytes in, {} bytes out", text.len(), html.len()));
        }

        Ok(())
    }
}

/// What to produce from the input text.
#[derive(Debug, Clone, Copy)]
enum Mode<'a> {
    Document,
    Inline,
    /// Document with changes marked against this older text.
    DiffFrom(&'a str),
}

/// Format `text` in `mode`, optionally wrapped in a `wrap` element.
fn render(formatter: &Formatter, text: &str, mode: Mode<'_>, wrap: Option<&str>) -> String {
    let html = match mode {
        Mode::Document => formatter.format(text),
        Mode::Inline => formatter.format_inline(text),
        Mode::DiffFrom(old) => formatter.format_diff(old, text),
    };
    match wrap {
        Some(tag) => {
            let mut element = Element::new(tag);
            element.inner_html = html;
            element.to_string()
        }
        None => html,
    }
}

/// Read the input file, or stdin when it is absent or `-`.
fn read_input(path: Option<&Path>, limit: usize) -> Result<String, CliError> {
    match path {
        Some(path) if path != Path::new("-") => read_limited(File::open(path)?, limit),
        _ => read_limited(io::stdin().lock(), limit),
    }
}

/// Read all of `reader` as UTF-8, failing when it holds more than `limit` bytes.
fn read_limited(reader: impl Read, limit: usize) -> Result<String, CliError> {
    let mut text = String::new();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    reader.take(cap).read_to_string(&mut text)?;
    if text.len() > limit {
        return Err(CliError::Validation(format!(
            "input exceeds {limit} bytes (see --max-input-bytes)"
        )));
    }
    Ok(text)
}

/// Require a plain HTML tag name for `--wrap`.
fn validate_tag(tag: &str) -> Result<(), CliError> {
    let mut chars = tag.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !valid {
        return Err(CliError::Validation(format!(
            "invalid tag name for --wrap: {tag:?}"
        )));
    }
    Ok(())
}
