//! Status messages on stderr, kept apart from the HTML written to stdout.

use console::{Style, Term};

/// Kind of status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl Level {
    fn style(self) -> Style {
        match self {
            Self::Info => Style::new(),
            Self::Success => Style::new().green(),
            Self::Warning => Style::new().yellow(),
            Self::Error => Style::new().red().bold(),
        }
    }

    /// Message text before styling.
    fn label(self, msg: &str) -> String {
        match self {
            Self::Info | Self::Success => msg.to_owned(),
            Self::Warning => format!("warning: {msg}"),
            Self::Error => format!("error: {msg}"),
        }
    }
}

/// Status line writer for the command line front end.
pub(crate) struct Output {
    term: Term,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }

    pub(crate) fn info(&self, msg: &str) {
        self.line(Level::Info, msg);
    }

    pub(crate) fn success(&self, msg: &str) {
        self.line(Level::Success, msg);
    }

    pub(crate) fn warning(&self, msg: &str) {
        self.line(Level::Warning, msg);
    }

    pub(crate) fn error(&self, msg: &str) {
        self.line(Level::Error, msg);
    }

    fn line(&self, level: Level, msg: &str) {
        let text = level.style().apply_to(level.label(msg)).to_string();
        let _ = self.term.write_line(&text);
    }
}
