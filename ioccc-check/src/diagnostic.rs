use std::fmt::{Display, Formatter};

use colored::{Color, Colorize};
use serde::{Deserialize, Serialize};

/// How bad a [`Diagnostic`] is.
#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    /// Something worth looking at, the submission is still acceptable.
    Warning,
    /// The submission must be rejected.
    Error,
}

impl DiagnosticLevel {
    /// Name of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticLevel::Error => "Error",
            DiagnosticLevel::Warning => "Warning",
        }
    }

    /// Color used when printing the level.
    pub fn color(&self) -> Color {
        match self {
            DiagnosticLevel::Warning => Color::BrightYellow,
            DiagnosticLevel::Error => Color::BrightRed,
        }
    }
}

impl Display for DiagnosticLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single finding about a submission.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    level: DiagnosticLevel,
    message: String,
    note: Option<String>,
    /// Output of the tool that produced the diagnostic.
    output: Option<String>,
}

impl Diagnostic {
    /// A new error.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            message: message.into(),
            note: None,
            output: None,
        }
    }

    /// A new warning.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            message: message.into(),
            note: None,
            output: None,
        }
    }

    /// Attach a note to the diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Attach the output of a tool to the diagnostic. Empty output is ignored.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        let output = output.into();
        if !output.trim().is_empty() {
            self.output = Some(output);
        }
        self
    }

    /// Write the diagnostic, with or without colors.
    pub fn print(&self, f: &mut Formatter<'_>, colors: bool) -> std::fmt::Result {
        let level = self.level.as_str();
        let pad = level.len();
        if colors {
            writeln!(
                f,
                "{}: {}",
                level.color(self.level.color()).bold(),
                self.message
            )?;
        } else {
            writeln!(f, "{}: {}", level, self.message)?;
        }
        let bold = |s: &'static str| if colors { s.bold().to_string() } else { s.to_string() };
        if let Some(note) = &self.note {
            write!(f, "{:>pad$}: ", bold("Note"), pad = pad)?;
            let mut lines = note.lines();
            if let Some(line) = lines.next() {
                writeln!(f, "{}", line)?;
            }
            for line in lines {
                writeln!(f, "{:>pad$}  {}", "", line, pad = pad)?;
            }
        }
        if let Some(output) = &self.output {
            for (index, line) in output.lines().enumerate() {
                writeln!(f, "{:>pad$} | {}", index + 1, line, pad = pad)?;
            }
        }
        Ok(())
    }

    /// The level of the diagnostic.
    pub fn level(&self) -> DiagnosticLevel {
        self.level
    }

    /// The main message of the diagnostic.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The note of the diagnostic, if any.
    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.print(f, true)
    }
}

/// All the diagnostics collected while checking a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    diagnostics: Vec<Diagnostic>,
}

impl CheckReport {
    /// An empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic to the report.
    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Add all the diagnostics of `other`.
    pub fn merge(&mut self, other: CheckReport) {
        self.diagnostics.extend(other.diagnostics);
    }

    /// All the diagnostics, in insertion order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Whether no error has been found. Warnings are allowed.
    pub fn ok(&self) -> bool {
        self.first_error().is_none()
    }

    /// The first error found, if any.
    pub fn first_error(&self) -> Option<&Diagnostic> {
        self.diagnostics
            .iter()
            .find(|d| d.level() == DiagnosticLevel::Error)
    }

    /// Print all the diagnostics to stderr.
    pub fn print(&self) {
        for diagnostic in &self.diagnostics {
            eprint!("{}", diagnostic);
        }
    }

    /// The diagnostics as plain text, suitable for a log file.
    pub fn to_plain_text(&self) -> String {
        self.to_string()
    }

    /// The message of the first error in a text written by [`CheckReport::to_plain_text`].
    pub fn first_error_in_plain_text(text: &str) -> Option<&str> {
        let prefix = format!("{}: ", DiagnosticLevel::Error);
        text.lines()
            .find_map(|line| line.strip_prefix(prefix.as_str()))
    }
}

impl From<Diagnostic> for CheckReport {
    fn from(diagnostic: Diagnostic) -> Self {
        CheckReport {
            diagnostics: vec![diagnostic],
        }
    }
}

impl Display for CheckReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for diagnostic in &self.diagnostics {
            diagnostic.print(f, false)?;
        }
        Ok(())
    }
}
