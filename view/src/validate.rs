use crate::error::ViewError;
use crate::ids::normalize_ids;
use crate::parse::parse_dashboard;
use crate::xml::parse_document;
use serde::Serialize;
use std::fmt;

/// A recoverable problem found while compiling a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    pub line: Option<usize>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} (line {line})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl From<&ViewError> for Diagnostic {
    fn from(err: &ViewError) -> Self {
        match err {
            ViewError::InvalidView { message, line } => Diagnostic {
                message: message.clone(),
                line: *line,
            },
            other => Diagnostic {
                message: other.to_string(),
                line: None,
            },
        }
    }
}

/// Collects warnings while a view is parsed; never fails.
#[derive(Debug, Default)]
pub struct Warnings {
    items: Vec<Diagnostic>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: impl Into<String>, line: Option<usize>) {
        let diagnostic = Diagnostic {
            message: message.into(),
            line,
        };
        tracing::debug!(%diagnostic, "view warning");
        self.items.push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

/// Runs the parser and identifier pass over `source` and reports every
/// problem as a diagnostic. Hard errors end the pass and are reported last.
pub fn validate(source: &str) -> Vec<Diagnostic> {
    let mut warnings = Warnings::new();
    let outcome = parse_document(source)
        .and_then(|root| parse_dashboard(&root, &mut warnings))
        .and_then(|mut dashboard| normalize_ids(&mut dashboard));
    let mut diagnostics = warnings.into_vec();
    if let Err(err) = outcome {
        diagnostics.push(Diagnostic::from(&err));
    }
    diagnostics
}
