use thiserror::Error;

#[derive(Error, Debug)]
pub enum ViewError {
    #[error("{message}{}", line_suffix(.line))]
    InvalidView {
        message: String,
        line: Option<usize>,
    },

    #[error("failed to encode view configuration: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ViewError {
    pub fn invalid(message: impl Into<String>, line: Option<usize>) -> Self {
        ViewError::InvalidView {
            message: message.into(),
            line,
        }
    }

    /// 1-based source line of the failing node, when known.
    pub fn line(&self) -> Option<usize> {
        match self {
            ViewError::InvalidView { line, .. } => *line,
            ViewError::Encode(_) => None,
        }
    }
}

fn line_suffix(line: &Option<usize>) -> String {
    match line {
        Some(line) => format!(" (line {line})"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, ViewError>;
