//! Structured build/runtime failure records and their terminal rendering.
//!
//! Failures inside the build pipeline never propagate as errors; they are
//! converted into [`DiagnosticRecord`]s, rendered once, and discarded.

mod render;

pub use render::{render, render_all};

/// One structured failure record, consumed once by the renderer.
#[derive(Debug, Clone)]
pub struct DiagnosticRecord {
    /// Short failure title ("Syntax error", "Unresolved import", ...)
    pub title: String,
    /// Source file the failure belongs to (project-relative when possible)
    pub file: String,
    /// Free-text description, wrapped by the renderer
    pub message: String,
    /// 1-based line, when known
    pub line: Option<usize>,
    /// 1-based column, when known
    pub column: Option<usize>,
    /// Offending source line for the caret frame
    pub code_frame: Option<CodeFrame>,
    /// Actionable fix hint
    pub suggestion: Option<String>,
}

/// Source excerpt with a caret pointing at the offending column.
#[derive(Debug, Clone)]
pub struct CodeFrame {
    /// 1-based line number of `text`
    pub line: usize,
    /// 1-based caret column within `text`
    pub column: usize,
    /// The source line itself (untrimmed)
    pub text: String,
}

impl DiagnosticRecord {
    pub fn new(
        title: impl Into<String>,
        file: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            file: file.into(),
            message: message.into(),
            line: None,
            column: None,
            code_frame: None,
            suggestion: None,
        }
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_frame(mut self, frame: CodeFrame) -> Self {
        self.code_frame = Some(frame);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}
